// In crates/forecast/src/types.rs

use serde::{Deserialize, Serialize};

/// Model label attached to the combined forecast.
pub const ENSEMBLE_MODEL: &str = "ensemble";

/// One ensemble forecast: a price, how much the sub-models agreed on it,
/// and the window of time it speaks for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub predicted_price: f64,
    /// Which model produced the forecast. The combined output is always
    /// labeled [`ENSEMBLE_MODEL`].
    pub model: &'static str,
    /// Agreement-derived confidence, always within [0.3, 1.0].
    pub confidence: f64,
    /// Millisecond timestamp the forecast was produced at.
    pub timestamp: i64,
    /// Millisecond timestamp of the bar close the forecast targets.
    pub closes_at: i64,
}

/// The six sub-predictors of the ensemble. Each is a cheap heuristic over
/// the normalized feature window; the ensemble combines them through
/// [`ModelWeights`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Recency-weighted average with a momentum nudge.
    Recency,
    /// Recent-vs-historical blended average, volatility adjusted.
    Blend,
    /// Sliding-window trend extrapolation.
    WindowTrend,
    /// Correlation-weighted search for similar historical windows.
    Similarity,
    /// Indicator rules: RSI extremes, MACD drift, volume spikes.
    Rules,
    /// Directional step counting over the last ten points.
    StepCount,
}

impl ModelKind {
    pub const ALL: [ModelKind; 6] = [
        ModelKind::Recency,
        ModelKind::Blend,
        ModelKind::WindowTrend,
        ModelKind::Similarity,
        ModelKind::Rules,
        ModelKind::StepCount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Recency => "recency",
            ModelKind::Blend => "blend",
            ModelKind::WindowTrend => "window_trend",
            ModelKind::Similarity => "similarity",
            ModelKind::Rules => "rules",
            ModelKind::StepCount => "step_count",
        }
    }

    /// Stable position in weight and accuracy tables.
    pub fn index(&self) -> usize {
        match self {
            ModelKind::Recency => 0,
            ModelKind::Blend => 1,
            ModelKind::WindowTrend => 2,
            ModelKind::Similarity => 3,
            ModelKind::Rules => 4,
            ModelKind::StepCount => 5,
        }
    }
}

/// Per-model blend weights. Invariant: entries sum to 1 and each stays at
/// or above [`ModelWeights::FLOOR`]; [`ModelWeights::renormalize`] restores
/// the invariant after any adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights([f64; 6]);

impl Default for ModelWeights {
    fn default() -> Self {
        Self([0.2, 0.2, 0.15, 0.2, 0.15, 0.1])
    }
}

impl ModelWeights {
    /// No model's weight may fall below this share.
    pub const FLOOR: f64 = 0.05;

    pub fn get(&self, kind: ModelKind) -> f64 {
        self.0[kind.index()]
    }

    pub(crate) fn adjust(&mut self, kind: ModelKind, delta: f64) {
        self.0[kind.index()] += delta;
        self.renormalize();
    }

    /// Rescales the weights to sum to exactly 1 while holding every entry
    /// at or above the floor. Entries pushed below the floor are pinned
    /// there and the remaining mass is redistributed over the rest, so the
    /// result is stable under repeated application.
    pub fn renormalize(&mut self) {
        let mut pinned = [false; 6];
        for w in &mut self.0 {
            if *w < 0.0 {
                *w = 0.0;
            }
        }
        loop {
            let pinned_mass = Self::FLOOR * pinned.iter().filter(|p| **p).count() as f64;
            let target = 1.0 - pinned_mass;
            let free_sum: f64 = self
                .0
                .iter()
                .zip(&pinned)
                .filter(|(_, p)| !**p)
                .map(|(w, _)| *w)
                .sum();

            let mut changed = false;
            for i in 0..6 {
                if pinned[i] {
                    continue;
                }
                let scaled = if free_sum > 0.0 {
                    self.0[i] / free_sum * target
                } else {
                    target / pinned.iter().filter(|p| !**p).count() as f64
                };
                if scaled < Self::FLOOR {
                    self.0[i] = Self::FLOOR;
                    pinned[i] = true;
                    changed = true;
                } else {
                    self.0[i] = scaled;
                }
            }
            if !changed {
                break;
            }
        }
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_already_satisfy_the_invariant() {
        let mut w = ModelWeights::default();
        assert!((w.sum() - 1.0).abs() < 1e-12);
        w.renormalize();
        assert!((w.sum() - 1.0).abs() < 1e-12);
        for kind in ModelKind::ALL {
            assert!(w.get(kind) >= ModelWeights::FLOOR);
        }
    }

    #[test]
    fn renormalize_pins_collapsed_weights_to_the_floor() {
        let mut w = ModelWeights::default();
        // Crush one model far below the floor.
        w.adjust(ModelKind::StepCount, -0.5);
        assert!((w.sum() - 1.0).abs() < 1e-9);
        assert!((w.get(ModelKind::StepCount) - ModelWeights::FLOOR).abs() < 1e-12);
        for kind in ModelKind::ALL {
            assert!(w.get(kind) >= ModelWeights::FLOOR);
        }
    }
}
