// In crates/forecast/src/lib.rs
//
// The ensemble forecaster: six heuristic sub-predictors blended through an
// online-adapted weight set. The forecaster owns its weights and accuracy
// history; callers hold one instance per instrument-and-timeframe context
// and feed it sequentially from the tick loop.

use std::collections::VecDeque;

use chrono::Utc;
use core_types::Timeframe;
use features::NormalizedFeatures;
use tracing::debug;

pub mod error;
pub mod models;
pub mod types;

pub use error::{Error, Result};
pub use types::{ENSEMBLE_MODEL, ModelKind, ModelWeights, PredictionResult};

/// Lookback window every sub-predictor operates on.
pub const SEQUENCE_LENGTH: usize = 60;

const LEARNING_RATE: f64 = 0.01;
const ACCURACY_HISTORY_CAP: usize = 100;
const RECENT_ACCURACY_WINDOW: usize = 20;

pub struct EnsembleForecaster {
    weights: ModelWeights,
    accuracy: [VecDeque<f64>; 6],
}

impl Default for EnsembleForecaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EnsembleForecaster {
    pub fn new() -> Self {
        Self {
            weights: ModelWeights::default(),
            accuracy: Default::default(),
        }
    }

    pub fn weights(&self) -> &ModelWeights {
        &self.weights
    }

    /// Mean recorded accuracy for one sub-model, 0 when none recorded yet.
    pub fn mean_accuracy(&self, kind: ModelKind) -> f64 {
        let history = &self.accuracy[kind.index()];
        if history.is_empty() {
            return 0.0;
        }
        history.iter().sum::<f64>() / history.len() as f64
    }

    /// Produces the blended forecast for the last [`SEQUENCE_LENGTH`]
    /// entries of `normalized`. Fails if fewer entries are available.
    ///
    /// The blended price is smoothed 40% toward `current_price` to dampen
    /// spikes; confidence falls as the sub-predictions disagree, floored at
    /// 0.3 and capped at 1.
    pub fn predict(
        &self,
        normalized: &[NormalizedFeatures],
        current_price: f64,
        timeframe: Timeframe,
    ) -> Result<PredictionResult> {
        if normalized.len() < SEQUENCE_LENGTH {
            return Err(Error::InsufficientSequence {
                required: SEQUENCE_LENGTH,
                actual: normalized.len(),
            });
        }

        let window = &normalized[normalized.len() - SEQUENCE_LENGTH..];
        let predictions: Vec<f64> = ModelKind::ALL.iter().map(|k| k.predict(window)).collect();

        let mut blended = 0.0;
        let mut total_weight = 0.0;
        for (kind, prediction) in ModelKind::ALL.iter().zip(&predictions) {
            let weight = self.weights.get(*kind);
            blended += prediction * weight;
            total_weight += weight;
        }
        blended /= total_weight;

        let smoothed = current_price * 0.4 + blended * 0.6;

        let mean = predictions.iter().sum::<f64>() / predictions.len() as f64;
        let variance = predictions.iter().map(|p| (p - mean).powi(2)).sum::<f64>()
            / predictions.len() as f64;
        let disagreement = variance.sqrt() / current_price * 100.0;
        let confidence = (1.0 - disagreement).clamp(0.3, 1.0);

        let timestamp = Utc::now().timestamp_millis();
        debug!(
            predicted = smoothed,
            confidence,
            timeframe = timeframe.as_str(),
            "ensemble forecast"
        );

        Ok(PredictionResult {
            predicted_price: smoothed,
            model: ENSEMBLE_MODEL,
            confidence,
            timestamp,
            closes_at: timestamp + timeframe.duration_ms(),
        })
    }

    /// Records one model's realized accuracy and nudges its weight. The
    /// only mutator of the weight set; safe to call repeatedly with the
    /// same inputs.
    pub fn update_weights(&mut self, kind: ModelKind, actual_price: f64, predicted_price: f64) {
        if actual_price == 0.0 {
            return;
        }
        let error = (actual_price - predicted_price).abs() / actual_price;
        let accuracy = (1.0 - error).max(0.0);

        let history = &mut self.accuracy[kind.index()];
        history.push_back(accuracy);
        if history.len() > ACCURACY_HISTORY_CAP {
            history.pop_front();
        }

        let recent_len = history.len().min(RECENT_ACCURACY_WINDOW);
        let recent: f64 =
            history.iter().rev().take(recent_len).sum::<f64>() / recent_len as f64;

        self.weights.adjust(kind, LEARNING_RATE * (recent - 0.5));
    }

    /// Replays up to the last 20 historical points through every
    /// sub-predictor, updating weights from each realized outcome. A no-op
    /// below 10 feature windows.
    pub fn train_on_history(&mut self, windows: &[NormalizedFeatures], targets: &[f64]) {
        if windows.len() < 10 || windows.len() != targets.len() {
            return;
        }

        for i in 0..(windows.len() - 1).min(20) {
            let idx = windows.len() - 1 - i;
            let start = idx.saturating_sub(SEQUENCE_LENGTH);
            let sequence = &windows[start..idx];
            if sequence.len() < SEQUENCE_LENGTH {
                continue;
            }

            let actual = targets[idx];
            for kind in ModelKind::ALL {
                let predicted = kind.predict(sequence);
                self.update_weights(kind, actual, predicted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A normalized vector whose only meaningful dimensions are the close
    /// anchor and neutral indicator readings.
    fn entry(close: f64) -> NormalizedFeatures {
        let mut dims = [0.0; NormalizedFeatures::DIMENSIONS];
        dims[features::dim::CLOSE] = close;
        dims[features::dim::RSI] = 0.5;
        dims[features::dim::STOCH_K] = 0.5;
        dims[features::dim::STOCH_D] = 0.5;
        dims[features::dim::VOLUME_RATIO] = 1.0;
        NormalizedFeatures(dims)
    }

    fn flat_sequence(n: usize, price: f64) -> Vec<NormalizedFeatures> {
        (0..n).map(|_| entry(price)).collect()
    }

    #[test]
    fn rejects_short_sequences() {
        let forecaster = EnsembleForecaster::new();
        let short = flat_sequence(59, 100.0);
        assert!(matches!(
            forecaster.predict(&short, 100.0, Timeframe::H1),
            Err(Error::InsufficientSequence { required: 60, actual: 59 })
        ));
    }

    #[test]
    fn flat_sequence_forecasts_the_current_price() {
        let forecaster = EnsembleForecaster::new();
        let result = forecaster.predict(&flat_sequence(60, 100.0), 100.0, Timeframe::H1).unwrap();
        // No momentum anywhere: every sub-model lands on the anchor price,
        // so the blend equals it and the models agree perfectly.
        assert!((result.predicted_price - 100.0).abs() / 100.0 < 0.01);
        assert!(result.confidence > 0.3);
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert_eq!(result.model, ENSEMBLE_MODEL);
    }

    #[test]
    fn confidence_stays_in_band_for_noisy_input() {
        let forecaster = EnsembleForecaster::new();
        let noisy: Vec<NormalizedFeatures> = (0..80)
            .map(|i| entry(100.0 + 30.0 * ((i as f64) * 1.7).sin()))
            .collect();
        let result = forecaster.predict(&noisy, 100.0, Timeframe::M5).unwrap();
        assert!((0.3..=1.0).contains(&result.confidence));
    }

    #[test]
    fn weight_invariant_survives_arbitrary_updates() {
        let mut forecaster = EnsembleForecaster::new();
        for round in 0..500 {
            let kind = ModelKind::ALL[round % 6];
            // Alternate wildly wrong and exact predictions.
            let predicted = if round % 2 == 0 { 50.0 } else { 100.0 };
            forecaster.update_weights(kind, 100.0, predicted);

            assert!((forecaster.weights().sum() - 1.0).abs() < 1e-9);
            for k in ModelKind::ALL {
                assert!(forecaster.weights().get(k) >= ModelWeights::FLOOR);
            }
        }
    }

    #[test]
    fn training_needs_ten_windows() {
        let mut forecaster = EnsembleForecaster::new();
        let before = forecaster.weights().clone();

        let windows = flat_sequence(9, 100.0);
        let targets = vec![100.0; 9];
        forecaster.train_on_history(&windows, &targets);
        assert_eq!(forecaster.weights(), &before);

        // With a full history the replay records accuracy for every model.
        let windows = flat_sequence(80, 100.0);
        let targets = vec![100.0; 80];
        forecaster.train_on_history(&windows, &targets);
        for kind in ModelKind::ALL {
            assert!(forecaster.mean_accuracy(kind) > 0.9);
        }
    }
}
