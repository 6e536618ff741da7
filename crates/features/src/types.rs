// In crates/features/src/types.rs

use serde::Serialize;

/// The full set of per-bar technical features, one per bar from the warm-up
/// index onward. Everything here lives in the analytic (f64) domain.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureVector {
    // Raw OHLCV
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,

    // Returns
    pub returns: f64,
    pub log_returns: f64,

    // Moving averages
    pub sma_20: f64,
    pub sma_50: f64,
    pub sma_200: f64,
    pub ema_9: f64,
    pub ema_21: f64,
    pub ema_50: f64,

    // Momentum
    pub rsi_14: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,

    // Volatility
    pub atr_14: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub bb_width: f64,

    // Trend strength
    pub adx_14: f64,

    // Derivatives
    pub price_slope: f64,
    pub volume_slope: f64,
    pub volume_sma_20: f64,
    pub high_low_range: f64,
    pub close_open_diff: f64,

    // Candle-shape flags
    pub is_doji: bool,
    pub is_hammer: bool,
    pub is_engulfing: bool,

    // Multi-timeframe enrichment (present only when the extra series was supplied)
    pub higher_tf_trend: Option<f64>,
    pub lower_tf_volatility: Option<f64>,
}

/// Named indices into a [`NormalizedFeatures`] vector.
pub mod dim {
    pub const CLOSE: usize = 0;
    pub const RETURNS: usize = 1;
    pub const LOG_RETURNS: usize = 2;
    pub const RSI: usize = 3;
    pub const MACD: usize = 4;
    pub const MACD_SIGNAL: usize = 5;
    pub const MACD_HISTOGRAM: usize = 6;
    pub const STOCH_K: usize = 7;
    pub const STOCH_D: usize = 8;
    pub const ATR: usize = 9;
    pub const BB_WIDTH: usize = 10;
    pub const ADX: usize = 11;
    pub const PRICE_SLOPE: usize = 12;
    pub const VOLUME_RATIO: usize = 13;
    pub const RANGE: usize = 14;
    pub const BODY: usize = 15;
    pub const HIGHER_TF_TREND: usize = 16;
    pub const LOWER_TF_VOLATILITY: usize = 17;
}

/// The fixed-width numeric form the forecaster consumes.
///
/// Dimension 0 carries the raw close so the sub-predictors work in price
/// space; every other dimension is scaled to a roughly [-1, 1] or [0, 1]
/// range (the volume ratio hovers around 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedFeatures(pub [f64; NormalizedFeatures::DIMENSIONS]);

impl NormalizedFeatures {
    pub const DIMENSIONS: usize = 18;

    pub fn close(&self) -> f64 {
        self.0[dim::CLOSE]
    }

    pub fn returns(&self) -> f64 {
        self.0[dim::RETURNS]
    }

    /// RSI scaled to [0, 1].
    pub fn rsi(&self) -> f64 {
        self.0[dim::RSI]
    }

    /// MACD line divided by the close.
    pub fn macd(&self) -> f64 {
        self.0[dim::MACD]
    }

    pub fn macd_histogram(&self) -> f64 {
        self.0[dim::MACD_HISTOGRAM]
    }

    pub fn stoch_k(&self) -> f64 {
        self.0[dim::STOCH_K]
    }

    pub fn atr(&self) -> f64 {
        self.0[dim::ATR]
    }

    pub fn adx(&self) -> f64 {
        self.0[dim::ADX]
    }

    /// Current volume relative to its 20-bar average (~1.0 is normal).
    pub fn volume_ratio(&self) -> f64 {
        self.0[dim::VOLUME_RATIO]
    }
}
