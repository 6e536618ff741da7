use serde::Serialize;

/// Directional reading of a single-candle (or few-candle) formation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CandleBias {
    Bullish,
    Bearish,
    Neutral,
}

/// Which way a chart formation points once it resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

/// Whether a chart formation reverses or continues the prior move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Reversal,
    Continuation,
}

/// A candle-shape match on the latest 1-3 bars of a window.
#[derive(Debug, Clone, Serialize)]
pub struct CandlePattern {
    pub name: &'static str,
    pub bias: CandleBias,
    /// Fixed per-pattern score in (0, 1].
    pub confidence: f64,
}

/// A multi-bar chart formation found in a trailing window.
#[derive(Debug, Clone, Serialize)]
pub struct ChartPattern {
    pub name: &'static str,
    pub direction: Direction,
    pub kind: ChartKind,
    pub confidence: f64,
    /// Bar indices (into the full input slice) spanning the formation.
    pub start_index: usize,
    pub end_index: usize,
    /// Measured-move objective, when the formation implies one.
    pub target_price: Option<f64>,
}
