// In crates/ledger/src/types.rs

use chrono::{DateTime, Utc};
use core_types::{Side, Symbol, Timeframe, TradeMode};
use rust_decimal::Decimal;
use serde::Serialize;

/// One forecast, written before the outcome is known.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRecord {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub predicted_price: f64,
    /// Label of the model that produced the forecast, e.g. "ensemble".
    pub model: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    /// When the forecast's target bar closes.
    pub closes_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Open,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "OPEN",
            TradeStatus::Closed => "CLOSED",
        }
    }
}

/// One executed entry. Closing fills in the price, profit and timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub symbol: Symbol,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub mode: TradeMode,
    pub status: TradeStatus,
    pub close_price: Option<Decimal>,
    pub profit_loss: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}
