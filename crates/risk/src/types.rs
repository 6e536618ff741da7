// In crates/risk/src/types.rs

use core_types::StrategyTier;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why an open position should be closed now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    StopLoss,
    TrailingStop,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::StopLoss => "STOP_LOSS",
            CloseReason::TrailingStop => "TRAILING_STOP",
        }
    }
}

/// Derived sizing for one prospective entry. Recomputed at decision time,
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizing {
    /// Base-asset quantity to buy.
    pub amount: Decimal,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Decimal,
    /// Quote-asset value at risk if the stop is hit.
    pub risk_amount: Decimal,
    /// Quote-asset value gained if the target is hit.
    pub potential_profit: Decimal,
}

/// The active risk posture: strategy tier plus the base risk fraction it
/// scales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPolicy {
    pub tier: StrategyTier,
    /// Base percentage of balance risked per trade, before tier and
    /// confidence scaling. `2.0` means 2%.
    pub max_risk_percentage: f64,
    /// Unrealized profit (percent) required before the trailing stop
    /// engages at all.
    #[serde(default = "default_trailing_profit_floor")]
    pub trailing_profit_floor_percent: f64,
}

fn default_trailing_profit_floor() -> f64 {
    2.0
}

impl RiskPolicy {
    pub fn new(tier: StrategyTier, max_risk_percentage: f64) -> Self {
        Self {
            tier,
            max_risk_percentage,
            trailing_profit_floor_percent: default_trailing_profit_floor(),
        }
    }
}
