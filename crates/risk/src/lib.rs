// In crates/risk/src/lib.rs
//
// The risk manager: position sizing, entry gating and exit rules, all
// parameterized by the strategy tier. Money math stays in `Decimal`; the
// analytic inputs (confidence, normalized volatility, trend strength) come
// in as floats from the forecaster and feature engineer.

use core_types::StrategyTier;
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{CloseReason, PositionSizing, RiskPolicy};

pub struct RiskManager {
    policy: RiskPolicy,
}

impl RiskManager {
    pub fn new(policy: RiskPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: RiskPolicy) {
        self.policy = policy;
    }

    /// Sizes a prospective long entry.
    ///
    /// The risked amount is `balance x max_risk% x tier multiplier x
    /// forecast confidence`; the stop sits one ATR-scaled distance below
    /// entry and the target a tier-dependent multiple of that distance
    /// above. Fails if the stop distance degenerates to zero or below.
    pub fn size_position(
        &self,
        balance: Decimal,
        entry_price: Decimal,
        volatility: Decimal,
        forecast_confidence: f64,
    ) -> Result<PositionSizing> {
        let stop_distance = volatility * atr_multiplier(self.policy.tier);
        if stop_distance <= Decimal::ZERO {
            return Err(Error::InvalidVolatility(stop_distance));
        }

        let confidence = Decimal::from_f64(forecast_confidence)
            .ok_or_else(|| Error::InvalidParameters("non-finite confidence".to_string()))?;
        let base_risk = Decimal::from_f64(self.policy.max_risk_percentage)
            .ok_or_else(|| Error::InvalidParameters("non-finite risk percentage".to_string()))?;

        let effective_risk = base_risk * risk_multiplier(self.policy.tier) * confidence;
        let risk_amount = balance * effective_risk / dec!(100);

        let amount = risk_amount / stop_distance;
        let take_profit_distance = stop_distance * reward_ratio(self.policy.tier);

        Ok(PositionSizing {
            amount,
            stop_loss_price: entry_price - stop_distance,
            take_profit_price: entry_price + take_profit_distance,
            risk_amount,
            potential_profit: amount * take_profit_distance,
        })
    }

    /// Entry gate: confident enough, calm enough, trending enough for the
    /// active tier.
    pub fn should_enter(&self, confidence: f64, volatility: f64, trend_strength: f64) -> bool {
        confidence >= self.policy.tier.min_confidence()
            && volatility <= max_volatility(self.policy.tier)
            && trend_strength >= min_trend_strength(self.policy.tier)
    }

    /// Exit check for an open long. The hard stop is evaluated first and
    /// fires whenever price is at or below it, regardless of the trailing
    /// state; otherwise the trailing stop fires once unrealized profit has
    /// cleared the policy's profit floor and the pullback from the running
    /// high exceeds the tier's trailing threshold.
    pub fn should_exit(
        &self,
        entry_price: Decimal,
        current_price: Decimal,
        highest_price: Decimal,
        stop_loss_price: Decimal,
    ) -> Option<CloseReason> {
        if current_price <= stop_loss_price {
            return Some(CloseReason::StopLoss);
        }

        if entry_price <= Decimal::ZERO || highest_price <= Decimal::ZERO {
            return None;
        }

        let profit_percent = (current_price - entry_price) / entry_price * dec!(100);
        let drawdown_percent = (highest_price - current_price) / highest_price * dec!(100);
        let profit_floor = Decimal::from_f64(self.policy.trailing_profit_floor_percent)
            .unwrap_or(dec!(2));

        if profit_percent > profit_floor && drawdown_percent > trailing_percent(self.policy.tier) {
            return Some(CloseReason::TrailingStop);
        }

        None
    }

    /// Advisory cap on total open exposure; enforcement is the caller's
    /// job.
    pub fn max_exposure(&self, balance: Decimal) -> Decimal {
        balance * exposure_fraction(self.policy.tier)
    }
}

fn risk_multiplier(tier: StrategyTier) -> Decimal {
    match tier {
        StrategyTier::Aggressive => dec!(1.5),
        StrategyTier::Medium => dec!(1.0),
        StrategyTier::Conservative => dec!(0.6),
    }
}

fn atr_multiplier(tier: StrategyTier) -> Decimal {
    match tier {
        StrategyTier::Aggressive => dec!(2.5),
        StrategyTier::Medium => dec!(2.0),
        StrategyTier::Conservative => dec!(1.5),
    }
}

fn reward_ratio(tier: StrategyTier) -> Decimal {
    match tier {
        StrategyTier::Aggressive => dec!(3.0),
        StrategyTier::Medium => dec!(2.0),
        StrategyTier::Conservative => dec!(1.5),
    }
}

fn max_volatility(tier: StrategyTier) -> f64 {
    match tier {
        StrategyTier::Aggressive => 0.05,
        StrategyTier::Medium => 0.04,
        StrategyTier::Conservative => 0.03,
    }
}

fn min_trend_strength(tier: StrategyTier) -> f64 {
    match tier {
        StrategyTier::Aggressive => 0.3,
        StrategyTier::Medium => 0.5,
        StrategyTier::Conservative => 0.7,
    }
}

fn trailing_percent(tier: StrategyTier) -> Decimal {
    match tier {
        StrategyTier::Aggressive => dec!(3.0),
        StrategyTier::Medium => dec!(2.0),
        StrategyTier::Conservative => dec!(1.0),
    }
}

fn exposure_fraction(tier: StrategyTier) -> Decimal {
    match tier {
        StrategyTier::Aggressive => dec!(0.8),
        StrategyTier::Medium => dec!(0.5),
        StrategyTier::Conservative => dec!(0.3),
    }
}
