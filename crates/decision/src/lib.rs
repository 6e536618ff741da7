// In crates/decision/src/lib.rs
//
// The decision engine: fuses the ensemble forecast, detected patterns, raw
// indicator readings and multi-timeframe agreement into one weighted
// BUY/SELL/HOLD signal. Scoring is normalized over the weight of factors
// that actually fired, so a quiet tape does not dilute a strong signal.

use std::collections::HashMap;

use chrono::Utc;
use core_types::{SignalAction, StrategyTier, Timeframe, TradingSignal};
use features::FeatureVector;
use forecast::PredictionResult;
use num_traits::ToPrimitive;
use patterns::{CandleBias, CandlePattern, ChartPattern, Direction};
use rust_decimal::Decimal;
use tracing::debug;

/// Factor group weights. Forecast deviation dominates; scheduling agreement
/// across timeframes is a light thumb on the scale.
const FORECAST_WEIGHT: f64 = 0.3;
const CANDLE_WEIGHT: f64 = 0.2;
const CHART_WEIGHT: f64 = 0.2;
const INDICATOR_WEIGHT: f64 = 0.2;
const ALIGNMENT_WEIGHT: f64 = 0.1;

/// Forecast deviation below this percentage is treated as noise.
const FORECAST_DEADBAND_PERCENT: f64 = 0.5;

pub struct DecisionEngine {
    tier: StrategyTier,
}

impl DecisionEngine {
    pub fn new(tier: StrategyTier) -> Self {
        Self { tier }
    }

    pub fn set_tier(&mut self, tier: StrategyTier) {
        self.tier = tier;
    }

    /// Produces the trading signal for one instrument on one tick.
    ///
    /// Bullish and bearish evidence accumulate independently; the net of
    /// the two normalized scores is the signal confidence, and the action
    /// only leaves HOLD when that confidence clears the tier's minimum.
    /// Every contributing factor appends a human-readable reason.
    pub fn decide(
        &self,
        prediction: &PredictionResult,
        candle_patterns: &[CandlePattern],
        chart_patterns: &[ChartPattern],
        latest: &FeatureVector,
        current_price: Decimal,
        multi_timeframe_agreement: bool,
    ) -> TradingSignal {
        let price = current_price.to_f64().unwrap_or(0.0);
        let mut reasons = Vec::new();
        let mut bullish = 0.0;
        let mut bearish = 0.0;
        let mut total_weight = 0.0;

        // Forecast deviation, scaled by how much the sub-models agreed.
        if price > 0.0 {
            let change = (prediction.predicted_price - price) / price * 100.0;
            let weight = FORECAST_WEIGHT * prediction.confidence;
            if change > FORECAST_DEADBAND_PERCENT {
                bullish += weight;
                total_weight += weight;
                reasons.push(format!(
                    "Forecast projects a {:.2}% rise (confidence {:.0}%)",
                    change,
                    prediction.confidence * 100.0
                ));
            } else if change < -FORECAST_DEADBAND_PERCENT {
                bearish += weight;
                total_weight += weight;
                reasons.push(format!(
                    "Forecast projects a {:.2}% fall (confidence {:.0}%)",
                    change.abs(),
                    prediction.confidence * 100.0
                ));
            }
        }

        // Candle patterns, each weighted by its own confidence. Neutral
        // shapes (doji) are informative but directionless and score nothing.
        for pattern in candle_patterns {
            let score = CANDLE_WEIGHT * pattern.confidence;
            match pattern.bias {
                CandleBias::Bullish => {
                    bullish += score;
                    total_weight += score;
                    reasons.push(format!("{} candle pattern (bullish)", pattern.name));
                }
                CandleBias::Bearish => {
                    bearish += score;
                    total_weight += score;
                    reasons.push(format!("{} candle pattern (bearish)", pattern.name));
                }
                CandleBias::Neutral => {}
            }
        }

        // Chart formations.
        for pattern in chart_patterns {
            let score = CHART_WEIGHT * pattern.confidence;
            total_weight += score;
            match pattern.direction {
                Direction::Bullish => {
                    bullish += score;
                    reasons.push(format!("{} chart pattern (bullish)", pattern.name));
                }
                Direction::Bearish => {
                    bearish += score;
                    reasons.push(format!("{} chart pattern (bearish)", pattern.name));
                }
            }
        }

        // Indicator basket: four sub-rules share the indicator weight.
        if latest.rsi_14 < 30.0 {
            let w = INDICATOR_WEIGHT * 0.3;
            bullish += w;
            total_weight += w;
            reasons.push(format!("RSI oversold ({:.0})", latest.rsi_14));
        } else if latest.rsi_14 > 70.0 {
            let w = INDICATOR_WEIGHT * 0.3;
            bearish += w;
            total_weight += w;
            reasons.push(format!("RSI overbought ({:.0})", latest.rsi_14));
        }

        if latest.macd > latest.macd_signal && latest.macd_histogram > 0.0 {
            let w = INDICATOR_WEIGHT * 0.3;
            bullish += w;
            total_weight += w;
            reasons.push("MACD bullish crossover".to_string());
        } else if latest.macd < latest.macd_signal && latest.macd_histogram < 0.0 {
            let w = INDICATOR_WEIGHT * 0.3;
            bearish += w;
            total_weight += w;
            reasons.push("MACD bearish crossover".to_string());
        }

        if latest.close < latest.bb_lower {
            let w = INDICATOR_WEIGHT * 0.2;
            bullish += w;
            total_weight += w;
            reasons.push("Close below lower Bollinger band".to_string());
        } else if latest.close > latest.bb_upper {
            let w = INDICATOR_WEIGHT * 0.2;
            bearish += w;
            total_weight += w;
            reasons.push("Close above upper Bollinger band".to_string());
        }

        if latest.adx_14 > 25.0 {
            let w = INDICATOR_WEIGHT * 0.2;
            total_weight += w;
            if latest.close > latest.sma_50 {
                bullish += w;
                reasons.push(format!("Strong uptrend (ADX {:.0})", latest.adx_14));
            } else {
                bearish += w;
                reasons.push(format!("Strong downtrend (ADX {:.0})", latest.adx_14));
            }
        }

        // Multi-timeframe agreement follows the higher-timeframe trend.
        if multi_timeframe_agreement {
            match latest.higher_tf_trend {
                Some(trend) if trend > 0.0 => {
                    bullish += ALIGNMENT_WEIGHT;
                    total_weight += ALIGNMENT_WEIGHT;
                    reasons.push("Multi-timeframe alignment (bullish)".to_string());
                }
                Some(trend) if trend < 0.0 => {
                    bearish += ALIGNMENT_WEIGHT;
                    total_weight += ALIGNMENT_WEIGHT;
                    reasons.push("Multi-timeframe alignment (bearish)".to_string());
                }
                _ => {}
            }
        }

        let (normalized_bullish, normalized_bearish) = if total_weight > 0.0 {
            (bullish / total_weight, bearish / total_weight)
        } else {
            (0.0, 0.0)
        };

        let net = normalized_bullish - normalized_bearish;
        let confidence = net.abs();
        let min_confidence = self.tier.min_confidence();

        let action = if confidence >= min_confidence {
            if net > 0.0 {
                SignalAction::Buy
            } else if net < 0.0 {
                SignalAction::Sell
            } else {
                SignalAction::Hold
            }
        } else {
            reasons.push(format!(
                "Confidence too low ({:.0}% < {:.0}%)",
                confidence * 100.0,
                min_confidence * 100.0
            ));
            SignalAction::Hold
        };

        debug!(?action, confidence, net, "decision");

        TradingSignal {
            action,
            confidence,
            reasons,
            entry_price: current_price,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// True when at least 70% of the supplied timeframes forecast a move
    /// beyond 0.3% from the current price in the same direction. Fewer than
    /// three timeframes never align.
    pub fn check_multi_timeframe_alignment(
        &self,
        predictions: &HashMap<Timeframe, PredictionResult>,
        current_price: f64,
    ) -> bool {
        if predictions.len() < 3 || current_price <= 0.0 {
            return false;
        }

        let mut bullish = 0usize;
        let mut bearish = 0usize;
        for prediction in predictions.values() {
            let change = (prediction.predicted_price - current_price) / current_price * 100.0;
            if change > 0.3 {
                bullish += 1;
            } else if change < -0.3 {
                bearish += 1;
            }
        }

        let threshold = (predictions.len() as f64 * 0.7).ceil() as usize;
        bullish >= threshold || bearish >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn prediction(price: f64, confidence: f64) -> PredictionResult {
        PredictionResult {
            predicted_price: price,
            model: forecast::ENSEMBLE_MODEL,
            confidence,
            timestamp: 0,
            closes_at: 0,
        }
    }

    /// A feature snapshot with every indicator rule quiet.
    fn neutral_features(close: f64) -> FeatureVector {
        FeatureVector {
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
            returns: 0.0,
            log_returns: 0.0,
            sma_20: close,
            sma_50: close,
            sma_200: close,
            ema_9: close,
            ema_21: close,
            ema_50: close,
            rsi_14: 50.0,
            macd: 0.0,
            macd_signal: 0.0,
            macd_histogram: 0.0,
            stoch_k: 50.0,
            stoch_d: 50.0,
            atr_14: 1.0,
            bb_upper: close + 2.0,
            bb_middle: close,
            bb_lower: close - 2.0,
            bb_width: 4.0,
            adx_14: 15.0,
            price_slope: 0.0,
            volume_slope: 0.0,
            volume_sma_20: 1000.0,
            high_low_range: 0.0,
            close_open_diff: 0.0,
            is_doji: false,
            is_hammer: false,
            is_engulfing: false,
            higher_tf_trend: None,
            lower_tf_volatility: None,
        }
    }

    #[test]
    fn conservative_tier_holds_below_its_threshold() {
        // A confident bullish forecast diluted by one bearish indicator
        // rule: net confidence lands near 0.71, between the medium and
        // conservative thresholds.
        let mut features = neutral_features(100.0);
        features.rsi_14 = 25.0; // bullish, 0.06
        features.macd = -1.0; // bearish crossover, 0.06
        features.macd_signal = 0.0;
        features.macd_histogram = -0.5;

        let pred = prediction(102.0, 1.0); // bullish, 0.30

        let conservative = DecisionEngine::new(StrategyTier::Conservative);
        let signal =
            conservative.decide(&pred, &[], &[], &features, dec!(100), false);
        assert!(signal.confidence > 0.65 && signal.confidence < 0.75);
        assert_eq!(signal.action, SignalAction::Hold);
        assert!(signal.reasons.iter().any(|r| r.contains("Confidence too low")));

        let aggressive = DecisionEngine::new(StrategyTier::Aggressive);
        let signal =
            aggressive.decide(&pred, &[], &[], &features, dec!(100), false);
        assert_eq!(signal.action, SignalAction::Buy);
    }

    #[test]
    fn quiet_tape_yields_hold_with_zero_confidence() {
        let engine = DecisionEngine::new(StrategyTier::Aggressive);
        let signal = engine.decide(
            &prediction(100.1, 0.8),
            &[],
            &[],
            &neutral_features(100.0),
            dec!(100),
            false,
        );
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.confidence, 0.0);
    }

    #[test]
    fn unfired_factors_do_not_dilute_the_signal() {
        // Only the forecast fires: normalized confidence must be 1,
        // regardless of how many other factor groups stayed quiet.
        let engine = DecisionEngine::new(StrategyTier::Medium);
        let signal = engine.decide(
            &prediction(103.0, 0.9),
            &[],
            &[],
            &neutral_features(100.0),
            dec!(100),
            false,
        );
        assert_eq!(signal.action, SignalAction::Buy);
        assert!((signal.confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn candle_and_chart_patterns_move_the_score() {
        let engine = DecisionEngine::new(StrategyTier::Aggressive);
        let candles = vec![CandlePattern {
            name: "Engulfing",
            bias: CandleBias::Bearish,
            confidence: 0.85,
        }];
        let charts = vec![ChartPattern {
            name: "Double Top",
            direction: Direction::Bearish,
            kind: patterns::ChartKind::Reversal,
            confidence: 0.8,
            start_index: 0,
            end_index: 10,
            target_price: None,
        }];
        let signal = engine.decide(
            &prediction(99.0, 0.9), // bearish forecast
            &candles,
            &charts,
            &neutral_features(100.0),
            dec!(100),
            false,
        );
        assert_eq!(signal.action, SignalAction::Sell);
        assert!(signal.reasons.len() >= 3);
    }

    #[test]
    fn alignment_requires_three_timeframes_and_seventy_percent() {
        let engine = DecisionEngine::new(StrategyTier::Medium);

        let mut two = HashMap::new();
        two.insert(Timeframe::H1, prediction(101.0, 0.9));
        two.insert(Timeframe::H4, prediction(101.0, 0.9));
        assert!(!engine.check_multi_timeframe_alignment(&two, 100.0));

        let mut three = HashMap::new();
        three.insert(Timeframe::M15, prediction(101.0, 0.9));
        three.insert(Timeframe::H1, prediction(100.8, 0.9));
        three.insert(Timeframe::H4, prediction(101.5, 0.9));
        assert!(engine.check_multi_timeframe_alignment(&three, 100.0));

        // Two bullish, one bearish: 2 < ceil(3 * 0.7) = 3.
        let mut split = HashMap::new();
        split.insert(Timeframe::M15, prediction(101.0, 0.9));
        split.insert(Timeframe::H1, prediction(99.0, 0.9));
        split.insert(Timeframe::H4, prediction(101.5, 0.9));
        assert!(!engine.check_multi_timeframe_alignment(&split, 100.0));
    }
}
