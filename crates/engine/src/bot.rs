// In crates/engine/src/bot.rs
//
// The position lifecycle controller. One recurring timer drives the tick;
// each tick walks the configured instruments strictly sequentially through
// features -> patterns -> forecast -> decision -> risk, then re-evaluates
// every open position for exit. The bot owns the open-position set and the
// forecaster's weight state; a failure in one instrument is logged and the
// rest of the tick continues.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use app_config::BotSettings;
use chrono::{DateTime, Utc};
use core_types::{OpenPosition, Side, SignalAction, Symbol, Timeframe, TradeMode, TradingSignal};
use decision::DecisionEngine;
use features::FeatureVector;
use forecast::{EnsembleForecaster, PredictionResult};
use gateway::ExchangeGateway;
use ledger::{Ledger, PredictionRecord, TradeRecord, TradeStatus};
use num_traits::{FromPrimitive, ToPrimitive};
use risk::{RiskManager, RiskPolicy};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Bars requested per timeframe: 200 warm-up plus a full forecast window
/// with room to spare, within the venue's per-request cap.
const BAR_FETCH_LIMIT: usize = 300;

/// Quote-currency floor below which no entry is attempted.
const MIN_QUOTE_BALANCE: Decimal = dec!(10);

/// An open position plus its ledger row, if the write succeeded.
struct TrackedPosition {
    position: OpenPosition,
    trade_id: Option<i64>,
}

pub struct TradingBot {
    settings: BotSettings,
    gateway: Arc<dyn ExchangeGateway>,
    ledger: Arc<dyn Ledger>,
    forecaster: EnsembleForecaster,
    decision: DecisionEngine,
    risk: RiskManager,
    open_positions: HashMap<Symbol, TrackedPosition>,
}

impl TradingBot {
    pub fn new(
        settings: BotSettings,
        gateway: Arc<dyn ExchangeGateway>,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        let decision = DecisionEngine::new(settings.strategy);
        let risk = RiskManager::new(RiskPolicy::new(
            settings.strategy,
            settings.max_risk_percentage,
        ));
        Self {
            settings,
            gateway,
            ledger,
            forecaster: EnsembleForecaster::new(),
            decision,
            risk,
            open_positions: HashMap::new(),
        }
    }

    /// Runs the trading loop until `shutdown` flips to true. The stop
    /// signal is honored at tick boundaries only; an in-flight tick always
    /// completes.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval =
            time::interval(Duration::from_secs(self.settings.tick_interval_secs.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            mode = ?self.settings.mode,
            strategy = ?self.settings.strategy,
            symbols = self.settings.symbols.len(),
            "trading loop started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                    if *shutdown.borrow() {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("trading loop stopped");
    }

    /// One full pass: every instrument, then every open position.
    async fn tick(&mut self) {
        let symbols = self.settings.symbols.clone();
        for symbol in &symbols {
            if let Err(error) = self.process_symbol(symbol).await {
                error!(symbol = %symbol.0, %error, "symbol processing failed");
            }
        }
        self.review_open_positions().await;
    }

    async fn process_symbol(&mut self, symbol: &Symbol) -> anyhow::Result<()> {
        let primary = self.settings.primary_timeframe;
        let mut timeframes = self.settings.timeframes.clone();
        if !timeframes.contains(&primary) {
            timeframes.push(primary);
        }

        let mut bars_by_tf = HashMap::new();
        for tf in &timeframes {
            let bars = self.gateway.fetch_bars(symbol, *tf, BAR_FETCH_LIMIT).await?;
            bars_by_tf.insert(*tf, bars);
        }
        let primary_bars = &bars_by_tf[&primary];

        // Enrichment comes from the nearest configured neighbors of the
        // primary timeframe, when present.
        let higher_tf = timeframes.iter().filter(|t| **t > primary).min().copied();
        let lower_tf = timeframes.iter().filter(|t| **t < primary).max().copied();

        let feature_rows = features::compute_features(
            primary_bars,
            higher_tf.and_then(|t| bars_by_tf.get(&t)).map(Vec::as_slice),
            lower_tf.and_then(|t| bars_by_tf.get(&t)).map(Vec::as_slice),
        )?;
        let normalized = features::normalize(&feature_rows);
        let latest = feature_rows
            .last()
            .ok_or_else(|| anyhow!("no feature rows past warm-up"))?;

        let current_price = self.gateway.fetch_current_price(symbol).await?;
        let price = current_price
            .to_f64()
            .ok_or_else(|| anyhow!("current price not representable as f64"))?;

        let mut predictions: HashMap<Timeframe, PredictionResult> = HashMap::new();
        for tf in &timeframes {
            let prediction = self.forecaster.predict(&normalized, price, *tf)?;
            self.record_prediction(symbol, *tf, &prediction).await;
            predictions.insert(*tf, prediction);
        }

        let candle_patterns = patterns::detect_candle_patterns(primary_bars);
        let chart_patterns = patterns::detect_chart_patterns(primary_bars);
        let alignment = self.decision.check_multi_timeframe_alignment(&predictions, price);

        let signal = self.decision.decide(
            &predictions[&primary],
            &candle_patterns,
            &chart_patterns,
            latest,
            current_price,
            alignment,
        );

        info!(
            symbol = %symbol.0,
            action = ?signal.action,
            confidence = format!("{:.0}%", signal.confidence * 100.0),
            "signal"
        );
        for reason in &signal.reasons {
            debug!(symbol = %symbol.0, reason, "signal factor");
        }

        // One position per instrument; an open one rides until it exits.
        if signal.action != SignalAction::Hold && !self.open_positions.contains_key(symbol) {
            self.try_enter(symbol, &signal, latest, current_price).await?;
        }

        // Online learning: replay recent windows against the realized
        // close anchors.
        let targets: Vec<f64> = normalized.iter().map(|n| n.close()).collect();
        self.forecaster.train_on_history(&normalized, &targets);

        Ok(())
    }

    /// Attempts to open a position for a non-HOLD signal. Balance shortage,
    /// risk-gate refusal and the exposure cap all end the attempt quietly;
    /// only infrastructure failures propagate.
    async fn try_enter(
        &mut self,
        symbol: &Symbol,
        signal: &TradingSignal,
        latest: &FeatureVector,
        current_price: Decimal,
    ) -> anyhow::Result<()> {
        let balances = self.gateway.fetch_balance().await?;
        let quote = symbol.quote().to_string();
        let available = balances.get(&quote).copied().unwrap_or(Decimal::ZERO);
        if available < MIN_QUOTE_BALANCE {
            warn!(symbol = %symbol.0, %available, quote, "balance too low to trade");
            return Ok(());
        }

        let volatility = Decimal::from_f64(latest.atr_14).unwrap_or(Decimal::ZERO);
        let sizing = match self.risk.size_position(
            available,
            current_price,
            volatility,
            signal.confidence,
        ) {
            Ok(sizing) => sizing,
            Err(risk::Error::InvalidVolatility(_)) => {
                debug!(symbol = %symbol.0, "volatility too flat to size a position");
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };

        let price = current_price.to_f64().unwrap_or(0.0);
        let normalized_volatility = if price > 0.0 { latest.atr_14 / price } else { 0.0 };
        let trend_strength = latest.adx_14 / 100.0;
        if !self.risk.should_enter(signal.confidence, normalized_volatility, trend_strength) {
            debug!(symbol = %symbol.0, "entry gate refused the signal");
            return Ok(());
        }

        // Advisory exposure cap, enforced here rather than in the risk
        // manager.
        let committed: Decimal = self
            .open_positions
            .values()
            .map(|t| t.position.entry_price * t.position.amount)
            .sum();
        let planned_cost = sizing.amount * current_price;
        let cap = self.risk.max_exposure(available + committed);
        if committed + planned_cost > cap {
            warn!(
                symbol = %symbol.0,
                %committed,
                %planned_cost,
                %cap,
                "exposure cap reached, skipping entry"
            );
            return Ok(());
        }

        let side = match signal.action {
            SignalAction::Buy => Side::Buy,
            SignalAction::Sell => Side::Sell,
            SignalAction::Hold => return Ok(()),
        };

        let receipt = match self
            .gateway
            .place_order(symbol, side, sizing.amount, Some(current_price))
            .await
        {
            Ok(receipt) => receipt,
            Err(gateway::Error::InsufficientBalance { currency, available, required }) => {
                warn!(
                    symbol = %symbol.0,
                    currency,
                    %available,
                    %required,
                    "order rejected for insufficient balance"
                );
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };

        info!(
            symbol = %symbol.0,
            side = side.as_str(),
            amount = %sizing.amount,
            stop_loss = %sizing.stop_loss_price,
            take_profit = %sizing.take_profit_price,
            "position opened"
        );

        let record = TradeRecord {
            symbol: symbol.clone(),
            side,
            price: current_price,
            amount: sizing.amount,
            mode: if self.settings.mode.executes_on_paper() {
                TradeMode::Paper
            } else {
                TradeMode::Live
            },
            status: TradeStatus::Open,
            close_price: None,
            profit_loss: None,
            created_at: Utc::now(),
            closed_at: None,
        };
        let trade_id = match self.ledger.open_trade(&record).await {
            Ok(id) => Some(id),
            Err(error) => {
                warn!(%error, "failed to record trade open");
                None
            }
        };

        self.open_positions.insert(
            symbol.clone(),
            TrackedPosition {
                position: OpenPosition {
                    symbol: symbol.clone(),
                    side,
                    entry_price: current_price,
                    amount: sizing.amount,
                    stop_loss_price: sizing.stop_loss_price,
                    take_profit_price: sizing.take_profit_price,
                    highest_price: current_price,
                    receipt,
                },
                trade_id,
            },
        );

        Ok(())
    }

    /// Walks every open position: ratchets the running high, then applies
    /// the exit rules. Each position's failure is isolated.
    async fn review_open_positions(&mut self) {
        let symbols: Vec<Symbol> = self.open_positions.keys().cloned().collect();
        for symbol in symbols {
            if let Err(error) = self.review_position(&symbol).await {
                error!(symbol = %symbol.0, %error, "position review failed");
            }
        }
    }

    async fn review_position(&mut self, symbol: &Symbol) -> anyhow::Result<()> {
        let current_price = self.gateway.fetch_current_price(symbol).await?;

        let (entry_price, highest_price, stop_loss_price, amount, side) = {
            let Some(tracked) = self.open_positions.get_mut(symbol) else {
                return Ok(());
            };
            if current_price > tracked.position.highest_price {
                tracked.position.highest_price = current_price;
            }
            let p = &tracked.position;
            (p.entry_price, p.highest_price, p.stop_loss_price, p.amount, p.side)
        };

        let Some(reason) =
            self.risk.should_exit(entry_price, current_price, highest_price, stop_loss_price)
        else {
            return Ok(());
        };

        self.gateway
            .place_order(symbol, side.opposite(), amount, Some(current_price))
            .await?;

        let profit_loss = match side {
            Side::Buy => (current_price - entry_price) * amount,
            Side::Sell => (entry_price - current_price) * amount,
        };
        info!(
            symbol = %symbol.0,
            reason = reason.as_str(),
            profit_loss = %profit_loss,
            "position closed"
        );

        if let Some(tracked) = self.open_positions.remove(symbol) {
            if let Some(trade_id) = tracked.trade_id {
                if let Err(error) = self
                    .ledger
                    .close_trade(trade_id, current_price, profit_loss, Utc::now())
                    .await
                {
                    warn!(%error, "failed to record trade close");
                }
            }
        }

        Ok(())
    }

    /// Ledger writes are best effort; a failed write never stops the tick.
    async fn record_prediction(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        prediction: &PredictionResult,
    ) {
        let record = PredictionRecord {
            symbol: symbol.clone(),
            timeframe,
            predicted_price: prediction.predicted_price,
            model: prediction.model.to_string(),
            confidence: prediction.confidence,
            created_at: DateTime::from_timestamp_millis(prediction.timestamp)
                .unwrap_or_else(Utc::now),
            closes_at: DateTime::from_timestamp_millis(prediction.closes_at)
                .unwrap_or_else(Utc::now),
        };
        if let Err(error) = self.ledger.record_prediction(&record).await {
            warn!(symbol = %symbol.0, %error, "failed to record prediction");
        }
    }

    /// Count of currently open positions, primarily for status reporting.
    pub fn open_position_count(&self) -> usize {
        self.open_positions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_types::{OrderReceipt, PriceBar, StrategyTier};
    use gateway::Result as GatewayResult;
    use ledger::MemoryLedger;
    use tokio::sync::Mutex;

    struct MockGateway {
        price: Mutex<Decimal>,
        balances: HashMap<String, Decimal>,
        orders: Mutex<Vec<(Side, Decimal, Decimal)>>,
    }

    impl MockGateway {
        fn new(price: Decimal, quote_balance: Decimal) -> Self {
            let mut balances = HashMap::new();
            balances.insert("USDT".to_string(), quote_balance);
            Self {
                price: Mutex::new(price),
                balances,
                orders: Mutex::new(Vec::new()),
            }
        }

        async fn set_price(&self, price: Decimal) {
            *self.price.lock().await = price;
        }
    }

    #[async_trait]
    impl ExchangeGateway for MockGateway {
        async fn fetch_bars(
            &self,
            _: &Symbol,
            _: Timeframe,
            _: usize,
        ) -> GatewayResult<Vec<PriceBar>> {
            Ok(Vec::new())
        }

        async fn fetch_current_price(&self, _: &Symbol) -> GatewayResult<Decimal> {
            Ok(*self.price.lock().await)
        }

        async fn fetch_balance(&self) -> GatewayResult<HashMap<String, Decimal>> {
            Ok(self.balances.clone())
        }

        async fn place_order(
            &self,
            symbol: &Symbol,
            side: Side,
            amount: Decimal,
            price: Option<Decimal>,
        ) -> GatewayResult<OrderReceipt> {
            let fill = price.unwrap_or(*self.price.lock().await);
            self.orders.lock().await.push((side, amount, fill));
            Ok(OrderReceipt {
                order_id: "MOCK-1".to_string(),
                symbol: symbol.clone(),
                side,
                amount,
                price: fill,
                cost: amount * fill,
                timestamp: 0,
                paper: true,
            })
        }
    }

    fn settings() -> BotSettings {
        BotSettings {
            mode: TradeMode::Paper,
            strategy: StrategyTier::Medium,
            max_risk_percentage: 2.0,
            symbols: vec![Symbol("BTC/USDT".to_string())],
            timeframes: vec![Timeframe::M15, Timeframe::H1, Timeframe::H4],
            primary_timeframe: Timeframe::H1,
            tick_interval_secs: 60,
            paper_initial_balance: dec!(10000),
        }
    }

    fn receipt(symbol: &Symbol, price: Decimal, amount: Decimal) -> OrderReceipt {
        OrderReceipt {
            order_id: "T-1".to_string(),
            symbol: symbol.clone(),
            side: Side::Buy,
            amount,
            price,
            cost: amount * price,
            timestamp: 0,
            paper: true,
        }
    }

    async fn bot_with_open_position(
        gateway: Arc<MockGateway>,
        ledger: Arc<MemoryLedger>,
        entry: Decimal,
        stop: Decimal,
    ) -> TradingBot {
        let symbol = Symbol("BTC/USDT".to_string());
        let trade_id = ledger
            .open_trade(&TradeRecord {
                symbol: symbol.clone(),
                side: Side::Buy,
                price: entry,
                amount: dec!(1),
                mode: TradeMode::Paper,
                status: TradeStatus::Open,
                close_price: None,
                profit_loss: None,
                created_at: Utc::now(),
                closed_at: None,
            })
            .await
            .unwrap();

        let mut bot = TradingBot::new(settings(), gateway, ledger);
        bot.open_positions.insert(
            symbol.clone(),
            TrackedPosition {
                position: OpenPosition {
                    symbol: symbol.clone(),
                    side: Side::Buy,
                    entry_price: entry,
                    amount: dec!(1),
                    stop_loss_price: stop,
                    take_profit_price: entry * dec!(1.1),
                    highest_price: entry,
                    receipt: receipt(&symbol, entry, dec!(1)),
                },
                trade_id: Some(trade_id),
            },
        );
        bot
    }

    #[tokio::test]
    async fn stop_loss_closes_and_records_the_trade() {
        let gateway = Arc::new(MockGateway::new(dec!(94), dec!(10000)));
        let ledger = Arc::new(MemoryLedger::new());
        let mut bot =
            bot_with_open_position(gateway.clone(), ledger.clone(), dec!(100), dec!(95)).await;

        bot.review_open_positions().await;

        assert_eq!(bot.open_position_count(), 0);
        let orders = gateway.orders.lock().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0], (Side::Sell, dec!(1), dec!(94)));

        let trades = ledger.trades().await;
        assert_eq!(trades[0].1.status, TradeStatus::Closed);
        assert_eq!(trades[0].1.profit_loss, Some(dec!(-6)));
    }

    #[tokio::test]
    async fn running_high_ratchets_before_the_trailing_stop_fires() {
        let gateway = Arc::new(MockGateway::new(dec!(110), dec!(10000)));
        let ledger = Arc::new(MemoryLedger::new());
        let mut bot =
            bot_with_open_position(gateway.clone(), ledger.clone(), dec!(100), dec!(90)).await;

        // Fresh high, no pullback: position stays open with the new high.
        bot.review_open_positions().await;
        assert_eq!(bot.open_position_count(), 1);

        // 3.6% off the 110 high with +6% profit: trailing stop (2% tier).
        gateway.set_price(dec!(106)).await;
        bot.review_open_positions().await;
        assert_eq!(bot.open_position_count(), 0);

        let trades = ledger.trades().await;
        assert_eq!(trades[0].1.profit_loss, Some(dec!(6)));
    }

    #[tokio::test]
    async fn entry_is_skipped_when_the_quote_balance_is_dust() {
        let gateway = Arc::new(MockGateway::new(dec!(100), dec!(5)));
        let ledger = Arc::new(MemoryLedger::new());
        let mut bot = TradingBot::new(settings(), gateway.clone(), ledger);

        let symbol = Symbol("BTC/USDT".to_string());
        let signal = TradingSignal {
            action: SignalAction::Buy,
            confidence: 0.9,
            reasons: Vec::new(),
            entry_price: dec!(100),
            timestamp: 0,
        };
        let latest = neutral_features(100.0);

        bot.try_enter(&symbol, &signal, &latest, dec!(100)).await.unwrap();

        assert_eq!(bot.open_position_count(), 0);
        assert!(gateway.orders.lock().await.is_empty());
    }

    #[tokio::test]
    async fn entry_opens_and_tracks_a_position() {
        let gateway = Arc::new(MockGateway::new(dec!(100), dec!(10000)));
        let ledger = Arc::new(MemoryLedger::new());
        let mut bot = TradingBot::new(settings(), gateway.clone(), ledger.clone());

        let symbol = Symbol("BTC/USDT".to_string());
        let signal = TradingSignal {
            action: SignalAction::Buy,
            confidence: 0.9,
            reasons: Vec::new(),
            entry_price: dec!(100),
            timestamp: 0,
        };
        // ATR 2 on a 100 price: 2% normalized volatility, ADX 60 gives
        // trend strength 0.6, both inside the medium tier's gate.
        let mut latest = neutral_features(100.0);
        latest.atr_14 = 2.0;
        latest.adx_14 = 60.0;

        bot.try_enter(&symbol, &signal, &latest, dec!(100)).await.unwrap();

        assert_eq!(bot.open_position_count(), 1);
        let orders = gateway.orders.lock().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].0, Side::Buy);
        // Medium tier, 2% base risk, 0.9 confidence on a 10k balance:
        // 180 at risk over a 4-point stop distance.
        assert_eq!(orders[0].1, dec!(45));

        let trades = ledger.trades().await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].1.status, TradeStatus::Open);
    }

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
}
