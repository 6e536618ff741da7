// In crates/core-types/src/types.rs

use crate::error::Error;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A trading pair in `BASE/QUOTE` notation, e.g. "BTC/USDT".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    /// Validates `BASE/QUOTE` notation. Config deserialization accepts any
    /// string, so startup validation goes through here.
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s.split_once('/') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() => {
                Ok(Symbol(s.to_string()))
            }
            _ => Err(Error::InvalidSymbol(s.to_string())),
        }
    }

    /// The base currency (the asset being bought or sold).
    pub fn base(&self) -> &str {
        self.0.split_once('/').map(|(b, _)| b).unwrap_or(&self.0)
    }

    /// The quote currency (the asset positions are priced in).
    pub fn quote(&self) -> &str {
        self.0.split_once('/').map(|(_, q)| q).unwrap_or("USDT")
    }

    /// The exchange instrument id, e.g. "BTC-USDT" for OKX.
    pub fn inst_id(&self) -> String {
        self.0.replace('/', "-")
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A sampling granularity for price bars.
///
/// Variant order doubles as duration order, so `Timeframe` derives `Ord` and
/// the engine can pick the nearest higher/lower configured timeframe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    /// The OKX "bar" query parameter for this timeframe.
    pub fn okx_bar(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1H",
            Timeframe::H4 => "4H",
            Timeframe::D1 => "1D",
        }
    }

    /// Duration of one bar in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        match self {
            Timeframe::M1 => 60_000,
            Timeframe::M5 => 5 * 60_000,
            Timeframe::M15 => 15 * 60_000,
            Timeframe::H1 => 60 * 60_000,
            Timeframe::H4 => 4 * 60 * 60_000,
            Timeframe::D1 => 24 * 60 * 60_000,
        }
    }
}

impl std::str::FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(Error::InvalidTimeframe(other.to_string())),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.as_str().to_string()
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One OHLCV observation. Immutable once retrieved; sequences are ordered
/// oldest-first (index 0 is the oldest bar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// The direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// What the decision engine wants done with an instrument right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

/// The risk appetite the bot is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyTier {
    Aggressive,
    Medium,
    Conservative,
}

impl StrategyTier {
    /// The minimum decision confidence required to act on a signal.
    /// Shared between the decision engine and the risk manager's entry gate.
    pub fn min_confidence(&self) -> f64 {
        match self {
            StrategyTier::Aggressive => 0.55,
            StrategyTier::Medium => 0.65,
            StrategyTier::Conservative => 0.75,
        }
    }
}

/// Whether orders hit the live venue, a virtual balance, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeMode {
    Live,
    Paper,
    Both,
}

impl TradeMode {
    /// BOTH trades on the paper gateway while consuming live market data,
    /// matching the original dual-client behaviour.
    pub fn executes_on_paper(&self) -> bool {
        matches!(self, TradeMode::Paper | TradeMode::Both)
    }
}

/// The fully-formed output of the decision engine for one instrument/tick.
#[derive(Debug, Clone, Serialize)]
pub struct TradingSignal {
    pub action: SignalAction,
    /// Absolute net factor score, in [0, 1].
    pub confidence: f64,
    /// Human-readable audit trail of every factor that fired.
    pub reasons: Vec<String>,
    pub entry_price: Decimal,
    pub timestamp: i64,
}

/// Confirmation returned by the exchange gateway after an order settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub amount: Decimal,
    pub price: Decimal,
    pub cost: Decimal,
    pub timestamp: i64,
    pub paper: bool,
}

/// A live position owned by the lifecycle controller.
///
/// `highest_price` is updated monotonically on every tick while the position
/// is open; the trailing stop measures drawdown from it.
#[derive(Debug, Clone, Serialize)]
pub struct OpenPosition {
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: Decimal,
    pub amount: Decimal,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Decimal,
    pub highest_price: Decimal,
    pub receipt: OrderReceipt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_splits_base_and_quote() {
        let s = Symbol("BTC/USDT".to_string());
        assert_eq!(s.base(), "BTC");
        assert_eq!(s.quote(), "USDT");
        assert_eq!(s.inst_id(), "BTC-USDT");
    }

    #[test]
    fn symbol_parse_rejects_malformed_pairs() {
        assert_eq!(Symbol::parse("ETH/USDT").unwrap(), Symbol("ETH/USDT".to_string()));
        for bad in ["BTCUSDT", "BTC/", "/USDT", ""] {
            assert!(matches!(Symbol::parse(bad), Err(Error::InvalidSymbol(_))));
        }
    }

    #[test]
    fn timeframe_parses_and_orders_by_duration() {
        let tf: Timeframe = "4h".parse().unwrap();
        assert_eq!(tf, Timeframe::H4);
        assert!(Timeframe::M15 < Timeframe::H1);
        assert!(Timeframe::H4 > Timeframe::H1);
        assert!("3w".parse::<Timeframe>().is_err());
    }
}
