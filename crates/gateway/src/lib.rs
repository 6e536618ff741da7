// In crates/gateway/src/lib.rs
//
// The exchange gateway boundary. The trading loop only ever talks to the
// `ExchangeGateway` trait; at construction the app picks the live OKX
// client or the paper simulator, and calling code cannot tell them apart.

use std::collections::HashMap;

use async_trait::async_trait;
use core_types::{OrderReceipt, PriceBar, Side, Symbol, Timeframe};
use rust_decimal::Decimal;

pub mod error;
pub mod live;
pub mod paper;

// Re-export public types
pub use error::{Error, Result};
pub use live::LiveGateway;
pub use paper::PaperGateway;

/// The collaborator operations the trading core consumes.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Historical bars, oldest first.
    async fn fetch_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PriceBar>>;

    /// Last traded price.
    async fn fetch_current_price(&self, symbol: &Symbol) -> Result<Decimal>;

    /// Available balance per currency.
    async fn fetch_balance(&self) -> Result<HashMap<String, Decimal>>;

    /// Places a market order. A `price` of `None` executes at the venue's
    /// current price; paper fills settle immediately either way.
    async fn place_order(
        &self,
        symbol: &Symbol,
        side: Side,
        amount: Decimal,
        price: Option<Decimal>,
    ) -> Result<OrderReceipt>;
}
