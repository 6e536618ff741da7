// In crates/ledger/src/lib.rs
//
// The append-only persistence boundary. The trading loop records every
// forecast and every trade through the `Ledger` trait; write failures are
// logged by the caller and never abort a tick. Two implementations: a
// Postgres ledger and an in-memory one for paper runs without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub mod error;
pub mod memory;
pub mod pg;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use memory::MemoryLedger;
pub use pg::PgLedger;
pub use types::{PredictionRecord, TradeRecord, TradeStatus};

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn record_prediction(&self, record: &PredictionRecord) -> Result<()>;

    /// Appends an open trade and returns its ledger id.
    async fn open_trade(&self, record: &TradeRecord) -> Result<i64>;

    /// Marks a previously opened trade closed.
    async fn close_trade(
        &self,
        trade_id: i64,
        close_price: Decimal,
        profit_loss: Decimal,
        closed_at: DateTime<Utc>,
    ) -> Result<()>;
}
