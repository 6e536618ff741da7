use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::types::{PredictionRecord, TradeRecord, TradeStatus};
use crate::{Error, Ledger, Result};

/// Keeps the ledger in process memory. Used when no database is configured
/// and in tests.
#[derive(Default)]
pub struct MemoryLedger {
    predictions: Mutex<Vec<PredictionRecord>>,
    trades: Mutex<Vec<(i64, TradeRecord)>>,
    next_id: AtomicI64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn predictions(&self) -> Vec<PredictionRecord> {
        self.predictions.lock().await.clone()
    }

    pub async fn trades(&self) -> Vec<(i64, TradeRecord)> {
        self.trades.lock().await.clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn record_prediction(&self, record: &PredictionRecord) -> Result<()> {
        self.predictions.lock().await.push(record.clone());
        Ok(())
    }

    async fn open_trade(&self, record: &TradeRecord) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.trades.lock().await.push((id, record.clone()));
        Ok(id)
    }

    async fn close_trade(
        &self,
        trade_id: i64,
        close_price: Decimal,
        profit_loss: Decimal,
        closed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut trades = self.trades.lock().await;
        let entry = trades
            .iter_mut()
            .find(|(id, _)| *id == trade_id)
            .ok_or(Error::UnknownTrade(trade_id))?;
        entry.1.status = TradeStatus::Closed;
        entry.1.close_price = Some(close_price);
        entry.1.profit_loss = Some(profit_loss);
        entry.1.closed_at = Some(closed_at);
        Ok(())
    }
}
