// In crates/ledger/src/pg.rs
//
// Postgres-backed ledger. Queries are built at runtime so the crate
// compiles without a live database; the schema is created on connect if it
// does not already exist.

use app_config::DatabaseSettings;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use crate::types::{PredictionRecord, TradeRecord};
use crate::{Error, Ledger, Result};

#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Establishes the connection pool and ensures the schema exists.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&settings.url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id BIGSERIAL PRIMARY KEY,
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                predicted_price DOUBLE PRECISION NOT NULL,
                model TEXT NOT NULL,
                confidence DOUBLE PRECISION NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                closes_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id BIGSERIAL PRIMARY KEY,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                price NUMERIC NOT NULL,
                amount NUMERIC NOT NULL,
                mode TEXT NOT NULL,
                status TEXT NOT NULL,
                close_price NUMERIC,
                profit_loss NUMERIC,
                created_at TIMESTAMPTZ NOT NULL,
                closed_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&pool)
        .await?;

        debug!("ledger schema is in place");
        Ok(Self { pool })
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn record_prediction(&self, record: &PredictionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO predictions
                (symbol, timeframe, predicted_price, model, confidence, created_at, closes_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.symbol.0)
        .bind(record.timeframe.as_str())
        .bind(record.predicted_price)
        .bind(&record.model)
        .bind(record.confidence)
        .bind(record.created_at)
        .bind(record.closes_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn open_trade(&self, record: &TradeRecord) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO trades
                (symbol, side, price, amount, mode, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&record.symbol.0)
        .bind(record.side.as_str())
        .bind(record.price)
        .bind(record.amount)
        .bind(format!("{:?}", record.mode).to_uppercase())
        .bind(record.status.as_str())
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("id"))
    }

    async fn close_trade(
        &self,
        trade_id: i64,
        close_price: Decimal,
        profit_loss: Decimal,
        closed_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE trades
            SET status = 'CLOSED', close_price = $2, profit_loss = $3, closed_at = $4
            WHERE id = $1
            "#,
        )
        .bind(trade_id)
        .bind(close_price)
        .bind(profit_loss)
        .bind(closed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(trade_id, "close requested for a trade the ledger has no row for");
            return Err(Error::UnknownTrade(trade_id));
        }
        Ok(())
    }
}
