// In crates/ledger/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unknown trade id: {0}")]
    UnknownTrade(i64),
}

pub type Result<T> = std::result::Result<T, Error>;
