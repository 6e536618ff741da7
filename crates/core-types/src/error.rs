// In crates/core-types/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Malformed symbol (expected BASE/QUOTE): {0}")]
    InvalidSymbol(String),
}

pub type Result<T> = std::result::Result<T, Error>;
