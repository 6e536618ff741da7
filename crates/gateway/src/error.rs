// In crates/gateway/src/error.rs

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(#[from] serde_json::Error),

    #[error("Exchange error: code {code}, msg: {msg}")]
    ApiError { code: String, msg: String },

    #[error("Malformed exchange response: {0}")]
    MalformedResponse(String),

    #[error("This endpoint requires API credentials")]
    CredentialsRequired,

    #[error("Insufficient {currency} balance: have {available}, need {required}")]
    InsufficientBalance {
        currency: String,
        available: Decimal,
        required: Decimal,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
