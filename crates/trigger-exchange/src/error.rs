//! Exchange error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Asset not found in balance: {0}")]
    AssetNotFound(String),

    #[error("Market not found: {0}")]
    MarketNotFound(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Missing credentials for exchange {0}")]
    MissingCredentials(String),

    #[error("Invalid domain value: {0}")]
    Core(#[from] trigger_core::CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;
