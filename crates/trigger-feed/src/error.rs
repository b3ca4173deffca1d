//! Feed error types.

use thiserror::Error;
use trigger_core::MarketKey;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Ticker fetch failed: {0}")]
    Exchange(#[from] trigger_exchange::ExchangeError),

    #[error("Ticker for {0} has no bid")]
    MissingBid(MarketKey),

    #[error("Rule evaluation failed: {0}")]
    Rules(#[from] trigger_rules::RulesError),

    #[error("Order execution failed: {0}")]
    Execution(#[from] trigger_executor::ExecutorError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl FeedError {
    /// Poll stage the error came from, for metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            FeedError::Exchange(_) | FeedError::MissingBid(_) => "ticker",
            FeedError::Rules(_) => "evaluate",
            FeedError::Execution(_) => "execute",
            FeedError::ConfigError(_) => "config",
        }
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
