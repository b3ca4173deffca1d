//! Executor error types.

use thiserror::Error;
use trigger_core::{Amount, MarketKey};
use trigger_exchange::ExchangeError;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Order for {market} too small: {amount} (minimum {min})")]
    OrderTooSmall {
        market: MarketKey,
        amount: Amount,
        min: Amount,
    },

    #[error("Action {action} failed on {market}: {source}")]
    ActionFailed {
        action: &'static str,
        market: MarketKey,
        #[source]
        source: Box<ExecutorError>,
    },
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
