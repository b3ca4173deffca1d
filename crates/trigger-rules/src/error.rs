//! Rule error types.

use thiserror::Error;
use trigger_core::{MarketKey, Price};

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("Market {0} is not configured")]
    UnknownMarket(MarketKey),

    #[error("Tick for {tick} evaluated against rules of {book}")]
    MarketMismatch { tick: MarketKey, book: MarketKey },

    #[error("Invalid tick for {market}: {reason}")]
    InvalidTick { market: MarketKey, reason: String },

    #[error("Price overflow for {market}: bid {bid} times {factor}")]
    PriceOverflow {
        market: MarketKey,
        bid: Price,
        factor: &'static str,
    },

    #[error("Invalid rule: {0}")]
    InvalidRule(#[from] trigger_core::CoreError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type RulesResult<T> = Result<T, RulesError>;
