//! Core domain types for the price-trigger trading bot.
//!
//! This crate provides fundamental types used throughout the trading system:
//! - `MarketKey`: Unique identifier for a polled market (exchange + symbol)
//! - `Price`, `Amount`: Precision-safe numeric types
//! - `MarketInfo`: Exchange-declared precision and minimum order size
//! - `Tick`: One price observation
//! - `Rule`, `RuleKind`, `RuleState`: Standing trigger conditions

pub mod decimal;
pub mod error;
pub mod market;
pub mod rule;
pub mod tick;

pub use decimal::{Amount, Price};
pub use error::{CoreError, Result};
pub use market::{ExchangeId, MarketInfo, MarketKey, MarketPrecision, Symbol};
pub use rule::{Rule, RuleId, RuleKind, RuleState};
pub use tick::Tick;
