//! Exchange connectivity for the trigger bot.
//!
//! The trading core depends on exchanges only through the
//! [`ExchangeAdapter`] trait. This crate provides:
//!
//! - [`ExchangeAdapter`]: dyn-compatible async capability (ticker, balance,
//!   open orders, cancel, limit sell, market metadata)
//! - [`CcxtRestExchange`]: HTTP adapter for a ccxt-rest style gateway
//! - [`MockExchange`]: scripted adapter recording every call, for tests
//! - [`Credentials`]: `APIKEY_<exchange>` / `APISECRET_<exchange>` lookup
//! - [`RateLimiter`]: process-wide minimum interval between requests

pub mod adapter;
pub mod ccxt_rest;
pub mod credentials;
pub mod error;
pub mod mock;
pub mod rate_limiter;
pub mod types;

pub use adapter::{BoxFuture, DynExchange, ExchangeAdapter, Markets};
pub use ccxt_rest::{CcxtRestConfig, CcxtRestExchange};
pub use credentials::Credentials;
pub use error::{ExchangeError, ExchangeResult};
pub use mock::{ExchangeCall, MockExchange};
pub use rate_limiter::RateLimiter;
pub use types::{AssetBalance, Balances, OpenOrder, OrderId, Ticker};
