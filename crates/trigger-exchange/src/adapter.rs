//! Exchange adapter trait.
//!
//! Provides a trait-based abstraction over one exchange account.
//! This allows for:
//! - Dependency injection for testing (see [`crate::MockExchange`])
//! - Different transports (ccxt-rest gateway today)
//! - Sharing one handle across pollers as `Arc<dyn ExchangeAdapter>`

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use trigger_core::{Amount, ExchangeId, MarketInfo, Price, Symbol};

use crate::error::{ExchangeError, ExchangeResult};
use crate::types::{Balances, OpenOrder, OrderId, Ticker};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Market metadata keyed by symbol.
pub type Markets = Arc<HashMap<Symbol, MarketInfo>>;

/// Shared adapter handle.
pub type DynExchange = Arc<dyn ExchangeAdapter>;

/// Capability set the trading core needs from an exchange.
pub trait ExchangeAdapter: Send + Sync {
    /// Exchange this adapter is scoped to.
    fn id(&self) -> &ExchangeId;

    /// Whether API credentials were supplied (required for private calls).
    fn has_credentials(&self) -> bool;

    /// Fetch the current ticker for a symbol.
    fn fetch_ticker<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, ExchangeResult<Ticker>>;

    /// Fetch account balances.
    fn fetch_balance(&self) -> BoxFuture<'_, ExchangeResult<Balances>>;

    /// Fetch open orders for a symbol.
    fn fetch_open_orders<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, ExchangeResult<Vec<OpenOrder>>>;

    /// Cancel one order.
    fn cancel_order<'a>(
        &'a self,
        id: &'a OrderId,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, ExchangeResult<()>>;

    /// Submit a limit sell order.
    fn create_limit_sell_order<'a>(
        &'a self,
        symbol: &'a Symbol,
        amount: Amount,
        price: Price,
    ) -> BoxFuture<'a, ExchangeResult<OrderId>>;

    /// Load precision and limits for all markets.
    fn load_markets(&self) -> BoxFuture<'_, ExchangeResult<Markets>>;

    /// Metadata for one market; `MarketNotFound` if the exchange does not list it.
    fn market_info<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, ExchangeResult<MarketInfo>> {
        Box::pin(async move {
            let markets = self.load_markets().await?;
            markets
                .get(symbol)
                .cloned()
                .ok_or_else(|| ExchangeError::MarketNotFound(format!("{}:{}", self.id(), symbol)))
        })
    }
}
