//! Scripted in-memory exchange for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use trigger_core::{Amount, ExchangeId, MarketInfo, Price, Symbol};

use crate::adapter::{BoxFuture, ExchangeAdapter, Markets};
use crate::error::{ExchangeError, ExchangeResult};
use crate::types::{AssetBalance, Balances, OpenOrder, OrderId, Ticker};

/// A call recorded by [`MockExchange`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeCall {
    FetchTicker(Symbol),
    FetchBalance,
    FetchOpenOrders(Symbol),
    CancelOrder(OrderId),
    CreateLimitSell {
        symbol: Symbol,
        amount: Amount,
        price: Price,
    },
    LoadMarkets,
}

impl ExchangeCall {
    /// Whether the call changes account state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ExchangeCall::CancelOrder(_) | ExchangeCall::CreateLimitSell { .. }
        )
    }
}

/// Mock exchange adapter.
///
/// Tickers are served from a queue, falling back to a default ticker once
/// the queue is drained. Every call is recorded.
pub struct MockExchange {
    id: ExchangeId,
    with_credentials: bool,
    calls: Mutex<Vec<ExchangeCall>>,
    tickers: Mutex<VecDeque<Result<Ticker, String>>>,
    default_ticker: Mutex<Option<Ticker>>,
    balances: Mutex<Balances>,
    balance_error: Mutex<Option<String>>,
    open_orders: Mutex<Vec<OpenOrder>>,
    failing_cancel: Mutex<Option<OrderId>>,
    markets: Mutex<HashMap<Symbol, MarketInfo>>,
    next_order: AtomicU64,
}

impl MockExchange {
    pub fn new(id: ExchangeId, with_credentials: bool) -> Self {
        Self {
            id,
            with_credentials,
            calls: Mutex::new(Vec::new()),
            tickers: Mutex::new(VecDeque::new()),
            default_ticker: Mutex::new(None),
            balances: Mutex::new(Balances::new()),
            balance_error: Mutex::new(None),
            open_orders: Mutex::new(Vec::new()),
            failing_cancel: Mutex::new(None),
            markets: Mutex::new(HashMap::new()),
            next_order: AtomicU64::new(1),
        }
    }

    /// Queue a ticker response.
    pub fn push_ticker(&self, ticker: Ticker) {
        self.tickers.lock().push_back(Ok(ticker));
    }

    /// Queue a failing ticker response.
    pub fn push_ticker_error(&self, message: impl Into<String>) {
        self.tickers.lock().push_back(Err(message.into()));
    }

    /// Ticker returned once the queue is empty.
    pub fn set_default_ticker(&self, ticker: Ticker) {
        *self.default_ticker.lock() = Some(ticker);
    }

    pub fn set_balance(&self, asset: &str, free: Amount, total: Amount) {
        self.balances
            .lock()
            .insert(asset, AssetBalance { free, total });
    }

    /// Make every balance fetch fail.
    pub fn fail_balance(&self, message: impl Into<String>) {
        *self.balance_error.lock() = Some(message.into());
    }

    pub fn set_open_orders(&self, orders: Vec<OpenOrder>) {
        *self.open_orders.lock() = orders;
    }

    /// Reject cancellation of one order id.
    pub fn fail_cancel_on(&self, id: OrderId) {
        *self.failing_cancel.lock() = Some(id);
    }

    pub fn set_market(&self, symbol: Symbol, info: MarketInfo) {
        self.markets.lock().insert(symbol, info);
    }

    /// Get recorded calls.
    pub fn calls(&self) -> Vec<ExchangeCall> {
        self.calls.lock().clone()
    }

    /// Number of recorded cancel/create calls.
    pub fn mutation_count(&self) -> usize {
        self.calls.lock().iter().filter(|c| c.is_mutation()).count()
    }

    /// Clear recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: ExchangeCall) {
        self.calls.lock().push(call);
    }
}

impl ExchangeAdapter for MockExchange {
    fn id(&self) -> &ExchangeId {
        &self.id
    }

    fn has_credentials(&self) -> bool {
        self.with_credentials
    }

    fn fetch_ticker<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, ExchangeResult<Ticker>> {
        Box::pin(async move {
            self.record(ExchangeCall::FetchTicker(symbol.clone()));
            if let Some(next) = self.tickers.lock().pop_front() {
                return next.map_err(ExchangeError::HttpClient);
            }
            self.default_ticker
                .lock()
                .clone()
                .ok_or_else(|| ExchangeError::HttpClient(format!("no ticker scripted for {symbol}")))
        })
    }

    fn fetch_balance(&self) -> BoxFuture<'_, ExchangeResult<Balances>> {
        Box::pin(async move {
            self.record(ExchangeCall::FetchBalance);
            if let Some(message) = self.balance_error.lock().clone() {
                return Err(ExchangeError::HttpClient(message));
            }
            Ok(self.balances.lock().clone())
        })
    }

    fn fetch_open_orders<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, ExchangeResult<Vec<OpenOrder>>> {
        Box::pin(async move {
            self.record(ExchangeCall::FetchOpenOrders(symbol.clone()));
            Ok(self
                .open_orders
                .lock()
                .iter()
                .filter(|o| &o.symbol == symbol)
                .cloned()
                .collect())
        })
    }

    fn cancel_order<'a>(
        &'a self,
        id: &'a OrderId,
        _symbol: &'a Symbol,
    ) -> BoxFuture<'a, ExchangeResult<()>> {
        Box::pin(async move {
            self.record(ExchangeCall::CancelOrder(id.clone()));
            if self.failing_cancel.lock().as_ref() == Some(id) {
                return Err(ExchangeError::OrderRejected(format!("cancel {id} rejected")));
            }
            self.open_orders.lock().retain(|o| &o.id != id);
            Ok(())
        })
    }

    fn create_limit_sell_order<'a>(
        &'a self,
        symbol: &'a Symbol,
        amount: Amount,
        price: Price,
    ) -> BoxFuture<'a, ExchangeResult<OrderId>> {
        Box::pin(async move {
            self.record(ExchangeCall::CreateLimitSell {
                symbol: symbol.clone(),
                amount,
                price,
            });
            let n = self.next_order.fetch_add(1, Ordering::SeqCst);
            Ok(OrderId::new(format!("mock-{n}")))
        })
    }

    fn load_markets(&self) -> BoxFuture<'_, ExchangeResult<Markets>> {
        Box::pin(async move {
            self.record(ExchangeCall::LoadMarkets);
            Ok(Arc::new(self.markets.lock().clone()))
        })
    }
}
