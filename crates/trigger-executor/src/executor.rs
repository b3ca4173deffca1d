//! Order action executor.

use tracing::{debug, info, warn};
use trigger_core::{Amount, MarketKey, Price};
use trigger_exchange::{DynExchange, ExchangeAdapter, OrderId};
use trigger_rules::{Firing, OrderAction};
use trigger_telemetry::Metrics;

use crate::error::{ExecutorError, ExecutorResult};
use crate::gate::ExecutionGate;
use crate::sizing::{prepare_order, sell_amount};

/// Outcome of executing one firing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionReport {
    /// Whether the actions reached the exchange.
    pub live: bool,
    /// Orders cancelled.
    pub cancelled: usize,
    /// Orders placed.
    pub placed: Vec<OrderId>,
}

/// Runs the order actions of fired rules against one exchange.
pub struct OrderActionExecutor {
    exchange: DynExchange,
    gate: ExecutionGate,
}

impl OrderActionExecutor {
    pub fn new(exchange: DynExchange, gate: ExecutionGate) -> Self {
        Self { exchange, gate }
    }

    pub fn gate(&self) -> &ExecutionGate {
        &self.gate
    }

    /// Execute a firing's actions in order.
    ///
    /// The first failing action aborts the rest.
    pub async fn execute(&self, firing: &Firing) -> ExecutorResult<ExecutionReport> {
        let mut report = ExecutionReport {
            live: self.gate.is_live(),
            ..Default::default()
        };

        for action in &firing.actions {
            let result = match action {
                OrderAction::CancelOpenOrders => self
                    .cancel_open_orders(&firing.market)
                    .await
                    .map(|n| report.cancelled += n),
                OrderAction::PlaceMoonOrder { price } => self
                    .place_moon_order(&firing.market, *price)
                    .await
                    .map(|id| report.placed.extend(id)),
                OrderAction::MarketSell { price, amount } => self
                    .market_sell(&firing.market, *price, *amount)
                    .await
                    .map(|id| report.placed.extend(id)),
            };

            if let Err(e) = result {
                Metrics::order_action_failed(action.label());
                warn!(
                    market = %firing.market,
                    rule = %firing.rule_id,
                    action = action.label(),
                    error = %e,
                    "Order action failed, skipping remaining actions"
                );
                return Err(ExecutorError::ActionFailed {
                    action: action.label(),
                    market: firing.market.clone(),
                    source: Box::new(e),
                });
            }
        }

        Ok(report)
    }

    /// Cancel every open order on the market. Returns the number cancelled.
    pub async fn cancel_open_orders(&self, market: &MarketKey) -> ExecutorResult<usize> {
        if let Some(reason) = self.gate.closed_reason() {
            info!(%market, reason, "Would cancel open orders");
            Metrics::order_action("cancel", false);
            return Ok(0);
        }

        let orders = self.exchange.fetch_open_orders(&market.symbol).await?;
        for order in &orders {
            self.exchange.cancel_order(&order.id, &market.symbol).await?;
            debug!(%market, order_id = %order.id, "Cancelled order");
        }
        Metrics::order_action("cancel", true);
        info!(%market, cancelled = orders.len(), "Open orders cancelled");
        Ok(orders.len())
    }

    /// Place a take-profit limit sell of the whole free balance.
    pub async fn place_moon_order(
        &self,
        market: &MarketKey,
        price: Price,
    ) -> ExecutorResult<Option<OrderId>> {
        if let Some(reason) = self.gate.closed_reason() {
            info!(%market, %price, reason, "Would place moon order for free balance");
            Metrics::order_action("moon", false);
            return Ok(None);
        }

        let info = self.exchange.market_info(&market.symbol).await?;
        let free = self.free_balance(market).await?;
        let (amount, price) = prepare_order(market, &info, free, price)?;

        let id = self
            .exchange
            .create_limit_sell_order(&market.symbol, amount, price)
            .await?;
        Metrics::order_action("moon", true);
        info!(%market, %amount, %price, order_id = %id, "Moon order placed");
        Ok(Some(id))
    }

    /// Sell aggressively at `price` (already discounted from the bid).
    pub async fn market_sell(
        &self,
        market: &MarketKey,
        price: Price,
        capped: Option<Amount>,
    ) -> ExecutorResult<Option<OrderId>> {
        if let Some(reason) = self.gate.closed_reason() {
            match capped {
                Some(amount) => info!(%market, %price, %amount, reason, "Would market sell"),
                None => info!(%market, %price, reason, "Would market sell free balance"),
            }
            Metrics::order_action("market_sell", false);
            return Ok(None);
        }

        let info = self.exchange.market_info(&market.symbol).await?;
        let free = self.free_balance(market).await?;
        let amount = sell_amount(free, capped, info.min_amount_or_zero());
        let (amount, price) = prepare_order(market, &info, amount, price)?;

        let id = self
            .exchange
            .create_limit_sell_order(&market.symbol, amount, price)
            .await?;
        Metrics::order_action("market_sell", true);
        info!(%market, %amount, %price, order_id = %id, "Market sell placed");
        Ok(Some(id))
    }

    async fn free_balance(&self, market: &MarketKey) -> ExecutorResult<Amount> {
        let balances = self.exchange.fetch_balance().await?;
        Ok(balances.asset(market.symbol.base())?.free)
    }
}
