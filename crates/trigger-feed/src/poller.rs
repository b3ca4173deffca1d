//! Per-market polling loop.
//!
//! Each iteration:
//! 1. Wait for a slot on the shared rate limiter
//! 2. Every `balance_check_every` iterations, run the balance check and stop
//!    for good if the base asset is gone
//! 3. Fetch the ticker and record it on the board
//! 4. Evaluate the market's rules and execute the firings in order
//! 5. Re-sort the rules by descending percent
//!
//! Errors in steps 3-4 are logged and counted; the loop carries on.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use trigger_core::{MarketKey, Tick};
use trigger_exchange::{DynExchange, ExchangeAdapter, RateLimiter};
use trigger_executor::{check_balance, OrderActionExecutor};
use trigger_rules::{RuleEvaluator, SharedBook};
use trigger_telemetry::Metrics;

use crate::board::TickerBoard;
use crate::error::{FeedError, FeedResult};

/// Poller pacing and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Run the balance check on every n-th iteration.
    #[serde(default = "default_balance_check_every")]
    pub balance_check_every: u64,
    /// Iterations before a poller retires.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
}

fn default_balance_check_every() -> u64 {
    13
}

fn default_max_iterations() -> u64 {
    900_000
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            balance_check_every: default_balance_check_every(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl PollerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.balance_check_every == 0 {
            return Err("balance_check_every must be at least 1".to_string());
        }
        if self.max_iterations == 0 {
            return Err("max_iterations must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Why a poller stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerExit {
    /// The balance check found no base asset.
    BalanceExhausted,
    /// `max_iterations` reached.
    IterationCap,
    /// Process shutdown requested.
    Shutdown,
}

impl PollerExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollerExit::BalanceExhausted => "balance_exhausted",
            PollerExit::IterationCap => "iteration_cap",
            PollerExit::Shutdown => "shutdown",
        }
    }
}

/// Result of one successful poll.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub tick: Tick,
    /// Rules that fired on this tick.
    pub fired: usize,
}

/// Polling task for one market.
pub struct MarketPoller {
    market: MarketKey,
    exchange: DynExchange,
    limiter: Arc<RateLimiter>,
    board: Arc<TickerBoard>,
    book: SharedBook,
    evaluator: Arc<RuleEvaluator>,
    executor: Arc<OrderActionExecutor>,
    config: PollerConfig,
    shutdown: watch::Receiver<bool>,
}

impl MarketPoller {
    /// Create a poller.
    ///
    /// `exchange` and `executor` must serve the market's exchange and `book`
    /// must be the market's own partition.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market: MarketKey,
        exchange: DynExchange,
        limiter: Arc<RateLimiter>,
        board: Arc<TickerBoard>,
        book: SharedBook,
        evaluator: Arc<RuleEvaluator>,
        executor: Arc<OrderActionExecutor>,
        config: PollerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> FeedResult<Self> {
        if exchange.id() != &market.exchange {
            return Err(FeedError::ConfigError(format!(
                "adapter for {} cannot poll {market}",
                exchange.id()
            )));
        }
        if book.read().market() != &market {
            return Err(FeedError::ConfigError(format!(
                "rule partition of {} handed to poller of {market}",
                book.read().market()
            )));
        }
        config.validate().map_err(FeedError::ConfigError)?;

        Ok(Self {
            market,
            exchange,
            limiter,
            board,
            book,
            evaluator,
            executor,
            config,
            shutdown,
        })
    }

    pub fn market(&self) -> &MarketKey {
        &self.market
    }

    /// Run until the balance is gone, the iteration cap is hit or shutdown.
    pub async fn run(mut self) -> PollerExit {
        info!(market = %self.market, "Poller started");
        Metrics::poller_started();

        let exit = self.run_loop().await;

        Metrics::poller_exited(exit.as_str());
        info!(market = %self.market, reason = exit.as_str(), "Poller stopped");
        exit
    }

    async fn run_loop(&mut self) -> PollerExit {
        let market_label = self.market.to_string();

        for iteration in 1..=self.config.max_iterations {
            let wait_start = Instant::now();
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => return PollerExit::Shutdown,
                _ = self.limiter.acquire() => {}
            }
            Metrics::rate_limit_wait(wait_start.elapsed().as_secs_f64() * 1000.0);

            if iteration % self.config.balance_check_every == 0
                && !check_balance(
                    self.exchange.as_ref(),
                    self.executor.gate(),
                    &self.market,
                )
                .await
            {
                return PollerExit::BalanceExhausted;
            }

            if let Err(e) = self.poll_once(iteration).await {
                Metrics::poll_error(&market_label, e.stage());
                warn!(
                    exchange = %self.market.exchange,
                    symbol = %self.market.symbol,
                    iteration,
                    error = %e,
                    "Poll iteration failed"
                );
            }
        }

        PollerExit::IterationCap
    }

    /// Fetch, record, evaluate and execute once.
    pub async fn poll_once(&self, iteration: u64) -> FeedResult<PollOutcome> {
        let ticker = self.exchange.fetch_ticker(&self.market.symbol).await?;
        let bid = ticker
            .bid
            .ok_or_else(|| FeedError::MissingBid(self.market.clone()))?;
        let tick = Tick {
            market: self.market.clone(),
            bid,
            ask: ticker.ask,
            last: ticker.last,
            datetime: ticker.datetime,
            iteration,
            received_at: Utc::now(),
        };
        self.board.upsert(tick.clone());
        Metrics::tick_received(&self.market.to_string(), bid.inner().to_f64().unwrap_or(0.0));

        let evaluation = {
            let mut book = self.book.write();
            self.evaluator.evaluate(&mut book, &tick)?
        };

        let mut result = Ok(());
        for firing in &evaluation.firings {
            match self.executor.execute(firing).await {
                Ok(report) => {
                    let mut book = self.book.write();
                    self.evaluator.settle(&mut book, firing, report.live);
                }
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        self.book.write().sort_by_percent();
        result?;

        debug!(
            market = %self.market,
            iteration,
            %bid,
            fired = evaluation.firings.len(),
            "Poll complete"
        );
        Ok(PollOutcome {
            tick,
            fired: evaluation.firings.len(),
        })
    }
}

/// Resolves once shutdown is signalled or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
