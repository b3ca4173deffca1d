//! Main application orchestration.
//!
//! Wires the components together:
//! - One exchange adapter and order executor per exchange
//! - One poller per market, sharing the rate limiter, ticker board and
//!   read-only latch
//! - The control server, which starts monitoring and signals shutdown

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use trigger_control::{run_server, ControlState, MonitorSwitch, TokenVerifier};
use trigger_core::{ExchangeId, MarketKey};
use trigger_exchange::{CcxtRestExchange, Credentials, DynExchange, ExchangeAdapter, RateLimiter};
use trigger_executor::{ExecutionGate, OrderActionExecutor, ReadOnlyLatch};
use trigger_feed::{MarketPoller, PollerExit, TickerBoard};
use trigger_rules::{RuleEvaluator, RuleStore};
use trigger_telemetry::Metrics;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// How long a poller gets to notice shutdown before it is aborted.
const POLLER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Main application.
pub struct Application {
    config: AppConfig,
    store: Arc<RuleStore>,
    board: Arc<TickerBoard>,
    latch: Arc<ReadOnlyLatch>,
    verifier: Arc<TokenVerifier>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    monitor: Arc<MonitorSwitch>,
    handles: Arc<Mutex<Vec<(MarketKey, JoinHandle<PollerExit>)>>>,
}

impl Application {
    /// Create the application against the configured gateway.
    ///
    /// Credentials come from `APIKEY_<exchange>` / `APISECRET_<exchange>` and
    /// the control secret from `TOKEN`.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let mut adapters: HashMap<ExchangeId, DynExchange> = HashMap::new();
        for market in config.market_keys()? {
            if adapters.contains_key(&market.exchange) {
                continue;
            }
            let credentials = Credentials::from_env(&market.exchange);
            if credentials.is_none() {
                warn!(exchange = %market.exchange, "No API credentials; orders will only be logged");
            }
            let adapter =
                CcxtRestExchange::new(&config.gateway, market.exchange.clone(), credentials)?;
            adapters.insert(market.exchange.clone(), Arc::new(adapter));
        }

        let verifier = TokenVerifier::from_env()?;
        if !verifier.is_enabled() {
            warn!("TOKEN not set; /start and /stop will reject every request");
        }

        Self::with_adapters(config, adapters, verifier)
    }

    /// Create the application with the given adapters, one per exchange.
    pub fn with_adapters(
        config: AppConfig,
        adapters: HashMap<ExchangeId, DynExchange>,
        verifier: TokenVerifier,
    ) -> AppResult<Self> {
        config.validate()?;

        let store = Arc::new(config.build_rule_store()?);
        let board = Arc::new(TickerBoard::new());
        let latch = Arc::new(ReadOnlyLatch::new());
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(config.rate_limit_ms)));
        let evaluator = Arc::new(RuleEvaluator::new(config.triggers.clone()));
        let (shutdown_tx, _) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        Metrics::read_only(latch.is_read_only());

        let executors: HashMap<ExchangeId, Arc<OrderActionExecutor>> = adapters
            .iter()
            .map(|(id, exchange)| {
                let gate = ExecutionGate::new(latch.clone(), exchange.has_credentials());
                (
                    id.clone(),
                    Arc::new(OrderActionExecutor::new(exchange.clone(), gate)),
                )
            })
            .collect();

        let mut pollers = Vec::new();
        for market in store.markets() {
            let (Some(exchange), Some(executor)) =
                (adapters.get(&market.exchange), executors.get(&market.exchange))
            else {
                return Err(AppError::Config(format!("no adapter for exchange {}", market.exchange)));
            };
            let book = store
                .partition(&market)
                .ok_or_else(|| AppError::Config(format!("no rule partition for {market}")))?;
            pollers.push(MarketPoller::new(
                market,
                exchange.clone(),
                limiter.clone(),
                board.clone(),
                book,
                evaluator.clone(),
                executor.clone(),
                config.poller.clone(),
                shutdown_tx.subscribe(),
            )?);
        }

        info!(
            markets = pollers.len(),
            exchanges = adapters.len(),
            rules = store.snapshot().len(),
            rate_limit_ms = config.rate_limit_ms,
            "Application configured"
        );

        let handles = Arc::new(Mutex::new(Vec::new()));
        let monitor = Arc::new(MonitorSwitch::new(spawn_pollers(pollers, handles.clone())));

        Ok(Self {
            config,
            store,
            board,
            latch,
            verifier: Arc::new(verifier),
            shutdown_tx,
            monitor,
            handles,
        })
    }

    /// State handed to the control server.
    pub fn control_state(&self) -> ControlState {
        ControlState::new(
            self.board.clone(),
            self.store.clone(),
            self.latch.clone(),
            self.verifier.clone(),
            self.monitor.clone(),
            self.shutdown_tx.clone(),
        )
    }

    /// Spawn the pollers unless already running.
    pub fn start_monitoring(&self) -> bool {
        self.monitor.ensure_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Serve the control surface until `/stop`, Ctrl-C or a server failure.
    pub async fn run(self) -> AppResult<()> {
        let mut server = tokio::spawn(run_server(self.control_state(), self.config.control.clone()));

        if self.config.control.auto_start {
            self.start_monitoring();
        } else {
            info!("Monitoring starts on the first request to /");
        }

        let mut shutdown = self.shutdown_tx.subscribe();
        let mut server_result = None;
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => info!("Shutdown requested"),
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Ctrl-C received, shutting down");
            }
            result = &mut server => server_result = Some(result),
        }
        self.request_shutdown();

        let server_result = match server_result {
            Some(result) => result,
            None => server.await,
        };
        self.stop_pollers().await;

        match server_result {
            Ok(result) => result.map_err(AppError::from),
            Err(e) => Err(AppError::Config(format!("control server task failed: {e}"))),
        }
    }

    /// Wait for every spawned poller, aborting those that overrun.
    pub async fn stop_pollers(&self) -> Vec<(MarketKey, Option<PollerExit>)> {
        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());
        let mut exits = Vec::with_capacity(handles.len());

        for (market, mut handle) in handles {
            let exit = match tokio::time::timeout(POLLER_STOP_TIMEOUT, &mut handle).await {
                Ok(Ok(exit)) => Some(exit),
                Ok(Err(e)) => {
                    warn!(%market, error = %e, "Poller task failed");
                    None
                }
                Err(_) => {
                    warn!(%market, "Poller did not stop in time, aborting");
                    handle.abort();
                    None
                }
            };
            exits.push((market, exit));
        }
        exits
    }
}

/// Starter for [`MonitorSwitch`]: spawns every poller on first call.
fn spawn_pollers(
    pollers: Vec<MarketPoller>,
    handles: Arc<Mutex<Vec<(MarketKey, JoinHandle<PollerExit>)>>>,
) -> impl Fn() + Send + Sync + 'static {
    let pending = Mutex::new(pollers);
    move || {
        let pollers: Vec<MarketPoller> = std::mem::take(&mut *pending.lock());
        let mut handles = handles.lock();
        for poller in pollers {
            let market = poller.market().clone();
            handles.push((market, tokio::spawn(poller.run())));
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trigger_core::Price;
    use trigger_exchange::{ExchangeCall, MockExchange, Ticker};

    const CONFIG: &str = r#"
rate_limit_ms = 1000

[control]
bind = "127.0.0.1"
port = 0

[[markets]]
exchange = "hitbtc2"
symbol = "EOS/BTC"

[[markets]]
exchange = "hitbtc2"
symbol = "XVG/BTC"

[[rules]]
kind = "sell"
exchange = "hitbtc2"
symbol = "EOS/BTC"
a = 0.0016
b = 1
"#;

    fn mock() -> Arc<MockExchange> {
        let exchange = MockExchange::new(ExchangeId::new("hitbtc2").unwrap(), false);
        exchange.set_default_ticker(Ticker::from_bid(Price::new(dec!(0.0008))));
        Arc::new(exchange)
    }

    fn app(exchange: Arc<MockExchange>) -> Application {
        let config = AppConfig::from_toml_str(CONFIG).unwrap();
        let mut adapters: HashMap<ExchangeId, DynExchange> = HashMap::new();
        adapters.insert(ExchangeId::new("hitbtc2").unwrap(), exchange);
        Application::with_adapters(config, adapters, TokenVerifier::disabled()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_pollers_start_once_and_stop_on_shutdown() {
        let exchange = mock();
        let app = app(exchange.clone());

        assert!(app.start_monitoring());
        assert!(!app.start_monitoring());
        tokio::time::sleep(Duration::from_secs(5)).await;

        let fetches = exchange
            .calls()
            .iter()
            .filter(|c| matches!(c, ExchangeCall::FetchTicker(_)))
            .count();
        assert!(fetches >= 4);
        assert_eq!(exchange.mutation_count(), 0);
        assert_eq!(app.control_state().snapshot().ticks.len(), 2);

        app.request_shutdown();
        let exits = app.stop_pollers().await;

        assert_eq!(exits.len(), 2);
        assert!(exits.iter().all(|(_, exit)| *exit == Some(PollerExit::Shutdown)));
    }

    #[test]
    fn test_missing_adapter_is_config_error() {
        let config = AppConfig::from_toml_str(CONFIG).unwrap();

        let result = Application::with_adapters(config, HashMap::new(), TokenVerifier::disabled());

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_run_returns_after_stop_signal() {
        let app = app(mock());
        let state = app.control_state();

        let run = tokio::spawn(app.run());
        tokio::task::yield_now().await;
        state.request_shutdown();

        run.await.unwrap().unwrap();
        assert!(state.shutdown_requested());
    }
}
