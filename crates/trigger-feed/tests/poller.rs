//! Poller integration tests against the scripted exchange.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::watch;
use tokio::time::Instant;
use trigger_core::{Amount, ExchangeId, MarketInfo, MarketKey, Price, RuleKind, Symbol};
use trigger_exchange::{
    ExchangeAdapter, ExchangeCall, MockExchange, OpenOrder, OrderId, RateLimiter, Ticker,
};
use trigger_executor::{ExecutionGate, OrderActionExecutor, ReadOnlyLatch};
use trigger_feed::{FeedError, MarketPoller, PollerConfig, PollerExit, TickerBoard};
use trigger_rules::{RuleEvaluator, RuleStore, RulesError};

const EXCHANGE: &str = "hitbtc2";

fn market(symbol: &str) -> MarketKey {
    MarketKey::parse(EXCHANGE, symbol).unwrap()
}

fn price(d: Decimal) -> Price {
    Price::new(d)
}

struct Harness {
    exchange: Arc<MockExchange>,
    store: Arc<RuleStore>,
    board: Arc<TickerBoard>,
    latch: Arc<ReadOnlyLatch>,
    limiter: Arc<RateLimiter>,
    evaluator: Arc<RuleEvaluator>,
    shutdown: watch::Sender<bool>,
}

impl Harness {
    fn new(symbols: &[&str]) -> Self {
        let exchange = MockExchange::new(ExchangeId::new(EXCHANGE).unwrap(), true);
        for symbol in symbols {
            exchange.set_market(Symbol::new(*symbol).unwrap(), MarketInfo::default());
        }
        let (shutdown, _) = watch::channel(false);
        Self {
            exchange: Arc::new(exchange),
            store: Arc::new(RuleStore::with_markets(symbols.iter().map(|s| market(s)))),
            board: Arc::new(TickerBoard::new()),
            latch: Arc::new(ReadOnlyLatch::new()),
            limiter: Arc::new(RateLimiter::new(Duration::from_millis(4000))),
            evaluator: Arc::new(RuleEvaluator::default()),
            shutdown,
        }
    }

    fn poller(&self, symbol: &str, config: PollerConfig) -> MarketPoller {
        let key = market(symbol);
        let gate = ExecutionGate::new(self.latch.clone(), self.exchange.has_credentials());
        let executor = Arc::new(OrderActionExecutor::new(self.exchange.clone(), gate));
        MarketPoller::new(
            key.clone(),
            self.exchange.clone(),
            self.limiter.clone(),
            self.board.clone(),
            self.store.partition(&key).unwrap(),
            self.evaluator.clone(),
            executor,
            config,
            self.shutdown.subscribe(),
        )
        .unwrap()
    }

    fn add_rule(&self, symbol: &str, kind: RuleKind, a: Decimal, b: Decimal, amount: Option<Decimal>) {
        self.store
            .insert(kind, &market(symbol), price(a), price(b), amount.map(Amount::new))
            .unwrap();
    }

    fn ticker_fetches(&self) -> usize {
        self.exchange
            .calls()
            .iter()
            .filter(|c| matches!(c, ExchangeCall::FetchTicker(_)))
            .count()
    }

    fn creates(&self) -> Vec<ExchangeCall> {
        self.exchange
            .calls()
            .into_iter()
            .filter(|c| matches!(c, ExchangeCall::CreateLimitSell { .. }))
            .collect()
    }
}

#[tokio::test]
async fn test_sell_fire_read_only_spawns_rules_without_orders() {
    let h = Harness::new(&["EOS/BTC"]);
    h.add_rule("EOS/BTC", RuleKind::Sell, dec!(0.95), dec!(1), None);
    h.exchange.push_ticker(Ticker::from_bid(price(dec!(1.0))));
    let poller = h.poller("EOS/BTC", PollerConfig::default());

    let outcome = poller.poll_once(1).await.unwrap();

    assert_eq!(outcome.fired, 1);
    assert_eq!(h.exchange.mutation_count(), 0);

    let rules = h.store.snapshot();
    assert_eq!(rules.len(), 3);
    let sell = rules.iter().find(|r| r.kind == RuleKind::Sell).unwrap();
    assert_eq!(sell.a, price(dec!(1.05)));
    let moon = rules.iter().find(|r| r.kind == RuleKind::Moon).unwrap();
    assert_eq!(moon.a, price(dec!(2.0)));
    let hardsell = rules.iter().find(|r| r.kind == RuleKind::HardSell).unwrap();
    assert_eq!((hardsell.a, hardsell.b), (price(dec!(0.85)), price(dec!(0.95))));

    assert_eq!(
        h.board.get(&market("EOS/BTC")).unwrap().bid,
        price(dec!(1.0))
    );
}

#[tokio::test]
async fn test_live_hardsell_fires_on_consecutive_ticks() {
    let h = Harness::new(&["EOS/BTC"]);
    h.latch.go_live("test");
    h.exchange
        .set_balance("EOS", Amount::new(dec!(100)), Amount::new(dec!(100)));
    h.add_rule("EOS/BTC", RuleKind::HardSell, dec!(0.85), dec!(0.95), Some(dec!(10)));
    h.exchange.push_ticker(Ticker::from_bid(price(dec!(0.90))));
    h.exchange.push_ticker(Ticker::from_bid(price(dec!(0.80))));
    let poller = h.poller("EOS/BTC", PollerConfig::default());

    poller.poll_once(1).await.unwrap();
    assert_eq!(
        h.creates(),
        vec![ExchangeCall::CreateLimitSell {
            symbol: Symbol::new("EOS/BTC").unwrap(),
            amount: Amount::new(dec!(10)),
            price: price(dec!(0.882)),
        }]
    );

    poller.poll_once(2).await.unwrap();
    assert_eq!(h.creates().len(), 2);
}

#[tokio::test]
async fn test_rules_resorted_by_percent_after_tick() {
    let h = Harness::new(&["EOS/BTC"]);
    h.add_rule("EOS/BTC", RuleKind::Sell, dec!(2), dec!(1), None);
    h.add_rule("EOS/BTC", RuleKind::Sell, dec!(1.25), dec!(1), None);
    h.exchange.push_ticker(Ticker::from_bid(price(dec!(1))));
    let poller = h.poller("EOS/BTC", PollerConfig::default());

    poller.poll_once(1).await.unwrap();

    let book = h.store.partition(&market("EOS/BTC")).unwrap();
    let percents: Vec<_> = book.read().rules().iter().map(|r| r.percent).collect();
    assert_eq!(percents, vec![dec!(0.8), dec!(0.5)]);
}

#[tokio::test]
async fn test_missing_bid_is_an_error() {
    let h = Harness::new(&["EOS/BTC"]);
    h.exchange.push_ticker(Ticker::default());
    let poller = h.poller("EOS/BTC", PollerConfig::default());

    let err = poller.poll_once(1).await.unwrap_err();

    assert!(matches!(err, FeedError::MissingBid(_)));
    assert!(h.board.is_empty());
}

#[tokio::test]
async fn test_evaluation_never_touches_other_markets() {
    let h = Harness::new(&["EOS/BTC", "XVG/BTC"]);
    h.add_rule("EOS/BTC", RuleKind::Sell, dec!(0.5), dec!(1), None);
    h.add_rule("XVG/BTC", RuleKind::Sell, dec!(0.5), dec!(1), None);
    h.exchange.push_ticker(Ticker::from_bid(price(dec!(1))));
    let poller = h.poller("EOS/BTC", PollerConfig::default());

    poller.poll_once(1).await.unwrap();

    let xvg = h.store.partition(&market("XVG/BTC")).unwrap();
    let xvg = xvg.read();
    assert_eq!(xvg.len(), 1);
    assert!(xvg.rules()[0].percent.is_zero());
    assert_eq!(xvg.rules()[0].a, price(dec!(0.5)));
}

#[tokio::test(start_paused = true)]
async fn test_iterations_paced_by_rate_limiter() {
    let h = Harness::new(&["EOS/BTC"]);
    h.exchange.set_default_ticker(Ticker::from_bid(price(dec!(1))));
    let poller = h.poller(
        "EOS/BTC",
        PollerConfig {
            max_iterations: 3,
            ..Default::default()
        },
    );
    let start = Instant::now();

    let exit = poller.run().await;

    assert_eq!(exit, PollerExit::IterationCap);
    assert_eq!(h.ticker_fetches(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_poller_stops_when_balance_is_gone() {
    let h = Harness::new(&["EOS/BTC"]);
    h.latch.go_live("test");
    h.exchange.set_balance("EOS", Amount::ZERO, Amount::ZERO);
    h.exchange.set_default_ticker(Ticker::from_bid(price(dec!(1))));
    let poller = h.poller("EOS/BTC", PollerConfig::default());

    let exit = poller.run().await;

    assert_eq!(exit, PollerExit::BalanceExhausted);
    assert_eq!(h.ticker_fetches(), 12);
}

#[tokio::test(start_paused = true)]
async fn test_balance_check_failure_never_stops_poller() {
    let h = Harness::new(&["EOS/BTC"]);
    h.latch.go_live("test");
    h.exchange.fail_balance("exchange down");
    h.exchange.set_default_ticker(Ticker::from_bid(price(dec!(1))));
    let poller = h.poller(
        "EOS/BTC",
        PollerConfig {
            balance_check_every: 2,
            max_iterations: 10,
        },
    );

    let exit = poller.run().await;

    assert_eq!(exit, PollerExit::IterationCap);
    assert_eq!(h.ticker_fetches(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_ticker_errors_do_not_stop_poller() {
    let h = Harness::new(&["EOS/BTC"]);
    h.exchange.push_ticker_error("timeout");
    h.exchange.push_ticker_error("timeout");
    h.exchange.set_default_ticker(Ticker::from_bid(price(dec!(1))));
    let poller = h.poller(
        "EOS/BTC",
        PollerConfig {
            max_iterations: 4,
            ..Default::default()
        },
    );

    let exit = poller.run().await;

    assert_eq!(exit, PollerExit::IterationCap);
    assert_eq!(h.board.get(&market("EOS/BTC")).unwrap().iteration, 4);
}

#[tokio::test(start_paused = true)]
async fn test_execution_failure_does_not_stop_poller() {
    let h = Harness::new(&["EOS/BTC"]);
    h.latch.go_live("test");
    h.exchange
        .set_balance("EOS", Amount::new(dec!(100)), Amount::new(dec!(100)));
    h.exchange.set_open_orders(vec![OpenOrder {
        id: OrderId::new("o-1"),
        symbol: Symbol::new("EOS/BTC").unwrap(),
        price: None,
    }]);
    h.exchange.fail_cancel_on(OrderId::new("o-1"));
    h.add_rule("EOS/BTC", RuleKind::Sell, dec!(2), dec!(1), None);
    h.add_rule("EOS/BTC", RuleKind::HardSell, dec!(0.85), dec!(0.95), Some(dec!(10)));
    h.exchange.set_default_ticker(Ticker::from_bid(price(dec!(0.9))));
    let poller = h.poller(
        "EOS/BTC",
        PollerConfig {
            max_iterations: 3,
            ..Default::default()
        },
    );

    let err = poller.poll_once(1).await.unwrap_err();
    assert!(matches!(err, FeedError::Execution(_)));

    let book = h.store.partition(&market("EOS/BTC")).unwrap();
    let kinds: Vec<_> = book.read().rules().iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![RuleKind::HardSell, RuleKind::Sell]);

    let exit = poller.run().await;

    assert_eq!(exit, PollerExit::IterationCap);
    assert_eq!(h.ticker_fetches(), 4);
    assert_eq!(h.board.get(&market("EOS/BTC")).unwrap().iteration, 3);
    let cancels = h
        .exchange
        .calls()
        .iter()
        .filter(|c| matches!(c, ExchangeCall::CancelOrder(_)))
        .count();
    assert_eq!(cancels, 4);
    assert!(h.creates().is_empty());
    let percents: Vec<_> = book.read().rules().iter().map(|r| r.percent).collect();
    assert!(percents.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test(start_paused = true)]
async fn test_price_overflow_does_not_stop_poller() {
    let h = Harness::new(&["EOS/BTC"]);
    h.add_rule("EOS/BTC", RuleKind::Sell, dec!(1), dec!(1), None);
    h.exchange.set_default_ticker(Ticker::from_bid(price(Decimal::MAX)));
    let poller = h.poller(
        "EOS/BTC",
        PollerConfig {
            max_iterations: 2,
            ..Default::default()
        },
    );

    let err = poller.poll_once(1).await.unwrap_err();
    assert!(matches!(
        err,
        FeedError::Rules(RulesError::PriceOverflow { .. })
    ));

    let exit = poller.run().await;

    assert_eq!(exit, PollerExit::IterationCap);
    assert_eq!(h.ticker_fetches(), 3);
    assert_eq!(h.store.snapshot().len(), 1);
    assert_eq!(h.exchange.mutation_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_poller() {
    let h = Harness::new(&["EOS/BTC"]);
    h.exchange.set_default_ticker(Ticker::from_bid(price(dec!(1))));
    let poller = h.poller("EOS/BTC", PollerConfig::default());

    let handle = tokio::spawn(poller.run());
    tokio::time::sleep(Duration::from_secs(10)).await;
    h.shutdown.send_replace(true);

    assert_eq!(handle.await.unwrap(), PollerExit::Shutdown);
    assert!(h.ticker_fetches() >= 2);
}

#[test]
fn test_poller_rejects_foreign_partition() {
    let h = Harness::new(&["EOS/BTC", "XVG/BTC"]);
    let gate = ExecutionGate::new(h.latch.clone(), true);
    let executor = Arc::new(OrderActionExecutor::new(h.exchange.clone(), gate));

    let result = MarketPoller::new(
        market("EOS/BTC"),
        h.exchange.clone(),
        h.limiter.clone(),
        h.board.clone(),
        h.store.partition(&market("XVG/BTC")).unwrap(),
        h.evaluator.clone(),
        executor,
        PollerConfig::default(),
        h.shutdown.subscribe(),
    );

    assert!(matches!(result, Err(FeedError::ConfigError(_))));
}
