//! Prometheus metrics for the trigger bot.
//!
//! Covers:
//! - Poller activity (ticks, errors, exits, rate-limit waits)
//! - Rule evaluation and firing
//! - Order actions, split by live and simulated execution
//! - Balance checks and the read-only latch
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. Registration only fails on duplicate
//! metric names, which is a programming error surfaced at first use.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram,
    register_int_gauge, CounterVec, Gauge, GaugeVec, Histogram, IntGauge,
};

/// Ticks received per market.
pub static TICKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trigger_ticks_total",
        "Total ticker updates received",
        &["market"]
    )
    .unwrap()
});

/// Latest bid per market.
pub static LAST_BID: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("trigger_last_bid", "Latest bid price", &["market"]).unwrap()
});

/// Failed poll iterations.
/// Labels: stage (ticker/evaluate/execute)
pub static POLL_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trigger_poll_errors_total",
        "Total failed poll iterations",
        &["market", "stage"]
    )
    .unwrap()
});

/// Pollers currently running.
pub static ACTIVE_POLLERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("trigger_active_pollers", "Number of running market pollers").unwrap()
});

/// Poller exits by reason.
pub static POLLER_EXITS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trigger_poller_exits_total",
        "Total poller exits",
        &["reason"]
    )
    .unwrap()
});

/// Time spent waiting on the global rate limiter.
pub static RATE_LIMIT_WAIT_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "trigger_rate_limit_wait_ms",
        "Time spent waiting for a request slot in milliseconds",
        vec![0.0, 100.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0, 60000.0]
    )
    .unwrap()
});

/// Rules evaluated.
pub static RULE_EVALUATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trigger_rule_evaluations_total",
        "Total rule evaluations",
        &["kind"]
    )
    .unwrap()
});

/// Rules fired.
pub static RULE_FIRES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trigger_rule_fires_total",
        "Total rule firings",
        &["market", "kind"]
    )
    .unwrap()
});

/// Rules appended by a sell firing.
pub static RULES_SPAWNED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trigger_rules_spawned_total",
        "Total rules spawned by firings",
        &["kind"]
    )
    .unwrap()
});

/// Rules held per market.
pub static RULES_GAUGE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("trigger_rules", "Rules held per market", &["market"]).unwrap()
});

/// Order actions.
/// Labels: action (cancel/moon/market_sell), mode (live/simulated)
pub static ORDER_ACTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trigger_order_actions_total",
        "Total order actions executed",
        &["action", "mode"]
    )
    .unwrap()
});

/// Failed order actions.
pub static ORDER_ACTION_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trigger_order_action_failures_total",
        "Total failed order actions",
        &["action"]
    )
    .unwrap()
});

/// Balance checks by outcome (funded/empty/assumed).
pub static BALANCE_CHECKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trigger_balance_checks_total",
        "Total balance checks",
        &["outcome"]
    )
    .unwrap()
});

/// Read-only latch (1 = read-only).
pub static READ_ONLY: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("trigger_read_only", "Read-only latch state (1=read-only)").unwrap()
});

/// Control token checks by route and outcome.
pub static CONTROL_AUTH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trigger_control_auth_total",
        "Total control token checks",
        &["route", "outcome"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a tick and its bid.
    pub fn tick_received(market: &str, bid: f64) {
        TICKS_TOTAL.with_label_values(&[market]).inc();
        LAST_BID.with_label_values(&[market]).set(bid);
    }

    /// Record a failed poll iteration.
    pub fn poll_error(market: &str, stage: &str) {
        POLL_ERRORS_TOTAL.with_label_values(&[market, stage]).inc();
    }

    pub fn poller_started() {
        ACTIVE_POLLERS.inc();
    }

    /// Record a poller exit.
    pub fn poller_exited(reason: &str) {
        ACTIVE_POLLERS.dec();
        POLLER_EXITS_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn rate_limit_wait(wait_ms: f64) {
        RATE_LIMIT_WAIT_MS.observe(wait_ms);
    }

    pub fn rule_evaluated(kind: &str) {
        RULE_EVALUATIONS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn rule_fired(market: &str, kind: &str) {
        RULE_FIRES_TOTAL.with_label_values(&[market, kind]).inc();
    }

    pub fn rule_spawned(kind: &str) {
        RULES_SPAWNED_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Set the number of rules held for a market.
    pub fn rules_held(market: &str, count: usize) {
        RULES_GAUGE.with_label_values(&[market]).set(count as f64);
    }

    /// Record an order action.
    pub fn order_action(action: &str, live: bool) {
        let mode = if live { "live" } else { "simulated" };
        ORDER_ACTIONS_TOTAL.with_label_values(&[action, mode]).inc();
    }

    pub fn order_action_failed(action: &str) {
        ORDER_ACTION_FAILURES_TOTAL.with_label_values(&[action]).inc();
    }

    pub fn balance_check(outcome: &str) {
        BALANCE_CHECKS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record the read-only latch state.
    pub fn read_only(read_only: bool) {
        READ_ONLY.set(if read_only { 1.0 } else { 0.0 });
    }

    pub fn control_auth(route: &str, outcome: &str) {
        CONTROL_AUTH_TOTAL.with_label_values(&[route, outcome]).inc();
    }
}
