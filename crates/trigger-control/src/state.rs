//! Shared state behind the control routes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;
use trigger_core::{Rule, Tick};
use trigger_executor::ReadOnlyLatch;
use trigger_feed::TickerBoard;
use trigger_rules::RuleStore;

use crate::auth::TokenVerifier;

/// Starts market monitoring at most once.
pub struct MonitorSwitch {
    running: AtomicBool,
    start: Box<dyn Fn() + Send + Sync>,
}

impl MonitorSwitch {
    pub fn new<F>(start: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            running: AtomicBool::new(false),
            start: Box::new(start),
        }
    }

    /// Start monitoring unless already running. Returns true if started now.
    pub fn ensure_running(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        info!("Starting market monitoring");
        (self.start)();
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Point-in-time view of the bot.
#[derive(Debug, Clone, Serialize)]
pub struct ControlSnapshot {
    pub read_only: bool,
    pub running: bool,
    /// Latest ticks, newest first.
    pub ticks: Vec<Tick>,
    /// Rules, descending percent.
    pub rules: Vec<Rule>,
    pub generated_at: DateTime<Utc>,
}

/// State shared by all handlers.
#[derive(Clone)]
pub struct ControlState {
    board: Arc<TickerBoard>,
    rules: Arc<RuleStore>,
    latch: Arc<ReadOnlyLatch>,
    verifier: Arc<TokenVerifier>,
    monitor: Arc<MonitorSwitch>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ControlState {
    pub fn new(
        board: Arc<TickerBoard>,
        rules: Arc<RuleStore>,
        latch: Arc<ReadOnlyLatch>,
        verifier: Arc<TokenVerifier>,
        monitor: Arc<MonitorSwitch>,
        shutdown: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            board,
            rules,
            latch,
            verifier,
            monitor,
            shutdown,
        }
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub fn latch(&self) -> &ReadOnlyLatch {
        &self.latch
    }

    pub fn monitor(&self) -> &MonitorSwitch {
        &self.monitor
    }

    /// Ask the process to exit.
    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Collect the current ticks and rules.
    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            read_only: self.latch.is_read_only(),
            running: self.monitor.is_running(),
            ticks: self.board.snapshot(),
            rules: self.rules.snapshot(),
            generated_at: Utc::now(),
        }
    }
}
