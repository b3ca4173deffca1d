//! Read-only latch and execution gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::warn;
use trigger_telemetry::Metrics;

/// Process-wide read-only switch.
///
/// Starts read-only. The control surface flips it to live after an
/// authorized start request.
///
/// # Example
///
/// ```
/// use trigger_executor::ReadOnlyLatch;
///
/// let latch = ReadOnlyLatch::new();
/// assert!(latch.is_read_only());
///
/// latch.go_live("operator start");
/// assert!(!latch.is_read_only());
/// ```
#[derive(Debug)]
pub struct ReadOnlyLatch {
    read_only: AtomicBool,
    /// Reason and time of the last transition.
    last_change: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl ReadOnlyLatch {
    /// Create a latch in read-only mode.
    #[must_use]
    pub fn new() -> Self {
        Metrics::read_only(true);
        Self {
            read_only: AtomicBool::new(true),
            last_change: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    /// Switch to live trading. Returns false if already live.
    pub fn go_live(&self, reason: &str) -> bool {
        self.transition(false, reason)
    }

    /// Switch back to read-only. Returns false if already read-only.
    pub fn set_read_only(&self, reason: &str) -> bool {
        self.transition(true, reason)
    }

    /// Reason and time of the last transition.
    #[must_use]
    pub fn last_change(&self) -> Option<(String, DateTime<Utc>)> {
        self.last_change.lock().clone()
    }

    fn transition(&self, read_only: bool, reason: &str) -> bool {
        let previous = self.read_only.swap(read_only, Ordering::AcqRel);
        if previous == read_only {
            return false;
        }
        *self.last_change.lock() = Some((reason.to_string(), Utc::now()));
        Metrics::read_only(read_only);
        if read_only {
            warn!(reason, "Read-only mode enabled");
        } else {
            warn!(reason, "LIVE TRADING ENABLED");
        }
        true
    }
}

impl Default for ReadOnlyLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides whether order actions reach the exchange.
#[derive(Debug, Clone)]
pub struct ExecutionGate {
    read_only: Arc<ReadOnlyLatch>,
    credentials_present: bool,
}

impl ExecutionGate {
    pub fn new(read_only: Arc<ReadOnlyLatch>, credentials_present: bool) -> Self {
        Self {
            read_only,
            credentials_present,
        }
    }

    /// True only when live trading is enabled and credentials exist.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.credentials_present && !self.read_only.is_read_only()
    }

    /// Why the gate is closed, if it is.
    #[must_use]
    pub fn closed_reason(&self) -> Option<&'static str> {
        if !self.credentials_present {
            Some("no credentials")
        } else if self.read_only.is_read_only() {
            Some("read-only")
        } else {
            None
        }
    }

    pub fn latch(&self) -> &Arc<ReadOnlyLatch> {
        &self.read_only
    }
}
