//! Prometheus metrics and structured logging for the trigger bot.
//!
//! - Prometheus metrics for polling, rule firing and order actions
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
