//! Order execution for fired rules.
//!
//! # Key Components
//!
//! - [`ReadOnlyLatch`]: process-wide switch between simulated and live trading
//! - [`ExecutionGate`]: latch plus credential presence; closed means log only
//! - [`OrderActionExecutor`]: runs a firing's cancel / moon / market-sell actions
//! - [`check_balance`]: fail-open check that a market's base asset is held
//!
//! # Safety
//!
//! The latch starts read-only. While the gate is closed no cancel or create
//! request reaches the exchange; every action is logged and counted as
//! simulated instead.

pub mod balance;
pub mod error;
pub mod executor;
pub mod gate;
pub mod sizing;

pub use balance::check_balance;
pub use error::{ExecutorError, ExecutorResult};
pub use executor::{ExecutionReport, OrderActionExecutor};
pub use gate::{ExecutionGate, ReadOnlyLatch};
pub use sizing::{prepare_order, sell_amount};
