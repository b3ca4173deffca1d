//! Market polling for the trigger bot.
//!
//! One [`MarketPoller`] task per configured market fetches the ticker at
//! the pace of the shared rate limiter, records it on the [`TickerBoard`],
//! evaluates the market's rules and executes whatever fired.

pub mod board;
pub mod error;
pub mod poller;

pub use board::TickerBoard;
pub use error::{FeedError, FeedResult};
pub use poller::{MarketPoller, PollOutcome, PollerConfig, PollerExit};
