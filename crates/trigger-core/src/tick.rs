//! Price observations.

use crate::{MarketKey, Price};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point-in-time price observation for a market.
///
/// Produced by a market poller; immutable once built and superseded by
/// the next tick for the same market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub market: MarketKey,
    pub bid: Price,
    pub ask: Option<Price>,
    pub last: Option<Price>,
    /// Timestamp reported by the exchange, when it sends one.
    pub datetime: Option<DateTime<Utc>>,
    /// Poller iteration that produced this tick (monotonic per poller).
    pub iteration: u64,
    /// Local receive time.
    pub received_at: DateTime<Utc>,
}

impl Tick {
    /// Timestamp used for ordering: exchange time if present, receive time otherwise.
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.datetime.unwrap_or(self.received_at)
    }

    /// A tick is usable for rule evaluation only with a strictly positive bid.
    pub fn has_valid_bid(&self) -> bool {
        self.bid.is_positive()
    }
}
