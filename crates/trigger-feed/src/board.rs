//! Latest tick per market.

use dashmap::DashMap;
use trigger_core::{MarketKey, Tick};

/// Latest tick for every polled market.
///
/// Each poller writes only its own key.
#[derive(Debug, Default)]
pub struct TickerBoard {
    ticks: DashMap<MarketKey, Tick>,
}

impl TickerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tick for the tick's market, returning the previous one.
    pub fn upsert(&self, tick: Tick) -> Option<Tick> {
        self.ticks.insert(tick.market.clone(), tick)
    }

    pub fn get(&self, market: &MarketKey) -> Option<Tick> {
        self.ticks.get(market).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// All ticks, newest first.
    pub fn snapshot(&self) -> Vec<Tick> {
        let mut ticks: Vec<Tick> = self.ticks.iter().map(|e| e.value().clone()).collect();
        ticks.sort_by(|x, y| {
            y.observed_at()
                .cmp(&x.observed_at())
                .then_with(|| x.market.cmp(&y.market))
        });
        ticks
    }
}
