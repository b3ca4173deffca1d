//! Market-partitioned rule store.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use trigger_core::{Amount, MarketKey, Price, Rule, RuleId, RuleKind};

use crate::book::{RuleBook, RuleIds};
use crate::error::{RulesError, RulesResult};

/// Handle to one market's rules.
///
/// The lock is held only for synchronous evaluation or reads, never across
/// an await point.
pub type SharedBook = Arc<RwLock<RuleBook>>;

/// All rules, one partition per configured market.
#[derive(Debug, Default)]
pub struct RuleStore {
    partitions: DashMap<MarketKey, SharedBook>,
    ids: RuleIds,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with an empty partition per market.
    pub fn with_markets<I>(markets: I) -> Self
    where
        I: IntoIterator<Item = MarketKey>,
    {
        let store = Self::new();
        for market in markets {
            store.register_market(market);
        }
        store
    }

    /// Ensure a partition exists for `market` and return it.
    pub fn register_market(&self, market: MarketKey) -> SharedBook {
        self.partitions
            .entry(market.clone())
            .or_insert_with(|| Arc::new(RwLock::new(RuleBook::new(market, self.ids.clone()))))
            .clone()
    }

    /// Add a configured rule; the market must already be registered.
    pub fn insert(
        &self,
        kind: RuleKind,
        market: &MarketKey,
        a: Price,
        b: Price,
        amount: Option<Amount>,
    ) -> RulesResult<RuleId> {
        let book = self
            .partition(market)
            .ok_or_else(|| RulesError::UnknownMarket(market.clone()))?;
        let mut book = book.write();
        book.add(kind, a, b, amount)
    }

    /// Partition for one market.
    pub fn partition(&self, market: &MarketKey) -> Option<SharedBook> {
        self.partitions.get(market).map(|entry| entry.value().clone())
    }

    pub fn markets(&self) -> Vec<MarketKey> {
        let mut markets: Vec<_> = self.partitions.iter().map(|e| e.key().clone()).collect();
        markets.sort();
        markets
    }

    /// Total number of rules across all markets.
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|e| e.value().read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every rule, ordered by descending percent.
    pub fn snapshot(&self) -> Vec<Rule> {
        let books: Vec<SharedBook> = self.partitions.iter().map(|e| e.value().clone()).collect();
        let mut rules: Vec<Rule> = books
            .iter()
            .flat_map(|book| book.read().rules().to_vec())
            .collect();
        rules.sort_by(|x, y| y.percent.cmp(&x.percent).then(x.id.cmp(&y.id)));
        rules
    }
}
