//! Per-market rule collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use trigger_core::{Amount, MarketKey, Price, Rule, RuleId, RuleKind, RuleState};

use crate::error::RulesResult;

/// Process-wide rule id source, shared by every book of one store.
#[derive(Debug, Clone, Default)]
pub struct RuleIds(Arc<AtomicU64>);

impl RuleIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id (ids start at 1).
    pub fn next(&self) -> RuleId {
        RuleId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Ordered rules of one market.
///
/// Order is the evaluation order; [`RuleBook::sort_by_percent`] reorders
/// for display after each tick.
#[derive(Debug)]
pub struct RuleBook {
    market: MarketKey,
    rules: Vec<Rule>,
    ids: RuleIds,
}

impl RuleBook {
    pub fn new(market: MarketKey, ids: RuleIds) -> Self {
        Self {
            market,
            rules: Vec::new(),
            ids,
        }
    }

    pub fn market(&self) -> &MarketKey {
        &self.market
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Add a configured rule.
    pub fn add(
        &mut self,
        kind: RuleKind,
        a: Price,
        b: Price,
        amount: Option<Amount>,
    ) -> RulesResult<RuleId> {
        let rule = Rule::new(self.ids.next(), kind, self.market.clone(), a, b, amount)?;
        let id = rule.id;
        self.rules.push(rule);
        Ok(id)
    }

    /// Append a rule spawned by a firing at `iteration`.
    pub fn spawn(
        &mut self,
        kind: RuleKind,
        a: Price,
        b: Price,
        amount: Option<Amount>,
        iteration: u64,
    ) -> RulesResult<RuleId> {
        let mut rule = Rule::new(self.ids.next(), kind, self.market.clone(), a, b, amount)?;
        rule.origin_iteration = Some(iteration);
        let id = rule.id;
        self.rules.push(rule);
        Ok(id)
    }

    /// Mark a rule consumed. Returns false if no such rule exists.
    pub fn mark_consumed(&mut self, id: RuleId) -> bool {
        match self.rules.iter_mut().find(|r| r.id == id) {
            Some(rule) => {
                rule.state = RuleState::Consumed;
                true
            }
            None => false,
        }
    }

    /// Stable sort by descending percent.
    pub fn sort_by_percent(&mut self) {
        self.rules.sort_by(|x, y| y.percent.cmp(&x.percent));
    }

    pub(crate) fn rule_mut(&mut self, index: usize) -> Option<&mut Rule> {
        self.rules.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> RuleBook {
        RuleBook::new(MarketKey::parse("binance", "ETH/BTC").unwrap(), RuleIds::new())
    }

    #[test]
    fn test_ids_are_unique_across_books() {
        let ids = RuleIds::new();
        let mut eth = RuleBook::new(MarketKey::parse("binance", "ETH/BTC").unwrap(), ids.clone());
        let mut eos = RuleBook::new(MarketKey::parse("binance", "EOS/BTC").unwrap(), ids);

        let first = eth
            .add(RuleKind::Sell, Price::new(dec!(1)), Price::new(dec!(1)), None)
            .unwrap();
        let second = eos
            .add(RuleKind::Sell, Price::new(dec!(1)), Price::new(dec!(1)), None)
            .unwrap();

        assert_eq!(first, RuleId(1));
        assert_eq!(second, RuleId(2));
    }

    #[test]
    fn test_add_rejects_non_positive_threshold() {
        let mut book = book();
        let result = book.add(RuleKind::Sell, Price::ZERO, Price::new(dec!(1)), None);
        assert!(result.is_err());
        assert!(book.is_empty());
    }

    #[test]
    fn test_spawn_records_origin() {
        let mut book = book();
        let id = book
            .spawn(
                RuleKind::HardSell,
                Price::new(dec!(0.85)),
                Price::new(dec!(0.95)),
                Some(Amount::new(dec!(10))),
                42,
            )
            .unwrap();

        let rule = book.get(id).unwrap();
        assert_eq!(rule.origin_iteration, Some(42));
        assert_eq!(rule.market, *book.market());
    }

    #[test]
    fn test_sort_by_percent_descending() {
        let mut book = book();
        for _ in 0..3 {
            book.add(RuleKind::Sell, Price::new(dec!(1)), Price::new(dec!(1)), None)
                .unwrap();
        }
        book.rule_mut(0).unwrap().percent = dec!(0.2);
        book.rule_mut(1).unwrap().percent = dec!(0.9);
        book.rule_mut(2).unwrap().percent = dec!(0.5);

        book.sort_by_percent();

        let percents: Vec<_> = book.rules().iter().map(|r| r.percent).collect();
        assert_eq!(percents, vec![dec!(0.9), dec!(0.5), dec!(0.2)]);
    }

    #[test]
    fn test_mark_consumed() {
        let mut book = book();
        let id = book
            .add(RuleKind::Moon, Price::new(dec!(2)), Price::new(dec!(2)), None)
            .unwrap();

        assert!(book.mark_consumed(id));
        assert_eq!(book.get(id).unwrap().state, RuleState::Consumed);
        assert!(!book.mark_consumed(RuleId(999)));
    }
}
