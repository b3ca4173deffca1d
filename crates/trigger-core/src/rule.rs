//! Trading rule types.
//!
//! A rule is a standing trigger condition bound to exactly one market.
//! Its kind decides the comparison direction:
//! - `sell` / `moon`: fire when the bid has risen to the threshold (`bid / a >= 1`)
//! - `hardsell`: fire when the bid has fallen to the floor (`b / bid >= 1`)

use crate::error::{CoreError, Result};
use crate::{Amount, MarketKey, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule identifier, assigned by the rule store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Rule kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Profit-taking rule; re-arms itself and spawns moon/hardsell rules.
    Sell,
    /// Take-profit sell at a large multiple of the firing price.
    Moon,
    /// Stop-loss sell when the bid falls to the floor.
    HardSell,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Sell => "sell",
            RuleKind::Moon => "moon",
            RuleKind::HardSell => "hardsell",
        }
    }

    /// Moon and hardsell rules perform a single sell when they fire.
    pub fn is_one_shot(&self) -> bool {
        matches!(self, RuleKind::Moon | RuleKind::HardSell)
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleState {
    #[default]
    Active,
    /// One-shot action already executed; the rule is tracked but never fires.
    Consumed,
}

/// A standing trigger condition for one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub kind: RuleKind,
    pub market: MarketKey,
    /// Lower / trigger threshold.
    pub a: Price,
    /// Upper / reference threshold.
    pub b: Price,
    /// Capped order amount; `None` sells the whole free balance.
    pub amount: Option<Amount>,
    /// Last observed proximity to trigger (`>= 1` means triggered).
    pub percent: Decimal,
    /// Last observed bid.
    pub price: Price,
    pub state: RuleState,
    /// Poller iteration that spawned this rule (`None` for configured rules).
    pub origin_iteration: Option<u64>,
}

impl Rule {
    /// Create an active rule with zeroed volatile fields.
    pub fn new(
        id: RuleId,
        kind: RuleKind,
        market: MarketKey,
        a: Price,
        b: Price,
        amount: Option<Amount>,
    ) -> Result<Self> {
        if !a.is_positive() || !b.is_positive() {
            return Err(CoreError::InvalidRule(format!(
                "{kind} rule for {market}: thresholds must be positive (a={a}, b={b})"
            )));
        }
        if let Some(amount) = amount {
            if !amount.is_positive() {
                return Err(CoreError::InvalidAmount(format!(
                    "{kind} rule for {market}: amount must be positive ({amount})"
                )));
            }
        }
        Ok(Self {
            id,
            kind,
            market,
            a,
            b,
            amount,
            percent: Decimal::ZERO,
            price: Price::ZERO,
            state: RuleState::Active,
            origin_iteration: None,
        })
    }

    /// Proximity of `bid` to this rule's trigger; the rule fires at `>= 1`.
    ///
    /// Returns `None` when the divisor is zero.
    pub fn trigger_ratio(&self, bid: Price) -> Option<Decimal> {
        match self.kind {
            RuleKind::Sell | RuleKind::Moon => bid.ratio_to(self.a),
            RuleKind::HardSell => self.b.ratio_to(bid),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == RuleState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn key() -> MarketKey {
        MarketKey::parse("hitbtc2", "EOS/BTC").unwrap()
    }

    #[test]
    fn test_sell_ratio_rises_with_bid() {
        let rule = Rule::new(
            RuleId(1),
            RuleKind::Sell,
            key(),
            Price::new(dec!(0.95)),
            Price::new(dec!(1)),
            None,
        )
        .unwrap();

        assert!(rule.trigger_ratio(Price::new(dec!(0.5))).unwrap() < Decimal::ONE);
        assert!(rule.trigger_ratio(Price::new(dec!(0.95))).unwrap() >= Decimal::ONE);
    }

    #[test]
    fn test_hardsell_ratio_rises_as_bid_falls() {
        let rule = Rule::new(
            RuleId(2),
            RuleKind::HardSell,
            key(),
            Price::new(dec!(0.85)),
            Price::new(dec!(0.95)),
            None,
        )
        .unwrap();

        assert!(rule.trigger_ratio(Price::new(dec!(1.0))).unwrap() < Decimal::ONE);
        assert!(rule.trigger_ratio(Price::new(dec!(0.95))).unwrap() >= Decimal::ONE);
        assert_eq!(rule.trigger_ratio(Price::ZERO), None);
    }

    #[test]
    fn test_rejects_non_positive_thresholds() {
        let result = Rule::new(
            RuleId(3),
            RuleKind::Sell,
            key(),
            Price::ZERO,
            Price::new(dec!(1)),
            None,
        );
        assert!(matches!(result, Err(CoreError::InvalidRule(_))));
    }

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(serde_json::to_string(&RuleKind::HardSell).unwrap(), "\"hardsell\"");
        assert_eq!(
            serde_json::from_str::<RuleKind>("\"moon\"").unwrap(),
            RuleKind::Moon
        );
        assert!(RuleKind::HardSell.is_one_shot());
        assert!(!RuleKind::Sell.is_one_shot());
    }
}
