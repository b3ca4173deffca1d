//! Rule evaluation.
//!
//! One pass per tick over the rules of the tick's market:
//!
//! | Kind | Fires when | Effect |
//! |---|---|---|
//! | sell | `bid / a >= 1` | re-arm `a`, append moon + hardsell rules, cancel and place moon order |
//! | moon | `bid / a >= 1` | cancel and market-style sell |
//! | hardsell | `b / bid >= 1` | cancel and market-style sell |
//!
//! Rules appended during a pass are first evaluated on the next tick.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};
use trigger_core::{Amount, MarketKey, Price, RuleId, RuleKind, Tick};
use trigger_telemetry::Metrics;

use crate::book::RuleBook;
use crate::error::{RulesError, RulesResult};
use crate::params::{OneShotPolicy, TriggerParams};

/// An order-side effect of a firing, executed in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OrderAction {
    /// Cancel every open order on the market.
    CancelOpenOrders,
    /// Limit sell of the whole free balance at a take-profit price.
    PlaceMoonOrder { price: Price },
    /// Aggressive limit sell; `amount` caps the quantity.
    MarketSell {
        price: Price,
        amount: Option<Amount>,
    },
}

impl OrderAction {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            OrderAction::CancelOpenOrders => "cancel",
            OrderAction::PlaceMoonOrder { .. } => "moon",
            OrderAction::MarketSell { .. } => "market_sell",
        }
    }
}

/// One rule that fired on a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Firing {
    pub rule_id: RuleId,
    pub kind: RuleKind,
    pub market: MarketKey,
    pub bid: Price,
    pub percent: Decimal,
    pub actions: Vec<OrderAction>,
    /// Rules appended because of this firing.
    pub spawned: Vec<RuleId>,
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Rules whose percent and price were updated.
    pub evaluated: usize,
    /// Firings in rule order.
    pub firings: Vec<Firing>,
}

impl Evaluation {
    pub fn fired(&self) -> bool {
        !self.firings.is_empty()
    }
}

/// Prices derived from one bid, computed before any rule is touched.
#[derive(Debug, Clone, Copy)]
struct Targets {
    rearm: Price,
    moon: Price,
    hardsell_low: Price,
    hardsell_high: Price,
    market_sell: Price,
}

/// Rule state machine.
#[derive(Debug, Clone, Default)]
pub struct RuleEvaluator {
    params: TriggerParams,
}

impl RuleEvaluator {
    pub fn new(params: TriggerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TriggerParams {
        &self.params
    }

    /// Evaluate `book` against `tick`.
    ///
    /// Fails without touching any rule when the tick belongs to another
    /// market, carries no positive bid, or a derived price overflows.
    pub fn evaluate(&self, book: &mut RuleBook, tick: &Tick) -> RulesResult<Evaluation> {
        if tick.market != *book.market() {
            return Err(RulesError::MarketMismatch {
                tick: tick.market.clone(),
                book: book.market().clone(),
            });
        }
        if !tick.has_valid_bid() {
            return Err(RulesError::InvalidTick {
                market: tick.market.clone(),
                reason: format!("bid must be positive, got {}", tick.bid),
            });
        }

        let bid = tick.bid;
        let targets = self.targets(&tick.market, bid)?;
        let market_label = tick.market.to_string();
        let present = book.len();
        let mut evaluation = Evaluation::default();

        for index in 0..present {
            let Some(rule) = book.rule_mut(index) else {
                break;
            };
            let Some(percent) = rule.trigger_ratio(bid) else {
                continue;
            };
            rule.percent = percent;
            rule.price = bid;
            evaluation.evaluated += 1;
            Metrics::rule_evaluated(rule.kind.as_str());

            if !rule.is_active() || percent < Decimal::ONE {
                continue;
            }

            let (rule_id, kind, amount) = (rule.id, rule.kind, rule.amount);
            let firing = match kind {
                RuleKind::Sell => {
                    rule.a = targets.rearm;
                    let rearmed = rule.a;
                    let spawned = self.spawn_follow_ups(book, &targets, amount, tick.iteration)?;
                    info!(
                        market = %tick.market,
                        rule = %rule_id,
                        %bid,
                        %percent,
                        rearmed_at = %rearmed,
                        "Sell rule fired"
                    );
                    Firing {
                        rule_id,
                        kind,
                        market: tick.market.clone(),
                        bid,
                        percent,
                        actions: vec![
                            OrderAction::CancelOpenOrders,
                            OrderAction::PlaceMoonOrder {
                                price: targets.moon,
                            },
                        ],
                        spawned,
                    }
                }
                RuleKind::Moon | RuleKind::HardSell => {
                    info!(
                        market = %tick.market,
                        rule = %rule_id,
                        %kind,
                        %bid,
                        %percent,
                        "Exit rule fired"
                    );
                    Firing {
                        rule_id,
                        kind,
                        market: tick.market.clone(),
                        bid,
                        percent,
                        actions: vec![
                            OrderAction::CancelOpenOrders,
                            OrderAction::MarketSell {
                                price: targets.market_sell,
                                amount,
                            },
                        ],
                        spawned: Vec::new(),
                    }
                }
            };

            Metrics::rule_fired(&market_label, kind.as_str());
            evaluation.firings.push(firing);
        }

        debug!(
            market = %tick.market,
            iteration = tick.iteration,
            evaluated = evaluation.evaluated,
            fired = evaluation.firings.len(),
            "Rules evaluated"
        );
        Metrics::rules_held(&market_label, book.len());
        Ok(evaluation)
    }

    /// Apply the lifecycle policy once a firing's actions have run.
    ///
    /// Returns true if the rule was marked consumed. Simulated execution
    /// never consumes a rule.
    pub fn settle(&self, book: &mut RuleBook, firing: &Firing, executed_live: bool) -> bool {
        if self.params.one_shot_policy != OneShotPolicy::Consume
            || !firing.kind.is_one_shot()
            || !executed_live
        {
            return false;
        }
        let consumed = book.mark_consumed(firing.rule_id);
        if consumed {
            debug!(market = %firing.market, rule = %firing.rule_id, "Rule consumed");
        }
        consumed
    }

    fn targets(&self, market: &MarketKey, bid: Price) -> RulesResult<Targets> {
        let scale = |factor: Decimal, name: &'static str| {
            bid.checked_mul(factor).ok_or_else(|| RulesError::PriceOverflow {
                market: market.clone(),
                bid,
                factor: name,
            })
        };
        Ok(Targets {
            rearm: scale(self.params.sell_rearm, "sell_rearm")?,
            moon: scale(self.params.moon_multiple, "moon_multiple")?,
            hardsell_low: scale(self.params.hardsell_low, "hardsell_low")?,
            hardsell_high: scale(self.params.hardsell_high, "hardsell_high")?,
            market_sell: scale(self.params.market_sell_factor, "market_sell_factor")?,
        })
    }

    fn spawn_follow_ups(
        &self,
        book: &mut RuleBook,
        targets: &Targets,
        amount: Option<Amount>,
        iteration: u64,
    ) -> RulesResult<Vec<RuleId>> {
        let moon_id = book.spawn(RuleKind::Moon, targets.moon, targets.moon, amount, iteration)?;
        let hardsell_id = book.spawn(
            RuleKind::HardSell,
            targets.hardsell_low,
            targets.hardsell_high,
            amount,
            iteration,
        )?;
        Metrics::rule_spawned(RuleKind::Moon.as_str());
        Metrics::rule_spawned(RuleKind::HardSell.as_str());
        Ok(vec![moon_id, hardsell_id])
    }
}
