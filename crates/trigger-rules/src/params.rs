//! Trigger multipliers and rule lifecycle policy.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What happens to a moon or hardsell rule after it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OneShotPolicy {
    /// Keep the rule active; it fires again on every qualifying tick.
    #[default]
    Refire,
    /// Mark the rule consumed once its live sell has gone through.
    Consume,
}

/// Price multipliers applied when rules fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerParams {
    /// New sell threshold relative to the firing bid.
    #[serde(default = "default_sell_rearm")]
    pub sell_rearm: Decimal,
    /// Moon take-profit price relative to the firing bid.
    #[serde(default = "default_moon_multiple")]
    pub moon_multiple: Decimal,
    /// Spawned hardsell `a` relative to the firing bid.
    #[serde(default = "default_hardsell_low")]
    pub hardsell_low: Decimal,
    /// Spawned hardsell `b` (its trigger) relative to the firing bid.
    #[serde(default = "default_hardsell_high")]
    pub hardsell_high: Decimal,
    /// Limit price of a market-style sell relative to the bid.
    #[serde(default = "default_market_sell_factor")]
    pub market_sell_factor: Decimal,
    #[serde(default)]
    pub one_shot_policy: OneShotPolicy,
}

fn default_sell_rearm() -> Decimal {
    Decimal::new(105, 2)
}

fn default_moon_multiple() -> Decimal {
    Decimal::from(2)
}

fn default_hardsell_low() -> Decimal {
    Decimal::new(85, 2)
}

fn default_hardsell_high() -> Decimal {
    Decimal::new(95, 2)
}

fn default_market_sell_factor() -> Decimal {
    Decimal::new(98, 2)
}

impl Default for TriggerParams {
    fn default() -> Self {
        Self {
            sell_rearm: default_sell_rearm(),
            moon_multiple: default_moon_multiple(),
            hardsell_low: default_hardsell_low(),
            hardsell_high: default_hardsell_high(),
            market_sell_factor: default_market_sell_factor(),
            one_shot_policy: OneShotPolicy::default(),
        }
    }
}

/// Largest accepted multiplier.
pub const MAX_MULTIPLIER: Decimal = Decimal::ONE_THOUSAND;

impl TriggerParams {
    /// Validate multiplier values.
    ///
    /// Returns Err if:
    /// - any multiplier is not positive or exceeds [`MAX_MULTIPLIER`]
    /// - hardsell_low > hardsell_high
    /// - sell_rearm <= 1 (a re-armed sell would fire again at the same bid)
    pub fn validate(&self) -> Result<(), String> {
        let all = [
            ("sell_rearm", self.sell_rearm),
            ("moon_multiple", self.moon_multiple),
            ("hardsell_low", self.hardsell_low),
            ("hardsell_high", self.hardsell_high),
            ("market_sell_factor", self.market_sell_factor),
        ];
        for (name, value) in all {
            if value <= Decimal::ZERO {
                return Err(format!("{name} must be positive, got {value}"));
            }
            if value > MAX_MULTIPLIER {
                return Err(format!(
                    "{name} must not exceed {MAX_MULTIPLIER}, got {value}"
                ));
            }
        }
        if self.hardsell_low > self.hardsell_high {
            return Err(format!(
                "hardsell_low ({}) must not exceed hardsell_high ({})",
                self.hardsell_low, self.hardsell_high
            ));
        }
        if self.sell_rearm <= Decimal::ONE {
            return Err(format!(
                "sell_rearm must be greater than 1, got {}",
                self.sell_rearm
            ));
        }
        Ok(())
    }
}
