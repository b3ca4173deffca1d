//! Market identification and precision types.
//!
//! A market is one trading pair on one exchange. Rules, ticks and pollers
//! are all keyed by [`MarketKey`].

use crate::error::{CoreError, Result};
use crate::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exchange identifier (e.g., "binance", "hitbtc2").
///
/// Used verbatim as the suffix of credential environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExchangeId(String);

impl ExchangeId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
            return Err(CoreError::InvalidExchangeId(id));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ExchangeId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ExchangeId> for String {
    fn from(id: ExchangeId) -> Self {
        id.0
    }
}

impl FromStr for ExchangeId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Trading pair in `BASE/QUOTE` form (e.g., "EOS/BTC").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    raw: String,
    split: usize,
}

impl Symbol {
    pub fn new(symbol: impl Into<String>) -> Result<Self> {
        let raw = symbol.into();
        let split = match raw.find('/') {
            Some(idx) if idx > 0 && idx + 1 < raw.len() && !raw[idx + 1..].contains('/') => idx,
            _ => return Err(CoreError::InvalidSymbol(raw)),
        };
        Ok(Self { raw, split })
    }

    /// Base asset, the one being sold (e.g., "EOS" in "EOS/BTC").
    pub fn base(&self) -> &str {
        &self.raw[..self.split]
    }

    /// Quote asset, the unit of prices (e.g., "BTC" in "EOS/BTC").
    pub fn quote(&self) -> &str {
        &self.raw[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for Symbol {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.raw
    }
}

impl FromStr for Symbol {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Unique market identifier combining exchange and symbol.
///
/// This is the partition key for rules and latest ticks.
/// Format: `{exchange}:{symbol}` (e.g., "binance:ETH/BTC").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketKey {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
}

impl MarketKey {
    pub fn new(exchange: ExchangeId, symbol: Symbol) -> Self {
        Self { exchange, symbol }
    }

    /// Parse from exchange and symbol strings.
    pub fn parse(exchange: &str, symbol: &str) -> Result<Self> {
        Ok(Self {
            exchange: ExchangeId::new(exchange)?,
            symbol: Symbol::new(symbol)?,
        })
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

/// Decimal places accepted by the exchange for a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPrecision {
    /// Decimal places for order amounts.
    pub amount: u32,
    /// Decimal places for order prices.
    pub price: u32,
}

impl Default for MarketPrecision {
    fn default() -> Self {
        Self {
            amount: 8,
            price: 8,
        }
    }
}

/// Market metadata used to shape orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MarketInfo {
    pub precision: MarketPrecision,
    /// Minimum tradable amount, if the exchange declares one.
    #[serde(default)]
    pub min_amount: Option<Amount>,
}

impl MarketInfo {
    /// Minimum amount, zero when undeclared.
    pub fn min_amount_or_zero(&self) -> Amount {
        self.min_amount.unwrap_or(Amount::ZERO)
    }
}
