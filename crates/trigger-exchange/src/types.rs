//! Exchange response types.

use crate::error::{ExchangeError, ExchangeResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use trigger_core::{Amount, Price, Symbol};

/// Exchange-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ticker as reported by the exchange. Any field may be missing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ticker {
    pub bid: Option<Price>,
    pub ask: Option<Price>,
    pub last: Option<Price>,
    pub datetime: Option<DateTime<Utc>>,
}

impl Ticker {
    /// Ticker carrying only a bid.
    pub fn from_bid(bid: Price) -> Self {
        Self {
            bid: Some(bid),
            ..Default::default()
        }
    }
}

/// An order still resting on the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub id: OrderId,
    pub symbol: Symbol,
    pub price: Option<Price>,
}

/// Holdings of a single asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetBalance {
    /// Available for new orders.
    pub free: Amount,
    /// Free plus amounts locked in open orders.
    pub total: Amount,
}

/// Account balances keyed by asset code.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Balances {
    assets: HashMap<String, AssetBalance>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: impl Into<String>, balance: AssetBalance) {
        self.assets.insert(asset.into(), balance);
    }

    /// Typed lookup; a missing asset is an error rather than an implicit zero.
    pub fn asset(&self, asset: &str) -> ExchangeResult<AssetBalance> {
        self.assets
            .get(asset)
            .copied()
            .ok_or_else(|| ExchangeError::AssetNotFound(asset.to_string()))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Parse a JSON number or numeric string into a `Decimal`.
///
/// Handles exponent notation (`1e-8`), which ccxt emits for small values.
pub(crate) fn decimal_from_value(value: &serde_json::Value) -> Option<Decimal> {
    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
