//! API credential lookup.
//!
//! Credentials are read from `APIKEY_<exchange>` and `APISECRET_<exchange>`,
//! where `<exchange>` is the exchange id verbatim (e.g., `APIKEY_binance`).

use std::fmt;

use trigger_core::ExchangeId;

/// Environment variable prefix for API keys.
pub const API_KEY_PREFIX: &str = "APIKEY_";
/// Environment variable prefix for API secrets.
pub const API_SECRET_PREFIX: &str = "APISECRET_";

/// API key pair for one exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
        }
    }

    /// Read credentials from the process environment.
    ///
    /// Returns `None` unless both variables are set and non-empty.
    pub fn from_env(exchange: &ExchangeId) -> Option<Self> {
        Self::from_lookup(exchange, |name| std::env::var(name).ok())
    }

    /// Read credentials through an arbitrary lookup function.
    pub fn from_lookup<F>(exchange: &ExchangeId, lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(&format!("{API_KEY_PREFIX}{exchange}"))?;
        let secret = lookup(&format!("{API_SECRET_PREFIX}{exchange}"))?;
        if api_key.trim().is_empty() || secret.trim().is_empty() {
            return None;
        }
        Some(Self { api_key, secret })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}
