//! Application configuration.
//!
//! Loaded from a TOML file and layered with `TRIGGER__*` environment
//! overrides (e.g. `TRIGGER__CONTROL__PORT=8080`). Markets and rules can be
//! given inline or in JSON files using the compact keys `m`, `e` and `t`:
//!
//! ```json
//! [{"m": "EOS/BTC", "e": "hitbtc2"}]
//! [{"t": "sell", "a": 0.0016, "b": 1, "m": "EOS/BTC", "e": "hitbtc2"}]
//! ```

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trigger_control::ControlConfig;
use trigger_core::{Amount, MarketKey, Price, RuleKind};
use trigger_exchange::CcxtRestConfig;
use trigger_feed::PollerConfig;
use trigger_rules::{RuleStore, TriggerParams};

use crate::error::{AppError, AppResult};

/// Environment prefix for overrides.
pub const ENV_PREFIX: &str = "TRIGGER";

/// One market to poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEntry {
    /// Exchange id (e.g., "hitbtc2").
    #[serde(alias = "e")]
    pub exchange: String,
    /// Unified symbol (e.g., "EOS/BTC").
    #[serde(alias = "m")]
    pub symbol: String,
}

impl MarketEntry {
    pub fn key(&self) -> AppResult<MarketKey> {
        Ok(MarketKey::parse(&self.exchange, &self.symbol)?)
    }
}

/// One configured rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEntry {
    #[serde(alias = "t")]
    pub kind: RuleKind,
    #[serde(alias = "e")]
    pub exchange: String,
    #[serde(alias = "m")]
    pub symbol: String,
    pub a: Decimal,
    pub b: Decimal,
    /// Capped sell amount; omit to sell the whole free balance.
    #[serde(default)]
    pub amount: Option<Decimal>,
}

impl RuleEntry {
    pub fn key(&self) -> AppResult<MarketKey> {
        Ok(MarketKey::parse(&self.exchange, &self.symbol)?)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Minimum interval between exchange requests, across all pollers (ms).
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,

    #[serde(default)]
    pub poller: PollerConfig,

    #[serde(default)]
    pub triggers: TriggerParams,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub gateway: CcxtRestConfig,

    #[serde(default)]
    pub markets: Vec<MarketEntry>,

    #[serde(default)]
    pub rules: Vec<RuleEntry>,

    /// JSON file with additional markets.
    #[serde(default)]
    pub markets_file: Option<String>,

    /// JSON file with additional rules.
    #[serde(default)]
    pub rules_file: Option<String>,
}

fn default_rate_limit_ms() -> u64 {
    4000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: default_rate_limit_ms(),
            poller: PollerConfig::default(),
            triggers: TriggerParams::default(),
            control: ControlConfig::default(),
            gateway: CcxtRestConfig::default(),
            markets: Vec::new(),
            rules: Vec::new(),
            markets_file: None,
            rules_file: None,
        }
    }
}

impl AppConfig {
    /// Load from a TOML file with environment overrides, then merge the
    /// market and rule files it names.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut config: Self = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| AppError::Config(format!("Failed to load {path}: {e}")))?
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to parse {path}: {e}")))?;

        config.merge_files()?;
        Ok(config)
    }

    /// Parse TOML text without environment overrides or file merging.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Append entries from `markets_file` and `rules_file`.
    pub fn merge_files(&mut self) -> AppResult<()> {
        if let Some(path) = &self.markets_file {
            let extra: Vec<MarketEntry> = read_json(path)?;
            tracing::info!(path = %path, count = extra.len(), "Loaded markets file");
            self.markets.extend(extra);
        }
        if let Some(path) = &self.rules_file {
            let extra: Vec<RuleEntry> = read_json(path)?;
            tracing::info!(path = %path, count = extra.len(), "Loaded rules file");
            self.rules.extend(extra);
        }
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> AppResult<()> {
        if self.rate_limit_ms == 0 {
            return Err(AppError::Config("rate_limit_ms must be positive".to_string()));
        }
        self.poller.validate().map_err(AppError::Config)?;
        self.triggers.validate().map_err(AppError::Config)?;

        let markets = self.market_keys()?;
        if markets.is_empty() {
            return Err(AppError::Config("no markets configured".to_string()));
        }
        let mut seen = HashSet::new();
        for market in &markets {
            if !seen.insert(market.clone()) {
                return Err(AppError::Config(format!("market {market} listed twice")));
            }
        }

        for rule in &self.rules {
            let key = rule.key()?;
            if rule.a <= Decimal::ZERO || rule.b <= Decimal::ZERO {
                return Err(AppError::Config(format!(
                    "{} rule for {key}: a and b must be positive",
                    rule.kind
                )));
            }
            if rule.amount.is_some_and(|amount| amount <= Decimal::ZERO) {
                return Err(AppError::Config(format!(
                    "{} rule for {key}: amount must be positive",
                    rule.kind
                )));
            }
            if !seen.contains(&key) {
                return Err(AppError::Config(format!(
                    "{} rule references unpolled market {key}",
                    rule.kind
                )));
            }
        }
        Ok(())
    }

    pub fn market_keys(&self) -> AppResult<Vec<MarketKey>> {
        self.markets.iter().map(MarketEntry::key).collect()
    }

    /// Build the rule store: one partition per market, configured rules in order.
    pub fn build_rule_store(&self) -> AppResult<RuleStore> {
        let store = RuleStore::with_markets(self.market_keys()?);
        for rule in &self.rules {
            store.insert(
                rule.kind,
                &rule.key()?,
                Price::new(rule.a),
                Price::new(rule.b),
                rule.amount.map(Amount::new),
            )?;
        }
        Ok(store)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> AppResult<Vec<T>> {
    if !Path::new(path).exists() {
        return Err(AppError::Config(format!("file not found: {path}")));
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| AppError::Config(format!("Failed to parse {path}: {e}")))
}
