//! HTTP adapter for a ccxt-rest style gateway.
//!
//! The gateway hosts one ccxt exchange instance per (exchange, instance id)
//! and exposes unified ccxt calls over REST:
//!
//! | Call | Request |
//! |---|---|
//! | create instance | `POST /exchanges/{exchange}` |
//! | markets | `GET /exchanges/{exchange}/{instance}/markets` |
//! | ticker | `GET /exchanges/{exchange}/{instance}/ticker?symbol=` |
//! | balance | `GET /exchanges/{exchange}/{instance}/balances` |
//! | open orders | `GET /exchanges/{exchange}/{instance}/orders/open?symbol=` |
//! | cancel | `DELETE /exchanges/{exchange}/{instance}/order/{id}?symbol=` |
//! | limit sell | `POST /exchanges/{exchange}/{instance}/order` |
//!
//! Credentials are attached when the instance is created, which is the
//! adapter's authentication step.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use trigger_core::{Amount, ExchangeId, MarketInfo, MarketPrecision, Price, Symbol};

use crate::adapter::{BoxFuture, ExchangeAdapter, Markets};
use crate::credentials::Credentials;
use crate::error::{ExchangeError, ExchangeResult};
use crate::types::{decimal_from_value, AssetBalance, Balances, OpenOrder, OrderId, Ticker};

/// Gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CcxtRestConfig {
    /// Gateway base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Prefix for gateway instance ids (`{prefix}-{exchange}`).
    #[serde(default = "default_instance_prefix")]
    pub instance_prefix: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_instance_prefix() -> String {
    "trigger".to_string()
}

impl Default for CcxtRestConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            instance_prefix: default_instance_prefix(),
        }
    }
}

/// Exchange adapter backed by a ccxt-rest gateway.
pub struct CcxtRestExchange {
    client: Client,
    base_url: String,
    exchange: ExchangeId,
    instance: String,
    credentials: Option<Credentials>,
    instance_ready: OnceCell<()>,
    markets: RwLock<Option<Markets>>,
}

impl CcxtRestExchange {
    /// Create an adapter for one exchange.
    ///
    /// No request is made until the first call.
    pub fn new(
        config: &CcxtRestConfig,
        exchange: ExchangeId,
        credentials: Option<Credentials>,
    ) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            instance: format!("{}-{}", config.instance_prefix, exchange),
            exchange,
            credentials,
            instance_ready: OnceCell::new(),
            markets: RwLock::new(None),
        })
    }

    fn instance_url(&self, tail: &str) -> String {
        format!(
            "{}/exchanges/{}/{}/{}",
            self.base_url, self.exchange, self.instance, tail
        )
    }

    /// Create the gateway instance once, attaching credentials if present.
    async fn ensure_instance(&self) -> ExchangeResult<()> {
        self.instance_ready
            .get_or_try_init(|| async {
                let mut body = json!({
                    "id": self.instance,
                    "enableRateLimit": true,
                });
                if let Some(creds) = &self.credentials {
                    body["apiKey"] = json!(creds.api_key);
                    body["secret"] = json!(creds.secret);
                }

                let url = format!("{}/exchanges/{}", self.base_url, self.exchange);
                let response = self
                    .client
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| ExchangeError::HttpClient(format!("HTTP request failed: {e}")))?;

                let status = response.status();
                // An instance left over from a previous run is reused.
                if !status.is_success() && status != StatusCode::CONFLICT {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ExchangeError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }

                info!(
                    exchange = %self.exchange,
                    instance = %self.instance,
                    authenticated = self.credentials.is_some(),
                    "Gateway exchange instance ready"
                );
                Ok(())
            })
            .await
            .map(|_| ())
    }

    async fn call(&self, request: RequestBuilder) -> ExchangeResult<Value> {
        self.ensure_instance().await?;

        let response = request
            .send()
            .await
            .map_err(|e| ExchangeError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ExchangeError::Parse(format!("Failed to read response: {e}")))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl ExchangeAdapter for CcxtRestExchange {
    fn id(&self) -> &ExchangeId {
        &self.exchange
    }

    fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn fetch_ticker<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, ExchangeResult<Ticker>> {
        Box::pin(async move {
            let request = self
                .client
                .get(self.instance_url("ticker"))
                .query(&[("symbol", symbol.as_str())]);
            let body = self.call(request).await?;
            parse_ticker(&body)
        })
    }

    fn fetch_balance(&self) -> BoxFuture<'_, ExchangeResult<Balances>> {
        Box::pin(async move {
            let request = self.client.get(self.instance_url("balances"));
            let body = self.call(request).await?;
            parse_balances(&body)
        })
    }

    fn fetch_open_orders<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, ExchangeResult<Vec<OpenOrder>>> {
        Box::pin(async move {
            let request = self
                .client
                .get(self.instance_url("orders/open"))
                .query(&[("symbol", symbol.as_str())]);
            let body = self.call(request).await?;
            parse_open_orders(&body, symbol)
        })
    }

    fn cancel_order<'a>(
        &'a self,
        id: &'a OrderId,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, ExchangeResult<()>> {
        Box::pin(async move {
            let request = self
                .client
                .delete(self.instance_url(&format!("order/{id}")))
                .query(&[("symbol", symbol.as_str())]);
            self.call(request).await?;
            debug!(exchange = %self.exchange, %symbol, order_id = %id, "Order cancelled");
            Ok(())
        })
    }

    fn create_limit_sell_order<'a>(
        &'a self,
        symbol: &'a Symbol,
        amount: Amount,
        price: Price,
    ) -> BoxFuture<'a, ExchangeResult<OrderId>> {
        Box::pin(async move {
            let body = json!({
                "symbol": symbol.as_str(),
                "type": "limit",
                "side": "sell",
                "amount": json_number(amount.inner())?,
                "price": json_number(price.inner())?,
            });
            let request = self.client.post(self.instance_url("order")).json(&body);
            let response = self.call(request).await?;

            response
                .get("id")
                .and_then(id_from_value)
                .map(OrderId::new)
                .ok_or_else(|| ExchangeError::OrderRejected(format!("no order id in {response}")))
        })
    }

    fn load_markets(&self) -> BoxFuture<'_, ExchangeResult<Markets>> {
        Box::pin(async move {
            if let Some(markets) = self.markets.read().clone() {
                return Ok(markets);
            }

            let request = self.client.get(self.instance_url("markets"));
            let body = self.call(request).await?;
            let markets = Arc::new(parse_markets(&body)?);
            debug!(exchange = %self.exchange, count = markets.len(), "Markets loaded");

            *self.markets.write() = Some(markets.clone());
            Ok(markets)
        })
    }
}

fn json_number(value: Decimal) -> ExchangeResult<Value> {
    value
        .to_f64()
        .map(|v| json!(v))
        .ok_or_else(|| ExchangeError::Parse(format!("{value} is not representable as a number")))
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn price_field(value: &Value, field: &str) -> Option<Price> {
    value.get(field).and_then(decimal_from_value).map(Price::new)
}

fn parse_ticker(body: &Value) -> ExchangeResult<Ticker> {
    if !body.is_object() {
        return Err(ExchangeError::Parse(format!("unexpected ticker payload: {body}")));
    }

    let datetime = body
        .get("datetime")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            body.get("timestamp")
                .and_then(Value::as_i64)
                .and_then(DateTime::from_timestamp_millis)
        });

    Ok(Ticker {
        bid: price_field(body, "bid"),
        ask: price_field(body, "ask"),
        last: price_field(body, "last"),
        datetime,
    })
}

/// Keys of a unified ccxt balance that are not assets.
const BALANCE_META_KEYS: [&str; 6] = ["info", "free", "used", "total", "timestamp", "datetime"];

fn parse_balances(body: &Value) -> ExchangeResult<Balances> {
    let object = body
        .as_object()
        .ok_or_else(|| ExchangeError::Parse(format!("unexpected balance payload: {body}")))?;

    let mut balances = Balances::new();
    for (asset, entry) in object {
        if BALANCE_META_KEYS.contains(&asset.as_str()) || !entry.is_object() {
            continue;
        }
        let free = entry.get("free").and_then(decimal_from_value);
        let total = entry.get("total").and_then(decimal_from_value);
        if free.is_none() && total.is_none() {
            continue;
        }
        let free = free.unwrap_or(Decimal::ZERO);
        balances.insert(
            asset.clone(),
            AssetBalance {
                free: Amount::new(free),
                total: Amount::new(total.unwrap_or(free)),
            },
        );
    }
    Ok(balances)
}

fn parse_open_orders(body: &Value, requested: &Symbol) -> ExchangeResult<Vec<OpenOrder>> {
    let entries = body
        .as_array()
        .ok_or_else(|| ExchangeError::Parse(format!("unexpected open orders payload: {body}")))?;

    entries
        .iter()
        .map(|entry| {
            let id = entry
                .get("id")
                .and_then(id_from_value)
                .ok_or_else(|| ExchangeError::Parse(format!("open order without id: {entry}")))?;
            let symbol = match entry.get("symbol").and_then(Value::as_str) {
                Some(s) => Symbol::new(s)?,
                None => requested.clone(),
            };
            Ok(OpenOrder {
                id: OrderId::new(id),
                symbol,
                price: price_field(entry, "price"),
            })
        })
        .collect()
}

/// Decimal places from a ccxt precision value.
///
/// Older exchanges report a place count (`8`), newer ones a tick size
/// (`0.00000001`); both map to the same place count.
fn precision_places(value: &Value) -> Option<u32> {
    let precision = decimal_from_value(value)?;
    if precision <= Decimal::ZERO {
        return None;
    }
    if precision >= Decimal::ONE {
        return precision.trunc().to_u32();
    }
    Some(precision.normalize().scale())
}

fn parse_market(entry: &Value) -> MarketInfo {
    let defaults = MarketPrecision::default();
    let precision = entry.get("precision");
    let amount = precision
        .and_then(|p| p.get("amount"))
        .and_then(precision_places)
        .unwrap_or(defaults.amount);
    let price = precision
        .and_then(|p| p.get("price"))
        .and_then(precision_places)
        .unwrap_or(defaults.price);

    let min_amount = entry
        .pointer("/limits/amount/min")
        .and_then(decimal_from_value)
        .filter(|min| *min > Decimal::ZERO)
        .map(Amount::new);

    MarketInfo {
        precision: MarketPrecision { amount, price },
        min_amount,
    }
}

fn parse_markets(body: &Value) -> ExchangeResult<HashMap<Symbol, MarketInfo>> {
    let mut markets = HashMap::new();
    match body {
        Value::Object(map) => {
            for (symbol, entry) in map {
                if let Ok(symbol) = Symbol::new(symbol.as_str()) {
                    markets.insert(symbol, parse_market(entry));
                }
            }
        }
        Value::Array(entries) => {
            for entry in entries {
                let Some(symbol) = entry.get("symbol").and_then(Value::as_str) else {
                    continue;
                };
                if let Ok(symbol) = Symbol::new(symbol) {
                    markets.insert(symbol, parse_market(entry));
                }
            }
        }
        other => {
            return Err(ExchangeError::Parse(format!("unexpected markets payload: {other}")));
        }
    }
    Ok(markets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn gateway() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exchanges/binance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "trigger-binance"})))
            .mount(&server)
            .await;
        server
    }

    fn adapter(server: &MockServer, credentials: Option<Credentials>) -> CcxtRestExchange {
        let config = CcxtRestConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        CcxtRestExchange::new(&config, ExchangeId::new("binance").unwrap(), credentials).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_ticker() {
        let server = gateway().await;
        Mock::given(method("GET"))
            .and(path("/exchanges/binance/trigger-binance/ticker"))
            .and(query_param("symbol", "ETH/BTC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "symbol": "ETH/BTC",
                "bid": 0.0512,
                "ask": 0.0513,
                "last": null,
                "datetime": "2018-01-15T10:00:00.000Z",
            })))
            .mount(&server)
            .await;

        let exchange = adapter(&server, None);
        let ticker = exchange
            .fetch_ticker(&Symbol::new("ETH/BTC").unwrap())
            .await
            .unwrap();

        assert_eq!(ticker.bid, Some(Price::new(dec!(0.0512))));
        assert_eq!(ticker.ask, Some(Price::new(dec!(0.0513))));
        assert_eq!(ticker.last, None);
        assert_eq!(
            ticker.datetime.unwrap().to_rfc3339(),
            "2018-01-15T10:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_instance_created_with_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exchanges/binance"))
            .and(body_partial_json(json!({"apiKey": "k", "secret": "s"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/exchanges/binance/trigger-binance/balances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "info": {},
                "EOS": {"free": 1.5, "used": 0.5, "total": 2.0},
                "BTC": {"free": 0.1, "used": 0, "total": 0.1},
                "free": {"EOS": 1.5, "BTC": 0.1},
                "total": {"EOS": 2.0, "BTC": 0.1},
            })))
            .expect(2)
            .mount(&server)
            .await;

        let exchange = adapter(&server, Some(Credentials::new("k", "s")));
        assert!(exchange.has_credentials());

        let balances = exchange.fetch_balance().await.unwrap();
        let _ = exchange.fetch_balance().await.unwrap();

        assert_eq!(balances.len(), 2);
        let eos = balances.asset("EOS").unwrap();
        assert_eq!(eos.free, Amount::new(dec!(1.5)));
        assert_eq!(eos.total, Amount::new(dec!(2)));
    }

    #[tokio::test]
    async fn test_http_error_status_is_reported() {
        let server = gateway().await;
        Mock::given(method("GET"))
            .and(path("/exchanges/binance/trigger-binance/ticker"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let exchange = adapter(&server, None);
        let err = exchange
            .fetch_ticker(&Symbol::new("ETH/BTC").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ExchangeError::Status { status: 502, ref body } if body == "upstream down"
        ));
    }

    #[tokio::test]
    async fn test_markets_are_cached() {
        let server = gateway().await;
        Mock::given(method("GET"))
            .and(path("/exchanges/binance/trigger-binance/markets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ETH/BTC": {
                    "precision": {"amount": 3, "price": 6},
                    "limits": {"amount": {"min": 0.001}},
                },
                "EOS/BTC": {
                    "precision": {"amount": 0.01, "price": 1e-7},
                    "limits": {"amount": {"min": null}},
                },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let exchange = adapter(&server, None);
        let eth = exchange
            .market_info(&Symbol::new("ETH/BTC").unwrap())
            .await
            .unwrap();
        let eos = exchange
            .market_info(&Symbol::new("EOS/BTC").unwrap())
            .await
            .unwrap();

        assert_eq!(eth.precision, MarketPrecision { amount: 3, price: 6 });
        assert_eq!(eth.min_amount, Some(Amount::new(dec!(0.001))));
        assert_eq!(eos.precision, MarketPrecision { amount: 2, price: 7 });
        assert_eq!(eos.min_amount, None);

        let missing = exchange
            .market_info(&Symbol::new("XVG/BTC").unwrap())
            .await;
        assert!(matches!(missing, Err(ExchangeError::MarketNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_limit_sell_order() {
        let server = gateway().await;
        Mock::given(method("POST"))
            .and(path("/exchanges/binance/trigger-binance/order"))
            .and(body_partial_json(json!({
                "symbol": "ETH/BTC",
                "type": "limit",
                "side": "sell",
                "amount": 1.25,
                "price": 0.1,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 98765})))
            .expect(1)
            .mount(&server)
            .await;

        let exchange = adapter(&server, Some(Credentials::new("k", "s")));
        let order_id = exchange
            .create_limit_sell_order(
                &Symbol::new("ETH/BTC").unwrap(),
                Amount::new(dec!(1.25)),
                Price::new(dec!(0.1)),
            )
            .await
            .unwrap();

        assert_eq!(order_id, OrderId::new("98765"));
    }

    #[tokio::test]
    async fn test_open_orders_and_cancel() {
        let server = gateway().await;
        Mock::given(method("GET"))
            .and(path("/exchanges/binance/trigger-binance/orders/open"))
            .and(query_param("symbol", "ETH/BTC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "a1", "symbol": "ETH/BTC", "price": 0.2},
                {"id": "a2", "price": null},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/exchanges/binance/trigger-binance/order/a1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let exchange = adapter(&server, Some(Credentials::new("k", "s")));
        let symbol = Symbol::new("ETH/BTC").unwrap();
        let orders = exchange.fetch_open_orders(&symbol).await.unwrap();

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].price, Some(Price::new(dec!(0.2))));
        assert_eq!(orders[1].symbol, symbol);

        exchange.cancel_order(&orders[0].id, &symbol).await.unwrap();
    }

    #[test]
    fn test_precision_places() {
        assert_eq!(precision_places(&json!(8)), Some(8));
        assert_eq!(precision_places(&json!(0.0001)), Some(4));
        assert_eq!(precision_places(&json!(1)), Some(1));
        assert_eq!(precision_places(&json!(0)), None);
    }
}
