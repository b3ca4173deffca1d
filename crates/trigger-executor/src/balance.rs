//! Balance check run periodically by pollers.

use tracing::{debug, info, warn};
use trigger_core::MarketKey;
use trigger_exchange::ExchangeAdapter;
use trigger_telemetry::Metrics;

use crate::gate::ExecutionGate;

/// Whether the poller for `market` should keep running.
///
/// Returns `false` only when a live account definitively holds none of the
/// market's base asset. Read-only mode, missing credentials and any fetch
/// or lookup error all answer `true`.
pub async fn check_balance(
    exchange: &dyn ExchangeAdapter,
    gate: &ExecutionGate,
    market: &MarketKey,
) -> bool {
    if let Some(reason) = gate.closed_reason() {
        debug!(%market, reason, "Balance check skipped, assuming balance");
        Metrics::balance_check("assumed");
        return true;
    }

    let asset = market.symbol.base();
    let balance = match exchange.fetch_balance().await {
        Ok(balances) => balances.asset(asset),
        Err(e) => Err(e),
    };

    match balance {
        Ok(balance) if balance.total.is_positive() => {
            debug!(%market, asset, total = %balance.total, "Balance check passed");
            Metrics::balance_check("funded");
            true
        }
        Ok(balance) => {
            info!(%market, asset, total = %balance.total, "No balance left");
            Metrics::balance_check("empty");
            false
        }
        Err(e) => {
            warn!(%market, asset, error = %e, "Balance check failed, assuming balance");
            Metrics::balance_check("assumed");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::ReadOnlyLatch;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use trigger_core::{Amount, ExchangeId};
    use trigger_exchange::{ExchangeCall, MockExchange};

    fn market() -> MarketKey {
        MarketKey::parse("binance", "EOS/BTC").unwrap()
    }

    fn live_gate() -> ExecutionGate {
        let latch = Arc::new(ReadOnlyLatch::new());
        latch.go_live("test");
        ExecutionGate::new(latch, true)
    }

    fn exchange() -> MockExchange {
        MockExchange::new(ExchangeId::new("binance").unwrap(), true)
    }

    #[tokio::test]
    async fn test_read_only_assumes_balance_without_calling() {
        let exchange = exchange();
        let gate = ExecutionGate::new(Arc::new(ReadOnlyLatch::new()), true);

        assert!(check_balance(&exchange, &gate, &market()).await);
        assert!(exchange.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials_assumes_balance() {
        let exchange = MockExchange::new(ExchangeId::new("binance").unwrap(), false);
        let latch = Arc::new(ReadOnlyLatch::new());
        latch.go_live("test");
        let gate = ExecutionGate::new(latch, false);

        assert!(check_balance(&exchange, &gate, &market()).await);
        assert!(exchange.calls().is_empty());
    }

    #[tokio::test]
    async fn test_positive_total_passes() {
        let exchange = exchange();
        exchange.set_balance("EOS", Amount::new(dec!(0)), Amount::new(dec!(5)));

        assert!(check_balance(&exchange, &live_gate(), &market()).await);
        assert_eq!(exchange.calls(), vec![ExchangeCall::FetchBalance]);
    }

    #[tokio::test]
    async fn test_zero_total_stops() {
        let exchange = exchange();
        exchange.set_balance("EOS", Amount::ZERO, Amount::ZERO);

        assert!(!check_balance(&exchange, &live_gate(), &market()).await);
    }

    #[tokio::test]
    async fn test_errors_fail_open() {
        let failing = exchange();
        failing.fail_balance("timeout");
        assert!(check_balance(&failing, &live_gate(), &market()).await);

        let missing_asset = exchange();
        missing_asset.set_balance("BTC", Amount::new(dec!(1)), Amount::new(dec!(1)));
        assert!(check_balance(&missing_asset, &live_gate(), &market()).await);
    }
}
