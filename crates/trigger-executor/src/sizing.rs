//! Order sizing and rounding.

use trigger_core::{Amount, MarketInfo, MarketKey, Price};

use crate::error::{ExecutorError, ExecutorResult};

/// Quantity for a market-style sell.
///
/// Sells the capped amount when that leaves more than the market minimum
/// behind; otherwise sells the whole free balance so no unsellable dust
/// remains. Uncapped rules always sell the whole free balance.
pub fn sell_amount(free: Amount, capped: Option<Amount>, min: Amount) -> Amount {
    match capped {
        Some(capped) if free - capped > min => capped,
        _ => free,
    }
}

/// Round an order to market precision and reject dust.
///
/// Amounts round toward zero; prices round half away from zero.
pub fn prepare_order(
    market: &MarketKey,
    info: &MarketInfo,
    amount: Amount,
    price: Price,
) -> ExecutorResult<(Amount, Price)> {
    let amount = amount.floor_to_precision(info.precision.amount);
    let min = info.min_amount_or_zero();
    if !amount.is_positive() || amount < min {
        return Err(ExecutorError::OrderTooSmall {
            market: market.clone(),
            amount,
            min,
        });
    }
    Ok((amount, price.round_to_precision(info.precision.price)))
}
