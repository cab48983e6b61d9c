// src/normalization.rs
//
// Price, reserve and fee figures derived from the decimal strings the subgraph
// indexes. Prices are display values computed in f64; reserves are passed
// through verbatim.

use crate::types::{PoolToken, Reserves};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Magnitudes outside this range render in exponent form, like a JS number.
const PLAIN_NOTATION_MIN: f64 = 1e-7;
const PLAIN_NOTATION_MAX: f64 = 1e21;

fn parse_amount(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

/// Shortest round-trippable rendering of `value`.
pub fn format_f64(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude == 0.0 || (PLAIN_NOTATION_MIN..PLAIN_NOTATION_MAX).contains(&magnitude) {
        format!("{}", value)
    } else {
        format!("{:e}", value)
    }
}

/// `amount_out / amount_in` as a decimal string, or `"0"` when either side is
/// unparseable or zero, or the ratio is not finite.
pub fn calculate_price(amount_in: &str, amount_out: &str) -> String {
    let (Some(amount_in), Some(amount_out)) = (parse_amount(amount_in), parse_amount(amount_out))
    else {
        return "0".to_string();
    };
    if amount_in == 0.0 || amount_out == 0.0 {
        return "0".to_string();
    }

    let price = amount_out / amount_in;
    if !price.is_finite() {
        return "0".to_string();
    }
    format_f64(price)
}

/// Raw balances of `asset0` and `asset1` in `tokens`, matched case-insensitively.
pub fn calculate_reserves(tokens: &[PoolToken], asset0: &str, asset1: &str) -> Option<Reserves> {
    let balance_of = |asset: &str| {
        tokens
            .iter()
            .find(|t| t.address.eq_ignore_ascii_case(asset))
            .map(|t| t.balance.clone())
    };

    Some(Reserves {
        asset0: balance_of(asset0)?,
        asset1: balance_of(asset1)?,
    })
}

/// Pool fee (fraction of whole) scaled by 100: "0.001" -> 0.1.
pub fn convert_fee_to_bps(fee: &str) -> f64 {
    let trimmed = fee.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let parsed = Decimal::from_str(trimmed).or_else(|_| Decimal::from_scientific(trimmed));
    match parsed {
        Ok(value) if !value.is_sign_negative() => {
            (value * Decimal::ONE_HUNDRED).to_f64().unwrap_or(0.0)
        }
        _ => 0.0,
    }
}
