use crate::errors::{Result, ScreenerError};
use ethers::types::{Address, U256};
use ethers::utils::{format_units, to_checksum};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parses a 20-byte hex address (with or without mixed case).
pub fn string_to_address(s: &str) -> Result<Address> {
    let trimmed = s.trim();
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        return Err(ScreenerError::AddressFormat(s.to_string()));
    }
    Address::from_str(trimmed).map_err(|e| ScreenerError::AddressFormat(format!("{s}: {e}")))
}

/// EIP-55 mixed-case form of `s`.
pub fn checksum_address(s: &str) -> Result<String> {
    Ok(to_checksum(&string_to_address(s)?, None))
}

/// Raw base units to a human amount, e.g. `1500000` with 6 decimals -> `1.5`.
pub fn u256_to_decimal(value: U256, decimals: u8) -> Result<Decimal> {
    let mut decimal_value = Decimal::from_str(&value.to_string())
        .map_err(|e| ScreenerError::Format(format!("amount {value} out of range: {e}")))?;
    decimal_value
        .set_scale(u32::from(decimals))
        .map_err(|e| ScreenerError::Format(format!("scale {decimals}: {e}")))?;
    Ok(decimal_value.normalize())
}

/// Human-unit string for a raw amount. Falls back to plain unit formatting for
/// values too large for `Decimal`.
pub fn format_token_amount(value: U256, decimals: u8) -> Result<String> {
    match u256_to_decimal(value, decimals) {
        Ok(d) => Ok(d.to_string()),
        Err(_) => {
            let formatted = format_units(value, u32::from(decimals))
                .map_err(|e| ScreenerError::Format(e.to_string()))?;
            let trimmed = if formatted.contains('.') {
                formatted.trim_end_matches('0').trim_end_matches('.').to_string()
            } else {
                formatted
            };
            Ok(trimmed)
        }
    }
}
