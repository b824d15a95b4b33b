//! Decimal string → integer base units.

use crate::error::{WalletError, WalletResult};

/// Satoshis per bitcoin.
pub const BTC_DECIMALS: u32 = 8;

/// Converts a decimal amount string into base units: `parse_units("0.5", 8) == 50_000_000`.
pub fn parse_units(value: &str, decimals: u32) -> WalletResult<u128> {
    let value = value.trim();
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(WalletError::invalid(format!("amount '{}'", value)));
    }
    if fraction.len() > decimals as usize {
        return Err(WalletError::invalid(format!("amount '{}' has more than {} decimals", value, decimals)));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(WalletError::invalid(format!("amount '{}'", value)));
    }

    let scale = 10u128
        .checked_pow(decimals)
        .ok_or_else(|| WalletError::invalid(format!("{} decimals", decimals)))?;
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(WalletError::invalid)? };
    let padded = format!("{:0<width$}", fraction, width = decimals as usize);
    let fraction: u128 = if padded.is_empty() { 0 } else { padded.parse().map_err(WalletError::invalid)? };

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(|| WalletError::invalid(format!("amount '{}' overflows", value)))
}
