//! Display helpers shared by the listing views.

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use rust_decimal::Decimal;

use crate::config::ChainConfig;
use crate::errors::ConversionError;
use crate::ownership::parse_address;
use crate::types::{Listing, NATIVE_TOKEN_ADDRESS};

/// Shortens an address to `prefix_len` leading characters and the last four.
pub fn format_address(address: Address, prefix_len: usize) -> String {
    let full = format!("{:?}", address);
    let prefix_len = prefix_len.clamp(2, full.len());
    if prefix_len + 4 >= full.len() {
        return full;
    }
    format!("{}...{}", &full[..prefix_len], &full[full.len() - 4..])
}

pub fn native_token() -> Address {
    parse_address(NATIVE_TOKEN_ADDRESS).unwrap_or_default()
}

/// Whether `currency` denotes the chain's native token.
pub fn is_native(currency: Address) -> bool {
    currency == native_token() || currency == Address::zero()
}

/// Symbol to show next to a listing's price.
pub fn currency_symbol(listing: &Listing, chain: &ChainConfig) -> String {
    match &listing.currency_value_per_token {
        Some(value) if value.token_address == native_token() => {
            chain.native_currency.symbol.clone()
        }
        Some(value) => value.symbol.clone(),
        None => String::new(),
    }
}

/// Converts a decimal amount into integer base units (`decimals` = 18 gives wei).
///
/// Trailing zeros are ignored; any remaining precision beyond `decimals` is rejected.
pub fn to_base_units(amount: &Decimal, decimals: u32) -> Result<U256, ConversionError> {
    let amount = amount.normalize();
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ConversionError::Negative);
    }
    let scale = amount.scale();
    if scale > decimals {
        return Err(ConversionError::TooPrecise { decimals });
    }
    let mantissa = U256::from(amount.mantissa().unsigned_abs());
    let factor = U256::from(10u8)
        .checked_pow(U256::from(decimals - scale))
        .ok_or(ConversionError::Overflow)?;
    mantissa
        .checked_mul(factor)
        .ok_or(ConversionError::Overflow)
}

/// Formats seconds since epoch as e.g. `Jan 2, 2025, 03:04 PM` (UTC).
pub fn format_timestamp(seconds: u64) -> String {
    if seconds == 0 {
        return "N/A".to_string();
    }
    i64::try_from(seconds)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map(|dt| dt.format("%b %-d, %Y, %I:%M %p").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}
