use primitive_types::U256;

use crate::errors::WalletError;

pub const ETHER_DECIMALS: usize = 18;

fn wei_per_ether() -> U256 {
    U256::exp10(ETHER_DECIMALS)
}

/// Format wei as a decimal ether string, always with a fractional part
/// (`1.0`, `0.25`, `0.000000000000000001`).
pub fn format_ether(value: U256) -> String {
    let decimals = wei_per_ether();
    let whole = value / decimals;
    let fraction = value % decimals;

    let fraction_str = format!("{:0>width$}", fraction.to_string(), width = ETHER_DECIMALS);
    let fraction_trimmed = fraction_str.trim_end_matches('0');

    if fraction_trimmed.is_empty() {
        format!("{}.0", whole)
    } else {
        format!("{}.{}", whole, fraction_trimmed)
    }
}

/// Parse a decimal ether amount into wei.
pub fn parse_ether(amount: &str) -> Result<U256, WalletError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(WalletError::validation("amount is required"));
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return Err(WalletError::validation(format!("invalid amount: {:?}", amount)));
    }
    if fraction.len() > ETHER_DECIMALS {
        return Err(WalletError::validation(format!(
            "amount has more than {} decimal places",
            ETHER_DECIMALS
        )));
    }

    let overflow = || WalletError::validation(format!("amount too large: {}", amount));

    let whole_wei = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole)
            .map_err(|_| overflow())?
            .checked_mul(wei_per_ether())
            .ok_or_else(overflow)?
    };

    let fraction_wei = if fraction.is_empty() {
        U256::zero()
    } else {
        let padded = format!("{:0<width$}", fraction, width = ETHER_DECIMALS);
        U256::from_dec_str(&padded).map_err(|_| overflow())?
    };

    whole_wei.checked_add(fraction_wei).ok_or_else(overflow)
}
