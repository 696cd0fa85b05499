//! Pure integer helpers for USDC fee, net/gross, and slippage math.
//!
//! No I/O, no floating point. All amounts are minor units (6-decimal USDC)
//! held in `alloy_primitives::U256`; decimal-string conversion happens only
//! at the persistence/API boundary via [`Usdc6`].

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The settlement service's intrinsic fee plus rounding headroom.
pub const GATEWAY_FEE_BPS: u64 = 205;
const GATEWAY_FEE_DENOM_BPS: u64 = 10_000 + GATEWAY_FEE_BPS;

/// Service fee for cross-chain sends (single recipient).
pub const CROSS_CHAIN_FEE_PERCENT: &str = "0.3";
/// Service fee for batch sends, bridges, and collects.
pub const BATCH_FEE_PERCENT: &str = "0.25";

const DECIMALS: u32 = 6;
const SCALE: u64 = 1_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MathError {
    #[error("invalid decimal amount: {0}")]
    InvalidDecimal(String),
    #[error("amount has more than 6 fractional digits: {0}")]
    TooPrecise(String),
}

/// A non-negative USDC amount in minor units (1 USDC = 1_000_000 minor units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Usdc6(pub U256);

impl Usdc6 {
    pub const ZERO: Usdc6 = Usdc6(U256::ZERO);

    pub fn from_minor(minor: U256) -> Self {
        Self(minor)
    }

    pub fn minor(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(&self, other: Usdc6) -> Option<Usdc6> {
        self.0.checked_add(other.0).map(Usdc6)
    }

    pub fn saturating_sub(&self, other: Usdc6) -> Usdc6 {
        Usdc6(self.0.saturating_sub(other.0))
    }

    /// Parse a decimal string (e.g. "102.05", "100", "0.000001") into minor units.
    /// Rejects more than 6 fractional digits, negative signs, and empty input.
    pub fn parse_decimal(input: &str) -> Result<Self, MathError> {
        let input = input.trim();
        if input.is_empty() || input.starts_with('-') {
            return Err(MathError::InvalidDecimal(input.to_string()));
        }
        let (whole, frac) = match input.split_once('.') {
            Some((w, f)) => (w, f),
            None => (input, ""),
        };
        if frac.len() > DECIMALS as usize {
            return Err(MathError::TooPrecise(input.to_string()));
        }
        if (whole.is_empty() && frac.is_empty())
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(MathError::InvalidDecimal(input.to_string()));
        }
        let whole = if whole.is_empty() { "0" } else { whole };
        let mut padded_frac = frac.to_string();
        while padded_frac.len() < DECIMALS as usize {
            padded_frac.push('0');
        }
        let whole_val = U256::from_str(whole)
            .map_err(|_| MathError::InvalidDecimal(input.to_string()))?;
        let frac_val = if padded_frac.is_empty() {
            U256::ZERO
        } else {
            U256::from_str(&padded_frac).map_err(|_| MathError::InvalidDecimal(input.to_string()))?
        };
        let minor = whole_val
            .checked_mul(U256::from(SCALE))
            .and_then(|v| v.checked_add(frac_val))
            .ok_or_else(|| MathError::InvalidDecimal(input.to_string()))?;
        Ok(Usdc6(minor))
    }

    /// Format as a decimal string with exactly 6 fractional digits.
    pub fn to_decimal_string(&self) -> String {
        let whole = self.0 / U256::from(SCALE);
        let frac = self.0 % U256::from(SCALE);
        format!("{whole}.{frac:0width$}", width = DECIMALS as usize)
    }
}

impl fmt::Display for Usdc6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl Serialize for Usdc6 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

impl<'de> Deserialize<'de> for Usdc6 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Usdc6::parse_decimal(&raw).map_err(DeError::custom)
    }
}

/// `balance * 10000 / (10000 + GATEWAY_FEE_BPS)`, truncating toward zero.
pub fn net_burn_amount(balance: U256) -> U256 {
    balance.saturating_mul(U256::from(10_000u64)) / U256::from(GATEWAY_FEE_DENOM_BPS)
}

/// `burn * (10000 + GATEWAY_FEE_BPS) / 10000`, truncating toward zero.
pub fn gross_deposit_amount(burn: U256) -> U256 {
    burn.saturating_mul(U256::from(GATEWAY_FEE_DENOM_BPS)) / U256::from(10_000u64)
}

/// A ceiling on the gateway's burn-intent fee, not a charge: `max(amount * 300 / 10000, 50_000)`.
pub fn calc_max_fee(amount: U256) -> U256 {
    let pct = amount.saturating_mul(U256::from(300u64)) / U256::from(10_000u64);
    pct.max(U256::from(50_000u64))
}

/// Minimum slippage tolerance (in basis points) the engine imposes on swap
/// quotes, scaled down as the notional amount grows, floored against any
/// user-supplied value.
pub fn effective_swap_slippage_bps(usdc_minor: U256, user_slippage_bps: Option<u32>) -> u32 {
    let one = U256::from(SCALE);
    let ten = U256::from(10 * SCALE);
    let hundred = U256::from(100 * SCALE);
    let floor = if usdc_minor < one {
        500
    } else if usdc_minor < ten {
        300
    } else if usdc_minor < hundred {
        100
    } else {
        50
    };
    user_slippage_bps.unwrap_or(0).max(floor)
}

/// `total * bps / 10000`, truncating toward zero.
pub fn apply_fee_bps(total: U256, bps: u64) -> U256 {
    total.saturating_mul(U256::from(bps)) / U256::from(10_000u64)
}

/// Converts a fee-percent decimal string (e.g. "0.25") into its basis-point
/// equivalent via `round(value * 100)`, matching the engine's own
/// `feeRaw = total * round(feePct * 10000) / 10000` formula (`feePct` here
/// being the fraction `value / 100`).
pub fn fee_bps_from_percent_str(percent: &str) -> Result<u64, MathError> {
    let value = Usdc6::parse_decimal(percent)?;
    // value is scaled by 1e6 (Usdc6); bps = value/1e6 * 100 = value / 1e4,
    // rounded to the nearest integer.
    let scaled = value.minor();
    let denom = U256::from(10_000u64);
    let rounded = (scaled + denom / U256::from(2u64)) / denom;
    Ok(rounded.to::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_gross_truncation_law() {
        for amount in [0u64, 1, 50_000, 1_000_000, 999_999, 123_456_789] {
            let amount = U256::from(amount);
            let gross = gross_deposit_amount(amount);
            let net = net_burn_amount(gross);
            let diff = if net > amount { net - amount } else { amount - net };
            assert!(diff <= U256::from(1u64), "amount={amount} net={net}");
        }
    }

    #[test]
    fn bridge_example_from_spec() {
        // 100 USDC net burn -> gross deposit 102.050000
        let burn = Usdc6::parse_decimal("100").unwrap().minor();
        let gross = gross_deposit_amount(burn);
        assert_eq!(Usdc6::from_minor(gross).to_decimal_string(), "102.050000");
    }

    #[test]
    fn batch_fee_example_from_spec() {
        let total = Usdc6::parse_decimal("150").unwrap().minor();
        let bps = fee_bps_from_percent_str(BATCH_FEE_PERCENT).unwrap();
        assert_eq!(bps, 25);
        let fee = apply_fee_bps(total, bps);
        assert_eq!(Usdc6::from_minor(fee).to_decimal_string(), "0.375000");
    }

    #[test]
    fn cross_chain_fee_bps() {
        assert_eq!(fee_bps_from_percent_str(CROSS_CHAIN_FEE_PERCENT).unwrap(), 30);
    }

    #[test]
    fn slippage_tiers_are_monotone_non_increasing() {
        let amounts = [
            U256::from(500_000u64),        // 0.5 USDC
            U256::from(5_000_000u64),      // 5 USDC
            U256::from(50_000_000u64),     // 50 USDC
            U256::from(500_000_000u64),    // 500 USDC
        ];
        let mut prev = u32::MAX;
        for amount in amounts {
            let floor = effective_swap_slippage_bps(amount, None);
            assert!(floor <= prev, "slippage floor must be non-increasing");
            prev = floor;
        }
        assert_eq!(effective_swap_slippage_bps(U256::from(500_000u64), None), 500);
        assert_eq!(effective_swap_slippage_bps(U256::from(50_000_000u64), None), 100);
        assert_eq!(effective_swap_slippage_bps(U256::from(500_000_000u64), None), 50);
    }

    #[test]
    fn slippage_floor_never_overrides_a_higher_user_value() {
        let small = U256::from(500_000u64);
        assert_eq!(effective_swap_slippage_bps(small, Some(900)), 900);
        assert_eq!(effective_swap_slippage_bps(small, Some(10)), 500);
    }

    #[test]
    fn calc_max_fee_is_a_ceiling() {
        assert_eq!(calc_max_fee(U256::from(1_000_000u64)), U256::from(50_000u64));
        assert_eq!(
            calc_max_fee(U256::from(10_000_000_000u64)),
            U256::from(300_000_000u64)
        );
    }

    #[test]
    fn decimal_round_trip() {
        for s in ["0.000000", "100.000000", "102.050000", "0.375000"] {
            let parsed = Usdc6::parse_decimal(s).unwrap();
            assert_eq!(parsed.to_decimal_string(), s);
        }
    }

    #[test]
    fn decimal_parse_rejects_excess_precision_and_negatives() {
        assert!(Usdc6::parse_decimal("1.0000001").is_err());
        assert!(Usdc6::parse_decimal("-1").is_err());
        assert!(Usdc6::parse_decimal("").is_err());
    }
}
