//! Fixed-point yield arithmetic for stability pool statistics.
//!
//! Token amounts are unsigned 256-bit integers in the token's smallest unit.
//! Intermediate sums and products are carried in 512 bits so that
//! `collateral * price * SCALE` never wraps for realistic magnitudes.
//! Nothing in this crate touches floating point.

use primitive_types::{U256, U512};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fractional digits carried by a scaled ratio.
pub const SCALE_DECIMALS: usize = 18;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),
}

pub type MathResult<T> = Result<T, MathError>;

/// `10^18`, the fixed-point scale of every APY figure.
pub fn scale() -> U256 {
    U256::exp10(SCALE_DECIMALS)
}

/// Parse a base-10 integer string as stored in the database.
pub fn parse_amount(raw: &str) -> MathResult<U256> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MathError::InvalidAmount(raw.to_string()));
    }
    U256::from_dec_str(trimmed).map_err(|_| MathError::InvalidAmount(raw.to_string()))
}

pub fn widen(value: U256) -> U512 {
    let mut limbs = [0u64; 8];
    limbs[..4].copy_from_slice(&value.0);
    U512(limbs)
}

pub fn narrow(value: U512) -> MathResult<U256> {
    if value.0[4..].iter().any(|limb| *limb != 0) {
        return Err(MathError::Overflow("narrowing to 256 bits"));
    }
    let mut limbs = [0u64; 4];
    limbs.copy_from_slice(&value.0[..4]);
    Ok(U256(limbs))
}

/// Sum of amounts, exact.
pub fn sum<I>(amounts: I) -> MathResult<U512>
where
    I: IntoIterator<Item = U256>,
{
    amounts.into_iter().try_fold(U512::zero(), |acc, amount| {
        acc.checked_add(widen(amount)).ok_or(MathError::Overflow("sum"))
    })
}

/// Sum of `quantity * price` pairs computed in the integer domain of the inputs.
pub fn sum_products<I>(pairs: I) -> MathResult<U512>
where
    I: IntoIterator<Item = (U256, U256)>,
{
    pairs.into_iter().try_fold(U512::zero(), |acc, (quantity, price)| {
        let product = widen(quantity)
            .checked_mul(widen(price))
            .ok_or(MathError::Overflow("product"))?;
        acc.checked_add(product).ok_or(MathError::Overflow("sum of products"))
    })
}

/// Truncating arithmetic mean; an empty slice averages to zero.
pub fn mean(values: &[U256]) -> MathResult<U256> {
    if values.is_empty() {
        return Ok(U256::zero());
    }
    let total = sum(values.iter().copied())?;
    narrow(total / U512::from(values.len() as u64))
}

/// `numerator * 10^18 / denominator`, or zero when the denominator is zero.
pub fn scaled_ratio(numerator: U512, denominator: U256) -> MathResult<U256> {
    if denominator.is_zero() {
        return Ok(U256::zero());
    }
    let scaled = numerator
        .checked_mul(widen(scale()))
        .ok_or(MathError::Overflow("scaling numerator"))?;
    narrow(scaled / widen(denominator))
}

/// Render a 1e18-scaled ratio as a percentage with two truncated decimals.
///
/// `525 * 10^14` (a ratio of 0.0525) renders as `"5.25"`. Digits beyond the
/// second decimal are dropped, never rounded.
pub fn format_percentage(apy_raw: U256) -> String {
    let raw = widen(apy_raw);
    let unit = widen(scale());
    let integer_part = raw * U512::from(100u64) / unit;
    let fractional_part = (raw * U512::from(10_000u64) / unit) % U512::from(100u64);
    format!("{}.{:02}", integer_part, fractional_part.low_u64())
}

/// Result of one yield computation over a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldFigures {
    #[serde(with = "decimal::u512")]
    pub total_interest: U512,
    #[serde(with = "decimal::u512")]
    pub total_liquidation_value: U512,
    #[serde(with = "decimal::u256")]
    pub avg_deposits: U256,
    #[serde(with = "decimal::u256")]
    pub apy_raw: U256,
}

/// Combine interest mints, liquidation gains and deposit samples into an APY figure.
///
/// `apy_raw = (Σ interest + Σ collateral·price) · 10^18 / mean(deposits)`.
pub fn compute_yield(
    interest: &[U256],
    liquidations: &[(U256, U256)],
    deposits: &[U256],
) -> MathResult<YieldFigures> {
    let total_interest = sum(interest.iter().copied())?;
    let total_liquidation_value = sum_products(liquidations.iter().copied())?;
    let avg_deposits = mean(deposits)?;

    let numerator = total_interest
        .checked_add(total_liquidation_value)
        .ok_or(MathError::Overflow("yield numerator"))?;
    let apy_raw = scaled_ratio(numerator, avg_deposits)?;

    Ok(YieldFigures {
        total_interest,
        total_liquidation_value,
        avg_deposits,
        apy_raw,
    })
}

/// Serde adapters writing big integers as base-10 strings.
pub mod decimal {
    macro_rules! decimal_serde {
        ($name:ident, $ty:ty) => {
            pub mod $name {
                use serde::{de::Error, Deserialize, Deserializer, Serializer};

                pub fn serialize<S: Serializer>(value: &$ty, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(value)
                }

                pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<$ty, D::Error> {
                    let raw = String::deserialize(deserializer)?;
                    <$ty>::from_dec_str(&raw).map_err(D::Error::custom)
                }
            }
        };
    }

    decimal_serde!(u256, primitive_types::U256);
    decimal_serde!(u512, primitive_types::U512);

    pub mod option_u256 {
        use primitive_types::U256;
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => serializer.collect_str(v),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<U256>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| U256::from_dec_str(&raw).map_err(D::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn apy_is_exact_for_round_numbers() {
        let figures = compute_yield(&[u(1_000_000)], &[], &[u(100_000_000)]).unwrap();
        assert_eq!(figures.apy_raw, U256::exp10(16));
        assert_eq!(figures.total_interest, U512::from(1_000_000u64));
        assert_eq!(figures.total_liquidation_value, U512::zero());
    }

    #[test]
    fn empty_deposit_window_yields_zero() {
        let figures = compute_yield(&[u(5)], &[(u(2), u(3))], &[]).unwrap();
        assert_eq!(figures.avg_deposits, U256::zero());
        assert_eq!(figures.apy_raw, U256::zero());
        assert_eq!(figures.total_liquidation_value, U512::from(6u64));
    }

    #[test]
    fn liquidation_value_is_collateral_times_price() {
        let coll = U256::exp10(21);
        let price = U256::exp10(21);
        let total = sum_products([(coll, price), (u(1), u(1))]).unwrap();
        assert_eq!(total, widen(U256::exp10(42)) + U512::one());
    }

    #[test]
    fn products_wider_than_128_bits_do_not_wrap() {
        let total = sum_products([(U256::MAX, U256::MAX)]).unwrap();
        assert!(narrow(total).is_err());
        assert_eq!(total / widen(U256::MAX), widen(U256::MAX));
    }

    #[test]
    fn mean_truncates() {
        assert_eq!(mean(&[u(1), u(2)]).unwrap(), u(1));
        assert_eq!(mean(&[u(10), u(20), u(30)]).unwrap(), u(20));
        assert_eq!(mean(&[]).unwrap(), U256::zero());
    }

    #[test]
    fn percentage_formatting_truncates_to_two_places() {
        assert_eq!(format_percentage(u(525) * U256::exp10(14)), "5.25");
        assert_eq!(format_percentage(U256::exp10(16)), "1.00");
        assert_eq!(format_percentage(U256::zero()), "0.00");
        assert_eq!(format_percentage(u(123_456_789) * U256::exp10(9)), "12.34");
        assert_eq!(format_percentage(u(3) * U256::exp10(18)), "300.00");
        assert_eq!(format_percentage(u(5) * U256::exp10(14)), "0.05");
    }

    #[test]
    fn parse_amount_rejects_non_integers() {
        assert_eq!(parse_amount("42").unwrap(), u(42));
        assert_eq!(parse_amount(" 7 ").unwrap(), u(7));
        assert!(parse_amount("").is_err());
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("1.5").is_err());
        assert!(parse_amount("0x10").is_err());
    }

    #[test]
    fn widen_and_narrow_round_trip() {
        let value = U256::MAX - u(12345);
        assert_eq!(narrow(widen(value)).unwrap(), value);
    }

    #[test]
    fn figures_serialize_as_decimal_strings() {
        let figures = compute_yield(&[u(1_000_000)], &[], &[u(100_000_000)]).unwrap();
        let json = serde_json::to_value(&figures).unwrap();
        assert_eq!(json["apy_raw"], "10000000000000000");
        assert_eq!(json["avg_deposits"], "100000000");
        let back: YieldFigures = serde_json::from_value(json).unwrap();
        assert_eq!(back, figures);
    }
}
