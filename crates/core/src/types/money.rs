//! Conversion between decimal prices and gateway minor units.
//!
//! Catalog prices and cart totals are [`Decimal`] values in the major unit
//! (reais). The payment gateway and the `orders.amount` column use integer
//! minor units (centavos).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Errors converting a decimal amount into minor units.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is below zero.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    /// The amount does not fit into an `i64` of minor units.
    #[error("amount is too large: {0}")]
    Overflow(Decimal),
}

/// Convert a major-unit total into minor units, `round(total * 100)`.
///
/// Halves round away from zero, so `0.005` becomes `1`.
///
/// ```
/// use rust_decimal::Decimal;
/// use vitrine_core::to_minor_units;
///
/// assert_eq!(to_minor_units(Decimal::new(2000, 2)), Ok(2000));
/// ```
///
/// # Errors
///
/// Returns [`MoneyError::Negative`] for negative totals and
/// [`MoneyError::Overflow`] when the result does not fit into an `i64`.
pub fn to_minor_units(total: Decimal) -> Result<i64, MoneyError> {
    if total.is_sign_negative() && !total.is_zero() {
        return Err(MoneyError::Negative(total));
    }

    total
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|cents| cents.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|cents| cents.to_i64())
        .ok_or(MoneyError::Overflow(total))
}

/// Convert minor units back into a major-unit decimal.
#[must_use]
pub fn from_minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minor_units_whole_values() {
        assert_eq!(to_minor_units(Decimal::new(20, 0)), Ok(2000));
        assert_eq!(to_minor_units(Decimal::ZERO), Ok(0));
    }

    #[test]
    fn test_to_minor_units_rounds_half_away_from_zero() {
        // 10.005 -> 1000.5 -> 1001
        assert_eq!(to_minor_units(Decimal::new(10005, 3)), Ok(1001));
        // 10.004 -> 1000.4 -> 1000
        assert_eq!(to_minor_units(Decimal::new(10004, 3)), Ok(1000));
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        assert_eq!(
            to_minor_units(Decimal::new(-1, 2)),
            Err(MoneyError::Negative(Decimal::new(-1, 2)))
        );
    }

    #[test]
    fn test_to_minor_units_overflow() {
        assert!(matches!(
            to_minor_units(Decimal::MAX),
            Err(MoneyError::Overflow(_))
        ));
    }

    #[test]
    fn test_from_minor_units() {
        assert_eq!(from_minor_units(1999), Decimal::new(1999, 2));
        assert_eq!(from_minor_units(0), Decimal::ZERO);
    }
}
