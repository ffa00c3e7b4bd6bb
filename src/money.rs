//! Currency helpers.
//!
//! Amounts travel as `Decimal` through the API and are stored as integer
//! cents. Conversions always round half away from zero to two places.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{AppError, AppResult};

/// Round to two decimal places for display and storage.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Largest magnitude accepted for a single stored amount: one billion euros.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

pub fn in_range(amount: Decimal) -> bool {
    round2(amount).abs() <= MAX_AMOUNT
}

/// Reject amounts that cannot be stored exactly.
pub fn ensure_in_range(what: &str, amount: Decimal) -> AppResult<()> {
    if in_range(amount) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "{what} exceeds the maximum of {}",
            format_eur(MAX_AMOUNT)
        )))
    }
}

/// Convert to minor units, or `None` beyond [`MAX_AMOUNT`].
pub fn to_cents(amount: Decimal) -> Option<i64> {
    if !in_range(amount) {
        return None;
    }
    (round2(amount) * Decimal::ONE_HUNDRED).to_i64()
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Parse a user-entered amount. Accepts a comma as decimal separator.
/// Returns `None` for anything that is not a plain number.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = trimmed.replace(',', ".");
    Decimal::from_str(&normalized).ok()
}

/// Render as `€12.30`, the format used across the shift screens.
pub fn format_eur(amount: Decimal) -> String {
    let rounded = round2(amount);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-€{:.2}", rounded.abs())
    } else {
        format!("€{:.2}", rounded.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cents_conversion() {
        assert_eq!(to_cents(dec!(5.25)), Some(525));
        assert_eq!(to_cents(dec!(0.005)), Some(1));
        assert_eq!(to_cents(dec!(-1000000000)), Some(-100_000_000_000));
        assert_eq!(from_cents(2000), dec!(20.00));
        assert_eq!(from_cents(-40), dec!(-0.40));
    }

    #[test]
    fn test_out_of_range_amounts_have_no_cents() {
        assert_eq!(MAX_AMOUNT, dec!(1000000000));
        assert_eq!(to_cents(dec!(1000000000.004)), Some(100_000_000_000));
        assert_eq!(to_cents(dec!(1000000000.01)), None);
        assert_eq!(to_cents(dec!(100000000000000000)), None);
        assert!(matches!(
            ensure_in_range("cash income", dec!(-2000000000)),
            Err(AppError::Validation(ref m)) if m.contains("cash income")
        ));
        assert!(ensure_in_range("amount", dec!(12.50)).is_ok());
    }

    #[test]
    fn test_parse_amount_accepts_comma() {
        assert_eq!(parse_amount("10,50"), Some(dec!(10.50)));
        assert_eq!(parse_amount(" 7 "), Some(dec!(7)));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("12abc"), None);
    }

    #[test]
    fn test_format_eur() {
        assert_eq!(format_eur(dec!(310)), "€310.00");
        assert_eq!(format_eur(dec!(0.2)), "€0.20");
        assert_eq!(format_eur(dec!(-40)), "-€40.00");
        assert_eq!(format_eur(dec!(-0.001)), "€0.00");
    }
}
