//! Shift income by channel: cash, card terminal and mobile payments.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::money;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeAmounts {
    pub cash: Decimal,
    pub card: Decimal,
    pub mobile: Decimal,
}

impl IncomeAmounts {
    pub fn new(cash: Decimal, card: Decimal, mobile: Decimal) -> Self {
        Self { cash, card, mobile }
    }

    pub fn total(&self) -> Decimal {
        aggregate_income(self)
    }
}

pub fn aggregate_income(income: &IncomeAmounts) -> Decimal {
    income.cash + income.card + income.mobile
}

/// Raw values of the income form, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeDraft {
    #[serde(default)]
    pub cash: String,
    #[serde(default)]
    pub card: String,
    #[serde(default)]
    pub mobile: String,
}

impl IncomeDraft {
    /// Pre-fill the form from stored amounts. Zero channels stay blank.
    pub fn from_amounts(amounts: &IncomeAmounts) -> Self {
        fn field(v: Decimal) -> String {
            if v.is_zero() {
                String::new()
            } else {
                format!("{:.2}", money::round2(v))
            }
        }
        Self {
            cash: field(amounts.cash),
            card: field(amounts.card),
            mobile: field(amounts.mobile),
        }
    }

    /// Amounts for live totals: blank, unparseable or out-of-range fields
    /// count as 0.
    pub fn lenient(&self) -> IncomeAmounts {
        let value = |raw: &str| {
            money::parse_amount(raw)
                .filter(|v| !v.is_sign_negative() && money::in_range(*v))
                .map(money::round2)
                .unwrap_or(Decimal::ZERO)
        };
        IncomeAmounts {
            cash: value(&self.cash),
            card: value(&self.card),
            mobile: value(&self.mobile),
        }
    }

    /// Amounts for confirmation. Blank fields are 0; anything else must be a
    /// non-negative number.
    pub fn parse_strict(&self) -> AppResult<IncomeAmounts> {
        Ok(IncomeAmounts {
            cash: strict_field("cash", &self.cash)?,
            card: strict_field("card", &self.card)?,
            mobile: strict_field("mobile", &self.mobile)?,
        })
    }
}

fn strict_field(name: &str, raw: &str) -> AppResult<Decimal> {
    if raw.trim().is_empty() {
        return Ok(Decimal::ZERO);
    }
    let value = money::parse_amount(raw)
        .ok_or_else(|| AppError::validation(format!("{name} income must be a number")))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::validation(format!("{name} income cannot be negative")));
    }
    money::ensure_in_range(&format!("{name} income"), value)?;
    Ok(money::round2(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft(cash: &str, card: &str, mobile: &str) -> IncomeDraft {
        IncomeDraft {
            cash: cash.into(),
            card: card.into(),
            mobile: mobile.into(),
        }
    }

    #[test]
    fn test_aggregate_income() {
        let income = IncomeAmounts::new(dec!(10.50), Decimal::ZERO, dec!(5.25));
        assert_eq!(aggregate_income(&income), dec!(15.75));
    }

    #[test]
    fn test_lenient_treats_blank_and_garbage_as_zero() {
        let amounts = draft("10.50", "", "abc").lenient();
        assert_eq!(amounts.total(), dec!(10.50));
        assert_eq!(draft("-5", "2", "").lenient().total(), dec!(2));
    }

    #[test]
    fn test_strict_rejects_non_numeric() {
        let err = draft("200", "lots", "").parse_strict().unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("card")));
    }

    #[test]
    fn test_strict_rejects_negative() {
        assert!(matches!(
            draft("-1", "", "").parse_strict(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_amounts_beyond_maximum() {
        let huge = draft("100000000000000000", "5", "");
        let err = huge.parse_strict().unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("cash")));
        assert_eq!(huge.lenient().total(), dec!(5));

        let limit = draft("1000000000", "", "").parse_strict().unwrap();
        assert_eq!(limit.cash, money::MAX_AMOUNT);
    }

    #[test]
    fn test_strict_accepts_blank_as_zero() {
        let amounts = draft("200", "150", "").parse_strict().unwrap();
        assert_eq!(amounts.mobile, Decimal::ZERO);
        assert_eq!(amounts.total(), dec!(350));
    }

    #[test]
    fn test_draft_round_trips_stored_amounts() {
        let stored = IncomeAmounts::new(dec!(200), dec!(0), dec!(12.5));
        let form = IncomeDraft::from_amounts(&stored);
        assert_eq!(form.card, "");
        assert_eq!(form.mobile, "12.50");
        assert_eq!(form.parse_strict().unwrap(), stored);
    }
}
