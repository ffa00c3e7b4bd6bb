//! Monthly dashboard figures per location.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::store::ReportStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    /// Income of shifts opened in the month that are closed or have
    /// confirmed income.
    pub total_income: Decimal,
    /// Every expense dated in the month, shift and general alike.
    pub total_expenses: Decimal,
}

impl MonthlySummary {
    pub fn margin(&self) -> Decimal {
        self.total_income - self.total_expenses
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRow {
    pub year: i32,
    pub month: u32,
    #[serde(flatten)]
    pub summary: MonthlySummary,
}

/// First and last calendar day of the month.
pub fn month_range(year: i32, month: u32) -> AppResult<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::validation(format!("invalid month {year}-{month:02}")))?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| AppError::validation(format!("invalid month {year}-{month:02}")))?;
    Ok((first, last))
}

pub fn monthly_summary<S: ReportStore>(
    store: &S,
    location_id: &str,
    year: i32,
    month: u32,
) -> AppResult<MonthlySummary> {
    month_range(year, month)?;
    Ok(store.monthly_summary(location_id, year, month)?)
}

/// The `count` months ending with the month of `today`, oldest first.
pub fn recent_months<S: ReportStore>(
    store: &S,
    location_id: &str,
    today: NaiveDate,
    count: u32,
) -> AppResult<Vec<MonthRow>> {
    let current = today.with_day(1).unwrap_or(today);
    let mut rows = Vec::with_capacity(count as usize);
    for back in (0..count).rev() {
        let first = current
            .checked_sub_months(Months::new(back))
            .ok_or_else(|| AppError::validation("month out of range"))?;
        let summary = store.monthly_summary(location_id, first.year(), first.month())?;
        rows.push(MonthRow {
            year: first.year(),
            month: first.month(),
            summary,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_month_range() {
        let (from, to) = month_range(2024, 2).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let (_, dec_end) = month_range(2023, 12).unwrap();
        assert_eq!(dec_end, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert!(matches!(month_range(2024, 13), Err(AppError::Validation(_))));
        assert!(month_range(2024, 0).is_err());
    }

    #[test]
    fn test_margin() {
        let summary = MonthlySummary {
            total_income: dec!(350),
            total_expenses: dec!(400.50),
        };
        assert_eq!(summary.margin(), dec!(-50.50));
    }

    struct FixedReports;

    impl ReportStore for FixedReports {
        fn monthly_summary(
            &self,
            _location_id: &str,
            _year: i32,
            month: u32,
        ) -> crate::store::StoreResult<MonthlySummary> {
            Ok(MonthlySummary {
                total_income: Decimal::from(month),
                total_expenses: Decimal::ZERO,
            })
        }
    }

    #[test]
    fn test_recent_months_crosses_year() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        let rows = recent_months(&FixedReports, "loc", today, 3).unwrap();
        let months: Vec<(i32, u32)> = rows.iter().map(|r| (r.year, r.month)).collect();
        assert_eq!(months, vec![(2023, 12), (2024, 1), (2024, 2)]);
        assert_eq!(rows[2].summary.total_income, dec!(2));
    }
}
