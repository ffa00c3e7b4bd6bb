//! Net cash ("caja neta") of a shift: total income minus total expenses.
//!
//! The review screen and the historical detail both go through
//! [`ShiftSummary::for_shift`], so a shift shows the same figures before and
//! after it is closed.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::cash_count::CashCount;
use crate::expenses::{self, ExpenseEntry};
use crate::income::{aggregate_income, IncomeAmounts};
use crate::shifts::Shift;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftSummary {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_cash: Decimal,
    pub initial_cash_total: Option<Decimal>,
    pub final_cash_total: Option<Decimal>,
}

pub fn summarize<'a>(
    income: &IncomeAmounts,
    expenses: impl IntoIterator<Item = &'a ExpenseEntry>,
    initial: Option<&CashCount>,
    final_count: Option<&CashCount>,
) -> ShiftSummary {
    let total_income = aggregate_income(income);
    let total_expenses = expenses::aggregate_expenses(expenses);
    ShiftSummary {
        total_income,
        total_expenses,
        net_cash: total_income - total_expenses,
        initial_cash_total: initial.map(CashCount::total),
        final_cash_total: final_count.map(CashCount::total),
    }
}

impl ShiftSummary {
    /// Summary from the shift's stored income.
    pub fn for_shift(shift: &Shift) -> Self {
        Self::with_income(shift, &shift.income)
    }

    /// Summary with income taken from elsewhere, e.g. the unsaved form.
    pub fn with_income(shift: &Shift, income: &IncomeAmounts) -> Self {
        summarize(
            income,
            expenses::for_shift(&shift.expenses, &shift.id),
            shift.initial_count.as_ref(),
            shift.final_count.as_ref(),
        )
    }
}
