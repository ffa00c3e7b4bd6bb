//! Shift ("turno") records: one employee's cash accountability at one
//! location, from opening to close.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::cash_count::{CashCount, CashCountKind};
use crate::error::{AppError, AppResult};
use crate::expenses::ExpenseEntry;
use crate::income::IncomeAmounts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    Open,
    Closed,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Open => "open",
            ShiftStatus::Closed => "closed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "open" => Some(ShiftStatus::Open),
            "closed" => Some(ShiftStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomeStatus {
    Pending,
    Confirmed,
}

impl IncomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeStatus::Pending => "pending",
            IncomeStatus::Confirmed => "confirmed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(IncomeStatus::Pending),
            "confirmed" => Some(IncomeStatus::Confirmed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: String,
    pub location_id: String,
    pub employee_id: String,
    pub status: ShiftStatus,
    pub income_status: IncomeStatus,
    /// Calendar day the shift belongs to; history filters on it.
    pub opened_on: NaiveDate,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub initial_count: Option<CashCount>,
    pub final_count: Option<CashCount>,
    pub income: IncomeAmounts,
    pub expenses: Vec<ExpenseEntry>,
}

impl Shift {
    pub fn is_open(&self) -> bool {
        self.status == ShiftStatus::Open
    }

    pub fn is_income_confirmed(&self) -> bool {
        self.income_status == IncomeStatus::Confirmed
    }

    pub fn cash_count(&self, kind: CashCountKind) -> Option<&CashCount> {
        match kind {
            CashCountKind::Initial => self.initial_count.as_ref(),
            CashCountKind::Final => self.final_count.as_ref(),
        }
    }

    /// Closed shifts and everything nested in them are read-only.
    pub fn ensure_open(&self) -> AppResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(AppError::ShiftClosed {
                shift_id: self.id.clone(),
            })
        }
    }
}

/// Values for a freshly started shift. Status and income status always start
/// as `Open` / `Pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewShift {
    pub id: String,
    pub location_id: String,
    pub employee_id: String,
    pub opened_at: DateTime<Utc>,
}

impl NewShift {
    pub fn opened_on(&self) -> NaiveDate {
        self.opened_at.date_naive()
    }
}
