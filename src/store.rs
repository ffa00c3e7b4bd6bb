//! Persistence interface the core depends on.
//!
//! Every write is a single statement against the backend; nothing spans
//! several traits in one transaction. `db::DbState` implements all of them
//! on SQLite.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::cash_count::CashCount;
use crate::directory::{Employee, Invitation, InvitationStatus, Location, Supplier};
use crate::expenses::ExpenseEntry;
use crate::income::IncomeAmounts;
use crate::reports::MonthlySummary;
use crate::shifts::{IncomeStatus, NewShift, Shift};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Raw message from the backend, shown to the user unchanged.
    #[error("{0}")]
    Backend(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("malformed stored data: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait ShiftStore {
    /// Most recent open shift for the employee at the location.
    fn find_open_shift(&self, location_id: &str, employee_id: &str) -> StoreResult<Option<Shift>>;

    fn get_shift(&self, shift_id: &str) -> StoreResult<Option<Shift>>;

    fn insert_shift(&self, shift: &NewShift) -> StoreResult<()>;

    /// Insert or replace the count keyed by `(shift_id, kind)`. Rejected for
    /// closed shifts.
    fn upsert_cash_count(&self, count: &CashCount) -> StoreResult<()>;

    /// Rejected for closed shifts.
    fn update_income(
        &self,
        shift_id: &str,
        income: &IncomeAmounts,
        status: IncomeStatus,
    ) -> StoreResult<()>;

    /// Persist the income snapshot, `status = closed` and `closed_at` in one
    /// statement.
    fn close_shift(
        &self,
        shift_id: &str,
        income: &IncomeAmounts,
        closed_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Shifts whose calendar day lies in `[from, to]`, most recent first.
    fn list_shifts(&self, location_id: &str, from: NaiveDate, to: NaiveDate)
        -> StoreResult<Vec<Shift>>;
}

pub trait ExpenseStore {
    /// Shift-scoped entries are rejected when their shift is closed.
    fn insert_expense(&self, expense: &ExpenseEntry) -> StoreResult<()>;

    fn get_expense(&self, expense_id: &str) -> StoreResult<Option<ExpenseEntry>>;

    fn update_expense(&self, expense: &ExpenseEntry) -> StoreResult<()>;

    fn delete_expense(&self, expense_id: &str) -> StoreResult<()>;

    /// Entries of the location dated in `[from, to]`, most recent first.
    fn list_expenses(
        &self,
        location_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<ExpenseEntry>>;
}

pub trait DirectoryStore {
    fn insert_location(&self, location: &Location) -> StoreResult<()>;
    fn get_location(&self, location_id: &str) -> StoreResult<Option<Location>>;
    fn list_locations(&self, owner_id: &str) -> StoreResult<Vec<Location>>;
    fn delete_location(&self, location_id: &str) -> StoreResult<()>;

    fn insert_supplier(&self, supplier: &Supplier) -> StoreResult<()>;
    fn get_supplier(&self, supplier_id: &str) -> StoreResult<Option<Supplier>>;
    /// Ordered by name.
    fn list_suppliers(&self, location_id: &str) -> StoreResult<Vec<Supplier>>;
    /// Expenses that referenced the supplier keep their concept and lose the link.
    fn delete_supplier(&self, supplier_id: &str) -> StoreResult<()>;

    /// Mark the pending invitation accepted and add the employee, atomically.
    fn accept_invitation(&self, invitation_id: &str, employee: &Employee) -> StoreResult<()>;
    fn get_employee(&self, employee_id: &str) -> StoreResult<Option<Employee>>;
    fn list_employees(&self, location_id: &str) -> StoreResult<Vec<Employee>>;
    fn delete_employee(&self, employee_id: &str) -> StoreResult<()>;

    fn insert_invitation(&self, invitation: &Invitation) -> StoreResult<()>;
    fn get_invitation(&self, invitation_id: &str) -> StoreResult<Option<Invitation>>;
    fn list_invitations(
        &self,
        location_id: &str,
        status: InvitationStatus,
    ) -> StoreResult<Vec<Invitation>>;
    fn set_invitation_status(&self, invitation_id: &str, status: InvitationStatus)
        -> StoreResult<()>;
}

pub trait ReportStore {
    /// Pre-aggregated income and expense totals for one calendar month.
    fn monthly_summary(&self, location_id: &str, year: i32, month: u32)
        -> StoreResult<MonthlySummary>;
}
