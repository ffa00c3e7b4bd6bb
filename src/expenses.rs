//! Expense ledger: till-cash expenses logged during a shift and general
//! expenses logged against a location.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::money;
use crate::reports;
use crate::session::SessionContext;
use crate::store::{DirectoryStore, ExpenseStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid out of the register during a shift.
    TillCash,
    Cash,
    Card,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::TillCash => "till_cash",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "till_cash" => Some(PaymentMethod::TillCash),
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseProvenance {
    Shift,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseEntry {
    pub id: String,
    pub shift_id: Option<String>,
    pub location_id: String,
    pub amount: Decimal,
    pub concept: String,
    pub supplier_id: Option<String>,
    pub date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub receipt_url: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl ExpenseEntry {
    pub fn provenance(&self) -> ExpenseProvenance {
        if self.shift_id.is_some() {
            ExpenseProvenance::Shift
        } else {
            ExpenseProvenance::General
        }
    }

    /// Shift-scoped entries are managed only from their shift.
    fn ensure_general(&self) -> AppResult<()> {
        match self.provenance() {
            ExpenseProvenance::General => Ok(()),
            ExpenseProvenance::Shift => {
                warn!(expense_id = %self.id, "Rejected change to shift expense outside its shift");
                Err(AppError::validation(
                    "till expenses can only be managed from the shift that recorded them",
                ))
            }
        }
    }
}

/// Sum of `amount` over the entries. Empty ledgers total 0.
pub fn aggregate_expenses<'a>(entries: impl IntoIterator<Item = &'a ExpenseEntry>) -> Decimal {
    entries.into_iter().map(|e| e.amount).sum()
}

pub fn for_shift<'a>(entries: &'a [ExpenseEntry], shift_id: &str) -> Vec<&'a ExpenseEntry> {
    entries
        .iter()
        .filter(|e| e.shift_id.as_deref() == Some(shift_id))
        .collect()
}

/// Entries dated within `[from, to]`, both ends inclusive.
pub fn in_date_range(entries: &[ExpenseEntry], from: NaiveDate, to: NaiveDate) -> Vec<&ExpenseEntry> {
    entries
        .iter()
        .filter(|e| e.date >= from && e.date <= to)
        .collect()
}

// ---------------------------------------------------------------------------
// Shift expenses
// ---------------------------------------------------------------------------

/// A supplier invoice paid from the till during a shift.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShiftExpense {
    pub amount: Decimal,
    pub supplier_id: String,
    #[serde(default)]
    pub concept: Option<String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
}

impl NewShiftExpense {
    pub fn validate(&self) -> AppResult<()> {
        if self.amount <= Decimal::ZERO {
            return Err(AppError::validation("amount must be greater than zero"));
        }
        money::ensure_in_range("amount", self.amount)?;
        if self.supplier_id.trim().is_empty() {
            return Err(AppError::validation("supplier is required"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// General expenses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum GeneralExpenseKind {
    /// Free-text concept, e.g. "Electricity".
    Concept(String),
    /// Supplier invoice; the concept defaults to the supplier's name.
    Supplier(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGeneralExpense {
    pub amount: Decimal,
    pub date: NaiveDate,
    pub kind: GeneralExpenseKind,
    #[serde(default = "default_general_method")]
    pub payment_method: PaymentMethod,
}

fn default_general_method() -> PaymentMethod {
    PaymentMethod::BankTransfer
}

impl NewGeneralExpense {
    fn validate(&self) -> AppResult<()> {
        if money::round2(self.amount) <= Decimal::ZERO {
            return Err(AppError::validation("amount must be at least one cent"));
        }
        money::ensure_in_range("amount", self.amount)?;
        match &self.kind {
            GeneralExpenseKind::Concept(c) if c.trim().is_empty() => {
                Err(AppError::validation("concept is required"))
            }
            GeneralExpenseKind::Supplier(s) if s.trim().is_empty() => {
                Err(AppError::validation("supplier is required"))
            }
            _ => Ok(()),
        }
    }
}

/// Resolve `(concept, supplier_id)` for a general expense at `location_id`.
fn resolve_kind<S: DirectoryStore>(
    store: &S,
    location_id: &str,
    kind: &GeneralExpenseKind,
) -> AppResult<(String, Option<String>)> {
    match kind {
        GeneralExpenseKind::Concept(concept) => Ok((concept.trim().to_string(), None)),
        GeneralExpenseKind::Supplier(supplier_id) => {
            let supplier = store
                .get_supplier(supplier_id)?
                .filter(|s| s.location_id == location_id)
                .ok_or_else(|| AppError::not_found(format!("supplier {supplier_id}")))?;
            Ok((supplier.name, Some(supplier.id)))
        }
    }
}

pub fn add_general_expense<S: ExpenseStore + DirectoryStore>(
    store: &S,
    ctx: &SessionContext,
    input: &NewGeneralExpense,
) -> AppResult<ExpenseEntry> {
    input.validate()?;
    let (concept, supplier_id) = resolve_kind(store, &ctx.location_id, &input.kind)?;

    let entry = ExpenseEntry {
        id: Uuid::new_v4().to_string(),
        shift_id: None,
        location_id: ctx.location_id.clone(),
        amount: money::round2(input.amount),
        concept,
        supplier_id,
        date: input.date,
        payment_method: input.payment_method,
        receipt_url: None,
        created_by: ctx.user_id.clone(),
        created_at: Utc::now(),
    };
    store.insert_expense(&entry).map_err(AppError::creation)?;

    info!(expense_id = %entry.id, location_id = %entry.location_id, amount = %entry.amount, "General expense recorded");
    Ok(entry)
}

pub fn update_general_expense<S: ExpenseStore + DirectoryStore>(
    store: &S,
    expense_id: &str,
    input: &NewGeneralExpense,
) -> AppResult<ExpenseEntry> {
    input.validate()?;
    let existing = store
        .get_expense(expense_id)?
        .ok_or_else(|| AppError::not_found(format!("expense {expense_id}")))?;
    existing.ensure_general()?;
    let (concept, supplier_id) = resolve_kind(store, &existing.location_id, &input.kind)?;

    let updated = ExpenseEntry {
        amount: money::round2(input.amount),
        date: input.date,
        payment_method: input.payment_method,
        concept,
        supplier_id,
        ..existing
    };
    store.update_expense(&updated).map_err(AppError::update)?;

    info!(expense_id = %updated.id, amount = %updated.amount, "General expense updated");
    Ok(updated)
}

pub fn delete_general_expense<S: ExpenseStore>(store: &S, expense_id: &str) -> AppResult<()> {
    let existing = store
        .get_expense(expense_id)?
        .ok_or_else(|| AppError::not_found(format!("expense {expense_id}")))?;
    existing.ensure_general()?;
    store.delete_expense(expense_id).map_err(AppError::persistence)?;
    info!(expense_id = %expense_id, "General expense deleted");
    Ok(())
}

/// Every expense of the location dated in `[from, to]`, most recent first.
/// Includes till expenses so the history shows what left the register.
pub fn list_location_expenses<S: ExpenseStore>(
    store: &S,
    location_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<ExpenseEntry>> {
    if from > to {
        return Ok(Vec::new());
    }
    Ok(store.list_expenses(location_id, from, to)?)
}

pub fn list_month_expenses<S: ExpenseStore>(
    store: &S,
    location_id: &str,
    year: i32,
    month: u32,
) -> AppResult<Vec<ExpenseEntry>> {
    let (from, to) = reports::month_range(year, month)?;
    list_location_expenses(store, location_id, from, to)
}
