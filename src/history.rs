//! Read-only browsing of past and current shifts of a location.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

use crate::cash_count::{CashCountKind, CashCountLine};
use crate::error::{AppError, AppResult};
use crate::reconciliation::ShiftSummary;
use crate::shifts::Shift;
use crate::store::{DirectoryStore, ShiftStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftListEntry {
    pub shift: Shift,
    /// `None` once the employee has been removed from the location.
    pub employee_name: Option<String>,
    pub summary: ShiftSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftDetail {
    pub shift: Shift,
    pub employee_name: Option<String>,
    pub initial_breakdown: Vec<CashCountLine>,
    pub final_breakdown: Vec<CashCountLine>,
    pub summary: ShiftSummary,
}

/// First day of `today`'s month through `today`.
pub fn default_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today.with_day(1).unwrap_or(today), today)
}

fn employee_name<S: DirectoryStore>(store: &S, employee_id: &str) -> AppResult<Option<String>> {
    Ok(store.get_employee(employee_id)?.map(|e| e.full_name))
}

/// Shifts opened on a day in `[from, to]`, most recent first.
pub fn list_shifts<S: ShiftStore + DirectoryStore>(
    store: &S,
    location_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<ShiftListEntry>> {
    if from > to {
        return Ok(Vec::new());
    }
    let shifts = store.list_shifts(location_id, from, to)?;
    let mut names: HashMap<String, Option<String>> = HashMap::new();
    let mut entries = Vec::with_capacity(shifts.len());
    for shift in shifts {
        let name = match names.get(&shift.employee_id) {
            Some(name) => name.clone(),
            None => {
                let name = employee_name(store, &shift.employee_id)?;
                names.insert(shift.employee_id.clone(), name.clone());
                name
            }
        };
        entries.push(ShiftListEntry {
            summary: ShiftSummary::for_shift(&shift),
            employee_name: name,
            shift,
        });
    }
    Ok(entries)
}

pub fn shift_detail<S: ShiftStore + DirectoryStore>(
    store: &S,
    shift_id: &str,
) -> AppResult<ShiftDetail> {
    let shift = store
        .get_shift(shift_id)?
        .ok_or_else(|| AppError::not_found(format!("shift {shift_id}")))?;
    let breakdown = |kind: CashCountKind| {
        shift
            .cash_count(kind)
            .map(|c| c.breakdown())
            .unwrap_or_default()
    };
    Ok(ShiftDetail {
        employee_name: employee_name(store, &shift.employee_id)?,
        initial_breakdown: breakdown(CashCountKind::Initial),
        final_breakdown: breakdown(CashCountKind::Final),
        summary: ShiftSummary::for_shift(&shift),
        shift,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cash_count::{CashCount, DenominationCounts};
    use crate::db::{self, DbState};
    use crate::directory;
    use crate::income::IncomeAmounts;
    use crate::session::Role;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn setup() -> (DbState, String) {
        let db = db::open_in_memory().unwrap();
        let location = directory::create_location(&db, "owner-1", Role::Manager, "Bar Pepe").unwrap();
        (db, location.id)
    }

    #[test]
    fn test_default_range() {
        assert_eq!(default_range(day(2, 17)), (day(2, 1), day(2, 17)));
        assert_eq!(default_range(day(3, 1)), (day(3, 1), day(3, 1)));
    }

    #[test]
    fn test_list_includes_open_and_closed() {
        let (db, loc) = setup();
        let closed = db::insert_test_shift(&db, &loc, "emp-1", day(1, 2));
        db.close_shift(&closed, &IncomeAmounts::new(dec!(50), dec!(0), dec!(0)), Utc::now())
            .unwrap();
        let open = db::insert_test_shift(&db, &loc, "emp-2", day(1, 20));
        db::insert_test_shift(&db, &loc, "emp-3", day(2, 1));

        let (from, to) = (day(1, 1), day(1, 31));
        let listed = list_shifts(&db, &loc, from, to).unwrap();
        let ids: Vec<&str> = listed.iter().map(|e| e.shift.id.as_str()).collect();
        assert_eq!(ids, vec![open.as_str(), closed.as_str()]);
        assert_eq!(listed[1].summary.net_cash, dec!(50));
        assert!(listed[0].shift.is_open());
    }

    #[test]
    fn test_entries_carry_employee_name() {
        let (db, loc) = setup();
        let invite = directory::invite_employee(&db, &loc, "lucia@example.com").unwrap();
        directory::accept_invitation(&db, &invite.id, "emp-1", "Lucía Pérez").unwrap();
        let own = db::insert_test_shift(&db, &loc, "emp-1", day(1, 3));
        db::insert_test_shift(&db, &loc, "emp-1", day(1, 4));
        db::insert_test_shift(&db, &loc, "gone", day(1, 5));

        let listed = list_shifts(&db, &loc, day(1, 1), day(1, 31)).unwrap();
        let names: Vec<Option<&str>> = listed.iter().map(|e| e.employee_name.as_deref()).collect();
        assert_eq!(names, vec![None, Some("Lucía Pérez"), Some("Lucía Pérez")]);

        let detail = shift_detail(&db, &own).unwrap();
        assert_eq!(detail.employee_name.as_deref(), Some("Lucía Pérez"));
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let (db, loc) = setup();
        db::insert_test_shift(&db, &loc, "emp-1", day(1, 10));
        assert!(list_shifts(&db, &loc, day(1, 31), day(1, 1)).unwrap().is_empty());
    }

    #[test]
    fn test_detail_breakdowns() {
        let (db, loc) = setup();
        let id = db::insert_test_shift(&db, &loc, "emp-1", day(1, 5));
        db.upsert_cash_count(&CashCount::new(
            &id,
            CashCountKind::Initial,
            DenominationCounts::new().with("b_10", 2).with("m_050", 3),
        ))
        .unwrap();

        let detail = shift_detail(&db, &id).unwrap();
        assert_eq!(detail.initial_breakdown.len(), 2);
        assert_eq!(detail.initial_breakdown[1].subtotal, dec!(1.50));
        assert!(detail.final_breakdown.is_empty());
        assert_eq!(detail.summary.initial_cash_total, Some(dec!(21.50)));

        assert!(matches!(shift_detail(&db, "missing"), Err(AppError::NotFound(_))));
    }
}
