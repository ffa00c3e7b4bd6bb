//! Shift lifecycle: open a shift, record counts, income and till expenses,
//! review the net cash and close.
//!
//! ```text
//! NoActiveShift --start_shift--> Open --review--> UnderReview --confirm_and_close--> Closed
//!                                 ^                   |
//!                                 +-------edit--------+
//! ```
//!
//! Every persisted action is one store write followed by a full refetch of
//! the shift. A failed write leaves the view exactly as it was.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cash_count::{CashCount, CashCountKind, DenominationCounts};
use crate::config::ShiftPolicy;
use crate::error::{AppError, AppResult};
use crate::expenses::{ExpenseEntry, NewShiftExpense, PaymentMethod};
use crate::income::{IncomeAmounts, IncomeDraft};
use crate::money;
use crate::reconciliation::ShiftSummary;
use crate::session::SessionContext;
use crate::shifts::{IncomeStatus, NewShift, Shift};
use crate::store::{DirectoryStore, ExpenseStore, ShiftStore};

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ShiftView {
    NoActiveShift,
    Open {
        shift: Shift,
    },
    UnderReview {
        shift: Shift,
        summary: ShiftSummary,
    },
    Closed {
        shift: Shift,
        summary: ShiftSummary,
    },
}

impl ShiftView {
    pub fn shift(&self) -> Option<&Shift> {
        match self {
            ShiftView::NoActiveShift => None,
            ShiftView::Open { shift }
            | ShiftView::UnderReview { shift, .. }
            | ShiftView::Closed { shift, .. } => Some(shift),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ShiftView::NoActiveShift => "no_active_shift",
            ShiftView::Open { .. } => "open",
            ShiftView::UnderReview { .. } => "under_review",
            ShiftView::Closed { .. } => "closed",
        }
    }
}

pub struct ShiftController<'a, S, C = SystemClock> {
    store: &'a S,
    ctx: SessionContext,
    policy: ShiftPolicy,
    clock: C,
    view: ShiftView,
    draft: IncomeDraft,
}

impl<'a, S> ShiftController<'a, S, SystemClock>
where
    S: ShiftStore + ExpenseStore + DirectoryStore,
{
    /// Controller for the session's employee at the session's location.
    pub fn load(store: &'a S, ctx: SessionContext, policy: ShiftPolicy) -> AppResult<Self> {
        Self::load_with_clock(store, ctx, policy, SystemClock)
    }
}

impl<'a, S, C> ShiftController<'a, S, C>
where
    S: ShiftStore + ExpenseStore + DirectoryStore,
    C: Clock,
{
    pub fn load_with_clock(
        store: &'a S,
        ctx: SessionContext,
        policy: ShiftPolicy,
        clock: C,
    ) -> AppResult<Self> {
        let mut controller = Self {
            store,
            ctx,
            policy,
            clock,
            view: ShiftView::NoActiveShift,
            draft: IncomeDraft::default(),
        };
        controller.reload()?;
        Ok(controller)
    }

    /// Fetch the most recent open shift for the employee at the location.
    pub fn reload(&mut self) -> AppResult<()> {
        let open = self
            .store
            .find_open_shift(&self.ctx.location_id, &self.ctx.user_id)?;
        match open {
            Some(shift) => {
                debug!(shift_id = %shift.id, "Resuming open shift");
                self.draft = IncomeDraft::from_amounts(&shift.income);
                self.view = ShiftView::Open { shift };
            }
            None => {
                self.draft = IncomeDraft::default();
                self.view = ShiftView::NoActiveShift;
            }
        }
        Ok(())
    }

    pub fn view(&self) -> &ShiftView {
        &self.view
    }

    pub fn shift(&self) -> Option<&Shift> {
        self.view.shift()
    }

    /// Income form values as last set.
    pub fn draft(&self) -> &IncomeDraft {
        &self.draft
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    fn open_shift(&self, action: &'static str) -> AppResult<&Shift> {
        match &self.view {
            ShiftView::Open { shift } => {
                shift.ensure_open()?;
                Ok(shift)
            }
            ShiftView::Closed { shift, .. } => Err(AppError::ShiftClosed {
                shift_id: shift.id.clone(),
            }),
            other => {
                warn!(view = other.name(), action, "Rejected action outside an open shift");
                Err(AppError::InvalidTransition(action))
            }
        }
    }

    /// Income that would be recorded if the shift closed now.
    fn effective_income(&self, shift: &Shift) -> IncomeAmounts {
        if shift.is_income_confirmed() {
            shift.income
        } else {
            self.draft.lenient()
        }
    }

    fn refetch_open(&mut self, shift_id: &str) -> AppResult<()> {
        let shift = self
            .store
            .get_shift(shift_id)?
            .ok_or_else(|| AppError::not_found(format!("shift {shift_id}")))?;
        self.view = ShiftView::Open { shift };
        Ok(())
    }

    pub fn start_shift(&mut self) -> AppResult<&Shift> {
        if let ShiftView::Open { shift } | ShiftView::UnderReview { shift, .. } = &self.view {
            return Err(AppError::ShiftAlreadyOpen {
                shift_id: shift.id.clone(),
            });
        }
        if let Some(existing) = self
            .store
            .find_open_shift(&self.ctx.location_id, &self.ctx.user_id)?
        {
            warn!(shift_id = %existing.id, "Refusing to open a second shift");
            return Err(AppError::ShiftAlreadyOpen {
                shift_id: existing.id,
            });
        }

        let new_shift = NewShift {
            id: Uuid::new_v4().to_string(),
            location_id: self.ctx.location_id.clone(),
            employee_id: self.ctx.user_id.clone(),
            opened_at: self.clock.now(),
        };
        self.store
            .insert_shift(&new_shift)
            .map_err(AppError::creation)?;
        info!(
            shift_id = %new_shift.id,
            location_id = %new_shift.location_id,
            employee_id = %new_shift.employee_id,
            "Shift opened"
        );

        self.draft = IncomeDraft::default();
        self.refetch_open(&new_shift.id)?;
        self.shift()
            .ok_or_else(|| AppError::not_found(format!("shift {}", new_shift.id)))
    }

    /// Upsert the initial or final count and return its total.
    pub fn save_cash_count(
        &mut self,
        kind: CashCountKind,
        counts: DenominationCounts,
    ) -> AppResult<Decimal> {
        let shift = self.open_shift("save_cash_count")?;
        if kind == CashCountKind::Final && self.policy.require_income_before_final_count {
            if shift.initial_count.is_none() {
                return Err(AppError::validation(
                    "save the initial cash count before the final one",
                ));
            }
            if !shift.is_income_confirmed() {
                return Err(AppError::validation(
                    "confirm the income before the final cash count",
                ));
            }
        }

        let shift_id = shift.id.clone();
        let count = CashCount::new(shift_id.clone(), kind, counts);
        money::ensure_in_range("cash count total", count.total())?;
        self.store
            .upsert_cash_count(&count)
            .map_err(AppError::update)?;
        info!(shift_id = %shift_id, kind = kind.as_str(), total = %count.total(), "Cash count saved");

        self.refetch_open(&shift_id)?;
        Ok(count.total())
    }

    /// Replace the unsaved income form values.
    pub fn set_income_draft(&mut self, draft: IncomeDraft) -> AppResult<()> {
        let shift = self.open_shift("set_income_draft")?;
        if shift.is_income_confirmed() {
            return Err(AppError::validation("income is already confirmed"));
        }
        self.draft = draft;
        Ok(())
    }

    pub fn confirm_income(&mut self) -> AppResult<IncomeAmounts> {
        let shift = self.open_shift("confirm_income")?;
        if shift.is_income_confirmed() {
            return Err(AppError::validation("income is already confirmed"));
        }
        let amounts = self.draft.parse_strict()?;
        let shift_id = shift.id.clone();

        self.store
            .update_income(&shift_id, &amounts, IncomeStatus::Confirmed)
            .map_err(AppError::update)?;
        info!(shift_id = %shift_id, total = %amounts.total(), "Income confirmed");

        self.draft = IncomeDraft::from_amounts(&amounts);
        self.refetch_open(&shift_id)?;
        Ok(amounts)
    }

    /// Record a supplier invoice paid from the till.
    pub fn record_expense(&mut self, input: &NewShiftExpense) -> AppResult<ExpenseEntry> {
        let shift = self.open_shift("record_expense")?;
        input.validate()?;
        let amount = money::round2(input.amount);
        if amount <= Decimal::ZERO {
            return Err(AppError::validation("amount must be at least one cent"));
        }
        let supplier = self
            .store
            .get_supplier(&input.supplier_id)?
            .filter(|s| s.location_id == shift.location_id)
            .ok_or_else(|| AppError::not_found(format!("supplier {}", input.supplier_id)))?;

        let now = self.clock.now();
        let concept = input
            .concept
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .unwrap_or_else(|| supplier.name.clone());
        let entry = ExpenseEntry {
            id: Uuid::new_v4().to_string(),
            shift_id: Some(shift.id.clone()),
            location_id: shift.location_id.clone(),
            amount,
            concept,
            supplier_id: Some(supplier.id),
            date: now.date_naive(),
            payment_method: PaymentMethod::TillCash,
            receipt_url: input.receipt_url.clone(),
            created_by: self.ctx.user_id.clone(),
            created_at: now,
        };
        let shift_id = shift.id.clone();

        self.store
            .insert_expense(&entry)
            .map_err(AppError::creation)?;
        info!(shift_id = %shift_id, expense_id = %entry.id, amount = %entry.amount, "Till expense recorded");

        self.refetch_open(&shift_id)?;
        Ok(entry)
    }

    /// Totals for the form screen, using the unsaved draft while income is
    /// pending.
    pub fn live_summary(&self) -> Option<ShiftSummary> {
        match &self.view {
            ShiftView::NoActiveShift => None,
            ShiftView::Open { shift } => {
                Some(ShiftSummary::with_income(shift, &self.effective_income(shift)))
            }
            ShiftView::UnderReview { summary, .. } | ShiftView::Closed { summary, .. } => {
                Some(*summary)
            }
        }
    }

    /// Freeze the form and show what closing would record. Nothing is written.
    pub fn review(&mut self) -> AppResult<ShiftSummary> {
        self.open_shift("review")?;
        match std::mem::replace(&mut self.view, ShiftView::NoActiveShift) {
            ShiftView::Open { shift } => {
                let summary = ShiftSummary::with_income(&shift, &self.effective_income(&shift));
                debug!(shift_id = %shift.id, net_cash = %summary.net_cash, "Shift under review");
                self.view = ShiftView::UnderReview { shift, summary };
                Ok(summary)
            }
            other => {
                self.view = other;
                Err(AppError::InvalidTransition("review"))
            }
        }
    }

    /// Back from review to the form. Saved data and the draft are kept.
    pub fn edit(&mut self) -> AppResult<()> {
        match std::mem::replace(&mut self.view, ShiftView::NoActiveShift) {
            ShiftView::UnderReview { shift, .. } => {
                self.view = ShiftView::Open { shift };
                Ok(())
            }
            other => {
                warn!(view = other.name(), "Rejected edit outside review");
                self.view = other;
                Err(AppError::InvalidTransition("edit"))
            }
        }
    }

    /// Persist the income snapshot and close the shift in one write.
    pub fn confirm_and_close(&mut self) -> AppResult<ShiftSummary> {
        let (shift_id, income) = match &self.view {
            ShiftView::UnderReview { shift, .. } => (shift.id.clone(), self.effective_income(shift)),
            ShiftView::Closed { shift, .. } => {
                return Err(AppError::ShiftClosed {
                    shift_id: shift.id.clone(),
                })
            }
            other => {
                warn!(view = other.name(), "Rejected close outside review");
                return Err(AppError::InvalidTransition("confirm_and_close"));
            }
        };

        let closed_at = self.clock.now();
        self.store
            .close_shift(&shift_id, &income, closed_at)
            .map_err(AppError::persistence)?;

        let shift = self
            .store
            .get_shift(&shift_id)?
            .ok_or_else(|| AppError::not_found(format!("shift {shift_id}")))?;
        let summary = ShiftSummary::for_shift(&shift);
        info!(
            shift_id = %shift_id,
            total_income = %summary.total_income,
            total_expenses = %summary.total_expenses,
            net_cash = %summary.net_cash,
            "Shift closed"
        );
        self.view = ShiftView::Closed { shift, summary };
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, DbState};
    use crate::directory;
    use crate::history;
    use crate::session::Role;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use std::cell::Cell;

    /// Clock that starts at a fixed instant and advances one minute per call.
    struct StepClock(Cell<DateTime<Utc>>);

    impl StepClock {
        fn at(y: i32, m: u32, d: u32, h: u32) -> Self {
            Self(Cell::new(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()))
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> DateTime<Utc> {
            let now = self.0.get();
            self.0.set(now + chrono::Duration::minutes(1));
            now
        }
    }

    struct Fixture {
        db: DbState,
        ctx: SessionContext,
        supplier_id: String,
    }

    fn fixture() -> Fixture {
        let db = db::open_in_memory().unwrap();
        let location = directory::create_location(&db, "owner-1", Role::Manager, "Bar Pepe").unwrap();
        let supplier = directory::add_supplier(&db, &location.id, "Makro").unwrap();
        Fixture {
            ctx: SessionContext {
                user_id: "emp-1".into(),
                role: Role::Employee,
                location_id: location.id,
            },
            db,
            supplier_id: supplier.id,
        }
    }

    fn controller(f: &Fixture) -> ShiftController<'_, DbState, StepClock> {
        ShiftController::load_with_clock(
            &f.db,
            f.ctx.clone(),
            ShiftPolicy::default(),
            StepClock::at(2024, 1, 1, 9),
        )
        .unwrap()
    }

    fn draft(cash: &str, card: &str, mobile: &str) -> IncomeDraft {
        IncomeDraft {
            cash: cash.into(),
            card: card.into(),
            mobile: mobile.into(),
        }
    }

    fn till_expense(f: &Fixture, amount: Decimal) -> NewShiftExpense {
        NewShiftExpense {
            amount,
            supplier_id: f.supplier_id.clone(),
            concept: None,
            receipt_url: None,
        }
    }

    #[test]
    fn test_load_without_open_shift() {
        let f = fixture();
        let c = controller(&f);
        assert_eq!(c.view(), &ShiftView::NoActiveShift);
        assert!(c.live_summary().is_none());
    }

    #[test]
    fn test_january_scenario_review_matches_history() {
        let f = fixture();
        let mut c = controller(&f);

        let shift = c.start_shift().unwrap();
        assert_eq!(shift.opened_at, Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
        assert!(shift.is_open());
        assert_eq!(shift.income_status, IncomeStatus::Pending);

        let initial = c
            .save_cash_count(CashCountKind::Initial, DenominationCounts::new().with("b_50", 2))
            .unwrap();
        assert_eq!(initial, dec!(100.00));

        c.set_income_draft(draft("200", "150", "0")).unwrap();
        let income = c.confirm_income().unwrap();
        assert_eq!(income.total(), dec!(350.00));

        c.record_expense(&till_expense(&f, dec!(40))).unwrap();

        let reviewed = c.review().unwrap();
        assert_eq!(reviewed.total_income, dec!(350.00));
        assert_eq!(reviewed.total_expenses, dec!(40.00));
        assert_eq!(reviewed.net_cash, dec!(310.00));
        assert_eq!(reviewed.initial_cash_total, Some(dec!(100.00)));

        let closed = c.confirm_and_close().unwrap();
        assert_eq!(closed, reviewed);
        let shift_id = match c.view() {
            ShiftView::Closed { shift, .. } => {
                assert!(!shift.is_open());
                assert!(shift.closed_at.is_some());
                shift.id.clone()
            }
            other => panic!("expected closed view, got {other:?}"),
        };

        let jan_1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let jan_31 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let listed = history::list_shifts(&f.db, &f.ctx.location_id, jan_1, jan_31).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].summary.net_cash, dec!(310.00));

        let detail = history::shift_detail(&f.db, &shift_id).unwrap();
        assert_eq!(detail.summary, reviewed);
        assert_eq!(detail.initial_breakdown.len(), 1);
    }

    #[test]
    fn test_oversized_amounts_never_reach_the_store() {
        let f = fixture();
        let mut c = controller(&f);
        c.start_shift().unwrap();

        let huge_count = DenominationCounts::new().with("b_500", u32::MAX);
        assert!(matches!(
            c.save_cash_count(CashCountKind::Initial, huge_count),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            c.record_expense(&till_expense(&f, dec!(100000000000000000))),
            Err(AppError::Validation(_))
        ));

        c.set_income_draft(draft("100000000000000000", "25", "")).unwrap();
        assert!(matches!(c.confirm_income(), Err(AppError::Validation(_))));
        let shift = c.shift().unwrap();
        assert_eq!(shift.income_status, IncomeStatus::Pending);
        assert!(shift.initial_count.is_none());
        assert!(shift.expenses.is_empty());

        let reviewed = c.review().unwrap();
        assert_eq!(reviewed.total_income, dec!(25));
        let closed = c.confirm_and_close().unwrap();
        assert_eq!(closed, reviewed);
        match c.view() {
            ShiftView::Closed { shift, .. } => assert_eq!(shift.income.cash, Decimal::ZERO),
            other => panic!("expected closed view, got {other:?}"),
        }
    }

    #[test]
    fn test_confirmed_income_matches_stored_amounts() {
        let f = fixture();
        let mut c = controller(&f);
        c.start_shift().unwrap();
        c.set_income_draft(draft("1000000000", "0,125", "")).unwrap();
        let confirmed = c.confirm_income().unwrap();
        assert_eq!(confirmed.card, dec!(0.13));
        assert_eq!(c.shift().unwrap().income, confirmed);
    }

    #[test]
    fn test_second_open_shift_is_rejected() {
        let f = fixture();
        let mut c = controller(&f);
        let first = c.start_shift().unwrap().id.clone();
        assert!(matches!(
            c.start_shift(),
            Err(AppError::ShiftAlreadyOpen { shift_id }) if shift_id == first
        ));

        // A second controller for the same employee resumes the open shift.
        let mut other = controller(&f);
        assert_eq!(other.shift().map(|s| s.id.clone()), Some(first.clone()));
        assert!(other.start_shift().is_err());

        // Even a stale controller cannot create a duplicate.
        let mut stale = controller(&f);
        stale.view = ShiftView::NoActiveShift;
        assert!(matches!(stale.start_shift(), Err(AppError::ShiftAlreadyOpen { .. })));

        let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(f.db.list_shifts(&f.ctx.location_id, jan, jan).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_income_keeps_status_pending() {
        let f = fixture();
        let mut c = controller(&f);
        c.start_shift().unwrap();
        c.set_income_draft(draft("12,50", "abc", "")).unwrap();

        assert!(matches!(c.confirm_income(), Err(AppError::Validation(_))));
        let shift = c.shift().unwrap();
        assert_eq!(shift.income_status, IncomeStatus::Pending);
        let stored = f.db.get_shift(&shift.id).unwrap().unwrap();
        assert_eq!(stored.income_status, IncomeStatus::Pending);
        assert_eq!(stored.income, IncomeAmounts::default());

        // Live totals still work on the partial draft.
        assert_eq!(c.live_summary().unwrap().total_income, dec!(12.50));
    }

    #[test]
    fn test_confirmed_income_is_locked() {
        let f = fixture();
        let mut c = controller(&f);
        c.start_shift().unwrap();
        c.set_income_draft(draft("10", "", "")).unwrap();
        c.confirm_income().unwrap();
        assert!(matches!(c.set_income_draft(draft("99", "", "")), Err(AppError::Validation(_))));
        assert!(matches!(c.confirm_income(), Err(AppError::Validation(_))));
        assert_eq!(c.draft().cash, "10.00");
    }

    #[test]
    fn test_final_count_requires_initial_and_confirmed_income() {
        let f = fixture();
        let mut c = controller(&f);
        c.start_shift().unwrap();
        let counts = DenominationCounts::new().with("b_20", 3);

        assert!(matches!(
            c.save_cash_count(CashCountKind::Final, counts.clone()),
            Err(AppError::Validation(_))
        ));
        c.save_cash_count(CashCountKind::Initial, counts.clone()).unwrap();
        assert!(matches!(
            c.save_cash_count(CashCountKind::Final, counts.clone()),
            Err(AppError::Validation(_))
        ));
        c.confirm_income().unwrap();
        assert_eq!(c.save_cash_count(CashCountKind::Final, counts).unwrap(), dec!(60));
        assert_eq!(c.shift().unwrap().final_count.as_ref().map(CashCount::total), Some(dec!(60)));
    }

    #[test]
    fn test_relaxed_policy_allows_early_final_count() {
        let f = fixture();
        let mut c = ShiftController::load_with_clock(
            &f.db,
            f.ctx.clone(),
            ShiftPolicy {
                require_income_before_final_count: false,
            },
            StepClock::at(2024, 1, 1, 9),
        )
        .unwrap();
        c.start_shift().unwrap();
        let total = c
            .save_cash_count(CashCountKind::Final, DenominationCounts::new().with("m_2", 4))
            .unwrap();
        assert_eq!(total, dec!(8));
    }

    #[test]
    fn test_closed_shift_rejects_further_writes() {
        let f = fixture();
        let mut c = controller(&f);
        c.start_shift().unwrap();
        c.review().unwrap();
        c.confirm_and_close().unwrap();
        let shift_id = c.shift().unwrap().id.clone();

        assert!(matches!(
            c.save_cash_count(CashCountKind::Initial, DenominationCounts::new()),
            Err(AppError::ShiftClosed { .. })
        ));
        assert!(matches!(c.confirm_income(), Err(AppError::ShiftClosed { .. })));
        assert!(matches!(c.confirm_and_close(), Err(AppError::ShiftClosed { .. })));

        // The store refuses as well, whoever asks.
        assert!(f
            .db
            .update_income(&shift_id, &IncomeAmounts::default(), IncomeStatus::Confirmed)
            .is_err());

        // After closing, the employee can open a new shift.
        c.reload().unwrap();
        assert_eq!(c.view(), &ShiftView::NoActiveShift);
        assert_ne!(c.start_shift().unwrap().id, shift_id);
    }

    #[test]
    fn test_close_with_pending_income_uses_draft() {
        let f = fixture();
        let mut c = controller(&f);
        c.start_shift().unwrap();
        c.set_income_draft(draft("80.5", "oops", "19.5")).unwrap();
        let reviewed = c.review().unwrap();
        assert_eq!(reviewed.total_income, dec!(100.00));

        let closed = c.confirm_and_close().unwrap();
        assert_eq!(closed, reviewed);
        let shift = c.shift().unwrap();
        assert_eq!(shift.income.cash, dec!(80.50));
        assert_eq!(shift.income_status, IncomeStatus::Pending);
    }

    #[test]
    fn test_review_and_edit_transitions() {
        let f = fixture();
        let mut c = controller(&f);
        assert!(matches!(c.review(), Err(AppError::InvalidTransition(_))));
        assert!(matches!(c.edit(), Err(AppError::InvalidTransition(_))));
        assert!(matches!(c.confirm_and_close(), Err(AppError::InvalidTransition(_))));

        c.start_shift().unwrap();
        c.set_income_draft(draft("5", "", "")).unwrap();
        assert!(matches!(c.confirm_and_close(), Err(AppError::InvalidTransition(_))));

        c.review().unwrap();
        assert!(matches!(c.view(), ShiftView::UnderReview { .. }));
        assert!(matches!(
            c.record_expense(&till_expense(&f, dec!(1))),
            Err(AppError::InvalidTransition(_))
        ));
        assert!(matches!(c.start_shift(), Err(AppError::ShiftAlreadyOpen { .. })));

        c.edit().unwrap();
        assert!(matches!(c.view(), ShiftView::Open { .. }));
        assert_eq!(c.draft().cash, "5");
        assert!(c.shift().unwrap().is_open());
    }

    #[test]
    fn test_record_expense_rules() {
        let f = fixture();
        let mut c = controller(&f);
        c.start_shift().unwrap();

        let entry = c.record_expense(&till_expense(&f, dec!(12.30))).unwrap();
        assert_eq!(entry.concept, "Makro");
        assert_eq!(entry.payment_method, PaymentMethod::TillCash);
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        let mut missing = till_expense(&f, dec!(5));
        missing.supplier_id = "nope".into();
        assert!(matches!(c.record_expense(&missing), Err(AppError::NotFound(_))));
        assert!(matches!(
            c.record_expense(&till_expense(&f, dec!(0.001))),
            Err(AppError::Validation(_))
        ));

        let mut with_concept = till_expense(&f, dec!(7.70));
        with_concept.concept = Some("Hielo".into());
        assert_eq!(c.record_expense(&with_concept).unwrap().concept, "Hielo");

        assert_eq!(c.shift().unwrap().expenses.len(), 2);
        assert_eq!(c.live_summary().unwrap().total_expenses, dec!(20.00));
    }

    #[test]
    fn test_failed_write_leaves_view_unchanged() {
        let f = fixture();
        let mut c = controller(&f);
        let shift_id = c.start_shift().unwrap().id.clone();
        c.set_income_draft(draft("10", "", "")).unwrap();
        let before = c.view().clone();

        // Someone else closes the shift behind this controller's back.
        f.db.close_shift(&shift_id, &IncomeAmounts::default(), Utc::now()).unwrap();

        assert!(matches!(c.confirm_income(), Err(AppError::Update(_))));
        assert_eq!(c.view(), &before);
        assert!(matches!(
            c.save_cash_count(CashCountKind::Initial, DenominationCounts::new()),
            Err(AppError::Update(_))
        ));
        assert!(matches!(
            c.record_expense(&till_expense(&f, dec!(3))),
            Err(AppError::Creation(_))
        ));
        c.review().unwrap();
        assert!(matches!(c.confirm_and_close(), Err(AppError::Persistence(_))));
        assert!(matches!(c.view(), ShiftView::UnderReview { .. }));
    }
}
