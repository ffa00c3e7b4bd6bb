//! Local SQLite database layer for ZasCash.
//!
//! Uses rusqlite with WAL mode. Provides schema migrations, settings helpers
//! and the SQLite implementation of every store trait. Amounts are stored as
//! integer cents.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::cash_count::{CashCount, CashCountKind, DenominationCounts};
use crate::directory::{Employee, Invitation, InvitationStatus, Location, Supplier};
use crate::expenses::{ExpenseEntry, PaymentMethod};
use crate::income::IncomeAmounts;
use crate::money::{self, from_cents};
use crate::reports::{self, MonthlySummary};
use crate::session::Role;
use crate::shifts::{IncomeStatus, NewShift, Shift, ShiftStatus};
use crate::store::{DirectoryStore, ExpenseStore, ReportStore, ShiftStore, StoreError, StoreResult};

/// Shared database handle.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Initialize the database at `{data_dir}/zascash.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations.
pub fn init(data_dir: &Path) -> StoreResult<DbState> {
    fs::create_dir_all(data_dir)?;

    let db_path = data_dir.join("zascash.db");
    info!("Opening database at {}", db_path.display());

    let conn = open_and_configure(&db_path)?;
    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// Migrated in-memory database, for tests and throwaway sessions.
pub fn open_in_memory() -> StoreResult<DbState> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    run_migrations(&conn)?;
    Ok(DbState {
        conn: Mutex::new(conn),
        db_path: PathBuf::from(":memory:"),
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Migration v1: locations, staff, suppliers, shifts, cash counts, expenses.
fn migrate_v1(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        -- local_settings (category/key/value store)
        CREATE TABLE IF NOT EXISTS local_settings (
            id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
            setting_category TEXT NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now')),
            UNIQUE(setting_category, setting_key)
        );

        CREATE TABLE IF NOT EXISTS locations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS employees (
            id TEXT PRIMARY KEY,
            location_id TEXT NOT NULL,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('manager','employee')),
            created_at TEXT DEFAULT (datetime('now')),
            FOREIGN KEY(location_id) REFERENCES locations(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS invitations (
            id TEXT PRIMARY KEY,
            location_id TEXT NOT NULL,
            email TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK(status IN ('pending','accepted','revoked')),
            created_at TEXT NOT NULL,
            FOREIGN KEY(location_id) REFERENCES locations(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS suppliers (
            id TEXT PRIMARY KEY,
            location_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now')),
            FOREIGN KEY(location_id) REFERENCES locations(id) ON DELETE CASCADE
        );

        -- shifts (turnos); income columns hold the latest snapshot
        CREATE TABLE IF NOT EXISTS shifts (
            id TEXT PRIMARY KEY,
            location_id TEXT NOT NULL,
            employee_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open' CHECK(status IN ('open','closed')),
            income_status TEXT NOT NULL DEFAULT 'pending'
                CHECK(income_status IN ('pending','confirmed')),
            opened_on TEXT NOT NULL,
            opened_at TEXT NOT NULL,
            closed_at TEXT,
            cash_cents INTEGER NOT NULL DEFAULT 0,
            card_cents INTEGER NOT NULL DEFAULT 0,
            mobile_cents INTEGER NOT NULL DEFAULT 0,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now')),
            FOREIGN KEY(location_id) REFERENCES locations(id) ON DELETE CASCADE
        );

        -- cash counts (arqueos), one per shift and kind
        CREATE TABLE IF NOT EXISTS cash_counts (
            shift_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('initial','final')),
            counts_json TEXT NOT NULL DEFAULT '{}',
            total_cents INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT DEFAULT (datetime('now')),
            PRIMARY KEY(shift_id, kind),
            FOREIGN KEY(shift_id) REFERENCES shifts(id) ON DELETE CASCADE
        );

        -- expenses (gastos); shift_id is NULL for general expenses
        CREATE TABLE IF NOT EXISTS expenses (
            id TEXT PRIMARY KEY,
            shift_id TEXT,
            location_id TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK(amount_cents > 0),
            concept TEXT NOT NULL,
            supplier_id TEXT,
            expense_date TEXT NOT NULL,
            payment_method TEXT NOT NULL
                CHECK(payment_method IN ('till_cash','cash','card','bank_transfer')),
            receipt_url TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(shift_id) REFERENCES shifts(id) ON DELETE CASCADE,
            FOREIGN KEY(location_id) REFERENCES locations(id) ON DELETE CASCADE,
            FOREIGN KEY(supplier_id) REFERENCES suppliers(id) ON DELETE SET NULL
        );

        -- Indexes
        CREATE UNIQUE INDEX IF NOT EXISTS idx_shifts_one_open
            ON shifts(location_id, employee_id) WHERE status = 'open';
        CREATE INDEX IF NOT EXISTS idx_shifts_location_opened_on ON shifts(location_id, opened_on);
        CREATE INDEX IF NOT EXISTS idx_expenses_location_date ON expenses(location_id, expense_date);
        CREATE INDEX IF NOT EXISTS idx_expenses_shift ON expenses(shift_id);
        CREATE INDEX IF NOT EXISTS idx_suppliers_location ON suppliers(location_id);
        CREATE INDEX IF NOT EXISTS idx_employees_location ON employees(location_id);
        CREATE INDEX IF NOT EXISTS idx_invitations_location_status ON invitations(location_id, status);
        CREATE INDEX IF NOT EXISTS idx_local_settings_cat_key ON local_settings(setting_category, setting_key);

        -- Record migration
        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| {
        error!("Migration v1 failed: {e}");
        StoreError::Sqlite(e)
    })?;

    info!("Applied migration v1");
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings helpers
// ---------------------------------------------------------------------------

/// Get a single setting value.
pub fn get_setting(conn: &Connection, category: &str, key: &str) -> Option<String> {
    conn.query_row(
        "SELECT setting_value FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
        params![category, key],
        |row| row.get(0),
    )
    .ok()
}

/// Insert or update a setting.
pub fn set_setting(conn: &Connection, category: &str, key: &str, value: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(setting_category, setting_key) DO UPDATE SET
            setting_value = excluded.setting_value,
            updated_at = excluded.updated_at",
        params![category, key, value],
    )?;
    Ok(())
}

impl DbState {
    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Backend(format!("database lock poisoned: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

const SHIFT_COLUMNS: &str = "id, location_id, employee_id, status, income_status, opened_on, \
     opened_at, closed_at, cash_cents, card_cents, mobile_cents";

const EXPENSE_COLUMNS: &str = "id, shift_id, location_id, amount_cents, concept, supplier_id, \
     expense_date, payment_method, receipt_url, created_by, created_at";

struct ShiftRow {
    id: String,
    location_id: String,
    employee_id: String,
    status: String,
    income_status: String,
    opened_on: NaiveDate,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    cash_cents: i64,
    card_cents: i64,
    mobile_cents: i64,
}

fn read_shift_row(row: &Row<'_>) -> rusqlite::Result<ShiftRow> {
    Ok(ShiftRow {
        id: row.get(0)?,
        location_id: row.get(1)?,
        employee_id: row.get(2)?,
        status: row.get(3)?,
        income_status: row.get(4)?,
        opened_on: row.get(5)?,
        opened_at: row.get(6)?,
        closed_at: row.get(7)?,
        cash_cents: row.get(8)?,
        card_cents: row.get(9)?,
        mobile_cents: row.get(10)?,
    })
}

struct ExpenseRow {
    id: String,
    shift_id: Option<String>,
    location_id: String,
    amount_cents: i64,
    concept: String,
    supplier_id: Option<String>,
    expense_date: NaiveDate,
    payment_method: String,
    receipt_url: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
}

fn read_expense_row(row: &Row<'_>) -> rusqlite::Result<ExpenseRow> {
    Ok(ExpenseRow {
        id: row.get(0)?,
        shift_id: row.get(1)?,
        location_id: row.get(2)?,
        amount_cents: row.get(3)?,
        concept: row.get(4)?,
        supplier_id: row.get(5)?,
        expense_date: row.get(6)?,
        payment_method: row.get(7)?,
        receipt_url: row.get(8)?,
        created_by: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl ExpenseRow {
    fn into_entry(self) -> StoreResult<ExpenseEntry> {
        let payment_method = PaymentMethod::parse(&self.payment_method).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "expense {} has payment method {:?}",
                self.id, self.payment_method
            ))
        })?;
        Ok(ExpenseEntry {
            id: self.id,
            shift_id: self.shift_id,
            location_id: self.location_id,
            amount: from_cents(self.amount_cents),
            concept: self.concept,
            supplier_id: self.supplier_id,
            date: self.expense_date,
            payment_method,
            receipt_url: self.receipt_url,
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}

fn load_cash_counts(
    conn: &Connection,
    shift_id: &str,
) -> StoreResult<(Option<CashCount>, Option<CashCount>)> {
    let mut stmt =
        conn.prepare("SELECT kind, counts_json FROM cash_counts WHERE shift_id = ?1")?;
    let rows = stmt.query_map(params![shift_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut initial = None;
    let mut final_count = None;
    for row in rows {
        let (kind, json) = row?;
        let kind = CashCountKind::parse(&kind)
            .ok_or_else(|| StoreError::Corrupt(format!("cash count kind {kind:?}")))?;
        let raw: serde_json::Value = serde_json::from_str(&json)
            .map_err(|e| StoreError::Corrupt(format!("cash count of shift {shift_id}: {e}")))?;
        let count = CashCount::new(shift_id, kind, DenominationCounts::from_value(&raw));
        match kind {
            CashCountKind::Initial => initial = Some(count),
            CashCountKind::Final => final_count = Some(count),
        }
    }
    Ok((initial, final_count))
}

fn load_shift_expenses(conn: &Connection, shift_id: &str) -> StoreResult<Vec<ExpenseEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE shift_id = ?1 ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map(params![shift_id], read_expense_row)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?.into_entry()?);
    }
    Ok(entries)
}

fn load_shift(conn: &Connection, shift_id: &str) -> StoreResult<Option<Shift>> {
    let row = conn
        .query_row(
            &format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?1"),
            params![shift_id],
            read_shift_row,
        )
        .optional()?;
    let Some(row) = row else {
        return Ok(None);
    };

    let status = ShiftStatus::parse(&row.status).ok_or_else(|| {
        StoreError::Corrupt(format!("shift {} has status {:?}", row.id, row.status))
    })?;
    let income_status = IncomeStatus::parse(&row.income_status).ok_or_else(|| {
        StoreError::Corrupt(format!(
            "shift {} has income status {:?}",
            row.id, row.income_status
        ))
    })?;
    let (initial_count, final_count) = load_cash_counts(conn, &row.id)?;
    let expenses = load_shift_expenses(conn, &row.id)?;

    Ok(Some(Shift {
        id: row.id,
        location_id: row.location_id,
        employee_id: row.employee_id,
        status,
        income_status,
        opened_on: row.opened_on,
        opened_at: row.opened_at,
        closed_at: row.closed_at,
        initial_count,
        final_count,
        income: IncomeAmounts::new(
            from_cents(row.cash_cents),
            from_cents(row.card_cents),
            from_cents(row.mobile_cents),
        ),
        expenses,
    }))
}

fn ensure_shift_open(conn: &Connection, shift_id: &str) -> StoreResult<()> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM shifts WHERE id = ?1",
            params![shift_id],
            |row| row.get(0),
        )
        .optional()?;
    match status.as_deref() {
        Some("open") => Ok(()),
        Some(_) => Err(StoreError::Backend(format!("shift {shift_id} is not open"))),
        None => Err(StoreError::Backend(format!("shift {shift_id} does not exist"))),
    }
}

fn expect_one_row(changed: usize, what: impl FnOnce() -> String) -> StoreResult<()> {
    if changed == 0 {
        Err(StoreError::Backend(what()))
    } else {
        Ok(())
    }
}

fn cents(amount: Decimal) -> StoreResult<i64> {
    money::to_cents(amount)
        .ok_or_else(|| StoreError::Backend(format!("amount {amount} is out of range")))
}

// ---------------------------------------------------------------------------
// Shifts
// ---------------------------------------------------------------------------

impl ShiftStore for DbState {
    fn find_open_shift(&self, location_id: &str, employee_id: &str) -> StoreResult<Option<Shift>> {
        let conn = self.lock()?;
        let id: Option<String> = conn
            .query_row(
                "SELECT id FROM shifts
                 WHERE location_id = ?1 AND employee_id = ?2 AND status = 'open'
                 ORDER BY opened_at DESC LIMIT 1",
                params![location_id, employee_id],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => load_shift(&conn, &id),
            None => Ok(None),
        }
    }

    fn get_shift(&self, shift_id: &str) -> StoreResult<Option<Shift>> {
        let conn = self.lock()?;
        load_shift(&conn, shift_id)
    }

    fn insert_shift(&self, shift: &NewShift) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO shifts (id, location_id, employee_id, status, income_status, opened_on, opened_at)
             VALUES (?1, ?2, ?3, 'open', 'pending', ?4, ?5)",
            params![
                shift.id,
                shift.location_id,
                shift.employee_id,
                shift.opened_on(),
                shift.opened_at
            ],
        )?;
        Ok(())
    }

    fn upsert_cash_count(&self, count: &CashCount) -> StoreResult<()> {
        let counts_json = serde_json::to_string(&count.counts)
            .map_err(|e| StoreError::Corrupt(format!("cash count encode: {e}")))?;
        let conn = self.lock()?;
        ensure_shift_open(&conn, &count.shift_id)?;
        conn.execute(
            "INSERT INTO cash_counts (shift_id, kind, counts_json, total_cents, updated_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))
             ON CONFLICT(shift_id, kind) DO UPDATE SET
                counts_json = excluded.counts_json,
                total_cents = excluded.total_cents,
                updated_at = excluded.updated_at",
            params![
                count.shift_id,
                count.kind.as_str(),
                counts_json,
                cents(count.total())?
            ],
        )?;
        Ok(())
    }

    fn update_income(
        &self,
        shift_id: &str,
        income: &IncomeAmounts,
        status: IncomeStatus,
    ) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE shifts SET cash_cents = ?2, card_cents = ?3, mobile_cents = ?4,
                income_status = ?5, updated_at = datetime('now')
             WHERE id = ?1 AND status = 'open'",
            params![
                shift_id,
                cents(income.cash)?,
                cents(income.card)?,
                cents(income.mobile)?,
                status.as_str()
            ],
        )?;
        expect_one_row(changed, || format!("shift {shift_id} is not open"))
    }

    fn close_shift(
        &self,
        shift_id: &str,
        income: &IncomeAmounts,
        closed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE shifts SET cash_cents = ?2, card_cents = ?3, mobile_cents = ?4,
                status = 'closed', closed_at = ?5, updated_at = datetime('now')
             WHERE id = ?1 AND status = 'open'",
            params![
                shift_id,
                cents(income.cash)?,
                cents(income.card)?,
                cents(income.mobile)?,
                closed_at
            ],
        )?;
        expect_one_row(changed, || format!("shift {shift_id} is not open"))
    }

    fn list_shifts(
        &self,
        location_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Shift>> {
        let conn = self.lock()?;
        let ids: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT id FROM shifts
                 WHERE location_id = ?1 AND opened_on BETWEEN ?2 AND ?3
                 ORDER BY opened_at DESC",
            )?;
            let rows = stmt.query_map(params![location_id, from, to], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };

        let mut shifts = Vec::with_capacity(ids.len());
        for id in ids {
            match load_shift(&conn, &id) {
                Ok(Some(shift)) => shifts.push(shift),
                Ok(None) => {}
                Err(StoreError::Corrupt(msg)) => {
                    warn!(shift_id = %id, "Skipping malformed shift: {msg}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(shifts)
    }
}

// ---------------------------------------------------------------------------
// Expenses
// ---------------------------------------------------------------------------

impl ExpenseStore for DbState {
    fn insert_expense(&self, expense: &ExpenseEntry) -> StoreResult<()> {
        let conn = self.lock()?;
        if let Some(shift_id) = &expense.shift_id {
            ensure_shift_open(&conn, shift_id)?;
        }
        conn.execute(
            &format!(
                "INSERT INTO expenses ({EXPENSE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                expense.id,
                expense.shift_id,
                expense.location_id,
                cents(expense.amount)?,
                expense.concept,
                expense.supplier_id,
                expense.date,
                expense.payment_method.as_str(),
                expense.receipt_url,
                expense.created_by,
                expense.created_at
            ],
        )?;
        Ok(())
    }

    fn get_expense(&self, expense_id: &str) -> StoreResult<Option<ExpenseEntry>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?1"),
                params![expense_id],
                read_expense_row,
            )
            .optional()?;
        row.map(ExpenseRow::into_entry).transpose()
    }

    fn update_expense(&self, expense: &ExpenseEntry) -> StoreResult<()> {
        let conn = self.lock()?;
        if let Some(shift_id) = &expense.shift_id {
            ensure_shift_open(&conn, shift_id)?;
        }
        let changed = conn.execute(
            "UPDATE expenses SET amount_cents = ?2, concept = ?3, supplier_id = ?4,
                expense_date = ?5, payment_method = ?6, receipt_url = ?7
             WHERE id = ?1",
            params![
                expense.id,
                cents(expense.amount)?,
                expense.concept,
                expense.supplier_id,
                expense.date,
                expense.payment_method.as_str(),
                expense.receipt_url
            ],
        )?;
        expect_one_row(changed, || format!("expense {} does not exist", expense.id))
    }

    fn delete_expense(&self, expense_id: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM expenses
             WHERE id = ?1
               AND (shift_id IS NULL
                    OR shift_id IN (SELECT id FROM shifts WHERE status = 'open'))",
            params![expense_id],
        )?;
        expect_one_row(changed, || {
            format!("expense {expense_id} does not exist or belongs to a closed shift")
        })
    }

    fn list_expenses(
        &self,
        location_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<ExpenseEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses
             WHERE location_id = ?1 AND expense_date BETWEEN ?2 AND ?3
             ORDER BY expense_date DESC, created_at DESC"
        ))?;
        let rows = stmt.query_map(params![location_id, from, to], read_expense_row)?;

        let mut entries = Vec::new();
        for row in rows {
            match row?.into_entry() {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping malformed expense: {e}"),
            }
        }
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

fn read_location(row: &Row<'_>) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn read_supplier(row: &Row<'_>) -> rusqlite::Result<Supplier> {
    Ok(Supplier {
        id: row.get(0)?,
        location_id: row.get(1)?,
        name: row.get(2)?,
    })
}

fn read_employee(row: &Row<'_>) -> rusqlite::Result<(Employee, String)> {
    let role: String = row.get(4)?;
    Ok((
        Employee {
            id: row.get(0)?,
            location_id: row.get(1)?,
            full_name: row.get(2)?,
            email: row.get(3)?,
            role: Role::Employee,
        },
        role,
    ))
}

fn employee_with_role((mut employee, role): (Employee, String)) -> StoreResult<Employee> {
    employee.role = Role::parse(&role).ok_or_else(|| {
        StoreError::Corrupt(format!("employee {} has role {role:?}", employee.id))
    })?;
    Ok(employee)
}

fn read_invitation(row: &Row<'_>) -> rusqlite::Result<(Invitation, String)> {
    let status: String = row.get(3)?;
    Ok((
        Invitation {
            id: row.get(0)?,
            location_id: row.get(1)?,
            email: row.get(2)?,
            status: InvitationStatus::Pending,
            created_at: row.get(4)?,
        },
        status,
    ))
}

fn invitation_with_status((mut invitation, status): (Invitation, String)) -> StoreResult<Invitation> {
    invitation.status = InvitationStatus::parse(&status).ok_or_else(|| {
        StoreError::Corrupt(format!("invitation {} has status {status:?}", invitation.id))
    })?;
    Ok(invitation)
}

impl DirectoryStore for DbState {
    fn insert_location(&self, location: &Location) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO locations (id, name, owner_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![location.id, location.name, location.owner_id, location.created_at],
        )?;
        Ok(())
    }

    fn get_location(&self, location_id: &str) -> StoreResult<Option<Location>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, name, owner_id, created_at FROM locations WHERE id = ?1",
                params![location_id],
                read_location,
            )
            .optional()?)
    }

    fn list_locations(&self, owner_id: &str) -> StoreResult<Vec<Location>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, owner_id, created_at FROM locations
             WHERE owner_id = ?1 ORDER BY created_at ASC, name ASC",
        )?;
        let rows = stmt.query_map(params![owner_id], read_location)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn delete_location(&self, location_id: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM locations WHERE id = ?1", params![location_id])?;
        expect_one_row(changed, || format!("location {location_id} does not exist"))
    }

    fn insert_supplier(&self, supplier: &Supplier) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO suppliers (id, location_id, name) VALUES (?1, ?2, ?3)",
            params![supplier.id, supplier.location_id, supplier.name],
        )?;
        Ok(())
    }

    fn get_supplier(&self, supplier_id: &str) -> StoreResult<Option<Supplier>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, location_id, name FROM suppliers WHERE id = ?1",
                params![supplier_id],
                read_supplier,
            )
            .optional()?)
    }

    fn list_suppliers(&self, location_id: &str) -> StoreResult<Vec<Supplier>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, location_id, name FROM suppliers
             WHERE location_id = ?1 ORDER BY name COLLATE NOCASE ASC",
        )?;
        let rows = stmt.query_map(params![location_id], read_supplier)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn delete_supplier(&self, supplier_id: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM suppliers WHERE id = ?1", params![supplier_id])?;
        expect_one_row(changed, || format!("supplier {supplier_id} does not exist"))
    }

    fn accept_invitation(&self, invitation_id: &str, employee: &Employee) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;

        let result = (|| -> StoreResult<()> {
            let changed = conn.execute(
                "UPDATE invitations SET status = 'accepted'
                 WHERE id = ?1 AND status = 'pending'",
                params![invitation_id],
            )?;
            expect_one_row(changed, || format!("invitation {invitation_id} is not pending"))?;
            conn.execute(
                "INSERT INTO employees (id, location_id, full_name, email, role)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    employee.id,
                    employee.location_id,
                    employee.full_name,
                    employee.email,
                    employee.role.as_str()
                ],
            )?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    fn get_employee(&self, employee_id: &str) -> StoreResult<Option<Employee>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, location_id, full_name, email, role FROM employees WHERE id = ?1",
            params![employee_id],
            read_employee,
        )
        .optional()?
        .map(employee_with_role)
        .transpose()
    }

    fn list_employees(&self, location_id: &str) -> StoreResult<Vec<Employee>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, location_id, full_name, email, role FROM employees
             WHERE location_id = ?1 ORDER BY full_name ASC",
        )?;
        let rows = stmt.query_map(params![location_id], read_employee)?;
        let mut employees = Vec::new();
        for row in rows {
            match employee_with_role(row?) {
                Ok(employee) => employees.push(employee),
                Err(e) => warn!("Skipping malformed employee: {e}"),
            }
        }
        Ok(employees)
    }

    fn delete_employee(&self, employee_id: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM employees WHERE id = ?1", params![employee_id])?;
        expect_one_row(changed, || format!("employee {employee_id} does not exist"))
    }

    fn insert_invitation(&self, invitation: &Invitation) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO invitations (id, location_id, email, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                invitation.id,
                invitation.location_id,
                invitation.email,
                invitation.status.as_str(),
                invitation.created_at
            ],
        )?;
        Ok(())
    }

    fn get_invitation(&self, invitation_id: &str) -> StoreResult<Option<Invitation>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, location_id, email, status, created_at FROM invitations WHERE id = ?1",
            params![invitation_id],
            read_invitation,
        )
        .optional()?
        .map(invitation_with_status)
        .transpose()
    }

    fn list_invitations(
        &self,
        location_id: &str,
        status: InvitationStatus,
    ) -> StoreResult<Vec<Invitation>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, location_id, email, status, created_at FROM invitations
             WHERE location_id = ?1 AND status = ?2 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![location_id, status.as_str()], read_invitation)?;
        let mut invitations = Vec::new();
        for row in rows {
            invitations.push(invitation_with_status(row?)?);
        }
        Ok(invitations)
    }

    fn set_invitation_status(
        &self,
        invitation_id: &str,
        status: InvitationStatus,
    ) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE invitations SET status = ?2 WHERE id = ?1",
            params![invitation_id, status.as_str()],
        )?;
        expect_one_row(changed, || format!("invitation {invitation_id} does not exist"))
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

impl ReportStore for DbState {
    fn monthly_summary(
        &self,
        location_id: &str,
        year: i32,
        month: u32,
    ) -> StoreResult<MonthlySummary> {
        let (from, to) =
            reports::month_range(year, month).map_err(|e| StoreError::Backend(e.to_string()))?;
        let conn = self.lock()?;
        let (income_cents, expense_cents): (i64, i64) = conn.query_row(
            "SELECT
                (SELECT COALESCE(SUM(cash_cents + card_cents + mobile_cents), 0) FROM shifts
                  WHERE location_id = ?1 AND opened_on BETWEEN ?2 AND ?3
                    AND (status = 'closed' OR income_status = 'confirmed')),
                (SELECT COALESCE(SUM(amount_cents), 0) FROM expenses
                  WHERE location_id = ?1 AND expense_date BETWEEN ?2 AND ?3)",
            params![location_id, from, to],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(MonthlySummary {
            total_income: from_cents(income_cents),
            total_expenses: from_cents(expense_cents),
        })
    }
}

/// Insert an open shift opened at 09:00 UTC on `day` and return its id.
#[cfg(test)]
pub fn insert_test_shift(db: &DbState, location_id: &str, employee_id: &str, day: NaiveDate) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    let opened_at = day
        .and_time(chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap())
        .and_utc();
    db.insert_shift(&NewShift {
        id: id.clone(),
        location_id: location_id.to_string(),
        employee_id: employee_id.to_string(),
        opened_at,
    })
    .expect("insert test shift");
    id
}

// ===========================================================================
// Tests
// ===========================================================================
