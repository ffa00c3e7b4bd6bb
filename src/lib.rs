//! ZasCash - cash register shift control for hospitality venues.
//!
//! Shifts ("turnos") with opening and closing cash counts, income by payment
//! channel, till expenses and the resulting net cash, plus the location
//! directory, general expenses and monthly figures around them. Persistence
//! goes through the traits in [`store`]; [`db::DbState`] implements them on
//! SQLite.

use std::path::PathBuf;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

pub mod access;
pub mod cash_count;
pub mod config;
pub mod controller;
pub mod db;
pub mod denominations;
pub mod directory;
pub mod error;
pub mod expenses;
pub mod history;
pub mod income;
pub mod logging;
pub mod money;
pub mod receipts;
pub mod reconciliation;
pub mod reports;
pub mod session;
pub mod shifts;
pub mod store;

pub use config::{AppConfig, ShiftPolicy};
pub use controller::{ShiftController, ShiftView};
pub use db::DbState;
pub use error::{AppError, AppResult};
pub use session::{Role, SessionContext, SessionState};

use crate::receipts::FsReceiptStorage;

/// Everything a running instance holds: configuration, database, session and
/// receipt storage.
pub struct App {
    pub config: AppConfig,
    pub db: DbState,
    pub session: SessionState,
    pub receipts: FsReceiptStorage,
    _log_guard: Option<WorkerGuard>,
}

impl App {
    /// Open the database under `config.data_dir` and apply stored settings.
    /// Logging is left to the caller.
    pub fn open(mut config: AppConfig) -> AppResult<Self> {
        let db = db::init(&config.data_dir)?;
        {
            let conn = db
                .conn
                .lock()
                .map_err(|e| AppError::Persistence(e.to_string()))?;
            config.apply_settings(&conn)?;
        }
        let receipts = FsReceiptStorage::new(receipts_dir(&config));
        Ok(Self {
            config,
            db,
            session: SessionState::new(),
            receipts,
            _log_guard: None,
        })
    }

    /// Controller for the signed-in user at the selected location.
    pub fn shift_controller(&self) -> AppResult<ShiftController<'_, DbState>> {
        let ctx = self.session.context()?;
        ShiftController::load(&self.db, ctx, self.config.policy)
    }
}

fn receipts_dir(config: &AppConfig) -> PathBuf {
    config.data_dir.join("receipts")
}

/// Load configuration from the environment, install logging and open the
/// database.
pub fn start() -> AppResult<App> {
    let config = AppConfig::from_env()?;
    let guard = logging::init(&config.log)?;
    let mut app = App::open(config)?;
    app._log_guard = Some(guard);
    info!(
        data_dir = %app.config.data_dir.display(),
        strict_final_count = app.config.policy.require_income_before_final_count,
        "ZasCash ready"
    );
    Ok(app)
}
