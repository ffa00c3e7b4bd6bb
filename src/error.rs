//! Error taxonomy shared by every action.
//!
//! Each variant maps to one user-facing notification. Backend failures keep
//! the raw backend message so it can be shown as-is.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed input, caught before any write.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("could not create record: {0}")]
    Creation(String),

    #[error("could not update record: {0}")]
    Update(String),

    #[error("could not persist changes: {0}")]
    Persistence(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("an open shift already exists ({shift_id})")]
    ShiftAlreadyOpen { shift_id: String },

    #[error("shift {shift_id} is closed and can no longer be modified")]
    ShiftClosed { shift_id: String },

    #[error("action not allowed in the current view: {0}")]
    InvalidTransition(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub(crate) fn creation(err: StoreError) -> Self {
        AppError::Creation(err.to_string())
    }

    pub(crate) fn update(err: StoreError) -> Self {
        AppError::Update(err.to_string())
    }

    pub(crate) fn persistence(err: StoreError) -> Self {
        AppError::Persistence(err.to_string())
    }
}

/// Reads are not tied to a specific write action, so they surface as
/// persistence failures.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Persistence(err.to_string())
    }
}
