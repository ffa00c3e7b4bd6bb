//! Receipt ("factura") images attached to till expenses.
//!
//! Files are keyed `{location}/{shift}/{millis}_{name}` so one shift's
//! receipts sit together and two uploads of the same name never collide.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::store::{StoreError, StoreResult};

/// Object storage for receipt files.
pub trait ReceiptStorage {
    /// Store `bytes` under `path` and return a URL the file can be read from.
    fn upload(&self, path: &str, bytes: &[u8]) -> StoreResult<String>;
}

/// Keep only the final component of a client-supplied file name.
fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match last {
        "" | "." | ".." => "receipt".to_string(),
        other => other.to_string(),
    }
}

pub fn receipt_path(location_id: &str, shift_id: &str, millis: i64, file_name: &str) -> String {
    format!(
        "{location_id}/{shift_id}/{millis}_{}",
        sanitize_file_name(file_name)
    )
}

/// Upload a receipt for a shift expense and return its URL.
pub fn upload_receipt<R: ReceiptStorage>(
    storage: &R,
    location_id: &str,
    shift_id: &str,
    now: DateTime<Utc>,
    file_name: &str,
    bytes: &[u8],
) -> AppResult<String> {
    if bytes.is_empty() {
        return Err(AppError::validation("receipt file is empty"));
    }
    let path = receipt_path(location_id, shift_id, now.timestamp_millis(), file_name);
    let url = storage.upload(&path, bytes).map_err(AppError::creation)?;
    info!(shift_id = %shift_id, path = %path, size = bytes.len(), "Receipt uploaded");
    Ok(url)
}

/// Receipts stored as plain files under a root directory.
pub struct FsReceiptStorage {
    root: PathBuf,
}

impl FsReceiptStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ReceiptStorage for FsReceiptStorage {
    fn upload(&self, path: &str, bytes: &[u8]) -> StoreResult<String> {
        let relative = Path::new(path);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(StoreError::Backend(format!("invalid receipt path {path:?}")));
        }
        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if target.exists() {
            return Err(StoreError::Backend(format!("receipt {path} already exists")));
        }
        fs::write(&target, bytes)?;
        let absolute = fs::canonicalize(&target)?;
        Ok(format!("file://{}", absolute.display()))
    }
}
