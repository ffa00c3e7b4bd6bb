//! Runtime configuration: defaults, then environment overrides, then the
//! policy stored in `local_settings`.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::db;
use crate::error::{AppError, AppResult};

pub const ENV_DATA_DIR: &str = "ZASCASH_DATA_DIR";
pub const ENV_LOG: &str = "ZASCASH_LOG";
pub const ENV_LOG_RETENTION: &str = "ZASCASH_LOG_RETENTION";
pub const ENV_STRICT_FINAL_COUNT: &str = "ZASCASH_STRICT_FINAL_COUNT";

/// `local_settings` category holding the shift policy.
pub const SHIFT_SETTINGS_CATEGORY: &str = "shift";
const STRICT_FINAL_COUNT_KEY: &str = "require_income_before_final_count";

pub const DEFAULT_LOG_FILTER: &str = "info,zascash_lib=debug";
pub const DEFAULT_MAX_LOG_FILES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// `EnvFilter` directive string.
    pub filter: String,
    pub dir: PathBuf,
    /// Rolled files kept on disk; older ones are pruned at startup.
    pub max_files: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftPolicy {
    /// The final count can only be saved once an initial count exists and
    /// income has been confirmed.
    pub require_income_before_final_count: bool,
}

impl Default for ShiftPolicy {
    fn default() -> Self {
        Self {
            require_income_before_final_count: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log: LogConfig,
    pub policy: ShiftPolicy,
    /// ISO 4217 code. Only EUR denominations exist today.
    pub currency: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            log: LogConfig {
                filter: DEFAULT_LOG_FILTER.to_string(),
                dir: data_dir.join("logs"),
                max_files: DEFAULT_MAX_LOG_FILES,
            },
            data_dir,
            policy: ShiftPolicy::default(),
            currency: "EUR".to_string(),
        }
    }
}

/// Platform data directory, e.g. `~/.local/share/app.zascash`.
pub fn default_data_dir() -> PathBuf {
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            {
                PathBuf::from(std::env::var("USERPROFILE").unwrap_or_else(|_| ".".into()))
                    .join("AppData")
                    .join("Local")
            }
            #[cfg(not(target_os = "windows"))]
            {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                    .join(".local")
                    .join("share")
            }
        });
    base.join("app.zascash")
}

fn parse_bool(key: &str, raw: &str) -> AppResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::Config(format!("{key}: expected a boolean, got {other:?}"))),
    }
}

impl AppConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir.trim());
            config.log.dir = config.data_dir.join("logs");
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            config.log.filter = filter.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_LOG_RETENTION) {
            let files: usize = raw.trim().parse().map_err(|_| {
                AppError::Config(format!("{ENV_LOG_RETENTION}: expected a file count, got {raw:?}"))
            })?;
            if files == 0 {
                return Err(AppError::Config(format!("{ENV_LOG_RETENTION} must be at least 1")));
            }
            config.log.max_files = files;
        }
        if let Some(raw) = lookup(ENV_STRICT_FINAL_COUNT) {
            config.policy.require_income_before_final_count =
                parse_bool(ENV_STRICT_FINAL_COUNT, &raw)?;
        }

        debug!(data_dir = %config.data_dir.display(), "Configuration loaded");
        Ok(config)
    }

    /// Apply the shift policy stored in the database, if any.
    pub fn apply_settings(&mut self, conn: &Connection) -> AppResult<()> {
        if let Some(raw) = db::get_setting(conn, SHIFT_SETTINGS_CATEGORY, STRICT_FINAL_COUNT_KEY) {
            self.policy.require_income_before_final_count =
                parse_bool(STRICT_FINAL_COUNT_KEY, &raw)?;
        }
        Ok(())
    }
}

/// Persist the shift policy so it survives restarts.
pub fn save_policy(conn: &Connection, policy: &ShiftPolicy) -> AppResult<()> {
    db::set_setting(
        conn,
        SHIFT_SETTINGS_CATEGORY,
        STRICT_FINAL_COUNT_KEY,
        if policy.require_income_before_final_count {
            "true"
        } else {
            "false"
        },
    )?;
    info!(
        strict_final_count = policy.require_income_before_final_count,
        "Shift policy saved"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.log.filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.log.max_files, DEFAULT_MAX_LOG_FILES);
        assert!(config.policy.require_income_before_final_count);
        assert_eq!(config.currency, "EUR");
        assert!(config.data_dir.ends_with("app.zascash"));
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/srv/zascash"),
            (ENV_LOG, "warn"),
            (ENV_LOG_RETENTION, "3"),
            (ENV_STRICT_FINAL_COUNT, "off"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/zascash"));
        assert_eq!(config.log.dir, PathBuf::from("/srv/zascash/logs"));
        assert_eq!(config.log.filter, "warn");
        assert_eq!(config.log.max_files, 3);
        assert!(!config.policy.require_income_before_final_count);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for vars in [
            [(ENV_LOG_RETENTION, "many")],
            [(ENV_LOG_RETENTION, "0")],
            [(ENV_STRICT_FINAL_COUNT, "maybe")],
        ] {
            assert!(matches!(
                AppConfig::from_lookup(lookup(&vars)),
                Err(AppError::Config(_))
            ));
        }
    }

    #[test]
    fn test_policy_round_trips_through_settings() {
        let db = db::open_in_memory().unwrap();
        let conn = db.conn.lock().unwrap();

        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.apply_settings(&conn).unwrap();
        assert!(config.policy.require_income_before_final_count);

        save_policy(
            &conn,
            &ShiftPolicy {
                require_income_before_final_count: false,
            },
        )
        .unwrap();
        config.apply_settings(&conn).unwrap();
        assert!(!config.policy.require_income_before_final_count);
    }
}
