//! Environment-driven configuration for storage and logging.
//!
//! # Responsibility
//! - Decide, once per process, which storage backend to build.
//! - Resolve backing store locations and logging settings.
//!
//! # Invariants
//! - Unknown storage types are rejected instead of silently defaulting.
//! - The test environment never points at development data.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_STORAGE_TYPE: &str = "HBNB_TYPE_STORAGE";
pub const ENV_ENVIRONMENT: &str = "HBNB_ENV";
pub const ENV_FILE_PATH: &str = "HBNB_FILE_PATH";
pub const ENV_SQLITE_PATH: &str = "HBNB_SQLITE_PATH";
pub const ENV_LOG_LEVEL: &str = "HBNB_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "HBNB_LOG_DIR";

const DEFAULT_FILE_PATH: &str = "file.json";
const DEFAULT_SQLITE_PATH: &str = "hbnb_dev_db.sqlite3";
const TEST_FILE_PATH: &str = "/tmp/test_file.json";
const TEST_SQLITE_PATH: &str = "hbnb_test_db.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnsupportedStorage(String),
    EmptyValue(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedStorage(value) => write!(
                f,
                "unsupported {ENV_STORAGE_TYPE} `{value}`; expected file|db"
            ),
            Self::EmptyValue(name) => write!(f, "{name} cannot be empty"),
        }
    }
}

impl Error for ConfigError {}

/// Which storage engine the process runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// JSON snapshot document.
    File,
    /// SQLite database.
    Db,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub file_path: PathBuf,
    pub db_path: PathBuf,
}

impl StorageConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which returns a variable's value.
    ///
    /// # Errors
    /// - `UnsupportedStorage` for a storage type other than `file`/`db`.
    /// - `EmptyValue` when a path variable is set but blank.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = match lookup(ENV_STORAGE_TYPE)
            .map(|value| value.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("") | Some("file") => StorageBackend::File,
            Some("db") => StorageBackend::Db,
            Some(other) => return Err(ConfigError::UnsupportedStorage(other.to_string())),
        };

        let is_test = lookup(ENV_ENVIRONMENT).is_some_and(|value| value.trim() == "test");
        let (default_file, default_db) = if is_test {
            (TEST_FILE_PATH, TEST_SQLITE_PATH)
        } else {
            (DEFAULT_FILE_PATH, DEFAULT_SQLITE_PATH)
        };

        Ok(Self {
            backend,
            file_path: path_setting(&lookup, ENV_FILE_PATH, default_file)?,
            db_path: path_setting(&lookup, ENV_SQLITE_PATH, default_db)?,
        })
    }
}

/// Logging settings; logging stays off when no directory is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: Option<String>,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let level = lookup(ENV_LOG_LEVEL)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| default_log_level().to_string());
        let log_dir = lookup(ENV_LOG_DIR).filter(|value| !value.trim().is_empty());
        Self { level, log_dir }
    }
}

fn path_setting(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: &str,
) -> Result<PathBuf, ConfigError> {
    match lookup(name) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(name)),
        Some(value) => Ok(PathBuf::from(value.trim())),
        None => Ok(PathBuf::from(default)),
    }
}
