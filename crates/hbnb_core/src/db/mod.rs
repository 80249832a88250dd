//! SQLite bootstrap for the database storage engine.
//!
//! # Responsibility
//! - Open SQLite sessions at a file path or in memory.
//! - Bring the entity tables to the latest schema before any row access.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Bootstrap errors name the database they happened on.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, MEMORY_LOCATION};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// The database could not be opened or configured.
    Open {
        location: String,
        source: rusqlite::Error,
    },
    /// A schema script failed; nothing from the pending batch was applied.
    Migration {
        location: String,
        script: &'static str,
        source: rusqlite::Error,
    },
    /// The database was written by a build with a newer schema.
    SchemaTooNew {
        location: String,
        found: u32,
        supported: u32,
    },
    /// A statement failed on an open session.
    Sqlite(rusqlite::Error),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { location, source } => {
                write!(f, "cannot open database `{location}`: {source}")
            }
            Self::Migration {
                location,
                script,
                source,
            } => write!(f, "schema script {script} failed on `{location}`: {source}"),
            Self::SchemaTooNew {
                location,
                found,
                supported,
            } => write!(
                f,
                "database `{location}` has schema version {found}; this build supports up to {supported}"
            ),
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } | Self::Migration { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
