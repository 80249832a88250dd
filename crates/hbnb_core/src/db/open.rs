//! Session bootstrap for SQLite.
//!
//! # Invariants
//! - Returned connections are at the latest schema.
//! - Returned connections wait up to 5 seconds on a locked database.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Location label used for private in-memory databases.
pub const MEMORY_LOCATION: &str = ":memory:";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (or creates) the database file at `path`.
///
/// # Side effects
/// - Emits `db_open` events with the location and duration.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    bootstrap(path.display().to_string(), || Connection::open(path))
}

/// Opens a private in-memory database.
pub fn open_db_in_memory() -> DbResult<Connection> {
    bootstrap(MEMORY_LOCATION.to_string(), Connection::open_in_memory)
}

fn bootstrap(
    location: String,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result = connect()
        .and_then(|conn| conn.busy_timeout(BUSY_TIMEOUT).map(|()| conn))
        .map_err(|source| DbError::Open {
            location: location.clone(),
            source,
        })
        .and_then(|mut conn| {
            apply_migrations(&mut conn, &location).map(|applied| (conn, applied))
        });

    match result {
        Ok((conn, applied)) => {
            info!(
                "event=db_open module=db status=ok location={} migrations_applied={} duration_ms={}",
                location,
                applied,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error location={} duration_ms={} error={}",
                location,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}
