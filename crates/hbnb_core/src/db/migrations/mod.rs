//! Schema scripts for the entity tables, applied in version order.
//!
//! # Invariants
//! - Script versions are contiguous from 1.
//! - The applied version is mirrored to `PRAGMA user_version`.
//! - A pending batch applies atomically: all scripts or none.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct SchemaScript {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCRIPTS: &[SchemaScript] = &[SchemaScript {
    version: 1,
    name: "0001_init",
    sql: include_str!("0001_init.sql"),
}];

/// Schema version this build creates and understands.
pub fn latest_version() -> u32 {
    SCRIPTS.last().map_or(0, |script| script.version)
}

/// Schema version recorded in the database.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Brings the database at `location` to the latest schema.
///
/// Returns how many scripts were applied.
///
/// # Errors
/// - `SchemaTooNew` when the database is ahead of this build.
/// - `Migration` naming the failing script; the batch is rolled back.
pub fn apply_migrations(conn: &mut Connection, location: &str) -> DbResult<usize> {
    let found = schema_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::SchemaTooNew {
            location: location.to_string(),
            found,
            supported,
        });
    }

    let pending: Vec<&SchemaScript> = SCRIPTS
        .iter()
        .filter(|script| script.version > found)
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for script in &pending {
        let versioned = format!("{}\nPRAGMA user_version = {};", script.sql, script.version);
        tx.execute_batch(&versioned)
            .map_err(|source| DbError::Migration {
                location: location.to_string(),
                script: script.name,
                source,
            })?;
        info!(
            "event=db_migrate module=db status=ok location={} script={} version={}",
            location, script.name, script.version
        );
    }
    tx.commit()?;
    Ok(pending.len())
}
