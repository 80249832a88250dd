//! Transactional storage engine backed by SQLite.
//!
//! # Responsibility
//! - Map entities to one table per kind plus the `place_amenity` link table.
//! - Scope a unit of work to one lazily opened session: staged writes live in
//!   an open transaction until `save` commits them.
//!
//! # Invariants
//! - Reads on the session observe its own uncommitted writes, matching the
//!   snapshot engine's working-set semantics.
//! - `close` and `reload` roll back uncommitted work; a crash does the same.
//! - Extension fields persist as JSON text in each table's `extra` column and
//!   never leak session bookkeeping into `to_dict`.

use super::{EntityMap, Storage, StorageError, StorageResult};
use crate::db::{open_db, open_db_in_memory};
use crate::model::entity::Entity;
use crate::model::kind::EntityKind;
use log::{error, info, warn};
use once_cell::unsync::OnceCell;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const BASE_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];
const EXTRA_COLUMN: &str = "extra";
const AMENITY_IDS_FIELD: &str = "amenity_ids";

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    /// Private in-memory database; it survives `close` but not the engine.
    Memory,
}

/// SQLite-backed object store.
pub struct DbStorage {
    location: DbLocation,
    session: OnceCell<Connection>,
}

impl DbStorage {
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self::with_location(DbLocation::File(path.as_ref().to_path_buf()))
    }

    pub fn in_memory() -> Self {
        Self::with_location(DbLocation::Memory)
    }

    pub fn with_location(location: DbLocation) -> Self {
        Self {
            location,
            session: OnceCell::new(),
        }
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }

    /// Whether uncommitted work is pending on the current session.
    pub fn has_pending_changes(&self) -> bool {
        self.session
            .get()
            .is_some_and(|conn| !conn.is_autocommit())
    }

    fn session(&self) -> StorageResult<&Connection> {
        self.session.get_or_try_init(|| {
            let conn = match &self.location {
                DbLocation::File(path) => open_db(path)?,
                DbLocation::Memory => open_db_in_memory()?,
            };
            Ok(conn)
        })
    }

    /// Session with a unit of work open.
    fn writer(&self) -> StorageResult<&Connection> {
        let conn = self.session()?;
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN;")?;
        }
        Ok(conn)
    }

    fn rollback_pending(&self) -> StorageResult<bool> {
        match self.session.get() {
            Some(conn) if !conn.is_autocommit() => {
                conn.execute_batch("ROLLBACK;")?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn select_entities(
        &self,
        kind: EntityKind,
        filter_column: Option<&str>,
        filter_value: Option<&str>,
    ) -> StorageResult<Vec<Entity>> {
        let conn = self.session()?;
        let columns = table_columns(kind);
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), kind.collection());
        if let Some(column) = filter_column {
            sql.push_str(&format!(" WHERE {column} = ?1"));
        }
        sql.push_str(" ORDER BY id ASC;");

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = match filter_value {
            Some(value) => stmt.query([value])?,
            None => stmt.query([])?,
        };

        let mut links = if kind == EntityKind::Place {
            let place_id = filter_value.filter(|_| filter_column == Some("id"));
            load_amenity_links(conn, place_id)?
        } else {
            HashMap::new()
        };

        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = parse_row(row, &columns)?;
            if kind == EntityKind::Place {
                let id = record
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let amenity_ids = links.remove(&id).unwrap_or_default();
                record.insert(
                    AMENITY_IDS_FIELD.to_string(),
                    Value::Array(amenity_ids.into_iter().map(Value::String).collect()),
                );
            }
            entities.push(Entity::from_record(kind, record)?);
        }
        Ok(entities)
    }

    fn upsert(&self, conn: &Connection, entity: &Entity) -> StorageResult<()> {
        let kind = entity.kind();
        let columns = table_columns(kind);
        let dict = entity.to_dict();

        let mut values: Vec<SqlValue> = Vec::with_capacity(columns.len());
        for column in &columns {
            if *column == EXTRA_COLUMN {
                values.push(SqlValue::Text(serde_json::to_string(entity.extra())?));
            } else {
                values.push(json_to_sql(dict.get(*column).unwrap_or(&Value::Null)));
            }
        }

        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} ({}) VALUES ({placeholders});",
                kind.collection(),
                columns.join(", ")
            ),
            params_from_iter(values),
        )?;

        if let Some(place) = entity.as_place() {
            conn.execute(
                "DELETE FROM place_amenity WHERE place_id = ?1;",
                [entity.id()],
            )?;
            for (position, amenity_id) in place.amenity_ids.iter().enumerate() {
                conn.execute(
                    "INSERT OR IGNORE INTO place_amenity (place_id, amenity_id, position)
                     VALUES (?1, ?2, ?3);",
                    params![entity.id(), amenity_id, position as i64],
                )?;
            }
        }
        Ok(())
    }
}

impl Storage for DbStorage {
    fn backend(&self) -> &'static str {
        "db"
    }

    fn all(&self, kind: Option<EntityKind>) -> StorageResult<EntityMap> {
        let kinds = match kind {
            Some(kind) => vec![kind],
            None => EntityKind::ALL.to_vec(),
        };
        let mut objects = EntityMap::new();
        for kind in kinds {
            for entity in self.select_entities(kind, None, None)? {
                objects.insert(entity.storage_key(), entity);
            }
        }
        Ok(objects)
    }

    fn get(&self, kind: EntityKind, id: &str) -> StorageResult<Option<Entity>> {
        Ok(self
            .select_entities(kind, Some("id"), Some(id))?
            .into_iter()
            .next())
    }

    fn new(&mut self, entity: Entity) -> StorageResult<()> {
        let conn = self.writer()?;
        self.upsert(conn, &entity)
    }

    fn save(&mut self) -> StorageResult<()> {
        let Some(conn) = self.session.get() else {
            return Ok(());
        };
        if conn.is_autocommit() {
            return Ok(());
        }
        match conn.execute_batch("COMMIT;") {
            Ok(()) => {
                info!("event=storage_save module=storage status=ok backend=db");
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=storage_save module=storage status=error backend=db error={}",
                    err
                );
                Err(err.into())
            }
        }
    }

    fn delete(&mut self, entity: &Entity) -> StorageResult<()> {
        let conn = self.writer()?;
        conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", entity.kind().collection()),
            [entity.id()],
        )?;
        if entity.kind() == EntityKind::Place {
            conn.execute(
                "DELETE FROM place_amenity WHERE place_id = ?1;",
                [entity.id()],
            )?;
        }
        Ok(())
    }

    fn reload(&mut self) -> StorageResult<()> {
        if self.rollback_pending()? {
            warn!("event=storage_reload module=storage status=discarded backend=db");
        }
        match self.count(None) {
            Ok(objects) => {
                info!(
                    "event=storage_reload module=storage status=ok backend=db objects={}",
                    objects
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=storage_reload module=storage status=error backend=db error={}",
                    err
                );
                Err(err)
            }
        }
    }

    fn close(&mut self) -> StorageResult<()> {
        self.rollback_pending()?;
        if matches!(self.location, DbLocation::File(_)) {
            drop(self.session.take());
        }
        Ok(())
    }

    fn count(&self, kind: Option<EntityKind>) -> StorageResult<usize> {
        let conn = self.session()?;
        let kinds = match kind {
            Some(kind) => vec![kind],
            None => EntityKind::ALL.to_vec(),
        };
        let mut total = 0_i64;
        for kind in kinds {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {};", kind.collection()),
                [],
                |row| row.get(0),
            )?;
            total += count;
        }
        usize::try_from(total)
            .map_err(|_| StorageError::InvalidData(format!("negative row count {total}")))
    }

    fn children(
        &self,
        owner_kind: EntityKind,
        owner_id: &str,
        child_kind: EntityKind,
    ) -> StorageResult<Vec<Entity>> {
        match child_kind.owner_field(owner_kind) {
            Some(column) => self.select_entities(child_kind, Some(column), Some(owner_id)),
            None => Ok(Vec::new()),
        }
    }
}

/// Columns of the kind's table, in select/insert order.
fn table_columns(kind: EntityKind) -> Vec<&'static str> {
    BASE_COLUMNS
        .iter()
        .copied()
        .chain(
            kind.fields()
                .iter()
                .copied()
                .filter(|field| *field != AMENITY_IDS_FIELD),
        )
        .chain(std::iter::once(EXTRA_COLUMN))
        .collect()
}

fn parse_row(row: &Row<'_>, columns: &[&'static str]) -> StorageResult<Map<String, Value>> {
    let mut record = Map::new();
    for (index, column) in columns.iter().enumerate() {
        let value: SqlValue = row.get(index)?;
        if *column == EXTRA_COLUMN {
            let extra = match value {
                SqlValue::Text(text) if !text.trim().is_empty() => text,
                _ => continue,
            };
            let extra: Map<String, Value> = serde_json::from_str(&extra)?;
            for (key, value) in extra {
                record.entry(key).or_insert(value);
            }
        } else {
            record.insert(column.to_string(), sql_to_json(value)?);
        }
    }
    Ok(record)
}

/// Amenity links per place, in link order; restricted to one place when
/// `place_id` is given.
fn load_amenity_links(
    conn: &Connection,
    place_id: Option<&str>,
) -> StorageResult<HashMap<String, Vec<String>>> {
    let mut sql = String::from("SELECT place_id, amenity_id FROM place_amenity");
    if place_id.is_some() {
        sql.push_str(" WHERE place_id = ?1");
    }
    sql.push_str(" ORDER BY place_id ASC, position ASC;");

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = match place_id {
        Some(place_id) => stmt.query([place_id])?,
        None => stmt.query([])?,
    };
    let mut links: HashMap<String, Vec<String>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let place_id: String = row.get(0)?;
        let amenity_id: String = row.get(1)?;
        links.entry(place_id).or_default().push(amenity_id);
    }
    Ok(links)
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => SqlValue::Real(number.as_f64().unwrap_or_default()),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn sql_to_json(value: SqlValue) -> StorageResult<Value> {
    Ok(match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(integer) => Value::Number(integer.into()),
        SqlValue::Real(real) => Number::from_f64(real).map(Value::Number).ok_or_else(|| {
            StorageError::InvalidData(format!("non-finite number `{real}` in database"))
        })?,
        SqlValue::Text(text) => Value::String(text),
        SqlValue::Blob(_) => {
            return Err(StorageError::InvalidData(
                "unexpected blob value in entity table".to_string(),
            ))
        }
    })
}
