//! Storage engine contract and its two implementations.
//!
//! # Responsibility
//! - Define the `Storage` trait every backend satisfies identically.
//! - Derive relationship traversal from dependents' foreign keys.
//! - Select exactly one backend from configuration at startup.
//!
//! # Invariants
//! - `new` and `delete` stage changes; only `save` makes them durable.
//! - `reload` on an empty or missing backing store yields an empty working set.
//! - After `save`, a fresh engine's `reload` answers `get`/`all`/traversal
//!   identically for both backends.

use crate::config::{StorageBackend, StorageConfig};
use crate::db::DbError;
use crate::model::entity::{Entity, EntityError};
use crate::model::kind::EntityKind;
use log::info;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod db_storage;
mod file_storage;

pub use db_storage::{DbLocation, DbStorage};
pub use file_storage::FileStorage;

/// Entities keyed by `<Kind>.<id>`.
pub type EntityMap = BTreeMap<String, Entity>;

pub type StorageResult<T> = Result<T, StorageError>;

/// Backing store failure. Not recoverable by the core; callers propagate it.
#[derive(Debug)]
pub enum StorageError {
    Db(DbError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialization(serde_json::Error),
    InvalidData(String),
    Entity(EntityError),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Serialization(err) => write!(f, "invalid storage document: {err}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::Entity(err) => write!(f, "invalid stored entity: {err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Serialization(err) => Some(err),
            Self::InvalidData(_) => None,
            Self::Entity(err) => Some(err),
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<EntityError> for StorageError {
    fn from(value: EntityError) -> Self {
        Self::Entity(value)
    }
}

/// Uniform persistence contract shared by the snapshot and database engines.
pub trait Storage {
    /// Short backend name used in log events.
    fn backend(&self) -> &'static str;

    /// Every stored entity, optionally restricted to one kind.
    fn all(&self, kind: Option<EntityKind>) -> StorageResult<EntityMap>;

    /// Point lookup; `None` when no entity matches.
    fn get(&self, kind: EntityKind, id: &str) -> StorageResult<Option<Entity>>;

    /// Registers (or replaces) an entity in the working set.
    fn new(&mut self, entity: Entity) -> StorageResult<()>;

    /// Makes the working set durable.
    fn save(&mut self) -> StorageResult<()>;

    /// Removes an entity from the working set. Unknown entities are ignored.
    fn delete(&mut self, entity: &Entity) -> StorageResult<()>;

    /// Discards the working set and rebuilds it from the backing store.
    fn reload(&mut self) -> StorageResult<()>;

    /// Ends the current unit of work, dropping unsaved changes where the
    /// backend tracks them.
    fn close(&mut self) -> StorageResult<()>;

    fn count(&self, kind: Option<EntityKind>) -> StorageResult<usize> {
        Ok(self.all(kind)?.len())
    }

    /// Entities of `child_kind` whose foreign key points at the owner.
    ///
    /// Returns an empty list when `child_kind` declares no such relationship.
    fn children(
        &self,
        owner_kind: EntityKind,
        owner_id: &str,
        child_kind: EntityKind,
    ) -> StorageResult<Vec<Entity>> {
        if child_kind.owner_field(owner_kind).is_none() {
            return Ok(Vec::new());
        }
        Ok(self
            .all(Some(child_kind))?
            .into_values()
            .filter(|entity| entity.reference(owner_kind) == Some(owner_id))
            .collect())
    }

    fn cities_of_state(&self, state_id: &str) -> StorageResult<Vec<Entity>> {
        self.children(EntityKind::State, state_id, EntityKind::City)
    }

    fn places_of_city(&self, city_id: &str) -> StorageResult<Vec<Entity>> {
        self.children(EntityKind::City, city_id, EntityKind::Place)
    }

    fn reviews_of_place(&self, place_id: &str) -> StorageResult<Vec<Entity>> {
        self.children(EntityKind::Place, place_id, EntityKind::Review)
    }

    /// Amenities linked to a place, skipping links that no longer resolve.
    fn amenities_of_place(&self, place: &Entity) -> StorageResult<Vec<Entity>> {
        let Some(place) = place.as_place() else {
            return Ok(Vec::new());
        };
        let mut amenities = Vec::with_capacity(place.amenity_ids.len());
        for amenity_id in &place.amenity_ids {
            if let Some(amenity) = self.get(EntityKind::Amenity, amenity_id)? {
                amenities.push(amenity);
            }
        }
        Ok(amenities)
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn all(&self, kind: Option<EntityKind>) -> StorageResult<EntityMap> {
        (**self).all(kind)
    }

    fn get(&self, kind: EntityKind, id: &str) -> StorageResult<Option<Entity>> {
        (**self).get(kind, id)
    }

    fn new(&mut self, entity: Entity) -> StorageResult<()> {
        (**self).new(entity)
    }

    fn save(&mut self) -> StorageResult<()> {
        (**self).save()
    }

    fn delete(&mut self, entity: &Entity) -> StorageResult<()> {
        (**self).delete(entity)
    }

    fn reload(&mut self) -> StorageResult<()> {
        (**self).reload()
    }

    fn close(&mut self) -> StorageResult<()> {
        (**self).close()
    }

    fn count(&self, kind: Option<EntityKind>) -> StorageResult<usize> {
        (**self).count(kind)
    }

    fn children(
        &self,
        owner_kind: EntityKind,
        owner_id: &str,
        child_kind: EntityKind,
    ) -> StorageResult<Vec<Entity>> {
        (**self).children(owner_kind, owner_id, child_kind)
    }
}

/// Builds the configured backend and loads its working set.
///
/// # Errors
/// - Propagates backing store failures from the initial `reload`.
pub fn open_storage(config: &StorageConfig) -> StorageResult<Box<dyn Storage>> {
    let mut storage: Box<dyn Storage> = match config.backend {
        StorageBackend::File => Box::new(FileStorage::with_path(&config.file_path)),
        StorageBackend::Db => Box::new(DbStorage::with_path(&config.db_path)),
    };
    storage.reload()?;
    info!(
        "event=storage_open module=storage status=ok backend={}",
        storage.backend()
    );
    Ok(storage)
}
