//! Snapshot storage engine backed by a single JSON document.
//!
//! # Responsibility
//! - Hold the whole working set in memory for the process lifetime.
//! - Rewrite the document wholesale on every `save`.
//!
//! # Invariants
//! - The document maps `<Kind>.<id>` to the entity's `to_dict` form.
//! - `save` writes a temp file, syncs it and renames it over the target, so
//!   readers never observe a half-written document.
//! - A failed `reload` leaves the previous working set untouched.

use super::{EntityMap, Storage, StorageError, StorageResult};
use crate::model::entity::{Entity, CLASS_KEY};
use crate::model::kind::{parse_storage_key, EntityKind};
use log::{error, info};
use serde_json::{Map, Value};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// File-backed object store.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    objects: EntityMap,
}

impl FileStorage {
    /// Creates an engine for `path`. Nothing is read until `reload`.
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            objects: EntityMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_document(&self) -> StorageResult<EntityMap> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(EntityMap::new()),
            Err(err) => return Err(self.io_error(err)),
        };
        if raw.trim().is_empty() {
            return Ok(EntityMap::new());
        }

        let document: Map<String, Value> = serde_json::from_str(&raw)?;
        let mut objects = EntityMap::new();
        for (key, value) in document {
            let kind = record_kind(&key, &value)?;
            let entity = Entity::from_value(kind, value)?;
            objects.insert(entity.storage_key(), entity);
        }
        Ok(objects)
    }

    fn write_document(&self) -> StorageResult<()> {
        let document: Map<String, Value> = self
            .objects
            .iter()
            .map(|(key, entity)| (key.clone(), Value::Object(entity.to_dict())))
            .collect();
        let bytes = serde_json::to_vec(&document)?;

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }

        let temp_path = temp_path_for(&self.path);
        let cleanup = |err: std::io::Error| {
            let _ = fs::remove_file(&temp_path);
            self.io_error(err)
        };
        let mut file = fs::File::create(&temp_path).map_err(|err| self.io_error(err))?;
        file.write_all(&bytes).map_err(cleanup)?;
        file.sync_all().map_err(cleanup)?;
        drop(file);
        fs::rename(&temp_path, &self.path).map_err(cleanup)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn backend(&self) -> &'static str {
        "file"
    }

    fn all(&self, kind: Option<EntityKind>) -> StorageResult<EntityMap> {
        Ok(self
            .objects
            .iter()
            .filter(|(_, entity)| kind.map_or(true, |kind| entity.kind() == kind))
            .map(|(key, entity)| (key.clone(), entity.clone()))
            .collect())
    }

    fn get(&self, kind: EntityKind, id: &str) -> StorageResult<Option<Entity>> {
        Ok(self.objects.get(&kind.storage_key(id)).cloned())
    }

    fn new(&mut self, entity: Entity) -> StorageResult<()> {
        self.objects.insert(entity.storage_key(), entity);
        Ok(())
    }

    fn save(&mut self) -> StorageResult<()> {
        let started_at = Instant::now();
        match self.write_document() {
            Ok(()) => {
                info!(
                    "event=storage_save module=storage status=ok backend=file objects={} duration_ms={}",
                    self.objects.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=storage_save module=storage status=error backend=file error={}",
                    err
                );
                Err(err)
            }
        }
    }

    fn delete(&mut self, entity: &Entity) -> StorageResult<()> {
        self.objects.remove(&entity.storage_key());
        Ok(())
    }

    fn reload(&mut self) -> StorageResult<()> {
        let started_at = Instant::now();
        match self.read_document() {
            Ok(objects) => {
                self.objects = objects;
                info!(
                    "event=storage_reload module=storage status=ok backend=file objects={} duration_ms={}",
                    self.objects.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=storage_reload module=storage status=error backend=file error={}",
                    err
                );
                Err(err)
            }
        }
    }

    fn close(&mut self) -> StorageResult<()> {
        Ok(())
    }
}

/// Sibling path `<target>.tmp`; never equal to `target`.
fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Kind of a stored record: the discriminator wins, the key prefix is the
/// fallback for records written without one.
fn record_kind(key: &str, value: &Value) -> StorageResult<EntityKind> {
    if let Some(class_name) = value.get(CLASS_KEY).and_then(Value::as_str) {
        return EntityKind::parse(class_name).ok_or_else(|| {
            StorageError::InvalidData(format!("unknown entity kind `{class_name}` at `{key}`"))
        });
    }
    parse_storage_key(key)
        .map(|(kind, _)| kind)
        .ok_or_else(|| StorageError::InvalidData(format!("unrecognized storage key `{key}`")))
}
