//! Per-kind list/get/create/update/delete use cases.
//!
//! # Invariants
//! - Create checks run in a fixed order: parent existence, JSON object,
//!   `user_id` presence and existence (places, reviews), then required
//!   fields in declaration order.
//! - Create never takes `id`, timestamps or the discriminator from clients.
//! - Place amenity links are only made through the link operations, which
//!   check that the amenity exists.
//! - Update ignores protected fields silently.

use super::{logged, require_field, require_object, ApiError, ApiResult, HbnbService};
use crate::model::entity::{Entity, CLASS_KEY};
use crate::model::kind::EntityKind;
use crate::storage::Storage;
use log::info;
use serde_json::Value;

const CLIENT_IGNORED_ON_CREATE: [&str; 4] = ["id", "created_at", "updated_at", CLASS_KEY];
const AMENITY_LINKS_FIELD: &str = "amenity_ids";

/// Kind that a new entity must be created under, if any.
fn creation_parent(kind: EntityKind) -> Option<EntityKind> {
    match kind {
        EntityKind::City => Some(EntityKind::State),
        EntityKind::Place => Some(EntityKind::City),
        EntityKind::Review => Some(EntityKind::Place),
        EntityKind::Amenity | EntityKind::State | EntityKind::User => None,
    }
}

/// Payload fields checked after the owner/user lookups, in check order.
fn required_fields(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Amenity | EntityKind::City | EntityKind::Place | EntityKind::State => {
            &["name"]
        }
        EntityKind::Review => &["text"],
        EntityKind::User => &["email", "password"],
    }
}

impl<S: Storage> HbnbService<S> {
    /// Every entity of `kind`.
    pub fn list(&self, kind: EntityKind) -> ApiResult<Vec<Entity>> {
        let entities = self.storage.all(Some(kind))?;
        Ok(entities.into_values().collect())
    }

    /// Dependents of an owner; `NotFound` when the owner does not resolve.
    pub fn list_children(
        &self,
        owner_kind: EntityKind,
        owner_id: &str,
        child_kind: EntityKind,
    ) -> ApiResult<Vec<Entity>> {
        self.get(owner_kind, owner_id)?;
        Ok(self.storage.children(owner_kind, owner_id, child_kind)?)
    }

    pub fn list_states(&self) -> ApiResult<Vec<Entity>> {
        self.list(EntityKind::State)
    }

    pub fn list_amenities(&self) -> ApiResult<Vec<Entity>> {
        self.list(EntityKind::Amenity)
    }

    pub fn list_users(&self) -> ApiResult<Vec<Entity>> {
        self.list(EntityKind::User)
    }

    pub fn list_cities(&self, state_id: &str) -> ApiResult<Vec<Entity>> {
        self.list_children(EntityKind::State, state_id, EntityKind::City)
    }

    pub fn list_places(&self, city_id: &str) -> ApiResult<Vec<Entity>> {
        self.list_children(EntityKind::City, city_id, EntityKind::Place)
    }

    pub fn list_reviews(&self, place_id: &str) -> ApiResult<Vec<Entity>> {
        self.list_children(EntityKind::Place, place_id, EntityKind::Review)
    }

    /// Point lookup; `NotFound` when absent.
    pub fn get(&self, kind: EntityKind, id: &str) -> ApiResult<Entity> {
        self.storage.get(kind, id)?.ok_or(ApiError::NotFound)
    }

    /// Deletes one entity. Dependents are left untouched.
    pub fn delete(&mut self, kind: EntityKind, id: &str) -> ApiResult<()> {
        let result = self.delete_inner(kind, id);
        logged("delete", result)
    }

    pub fn create_state(&mut self, body: Option<&Value>) -> ApiResult<Entity> {
        self.create(EntityKind::State, None, body)
    }

    pub fn create_amenity(&mut self, body: Option<&Value>) -> ApiResult<Entity> {
        self.create(EntityKind::Amenity, None, body)
    }

    pub fn create_user(&mut self, body: Option<&Value>) -> ApiResult<Entity> {
        self.create(EntityKind::User, None, body)
    }

    pub fn create_city(&mut self, state_id: &str, body: Option<&Value>) -> ApiResult<Entity> {
        self.create(EntityKind::City, Some(state_id), body)
    }

    pub fn create_place(&mut self, city_id: &str, body: Option<&Value>) -> ApiResult<Entity> {
        self.create(EntityKind::Place, Some(city_id), body)
    }

    pub fn create_review(&mut self, place_id: &str, body: Option<&Value>) -> ApiResult<Entity> {
        self.create(EntityKind::Review, Some(place_id), body)
    }

    /// Creates an entity of `kind`, under `parent_id` for owned kinds.
    ///
    /// # Errors
    /// - `NotFound` when the parent or the referenced user does not resolve,
    ///   or when an owned kind is created without a parent id.
    /// - `NotAJson` / `MissingField` / `InvalidField` for payload problems.
    pub fn create(
        &mut self,
        kind: EntityKind,
        parent_id: Option<&str>,
        body: Option<&Value>,
    ) -> ApiResult<Entity> {
        let result = self.create_inner(kind, parent_id, body);
        logged("create", result)
    }

    /// Applies an update payload and persists the entity.
    pub fn update(&mut self, kind: EntityKind, id: &str, body: Option<&Value>) -> ApiResult<Entity> {
        let result = self.update_inner(kind, id, body);
        logged("update", result)
    }

    fn delete_inner(&mut self, kind: EntityKind, id: &str) -> ApiResult<()> {
        let entity = self.get(kind, id)?;
        self.storage.delete(&entity)?;
        self.storage.save()?;
        info!(
            "event=entity_delete module=service status=ok kind={} id={}",
            kind,
            entity.id()
        );
        Ok(())
    }

    fn create_inner(
        &mut self,
        kind: EntityKind,
        parent_id: Option<&str>,
        body: Option<&Value>,
    ) -> ApiResult<Entity> {
        let owner = match creation_parent(kind) {
            Some(parent_kind) => {
                let parent_id = parent_id.ok_or(ApiError::NotFound)?;
                Some((parent_kind, self.get(parent_kind, parent_id)?))
            }
            None => None,
        };

        let payload = require_object(body)?;

        if matches!(kind, EntityKind::Place | EntityKind::Review) {
            require_field(payload, "user_id")?;
            let user_id = payload
                .get("user_id")
                .and_then(Value::as_str)
                .ok_or(ApiError::NotFound)?;
            self.get(EntityKind::User, user_id)?;
        }

        for &field in required_fields(kind) {
            require_field(payload, field)?;
        }

        let mut record = payload.clone();
        for field in CLIENT_IGNORED_ON_CREATE {
            record.remove(field);
        }
        if kind == EntityKind::Place {
            record.remove(AMENITY_LINKS_FIELD);
        }
        if let Some((parent_kind, parent)) = &owner {
            if let Some(field) = kind.owner_field(*parent_kind) {
                record.insert(field.to_string(), Value::String(parent.id().to_string()));
            }
        }

        let entity = Entity::from_record(kind, record)?;
        self.storage.new(entity.clone())?;
        self.storage.save()?;
        info!(
            "event=entity_create module=service status=ok kind={} id={}",
            kind,
            entity.id()
        );
        Ok(entity)
    }

    fn update_inner(&mut self, kind: EntityKind, id: &str, body: Option<&Value>) -> ApiResult<Entity> {
        let mut entity = self.get(kind, id)?;
        let payload = require_object(body)?;
        entity.apply_update(payload)?;
        entity.touch();
        self.storage.new(entity.clone())?;
        self.storage.save()?;
        info!(
            "event=entity_update module=service status=ok kind={} id={}",
            kind,
            entity.id()
        );
        Ok(entity)
    }
}
