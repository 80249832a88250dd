//! Request-handling use cases over an injected storage engine.
//!
//! # Responsibility
//! - Resolve, validate and mutate entities in the order request handlers
//!   rely on, returning `ApiError` for client-visible failures.
//! - Stay storage-agnostic: every read and write goes through `Storage`.
//!
//! # Invariants
//! - Every mutation is staged with `new`/`delete` and followed by `save`.
//! - Storage failures propagate unchanged inside `ApiError::Storage`.

use crate::storage::Storage;
use log::error;
use serde_json::{Map, Value};

mod error;
mod index;
mod place_amenities;
mod resources;

pub use error::{
    render_entities, render_entity, ApiError, ApiResponse, ApiResult, STATUS_BAD_REQUEST,
    STATUS_CREATED, STATUS_INTERNAL_ERROR, STATUS_NOT_FOUND, STATUS_OK,
};
pub use index::Stats;
pub use place_amenities::LinkOutcome;

/// Use-case facade owning one storage engine.
pub struct HbnbService<S: Storage> {
    storage: S,
}

impl<S: Storage> HbnbService<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Ends the current unit of work; call once a request is answered.
    pub fn close_session(&mut self) -> ApiResult<()> {
        self.storage.close()?;
        Ok(())
    }
}

/// Body as a JSON object, or `NotAJson`.
fn require_object(body: Option<&Value>) -> ApiResult<&Map<String, Value>> {
    match body {
        Some(Value::Object(payload)) => Ok(payload),
        _ => Err(ApiError::NotAJson),
    }
}

fn require_field(payload: &Map<String, Value>, field: &'static str) -> ApiResult<()> {
    if payload.contains_key(field) {
        Ok(())
    } else {
        Err(ApiError::MissingField(field))
    }
}

/// Passes `result` through, logging storage failures.
fn logged<T>(operation: &str, result: ApiResult<T>) -> ApiResult<T> {
    if let Err(ApiError::Storage(source)) = &result {
        error!(
            "event=service_call module=service status=error operation={} error={}",
            operation, source
        );
    }
    result
}
