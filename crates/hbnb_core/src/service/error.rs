//! Service-level errors and the status/body envelope handed to handlers.
//!
//! # Invariants
//! - Input problems map to 4xx with a client-facing message.
//! - Storage failures map to 500 and never expose backend details.

use crate::model::entity::{Entity, EntityError};
use crate::storage::StorageError;
use serde_json::{json, Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ApiResult<T> = Result<T, ApiError>;

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

#[derive(Debug)]
pub enum ApiError {
    /// A referenced id does not resolve.
    NotFound,
    /// Request body is absent or not a JSON object.
    NotAJson,
    /// A required field is absent.
    MissingField(&'static str),
    /// A field carries a value of the wrong shape.
    InvalidField(String),
    /// Backing store failure.
    Storage(StorageError),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound => STATUS_NOT_FOUND,
            Self::NotAJson | Self::MissingField(_) | Self::InvalidField(_) => STATUS_BAD_REQUEST,
            Self::Storage(_) => STATUS_INTERNAL_ERROR,
        }
    }

    /// Client-facing message placed under `error`.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound => "Not found".to_string(),
            Self::NotAJson => "Not a JSON".to_string(),
            Self::MissingField(field) => format!("Missing {field}"),
            Self::InvalidField(field) => format!("Invalid {field}"),
            Self::Storage(_) => "Internal error".to_string(),
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "storage failure: {err}"),
            other => f.write_str(&other.message()),
        }
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<EntityError> for ApiError {
    fn from(value: EntityError) -> Self {
        match value {
            EntityError::NotAnObject => Self::NotAJson,
            EntityError::InvalidField { field, .. } => Self::InvalidField(field),
            EntityError::InvalidTimestamp { field, .. } => Self::InvalidField(field.to_string()),
        }
    }
}

/// Status code plus JSON body, ready for any HTTP adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// `{"error": <message>}` with the error's status code.
    pub fn from_error(err: &ApiError) -> Self {
        Self::new(err.status_code(), json!({ "error": err.message() }))
    }

    /// Renders a result: `render(value)` with `status` on success.
    pub fn from_result<T>(result: ApiResult<T>, status: u16, render: impl FnOnce(T) -> Value) -> Self {
        match result {
            Ok(value) => Self::new(status, render(value)),
            Err(err) => Self::from_error(&err),
        }
    }

    pub fn entity(result: ApiResult<Entity>, status: u16) -> Self {
        Self::from_result(result, status, render_entity)
    }

    pub fn entities(result: ApiResult<Vec<Entity>>) -> Self {
        Self::from_result(result, STATUS_OK, render_entities)
    }

    /// Empty object on success, as returned by deletes.
    pub fn empty(result: ApiResult<()>) -> Self {
        Self::from_result(result, STATUS_OK, |()| Value::Object(Map::new()))
    }
}

pub fn render_entity(entity: Entity) -> Value {
    Value::Object(entity.to_dict())
}

pub fn render_entities(entities: Vec<Entity>) -> Value {
    Value::Array(entities.into_iter().map(render_entity).collect())
}
