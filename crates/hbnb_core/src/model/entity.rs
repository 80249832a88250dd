//! Entity record: base fields, typed attributes and extension fields.
//!
//! # Responsibility
//! - Build entities from stored mappings (`from_record`) and request payloads.
//! - Serialize entities into the shared `to_dict` shape used by both storage
//!   engines and the service layer.
//! - Apply update payloads with protected-field masking.
//!
//! # Invariants
//! - `id`, `created_at` and `updated_at` never change through `apply_update`.
//! - The discriminator key is never kept in the extension map.
//! - Timestamps are held at microsecond precision so their textual form
//!   round-trips exactly.

use crate::model::kind::EntityKind;
use chrono::{NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Discriminator key naming the concrete kind of a serialized record.
pub const CLASS_KEY: &str = "__class__";

/// Textual timestamp form written by `to_dict`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const BASE_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Opaque entity identifier.
pub type EntityId = String;

/// Extension attributes not covered by the declared schema.
pub type ExtraFields = Map<String, Value>;

/// Error raised while building or updating an entity from a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    /// The record or payload is not a JSON object.
    NotAnObject,
    /// A declared attribute carries a value of the wrong type.
    InvalidField { field: String, message: String },
    /// A timestamp field is not a string in the expected form.
    InvalidTimestamp { field: &'static str, value: String },
}

impl Display for EntityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "entity record is not a JSON object"),
            Self::InvalidField { field, message } => {
                write!(f, "invalid value for `{field}`: {message}")
            }
            Self::InvalidTimestamp { field, value } => {
                write!(f, "invalid timestamp `{value}` in `{field}`")
            }
        }
    }
}

impl Error for EntityError {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Amenity {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct City {
    pub name: String,
    pub state_id: EntityId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Place {
    pub city_id: EntityId,
    pub user_id: EntityId,
    pub name: String,
    pub description: String,
    pub number_rooms: i64,
    pub number_bathrooms: i64,
    pub max_guest: i64,
    pub price_by_night: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Linked amenities, in link order.
    pub amenity_ids: Vec<EntityId>,
}

impl Place {
    /// Links an amenity. Returns `false` when it was already linked.
    pub fn link_amenity(&mut self, amenity_id: &str) -> bool {
        if self.has_amenity(amenity_id) {
            return false;
        }
        self.amenity_ids.push(amenity_id.to_string());
        true
    }

    /// Unlinks an amenity. Returns `false` when it was not linked.
    pub fn unlink_amenity(&mut self, amenity_id: &str) -> bool {
        let before = self.amenity_ids.len();
        self.amenity_ids.retain(|id| id != amenity_id);
        self.amenity_ids.len() != before
    }

    pub fn has_amenity(&self, amenity_id: &str) -> bool {
        self.amenity_ids.iter().any(|id| id == amenity_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Review {
    pub place_id: EntityId,
    pub user_id: EntityId,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Typed attributes of one entity; the variant decides the entity kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Attributes {
    Amenity(Amenity),
    City(City),
    Place(Place),
    Review(Review),
    State(State),
    User(User),
}

impl Attributes {
    /// Default attributes for `kind`.
    pub fn default_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Amenity => Self::Amenity(Amenity::default()),
            EntityKind::City => Self::City(City::default()),
            EntityKind::Place => Self::Place(Place::default()),
            EntityKind::Review => Self::Review(Review::default()),
            EntityKind::State => Self::State(State::default()),
            EntityKind::User => Self::User(User::default()),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Amenity(_) => EntityKind::Amenity,
            Self::City(_) => EntityKind::City,
            Self::Place(_) => EntityKind::Place,
            Self::Review(_) => EntityKind::Review,
            Self::State(_) => EntityKind::State,
            Self::User(_) => EntityKind::User,
        }
    }

    /// Foreign key value pointing to an entity of kind `owner`.
    pub fn reference(&self, owner: EntityKind) -> Option<&str> {
        let value = match (self, owner) {
            (Self::City(city), EntityKind::State) => &city.state_id,
            (Self::Place(place), EntityKind::City) => &place.city_id,
            (Self::Place(place), EntityKind::User) => &place.user_id,
            (Self::Review(review), EntityKind::Place) => &review.place_id,
            (Self::Review(review), EntityKind::User) => &review.user_id,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Collapses repeated amenity links, keeping each first occurrence.
    fn normalized(self) -> Self {
        match self {
            Self::Place(mut place) => {
                let linked = std::mem::take(&mut place.amenity_ids);
                for amenity_id in linked {
                    place.link_amenity(&amenity_id);
                }
                Self::Place(place)
            }
            other => other,
        }
    }

    fn from_fields(kind: EntityKind, fields: Map<String, Value>) -> serde_json::Result<Self> {
        let value = Value::Object(fields);
        Ok(match kind {
            EntityKind::Amenity => Self::Amenity(serde_json::from_value(value)?),
            EntityKind::City => Self::City(serde_json::from_value(value)?),
            EntityKind::Place => Self::Place(serde_json::from_value(value)?),
            EntityKind::Review => Self::Review(serde_json::from_value(value)?),
            EntityKind::State => Self::State(serde_json::from_value(value)?),
            EntityKind::User => Self::User(serde_json::from_value(value)?),
        })
    }

    fn to_fields(&self) -> Map<String, Value> {
        let value = match self {
            Self::Amenity(attrs) => serde_json::to_value(attrs),
            Self::City(attrs) => serde_json::to_value(attrs),
            Self::Place(attrs) => serde_json::to_value(attrs),
            Self::Review(attrs) => serde_json::to_value(attrs),
            Self::State(attrs) => serde_json::to_value(attrs),
            Self::User(attrs) => serde_json::to_value(attrs),
        };
        match value {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// One stored object of any kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    attributes: Attributes,
    extra: ExtraFields,
}

impl Entity {
    /// Creates a transient entity with a generated id and fresh timestamps.
    pub fn new(attributes: Attributes) -> Self {
        let now = now_timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            attributes: attributes.normalized(),
            extra: ExtraFields::new(),
        }
    }

    /// Generic constructor from an attribute mapping.
    ///
    /// Missing `id` or timestamps are generated. Declared attributes are
    /// typed; every other key, except the discriminator, lands in the
    /// extension map.
    ///
    /// # Errors
    /// - `InvalidField` when `id` or a declared attribute has the wrong type.
    /// - `InvalidTimestamp` when a timestamp is not parseable.
    pub fn from_record(kind: EntityKind, record: Map<String, Value>) -> Result<Self, EntityError> {
        let now = now_timestamp();
        let mut id = None;
        let mut created_at = now;
        let mut updated_at = now;
        let mut fields = Map::new();
        let mut extra = ExtraFields::new();

        for (key, value) in record {
            if key == CLASS_KEY {
                continue;
            } else if key == "id" {
                id = Some(parse_id(value)?);
            } else if key == "created_at" {
                created_at = parse_timestamp("created_at", &value)?;
            } else if key == "updated_at" {
                updated_at = parse_timestamp("updated_at", &value)?;
            } else if kind.declares(&key) {
                fields.insert(key, value);
            } else {
                extra.insert(key, value);
            }
        }

        Ok(Self {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            created_at,
            updated_at,
            attributes: typed_attributes(kind, fields)?.normalized(),
            extra,
        })
    }

    /// Same as [`Entity::from_record`] for an arbitrary JSON value.
    pub fn from_value(kind: EntityKind, value: Value) -> Result<Self, EntityError> {
        match value {
            Value::Object(record) => Self::from_record(kind, record),
            _ => Err(EntityError::NotAnObject),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.attributes.kind()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `<Kind>.<id>` key of this entity.
    pub fn storage_key(&self) -> String {
        self.kind().storage_key(&self.id)
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn extra(&self) -> &ExtraFields {
        &self.extra
    }

    pub fn as_place(&self) -> Option<&Place> {
        match &self.attributes {
            Attributes::Place(place) => Some(place),
            _ => None,
        }
    }

    pub fn as_place_mut(&mut self) -> Option<&mut Place> {
        match &mut self.attributes {
            Attributes::Place(place) => Some(place),
            _ => None,
        }
    }

    /// Foreign key value pointing to an entity of kind `owner`.
    pub fn reference(&self, owner: EntityKind) -> Option<&str> {
        self.attributes.reference(owner)
    }

    /// Refreshes `updated_at`; called before every mutating save.
    pub fn touch(&mut self) {
        self.updated_at = now_timestamp();
    }

    /// Applies an update payload.
    ///
    /// Base fields, the discriminator and the kind's immutable fields are
    /// silently ignored. Unknown keys update the extension map.
    ///
    /// # Errors
    /// - `InvalidField` when a declared attribute has the wrong type; the
    ///   entity is left unchanged.
    pub fn apply_update(&mut self, payload: &Map<String, Value>) -> Result<(), EntityError> {
        let kind = self.kind();
        let mut fields = self.attributes.to_fields();
        let mut extra = self.extra.clone();

        for (key, value) in payload {
            let name = key.as_str();
            if name == CLASS_KEY
                || BASE_FIELDS.contains(&name)
                || kind.immutable_fields().contains(&name)
            {
                continue;
            }
            if kind.declares(name) {
                fields.insert(key.clone(), value.clone());
            } else {
                extra.insert(key.clone(), value.clone());
            }
        }

        self.attributes = typed_attributes(kind, fields)?;
        self.extra = extra;
        Ok(())
    }

    /// Serializes every public attribute plus the discriminator key.
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut dict = self.extra.clone();
        dict.extend(self.attributes.to_fields());
        dict.insert("id".to_string(), Value::String(self.id.clone()));
        dict.insert(
            "created_at".to_string(),
            Value::String(format_timestamp(self.created_at)),
        );
        dict.insert(
            "updated_at".to_string(),
            Value::String(format_timestamp(self.updated_at)),
        );
        dict.insert(
            CLASS_KEY.to_string(),
            Value::String(self.kind().name().to_string()),
        );
        dict
    }
}

/// Current UTC time truncated to microseconds.
pub fn now_timestamp() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}

pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses the `to_dict` timestamp form; the fractional part is optional.
pub fn parse_timestamp_str(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_PARSE_FORMAT)
        .ok()
        .map(|parsed| parsed.trunc_subsecs(6))
}

fn parse_timestamp(field: &'static str, value: &Value) -> Result<NaiveDateTime, EntityError> {
    value
        .as_str()
        .and_then(parse_timestamp_str)
        .ok_or_else(|| EntityError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}

fn parse_id(value: Value) -> Result<EntityId, EntityError> {
    match value {
        Value::String(id) if !id.is_empty() => Ok(id),
        other => Err(EntityError::InvalidField {
            field: "id".to_string(),
            message: format!("expected a non-empty string, got {other}"),
        }),
    }
}

fn typed_attributes(kind: EntityKind, fields: Map<String, Value>) -> Result<Attributes, EntityError> {
    match Attributes::from_fields(kind, fields.clone()) {
        Ok(attributes) => Ok(attributes),
        Err(err) => {
            // Re-check field by field to name the offending attribute.
            for (key, value) in fields {
                let mut single = Map::new();
                single.insert(key.clone(), value);
                if let Err(field_err) = Attributes::from_fields(kind, single) {
                    return Err(EntityError::InvalidField {
                        field: key,
                        message: field_err.to_string(),
                    });
                }
            }
            Err(EntityError::InvalidField {
                field: kind.name().to_string(),
                message: err.to_string(),
            })
        }
    }
}
