//! Entity kinds and their declared schema.
//!
//! # Responsibility
//! - Name the six entity kinds and their discriminator/table names.
//! - Declare per-kind attributes, create-time requirements and ownership
//!   (foreign key) fields.
//!
//! # Invariants
//! - `name()` is the discriminator value written under `__class__`.
//! - Ownership is declared only on the dependent side; traversal scans it.

use std::fmt::{Display, Formatter};

/// One of the six entity kinds in the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Amenity,
    City,
    Place,
    Review,
    State,
    User,
}

impl EntityKind {
    /// Every kind, in stats/collection order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Amenity,
        EntityKind::City,
        EntityKind::Place,
        EntityKind::Review,
        EntityKind::State,
        EntityKind::User,
    ];

    /// Discriminator value, also the prefix of storage keys.
    pub fn name(self) -> &'static str {
        match self {
            Self::Amenity => "Amenity",
            Self::City => "City",
            Self::Place => "Place",
            Self::Review => "Review",
            Self::State => "State",
            Self::User => "User",
        }
    }

    /// Parses a discriminator value.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Plural collection name, used for SQLite tables and stats keys.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Amenity => "amenities",
            Self::City => "cities",
            Self::Place => "places",
            Self::Review => "reviews",
            Self::State => "states",
            Self::User => "users",
        }
    }

    /// Declared attributes beyond the base fields.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Amenity | Self::State => &["name"],
            Self::City => &["name", "state_id"],
            Self::Place => &[
                "city_id",
                "user_id",
                "name",
                "description",
                "number_rooms",
                "number_bathrooms",
                "max_guest",
                "price_by_night",
                "latitude",
                "longitude",
                "amenity_ids",
            ],
            Self::Review => &["place_id", "user_id", "text"],
            Self::User => &["email", "password", "first_name", "last_name"],
        }
    }

    /// Whether `field` is a declared attribute of this kind.
    pub fn declares(self, field: &str) -> bool {
        self.fields().contains(&field)
    }

    /// Kind-specific attributes that updates must never touch.
    ///
    /// Base fields (`id`, `created_at`, `updated_at`) are protected for every
    /// kind and are not repeated here.
    pub fn immutable_fields(self) -> &'static [&'static str] {
        match self {
            Self::Amenity | Self::State => &[],
            Self::City => &["state_id"],
            Self::Place => &["user_id", "city_id", "amenity_ids"],
            Self::Review => &["user_id", "place_id"],
            Self::User => &["email"],
        }
    }

    /// Foreign key field on `self` that points to an `owner` entity.
    pub fn owner_field(self, owner: EntityKind) -> Option<&'static str> {
        match (self, owner) {
            (Self::City, Self::State) => Some("state_id"),
            (Self::Place, Self::City) => Some("city_id"),
            (Self::Place, Self::User) | (Self::Review, Self::User) => Some("user_id"),
            (Self::Review, Self::Place) => Some("place_id"),
            _ => None,
        }
    }

    /// Storage key `<Kind>.<id>` used by `all()` and the snapshot document.
    pub fn storage_key(self, id: &str) -> String {
        format!("{}.{id}", self.name())
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Splits a `<Kind>.<id>` storage key.
pub fn parse_storage_key(key: &str) -> Option<(EntityKind, &str)> {
    let (kind, id) = key.split_once('.')?;
    if id.is_empty() {
        return None;
    }
    Some((EntityKind::parse(kind)?, id))
}
