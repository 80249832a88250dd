//! Domain model for the six entity kinds.
//!
//! # Responsibility
//! - Define kinds, typed attributes and the shared entity record.
//! - Keep one serialized shape (`to_dict`) for every storage engine.
//!
//! # Invariants
//! - Every entity is identified by an opaque `id` unique within its kind.
//! - Relationships are foreign keys on the dependent side only.

pub mod entity;
pub mod kind;
