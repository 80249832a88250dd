//! Cross-entity search entry points.
//!
//! # Responsibility
//! - Compose storage primitives into criteria searches over places.
//! - Stay backend-agnostic: only `Storage` trait methods are used.

pub mod places;
