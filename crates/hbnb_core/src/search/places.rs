//! Places search over state, city and amenity criteria.
//!
//! # Invariants
//! - No criteria at all means every place.
//! - State and city criteria are unioned; ids that do not resolve are skipped.
//! - Each place appears once, at its first qualifying position.
//! - Amenity criteria require a superset match; an amenity id that does not
//!   resolve matches no place.

use crate::model::entity::Entity;
use crate::model::kind::EntityKind;
use crate::storage::{Storage, StorageResult};
use log::debug;
use std::collections::HashSet;
use std::time::Instant;

/// Search criteria; every list may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacesSearchQuery {
    pub states: Vec<String>,
    pub cities: Vec<String>,
    pub amenities: Vec<String>,
}

impl PlacesSearchQuery {
    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.cities.is_empty() && self.amenities.is_empty()
    }
}

/// Runs a places search against any storage engine.
pub fn places_search<S: Storage + ?Sized>(
    storage: &S,
    query: &PlacesSearchQuery,
) -> StorageResult<Vec<Entity>> {
    let started_at = Instant::now();

    let mut places = if query.states.is_empty() && query.cities.is_empty() {
        storage
            .all(Some(EntityKind::Place))?
            .into_values()
            .collect::<Vec<_>>()
    } else {
        places_by_location(storage, query)?
    };

    if !query.amenities.is_empty() {
        match resolve_amenities(storage, &query.amenities)? {
            Some(required) => places.retain(|place| {
                place
                    .as_place()
                    .is_some_and(|place| required.iter().all(|id| place.has_amenity(id)))
            }),
            None => places.clear(),
        }
    }

    debug!(
        "event=places_search module=search status=ok states={} cities={} amenities={} hits={} duration_ms={}",
        query.states.len(),
        query.cities.len(),
        query.amenities.len(),
        places.len(),
        started_at.elapsed().as_millis()
    );
    Ok(places)
}

fn places_by_location<S: Storage + ?Sized>(
    storage: &S,
    query: &PlacesSearchQuery,
) -> StorageResult<Vec<Entity>> {
    let mut seen = HashSet::new();
    let mut places = Vec::new();
    let mut collect = |found: Vec<Entity>| {
        for place in found {
            if seen.insert(place.id().to_string()) {
                places.push(place);
            }
        }
    };

    for state_id in &query.states {
        if storage.get(EntityKind::State, state_id)?.is_none() {
            continue;
        }
        for city in storage.cities_of_state(state_id)? {
            collect(storage.places_of_city(city.id())?);
        }
    }

    for city_id in &query.cities {
        if storage.get(EntityKind::City, city_id)?.is_none() {
            continue;
        }
        collect(storage.places_of_city(city_id)?);
    }

    Ok(places)
}

/// Resolved amenity ids, or `None` when any requested id does not resolve.
fn resolve_amenities<S: Storage + ?Sized>(
    storage: &S,
    amenity_ids: &[String],
) -> StorageResult<Option<Vec<String>>> {
    let mut resolved = Vec::with_capacity(amenity_ids.len());
    for amenity_id in amenity_ids {
        match storage.get(EntityKind::Amenity, amenity_id)? {
            Some(amenity) => resolved.push(amenity.id().to_string()),
            None => return Ok(None),
        }
    }
    Ok(Some(resolved))
}
