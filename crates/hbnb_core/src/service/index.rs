//! Status, per-collection statistics and the places search entry point.

use super::{logged, require_object, ApiError, ApiResult, HbnbService};
use crate::model::entity::Entity;
use crate::model::kind::EntityKind;
use crate::search::places::{places_search, PlacesSearchQuery};
use crate::storage::Storage;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Entity counts keyed by collection name (`amenities`, `cities`, ...).
pub type Stats = BTreeMap<String, usize>;

impl<S: Storage> HbnbService<S> {
    /// Liveness body.
    pub fn status(&self) -> Value {
        json!({ "status": "OK" })
    }

    pub fn stats(&self) -> ApiResult<Stats> {
        let result = self.collect_stats();
        logged("stats", result)
    }

    /// Places matching a search body.
    ///
    /// # Errors
    /// - `NotAJson` when the body is absent or not an object.
    /// - `InvalidField(<key>)` when `states`, `cities` or `amenities` is not
    ///   a list of strings. Absent and `null` lists count as empty.
    pub fn places_search(&self, body: Option<&Value>) -> ApiResult<Vec<Entity>> {
        let payload = require_object(body)?;
        let query = parse_search_query(payload)?;
        let result = places_search(&self.storage, &query).map_err(ApiError::from);
        logged("places_search", result)
    }

    fn collect_stats(&self) -> ApiResult<Stats> {
        let mut stats = Stats::new();
        for kind in EntityKind::ALL {
            stats.insert(kind.collection().to_string(), self.storage.count(Some(kind))?);
        }
        Ok(stats)
    }
}

fn parse_search_query(payload: &Map<String, Value>) -> ApiResult<PlacesSearchQuery> {
    Ok(PlacesSearchQuery {
        states: id_list(payload, "states")?,
        cities: id_list(payload, "cities")?,
        amenities: id_list(payload, "amenities")?,
    })
}

fn id_list(payload: &Map<String, Value>, key: &str) -> ApiResult<Vec<String>> {
    match payload.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::InvalidField(key.to_string()))
            })
            .collect(),
        Some(_) => Err(ApiError::InvalidField(key.to_string())),
    }
}
