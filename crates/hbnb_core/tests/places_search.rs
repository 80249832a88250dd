use hbnb_core::{
    places_search, DbStorage, Entity, EntityKind, FileStorage, PlacesSearchQuery, Storage,
};
use serde_json::json;

/// Two states, three cities, six places and five amenities:
/// - `s-1` owns `c-1` (`p-1`..`p-4`) and `c-2` (`p-5`)
/// - `s-2` owns `c-3` (`p-6`)
fn seed(storage: &mut dyn Storage) {
    let mut records = vec![
        (EntityKind::State, json!({"id": "s-1", "name": "California"})),
        (EntityKind::State, json!({"id": "s-2", "name": "Arizona"})),
        (EntityKind::City, json!({"id": "c-1", "state_id": "s-1", "name": "San Francisco"})),
        (EntityKind::City, json!({"id": "c-2", "state_id": "s-1", "name": "Fremont"})),
        (EntityKind::City, json!({"id": "c-3", "state_id": "s-2", "name": "Tempe"})),
        (EntityKind::User, json!({"id": "u-1", "email": "u1@hbnb.io", "password": "pw"})),
    ];
    for id in ["a-1", "a-2", "a-3", "a-4", "a-5"] {
        records.push((EntityKind::Amenity, json!({"id": id, "name": id.to_uppercase()})));
    }
    let places = [
        ("p-1", "c-1", vec!["a-1", "a-2"]),
        ("p-2", "c-1", vec!["a-1"]),
        ("p-3", "c-1", vec![]),
        ("p-4", "c-1", vec!["a-2", "a-3"]),
        ("p-5", "c-2", vec!["a-2", "a-1"]),
        ("p-6", "c-3", vec!["a-1"]),
    ];
    for (id, city_id, amenity_ids) in places {
        records.push((
            EntityKind::Place,
            json!({
                "id": id,
                "city_id": city_id,
                "user_id": "u-1",
                "name": format!("Place {id}"),
                "amenity_ids": amenity_ids
            }),
        ));
    }

    for (kind, record) in records {
        storage.new(Entity::from_value(kind, record).unwrap()).unwrap();
    }
    storage.save().unwrap();
}

/// Runs `check` against a seeded snapshot engine and a seeded database.
fn with_seeded_backends(check: impl Fn(&dyn Storage)) {
    let dir = tempfile::tempdir().unwrap();
    let mut file = FileStorage::with_path(dir.path().join("file.json"));
    file.reload().unwrap();
    seed(&mut file);
    check(&file);

    let mut db = DbStorage::in_memory();
    db.reload().unwrap();
    seed(&mut db);
    check(&db);
}

fn query(states: &[&str], cities: &[&str], amenities: &[&str]) -> PlacesSearchQuery {
    let owned = |ids: &[&str]| ids.iter().map(|id| id.to_string()).collect::<Vec<_>>();
    PlacesSearchQuery {
        states: owned(states),
        cities: owned(cities),
        amenities: owned(amenities),
    }
}

fn search_ids(storage: &dyn Storage, query: &PlacesSearchQuery) -> Vec<String> {
    places_search(storage, query)
        .unwrap()
        .iter()
        .map(|place| place.id().to_string())
        .collect()
}

#[test]
fn empty_query_returns_every_place() {
    with_seeded_backends(|storage| {
        let query = PlacesSearchQuery::default();
        assert!(query.is_empty());
        assert_eq!(
            search_ids(storage, &query),
            vec!["p-1", "p-2", "p-3", "p-4", "p-5", "p-6"]
        );
    });
}

#[test]
fn states_expand_to_places_of_their_cities() {
    with_seeded_backends(|storage| {
        assert_eq!(
            search_ids(storage, &query(&["s-1"], &[], &[])),
            vec!["p-1", "p-2", "p-3", "p-4", "p-5"]
        );
    });
}

#[test]
fn overlapping_state_and_city_criteria_yield_each_place_once() {
    with_seeded_backends(|storage| {
        assert_eq!(
            search_ids(storage, &query(&["s-2"], &["c-2", "c-3"], &[])),
            vec!["p-6", "p-5"]
        );
        assert_eq!(
            search_ids(storage, &query(&["s-1"], &["c-1"], &[])),
            vec!["p-1", "p-2", "p-3", "p-4", "p-5"]
        );
    });
}

#[test]
fn unresolvable_locations_are_skipped() {
    with_seeded_backends(|storage| {
        assert!(search_ids(storage, &query(&["nowhere"], &[], &[])).is_empty());
        assert_eq!(
            search_ids(storage, &query(&["nowhere"], &["c-3"], &[])),
            vec!["p-6"]
        );
    });
}

#[test]
fn amenities_filter_requires_every_requested_amenity() {
    with_seeded_backends(|storage| {
        assert_eq!(
            search_ids(storage, &query(&[], &[], &["a-1", "a-2"])),
            vec!["p-1", "p-5"]
        );
        assert_eq!(search_ids(storage, &query(&[], &[], &["a-3"])), vec!["p-4"]);
        assert!(search_ids(storage, &query(&[], &[], &["a-4"])).is_empty());
    });
}

#[test]
fn amenities_narrow_location_results() {
    with_seeded_backends(|storage| {
        assert_eq!(
            search_ids(storage, &query(&["s-1"], &[], &["a-1"])),
            vec!["p-1", "p-2", "p-5"]
        );
        assert_eq!(
            search_ids(storage, &query(&["s-2"], &[], &["a-1"])),
            vec!["p-6"]
        );
    });
}

#[test]
fn unresolvable_amenity_matches_nothing() {
    with_seeded_backends(|storage| {
        assert!(search_ids(storage, &query(&[], &[], &["a-1", "missing"])).is_empty());
        assert!(search_ids(storage, &query(&["s-1"], &[], &["missing"])).is_empty());
    });
}
