use hbnb_core::service::{STATUS_BAD_REQUEST, STATUS_CREATED, STATUS_NOT_FOUND, STATUS_OK};
use hbnb_core::{
    ApiError, ApiResponse, DbStorage, Entity, EntityKind, FileStorage, HbnbService, LinkOutcome,
    Storage,
};
use serde_json::{json, Value};
use tempfile::TempDir;

fn file_service() -> (TempDir, HbnbService<FileStorage>) {
    let dir = tempfile::tempdir().unwrap();
    let mut storage = FileStorage::with_path(dir.path().join("file.json"));
    storage.reload().unwrap();
    (dir, HbnbService::new(storage))
}

fn db_service() -> HbnbService<DbStorage> {
    let mut storage = DbStorage::in_memory();
    storage.reload().unwrap();
    HbnbService::new(storage)
}

/// Creates a state, city, user and place; returns them in that order.
fn seed_place<S: Storage>(service: &mut HbnbService<S>) -> (Entity, Entity, Entity, Entity) {
    let state = service
        .create_state(Some(&json!({"name": "California"})))
        .unwrap();
    let city = service
        .create_city(state.id(), Some(&json!({"name": "San Francisco"})))
        .unwrap();
    let user = service
        .create_user(Some(&json!({"email": "host@hbnb.io", "password": "pw"})))
        .unwrap();
    let place = service
        .create_place(
            city.id(),
            Some(&json!({"user_id": user.id(), "name": "Loft", "number_rooms": 2})),
        )
        .unwrap();
    (state, city, user, place)
}

fn message(err: &ApiError) -> String {
    err.message()
}

#[test]
fn create_state_ignores_client_ids_and_keeps_extra_fields() {
    let (_dir, mut service) = file_service();

    let state = service
        .create_state(Some(&json!({
            "id": "chosen",
            "created_at": "2000-01-01T00:00:00.000000",
            "__class__": "User",
            "name": "Nevada",
            "nickname": "Silver State"
        })))
        .unwrap();

    assert_ne!(state.id(), "chosen");
    assert_eq!(state.kind(), EntityKind::State);
    let dict = state.to_dict();
    assert_eq!(dict["name"], json!("Nevada"));
    assert_eq!(dict["nickname"], json!("Silver State"));
    assert_eq!(dict["__class__"], json!("State"));
    assert_eq!(service.get(EntityKind::State, state.id()).unwrap(), state);
}

#[test]
fn create_state_and_amenity_require_json_then_name() {
    let (_dir, mut service) = file_service();

    assert_eq!(message(&service.create_state(None).unwrap_err()), "Not a JSON");
    assert_eq!(
        message(&service.create_amenity(Some(&json!("Wifi"))).unwrap_err()),
        "Not a JSON"
    );
    assert_eq!(
        message(&service.create_amenity(Some(&json!({}))).unwrap_err()),
        "Missing name"
    );
}

#[test]
fn create_user_checks_email_before_password() {
    let (_dir, mut service) = file_service();

    let err = service.create_user(Some(&json!({}))).unwrap_err();
    assert_eq!(message(&err), "Missing email");
    let err = service
        .create_user(Some(&json!({"email": "a@b.c"})))
        .unwrap_err();
    assert_eq!(message(&err), "Missing password");

    let user = service
        .create_user(Some(&json!({"email": "a@b.c", "password": "pw", "first_name": "Ada"})))
        .unwrap();
    assert_eq!(user.to_dict()["first_name"], json!("Ada"));
}

#[test]
fn create_city_resolves_state_before_body() {
    let (_dir, mut service) = file_service();

    let err = service.create_city("missing", None).unwrap_err();
    assert_eq!(err.status_code(), STATUS_NOT_FOUND);

    let state = service.create_state(Some(&json!({"name": "Oregon"}))).unwrap();
    assert_eq!(
        message(&service.create_city(state.id(), None).unwrap_err()),
        "Not a JSON"
    );
    assert_eq!(
        message(&service.create_city(state.id(), Some(&json!({}))).unwrap_err()),
        "Missing name"
    );

    let city = service
        .create_city(
            state.id(),
            Some(&json!({"name": "Portland", "state_id": "someone-else"})),
        )
        .unwrap();
    assert_eq!(city.reference(EntityKind::State), Some(state.id()));
}

#[test]
fn create_place_checks_run_in_order() {
    let (_dir, mut service) = file_service();
    let state = service.create_state(Some(&json!({"name": "Oregon"}))).unwrap();
    let city = service
        .create_city(state.id(), Some(&json!({"name": "Portland"})))
        .unwrap();
    let user = service
        .create_user(Some(&json!({"email": "a@b.c", "password": "pw"})))
        .unwrap();

    let err = service.create_place("missing", Some(&json!({}))).unwrap_err();
    assert!(matches!(err, ApiError::NotFound));

    let err = service.create_place(city.id(), Some(&json!([1]))).unwrap_err();
    assert_eq!(message(&err), "Not a JSON");

    let err = service
        .create_place(city.id(), Some(&json!({"name": "Loft"})))
        .unwrap_err();
    assert_eq!(message(&err), "Missing user_id");

    let err = service
        .create_place(city.id(), Some(&json!({"user_id": "ghost"})))
        .unwrap_err();
    assert_eq!(err.status_code(), STATUS_NOT_FOUND);

    let err = service
        .create_place(city.id(), Some(&json!({"user_id": user.id()})))
        .unwrap_err();
    assert_eq!(message(&err), "Missing name");

    let err = service
        .create_place(
            city.id(),
            Some(&json!({"user_id": user.id(), "name": "Loft", "number_rooms": "two"})),
        )
        .unwrap_err();
    assert_eq!(err.status_code(), STATUS_BAD_REQUEST);
    assert_eq!(message(&err), "Invalid number_rooms");

    let place = service
        .create_place(city.id(), Some(&json!({"user_id": user.id(), "name": "Loft"})))
        .unwrap();
    assert_eq!(place.reference(EntityKind::City), Some(city.id()));
    assert_eq!(place.reference(EntityKind::User), Some(user.id()));
}

#[test]
fn create_review_checks_run_in_order() {
    let (_dir, mut service) = file_service();
    let (_, _, user, place) = seed_place(&mut service);

    assert!(matches!(
        service.create_review("missing", None).unwrap_err(),
        ApiError::NotFound
    ));
    assert_eq!(
        message(&service.create_review(place.id(), None).unwrap_err()),
        "Not a JSON"
    );
    assert_eq!(
        message(
            &service
                .create_review(place.id(), Some(&json!({"text": "Nice"})))
                .unwrap_err()
        ),
        "Missing user_id"
    );
    assert!(matches!(
        service
            .create_review(place.id(), Some(&json!({"user_id": "ghost", "text": "Nice"})))
            .unwrap_err(),
        ApiError::NotFound
    ));
    assert_eq!(
        message(
            &service
                .create_review(place.id(), Some(&json!({"user_id": user.id()})))
                .unwrap_err()
        ),
        "Missing text"
    );

    let review = service
        .create_review(place.id(), Some(&json!({"user_id": user.id(), "text": "Nice"})))
        .unwrap();
    assert_eq!(service.list_reviews(place.id()).unwrap(), vec![review]);
}

#[test]
fn update_masks_protected_fields_and_refreshes_updated_at() {
    let (_dir, mut service) = file_service();
    let (_, city, user, place) = seed_place(&mut service);
    std::thread::sleep(std::time::Duration::from_millis(2));

    let updated = service
        .update(
            EntityKind::Place,
            place.id(),
            Some(&json!({
                "id": "other",
                "city_id": "elsewhere",
                "user_id": "someone",
                "created_at": "2000-01-01T00:00:00.000000",
                "name": "Penthouse",
                "price_by_night": 300
            })),
        )
        .unwrap();

    assert_eq!(updated.id(), place.id());
    assert_eq!(updated.created_at(), place.created_at());
    assert!(updated.updated_at() > place.updated_at());
    assert_eq!(updated.reference(EntityKind::City), Some(city.id()));
    assert_eq!(updated.reference(EntityKind::User), Some(user.id()));
    let dict = updated.to_dict();
    assert_eq!(dict["name"], json!("Penthouse"));
    assert_eq!(dict["price_by_night"], json!(300));
    assert_eq!(service.get(EntityKind::Place, place.id()).unwrap(), updated);
}

#[test]
fn update_reports_missing_entity_before_body() {
    let (_dir, mut service) = file_service();
    let state = service.create_state(Some(&json!({"name": "Oregon"}))).unwrap();

    assert!(matches!(
        service.update(EntityKind::State, "missing", None).unwrap_err(),
        ApiError::NotFound
    ));
    assert!(matches!(
        service
            .update(EntityKind::State, state.id(), Some(&json!("x")))
            .unwrap_err(),
        ApiError::NotAJson
    ));
}

#[test]
fn delete_removes_entity_without_cascading() {
    let (_dir, mut service) = file_service();
    let (state, city, _, _) = seed_place(&mut service);

    service.delete(EntityKind::State, state.id()).unwrap();

    assert!(matches!(
        service.get(EntityKind::State, state.id()).unwrap_err(),
        ApiError::NotFound
    ));
    assert!(matches!(
        service.delete(EntityKind::State, state.id()).unwrap_err(),
        ApiError::NotFound
    ));
    assert!(matches!(
        service.list_cities(state.id()).unwrap_err(),
        ApiError::NotFound
    ));
    assert_eq!(service.get(EntityKind::City, city.id()).unwrap(), city);
}

#[test]
fn nested_lists_require_existing_parent() {
    let (_dir, mut service) = file_service();
    let (state, city, _, place) = seed_place(&mut service);

    assert_eq!(service.list_states().unwrap().len(), 1);
    assert_eq!(service.list_users().unwrap().len(), 1);
    assert!(service.list_amenities().unwrap().is_empty());
    assert_eq!(service.list_cities(state.id()).unwrap(), vec![city.clone()]);
    assert_eq!(service.list_places(city.id()).unwrap(), vec![place.clone()]);
    assert!(service.list_reviews(place.id()).unwrap().is_empty());
    assert!(matches!(
        service.list_places("missing").unwrap_err(),
        ApiError::NotFound
    ));
}

#[test]
fn status_and_stats_report_every_collection() {
    let (dir, mut service) = file_service();
    assert_eq!(service.status(), json!({"status": "OK"}));

    seed_place(&mut service);
    service.create_amenity(Some(&json!({"name": "Wifi"}))).unwrap();

    let mut storage = FileStorage::with_path(dir.path().join("file.json"));
    storage.reload().unwrap();
    let reloaded = HbnbService::new(storage);

    let stats = serde_json::to_value(reloaded.stats().unwrap()).unwrap();
    assert_eq!(
        stats,
        json!({
            "amenities": 1,
            "cities": 1,
            "places": 1,
            "reviews": 0,
            "states": 1,
            "users": 1
        })
    );
}

#[test]
fn user_update_keeps_email() {
    let mut service = db_service();
    let user = service
        .create_user(Some(&json!({"email": "a@b.c", "password": "pw"})))
        .unwrap();

    let updated = service
        .update(
            EntityKind::User,
            user.id(),
            Some(&json!({"email": "someone@else.io", "first_name": "Ada"})),
        )
        .unwrap();

    let dict = service.get(EntityKind::User, user.id()).unwrap().to_dict();
    assert_eq!(dict["email"], json!("a@b.c"));
    assert_eq!(dict["first_name"], json!("Ada"));
    assert_eq!(updated.to_dict()["email"], json!("a@b.c"));
}

#[test]
fn create_place_ignores_client_amenity_links() {
    let (_dir, mut file) = file_service();
    let mut db = db_service();

    let (_, city, user, _) = seed_place(&mut file);
    let body = json!({"user_id": user.id(), "name": "Loft", "amenity_ids": ["a-1", "a-1"]});
    let created = file.create_place(city.id(), Some(&body)).unwrap();
    assert!(created.as_place().unwrap().amenity_ids.is_empty());
    assert_eq!(file.get(EntityKind::Place, created.id()).unwrap(), created);

    let (_, city, user, _) = seed_place(&mut db);
    let body = json!({"user_id": user.id(), "name": "Loft", "amenity_ids": ["a-1", "a-1"]});
    let created = db.create_place(city.id(), Some(&body)).unwrap();
    assert!(created.as_place().unwrap().amenity_ids.is_empty());
    assert_eq!(db.get(EntityKind::Place, created.id()).unwrap(), created);
}

#[test]
fn place_amenity_links_report_created_then_existing() {
    let mut service = db_service();
    let (_, _, _, place) = seed_place(&mut service);
    let wifi = service.create_amenity(Some(&json!({"name": "Wifi"}))).unwrap();
    let pool = service.create_amenity(Some(&json!({"name": "Pool"}))).unwrap();

    let outcome = service.link_place_amenity(place.id(), wifi.id()).unwrap();
    assert_eq!(outcome, LinkOutcome::Created(wifi.clone()));
    assert_eq!(outcome.status_code(), STATUS_CREATED);

    let outcome = service.link_place_amenity(place.id(), wifi.id()).unwrap();
    assert_eq!(outcome.status_code(), STATUS_OK);
    assert_eq!(outcome.into_amenity(), wifi);

    service.link_place_amenity(place.id(), pool.id()).unwrap();
    assert_eq!(
        service.list_place_amenities(place.id()).unwrap(),
        vec![wifi.clone(), pool.clone()]
    );

    service.unlink_place_amenity(place.id(), wifi.id()).unwrap();
    assert_eq!(service.list_place_amenities(place.id()).unwrap(), vec![pool]);
    assert!(matches!(
        service.unlink_place_amenity(place.id(), wifi.id()).unwrap_err(),
        ApiError::NotFound
    ));
}

#[test]
fn place_amenity_links_require_both_ends() {
    let mut service = db_service();
    let (_, _, _, place) = seed_place(&mut service);
    let wifi = service.create_amenity(Some(&json!({"name": "Wifi"}))).unwrap();

    assert!(matches!(
        service.link_place_amenity("missing", wifi.id()).unwrap_err(),
        ApiError::NotFound
    ));
    assert!(matches!(
        service.link_place_amenity(place.id(), "missing").unwrap_err(),
        ApiError::NotFound
    ));
    assert!(matches!(
        service.list_place_amenities("missing").unwrap_err(),
        ApiError::NotFound
    ));
}

#[test]
fn linked_amenities_are_not_writable_through_update() {
    let mut service = db_service();
    let (_, _, _, place) = seed_place(&mut service);
    let wifi = service.create_amenity(Some(&json!({"name": "Wifi"}))).unwrap();
    service.link_place_amenity(place.id(), wifi.id()).unwrap();

    service
        .update(
            EntityKind::Place,
            place.id(),
            Some(&json!({"amenity_ids": []})),
        )
        .unwrap();

    assert_eq!(service.list_place_amenities(place.id()).unwrap(), vec![wifi]);
}

#[test]
fn places_search_validates_body_shape() {
    let mut service = db_service();
    let (state, _, _, place) = seed_place(&mut service);

    assert!(matches!(
        service.places_search(None).unwrap_err(),
        ApiError::NotAJson
    ));
    let err = service
        .places_search(Some(&json!({"states": state.id()})))
        .unwrap_err();
    assert_eq!(message(&err), "Invalid states");

    let found = service
        .places_search(Some(&json!({"states": [state.id()], "cities": null})))
        .unwrap();
    assert_eq!(found, vec![place.clone()]);
    assert_eq!(service.places_search(Some(&json!({}))).unwrap(), vec![place]);
}

#[test]
fn responses_render_status_and_body() {
    let (_dir, mut service) = file_service();

    let created = service.create_state(Some(&json!({"name": "Oregon"})));
    let response = ApiResponse::entity(created, STATUS_CREATED);
    assert_eq!(response.status, STATUS_CREATED);
    assert_eq!(response.body["name"], json!("Oregon"));
    assert_eq!(response.body["__class__"], json!("State"));

    let missing = service.get(EntityKind::State, "missing");
    let response = ApiResponse::entity(missing, STATUS_OK);
    assert_eq!(response.status, STATUS_NOT_FOUND);
    assert_eq!(response.body, json!({"error": "Not found"}));

    let response = ApiResponse::entities(service.list_states());
    assert_eq!(response.status, STATUS_OK);
    assert_eq!(response.body.as_array().map(Vec::len), Some(1));

    let id = response.body[0]["id"].as_str().unwrap().to_string();
    let response = ApiResponse::empty(service.delete(EntityKind::State, &id));
    assert_eq!(response, ApiResponse::new(STATUS_OK, json!({})));

    let response = ApiResponse::entity(service.create_state(Some(&json!({}))), STATUS_CREATED);
    assert_eq!(response.status, STATUS_BAD_REQUEST);
    assert_eq!(response.body, json!({"error": "Missing name"}));
}

#[test]
fn storage_failures_map_to_internal_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = HbnbService::new(FileStorage::with_path(dir.path()));

    let err = service
        .create_state(Some(&json!({"name": "Oregon"})))
        .unwrap_err();
    assert!(matches!(err, ApiError::Storage(_)));
    let response = ApiResponse::from_error(&err);
    assert_eq!(response.status, 500);
    assert_eq!(response.body, json!({"error": "Internal error"}));
}

#[test]
fn service_behaves_the_same_over_boxed_storage() {
    let dir = tempfile::tempdir().unwrap();
    let config = hbnb_core::StorageConfig {
        backend: hbnb_core::StorageBackend::Db,
        file_path: dir.path().join("file.json"),
        db_path: dir.path().join("hbnb.sqlite3"),
    };

    let mut service = HbnbService::new(hbnb_core::open_storage(&config).unwrap());
    let state = service.create_state(Some(&json!({"name": "Oregon"}))).unwrap();
    service.close_session().unwrap();

    let reopened = HbnbService::new(hbnb_core::open_storage(&config).unwrap());
    let listed: Vec<Value> = reopened
        .list_states()
        .unwrap()
        .into_iter()
        .map(|entity| Value::Object(entity.to_dict()))
        .collect();
    assert_eq!(listed, vec![Value::Object(state.to_dict())]);
}
