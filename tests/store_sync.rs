mod common;

use std::sync::{Arc, Mutex};

use restrosync::{topics, EventBus, Origin, StateFile, Store, SyncConfig};
use serde_json::{json, Value};

fn offline_engine() -> (EventBus, Store, tempfile::TempDir) {
    let (dir, path) = common::temp_state();
    let bus = EventBus::new(&SyncConfig::default(), None);
    let store = Store::new(bus.clone(), StateFile::new(path));
    (bus, store, dir)
}

fn capture(bus: &EventBus, event: &str) -> Arc<Mutex<Vec<Value>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = bus.subscribe(event, move |_event, payload, _origin| {
        sink.lock().unwrap().push(payload.clone());
        Ok(())
    });
    std::mem::forget(sub); // keep the registration for the test's lifetime
    seen
}

// -- optimistic writes --------------------------------------------------------

#[test]
fn set_notifies_before_returning() {
    let (bus, store, _dir) = offline_engine();
    let changes = capture(&bus, topics::STORE_CHANGED);

    store.set("settings.taxRate", json!(12)).unwrap();

    let changes = changes.lock().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(
        changes[0],
        json!({ "path": "settings.taxRate", "value": 12 })
    );
}

#[test]
fn push_to_emptied_tables_matches_the_wire_shape() {
    let (bus, store, _dir) = offline_engine();
    store.set("tables", json!([])).unwrap();
    let changes = capture(&bus, topics::STORE_CHANGED);

    store
        .push("tables", json!({ "id": "t1", "status": "available" }))
        .unwrap();

    assert_eq!(
        store.get("tables"),
        Some(json!([{ "id": "t1", "status": "available" }]))
    );
    let changes = changes.lock().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(
        changes[0],
        json!({ "path": "tables", "value": [{ "id": "t1", "status": "available" }] })
    );
}

#[test]
fn update_in_array_notifies_with_the_whole_array() {
    let (bus, store, _dir) = offline_engine();
    store.set("orders", json!([{ "id": "o1", "status": "open" }])).unwrap();
    let changes = capture(&bus, topics::STORE_CHANGED);

    let updated = store
        .update_in_array("orders", "o1", json!({ "status": "served" }))
        .unwrap()
        .unwrap();

    assert_eq!(updated, json!({ "id": "o1", "status": "served" }));
    let changes = changes.lock().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["path"], json!("orders"));
}

#[test]
fn update_in_array_not_found_emits_nothing() {
    let (bus, store, _dir) = offline_engine();
    let changes = capture(&bus, topics::STORE_CHANGED);

    let result = store
        .update_in_array("orders", "ghost", json!({ "status": "served" }))
        .unwrap();

    assert_eq!(result, None);
    assert!(changes.lock().unwrap().is_empty());
}

// -- init & durability --------------------------------------------------------

#[tokio::test]
async fn init_loads_the_durable_copy() {
    let (_dir, path) = common::temp_state();
    std::fs::write(
        &path,
        serde_json::to_string(&json!({ "settings": { "taxRate": 42 } })).unwrap(),
    )
    .unwrap();

    let bus = EventBus::new(&common::test_config(common::free_port()), None);
    let store = Store::new(bus, StateFile::new(path));
    store.init();

    assert_eq!(store.get("settings.taxRate"), Some(json!(42)));
}

#[tokio::test]
async fn init_with_corrupt_copy_keeps_the_seed() {
    let (_dir, path) = common::temp_state();
    std::fs::write(&path, "{ not json").unwrap();

    let bus = EventBus::new(&common::test_config(common::free_port()), None);
    let store = Store::new(bus, StateFile::new(path));
    store.init();

    assert_eq!(store.get("settings.taxRate"), Some(json!(10)));
    assert_eq!(store.get("settings.currency"), Some(json!("USD")));
}

// -- reconciliation -----------------------------------------------------------

#[tokio::test]
async fn full_state_replaces_the_tree_and_notifies_star() {
    let (_dir, path) = common::temp_state();
    let bus = EventBus::new(&common::test_config(common::free_port()), None);
    let store = Store::new(bus.clone(), StateFile::new(path.clone()));
    store.init();
    let changes = capture(&bus, topics::STORE_CHANGED);

    let snapshot = json!({ "settings": { "taxRate": 99 }, "orders": [{ "id": "o1" }] });
    bus.publish(topics::SERVER_FULL_STATE, snapshot.clone(), false);

    assert_eq!(store.snapshot(), snapshot);
    let changes = changes.lock().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0], json!({ "path": "*", "value": null }));

    // Replacement was persisted
    assert_eq!(StateFile::new(path).load(), Some(snapshot));
}

#[tokio::test]
async fn server_state_change_applies_like_a_local_set() {
    let (_dir, path) = common::temp_state();
    let bus = EventBus::new(&common::test_config(common::free_port()), None);
    let store = Store::new(bus.clone(), StateFile::new(path));
    store.init();
    let changes = capture(&bus, topics::STORE_CHANGED);

    bus.publish(
        topics::SERVER_STATE_CHANGE,
        json!({ "path": "settings.taxRate", "value": 15 }),
        false,
    );

    assert_eq!(store.get("settings.taxRate"), Some(json!(15)));
    let changes = changes.lock().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(
        changes[0],
        json!({ "path": "settings.taxRate", "value": 15 })
    );
}

#[tokio::test]
async fn malformed_state_change_payload_is_dropped() {
    let (_dir, path) = common::temp_state();
    let bus = EventBus::new(&common::test_config(common::free_port()), None);
    let store = Store::new(bus.clone(), StateFile::new(path));
    store.init();
    let before = store.snapshot();

    bus.publish(topics::SERVER_STATE_CHANGE, json!({ "value": 15 }), false);
    bus.publish(topics::SERVER_STATE_CHANGE, json!("nonsense"), false);

    assert_eq!(store.snapshot(), before);
}

// -- subscriber provenance ----------------------------------------------------

#[test]
fn local_changes_carry_local_origin() {
    let (bus, store, _dir) = offline_engine();
    let origins = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&origins);
    let sub = bus.subscribe(topics::STORE_CHANGED, move |_event, _payload, origin| {
        sink.lock().unwrap().push(origin);
        Ok(())
    });

    store.set("settings.taxRate", json!(11)).unwrap();
    sub.revoke();

    assert_eq!(*origins.lock().unwrap(), vec![Origin::Local]);
}
