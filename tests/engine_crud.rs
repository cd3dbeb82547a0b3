//! Entity CRUD and Optimistic Concurrency Tests
//!
//! End-to-end tests against the engine contract:
//! - ETags round-trip from create through conditional update and delete
//! - Every precondition failure shape answers 412
//! - Numeric and null values survive write/read unchanged

use std::collections::HashMap;
use std::sync::Arc;

use nimbusdb::engine::UserDataEngine;
use nimbusdb::store::MemoryStore;
use nimbusdb::EngineConfig;
use serde_json::{json, Map, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_engine() -> UserDataEngine {
    let engine = UserDataEngine::new(EngineConfig::default(), Arc::new(MemoryStore::new()));
    engine.create_entity_type("Account").unwrap();
    engine
}

fn body(value: Value) -> Map<String, Value> {
    value.as_object().unwrap().clone()
}

fn etag_of(rendered: &Value) -> String {
    rendered["__metadata"]["etag"].as_str().unwrap().to_string()
}

// =============================================================================
// ETag Round-Trip Tests
// =============================================================================

/// A create returns a weak ETag that conditions the next update.
#[test]
fn test_etag_round_trip_through_update() {
    let engine = setup_engine();
    let created = engine
        .create("Account", body(json!({"__id": "a1", "name": "x"})))
        .unwrap();
    let etag = etag_of(&created);
    assert!(etag.starts_with("W/\""));

    let updated = engine
        .update("Account", "a1", Some(&etag), body(json!({"name": "y"})))
        .unwrap();
    let new_etag = etag_of(&updated);
    assert_ne!(etag, new_etag);

    // The old validator no longer matches
    let err = engine
        .update("Account", "a1", Some(&etag), body(json!({"name": "z"})))
        .unwrap_err();
    assert_eq!(err.status_code(), 412);

    // The fresh one does
    engine
        .update("Account", "a1", Some(&new_etag), body(json!({"name": "z"})))
        .unwrap();
}

/// `If-Match: *` and an absent header both pass unconditionally.
#[test]
fn test_unconditional_updates() {
    let engine = setup_engine();
    engine
        .create("Account", body(json!({"__id": "a1", "name": "x"})))
        .unwrap();

    engine
        .update("Account", "a1", None, body(json!({"name": "y"})))
        .unwrap();
    engine
        .update("Account", "a1", Some("*"), body(json!({"name": "z"})))
        .unwrap();

    let fetched = engine.retrieve("Account", "a1", None).unwrap();
    assert_eq!(fetched["name"], "z");
}

/// Each malformed or stale validator shape fails with 412.
#[test]
fn test_precondition_failure_shapes() {
    let engine = setup_engine();
    let created = engine
        .create("Account", body(json!({"__id": "a1"})))
        .unwrap();
    let etag = etag_of(&created);
    let inner = etag
        .strip_prefix("W/\"")
        .and_then(|s| s.strip_suffix('"'))
        .unwrap();
    let (version, updated) = inner.split_once('-').unwrap();

    let stale_version = format!("W/\"{}-{updated}\"", version.parse::<u64>().unwrap() + 1);
    let stale_updated = format!("W/\"{version}-{}\"", updated.parse::<i64>().unwrap() + 1);
    let strong = format!("\"{version}-{updated}\"");
    let bare = inner.to_string();
    let garbage = "W/\"not-numbers\"".to_string();

    for bad in [stale_version, stale_updated, strong, bare, garbage] {
        let err = engine
            .update("Account", "a1", Some(&bad), body(json!({"name": "y"})))
            .unwrap_err();
        assert_eq!(err.status_code(), 412, "validator {bad:?}");
        assert_eq!(err.code(), "ETAG_NOT_MATCH");
    }

    // Still at the original state
    let fetched = engine.retrieve("Account", "a1", None).unwrap();
    assert_eq!(etag_of(&fetched), etag);
}

/// A conditional delete removes the record and its 404 shape follows.
#[test]
fn test_conditional_delete() {
    let engine = setup_engine();
    let created = engine
        .create("Account", body(json!({"__id": "a1"})))
        .unwrap();
    let etag = etag_of(&created);

    let err = engine
        .delete("Account", "a1", Some("W/\"5-5\""))
        .unwrap_err();
    assert_eq!(err.status_code(), 412);

    engine.delete("Account", "a1", Some(&etag)).unwrap();
    let err = engine.retrieve("Account", "a1", None).unwrap_err();
    assert_eq!(err.status_code(), 404);
}

// =============================================================================
// Value Fidelity Tests
// =============================================================================

/// A float with many significant digits reads back byte-identical.
#[test]
fn test_numeric_literal_round_trip() {
    let engine = setup_engine();
    engine
        .create(
            "Account",
            body(json!({"__id": "a1", "balance": 1234567890.12345})),
        )
        .unwrap();
    let fetched = engine.retrieve("Account", "a1", None).unwrap();
    assert_eq!(
        serde_json::to_string(&fetched["balance"]).unwrap(),
        "1234567890.12345"
    );
}

/// A property written as null may later hold a number; both read back as
/// written.
#[test]
fn test_null_then_numeric_round_trip() {
    let engine = setup_engine();
    engine
        .create("Account", body(json!({"__id": "a1", "score": null})))
        .unwrap();
    let fetched = engine.retrieve("Account", "a1", None).unwrap();
    assert_eq!(fetched["score"], Value::Null);

    engine
        .update("Account", "a1", None, body(json!({"score": 42})))
        .unwrap();
    let fetched = engine.retrieve("Account", "a1", None).unwrap();
    assert_eq!(fetched["score"], 42);
}

/// Control characters in string values survive storage and rendering.
#[test]
fn test_control_character_round_trip() {
    let engine = setup_engine();
    let text = "line1\nline2\ttabbed \u{0001}unit";
    engine
        .create("Account", body(json!({"__id": "a1", "note": text})))
        .unwrap();
    let fetched = engine.retrieve("Account", "a1", None).unwrap();
    assert_eq!(fetched["note"], text);

    // And through a full JSON serialization cycle
    let wire = serde_json::to_string(&fetched).unwrap();
    let back: Value = serde_json::from_str(&wire).unwrap();
    assert_eq!(back["note"], text);
}

// =============================================================================
// MERGE Semantics Tests
// =============================================================================

/// MERGE overlays supplied keys and keeps the rest; update replaces.
#[test]
fn test_merge_versus_update() {
    let engine = setup_engine();
    engine
        .create(
            "Account",
            body(json!({"__id": "a1", "name": "x", "rank": 3})),
        )
        .unwrap();

    let merged = engine
        .merge("Account", "a1", None, body(json!({"rank": 4})))
        .unwrap();
    assert_eq!(merged["name"], "x");
    assert_eq!(merged["rank"], 4);

    let replaced = engine
        .update("Account", "a1", None, body(json!({"rank": 5})))
        .unwrap();
    assert!(replaced.get("name").is_none());
    assert_eq!(replaced["rank"], 5);
}

/// MERGE is conditional on If-Match like every other write.
#[test]
fn test_merge_honors_if_match() {
    let engine = setup_engine();
    engine
        .create("Account", body(json!({"__id": "a1", "name": "x"})))
        .unwrap();
    let err = engine
        .merge(
            "Account",
            "a1",
            Some("W/\"9-9\""),
            body(json!({"name": "y"})),
        )
        .unwrap_err();
    assert_eq!(err.status_code(), 412);
}

// =============================================================================
// Key Handling Tests
// =============================================================================

/// Key path segments require single quotes.
#[test]
fn test_key_segment_parsing() {
    use nimbusdb::engine::parse_key_segment;

    assert_eq!(parse_key_segment("'a1'").unwrap(), "a1");
    for bad in ["a1", "'a1", "a1'", "''", "'a'1'"] {
        let err = parse_key_segment(bad).unwrap_err();
        assert_eq!(err.code(), "ENTITY_KEY_PARSE_ERROR");
        assert_eq!(err.status_code(), 400, "segment {bad:?}");
    }
}

/// Duplicate ids are rejected with a conflict.
#[test]
fn test_duplicate_id_conflicts() {
    let engine = setup_engine();
    engine
        .create("Account", body(json!({"__id": "a1"})))
        .unwrap();
    let err = engine
        .create("Account", body(json!({"__id": "a1"})))
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
}

/// A list over everything shows stored instances in creation order.
#[test]
fn test_list_returns_creation_order() {
    let engine = setup_engine();
    for i in 0..5 {
        engine
            .create("Account", body(json!({"__id": format!("a{i}")})))
            .unwrap();
    }
    let listed = engine.list("Account", &HashMap::new()).unwrap();
    let ids: Vec<&str> = listed["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["__id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a0", "a1", "a2", "a3", "a4"]);
}
