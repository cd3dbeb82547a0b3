//! Link Registration and Limit Tests
//!
//! Association semantics end to end:
//! - N:N ceilings hold from both directions with nothing partially persisted
//! - Single-valued ends reject direct relinks but are replaced through
//!   navigation-property creation
//! - Deleting an instance cascades its links

use std::collections::HashMap;
use std::sync::Arc;

use nimbusdb::engine::UserDataEngine;
use nimbusdb::schema::{AssociationEnd, Multiplicity};
use nimbusdb::store::MemoryStore;
use nimbusdb::EngineConfig;
use serde_json::{json, Map, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_engine(config: EngineConfig) -> UserDataEngine {
    let engine = UserDataEngine::new(config, Arc::new(MemoryStore::new()));
    engine.create_entity_type("A").unwrap();
    engine.create_entity_type("B").unwrap();
    engine
}

/// Declare an association between A and B with the given end multiplicities.
/// An end's multiplicity bounds how many instances of that type one instance
/// of the opposite type may hold.
fn declare(engine: &UserDataEngine, mult_a: Multiplicity, mult_b: Multiplicity) {
    engine
        .create_association_end(AssociationEnd::new("A", "to-b", mult_a))
        .unwrap();
    engine
        .create_association_end(AssociationEnd::new("B", "to-a", mult_b))
        .unwrap();
    engine
        .link_association_ends(("A", "to-b"), ("B", "to-a"))
        .unwrap();
}

fn create(engine: &UserDataEngine, entity_type: &str, id: &str) {
    engine
        .create(entity_type, body(json!({ "__id": id })))
        .unwrap();
}

fn body(value: Value) -> Map<String, Value> {
    value.as_object().unwrap().clone()
}

fn linked_ids(engine: &UserDataEngine, src_type: &str, src_id: &str, dst_type: &str) -> Vec<String> {
    engine
        .list_links(src_type, src_id, dst_type, &HashMap::new())
        .unwrap()["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["__id"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// N:N Ceiling Tests
// =============================================================================

/// The Mth link lands, the (M+1)th is rejected, approached from one anchor.
#[test]
fn test_nn_ceiling_forward() {
    let engine = setup_engine(EngineConfig::default().with_nn_link_max(3));
    declare(&engine, Multiplicity::Many, Multiplicity::Many);
    create(&engine, "A", "a1");
    for i in 0..4 {
        create(&engine, "B", &format!("b{i}"));
    }

    for i in 0..3 {
        engine.create_link("A", "a1", "B", &format!("b{i}")).unwrap();
    }
    let err = engine.create_link("A", "a1", "B", "b3").unwrap_err();
    assert_eq!(err.code(), "LINK_UPPER_LIMIT_EXCEEDED");
    assert_eq!(linked_ids(&engine, "A", "a1", "B").len(), 3);
}

/// The ceiling also holds when the insert arrives from the other side.
#[test]
fn test_nn_ceiling_backward() {
    let engine = setup_engine(EngineConfig::default().with_nn_link_max(3));
    declare(&engine, Multiplicity::Many, Multiplicity::Many);
    create(&engine, "B", "b1");
    for i in 0..4 {
        create(&engine, "A", &format!("a{i}"));
    }

    for i in 0..3 {
        engine.create_link("A", &format!("a{i}"), "B", "b1").unwrap();
    }
    // b1 is full; inserting from the A side still counts b1's links
    let err = engine.create_link("A", "a3", "B", "b1").unwrap_err();
    assert_eq!(err.code(), "LINK_UPPER_LIMIT_EXCEEDED");
    assert_eq!(linked_ids(&engine, "B", "b1", "A").len(), 3);
    // a3 gained nothing from the failed attempt
    assert!(linked_ids(&engine, "A", "a3", "B").is_empty());
}

// =============================================================================
// Single-Valued End Tests
// =============================================================================

/// A ZeroOne anchor rejects a second direct link until the first is removed.
#[test]
fn test_single_valued_reject_then_relink() {
    let engine = setup_engine(EngineConfig::default());
    // A's end is ZeroOne, so each B holds at most one A
    declare(&engine, Multiplicity::ZeroOne, Multiplicity::Many);
    create(&engine, "A", "a1");
    create(&engine, "A", "a2");
    create(&engine, "B", "b1");

    engine.create_link("A", "a1", "B", "b1").unwrap();
    let err = engine.create_link("A", "a2", "B", "b1").unwrap_err();
    assert_eq!(err.code(), "LINK_CONFLICT");

    engine.delete_link("A", "a1", "B", "b1").unwrap();
    engine.create_link("A", "a2", "B", "b1").unwrap();
    assert_eq!(linked_ids(&engine, "B", "b1", "A"), vec!["a2".to_string()]);
}

/// Creating through the navigation property replaces a single-valued link.
#[test]
fn test_navigation_property_create_replaces() {
    let engine = setup_engine(EngineConfig::default());
    // B's end is ZeroOne, so each A holds at most one B
    declare(&engine, Multiplicity::Many, Multiplicity::ZeroOne);
    create(&engine, "A", "a1");

    engine
        .create_via_link("A", "a1", "B", body(json!({"__id": "b1"})))
        .unwrap();
    engine
        .create_via_link("A", "a1", "B", body(json!({"__id": "b2"})))
        .unwrap();

    assert_eq!(linked_ids(&engine, "A", "a1", "B"), vec!["b2".to_string()]);
    // b1 still exists but is no longer linked
    engine.retrieve("B", "b1", None).unwrap();
    assert!(linked_ids(&engine, "B", "b1", "A").is_empty());
}

/// A failed navigation-property create leaves no orphan record behind.
#[test]
fn test_navigation_property_create_is_atomic() {
    let engine = setup_engine(EngineConfig::default().with_nn_link_max(1));
    declare(&engine, Multiplicity::Many, Multiplicity::Many);
    create(&engine, "A", "a1");

    engine
        .create_via_link("A", "a1", "B", body(json!({"__id": "b1"})))
        .unwrap();
    let err = engine
        .create_via_link("A", "a1", "B", body(json!({"__id": "b2"})))
        .unwrap_err();
    assert_eq!(err.code(), "LINK_UPPER_LIMIT_EXCEEDED");

    // b2 was never persisted
    let err = engine.retrieve("B", "b2", None).unwrap_err();
    assert_eq!(err.status_code(), 404);
}

/// A navigation-property create rejected at the ceiling keeps its inferred
/// keys out of the schema.
#[test]
fn test_rejected_link_create_registers_no_inference() {
    let engine = setup_engine(EngineConfig::default().with_nn_link_max(1));
    declare(&engine, Multiplicity::Many, Multiplicity::Many);
    create(&engine, "A", "a1");
    engine
        .create_via_link("A", "a1", "B", body(json!({"__id": "b1"})))
        .unwrap();

    let err = engine
        .create_via_link("A", "a1", "B", body(json!({"__id": "b2", "flag": true})))
        .unwrap_err();
    assert_eq!(err.code(), "LINK_UPPER_LIMIT_EXCEEDED");

    // flag was never learned as Boolean
    engine
        .create("B", body(json!({"__id": "b3", "flag": 9})))
        .unwrap();
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

/// Deleting an instance removes every link touching it, both directions.
#[test]
fn test_delete_cascades_links() {
    let engine = setup_engine(EngineConfig::default());
    declare(&engine, Multiplicity::Many, Multiplicity::Many);
    create(&engine, "A", "a1");
    create(&engine, "B", "b1");
    create(&engine, "B", "b2");
    engine.create_link("A", "a1", "B", "b1").unwrap();
    engine.create_link("A", "a1", "B", "b2").unwrap();

    engine.delete("A", "a1", None).unwrap();

    assert!(linked_ids(&engine, "B", "b1", "A").is_empty());
    assert!(linked_ids(&engine, "B", "b2", "A").is_empty());
}

/// Links require a declared association and existing instances.
#[test]
fn test_link_preconditions() {
    let engine = setup_engine(EngineConfig::default());
    create(&engine, "A", "a1");
    create(&engine, "B", "b1");

    // No association declared yet
    let err = engine.create_link("A", "a1", "B", "b1").unwrap_err();
    assert_eq!(err.status_code(), 404);

    declare(&engine, Multiplicity::Many, Multiplicity::Many);
    let err = engine.create_link("A", "a1", "B", "ghost").unwrap_err();
    assert_eq!(err.status_code(), 404);

    engine.create_link("A", "a1", "B", "b1").unwrap();
}

/// Undeclaring a relationship is blocked while instance links remain.
#[test]
fn test_unlink_association_blocked_by_instance_links() {
    let engine = setup_engine(EngineConfig::default());
    declare(&engine, Multiplicity::Many, Multiplicity::Many);
    create(&engine, "A", "a1");
    create(&engine, "B", "b1");
    engine.create_link("A", "a1", "B", "b1").unwrap();

    let err = engine
        .unlink_association_ends(("A", "to-b"), ("B", "to-a"))
        .unwrap_err();
    assert_eq!(err.code(), "SCHEMA_DELETE_CONFLICT");

    engine.delete_link("A", "a1", "B", "b1").unwrap();
    engine
        .unlink_association_ends(("A", "to-b"), ("B", "to-a"))
        .unwrap();
}
