//! Schema Lifecycle Tests
//!
//! Schema administration through the engine:
//! - Deletions are blocked while dependents exist
//! - Declared property type changes revalidate stored values
//! - Dynamic properties are inferred on first write and widen Int32 to
//!   Double, never the reverse

use std::sync::Arc;

use nimbusdb::engine::UserDataEngine;
use nimbusdb::schema::{AssociationEnd, Multiplicity, PropertyDef, SimpleType};
use nimbusdb::store::MemoryStore;
use nimbusdb::EngineConfig;
use serde_json::{json, Map, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_engine() -> UserDataEngine {
    UserDataEngine::new(EngineConfig::default(), Arc::new(MemoryStore::new()))
}

fn body(value: Value) -> Map<String, Value> {
    value.as_object().unwrap().clone()
}

// =============================================================================
// Dependency-Blocked Deletion Tests
// =============================================================================

/// An entity type cannot be deleted while instances, declared properties or
/// association ends reference it.
#[test]
fn test_entity_type_delete_blocked_by_dependents() {
    let engine = setup_engine();
    engine.create_entity_type("Account").unwrap();
    engine
        .create_property("Account", PropertyDef::simple("name", SimpleType::String))
        .unwrap();
    let created = engine
        .create("Account", body(json!({"__id": "a1", "name": "x"})))
        .unwrap();
    let etag = created["__metadata"]["etag"].as_str().unwrap().to_string();

    let err = engine.delete_entity_type("Account").unwrap_err();
    assert_eq!(err.code(), "SCHEMA_DELETE_CONFLICT");
    assert_eq!(err.status_code(), 409);

    engine.delete("Account", "a1", Some(&etag)).unwrap();
    // Still blocked: the declared property remains
    let err = engine.delete_entity_type("Account").unwrap_err();
    assert_eq!(err.code(), "SCHEMA_DELETE_CONFLICT");

    engine.delete_property("Account", "name").unwrap();
    engine.delete_entity_type("Account").unwrap();
}

/// A declared property cannot be deleted while instances hold a value.
#[test]
fn test_property_delete_blocked_by_holders() {
    let engine = setup_engine();
    engine.create_entity_type("Account").unwrap();
    engine
        .create_property("Account", PropertyDef::simple("rank", SimpleType::Int32))
        .unwrap();
    engine
        .create("Account", body(json!({"__id": "a1", "rank": 1})))
        .unwrap();

    let err = engine.delete_property("Account", "rank").unwrap_err();
    assert_eq!(err.code(), "SCHEMA_DELETE_CONFLICT");

    // Records without the value do not block
    engine
        .update("Account", "a1", None, body(json!({})))
        .unwrap();
    engine.delete_property("Account", "rank").unwrap();
}

/// A complex type cannot be deleted while a property references it.
#[test]
fn test_complex_type_delete_blocked_by_reference() {
    let engine = setup_engine();
    engine.create_entity_type("Account").unwrap();
    engine.create_complex_type("Address").unwrap();
    engine
        .create_complex_type_property("Address", PropertyDef::simple("city", SimpleType::String))
        .unwrap();
    engine
        .create_property("Account", PropertyDef::complex("home", "Address"))
        .unwrap();

    let err = engine.delete_complex_type("Address").unwrap_err();
    assert_eq!(err.code(), "SCHEMA_DELETE_CONFLICT");

    engine.delete_property("Account", "home").unwrap();
    engine.delete_complex_type_property("Address", "city").unwrap();
    engine.delete_complex_type("Address").unwrap();
}

/// An association end cannot be deleted while an end link uses it.
#[test]
fn test_association_end_delete_blocked_by_link() {
    let engine = setup_engine();
    engine.create_entity_type("A").unwrap();
    engine.create_entity_type("B").unwrap();
    engine
        .create_association_end(AssociationEnd::new("A", "a-b", Multiplicity::Many))
        .unwrap();
    engine
        .create_association_end(AssociationEnd::new("B", "a-b", Multiplicity::Many))
        .unwrap();
    engine.link_association_ends(("A", "a-b"), ("B", "a-b")).unwrap();

    let err = engine.delete_association_end("A", "a-b").unwrap_err();
    assert_eq!(err.code(), "SCHEMA_DELETE_CONFLICT");

    engine
        .unlink_association_ends(("A", "a-b"), ("B", "a-b"))
        .unwrap();
    engine.delete_association_end("A", "a-b").unwrap();
    engine.delete_association_end("B", "a-b").unwrap();
}

// =============================================================================
// Declared Property Validation Tests
// =============================================================================

/// Writes against a declared simple type are checked exactly.
#[test]
fn test_declared_type_checking() {
    let engine = setup_engine();
    engine.create_entity_type("Account").unwrap();
    engine
        .create_property("Account", PropertyDef::simple("rank", SimpleType::Int32))
        .unwrap();

    engine
        .create("Account", body(json!({"__id": "a1", "rank": 7})))
        .unwrap();

    let err = engine
        .create("Account", body(json!({"__id": "a2", "rank": "seven"})))
        .unwrap_err();
    assert_eq!(err.code(), "SCHEMA_TYPE_ERROR");
    assert_eq!(err.status_code(), 400);

    // The failed write persisted nothing
    let err = engine.retrieve("Account", "a2", None).unwrap_err();
    assert_eq!(err.status_code(), 404);
}

/// Null is rejected on a non-nullable declared property.
#[test]
fn test_non_nullable_rejects_null() {
    let engine = setup_engine();
    engine.create_entity_type("Account").unwrap();
    engine
        .create_property(
            "Account",
            PropertyDef::simple("name", SimpleType::String).not_nullable(),
        )
        .unwrap();

    let err = engine
        .create("Account", body(json!({"__id": "a1", "name": null})))
        .unwrap_err();
    assert_eq!(err.code(), "SCHEMA_TYPE_ERROR");

    engine
        .create("Account", body(json!({"__id": "a1", "name": "x"})))
        .unwrap();
}

/// A type change is accepted only when it widens and every stored value
/// still fits.
#[test]
fn test_property_update_revalidates_stored_values() {
    let engine = setup_engine();
    engine.create_entity_type("Account").unwrap();
    engine
        .create_property("Account", PropertyDef::simple("score", SimpleType::Int32))
        .unwrap();
    engine
        .create("Account", body(json!({"__id": "a1", "score": 10})))
        .unwrap();

    // Narrowing is never allowed
    let err = engine
        .update_property("Account", PropertyDef::simple("score", SimpleType::Boolean))
        .unwrap_err();
    assert_eq!(err.code(), "SCHEMA_INVALID_TYPE_CHANGE");

    // Widening Int32 to Double is, and stored values revalidate
    engine
        .update_property("Account", PropertyDef::simple("score", SimpleType::Double))
        .unwrap();
    engine
        .update("Account", "a1", None, body(json!({"score": 10.5})))
        .unwrap();
}

// =============================================================================
// Dynamic Property Inference Tests
// =============================================================================

/// The first write of an unseen key registers its type; later writes must
/// conform.
#[test]
fn test_inference_locks_type_on_first_write() {
    let engine = setup_engine();
    engine.create_entity_type("Account").unwrap();
    engine
        .create("Account", body(json!({"__id": "a1", "nick": "zed"})))
        .unwrap();

    // nick is now a String on every instance of the type
    let err = engine
        .create("Account", body(json!({"__id": "a2", "nick": 42})))
        .unwrap_err();
    assert_eq!(err.code(), "SCHEMA_TYPE_ERROR");
}

/// An inferred Int32 widens to Double when a float arrives; a widened
/// property accepts both shapes afterwards.
#[test]
fn test_inferred_numeric_widening() {
    let engine = setup_engine();
    engine.create_entity_type("Account").unwrap();
    engine
        .create("Account", body(json!({"__id": "a1", "score": 1})))
        .unwrap();
    engine
        .create("Account", body(json!({"__id": "a2", "score": 2.5})))
        .unwrap();
    engine
        .create("Account", body(json!({"__id": "a3", "score": 3})))
        .unwrap();

    // But a string never fits a numeric property
    let err = engine
        .create("Account", body(json!({"__id": "a4", "score": "high"})))
        .unwrap_err();
    assert_eq!(err.code(), "SCHEMA_TYPE_ERROR");
}

/// A null write commits no inferred type; the first non-null write decides.
#[test]
fn test_null_write_defers_inference() {
    let engine = setup_engine();
    engine.create_entity_type("Account").unwrap();
    engine
        .create("Account", body(json!({"__id": "a1", "later": null})))
        .unwrap();
    // Still undecided, so a boolean is fine
    engine
        .create("Account", body(json!({"__id": "a2", "later": true})))
        .unwrap();
    // Now decided
    let err = engine
        .create("Account", body(json!({"__id": "a3", "later": 9})))
        .unwrap_err();
    assert_eq!(err.code(), "SCHEMA_TYPE_ERROR");
}

/// A failed body registers nothing, even for its valid keys.
#[test]
fn test_failed_write_learns_nothing() {
    let engine = setup_engine();
    engine.create_entity_type("Account").unwrap();
    engine
        .create_property("Account", PropertyDef::simple("rank", SimpleType::Int32))
        .unwrap();

    // rank fails, so fresh must not be learned as Boolean
    engine
        .create(
            "Account",
            body(json!({"__id": "a1", "rank": "bad", "fresh": true})),
        )
        .unwrap_err();

    engine
        .create("Account", body(json!({"__id": "a2", "rank": 1, "fresh": "text"})))
        .unwrap();
}

/// A create the store rejects keeps its inferred keys out of the schema.
#[test]
fn test_rejected_create_registers_no_inference() {
    let engine = setup_engine();
    engine.create_entity_type("Account").unwrap();
    engine.create("Account", body(json!({"__id": "a1"}))).unwrap();

    // duplicate id: validation passes, the insert fails
    let err = engine
        .create("Account", body(json!({"__id": "a1", "fresh": true})))
        .unwrap_err();
    assert_eq!(err.status_code(), 409);

    // fresh was never learned as Boolean
    engine
        .create("Account", body(json!({"__id": "a2", "fresh": 9})))
        .unwrap();
}

/// Inferred properties are queryable like declared ones.
#[test]
fn test_inferred_properties_answer_queries() {
    use std::collections::HashMap;

    let engine = setup_engine();
    engine.create_entity_type("Account").unwrap();
    engine
        .create("Account", body(json!({"__id": "a1", "nick": "zed"})))
        .unwrap();

    let params: HashMap<String, String> =
        [("$filter".to_string(), "nick eq 'zed'".to_string())].into();
    let listed = engine.list("Account", &params).unwrap();
    assert_eq!(listed["results"][0]["__id"], "a1");
}
