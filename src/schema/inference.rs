//! Property value validation and dynamic type inference
//!
//! Declared properties validate strictly against their registered type.
//! Unseen keys infer a type from the runtime JSON value: integer, floating
//! point, boolean or string. Null commits no type. A numeric property
//! inferred as Int32 widens to Double when a later write carries a float;
//! a non-numeric write to a numeric property is rejected.

use serde_json::Value;

use super::errors::{SchemaError, SchemaResult};
use super::types::{CollectionKind, ComplexType, InferredType, PropertyDef, PropertyType, SimpleType};

/// Maximum nesting depth for complex values
pub const MAX_COMPLEX_DEPTH: usize = 5;

/// JSON runtime type name for error messages
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "Boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "Int32",
        Value::Number(_) => "Double",
        Value::String(_) => "String",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Infer a dynamic property type from a written value.
///
/// Returns `None` for null (no type committed) and an error for structured
/// values, which require a declared property.
pub fn infer_type(property: &str, value: &Value) -> SchemaResult<Option<InferredType>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(_) => Ok(Some(InferredType::Boolean)),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Some(InferredType::Int32)),
        Value::Number(_) => Ok(Some(InferredType::Double)),
        Value::String(_) => Ok(Some(InferredType::String)),
        Value::Array(_) | Value::Object(_) => Err(SchemaError::TypeMismatch {
            property: property.to_string(),
            expected: "a simple value (structured values require a declared Property)".into(),
            actual: value_type_name(value).into(),
        }),
    }
}

/// Check a value against an already inferred type.
///
/// Returns the widened type when an Int32 property observes a float value;
/// `None` when the existing type stands.
pub fn check_inferred(
    property: &str,
    value: &Value,
    inferred: InferredType,
) -> SchemaResult<Option<InferredType>> {
    let mismatch = |expected: &str| SchemaError::TypeMismatch {
        property: property.to_string(),
        expected: expected.into(),
        actual: value_type_name(value).into(),
    };

    match (inferred, value) {
        // null round-trips against any inferred type
        (_, Value::Null) => Ok(None),
        (InferredType::String, Value::String(_)) => Ok(None),
        (InferredType::Boolean, Value::Bool(_)) => Ok(None),
        (InferredType::Int32, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Ok(None)
            } else {
                Ok(Some(InferredType::Double))
            }
        }
        (InferredType::Double, Value::Number(_)) => Ok(None),
        (InferredType::Int32 | InferredType::Double, _) => Err(mismatch("a numeric value")),
        (InferredType::String, _) => Err(mismatch("String")),
        (InferredType::Boolean, _) => Err(mismatch("Boolean")),
    }
}

/// Check a single (non-list) value against a simple type
fn check_simple(property: &str, value: &Value, simple: SimpleType) -> SchemaResult<()> {
    let ok = match simple {
        SimpleType::String => value.is_string(),
        SimpleType::Boolean => value.is_boolean(),
        SimpleType::Int32 => value
            .as_i64()
            .map(|n| i32::try_from(n).is_ok())
            .unwrap_or(false),
        SimpleType::Single | SimpleType::Double => value.is_number(),
        // millisecond timestamps arrive as integers
        SimpleType::DateTime => value.is_i64() || value.is_u64(),
    };
    if ok {
        Ok(())
    } else {
        Err(SchemaError::TypeMismatch {
            property: property.to_string(),
            expected: simple.type_name().into(),
            actual: value_type_name(value).into(),
        })
    }
}

/// Lookup seam for complex type resolution during validation
pub trait ComplexTypeLookup {
    fn complex_type(&self, name: &str) -> Option<&ComplexType>;
}

/// Check a value against a declared property definition.
///
/// Walks complex values recursively up to [`MAX_COMPLEX_DEPTH`]; unknown keys
/// inside a complex value are rejected.
pub fn check_declared(
    lookup: &dyn ComplexTypeLookup,
    def: &PropertyDef,
    value: &Value,
) -> SchemaResult<()> {
    check_declared_at(lookup, def, value, 0)
}

fn check_declared_at(
    lookup: &dyn ComplexTypeLookup,
    def: &PropertyDef,
    value: &Value,
    depth: usize,
) -> SchemaResult<()> {
    if value.is_null() {
        return if def.nullable {
            Ok(())
        } else {
            Err(SchemaError::NullNotAllowed(def.name.clone()))
        };
    }

    match def.collection_kind {
        CollectionKind::None => check_element(lookup, def, value, depth),
        CollectionKind::List => {
            let items = value.as_array().ok_or_else(|| SchemaError::TypeMismatch {
                property: def.name.clone(),
                expected: format!("list of {}", def.property_type.type_name()),
                actual: value_type_name(value).into(),
            })?;
            for item in items {
                check_element(lookup, def, item, depth)?;
            }
            Ok(())
        }
    }
}

fn check_element(
    lookup: &dyn ComplexTypeLookup,
    def: &PropertyDef,
    value: &Value,
    depth: usize,
) -> SchemaResult<()> {
    match &def.property_type {
        PropertyType::Simple(simple) => check_simple(&def.name, value, *simple),
        PropertyType::Complex(name) => {
            if depth >= MAX_COMPLEX_DEPTH {
                return Err(SchemaError::NestingTooDeep(def.name.clone()));
            }
            let complex = lookup
                .complex_type(name)
                .ok_or_else(|| SchemaError::ComplexTypeNotFound(name.clone()))?;
            let object = value.as_object().ok_or_else(|| SchemaError::TypeMismatch {
                property: def.name.clone(),
                expected: name.clone(),
                actual: value_type_name(value).into(),
            })?;
            for (key, nested) in object {
                let nested_def = complex
                    .properties
                    .get(key)
                    .ok_or_else(|| SchemaError::PropertyNotFound(name.clone(), key.clone()))?;
                check_declared_at(lookup, nested_def, nested, depth + 1)?;
            }
            // absent nested keys are treated as null
            for (key, nested_def) in &complex.properties {
                if !object.contains_key(key) && !nested_def.nullable {
                    return Err(SchemaError::NullNotAllowed(key.clone()));
                }
            }
            Ok(())
        }
    }
}
