//! Schema type definitions
//!
//! Entity types carry two kinds of properties:
//! - declared: registered explicitly with a type, collection kind and
//!   nullability
//! - inferred: learned from the first write of an unseen key, tracked by
//!   runtime type only
//!
//! Association ends are multiplicity-tagged roles; two ends joined by an
//! [`AssociationEndLink`] declare a bidirectional relationship.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Simple property types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SimpleType {
    /// UTF-8 string
    String,
    /// 32-bit signed integer
    Int32,
    /// 32-bit floating point
    Single,
    /// 64-bit floating point
    Double,
    /// Boolean
    Boolean,
    /// Millisecond timestamp
    DateTime,
}

impl SimpleType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            SimpleType::String => "String",
            SimpleType::Int32 => "Int32",
            SimpleType::Single => "Single",
            SimpleType::Double => "Double",
            SimpleType::Boolean => "Boolean",
            SimpleType::DateTime => "DateTime",
        }
    }

    /// Whether this is a numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SimpleType::Int32 | SimpleType::Single | SimpleType::Double
        )
    }

    /// Whether a value of `self` is representable in `target` without loss.
    ///
    /// Int32 widens to Single/Double; everything else must match exactly.
    pub fn widens_to(&self, target: SimpleType) -> bool {
        if *self == target {
            return true;
        }
        matches!(
            (self, target),
            (SimpleType::Int32, SimpleType::Single)
                | (SimpleType::Int32, SimpleType::Double)
                | (SimpleType::Single, SimpleType::Double)
        )
    }
}

/// Declared property type: a simple type or a named complex type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyType {
    /// One of the fixed simple types
    Simple(SimpleType),
    /// Reference to a registered complex type by name
    Complex(String),
}

impl PropertyType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &str {
        match self {
            PropertyType::Simple(s) => s.type_name(),
            PropertyType::Complex(name) => name,
        }
    }
}

/// Cardinality of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionKind {
    /// Single value
    None,
    /// Homogeneous list
    List,
}

/// A declared property on an entity type or complex type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Property name
    pub name: String,
    /// Declared type
    pub property_type: PropertyType,
    /// Single value or list
    pub collection_kind: CollectionKind,
    /// Whether null is accepted
    pub nullable: bool,
}

impl PropertyDef {
    /// Create a single-valued nullable property of a simple type
    pub fn simple(name: impl Into<String>, simple: SimpleType) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Simple(simple),
            collection_kind: CollectionKind::None,
            nullable: true,
        }
    }

    /// Create a single-valued property referencing a complex type
    pub fn complex(name: impl Into<String>, complex_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Complex(complex_type.into()),
            collection_kind: CollectionKind::None,
            nullable: true,
        }
    }

    /// Mark the property as a list
    pub fn as_list(mut self) -> Self {
        self.collection_kind = CollectionKind::List;
        self
    }

    /// Mark the property as non-nullable
    pub fn not_nullable(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Runtime type learned for a dynamic (inferred) property.
///
/// Null never commits a type; the property stays untyped until a non-null
/// value arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferredType {
    String,
    Int32,
    Double,
    Boolean,
}

impl InferredType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            InferredType::String => "String",
            InferredType::Int32 => "Int32",
            InferredType::Double => "Double",
            InferredType::Boolean => "Boolean",
        }
    }

    /// Whether this is a numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(self, InferredType::Int32 | InferredType::Double)
    }
}

/// Where a property resolution came from.
///
/// The query engine and store treat both sources uniformly through
/// [`crate::schema::SchemaRegistry::resolve_property`].
#[derive(Debug, Clone, PartialEq)]
pub enum PropertySource {
    /// Explicitly registered
    Declared(PropertyDef),
    /// Learned from a write
    Inferred(InferredType),
}

/// An entity type: a named schema for user data instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    /// Unique name within the collection
    pub name: String,
    /// Declared properties by name
    pub declared: HashMap<String, PropertyDef>,
    /// Inferred (dynamic) properties by name
    pub inferred: HashMap<String, InferredType>,
}

impl EntityType {
    /// Create an empty entity type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared: HashMap::new(),
            inferred: HashMap::new(),
        }
    }
}

/// A reusable nested structured type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexType {
    /// Unique name within the collection
    pub name: String,
    /// Properties by name; may reference further complex types
    pub properties: HashMap<String, PropertyDef>,
}

impl ComplexType {
    /// Create an empty complex type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }
}

/// How many links an anchor may hold toward the owning end's entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Multiplicity {
    /// Zero or one
    ZeroOne,
    /// Exactly one
    One,
    /// Unbounded, capped by the configured N:N ceiling when both sides are Many
    Many,
}

impl Multiplicity {
    /// Whether an anchor may hold at most one link toward this end
    pub fn single_valued(&self) -> bool {
        matches!(self, Multiplicity::ZeroOne | Multiplicity::One)
    }
}

/// A named, multiplicity-tagged role an entity type plays in a relationship.
///
/// Keyed by `(entity_type, name)`: the same name may be reused by one entity
/// type for ends pointing at two different targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationEnd {
    /// Owning entity type
    pub entity_type: String,
    /// End name
    pub name: String,
    /// Link cardinality seen from the opposite side
    pub multiplicity: Multiplicity,
}

impl AssociationEnd {
    pub fn new(
        entity_type: impl Into<String>,
        name: impl Into<String>,
        multiplicity: Multiplicity,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            name: name.into(),
            multiplicity,
        }
    }

    /// Registry key for this end
    pub fn key(&self) -> (String, String) {
        (self.entity_type.clone(), self.name.clone())
    }
}

/// A declared relationship: two association ends joined together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationEndLink {
    pub end_a: AssociationEnd,
    pub end_b: AssociationEnd,
}

impl AssociationEndLink {
    /// Whether this link relates the given pair of entity types, either way
    pub fn relates(&self, type_a: &str, type_b: &str) -> bool {
        (self.end_a.entity_type == type_a && self.end_b.entity_type == type_b)
            || (self.end_a.entity_type == type_b && self.end_b.entity_type == type_a)
    }

    /// The end owned by the given entity type, if any
    pub fn end_of(&self, entity_type: &str) -> Option<&AssociationEnd> {
        if self.end_a.entity_type == entity_type {
            Some(&self.end_a)
        } else if self.end_b.entity_type == entity_type {
            Some(&self.end_b)
        } else {
            None
        }
    }

    /// The end opposite the given entity type, if any
    pub fn opposite_of(&self, entity_type: &str) -> Option<&AssociationEnd> {
        if self.end_a.entity_type == entity_type {
            Some(&self.end_b)
        } else if self.end_b.entity_type == entity_type {
            Some(&self.end_a)
        } else {
            None
        }
    }
}
