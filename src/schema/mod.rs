//! Schema registry: entity types, properties, complex types and
//! association ends
//!
//! Properties are either declared explicitly or inferred from the first
//! write of an unseen key; both resolve through
//! [`SchemaRegistry::resolve_property`]. Deletions run explicit dependency
//! checks and fail while dependents exist.

pub mod errors;
pub mod inference;
pub mod registry;
pub mod types;

pub use errors::{SchemaError, SchemaResult};
pub use registry::{PendingInference, SchemaRegistry};
pub use types::{
    AssociationEnd, AssociationEndLink, CollectionKind, ComplexType, EntityType, InferredType,
    Multiplicity, PropertyDef, PropertySource, PropertyType, SimpleType,
};
