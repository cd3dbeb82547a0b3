//! Schema error types
//!
//! Every error carries a stable code for the transport layer and a message
//! naming the offending schema element.

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema registry errors
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// Entity type name already registered
    #[error("EntityType '{0}' already exists")]
    EntityTypeExists(String),

    /// Entity type not registered
    #[error("EntityType '{0}' not found")]
    EntityTypeNotFound(String),

    /// Property name already declared on the entity type
    #[error("Property '{1}' already exists on EntityType '{0}'")]
    PropertyExists(String, String),

    /// Property not declared on the entity type
    #[error("Property '{1}' not found on EntityType '{0}'")]
    PropertyNotFound(String, String),

    /// Complex type name already registered
    #[error("ComplexType '{0}' already exists")]
    ComplexTypeExists(String),

    /// Complex type not registered
    #[error("ComplexType '{0}' not found")]
    ComplexTypeNotFound(String),

    /// Association end already registered for (entity type, name)
    #[error("AssociationEnd '{1}' already exists on EntityType '{0}'")]
    AssociationEndExists(String, String),

    /// Association end not registered for (entity type, name)
    #[error("AssociationEnd '{1}' not found on EntityType '{0}'")]
    AssociationEndNotFound(String, String),

    /// No association end link declared between the two entity types
    #[error("no association declared between '{0}' and '{1}'")]
    AssociationNotFound(String, String),

    /// The two ends are already linked
    #[error("AssociationEnds '{0}' and '{1}' are already linked")]
    AssociationAlreadyLinked(String, String),

    /// A value does not fit the declared or inferred property type
    #[error("property '{property}': expected {expected}, got {actual}")]
    TypeMismatch {
        property: String,
        expected: String,
        actual: String,
    },

    /// Null written to a non-nullable property
    #[error("property '{0}' is not nullable")]
    NullNotAllowed(String),

    /// Complex value nesting exceeds the supported depth
    #[error("property '{0}' exceeds the maximum complex nesting depth")]
    NestingTooDeep(String),

    /// A property type change would not preserve stored values
    #[error("cannot change property '{property}' from {from} to {to}")]
    InvalidTypeChange {
        property: String,
        from: String,
        to: String,
    },

    /// Deletion blocked by dependents (instances, properties, ends or links)
    #[error("cannot delete {kind} '{name}': {dependents} still reference it")]
    DeleteConflict {
        kind: &'static str,
        name: String,
        dependents: &'static str,
    },
}

impl SchemaError {
    /// Stable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::EntityTypeExists(_)
            | Self::PropertyExists(_, _)
            | Self::ComplexTypeExists(_)
            | Self::AssociationEndExists(_, _)
            | Self::AssociationAlreadyLinked(_, _) => "SCHEMA_CONFLICT",
            Self::EntityTypeNotFound(_)
            | Self::PropertyNotFound(_, _)
            | Self::ComplexTypeNotFound(_)
            | Self::AssociationEndNotFound(_, _)
            | Self::AssociationNotFound(_, _) => "SCHEMA_NOT_FOUND",
            Self::TypeMismatch { .. } | Self::NullNotAllowed(_) | Self::NestingTooDeep(_) => {
                "SCHEMA_TYPE_ERROR"
            }
            Self::InvalidTypeChange { .. } => "SCHEMA_INVALID_TYPE_CHANGE",
            Self::DeleteConflict { .. } => "SCHEMA_DELETE_CONFLICT",
        }
    }
}
