//! Link manager error types

use thiserror::Error;

use crate::schema::SchemaError;
use crate::store::StoreError;

/// Result type for link operations
pub type LinkResult<T> = Result<T, LinkError>;

/// Errors surfaced by the link manager
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    /// No association end link declared between the two entity types
    #[error("no association declared between '{0}' and '{1}'")]
    AssociationNotFound(String, String),

    /// Source or target instance missing
    #[error("{entity_type}('{id}') not found")]
    EntityNotFound { entity_type: String, id: String },

    /// N:N per-anchor ceiling reached
    #[error("link upper limit ({max}) exceeded")]
    UpperLimitExceeded { max: usize },

    /// Single-valued anchor already linked
    #[error("{entity_type}('{id}') is already linked to a {target_type}")]
    AlreadyLinked {
        entity_type: String,
        id: String,
        target_type: String,
    },

    /// The requested link does not exist
    #[error("link not found")]
    LinkNotFound,

    /// Schema-level failure while resolving the association
    #[error(transparent)]
    Schema(SchemaError),

    /// Unexpected store failure
    #[error(transparent)]
    Store(StoreError),
}

impl LinkError {
    /// Stable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::AssociationNotFound(_, _) | Self::LinkNotFound => "LINK_NOT_FOUND",
            Self::EntityNotFound { .. } => "ENTITY_NOT_FOUND",
            Self::UpperLimitExceeded { .. } => "LINK_UPPER_LIMIT_EXCEEDED",
            Self::AlreadyLinked { .. } => "LINK_CONFLICT",
            Self::Schema(e) => e.code(),
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

impl From<SchemaError> for LinkError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::AssociationNotFound(a, b) => Self::AssociationNotFound(a, b),
            other => Self::Schema(other),
        }
    }
}

impl From<StoreError> for LinkError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LinkLimitExceeded { max } => Self::UpperLimitExceeded { max },
            StoreError::AlreadyLinked {
                entity_type,
                id,
                target_type,
            } => Self::AlreadyLinked {
                entity_type,
                id,
                target_type,
            },
            StoreError::EntityNotFound { entity_type, id } => {
                Self::EntityNotFound { entity_type, id }
            }
            StoreError::LinkNotFound { .. } => Self::LinkNotFound,
            other => Self::Store(other),
        }
    }
}
