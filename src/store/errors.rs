//! Store error types

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by an entity store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No instance with the given id
    #[error("{entity_type}('{id}') not found")]
    EntityNotFound { entity_type: String, id: String },

    /// An instance with the given id already exists
    #[error("{entity_type}('{id}') already exists")]
    EntityExists { entity_type: String, id: String },

    /// Conditional write lost against a concurrent writer
    #[error("{entity_type}('{id}') was modified concurrently")]
    VersionConflict { entity_type: String, id: String },

    /// Per-anchor N:N ceiling reached; nothing was persisted
    #[error("link upper limit ({max}) exceeded")]
    LinkLimitExceeded { max: usize },

    /// A single-valued anchor already holds a link
    #[error("{entity_type}('{id}') is already linked to a {target_type}")]
    AlreadyLinked {
        entity_type: String,
        id: String,
        target_type: String,
    },

    /// The requested link does not exist
    #[error("link between {src_type}('{src_id}') and {dst_type}('{dst_id}') not found")]
    LinkNotFound {
        src_type: String,
        src_id: String,
        dst_type: String,
        dst_id: String,
    },
}

impl StoreError {
    pub fn entity_not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn entity_exists(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::EntityExists {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}
