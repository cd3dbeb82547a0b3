//! Engine-level error aggregation
//!
//! Every module error funnels into [`EngineError`], which carries a stable
//! machine code and an HTTP-shaped status for the transport layer sitting
//! above the engine.

use thiserror::Error;

use crate::etag::PreconditionFailed;
use crate::links::LinkError;
use crate::query::QueryError;
use crate::schema::SchemaError;
use crate::store::StoreError;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the user data engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    PreconditionFailed(#[from] PreconditionFailed),

    /// A key path segment that is not a single-quoted id
    #[error("could not parse entity key '{0}'")]
    EntityKeyParse(String),

    /// Reported by the access-control collaborator sitting above the engine
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl EngineError {
    /// Stable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Schema(e) => e.code(),
            Self::Store(e) => match e {
                StoreError::EntityNotFound { .. } => "ENTITY_NOT_FOUND",
                StoreError::EntityExists { .. } => "ENTITY_CONFLICT",
                StoreError::VersionConflict { .. } => "VERSION_CONFLICT",
                StoreError::LinkLimitExceeded { .. } => "LINK_UPPER_LIMIT_EXCEEDED",
                StoreError::AlreadyLinked { .. } => "LINK_CONFLICT",
                StoreError::LinkNotFound { .. } => "LINK_NOT_FOUND",
            },
            Self::Link(e) => e.code(),
            Self::Query(e) => e.code(),
            Self::PreconditionFailed(_) => "ETAG_NOT_MATCH",
            Self::EntityKeyParse(_) => "ENTITY_KEY_PARSE_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
        }
    }

    /// HTTP status the transport layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Schema(e) => match e {
                SchemaError::EntityTypeNotFound(_)
                | SchemaError::PropertyNotFound(_, _)
                | SchemaError::ComplexTypeNotFound(_)
                | SchemaError::AssociationEndNotFound(_, _)
                | SchemaError::AssociationNotFound(_, _) => 404,
                SchemaError::EntityTypeExists(_)
                | SchemaError::PropertyExists(_, _)
                | SchemaError::ComplexTypeExists(_)
                | SchemaError::AssociationEndExists(_, _)
                | SchemaError::AssociationAlreadyLinked(_, _)
                | SchemaError::DeleteConflict { .. } => 409,
                _ => 400,
            },
            Self::Store(e) => match e {
                StoreError::EntityNotFound { .. } | StoreError::LinkNotFound { .. } => 404,
                StoreError::EntityExists { .. }
                | StoreError::VersionConflict { .. }
                | StoreError::AlreadyLinked { .. } => 409,
                StoreError::LinkLimitExceeded { .. } => 400,
            },
            Self::Link(e) => match e {
                LinkError::AssociationNotFound(_, _)
                | LinkError::LinkNotFound
                | LinkError::EntityNotFound { .. } => 404,
                LinkError::AlreadyLinked { .. } => 409,
                LinkError::UpperLimitExceeded { .. } => 400,
                LinkError::Schema(_) | LinkError::Store(_) => 400,
            },
            Self::Query(_) | Self::EntityKeyParse(_) => 400,
            Self::PreconditionFailed(_) => 412,
            Self::Unauthorized(_) => 401,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let err = EngineError::from(StoreError::entity_not_found("Account", "a1"));
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.code(), "ENTITY_NOT_FOUND");

        let err = EngineError::from(PreconditionFailed);
        assert_eq!(err.status_code(), 412);
        assert_eq!(err.code(), "ETAG_NOT_MATCH");

        let err = EngineError::from(QueryError::invalid("$top", "-1"));
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.code(), "QUERY_INVALID_ERROR");

        let err = EngineError::EntityKeyParse("bad".into());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.code(), "ENTITY_KEY_PARSE_ERROR");

        let err = EngineError::Unauthorized("token expired".into());
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.code(), "UNAUTHORIZED");
    }
}
