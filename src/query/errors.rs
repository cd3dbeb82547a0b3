//! Query engine error types

use thiserror::Error;

/// Result type for query parsing and execution
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors surfaced while parsing or validating query options
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Malformed literal, e.g. a non-numeric `$top`
    #[error("could not parse query option {param}={value}")]
    Parse { param: String, value: String },

    /// Syntactically valid but out of range
    #[error("invalid value for query option {param}={value}")]
    Invalid { param: String, value: String },

    /// A property name unknown on the entity type
    #[error("unknown query key '{0}'")]
    UnknownKey(String),

    /// More expand targets than the configured cap
    #[error("expand count {count} exceeds the limit of {max}")]
    ExpandLimitExceeded { count: usize, max: usize },
}

impl QueryError {
    pub fn parse(param: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Parse {
            param: param.into(),
            value: value.into(),
        }
    }

    pub fn invalid(param: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Invalid {
            param: param.into(),
            value: value.into(),
        }
    }

    /// Stable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "QUERY_PARSE_ERROR",
            Self::Invalid { .. } => "QUERY_INVALID_ERROR",
            Self::UnknownKey(_) => "UNKNOWN_QUERY_KEY",
            Self::ExpandLimitExceeded { .. } => "EXPAND_COUNT_LIMITATION_EXCEEDED",
        }
    }
}
