//! User data records
//!
//! A record is one instance of an entity type: an id unique per type, the
//! property map, and the `{version, published, updated}` metadata block the
//! concurrency controller works from.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::etag::Etag;

/// Per-instance metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Monotonic counter, 1 on create, +1 per successful update
    pub version: u64,
    /// Millisecond timestamp of creation
    pub published: i64,
    /// Millisecond timestamp of the last successful write
    pub updated: i64,
}

impl Metadata {
    /// Metadata for a freshly created record
    pub fn created_now() -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            version: 1,
            published: now,
            updated: now,
        }
    }

    /// Bump the version and refresh the update timestamp.
    ///
    /// The clock may not tick between two writes in the same millisecond;
    /// the version still increments, keeping the validator unique.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated = Utc::now().timestamp_millis();
    }

    /// The weak validator for this metadata
    pub fn etag(&self) -> Etag {
        Etag::new(self.version, self.updated)
    }
}

/// One stored instance of an entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    /// Owning entity type name
    pub entity_type: String,
    /// Instance id, unique per entity type
    pub id: String,
    /// Property values
    pub properties: Map<String, Value>,
    /// Version/timestamp metadata
    pub metadata: Metadata,
}

impl UserData {
    /// Create a record with fresh metadata
    pub fn new(
        entity_type: impl Into<String>,
        id: impl Into<String>,
        properties: Map<String, Value>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            properties,
            metadata: Metadata::created_now(),
        }
    }

    /// The weak validator for this record
    pub fn etag(&self) -> Etag {
        self.metadata.etag()
    }
}
