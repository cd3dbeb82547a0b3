//! NimbusDB: a multi-tenant dynamic entity and relationship engine
//!
//! Entity types carry declared and dynamically inferred properties,
//! relationships are declared as multiplicity-tagged association ends, and
//! lists answer an OData-style option set (`$top`, `$skip`, `$filter`,
//! `$orderby`, `$expand`, `$inlinecount`). Writes are guarded by weak ETag
//! optimistic concurrency. Storage sits behind the [`store::EntityStore`]
//! trait; [`store::MemoryStore`] is the reference backend.
//!
//! [`engine::UserDataEngine`] is the exposed contract a transport layer
//! drives.

pub mod config;
pub mod engine;
pub mod etag;
pub mod links;
pub mod observability;
pub mod query;
pub mod schema;
pub mod store;

pub use config::EngineConfig;
pub use engine::{EngineError, EngineResult, UserDataEngine};
