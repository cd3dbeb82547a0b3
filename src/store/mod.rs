//! Entity store collaborator interface
//!
//! The engine operates against [`EntityStore`]: durable keyed storage with
//! conditional writes, insertion-order listing, a symmetric link table and a
//! transactional create+link command. [`MemoryStore`] is the reference
//! implementation; a persistent backend plugs in behind the same trait.

pub mod errors;
pub mod memory;
pub mod record;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use record::{Metadata, UserData};

/// Cardinality bound for one direction of a link insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkBound {
    /// At most one link; `replace` selects set-vs-reject when one exists
    Single { replace: bool },
    /// Unbounded direction of a mixed-multiplicity association
    Unbounded,
    /// N:N direction capped at the configured ceiling
    Capped(usize),
}

/// A link insert command.
///
/// `forward` bounds the count from `(src_type, src_id)` toward `dst_type`;
/// `backward` bounds the count from `(dst_type, dst_id)` toward `src_type`.
/// The store checks both bounds and persists the symmetric pair under one
/// critical section, so concurrent inserts cannot jointly exceed a bound.
#[derive(Debug, Clone)]
pub struct LinkSpec {
    pub src_type: String,
    pub src_id: String,
    pub dst_type: String,
    pub dst_id: String,
    pub forward: LinkBound,
    pub backward: LinkBound,
}

/// Durable keyed storage the engine operates on
pub trait EntityStore: Send + Sync {
    /// Insert a new record; fails if the id is taken
    fn insert(&self, record: UserData) -> StoreResult<()>;

    /// Fetch a record by id
    fn get(&self, entity_type: &str, id: &str) -> StoreResult<UserData>;

    /// Replace a record, conditional on the stored version
    fn replace(&self, record: UserData, expected_version: u64) -> StoreResult<()>;

    /// Delete a record and cascade-delete every link touching it.
    ///
    /// With `expected_version` set the delete is conditional on the stored
    /// version, closing the gap between a validator check and the removal.
    fn delete(&self, entity_type: &str, id: &str, expected_version: Option<u64>)
        -> StoreResult<()>;

    /// All records of a type in insertion order
    fn list(&self, entity_type: &str) -> Vec<UserData>;

    /// Number of stored instances of a type
    fn count(&self, entity_type: &str) -> usize;

    /// Insert a symmetric link, enforcing both bounds atomically
    fn insert_link(&self, spec: &LinkSpec) -> StoreResult<()>;

    /// Insert a record and a link touching it as one atomic command.
    ///
    /// Either both persist or neither does; a bound violation must not
    /// leave the record behind.
    fn insert_with_link(&self, record: UserData, spec: &LinkSpec) -> StoreResult<()>;

    /// Remove a symmetric link pair
    fn delete_link(
        &self,
        src_type: &str,
        src_id: &str,
        dst_type: &str,
        dst_id: &str,
    ) -> StoreResult<()>;

    /// Target ids linked from an anchor toward a type, in insertion order
    fn list_links(&self, entity_type: &str, id: &str, target_type: &str) -> Vec<String>;

    /// Total links between two entity types, counted from the `type_a` side
    fn count_links_between(&self, type_a: &str, type_b: &str) -> usize;
}
