//! In-memory entity store
//!
//! Reference implementation of [`EntityStore`]: insertion-ordered tables per
//! entity type and a symmetric link table, all behind one `RwLock`. Link
//! bound checks and the create+link command run under the write lock, which
//! serves as the transactional conditional-insert the link manager relies
//! on.

use std::collections::HashMap;
use std::sync::RwLock;

use super::errors::{StoreError, StoreResult};
use super::record::UserData;
use super::{EntityStore, LinkBound, LinkSpec};

/// Rows of one entity type, preserving insertion order
#[derive(Debug, Default)]
struct Table {
    order: Vec<String>,
    rows: HashMap<String, UserData>,
}

impl Table {
    fn insert(&mut self, record: UserData) -> StoreResult<()> {
        if self.rows.contains_key(&record.id) {
            return Err(StoreError::entity_exists(&record.entity_type, &record.id));
        }
        self.order.push(record.id.clone());
        self.rows.insert(record.id.clone(), record);
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Option<UserData> {
        let record = self.rows.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(record)
    }
}

/// Link edges keyed by `(entity_type, id, target_type)`, target ids in
/// insertion order. Every link is stored under both direction keys.
type EdgeKey = (String, String, String);

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, Table>,
    edges: HashMap<EdgeKey, Vec<String>>,
}

impl Inner {
    fn edge_key(entity_type: &str, id: &str, target_type: &str) -> EdgeKey {
        (
            entity_type.to_string(),
            id.to_string(),
            target_type.to_string(),
        )
    }

    fn edge_count(&self, entity_type: &str, id: &str, target_type: &str) -> usize {
        self.edges
            .get(&Self::edge_key(entity_type, id, target_type))
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Check one direction of a link insert against its bound.
    ///
    /// Returns the ids whose existing links must be removed first (the
    /// single-valued replace case).
    fn check_bound(
        &self,
        entity_type: &str,
        id: &str,
        target_type: &str,
        bound: LinkBound,
    ) -> StoreResult<Vec<String>> {
        let existing = self
            .edges
            .get(&Self::edge_key(entity_type, id, target_type))
            .cloned()
            .unwrap_or_default();
        match bound {
            LinkBound::Unbounded => Ok(Vec::new()),
            LinkBound::Capped(max) => {
                if existing.len() >= max {
                    Err(StoreError::LinkLimitExceeded { max })
                } else {
                    Ok(Vec::new())
                }
            }
            LinkBound::Single { replace } => {
                if existing.is_empty() {
                    Ok(Vec::new())
                } else if replace {
                    Ok(existing)
                } else {
                    Err(StoreError::AlreadyLinked {
                        entity_type: entity_type.to_string(),
                        id: id.to_string(),
                        target_type: target_type.to_string(),
                    })
                }
            }
        }
    }

    fn remove_edge(&mut self, src_type: &str, src_id: &str, dst_type: &str, dst_id: &str) -> bool {
        let forward = Self::edge_key(src_type, src_id, dst_type);
        let Some(targets) = self.edges.get_mut(&forward) else {
            return false;
        };
        let Some(pos) = targets.iter().position(|t| t == dst_id) else {
            return false;
        };
        targets.remove(pos);
        let backward = Self::edge_key(dst_type, dst_id, src_type);
        if let Some(sources) = self.edges.get_mut(&backward) {
            sources.retain(|s| s != src_id);
        }
        true
    }

    /// Validate both bounds, then persist the symmetric pair.
    fn insert_link(&mut self, spec: &LinkSpec) -> StoreResult<()> {
        let replace_forward =
            self.check_bound(&spec.src_type, &spec.src_id, &spec.dst_type, spec.forward)?;
        let replace_backward =
            self.check_bound(&spec.dst_type, &spec.dst_id, &spec.src_type, spec.backward)?;

        for old_dst in replace_forward {
            self.remove_edge(&spec.src_type, &spec.src_id, &spec.dst_type, &old_dst);
        }
        for old_src in replace_backward {
            self.remove_edge(&spec.dst_type, &spec.dst_id, &spec.src_type, &old_src);
        }

        self.edges
            .entry(Self::edge_key(&spec.src_type, &spec.src_id, &spec.dst_type))
            .or_default()
            .push(spec.dst_id.clone());
        self.edges
            .entry(Self::edge_key(&spec.dst_type, &spec.dst_id, &spec.src_type))
            .or_default()
            .push(spec.src_id.clone());
        Ok(())
    }

    /// Remove every edge touching `(entity_type, id)`, both directions.
    fn cascade_links(&mut self, entity_type: &str, id: &str) {
        let anchored: Vec<EdgeKey> = self
            .edges
            .keys()
            .filter(|(t, i, _)| t == entity_type && i == id)
            .cloned()
            .collect();
        for key in anchored {
            let targets = self.edges.remove(&key).unwrap_or_default();
            let (_, _, target_type) = key;
            for target_id in targets {
                let backward = Self::edge_key(&target_type, &target_id, entity_type);
                if let Some(sources) = self.edges.get_mut(&backward) {
                    sources.retain(|s| s != id);
                }
            }
        }
    }
}

/// In-memory [`EntityStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EntityStore for MemoryStore {
    fn insert(&self, record: UserData) -> StoreResult<()> {
        let mut inner = self.write();
        inner
            .tables
            .entry(record.entity_type.clone())
            .or_default()
            .insert(record)
    }

    fn get(&self, entity_type: &str, id: &str) -> StoreResult<UserData> {
        let inner = self.read();
        inner
            .tables
            .get(entity_type)
            .and_then(|table| table.rows.get(id))
            .cloned()
            .ok_or_else(|| StoreError::entity_not_found(entity_type, id))
    }

    fn replace(&self, record: UserData, expected_version: u64) -> StoreResult<()> {
        let mut inner = self.write();
        let table = inner
            .tables
            .get_mut(&record.entity_type)
            .ok_or_else(|| StoreError::entity_not_found(&record.entity_type, &record.id))?;
        let current = table
            .rows
            .get_mut(&record.id)
            .ok_or_else(|| StoreError::entity_not_found(&record.entity_type, &record.id))?;
        if current.metadata.version != expected_version {
            return Err(StoreError::VersionConflict {
                entity_type: record.entity_type.clone(),
                id: record.id.clone(),
            });
        }
        *current = record;
        Ok(())
    }

    fn delete(
        &self,
        entity_type: &str,
        id: &str,
        expected_version: Option<u64>,
    ) -> StoreResult<()> {
        let mut inner = self.write();
        let table = inner
            .tables
            .get_mut(entity_type)
            .ok_or_else(|| StoreError::entity_not_found(entity_type, id))?;
        let current = table
            .rows
            .get(id)
            .ok_or_else(|| StoreError::entity_not_found(entity_type, id))?;
        if let Some(expected) = expected_version {
            if current.metadata.version != expected {
                return Err(StoreError::VersionConflict {
                    entity_type: entity_type.to_string(),
                    id: id.to_string(),
                });
            }
        }
        table.remove(id);
        inner.cascade_links(entity_type, id);
        Ok(())
    }

    fn list(&self, entity_type: &str) -> Vec<UserData> {
        let inner = self.read();
        let Some(table) = inner.tables.get(entity_type) else {
            return Vec::new();
        };
        table
            .order
            .iter()
            .filter_map(|id| table.rows.get(id))
            .cloned()
            .collect()
    }

    fn count(&self, entity_type: &str) -> usize {
        let inner = self.read();
        inner
            .tables
            .get(entity_type)
            .map(|table| table.rows.len())
            .unwrap_or(0)
    }

    fn insert_link(&self, spec: &LinkSpec) -> StoreResult<()> {
        self.write().insert_link(spec)
    }

    fn insert_with_link(&self, record: UserData, spec: &LinkSpec) -> StoreResult<()> {
        let mut inner = self.write();

        // validate everything before mutating anything
        if inner
            .tables
            .get(&record.entity_type)
            .is_some_and(|table| table.rows.contains_key(&record.id))
        {
            return Err(StoreError::entity_exists(&record.entity_type, &record.id));
        }
        inner.insert_link(spec)?;

        inner
            .tables
            .entry(record.entity_type.clone())
            .or_default()
            .insert(record)
    }

    fn delete_link(
        &self,
        src_type: &str,
        src_id: &str,
        dst_type: &str,
        dst_id: &str,
    ) -> StoreResult<()> {
        let mut inner = self.write();
        if inner.remove_edge(src_type, src_id, dst_type, dst_id) {
            Ok(())
        } else {
            Err(StoreError::LinkNotFound {
                src_type: src_type.to_string(),
                src_id: src_id.to_string(),
                dst_type: dst_type.to_string(),
                dst_id: dst_id.to_string(),
            })
        }
    }

    fn list_links(&self, entity_type: &str, id: &str, target_type: &str) -> Vec<String> {
        let inner = self.read();
        inner
            .edges
            .get(&Inner::edge_key(entity_type, id, target_type))
            .cloned()
            .unwrap_or_default()
    }

    fn count_links_between(&self, type_a: &str, type_b: &str) -> usize {
        let inner = self.read();
        inner
            .edges
            .iter()
            .filter(|((t, _, target), _)| t == type_a && target == type_b)
            .map(|(_, targets)| targets.len())
            .sum()
    }
}
