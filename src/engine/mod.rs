//! The user data engine
//!
//! [`UserDataEngine`] is the exposed contract: entity CRUD with optimistic
//! concurrency, link registration, list queries and schema administration.
//! It owns the schema registry and drives an [`EntityStore`] collaborator;
//! transport concerns (HTTP, auth, routing) live above it.

pub mod errors;
pub mod response;

pub use errors::{EngineError, EngineResult};

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::etag::{check_if_match, IfMatch};
use crate::links::LinkManager;
use crate::observability::Logger;
use crate::query::{self, parse_expand, ExpandedRecord, QueryOptions};
use crate::schema::{AssociationEnd, PropertyDef, SchemaRegistry};
use crate::store::{EntityStore, UserData};

/// Parse one key path segment of the form `'id'`.
///
/// The quotes are mandatory; anything else is a key parse error.
pub fn parse_key_segment(raw: &str) -> EngineResult<String> {
    raw.strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .filter(|id| !id.is_empty() && !id.contains('\''))
        .map(str::to_string)
        .ok_or_else(|| EngineError::EntityKeyParse(raw.to_string()))
}

/// Multi-tenant dynamic entity and relationship engine
pub struct UserDataEngine {
    config: EngineConfig,
    registry: RwLock<SchemaRegistry>,
    store: Arc<dyn EntityStore>,
}

impl UserDataEngine {
    /// Create an engine over a store collaborator
    pub fn new(config: EngineConfig, store: Arc<dyn EntityStore>) -> Self {
        Self {
            config,
            registry: RwLock::new(SchemaRegistry::new()),
            store,
        }
    }

    /// The active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn registry_read(&self) -> RwLockReadGuard<'_, SchemaRegistry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn registry_write(&self) -> RwLockWriteGuard<'_, SchemaRegistry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Strip the reserved `__` namespace, returning the id separately.
    ///
    /// A caller-supplied `__id` must be a string; anything else is a key
    /// parse error.
    fn split_reserved(body: Map<String, Value>) -> EngineResult<(Option<String>, Map<String, Value>)> {
        let mut id = None;
        let mut properties = Map::new();
        for (key, value) in body {
            if key == "__id" {
                match value {
                    Value::String(s) => id = Some(s),
                    other => return Err(EngineError::EntityKeyParse(other.to_string())),
                }
            } else if !key.starts_with("__") {
                properties.insert(key, value);
            }
        }
        Ok((id, properties))
    }

    // ------------------------------------------------------------------
    // Entity CRUD
    // ------------------------------------------------------------------

    /// Create an instance. A missing `__id` gets a fresh UUID.
    ///
    /// The body is validated against the schema before any store mutation;
    /// unseen keys register as inferred properties only once the record has
    /// persisted, so a rejected create leaves the schema untouched.
    pub fn create(&self, entity_type: &str, body: Map<String, Value>) -> EngineResult<Value> {
        let (id, properties) = Self::split_reserved(body)?;
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut registry = self.registry_write();
        let pending = registry.validate_write(entity_type, &properties)?;
        let record = UserData::new(entity_type, id, properties);
        self.store.insert(record.clone())?;
        registry.commit_inference(entity_type, pending);
        Logger::info(
            "USERDATA_CREATE",
            &[("id", &record.id), ("type", entity_type)],
        );
        Ok(response::render_record(&record))
    }

    /// Create an instance already linked to an existing anchor, atomically.
    ///
    /// Toward a single-valued anchor the new link replaces the old one.
    pub fn create_via_link(
        &self,
        src_type: &str,
        src_id: &str,
        dst_type: &str,
        body: Map<String, Value>,
    ) -> EngineResult<Value> {
        let (id, properties) = Self::split_reserved(body)?;
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut registry = self.registry_write();
        let pending = registry.validate_write(dst_type, &properties)?;
        let record = UserData::new(dst_type, id, properties);
        let manager = LinkManager::new(&registry, self.store.as_ref(), &self.config);
        if let Err(err) = manager.create_via_navigation_property(src_type, src_id, record.clone()) {
            Logger::warn(
                "LINK_REJECT",
                &[
                    ("code", err.code()),
                    ("src_id", src_id),
                    ("src_type", src_type),
                    ("type", dst_type),
                ],
            );
            return Err(err.into());
        }
        registry.commit_inference(dst_type, pending);
        Logger::info(
            "USERDATA_CREATE_VIA_LINK",
            &[
                ("id", &record.id),
                ("src_id", src_id),
                ("src_type", src_type),
                ("type", dst_type),
            ],
        );
        Ok(response::render_record(&record))
    }

    /// Retrieve one instance, optionally with `$expand`
    pub fn retrieve(
        &self,
        entity_type: &str,
        id: &str,
        expand: Option<&str>,
    ) -> EngineResult<Value> {
        let record = self.store.get(entity_type, id)?;
        let targets = match expand {
            Some(raw) => {
                let registry = self.registry_read();
                parse_expand(
                    raw,
                    entity_type,
                    &registry,
                    self.config.expand_max_for_retrieve,
                )?
            }
            None => Vec::new(),
        };
        let expanded = targets
            .into_iter()
            .map(|target| {
                let children = self
                    .store
                    .list_links(entity_type, id, &target)
                    .into_iter()
                    .filter_map(|child| self.store.get(&target, &child).ok())
                    .collect();
                (target, children)
            })
            .collect();
        Ok(response::render_expanded(&ExpandedRecord { record, expanded }))
    }

    /// List instances under the full query option set
    pub fn list(
        &self,
        entity_type: &str,
        params: &HashMap<String, String>,
    ) -> EngineResult<Value> {
        let registry = self.registry_read();
        registry.entity_type(entity_type)?;
        let options = QueryOptions::parse(params, entity_type, &registry, &self.config)?;
        drop(registry);
        let records = self.store.list(entity_type);
        let outcome = query::execute(records, &options, self.store.as_ref());
        Ok(response::render_list(&outcome))
    }

    /// Replace an instance, conditional on `If-Match`.
    ///
    /// The stored properties are replaced wholesale; keys absent from the
    /// body are gone afterwards.
    pub fn update(
        &self,
        entity_type: &str,
        id: &str,
        if_match: Option<&str>,
        body: Map<String, Value>,
    ) -> EngineResult<Value> {
        let (_, properties) = Self::split_reserved(body)?;
        let mut current = self.store.get(entity_type, id)?;
        check_if_match(if_match, current.etag())?;
        let mut registry = self.registry_write();
        let pending = registry.validate_write(entity_type, &properties)?;
        let expected_version = current.metadata.version;
        current.properties = properties;
        current.metadata.touch();
        if let Err(err) = self.store.replace(current.clone(), expected_version) {
            let reason = err.to_string();
            Logger::error(
                "USERDATA_WRITE_CONFLICT",
                &[("id", id), ("reason", &reason), ("type", entity_type)],
            );
            return Err(err.into());
        }
        registry.commit_inference(entity_type, pending);
        Logger::info("USERDATA_UPDATE", &[("id", id), ("type", entity_type)]);
        Ok(response::render_record(&current))
    }

    /// Merge a partial body into an instance, conditional on `If-Match`.
    ///
    /// Top-level keys overwrite; keys absent from the body keep their
    /// stored values.
    pub fn merge(
        &self,
        entity_type: &str,
        id: &str,
        if_match: Option<&str>,
        body: Map<String, Value>,
    ) -> EngineResult<Value> {
        let (_, overlay) = Self::split_reserved(body)?;
        let mut current = self.store.get(entity_type, id)?;
        check_if_match(if_match, current.etag())?;
        let mut merged = current.properties.clone();
        for (key, value) in overlay {
            merged.insert(key, value);
        }
        let mut registry = self.registry_write();
        let pending = registry.validate_write(entity_type, &merged)?;
        let expected_version = current.metadata.version;
        current.properties = merged;
        current.metadata.touch();
        if let Err(err) = self.store.replace(current.clone(), expected_version) {
            let reason = err.to_string();
            Logger::error(
                "USERDATA_WRITE_CONFLICT",
                &[("id", id), ("reason", &reason), ("type", entity_type)],
            );
            return Err(err.into());
        }
        registry.commit_inference(entity_type, pending);
        Logger::info("USERDATA_MERGE", &[("id", id), ("type", entity_type)]);
        Ok(response::render_record(&current))
    }

    /// Delete an instance, conditional on `If-Match`; links cascade.
    ///
    /// The store re-checks the validated version at removal, so a
    /// concurrent update between the read and the delete surfaces as a
    /// version conflict instead of discarding the newer write.
    pub fn delete(&self, entity_type: &str, id: &str, if_match: Option<&str>) -> EngineResult<()> {
        let current = self.store.get(entity_type, id)?;
        let condition = IfMatch::parse(if_match)?;
        condition.check(current.etag())?;
        let expected = match condition {
            IfMatch::Weak(etag) => Some(etag.version),
            IfMatch::Unconditional | IfMatch::Any => None,
        };
        if let Err(err) = self.store.delete(entity_type, id, expected) {
            let reason = err.to_string();
            Logger::error(
                "USERDATA_WRITE_CONFLICT",
                &[("id", id), ("reason", &reason), ("type", entity_type)],
            );
            return Err(err.into());
        }
        Logger::info("USERDATA_DELETE", &[("id", id), ("type", entity_type)]);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Link two existing instances under their declared association
    pub fn create_link(
        &self,
        src_type: &str,
        src_id: &str,
        dst_type: &str,
        dst_id: &str,
    ) -> EngineResult<()> {
        let registry = self.registry_read();
        let manager = LinkManager::new(&registry, self.store.as_ref(), &self.config);
        if let Err(err) = manager.create_link(src_type, src_id, dst_type, dst_id) {
            Logger::warn(
                "LINK_REJECT",
                &[
                    ("code", err.code()),
                    ("dst_id", dst_id),
                    ("dst_type", dst_type),
                    ("src_id", src_id),
                    ("src_type", src_type),
                ],
            );
            return Err(err.into());
        }
        Logger::info(
            "LINK_CREATE",
            &[
                ("dst_id", dst_id),
                ("dst_type", dst_type),
                ("src_id", src_id),
                ("src_type", src_type),
            ],
        );
        Ok(())
    }

    /// Remove a link between two instances
    pub fn delete_link(
        &self,
        src_type: &str,
        src_id: &str,
        dst_type: &str,
        dst_id: &str,
    ) -> EngineResult<()> {
        let registry = self.registry_read();
        let manager = LinkManager::new(&registry, self.store.as_ref(), &self.config);
        manager.delete_link(src_type, src_id, dst_type, dst_id)?;
        Logger::info(
            "LINK_DELETE",
            &[
                ("dst_id", dst_id),
                ("dst_type", dst_type),
                ("src_id", src_id),
                ("src_type", src_type),
            ],
        );
        Ok(())
    }

    /// Linked target ids for an anchor, honoring `$top`/`$skip` in
    /// insertion order
    pub fn list_links(
        &self,
        src_type: &str,
        src_id: &str,
        dst_type: &str,
        params: &HashMap<String, String>,
    ) -> EngineResult<Value> {
        let registry = self.registry_read();
        let options = QueryOptions::parse(params, src_type, &registry, &self.config)?;
        let manager = LinkManager::new(&registry, self.store.as_ref(), &self.config);
        let ids = manager.list_links(src_type, src_id, dst_type)?;
        let windowed: Vec<String> = match options.top {
            Some(top) => ids.into_iter().skip(options.skip).take(top).collect(),
            None => ids.into_iter().skip(options.skip).collect(),
        };
        Ok(response::render_links(&windowed))
    }

    /// List the instances linked to an anchor under the full query option set.
    ///
    /// Options validate against the target type; the result set is the
    /// anchor's linked instances in link insertion order.
    pub fn list_via_link(
        &self,
        src_type: &str,
        src_id: &str,
        dst_type: &str,
        params: &HashMap<String, String>,
    ) -> EngineResult<Value> {
        let registry = self.registry_read();
        let options = QueryOptions::parse(params, dst_type, &registry, &self.config)?;
        let manager = LinkManager::new(&registry, self.store.as_ref(), &self.config);
        let ids = manager.list_links(src_type, src_id, dst_type)?;
        drop(registry);
        let records = ids
            .iter()
            .filter_map(|id| self.store.get(dst_type, id).ok())
            .collect();
        let outcome = query::execute(records, &options, self.store.as_ref());
        Ok(response::render_list(&outcome))
    }

    // ------------------------------------------------------------------
    // Schema administration
    // ------------------------------------------------------------------

    /// Register an entity type
    pub fn create_entity_type(&self, name: &str) -> EngineResult<()> {
        self.registry_write().create_entity_type(name)?;
        Logger::info("SCHEMA_ENTITY_TYPE_CREATE", &[("name", name)]);
        Ok(())
    }

    /// Delete an entity type; blocked while instances or dependents exist
    pub fn delete_entity_type(&self, name: &str) -> EngineResult<()> {
        let instance_count = self.store.count(name);
        self.registry_write()
            .delete_entity_type(name, instance_count)?;
        Logger::info("SCHEMA_ENTITY_TYPE_DELETE", &[("name", name)]);
        Ok(())
    }

    /// Declare a property on an entity type
    pub fn create_property(&self, entity_type: &str, def: PropertyDef) -> EngineResult<()> {
        let name = def.name.clone();
        self.registry_write().create_property(entity_type, def)?;
        Logger::info(
            "SCHEMA_PROPERTY_CREATE",
            &[("entity_type", entity_type), ("name", &name)],
        );
        Ok(())
    }

    /// Change a declared property; every stored value must fit the new
    /// definition or nothing changes
    pub fn update_property(&self, entity_type: &str, def: PropertyDef) -> EngineResult<()> {
        let name = def.name.clone();
        let values: Vec<Value> = self
            .store
            .list(entity_type)
            .into_iter()
            .filter_map(|mut r| r.properties.remove(&name))
            .collect();
        self.registry_write()
            .update_property(entity_type, def, values.iter())?;
        Logger::info(
            "SCHEMA_PROPERTY_UPDATE",
            &[("entity_type", entity_type), ("name", &name)],
        );
        Ok(())
    }

    /// Delete a declared property; blocked while instances hold a value
    pub fn delete_property(&self, entity_type: &str, name: &str) -> EngineResult<()> {
        let holder_count = self
            .store
            .list(entity_type)
            .iter()
            .filter(|r| r.properties.contains_key(name))
            .count();
        self.registry_write()
            .delete_property(entity_type, name, holder_count)?;
        Logger::info(
            "SCHEMA_PROPERTY_DELETE",
            &[("entity_type", entity_type), ("name", name)],
        );
        Ok(())
    }

    /// Register a complex type
    pub fn create_complex_type(&self, name: &str) -> EngineResult<()> {
        self.registry_write().create_complex_type(name)?;
        Logger::info("SCHEMA_COMPLEX_TYPE_CREATE", &[("name", name)]);
        Ok(())
    }

    /// Delete a complex type; blocked while properties reference it
    pub fn delete_complex_type(&self, name: &str) -> EngineResult<()> {
        self.registry_write().delete_complex_type(name)?;
        Logger::info("SCHEMA_COMPLEX_TYPE_DELETE", &[("name", name)]);
        Ok(())
    }

    /// Declare a property on a complex type
    pub fn create_complex_type_property(
        &self,
        complex_type: &str,
        def: PropertyDef,
    ) -> EngineResult<()> {
        self.registry_write()
            .create_complex_type_property(complex_type, def)?;
        Ok(())
    }

    /// Delete a property from a complex type
    pub fn delete_complex_type_property(&self, complex_type: &str, name: &str) -> EngineResult<()> {
        self.registry_write()
            .delete_complex_type_property(complex_type, name)?;
        Ok(())
    }

    /// Register an association end
    pub fn create_association_end(&self, end: AssociationEnd) -> EngineResult<()> {
        let entity_type = end.entity_type.clone();
        let name = end.name.clone();
        self.registry_write().create_association_end(end)?;
        Logger::info(
            "SCHEMA_ASSOCIATION_END_CREATE",
            &[("entity_type", &entity_type), ("name", &name)],
        );
        Ok(())
    }

    /// Delete an association end; blocked while an end link uses it
    pub fn delete_association_end(&self, entity_type: &str, name: &str) -> EngineResult<()> {
        self.registry_write()
            .delete_association_end(entity_type, name)?;
        Logger::info(
            "SCHEMA_ASSOCIATION_END_DELETE",
            &[("entity_type", entity_type), ("name", name)],
        );
        Ok(())
    }

    /// Join two association ends into a declared relationship
    pub fn link_association_ends(
        &self,
        end_a: (&str, &str),
        end_b: (&str, &str),
    ) -> EngineResult<()> {
        self.registry_write().link_association_ends(end_a, end_b)?;
        Logger::info(
            "SCHEMA_ASSOCIATION_LINK",
            &[
                ("end_a", &format!("{}/{}", end_a.0, end_a.1)),
                ("end_b", &format!("{}/{}", end_b.0, end_b.1)),
            ],
        );
        Ok(())
    }

    /// Remove a declared relationship; blocked while instance links exist
    pub fn unlink_association_ends(
        &self,
        end_a: (&str, &str),
        end_b: (&str, &str),
    ) -> EngineResult<()> {
        let link_count = self.store.count_links_between(end_a.0, end_b.0);
        self.registry_write()
            .unlink_association_ends(end_a, end_b, link_count)?;
        Logger::info(
            "SCHEMA_ASSOCIATION_UNLINK",
            &[
                ("end_a", &format!("{}/{}", end_a.0, end_a.1)),
                ("end_b", &format!("{}/{}", end_b.0, end_b.1)),
            ],
        );
        Ok(())
    }
}
