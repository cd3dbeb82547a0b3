//! Schema registry
//!
//! Owns entity types, complex types, association ends and their links.
//! All mutations validate eagerly; deletes run an explicit dependency query
//! and fail while instances, properties, ends or links still reference the
//! target.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::errors::{SchemaError, SchemaResult};
use super::inference::{self, ComplexTypeLookup};
use super::types::{
    AssociationEnd, AssociationEndLink, ComplexType, EntityType, InferredType, PropertyDef,
    PropertySource, PropertyType,
};

/// Inferred property registrations held back until the store write succeeds
#[derive(Debug, Default)]
pub struct PendingInference {
    learned: Vec<(String, InferredType)>,
}

impl PendingInference {
    pub fn is_empty(&self) -> bool {
        self.learned.is_empty()
    }
}

/// The schema registry for one collection
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entity_types: HashMap<String, EntityType>,
    complex_types: HashMap<String, ComplexType>,
    association_ends: HashMap<(String, String), AssociationEnd>,
    end_links: Vec<AssociationEndLink>,
}

impl ComplexTypeLookup for SchemaRegistry {
    fn complex_type(&self, name: &str) -> Option<&ComplexType> {
        self.complex_types.get(name)
    }
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Entity types
    // ------------------------------------------------------------------

    /// Register a new entity type
    pub fn create_entity_type(&mut self, name: impl Into<String>) -> SchemaResult<()> {
        let name = name.into();
        if self.entity_types.contains_key(&name) {
            return Err(SchemaError::EntityTypeExists(name));
        }
        self.entity_types.insert(name.clone(), EntityType::new(name));
        Ok(())
    }

    /// Look up an entity type
    pub fn entity_type(&self, name: &str) -> SchemaResult<&EntityType> {
        self.entity_types
            .get(name)
            .ok_or_else(|| SchemaError::EntityTypeNotFound(name.to_string()))
    }

    /// Whether the entity type exists
    pub fn has_entity_type(&self, name: &str) -> bool {
        self.entity_types.contains_key(name)
    }

    /// Delete an entity type.
    ///
    /// `instance_count` is the caller's count of stored instances; deletion
    /// is blocked while instances, declared properties or association ends
    /// still reference the type.
    pub fn delete_entity_type(&mut self, name: &str, instance_count: usize) -> SchemaResult<()> {
        let et = self.entity_type(name)?;
        if instance_count > 0 {
            return Err(SchemaError::DeleteConflict {
                kind: "EntityType",
                name: name.to_string(),
                dependents: "instances",
            });
        }
        if !et.declared.is_empty() {
            return Err(SchemaError::DeleteConflict {
                kind: "EntityType",
                name: name.to_string(),
                dependents: "properties",
            });
        }
        if self.association_ends.keys().any(|(t, _)| t == name) {
            return Err(SchemaError::DeleteConflict {
                kind: "EntityType",
                name: name.to_string(),
                dependents: "association ends",
            });
        }
        self.entity_types.remove(name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Declare a property on an entity type
    pub fn create_property(&mut self, entity_type: &str, def: PropertyDef) -> SchemaResult<()> {
        if let PropertyType::Complex(complex) = &def.property_type {
            if !self.complex_types.contains_key(complex) {
                return Err(SchemaError::ComplexTypeNotFound(complex.clone()));
            }
        }
        let et = self
            .entity_types
            .get_mut(entity_type)
            .ok_or_else(|| SchemaError::EntityTypeNotFound(entity_type.to_string()))?;
        if et.declared.contains_key(&def.name) {
            return Err(SchemaError::PropertyExists(
                entity_type.to_string(),
                def.name,
            ));
        }
        et.declared.insert(def.name.clone(), def);
        Ok(())
    }

    /// Change a declared property's type.
    ///
    /// The change is accepted only when the old simple type widens to the new
    /// one (Int32 to Double, never the reverse) and every stored value in
    /// `existing_values` is representable under the new definition.
    pub fn update_property<'a>(
        &mut self,
        entity_type: &str,
        new_def: PropertyDef,
        existing_values: impl IntoIterator<Item = &'a Value>,
    ) -> SchemaResult<()> {
        let old = {
            let et = self.entity_type(entity_type)?;
            et.declared
                .get(&new_def.name)
                .cloned()
                .ok_or_else(|| SchemaError::PropertyNotFound(
                    entity_type.to_string(),
                    new_def.name.clone(),
                ))?
        };

        if let (PropertyType::Simple(from), PropertyType::Simple(to)) =
            (&old.property_type, &new_def.property_type)
        {
            if !from.widens_to(*to) {
                return Err(SchemaError::InvalidTypeChange {
                    property: new_def.name,
                    from: from.type_name().into(),
                    to: to.type_name().into(),
                });
            }
        } else if old.property_type != new_def.property_type {
            return Err(SchemaError::InvalidTypeChange {
                property: new_def.name,
                from: old.property_type.type_name().to_string(),
                to: new_def.property_type.type_name().to_string(),
            });
        }

        for value in existing_values {
            inference::check_declared(self, &new_def, value)?;
        }

        let et = self
            .entity_types
            .get_mut(entity_type)
            .ok_or_else(|| SchemaError::EntityTypeNotFound(entity_type.to_string()))?;
        et.declared.insert(new_def.name.clone(), new_def);
        Ok(())
    }

    /// Delete a declared property; blocked while instances of the type exist
    pub fn delete_property(
        &mut self,
        entity_type: &str,
        name: &str,
        instance_count: usize,
    ) -> SchemaResult<()> {
        let et = self
            .entity_types
            .get_mut(entity_type)
            .ok_or_else(|| SchemaError::EntityTypeNotFound(entity_type.to_string()))?;
        if !et.declared.contains_key(name) {
            return Err(SchemaError::PropertyNotFound(
                entity_type.to_string(),
                name.to_string(),
            ));
        }
        if instance_count > 0 {
            return Err(SchemaError::DeleteConflict {
                kind: "Property",
                name: name.to_string(),
                dependents: "instances",
            });
        }
        et.declared.remove(name);
        Ok(())
    }

    /// Resolve a property through the single lookup path used by the query
    /// engine and the store: declared first, then inferred.
    pub fn resolve_property(&self, entity_type: &str, name: &str) -> Option<PropertySource> {
        let et = self.entity_types.get(entity_type)?;
        if let Some(def) = et.declared.get(name) {
            return Some(PropertySource::Declared(def.clone()));
        }
        et.inferred
            .get(name)
            .map(|t| PropertySource::Inferred(*t))
    }

    // ------------------------------------------------------------------
    // Complex types
    // ------------------------------------------------------------------

    /// Register a new complex type
    pub fn create_complex_type(&mut self, name: impl Into<String>) -> SchemaResult<()> {
        let name = name.into();
        if self.complex_types.contains_key(&name) {
            return Err(SchemaError::ComplexTypeExists(name));
        }
        self.complex_types
            .insert(name.clone(), ComplexType::new(name));
        Ok(())
    }

    /// Delete a complex type; blocked while any property references it
    pub fn delete_complex_type(&mut self, name: &str) -> SchemaResult<()> {
        if !self.complex_types.contains_key(name) {
            return Err(SchemaError::ComplexTypeNotFound(name.to_string()));
        }
        let referenced = self
            .entity_types
            .values()
            .flat_map(|et| et.declared.values())
            .chain(self.complex_types.values().flat_map(|ct| ct.properties.values()))
            .any(|def| matches!(&def.property_type, PropertyType::Complex(c) if c == name));
        if referenced {
            return Err(SchemaError::DeleteConflict {
                kind: "ComplexType",
                name: name.to_string(),
                dependents: "properties",
            });
        }
        self.complex_types.remove(name);
        Ok(())
    }

    /// Declare a property on a complex type
    pub fn create_complex_type_property(
        &mut self,
        complex_type: &str,
        def: PropertyDef,
    ) -> SchemaResult<()> {
        if let PropertyType::Complex(nested) = &def.property_type {
            if !self.complex_types.contains_key(nested) {
                return Err(SchemaError::ComplexTypeNotFound(nested.clone()));
            }
        }
        let ct = self
            .complex_types
            .get_mut(complex_type)
            .ok_or_else(|| SchemaError::ComplexTypeNotFound(complex_type.to_string()))?;
        if ct.properties.contains_key(&def.name) {
            return Err(SchemaError::PropertyExists(
                complex_type.to_string(),
                def.name,
            ));
        }
        ct.properties.insert(def.name.clone(), def);
        Ok(())
    }

    /// Delete a property from a complex type
    pub fn delete_complex_type_property(
        &mut self,
        complex_type: &str,
        name: &str,
    ) -> SchemaResult<()> {
        let ct = self
            .complex_types
            .get_mut(complex_type)
            .ok_or_else(|| SchemaError::ComplexTypeNotFound(complex_type.to_string()))?;
        if ct.properties.remove(name).is_none() {
            return Err(SchemaError::PropertyNotFound(
                complex_type.to_string(),
                name.to_string(),
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Association ends
    // ------------------------------------------------------------------

    /// Register an association end for `(entity_type, name)`
    pub fn create_association_end(&mut self, end: AssociationEnd) -> SchemaResult<()> {
        if !self.entity_types.contains_key(&end.entity_type) {
            return Err(SchemaError::EntityTypeNotFound(end.entity_type));
        }
        let key = end.key();
        if self.association_ends.contains_key(&key) {
            return Err(SchemaError::AssociationEndExists(key.0, key.1));
        }
        self.association_ends.insert(key, end);
        Ok(())
    }

    /// Look up an association end by its `(entity_type, name)` key
    pub fn association_end(&self, entity_type: &str, name: &str) -> SchemaResult<&AssociationEnd> {
        self.association_ends
            .get(&(entity_type.to_string(), name.to_string()))
            .ok_or_else(|| {
                SchemaError::AssociationEndNotFound(entity_type.to_string(), name.to_string())
            })
    }

    /// Delete an association end; blocked while it participates in an end link
    pub fn delete_association_end(&mut self, entity_type: &str, name: &str) -> SchemaResult<()> {
        let key = (entity_type.to_string(), name.to_string());
        if !self.association_ends.contains_key(&key) {
            return Err(SchemaError::AssociationEndNotFound(key.0, key.1));
        }
        let linked = self.end_links.iter().any(|l| {
            (l.end_a.entity_type == entity_type && l.end_a.name == name)
                || (l.end_b.entity_type == entity_type && l.end_b.name == name)
        });
        if linked {
            return Err(SchemaError::DeleteConflict {
                kind: "AssociationEnd",
                name: name.to_string(),
                dependents: "association end links",
            });
        }
        self.association_ends.remove(&key);
        Ok(())
    }

    /// Join two association ends into a declared relationship
    pub fn link_association_ends(
        &mut self,
        end_a: (&str, &str),
        end_b: (&str, &str),
    ) -> SchemaResult<()> {
        let a = self.association_end(end_a.0, end_a.1)?.clone();
        let b = self.association_end(end_b.0, end_b.1)?.clone();
        let exists = self.end_links.iter().any(|l| {
            (l.end_a == a && l.end_b == b) || (l.end_a == b && l.end_b == a)
        });
        if exists {
            return Err(SchemaError::AssociationAlreadyLinked(
                a.name.clone(),
                b.name.clone(),
            ));
        }
        self.end_links.push(AssociationEndLink { end_a: a, end_b: b });
        Ok(())
    }

    /// Remove a declared relationship.
    ///
    /// `instance_link_count` is the caller's count of instance links riding
    /// on this relationship; unlinking is blocked while any exist.
    pub fn unlink_association_ends(
        &mut self,
        end_a: (&str, &str),
        end_b: (&str, &str),
        instance_link_count: usize,
    ) -> SchemaResult<()> {
        let a = self.association_end(end_a.0, end_a.1)?.clone();
        let b = self.association_end(end_b.0, end_b.1)?.clone();
        let pos = self
            .end_links
            .iter()
            .position(|l| (l.end_a == a && l.end_b == b) || (l.end_a == b && l.end_b == a))
            .ok_or_else(|| {
                SchemaError::AssociationNotFound(a.entity_type.clone(), b.entity_type.clone())
            })?;
        if instance_link_count > 0 {
            return Err(SchemaError::DeleteConflict {
                kind: "AssociationEndLink",
                name: format!("{}-{}", a.name, b.name),
                dependents: "links",
            });
        }
        self.end_links.remove(pos);
        Ok(())
    }

    /// Resolve the declared relationship between two entity types.
    ///
    /// Association ends are keyed by `(entity_type, name)`, so the same name
    /// may point at two targets; resolution between a type pair takes the
    /// first declared end link relating them.
    pub fn resolve_association(
        &self,
        type_a: &str,
        type_b: &str,
    ) -> SchemaResult<&AssociationEndLink> {
        self.end_links
            .iter()
            .find(|l| l.relates(type_a, type_b))
            .ok_or_else(|| {
                SchemaError::AssociationNotFound(type_a.to_string(), type_b.to_string())
            })
    }

    // ------------------------------------------------------------------
    // Writes: validation + dynamic inference
    // ------------------------------------------------------------------

    /// Validate a write body against the entity type.
    ///
    /// Types learned from unseen keys are collected but not registered;
    /// either the whole body is acceptable or nothing is learned. The caller
    /// passes the result to [`SchemaRegistry::commit_inference`] once the
    /// store write has succeeded, so a rejected request leaves the schema
    /// untouched. Keys beginning with `__` belong to the metadata namespace
    /// and are skipped.
    pub fn validate_write(
        &self,
        entity_type: &str,
        body: &Map<String, Value>,
    ) -> SchemaResult<PendingInference> {
        let mut learned: Vec<(String, InferredType)> = Vec::new();
        let et = self.entity_type(entity_type)?;
        for (key, value) in body {
            if key.starts_with("__") {
                continue;
            }
            if let Some(def) = et.declared.get(key) {
                inference::check_declared(self, def, value)?;
            } else if let Some(inferred) = et.inferred.get(key) {
                if let Some(widened) = inference::check_inferred(key, value, *inferred)? {
                    learned.push((key.clone(), widened));
                }
            } else if let Some(inferred) = inference::infer_type(key, value)? {
                learned.push((key.clone(), inferred));
            }
        }
        Ok(PendingInference { learned })
    }

    /// Register the inferences collected by a validated write
    pub fn commit_inference(&mut self, entity_type: &str, pending: PendingInference) {
        if pending.learned.is_empty() {
            return;
        }
        if let Some(et) = self.entity_types.get_mut(entity_type) {
            for (key, inferred) in pending.learned {
                et.inferred.insert(key, inferred);
            }
        }
    }

    /// Validate a write body and register its inferences in one step, for
    /// callers with no store mutation between the two
    pub fn apply_write(&mut self, entity_type: &str, body: &Map<String, Value>) -> SchemaResult<()> {
        let pending = self.validate_write(entity_type, body)?;
        self.commit_inference(entity_type, pending);
        Ok(())
    }
}
