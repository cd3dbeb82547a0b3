//! Link management
//!
//! Builds [`LinkSpec`] commands from declared association multiplicities and
//! drives the store's atomic link inserts. The direction toward a
//! single-valued end is bounded at one; an N:N pair is capped on both sides
//! by the configured per-anchor ceiling.

pub mod errors;

pub use errors::{LinkError, LinkResult};

use crate::config::EngineConfig;
use crate::schema::{AssociationEndLink, Multiplicity, SchemaRegistry};
use crate::store::{EntityStore, LinkBound, LinkSpec, UserData};

/// Resolves associations and issues link commands against the store
pub struct LinkManager<'a> {
    registry: &'a SchemaRegistry,
    store: &'a dyn EntityStore,
    config: &'a EngineConfig,
}

impl<'a> LinkManager<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        store: &'a dyn EntityStore,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    /// The bound for one direction of an insert.
    ///
    /// `toward` is the multiplicity of the end being approached; both ends
    /// `Many` makes the pair N:N and caps both directions.
    fn bound(&self, toward: Multiplicity, other: Multiplicity, replace: bool) -> LinkBound {
        if toward.single_valued() {
            LinkBound::Single { replace }
        } else if other.single_valued() {
            LinkBound::Unbounded
        } else {
            LinkBound::Capped(self.config.nn_link_max)
        }
    }

    /// Build the insert command for `src -> dst` under a declared association.
    ///
    /// `replace_forward` selects set semantics on the forward direction when
    /// its end is single valued; direct link creation passes `false`.
    fn spec_for(
        &self,
        assoc: &AssociationEndLink,
        src_type: &str,
        src_id: &str,
        dst_type: &str,
        dst_id: &str,
        replace_forward: bool,
    ) -> LinkSpec {
        // relates() held during resolution, so both ends are present
        let src_mult = assoc
            .end_of(src_type)
            .map(|e| e.multiplicity)
            .unwrap_or(Multiplicity::Many);
        let dst_mult = assoc
            .opposite_of(src_type)
            .map(|e| e.multiplicity)
            .unwrap_or(Multiplicity::Many);
        LinkSpec {
            src_type: src_type.to_string(),
            src_id: src_id.to_string(),
            dst_type: dst_type.to_string(),
            dst_id: dst_id.to_string(),
            forward: self.bound(dst_mult, src_mult, replace_forward),
            backward: self.bound(src_mult, dst_mult, false),
        }
    }

    /// Link two existing instances under their declared association.
    ///
    /// A single-valued anchor that already holds a link rejects the insert;
    /// replacement is reserved for creation through a navigation property.
    pub fn create_link(
        &self,
        src_type: &str,
        src_id: &str,
        dst_type: &str,
        dst_id: &str,
    ) -> LinkResult<()> {
        let assoc = self.registry.resolve_association(src_type, dst_type)?;
        self.store.get(src_type, src_id)?;
        self.store.get(dst_type, dst_id)?;
        let spec = self.spec_for(assoc, src_type, src_id, dst_type, dst_id, false);
        self.store.insert_link(&spec)?;
        Ok(())
    }

    /// Create a new instance already linked to an existing anchor.
    ///
    /// The record and its link persist atomically. When the anchor's side of
    /// the association is single valued, the new link replaces the old one
    /// instead of rejecting.
    pub fn create_via_navigation_property(
        &self,
        src_type: &str,
        src_id: &str,
        record: UserData,
    ) -> LinkResult<()> {
        let dst_type = record.entity_type.clone();
        let dst_id = record.id.clone();
        let assoc = self.registry.resolve_association(src_type, &dst_type)?;
        self.store.get(src_type, src_id)?;
        let spec = self.spec_for(assoc, src_type, src_id, &dst_type, &dst_id, true);
        self.store.insert_with_link(record, &spec)?;
        Ok(())
    }

    /// Remove a link between two instances
    pub fn delete_link(
        &self,
        src_type: &str,
        src_id: &str,
        dst_type: &str,
        dst_id: &str,
    ) -> LinkResult<()> {
        self.registry.resolve_association(src_type, dst_type)?;
        self.store.delete_link(src_type, src_id, dst_type, dst_id)?;
        Ok(())
    }

    /// Ids linked from an anchor toward a type, in insertion order
    pub fn list_links(
        &self,
        src_type: &str,
        src_id: &str,
        dst_type: &str,
    ) -> LinkResult<Vec<String>> {
        self.registry.resolve_association(src_type, dst_type)?;
        self.store.get(src_type, src_id)?;
        Ok(self.store.list_links(src_type, src_id, dst_type))
    }
}
