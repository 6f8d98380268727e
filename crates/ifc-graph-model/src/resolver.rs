// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity resolution trait for looking up and resolving IFC entities

use crate::{AttributeValue, DecodedEntity, EntityId, IfcType, Result};
use std::sync::Arc;

/// Entity lookup and reference resolution
///
/// Implementations provide O(1) lookup by entity ID. Type queries return
/// entities in file order so that everything built on top of them is
/// deterministic.
///
/// # Example
///
/// ```ignore
/// use ifc_graph_model::{EntityResolver, EntityId};
///
/// fn storey_of(resolver: &dyn EntityResolver, rel: EntityId) {
///     if let Some(rel) = resolver.get(rel) {
///         if let Some(structure) = rel.get(5).and_then(|a| resolver.resolve_ref(a)) {
///             println!("contained in {}", structure.ifc_type);
///         }
///     }
/// }
/// ```
pub trait EntityResolver: Send + Sync {
    /// Decode an entity, reporting why it could not be decoded
    ///
    /// Returns `EntityNotFound` for ids that are not in the file and
    /// `EntityParse` (with the offending line) for malformed records.
    fn decode(&self, id: EntityId) -> Result<Arc<DecodedEntity>>;

    /// Get entity by ID, `None` if it is missing or malformed
    fn get(&self, id: EntityId) -> Option<Arc<DecodedEntity>> {
        self.decode(id).ok()
    }

    /// Resolve an entity reference from an attribute value
    fn resolve_ref(&self, attr: &AttributeValue) -> Option<Arc<DecodedEntity>> {
        match attr {
            AttributeValue::EntityRef(id) => self.get(*id),
            _ => None,
        }
    }

    /// Resolve a list of entity references, skipping anything that is not a
    /// resolvable reference
    fn resolve_ref_list(&self, attr: &AttributeValue) -> Vec<Arc<DecodedEntity>> {
        match attr {
            AttributeValue::List(items) => items
                .iter()
                .filter_map(|item| self.resolve_ref(item))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// IDs of all entities of a type, in file order
    fn ids_by_type(&self, ifc_type: &IfcType) -> Vec<EntityId>;

    /// All entities of a type, in file order
    fn entities_by_type(&self, ifc_type: &IfcType) -> Vec<Arc<DecodedEntity>> {
        self.ids_by_type(ifc_type)
            .into_iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// Find entities by type name string (case-insensitive)
    fn find_by_type_name(&self, type_name: &str) -> Vec<Arc<DecodedEntity>> {
        self.entities_by_type(&IfcType::parse(type_name))
    }

    /// Count entities of a specific type
    fn count_by_type(&self, ifc_type: &IfcType) -> usize {
        self.ids_by_type(ifc_type).len()
    }

    /// All entity IDs in the model, ascending
    fn all_ids(&self) -> Vec<EntityId>;

    /// Total entity count
    fn entity_count(&self) -> usize {
        self.all_ids().len()
    }

    /// Raw bytes of an entity's record, for callers that scan it directly
    fn raw_bytes(&self, id: EntityId) -> Option<&[u8]>;
}

/// Extension methods for EntityResolver
pub trait EntityResolverExt: EntityResolver {
    /// Check if an entity exists
    fn exists(&self, id: EntityId) -> bool {
        self.raw_bytes(id).is_some()
    }

    /// Resolve reference or return error
    fn resolve_ref_or_err(
        &self,
        entity_id: EntityId,
        attr_index: usize,
        attr: &AttributeValue,
    ) -> Result<Arc<DecodedEntity>> {
        self.resolve_ref(attr)
            .ok_or(crate::ParseError::InvalidReference {
                entity: entity_id,
                attribute: attr_index,
            })
    }
}

// Blanket implementation for all EntityResolver types
impl<T: EntityResolver + ?Sized> EntityResolverExt for T {}
