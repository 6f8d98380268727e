// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Allowlist filter
//!
//! Decides once per extracted entity whether it becomes a node, and of which
//! [`NodeType`]. A dropped entity is never re-admitted later.

use crate::error::Warning;
use crate::extract::ExtractedEntity;
use crate::types::NodeType;
use crate::vocabulary::{Classification, Vocabulary};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// An entity that passed the filter
#[derive(Clone, Debug)]
pub struct KeptEntity {
    pub entity: ExtractedEntity,
    pub node_type: NodeType,
    /// Schema spelling of the type, e.g. `IfcWall`
    pub type_name: String,
}

/// Result of filtering a batch of entities
#[derive(Debug, Default)]
pub struct FilterOutcome {
    /// Kept entities in input order
    pub kept: Vec<KeptEntity>,
    pub denied_by_type: BTreeMap<String, usize>,
    pub unknown_by_type: BTreeMap<String, usize>,
    /// One `UnknownType` warning per unknown type name, for its first entity
    pub warnings: Vec<Warning>,
}

/// Applies a [`Vocabulary`] to extracted entities
pub struct AllowlistFilter<'v> {
    vocabulary: &'v Vocabulary,
}

impl<'v> AllowlistFilter<'v> {
    pub fn new(vocabulary: &'v Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn classify(&self, entity: &ExtractedEntity) -> Classification {
        self.vocabulary.classify(&entity.ifc_type)
    }

    /// Partition entities into kept, denied and unknown
    pub fn apply(&self, entities: Vec<ExtractedEntity>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        let mut reported: FxHashSet<String> = FxHashSet::default();

        for entity in entities {
            match self.classify(&entity) {
                Classification::Keep(node_type) => {
                    let type_name = self.vocabulary.display_name(&entity.ifc_type);
                    outcome.kept.push(KeptEntity {
                        entity,
                        node_type,
                        type_name,
                    });
                }
                Classification::Denied => {
                    let type_name = self.vocabulary.display_name(&entity.ifc_type);
                    debug!(entity = %entity.id, ifc_type = %type_name, "dropping denied entity");
                    *outcome.denied_by_type.entry(type_name).or_default() += 1;
                }
                Classification::Unknown => {
                    let type_name = self.vocabulary.display_name(&entity.ifc_type);
                    if reported.insert(type_name.clone()) {
                        warn!(entity = %entity.id, ifc_type = %type_name, "dropping entity of unknown type");
                        outcome.warnings.push(Warning::UnknownType {
                            entity: entity.id,
                            type_name: type_name.clone(),
                        });
                    }
                    *outcome.unknown_by_type.entry(type_name).or_default() += 1;
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_graph_model::{EntityId, IfcType};

    fn entity(id: u32, type_name: &str) -> ExtractedEntity {
        ExtractedEntity {
            id: EntityId(id),
            ifc_type: IfcType::parse(type_name),
            global_id: Some(format!("guid{id}")),
            name: None,
            attributes: BTreeMap::new(),
            placement: None,
            representation: None,
            elevation: None,
        }
    }

    #[test]
    fn test_partition() {
        let vocabulary = Vocabulary::builtin();
        let filter = AllowlistFilter::new(&vocabulary);
        let outcome = filter.apply(vec![
            entity(1, "IFCPROJECT"),
            entity(2, "IFCBUILDING"),
            entity(3, "IFCBUILDINGSTOREY"),
            entity(4, "IFCWALL"),
            entity(5, "IFCOPENINGELEMENT"),
            entity(6, "IFCALIGNMENT"),
            entity(7, "IFCALIGNMENT"),
        ]);

        let kept: Vec<(u32, NodeType)> = outcome
            .kept
            .iter()
            .map(|k| (k.entity.id.0, k.node_type))
            .collect();
        assert_eq!(
            kept,
            vec![
                (3, NodeType::Storey),
                (4, NodeType::Element),
                (5, NodeType::ElementSubtype)
            ]
        );
        assert_eq!(outcome.kept[1].type_name, "IfcWall");
        assert_eq!(outcome.denied_by_type.get("IfcProject"), Some(&1));
        assert_eq!(outcome.denied_by_type.get("IfcBuilding"), Some(&1));
        assert_eq!(outcome.unknown_by_type.get("IFCALIGNMENT"), Some(&2));
    }

    #[test]
    fn test_unknown_type_warned_once() {
        let vocabulary = Vocabulary::builtin();
        let outcome = AllowlistFilter::new(&vocabulary).apply(vec![
            entity(10, "IFCALIGNMENT"),
            entity(11, "IFCALIGNMENT"),
            entity(12, "IFCBEARING"),
        ]);
        assert_eq!(outcome.warnings.len(), 2);
        assert_eq!(
            outcome.warnings[0],
            Warning::UnknownType {
                entity: EntityId(10),
                type_name: "IFCALIGNMENT".to_string()
            }
        );
        assert!(outcome.kept.is_empty());
    }
}
