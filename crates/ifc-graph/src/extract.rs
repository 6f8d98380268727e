// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity extraction
//!
//! Reads candidate entities and relation tuples out of a parsed model.
//! Nothing is filtered here: the vocabulary decides what becomes a node and
//! the graph builder decides which relations survive.

use crate::error::Result;
use crate::vocabulary::Vocabulary;
use ifc_graph_model::{DecodedEntity, EntityId, EntityResolver, IfcModel, IfcType};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use tracing::debug;

/// An entity as read from the model
#[derive(Clone, Debug)]
pub struct ExtractedEntity {
    pub id: EntityId,
    pub ifc_type: IfcType,
    pub global_id: Option<String>,
    pub name: Option<String>,
    /// Descriptive string attributes (description, object_type, tag, long_name)
    pub attributes: BTreeMap<String, String>,
    /// IfcProduct.ObjectPlacement
    pub placement: Option<EntityId>,
    /// IfcProduct.Representation
    pub representation: Option<EntityId>,
    /// IfcBuildingStorey.Elevation in file units
    pub elevation: Option<f64>,
}

/// Relation families the graph is built from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// `from` is the spatial structure, `to` the contained element
    Containment,
    /// `from` is the part, `to` the whole
    Aggregation,
    /// `from` is the relating element, `to` the related element
    Connection,
    /// `from` is the member, `to` the group
    GroupAssignment,
}

/// One endpoint pair of an objectified relationship
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRelation {
    pub relation: EntityId,
    pub relation_type: IfcType,
    pub kind: RelationKind,
    pub from: EntityId,
    pub to: EntityId,
}

/// Everything the later stages need from the model
#[derive(Debug, Default)]
pub struct ExtractedModel {
    /// Candidates in ascending entity id order
    pub entities: Vec<ExtractedEntity>,
    /// Relation tuples in relation id order
    pub relations: Vec<RawRelation>,
}

/// Read candidate entities and relations from a model
///
/// Candidates are every entity of a listed type plus any relation endpoint
/// of an unlisted type, so that unknown types can be reported. A malformed
/// record met here is fatal.
pub fn extract(model: &dyn IfcModel, vocabulary: &Vocabulary) -> Result<ExtractedModel> {
    let resolver = model.resolver();

    let mut ids: Vec<EntityId> = vocabulary
        .listed_types()
        .iter()
        .flat_map(|t| resolver.ids_by_type(t))
        .collect();

    let relations = extract_relations(resolver)?;

    let mut seen: FxHashSet<EntityId> = ids.iter().copied().collect();
    for relation in &relations {
        for endpoint in [relation.from, relation.to] {
            if seen.insert(endpoint) && resolver.raw_bytes(endpoint).is_some() {
                ids.push(endpoint);
            }
        }
    }
    ids.sort_unstable();
    ids.dedup();

    let mut entities = Vec::with_capacity(ids.len());
    for id in ids {
        let entity = resolver.decode(id)?;
        entities.push(read_entity(&entity));
    }

    debug!(
        entities = entities.len(),
        relations = relations.len(),
        "extracted candidates"
    );

    Ok(ExtractedModel {
        entities,
        relations,
    })
}

/// Attribute layout shared by IfcRoot / IfcObject / IfcProduct subtypes
fn read_entity(entity: &DecodedEntity) -> ExtractedEntity {
    let text = |index: usize| {
        entity
            .get_string(index)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let mut attributes = BTreeMap::new();
    if let Some(description) = text(3) {
        attributes.insert("description".to_string(), description);
    }
    if let Some(object_type) = text(4) {
        attributes.insert("object_type".to_string(), object_type);
    }
    // Attribute 7 is LongName on spatial elements and Tag on elements;
    // groups stop at attribute 4.
    let is_group = matches!(entity.ifc_type.family(), Some("group"));
    if !is_group {
        if let Some(seventh) = text(7) {
            let key = if entity.ifc_type.is_spatial() {
                "long_name"
            } else {
                "tag"
            };
            attributes.insert(key.to_string(), seventh);
        }
    }

    let (placement, representation) = if is_group {
        (None, None)
    } else {
        (entity.get_ref(5), entity.get_ref(6))
    };

    let elevation = if entity.ifc_type == IfcType::IfcBuildingStorey {
        entity.get_float(9)
    } else {
        None
    };

    ExtractedEntity {
        id: entity.id,
        ifc_type: entity.ifc_type.clone(),
        global_id: text(0),
        name: text(2),
        attributes,
        placement,
        representation,
        elevation,
    }
}

/// Relation tuples, one per endpoint pair
fn extract_relations(resolver: &dyn EntityResolver) -> Result<Vec<RawRelation>> {
    // (type, kind, attribute holding `from`, attribute holding `to`)
    const LAYOUTS: &[(IfcType, RelationKind, usize, usize)] = &[
        (
            IfcType::IfcRelContainedInSpatialStructure,
            RelationKind::Containment,
            5,
            4,
        ),
        (IfcType::IfcRelAggregates, RelationKind::Aggregation, 5, 4),
        // Openings and projections hang off their host element
        (IfcType::IfcRelVoidsElement, RelationKind::Aggregation, 5, 4),
        (IfcType::IfcRelProjectsElement, RelationKind::Aggregation, 5, 4),
        (IfcType::IfcRelConnectsElements, RelationKind::Connection, 5, 6),
        (
            IfcType::IfcRelConnectsPathElements,
            RelationKind::Connection,
            5,
            6,
        ),
        (IfcType::IfcRelAssignsToGroup, RelationKind::GroupAssignment, 4, 6),
    ];

    let mut relations = Vec::new();
    let mut ids: Vec<(EntityId, usize)> = Vec::new();
    for (layout, (ifc_type, ..)) in LAYOUTS.iter().enumerate() {
        ids.extend(resolver.ids_by_type(ifc_type).into_iter().map(|id| (id, layout)));
    }
    ids.sort_unstable();

    for (id, layout) in ids {
        let (ref relation_type, kind, from_index, to_index) = LAYOUTS[layout];
        let rel = resolver.decode(id)?;

        for from in rel.get_ref_or_refs(from_index) {
            for to in rel.get_ref_or_refs(to_index) {
                relations.push(RawRelation {
                    relation: id,
                    relation_type: relation_type.clone(),
                    kind,
                    from,
                    to,
                });
            }
        }
    }

    Ok(relations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_graph_parser::ParsedModel;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('proj',$,'Project',$,$,$,$,$,$);
#4=IFCSITE('site',$,'Site',$,$,$,$,$,.ELEMENT.,$,$,$,$,$);
#6=IFCBUILDING('bldg',$,'Building',$,$,$,$,$,.ELEMENT.,$,$,$);
#8=IFCBUILDINGSTOREY('st0',$,'Level 0',$,$,#20,$,'Ground',.ELEMENT.,3000.);
#10=IFCWALL('w1',$,'Wall 1','Exterior',$,#20,#21,'T-100',.STANDARD.);
#11=IFCSLAB('s1',$,'Slab',$,$,$,$,$,.FLOOR.);
#12=IFCALIGNMENT('al',$,'Track',$,$,$,$,$);
#13=IFCDISTRIBUTIONSYSTEM('sys',$,'Heating',$,$,$,.HEATING.);
#14=IFCOPENINGELEMENT('o1',$,'Opening',$,$,$,$,$,.OPENING.);
#15=IFCPROJECTIONELEMENT('pr1',$,'Nib',$,$,$,$,$,$);
#20=IFCLOCALPLACEMENT($,$);
#21=IFCPRODUCTDEFINITIONSHAPE($,$,());
#30=IFCRELAGGREGATES('a1',$,$,$,#1,(#4));
#31=IFCRELAGGREGATES('a2',$,$,$,#6,(#8));
#32=IFCRELCONTAINEDINSPATIALSTRUCTURE('c1',$,$,$,(#10,#11,#12),#8);
#33=IFCRELCONNECTSPATHELEMENTS('p1',$,$,$,$,#10,#11,(),(),.ATEND.,.ATSTART.);
#34=IFCRELASSIGNSTOGROUP('g1',$,$,$,(#10,#99),$,#13);
#35=IFCRELVOIDSELEMENT('v1',$,$,$,#10,#14);
#36=IFCRELPROJECTSELEMENT('x1',$,$,$,#11,#15);
ENDSEC;
END-ISO-10303-21;
"#;

    fn extracted() -> ExtractedModel {
        let model = ParsedModel::parse(TEST_IFC, true).unwrap();
        extract(&model, &Vocabulary::builtin()).unwrap()
    }

    #[test]
    fn test_candidates_in_id_order_with_unknown_endpoints() {
        let model = extracted();
        let ids: Vec<u32> = model.entities.iter().map(|e| e.id.0).collect();
        // #12 is unlisted but referenced by a relation; #99 does not exist
        assert_eq!(ids, vec![1, 4, 6, 8, 10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn test_entity_attributes() {
        let model = extracted();
        let wall = model.entities.iter().find(|e| e.id == EntityId(10)).unwrap();
        assert_eq!(wall.global_id.as_deref(), Some("w1"));
        assert_eq!(wall.name.as_deref(), Some("Wall 1"));
        assert_eq!(wall.attributes["description"], "Exterior");
        assert_eq!(wall.attributes["tag"], "T-100");
        assert_eq!(wall.placement, Some(EntityId(20)));
        assert_eq!(wall.representation, Some(EntityId(21)));

        let storey = model.entities.iter().find(|e| e.id == EntityId(8)).unwrap();
        assert_eq!(storey.elevation, Some(3000.0));
        assert_eq!(storey.attributes["long_name"], "Ground");

        let system = model.entities.iter().find(|e| e.id == EntityId(13)).unwrap();
        assert_eq!(system.placement, None);
    }

    #[test]
    fn test_relation_orientation() {
        let model = extracted();
        let find = |kind: RelationKind| -> Vec<(u32, u32)> {
            model
                .relations
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| (r.from.0, r.to.0))
                .collect()
        };

        // Voids and projections point from the feature to its host
        assert_eq!(
            find(RelationKind::Aggregation),
            vec![(4, 1), (8, 6), (14, 10), (15, 11)]
        );
        assert_eq!(
            find(RelationKind::Containment),
            vec![(8, 10), (8, 11), (8, 12)]
        );
        assert_eq!(find(RelationKind::Connection), vec![(10, 11)]);
        assert_eq!(find(RelationKind::GroupAssignment), vec![(10, 13), (99, 13)]);
    }
}
