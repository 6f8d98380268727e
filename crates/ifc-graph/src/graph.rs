// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed multi-relational graph
//!
//! Nodes and edges live in arenas addressed by dense indices. The builder is
//! the only way to add to them; [`GraphBuilder::finish`] freezes the graph and
//! builds the adjacency lists.

use crate::error::Warning;
use crate::extract::{RawRelation, RelationKind};
use crate::filter::KeptEntity;
use crate::geometry::NodeGeometry;
use crate::types::{EdgeType, NodeType};
use ifc_graph_model::EntityId;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

/// Dense node index; also the row index in `nodes.csv`
pub type NodeIndex = usize;

#[derive(Clone, Debug)]
pub struct Node {
    pub index: NodeIndex,
    /// Stable identifier, `<TypeName>_<GlobalId>`
    pub id: String,
    pub entity: EntityId,
    /// Schema spelling of the IFC type, e.g. `IfcWall`
    pub ifc_type: String,
    pub node_type: NodeType,
    pub name: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub geometry: NodeGeometry,
    /// Storey elevation in metres
    pub elevation: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub src: NodeIndex,
    pub dst: NodeIndex,
    pub edge_type: EdgeType,
}

impl Edge {
    pub fn new(src: NodeIndex, dst: NodeIndex, edge_type: EdgeType) -> Self {
        Self { src, dst, edge_type }
    }

    /// Stored form: ADJACENT always runs from the lower index
    fn canonical(self) -> Self {
        if self.edge_type.is_symmetric() && self.src > self.dst {
            Self::new(self.dst, self.src, self.edge_type)
        } else {
            self
        }
    }
}

/// Which relation families become edges
#[derive(Clone, Copy, Debug)]
pub struct RelationOptions {
    pub include_connects: bool,
    pub include_systems: bool,
}

impl Default for RelationOptions {
    fn default() -> Self {
        Self {
            include_connects: true,
            include_systems: true,
        }
    }
}

/// What became of one relation tuple
#[derive(Clone, Debug, PartialEq)]
pub enum RelationOutcome {
    Added(Edge),
    /// Same edge already present, or a self-loop
    Duplicate,
    /// Relation family switched off
    Skipped,
    Dangling(Warning),
}

/// Mutable graph under construction
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    by_entity: FxHashMap<EntityId, NodeIndex>,
    by_id: FxHashMap<String, NodeIndex>,
    edge_set: FxHashSet<Edge>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            by_entity: FxHashMap::with_capacity_and_hasher(nodes, Default::default()),
            by_id: FxHashMap::with_capacity_and_hasher(nodes, Default::default()),
            ..Self::default()
        }
    }

    /// Add a node for a kept entity
    ///
    /// Adding the same entity twice returns the existing index. A GlobalId
    /// already used by another node gets the entity number appended.
    pub fn add_node(
        &mut self,
        kept: &KeptEntity,
        geometry: NodeGeometry,
        unit_scale: f64,
    ) -> NodeIndex {
        let entity = &kept.entity;
        if let Some(&index) = self.by_entity.get(&entity.id) {
            return index;
        }

        let mut id = match &entity.global_id {
            Some(global_id) => format!("{}_{}", kept.type_name, global_id),
            None => format!("{}_{}", kept.type_name, entity.id.0),
        };
        if self.by_id.contains_key(&id) {
            id = format!("{}_{}", id, entity.id.0);
        }

        let index = self.nodes.len();
        self.by_entity.insert(entity.id, index);
        self.by_id.insert(id.clone(), index);
        self.nodes.push(Node {
            index,
            id,
            entity: entity.id,
            ifc_type: kept.type_name.clone(),
            node_type: kept.node_type,
            name: entity.name.clone(),
            attributes: entity.attributes.clone(),
            geometry,
            elevation: entity.elevation.map(|e| e * unit_scale),
        });
        index
    }

    pub fn node_index(&self, entity: EntityId) -> Option<NodeIndex> {
        self.by_entity.get(&entity).copied()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Add an edge; returns false for self-loops and duplicates
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if edge.src == edge.dst || edge.src >= self.nodes.len() || edge.dst >= self.nodes.len() {
            return false;
        }
        let edge = edge.canonical();
        if !self.edge_set.insert(edge) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Turn one relation tuple into an edge
    pub fn add_relation(&mut self, relation: &RawRelation, options: RelationOptions) -> RelationOutcome {
        let edge_type = match relation.kind {
            RelationKind::Containment => EdgeType::Contains,
            RelationKind::Aggregation => EdgeType::PartOf,
            RelationKind::Connection if options.include_connects => EdgeType::Connects,
            RelationKind::GroupAssignment if options.include_systems => EdgeType::PartOf,
            RelationKind::Connection | RelationKind::GroupAssignment => {
                return RelationOutcome::Skipped
            }
        };

        let (src, dst) = match (self.node_index(relation.from), self.node_index(relation.to)) {
            (Some(src), Some(dst)) => (src, dst),
            (from, _) => {
                let missing = if from.is_none() {
                    relation.from
                } else {
                    relation.to
                };
                return RelationOutcome::Dangling(Warning::DanglingRelation {
                    relation: relation.relation,
                    relation_type: relation
                        .relation_type
                        .schema_name()
                        .unwrap_or_else(|| relation.relation_type.name())
                        .to_string(),
                    missing,
                });
            }
        };

        // Only systems collect members; zones and plain groups never become nodes
        if relation.kind == RelationKind::GroupAssignment
            && self.nodes[dst].node_type != NodeType::System
        {
            return RelationOutcome::Skipped;
        }

        let edge = Edge::new(src, dst, edge_type);
        if self.add_edge(edge) {
            RelationOutcome::Added(edge)
        } else {
            RelationOutcome::Duplicate
        }
    }

    /// Freeze the graph
    pub fn finish(self) -> TypedGraph {
        let mut outgoing = vec![Vec::new(); self.nodes.len()];
        let mut incoming = vec![Vec::new(); self.nodes.len()];
        for (i, edge) in self.edges.iter().enumerate() {
            outgoing[edge.src].push(i);
            incoming[edge.dst].push(i);
        }
        TypedGraph {
            nodes: self.nodes,
            edges: self.edges,
            by_entity: self.by_entity,
            by_id: self.by_id,
            edge_set: self.edge_set,
            outgoing,
            incoming,
        }
    }
}

/// Immutable typed graph
#[derive(Debug)]
pub struct TypedGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    by_entity: FxHashMap<EntityId, NodeIndex>,
    by_id: FxHashMap<String, NodeIndex>,
    edge_set: FxHashSet<Edge>,
    /// Edge positions per source node
    outgoing: Vec<Vec<usize>>,
    /// Edge positions per target node
    incoming: Vec<Vec<usize>>,
}

impl TypedGraph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn index_of_entity(&self, entity: EntityId) -> Option<NodeIndex> {
        self.by_entity.get(&entity).copied()
    }

    pub fn index_of_id(&self, id: &str) -> Option<NodeIndex> {
        self.by_id.get(id).copied()
    }

    pub fn outgoing(&self, index: NodeIndex) -> impl Iterator<Item = &Edge> + '_ {
        self.outgoing
            .get(index)
            .into_iter()
            .flatten()
            .map(move |&i| &self.edges[i])
    }

    pub fn incoming(&self, index: NodeIndex) -> impl Iterator<Item = &Edge> + '_ {
        self.incoming
            .get(index)
            .into_iter()
            .flatten()
            .map(move |&i| &self.edges[i])
    }

    /// Whether `a` relates to `b`; symmetric for ADJACENT
    pub fn has_relation(&self, a: NodeIndex, b: NodeIndex, edge_type: EdgeType) -> bool {
        self.edge_set
            .contains(&Edge::new(a, b, edge_type).canonical())
    }

    pub fn edges_of_type(&self, edge_type: EdgeType) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.edge_type == edge_type)
    }

    pub fn count_edges(&self, edge_type: EdgeType) -> usize {
        self.edges_of_type(edge_type).count()
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(move |n| n.node_type == node_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractedEntity;
    use ifc_graph_model::IfcType;

    fn kept(id: u32, type_name: &str, node_type: NodeType, guid: Option<&str>) -> KeptEntity {
        KeptEntity {
            entity: ExtractedEntity {
                id: EntityId(id),
                ifc_type: IfcType::parse(type_name),
                global_id: guid.map(str::to_string),
                name: Some(format!("n{id}")),
                attributes: BTreeMap::new(),
                placement: None,
                representation: None,
                elevation: Some(3000.0),
            },
            node_type,
            type_name: type_name.to_string(),
        }
    }

    fn relation(id: u32, kind: RelationKind, from: u32, to: u32) -> RawRelation {
        RawRelation {
            relation: EntityId(id),
            relation_type: IfcType::IfcRelContainedInSpatialStructure,
            kind,
            from: EntityId(from),
            to: EntityId(to),
        }
    }

    #[test]
    fn test_node_ids() {
        let mut builder = GraphBuilder::new();
        let a = builder.add_node(&kept(1, "IfcWall", NodeType::Element, Some("abc")), NodeGeometry::Missing, 0.001);
        let b = builder.add_node(&kept(2, "IfcWall", NodeType::Element, Some("abc")), NodeGeometry::Missing, 1.0);
        let c = builder.add_node(&kept(3, "IfcSlab", NodeType::Element, None), NodeGeometry::Missing, 1.0);
        let again = builder.add_node(&kept(1, "IfcWall", NodeType::Element, Some("abc")), NodeGeometry::Missing, 1.0);

        assert_eq!((a, b, c, again), (0, 1, 2, 0));
        let graph = builder.finish();
        assert_eq!(graph.nodes()[0].id, "IfcWall_abc");
        assert_eq!(graph.nodes()[1].id, "IfcWall_abc_2");
        assert_eq!(graph.nodes()[2].id, "IfcSlab_3");
        assert_eq!(graph.nodes()[0].elevation, Some(3.0));
        assert_eq!(graph.index_of_id("IfcSlab_3"), Some(2));
    }

    #[test]
    fn test_relations_and_dangling() {
        let mut builder = GraphBuilder::new();
        builder.add_node(&kept(10, "IfcBuildingStorey", NodeType::Storey, Some("s")), NodeGeometry::Missing, 1.0);
        builder.add_node(&kept(11, "IfcWall", NodeType::Element, Some("w")), NodeGeometry::Missing, 1.0);
        builder.add_node(&kept(12, "IfcDistributionSystem", NodeType::System, Some("sys")), NodeGeometry::Missing, 1.0);

        let options = RelationOptions::default();
        assert_eq!(
            builder.add_relation(&relation(20, RelationKind::Containment, 10, 11), options),
            RelationOutcome::Added(Edge::new(0, 1, EdgeType::Contains))
        );
        assert_eq!(
            builder.add_relation(&relation(21, RelationKind::Containment, 10, 11), options),
            RelationOutcome::Duplicate
        );
        // Storey aggregated into a dropped building
        assert!(matches!(
            builder.add_relation(&relation(22, RelationKind::Aggregation, 10, 99), options),
            RelationOutcome::Dangling(Warning::DanglingRelation { missing: EntityId(99), .. })
        ));
        assert_eq!(
            builder.add_relation(&relation(23, RelationKind::GroupAssignment, 11, 12), options),
            RelationOutcome::Added(Edge::new(1, 2, EdgeType::PartOf))
        );
        let no_systems = RelationOptions {
            include_systems: false,
            ..options
        };
        assert_eq!(
            builder.add_relation(&relation(24, RelationKind::GroupAssignment, 11, 12), no_systems),
            RelationOutcome::Skipped
        );

        let graph = builder.finish();
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.outgoing(0).count(), 1);
        assert_eq!(graph.incoming(1).count(), 1);
    }

    #[test]
    fn test_adjacent_is_symmetric_and_self_loops_dropped() {
        let mut builder = GraphBuilder::new();
        builder.add_node(&kept(1, "IfcWall", NodeType::Element, Some("a")), NodeGeometry::Missing, 1.0);
        builder.add_node(&kept(2, "IfcWall", NodeType::Element, Some("b")), NodeGeometry::Missing, 1.0);

        assert!(builder.add_edge(Edge::new(1, 0, EdgeType::Adjacent)));
        assert!(!builder.add_edge(Edge::new(0, 1, EdgeType::Adjacent)));
        assert!(!builder.add_edge(Edge::new(1, 1, EdgeType::Connects)));
        assert!(builder.add_edge(Edge::new(1, 0, EdgeType::Above)));
        assert!(builder.add_edge(Edge::new(0, 1, EdgeType::Below)));

        let graph = builder.finish();
        assert_eq!(graph.edges()[0], Edge::new(0, 1, EdgeType::Adjacent));
        assert!(graph.has_relation(1, 0, EdgeType::Adjacent));
        assert!(graph.has_relation(0, 1, EdgeType::Adjacent));
        assert!(graph.has_relation(1, 0, EdgeType::Above));
        assert!(!graph.has_relation(0, 1, EdgeType::Above));
        assert_eq!(graph.count_edges(EdgeType::Below), 1);
    }
}
