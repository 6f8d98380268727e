// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial relation inference
//!
//! Derives ADJACENT, ABOVE and BELOW edges from bounding boxes. Only nodes in
//! the same storey or in vertically neighbouring storeys are compared, and
//! within each comparison set a sweep along x skips pairs that cannot touch.
//!
//! The result only depends on the input: edges are sorted before they are
//! returned, so the parallel and sequential paths agree.

use crate::geometry::BoundingBox;
use crate::graph::{Edge, Node, NodeIndex};
use crate::storey::{ordered_storeys, storey_level, StoreyIndex};
use crate::types::EdgeType;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Default tolerance in metres
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Vertical order of two boxes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stacking {
    FirstAbove,
    SecondAbove,
}

/// Spatial relation between two boxes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PairRelation {
    pub adjacent: bool,
    pub stacking: Option<Stacking>,
}

#[derive(Clone, Copy, Debug)]
pub struct SpatialInferrer {
    tolerance: f64,
    parallel: bool,
}

impl Default for SpatialInferrer {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

/// One participant of a comparison set
#[derive(Clone, Copy)]
struct Candidate<'a> {
    index: NodeIndex,
    bounds: &'a BoundingBox,
    group: usize,
}

impl SpatialInferrer {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.max(0.0),
            parallel: true,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Classify a pair of boxes
    pub fn relate(&self, a: &BoundingBox, b: &BoundingBox) -> PairRelation {
        let eps = self.tolerance;
        let same_level =
            (a.min[2] - b.min[2]).abs() <= eps && (a.max[2] - b.max[2]).abs() <= eps;

        let adjacent =
            a.gap(b, 0) <= eps && a.gap(b, 1) <= eps && (vertical_overlap(a, b, eps) || same_level);

        let horizontal_overlap = a.overlap(b, 0) > eps && a.overlap(b, 1) > eps;
        let stacking = if same_level || !horizontal_overlap {
            None
        } else if rests_on(a, b, eps) {
            Some(Stacking::FirstAbove)
        } else if rests_on(b, a, eps) {
            Some(Stacking::SecondAbove)
        } else {
            None
        };

        PairRelation { adjacent, stacking }
    }

    /// Infer spatial edges for all nodes with geometry
    ///
    /// Storey and system nodes never take part.
    pub fn infer(&self, nodes: &[Node], storeys: &StoreyIndex) -> Vec<Edge> {
        // Group participants by primary storey, bottom to top
        let order = ordered_storeys(nodes);
        let position: FxHashMap<NodeIndex, usize> =
            order.iter().enumerate().map(|(pos, &s)| (s, pos)).collect();
        let levels: Vec<(usize, f64)> = order
            .iter()
            .enumerate()
            .filter_map(|(pos, &s)| nodes.get(s).and_then(storey_level).map(|z| (pos, z)))
            .collect();
        let unassigned = order.len();
        let mut groups: Vec<Vec<Candidate<'_>>> = vec![Vec::new(); order.len() + 1];

        for node in nodes {
            if !node.node_type.is_physical() {
                continue;
            }
            let Some(bounds) = node.geometry.bounds() else {
                continue;
            };
            let group = storeys
                .primary_storey(node.index)
                .and_then(|s| position.get(&s).copied())
                .or_else(|| self.level_group(&levels, bounds))
                .unwrap_or(unassigned);
            groups[group].push(Candidate {
                index: node.index,
                bounds,
                group,
            });
        }

        // Comparison sets: each group alone, plus each pair of neighbouring
        // storeys compared across the boundary only
        let mut sets: Vec<(Vec<Candidate<'_>>, bool)> = Vec::new();
        for group in &groups {
            if group.len() > 1 {
                sets.push((group.clone(), false));
            }
        }
        for pair in groups[..unassigned].windows(2) {
            if !pair[0].is_empty() && !pair[1].is_empty() {
                let mut merged = pair[0].clone();
                merged.extend_from_slice(&pair[1]);
                sets.push((merged, true));
            }
        }

        let mut edges: Vec<Edge> = Vec::new();
        for (mut set, cross_only) in sets {
            set.sort_by(|a, b| {
                a.bounds.min[0]
                    .total_cmp(&b.bounds.min[0])
                    .then(a.index.cmp(&b.index))
            });
            edges.extend(self.sweep(&set, cross_only));
        }

        edges.sort_unstable_by_key(|e| (e.src, e.dst, e.edge_type.id()));
        edges.dedup();

        debug!(
            participants = groups.iter().map(Vec::len).sum::<usize>(),
            edges = edges.len(),
            "spatial inference finished"
        );
        edges
    }

    /// Group of a node no storey owns: the highest storey level at or below
    /// its bottom face, or the lowest storey when it sits below all of them
    fn level_group(&self, levels: &[(usize, f64)], bounds: &BoundingBox) -> Option<usize> {
        let bottom = bounds.min[2] + self.tolerance;
        levels
            .iter()
            .take_while(|(_, z)| *z <= bottom)
            .last()
            .or_else(|| levels.first())
            .map(|(pos, _)| *pos)
    }

    /// Compare every candidate with those after it whose x range can still
    /// reach it
    fn sweep(&self, set: &[Candidate<'_>], cross_only: bool) -> Vec<Edge> {
        let from = |i: usize| {
            let a = set[i];
            let mut out = Vec::new();
            for b in &set[i + 1..] {
                if b.bounds.min[0] - a.bounds.max[0] > self.tolerance {
                    break;
                }
                if cross_only && a.group == b.group {
                    continue;
                }
                self.emit(a.index, a.bounds, b.index, b.bounds, &mut out);
            }
            out
        };

        if self.parallel {
            (0..set.len()).into_par_iter().flat_map_iter(from).collect()
        } else {
            (0..set.len()).flat_map(from).collect()
        }
    }

    fn emit(
        &self,
        a: NodeIndex,
        a_bounds: &BoundingBox,
        b: NodeIndex,
        b_bounds: &BoundingBox,
        out: &mut Vec<Edge>,
    ) {
        let relation = self.relate(a_bounds, b_bounds);
        if relation.adjacent {
            out.push(Edge::new(a.min(b), a.max(b), EdgeType::Adjacent));
        }
        let (upper, lower) = match relation.stacking {
            Some(Stacking::FirstAbove) => (a, b),
            Some(Stacking::SecondAbove) => (b, a),
            None => return,
        };
        out.push(Edge::new(upper, lower, EdgeType::Above));
        out.push(Edge::new(lower, upper, EdgeType::Below));
    }
}

/// Whether the z ranges share more than a touching face
///
/// Elements thinner than the tolerance count when they lie inside the other
/// range, so a plate halfway up a wall still overlaps it.
fn vertical_overlap(a: &BoundingBox, b: &BoundingBox, eps: f64) -> bool {
    a.overlap(b, 2) > eps || within_z(a, b, eps) || within_z(b, a, eps)
}

/// `inner` lies strictly between the bottom and top faces of `outer`
fn within_z(inner: &BoundingBox, outer: &BoundingBox, eps: f64) -> bool {
    inner.min[2] > outer.min[2] + eps && inner.max[2] < outer.max[2] - eps
}

/// Whether `upper` sits on or above `lower` without being flat against it
fn rests_on(upper: &BoundingBox, lower: &BoundingBox, eps: f64) -> bool {
    upper.min[2] >= lower.max[2] - eps && lower.min[2] < upper.max[2] - eps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::NodeGeometry;
    use crate::types::NodeType;
    use ifc_graph_model::EntityId;
    use std::collections::BTreeMap;

    fn node(index: NodeIndex, node_type: NodeType, bounds: Option<([f64; 3], [f64; 3])>) -> Node {
        Node {
            index,
            id: format!("n{index}"),
            entity: EntityId(index as u32 + 1),
            ifc_type: "IfcWall".to_string(),
            node_type,
            name: None,
            attributes: BTreeMap::new(),
            geometry: match bounds {
                Some((min, max)) => NodeGeometry::Bounded(BoundingBox::new(min, max)),
                None => NodeGeometry::Missing,
            },
            elevation: None,
        }
    }

    fn bbox(min: [f64; 3], max: [f64; 3]) -> BoundingBox {
        BoundingBox::new(min, max)
    }

    #[test]
    fn test_face_sharing_boxes_are_adjacent() {
        let inferrer = SpatialInferrer::default();
        let r = inferrer.relate(
            &bbox([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]),
            &bbox([1.0, 0.0, 0.0], [2.0, 1.0, 1.0]),
        );
        assert_eq!(
            r,
            PairRelation {
                adjacent: true,
                stacking: None
            }
        );
    }

    #[test]
    fn test_stacked_boxes() {
        let inferrer = SpatialInferrer::default();
        let a = bbox([0.0, 0.0, 0.0], [1.0, 1.0, 3.0]);
        let b = bbox([0.0, 0.0, 3.0], [1.0, 1.0, 6.0]);
        let r = inferrer.relate(&a, &b);
        assert!(!r.adjacent);
        assert_eq!(r.stacking, Some(Stacking::SecondAbove));
        assert_eq!(inferrer.relate(&b, &a).stacking, Some(Stacking::FirstAbove));
    }

    #[test]
    fn test_stacked_without_horizontal_overlap() {
        let inferrer = SpatialInferrer::default();
        let a = bbox([0.0, 0.0, 0.0], [1.0, 1.0, 3.0]);
        let b = bbox([5.0, 0.0, 3.0], [6.0, 1.0, 6.0]);
        assert_eq!(inferrer.relate(&a, &b), PairRelation::default());
    }

    #[test]
    fn test_equal_z_ranges_are_never_stacked() {
        let inferrer = SpatialInferrer::default();
        let a = bbox([0.0, 0.0, 2.0], [1.0, 1.0, 2.0]);
        let b = bbox([0.5, 0.5, 2.0], [1.5, 1.5, 2.0]);
        let r = inferrer.relate(&a, &b);
        assert!(r.adjacent);
        assert_eq!(r.stacking, None);
    }

    #[test]
    fn test_gap_within_tolerance() {
        let inferrer = SpatialInferrer::new(0.01);
        let a = bbox([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        assert!(inferrer.relate(&a, &bbox([1.005, 0.0, 0.0], [2.0, 1.0, 1.0])).adjacent);
        assert!(!inferrer.relate(&a, &bbox([1.05, 0.0, 0.0], [2.0, 1.0, 1.0])).adjacent);
    }

    #[test]
    fn test_thin_element_inside_neighbour_height_is_adjacent() {
        let inferrer = SpatialInferrer::default();
        let wall = bbox([0.0, 0.0, 0.0], [1.0, 1.0, 3.0]);
        let plate = bbox([1.0, 0.0, 1.5], [2.0, 1.0, 1.505]);
        let r = inferrer.relate(&wall, &plate);
        assert_eq!(
            r,
            PairRelation {
                adjacent: true,
                stacking: None
            }
        );
        assert_eq!(inferrer.relate(&plate, &wall), r);

        // Resting on the top face is stacking, not adjacency
        let cap = bbox([0.0, 0.0, 3.0], [1.0, 1.0, 3.005]);
        let r = inferrer.relate(&cap, &wall);
        assert!(!r.adjacent);
        assert_eq!(r.stacking, Some(Stacking::FirstAbove));
    }

    #[test]
    fn test_storeyless_nodes_binned_by_height() {
        let mut nodes = vec![
            node(0, NodeType::Storey, None),
            node(1, NodeType::Storey, None),
            node(2, NodeType::Storey, None),
            node(3, NodeType::Element, Some(([0.0, 0.0, 0.0], [1.0, 1.0, 3.0]))),
            node(4, NodeType::ElementSubtype, Some(([1.0, 0.0, 1.0], [2.0, 1.0, 2.0]))),
            node(5, NodeType::ElementSubtype, Some(([1.0, 0.0, 7.0], [2.0, 1.0, 8.0]))),
        ];
        nodes[0].elevation = Some(0.0);
        nodes[1].elevation = Some(3.0);
        nodes[2].elevation = Some(6.0);
        let types: Vec<NodeType> = nodes.iter().map(|n| n.node_type).collect();
        let storeys = StoreyIndex::build(&types, [(0, 3, EdgeType::Contains)]);

        // 4 lands on the ground storey next to the wall; 5 is two storeys up
        // and is never compared with 4
        let edges = SpatialInferrer::default().infer(&nodes, &storeys);
        assert_eq!(edges, vec![Edge::new(3, 4, EdgeType::Adjacent)]);
    }

    #[test]
    fn test_infer_respects_storey_neighbourhood() {
        // Storeys 0 (z 0), 1 (z 3), 2 (z 6); element per storey stacked in a column
        let mut nodes = vec![
            node(0, NodeType::Storey, None),
            node(1, NodeType::Storey, None),
            node(2, NodeType::Storey, None),
            node(3, NodeType::Element, Some(([0.0, 0.0, 0.0], [1.0, 1.0, 3.0]))),
            node(4, NodeType::Element, Some(([0.0, 0.0, 3.0], [1.0, 1.0, 6.0]))),
            node(5, NodeType::Element, Some(([0.0, 0.0, 6.0], [1.0, 1.0, 9.0]))),
            node(6, NodeType::System, Some(([0.0, 0.0, 0.0], [1.0, 1.0, 9.0]))),
            node(7, NodeType::Element, None),
        ];
        nodes[0].elevation = Some(0.0);
        nodes[1].elevation = Some(3.0);
        nodes[2].elevation = Some(6.0);
        let types: Vec<NodeType> = nodes.iter().map(|n| n.node_type).collect();
        let storeys = StoreyIndex::build(
            &types,
            [
                (0, 3, EdgeType::Contains),
                (1, 4, EdgeType::Contains),
                (2, 5, EdgeType::Contains),
            ],
        );

        let edges = SpatialInferrer::default().infer(&nodes, &storeys);
        assert_eq!(
            edges,
            vec![
                Edge::new(3, 4, EdgeType::Below),
                Edge::new(4, 3, EdgeType::Above),
                Edge::new(4, 5, EdgeType::Below),
                Edge::new(5, 4, EdgeType::Above),
            ]
        );
    }

    #[test]
    fn test_unassigned_nodes_compared_among_themselves() {
        let nodes = vec![
            node(0, NodeType::Element, Some(([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]))),
            node(1, NodeType::Space, Some(([1.0, 0.0, 0.0], [2.0, 1.0, 1.0]))),
        ];
        let storeys = StoreyIndex::build(&[NodeType::Element, NodeType::Space], []);
        let edges = SpatialInferrer::default().infer(&nodes, &storeys);
        assert_eq!(edges, vec![Edge::new(0, 1, EdgeType::Adjacent)]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut nodes = vec![node(0, NodeType::Storey, None)];
        let mut contains = Vec::new();
        for i in 0..40 {
            let x = (i % 8) as f64;
            let z = (i / 8) as f64;
            let index = nodes.len();
            nodes.push(node(
                index,
                NodeType::Element,
                Some(([x, 0.0, z], [x + 1.0, 1.0, z + 1.0])),
            ));
            contains.push((0, index, EdgeType::Contains));
        }
        let types: Vec<NodeType> = nodes.iter().map(|n| n.node_type).collect();
        let storeys = StoreyIndex::build(&types, contains);

        let parallel = SpatialInferrer::default().infer(&nodes, &storeys);
        let sequential = SpatialInferrer::default()
            .with_parallel(false)
            .infer(&nodes, &storeys);
        assert_eq!(parallel, sequential);
        assert!(parallel.iter().any(|e| e.edge_type == EdgeType::Adjacent));
        assert!(parallel.iter().any(|e| e.edge_type == EdgeType::Above));
    }
}
