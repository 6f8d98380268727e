// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Storey resolution
//!
//! A node belongs to every storey reachable by walking up the ownership
//! links: a CONTAINS edge is followed from contained to container and a
//! PART_OF edge from part to whole. The first storey found breadth-first is
//! the node's primary storey.

use crate::graph::{Edge, Node, NodeIndex};
use crate::types::{EdgeType, NodeType};
use std::cmp::Ordering;
use std::collections::VecDeque;

#[derive(Clone, Debug, Default)]
pub struct StoreyIndex {
    primary: Vec<Option<NodeIndex>>,
    reachable: Vec<Vec<NodeIndex>>,
}

impl StoreyIndex {
    /// Resolve storeys for every node
    ///
    /// Storey nodes themselves get no storey.
    pub fn build(
        node_types: &[NodeType],
        edges: impl IntoIterator<Item = (NodeIndex, NodeIndex, EdgeType)>,
    ) -> Self {
        let n = node_types.len();
        let mut upward: Vec<Vec<NodeIndex>> = vec![Vec::new(); n];
        for (src, dst, edge_type) in edges {
            if src >= n || dst >= n {
                continue;
            }
            match edge_type {
                EdgeType::Contains => upward[dst].push(src),
                EdgeType::PartOf => upward[src].push(dst),
                _ => {}
            }
        }

        let mut primary = vec![None; n];
        let mut reachable = vec![Vec::new(); n];
        let mut visited = vec![usize::MAX; n];
        let mut queue = VecDeque::new();

        for start in 0..n {
            if node_types[start] == NodeType::Storey {
                continue;
            }
            visited[start] = start;
            queue.clear();
            queue.push_back(start);
            let mut found = Vec::new();

            while let Some(current) = queue.pop_front() {
                for &next in &upward[current] {
                    if visited[next] == start {
                        continue;
                    }
                    visited[next] = start;
                    if node_types[next] == NodeType::Storey {
                        found.push(next);
                    }
                    queue.push_back(next);
                }
            }

            primary[start] = found.first().copied();
            found.sort_unstable();
            reachable[start] = found;
        }

        Self { primary, reachable }
    }

    /// Build from a node list and edge list
    pub fn from_graph<'a>(nodes: &[Node], edges: impl IntoIterator<Item = &'a Edge>) -> Self {
        let node_types: Vec<NodeType> = nodes.iter().map(|n| n.node_type).collect();
        Self::build(
            &node_types,
            edges.into_iter().map(|e| (e.src, e.dst, e.edge_type)),
        )
    }

    pub fn primary_storey(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.primary.get(node).copied().flatten()
    }

    /// Every storey the node belongs to, ascending by index
    pub fn storeys_of(&self, node: NodeIndex) -> &[NodeIndex] {
        self.reachable.get(node).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Storey nodes from bottom to top
///
/// Sorted by elevation, then by geometry minimum z, then by index; storeys
/// with neither sort last.
pub fn ordered_storeys(nodes: &[Node]) -> Vec<NodeIndex> {
    let mut storeys: Vec<(Option<f64>, NodeIndex)> = nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Storey)
        .map(|n| (storey_level(n), n.index))
        .collect();
    storeys.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => x.total_cmp(&y).then(a.1.cmp(&b.1)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.1.cmp(&b.1),
    });
    storeys.into_iter().map(|(_, index)| index).collect()
}

/// Height of a storey in metres: its elevation, else its geometry minimum z
pub fn storey_level(node: &Node) -> Option<f64> {
    node.elevation
        .filter(|e| e.is_finite())
        .or_else(|| node.geometry.bounds().map(|b| b.min[2]))
}
