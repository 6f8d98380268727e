// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `nodes.csv` and `edges.csv`: integer-typed tables for tensor loaders

use super::GraphDocument;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// One `nodes.csv` row; geometry cells are empty when a node has none
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRow {
    pub node_idx: usize,
    pub node_id: String,
    pub node_type: String,
    pub node_type_id: u8,
    pub bbox_min_x: Option<f64>,
    pub bbox_min_y: Option<f64>,
    pub bbox_min_z: Option<f64>,
    pub bbox_max_x: Option<f64>,
    pub bbox_max_y: Option<f64>,
    pub bbox_max_z: Option<f64>,
    pub centroid_x: Option<f64>,
    pub centroid_y: Option<f64>,
    pub centroid_z: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub src_id: String,
    pub dst_id: String,
    pub src_idx: usize,
    pub dst_idx: usize,
    pub edge_type: String,
    pub edge_type_id: u8,
}

pub fn write_nodes_csv<W: Write>(document: &GraphDocument, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for node in &document.nodes {
        let g = node.geometry.as_ref();
        let at = |pick: fn(&super::GeometryRecord) -> f64| g.map(pick);
        csv.serialize(NodeRow {
            node_idx: node.idx,
            node_id: node.id.clone(),
            node_type: node.node_type.name().to_string(),
            node_type_id: node.node_type_id,
            bbox_min_x: at(|g| g.bbox_min[0]),
            bbox_min_y: at(|g| g.bbox_min[1]),
            bbox_min_z: at(|g| g.bbox_min[2]),
            bbox_max_x: at(|g| g.bbox_max[0]),
            bbox_max_y: at(|g| g.bbox_max[1]),
            bbox_max_z: at(|g| g.bbox_max[2]),
            centroid_x: at(|g| g.centroid[0]),
            centroid_y: at(|g| g.centroid[1]),
            centroid_z: at(|g| g.centroid[2]),
        })?;
    }
    // An empty graph still gets its header row
    if document.nodes.is_empty() {
        csv.write_record([
            "node_idx", "node_id", "node_type", "node_type_id", "bbox_min_x", "bbox_min_y",
            "bbox_min_z", "bbox_max_x", "bbox_max_y", "bbox_max_z", "centroid_x", "centroid_y",
            "centroid_z",
        ])?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_edges_csv<W: Write>(document: &GraphDocument, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for edge in &document.edges {
        csv.serialize(EdgeRow {
            src_id: edge.src.clone(),
            dst_id: edge.dst.clone(),
            src_idx: edge.src_idx,
            dst_idx: edge.dst_idx,
            edge_type: edge.edge_type.name().to_string(),
            edge_type_id: edge.edge_type_id,
        })?;
    }
    if document.edges.is_empty() {
        csv.write_record(["src_id", "dst_id", "src_idx", "dst_idx", "edge_type", "edge_type_id"])?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}
