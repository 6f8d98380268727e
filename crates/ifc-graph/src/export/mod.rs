// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dual exporter
//!
//! [`GraphDocument`] is the authoritative form of a built graph and is what
//! `graph.json` holds. The tensor tables and the fact file are projections
//! of a document, so they can be regenerated from `graph.json` alone.

mod facts;
mod tables;

pub use facts::{derive_facts, write_facts, Fact, HAS_NAME, HAS_TYPE, IN_STOREY};
pub use tables::{write_edges_csv, write_nodes_csv, EdgeRow, NodeRow};

use crate::config::OutputNames;
use crate::error::{GraphError, Result};
use crate::graph::TypedGraph;
use crate::report::BuildReport;
use crate::types::{EdgeType, NodeType};
use ifc_graph_model::ModelMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// One row of a type→id table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeId {
    pub id: u8,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometryRecord {
    pub bbox_min: [f64; 3],
    pub bbox_max: [f64; 3],
    pub centroid: [f64; 3],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub idx: usize,
    pub id: String,
    /// STEP entity number
    pub entity: u32,
    pub ifc_type: String,
    pub node_type: NodeType,
    pub node_type_id: u8,
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    /// `null` when the node has no usable geometry
    pub geometry: Option<GeometryRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub src: String,
    pub dst: String,
    pub src_idx: usize,
    pub dst_idx: usize,
    pub edge_type: EdgeType,
    pub edge_type_id: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub schema: String,
    pub source: Option<String>,
    pub unit_scale: f64,
    pub node_types: Vec<TypeId>,
    pub edge_types: Vec<TypeId>,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    pub report: BuildReport,
}

/// Paths of the files written by [`GraphDocument::write_all`]
#[derive(Clone, Debug)]
pub struct OutputPaths {
    pub graph_json: PathBuf,
    pub nodes_csv: PathBuf,
    pub edges_csv: PathBuf,
    pub facts_tsv: PathBuf,
}

pub fn node_type_table() -> Vec<TypeId> {
    NodeType::ALL
        .iter()
        .map(|t| TypeId {
            id: t.id(),
            name: t.name().to_string(),
        })
        .collect()
}

pub fn edge_type_table() -> Vec<TypeId> {
    EdgeType::ALL
        .iter()
        .map(|t| TypeId {
            id: t.id(),
            name: t.name().to_string(),
        })
        .collect()
}

impl GraphDocument {
    pub fn from_graph(
        graph: &TypedGraph,
        metadata: &ModelMetadata,
        unit_scale: f64,
        report: BuildReport,
    ) -> Self {
        let nodes = graph
            .nodes()
            .iter()
            .map(|node| NodeRecord {
                idx: node.index,
                id: node.id.clone(),
                entity: node.entity.0,
                ifc_type: node.ifc_type.clone(),
                node_type: node.node_type,
                node_type_id: node.node_type.id(),
                name: node.name.clone(),
                attributes: node.attributes.clone(),
                elevation: node.elevation,
                geometry: node.geometry.bounds().map(|b| GeometryRecord {
                    bbox_min: b.min,
                    bbox_max: b.max,
                    centroid: b.centroid(),
                }),
            })
            .collect();

        let edges = graph
            .edges()
            .iter()
            .map(|edge| EdgeRecord {
                src: graph.nodes()[edge.src].id.clone(),
                dst: graph.nodes()[edge.dst].id.clone(),
                src_idx: edge.src,
                dst_idx: edge.dst,
                edge_type: edge.edge_type,
                edge_type_id: edge.edge_type.id(),
            })
            .collect();

        Self {
            schema: metadata.schema_version.clone(),
            source: metadata.file_name.clone(),
            unit_scale,
            node_types: node_type_table(),
            edge_types: edge_type_table(),
            nodes,
            edges,
            report,
        }
    }

    /// Read a document back from `graph.json`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| GraphError::io(path, e))?;
        let document: Self = serde_json::from_reader(BufReader::new(file))?;
        document.validate()?;
        Ok(document)
    }

    /// Check indices, ids and type tables agree
    pub fn validate(&self) -> Result<()> {
        if self.node_types != node_type_table() || self.edge_types != edge_type_table() {
            return Err(GraphError::Document(
                "type id tables differ from this version".into(),
            ));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.idx != i || node.node_type_id != node.node_type.id() {
                return Err(GraphError::Document(format!(
                    "node {} is out of order or mistyped",
                    node.id
                )));
            }
        }
        for edge in &self.edges {
            let endpoints = (self.nodes.get(edge.src_idx), self.nodes.get(edge.dst_idx));
            let (Some(src), Some(dst)) = endpoints else {
                return Err(GraphError::Document(format!(
                    "edge {} -> {} references a missing node",
                    edge.src, edge.dst
                )));
            };
            if src.id != edge.src || dst.id != edge.dst || edge.edge_type_id != edge.edge_type.id()
            {
                return Err(GraphError::Document(format!(
                    "edge {} -> {} does not match its endpoints",
                    edge.src, edge.dst
                )));
            }
        }
        Ok(())
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| GraphError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_json(&mut writer)?;
        writer.flush().map_err(|e| GraphError::io(path, e))?;
        Ok(())
    }

    /// Write `graph.json` and its three projections into `dir`
    pub fn write_all(&self, dir: impl AsRef<Path>, names: &OutputNames) -> Result<OutputPaths> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| GraphError::io(dir, e))?;
        let paths = OutputPaths {
            graph_json: dir.join(&names.graph_json),
            nodes_csv: dir.join(&names.nodes_csv),
            edges_csv: dir.join(&names.edges_csv),
            facts_tsv: dir.join(&names.facts_tsv),
        };

        self.save(&paths.graph_json)?;
        write_with(&paths.nodes_csv, |w| write_nodes_csv(self, w))?;
        write_with(&paths.edges_csv, |w| write_edges_csv(self, w))?;
        let facts = derive_facts(self);
        write_with(&paths.facts_tsv, |w| write_facts(&facts, w))?;

        info!(
            dir = %dir.display(),
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            facts = facts.len(),
            "exports written"
        );
        Ok(paths)
    }
}

fn write_with(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> Result<()>) -> Result<()> {
    let file = File::create(path).map_err(|e| GraphError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush().map_err(|e| GraphError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_document() -> GraphDocument {
        let node = |idx: usize, id: &str, ifc_type: &str, node_type: NodeType, geometry| NodeRecord {
            idx,
            id: id.to_string(),
            entity: idx as u32 + 10,
            ifc_type: ifc_type.to_string(),
            node_type,
            node_type_id: node_type.id(),
            name: Some(format!("name {idx}")),
            attributes: BTreeMap::new(),
            elevation: None,
            geometry,
        };
        let edge = |src: usize, dst: usize, ids: (&str, &str), edge_type: EdgeType| EdgeRecord {
            src: ids.0.to_string(),
            dst: ids.1.to_string(),
            src_idx: src,
            dst_idx: dst,
            edge_type,
            edge_type_id: edge_type.id(),
        };
        let boxed = |min: [f64; 3], max: [f64; 3]| {
            Some(GeometryRecord {
                bbox_min: min,
                bbox_max: max,
                centroid: [
                    (min[0] + max[0]) / 2.0,
                    (min[1] + max[1]) / 2.0,
                    (min[2] + max[2]) / 2.0,
                ],
            })
        };

        GraphDocument {
            schema: "IFC4".into(),
            source: Some("sample.ifc".into()),
            unit_scale: 1.0,
            node_types: node_type_table(),
            edge_types: edge_type_table(),
            nodes: vec![
                node(0, "IfcBuildingStorey_s", "IfcBuildingStorey", NodeType::Storey, None),
                node(1, "IfcWall_a", "IfcWall", NodeType::Element, boxed([0.0; 3], [1.0; 3])),
                node(2, "IfcWall_b", "IfcWall", NodeType::Element, boxed([1.0, 0.0, 0.0], [2.0, 1.0, 1.0])),
            ],
            edges: vec![
                edge(0, 1, ("IfcBuildingStorey_s", "IfcWall_a"), EdgeType::Contains),
                edge(0, 2, ("IfcBuildingStorey_s", "IfcWall_b"), EdgeType::Contains),
                edge(1, 2, ("IfcWall_a", "IfcWall_b"), EdgeType::Adjacent),
            ],
            report: BuildReport::default(),
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let document = sample_document();
        document.save(&path).unwrap();

        let loaded = GraphDocument::load(&path).unwrap();
        assert_eq!(loaded, document);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["edges"][2]["edge_type"], "ADJACENT");
        assert_eq!(json["nodes"][0]["node_type"], "Storey");
        assert!(json["nodes"][0]["geometry"].is_null());
    }

    #[test]
    fn test_validate_rejects_bad_edge() {
        let mut document = sample_document();
        document.edges[0].dst_idx = 7;
        assert!(matches!(document.validate(), Err(GraphError::Document(_))));
    }

    #[test]
    fn test_write_all() {
        let dir = tempfile::tempdir().unwrap();
        let paths = sample_document()
            .write_all(dir.path().join("out"), &OutputNames::default())
            .unwrap();
        for path in [&paths.graph_json, &paths.nodes_csv, &paths.edges_csv, &paths.facts_tsv] {
            assert!(path.exists(), "{} missing", path.display());
        }
    }

    #[test]
    fn test_type_tables_are_fixed() {
        let nodes = node_type_table();
        assert_eq!(nodes[3], TypeId { id: 3, name: "Storey".into() });
        let edges = edge_type_table();
        assert_eq!(edges[1], TypeId { id: 1, name: "PART_OF".into() });
        assert_eq!(edges.len(), 6);
    }
}
