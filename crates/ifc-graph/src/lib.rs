// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC Graph
//!
//! Turns an IFC building model into a typed multi-relational graph for graph
//! neural networks and symbolic reasoning.
//!
//! ## Pipeline
//!
//! - **Extraction**: candidate entities and relation tuples from a parsed model
//! - **Allowlist filter**: the [`Vocabulary`] maps IFC types to node types and
//!   drops spatial roots, annotations, grids and grouping noise
//! - **Graph builder**: CONTAINS, PART_OF and CONNECTS edges from relationships
//! - **Geometry-lite**: world AABB and centroid per node, no meshing
//! - **Spatial inference**: ADJACENT, ABOVE and BELOW from bounding boxes
//! - **Export**: `graph.json`, `nodes.csv`, `edges.csv` and `facts.tsv`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ifc_graph::{run_file, PipelineConfig};
//!
//! let run = run_file("model.ifc", "out", &PipelineConfig::from_env())?;
//! println!("{}", run.output.report());
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod filter;
pub mod geometry;
pub mod graph;
pub mod pipeline;
pub mod report;
pub mod spatial;
pub mod storey;
pub mod types;
pub mod vocabulary;

pub use config::{OutputNames, PipelineConfig};
pub use error::{GraphError, Result, Warning};
pub use export::{
    derive_facts, edge_type_table, node_type_table, write_edges_csv, write_facts,
    write_nodes_csv, Fact, GraphDocument, OutputPaths, HAS_NAME, HAS_TYPE, IN_STOREY,
};
pub use extract::{extract, ExtractedEntity, ExtractedModel, RawRelation, RelationKind};
pub use filter::{AllowlistFilter, FilterOutcome, KeptEntity};
pub use geometry::{BoundingBox, GeometryRouter, NodeGeometry};
pub use graph::{Edge, GraphBuilder, Node, NodeIndex, RelationOptions, TypedGraph};
pub use pipeline::{build_graph, load_vocabulary, run_file, PipelineOutput, RunOutput};
pub use report::BuildReport;
pub use spatial::{SpatialInferrer, DEFAULT_TOLERANCE};
pub use storey::{ordered_storeys, StoreyIndex};
pub use types::{EdgeType, NodeType};
pub use vocabulary::{Classification, Vocabulary, VocabularyFile};
