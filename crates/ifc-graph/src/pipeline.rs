// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end pipeline
//!
//! Extract → filter → build → geometry → spatial inference → export, in one
//! pass over a fully loaded model.

use crate::config::PipelineConfig;
use crate::error::{GraphError, Result, Warning};
use crate::export::{GraphDocument, OutputPaths};
use crate::extract::extract;
use crate::filter::AllowlistFilter;
use crate::geometry::{GeometryRouter, NodeGeometry};
use crate::graph::{GraphBuilder, RelationOptions, RelationOutcome, TypedGraph};
use crate::report::BuildReport;
use crate::spatial::SpatialInferrer;
use crate::storey::StoreyIndex;
use crate::types::{EdgeType, NodeType};
use crate::vocabulary::Vocabulary;
use ifc_graph_model::{IfcModel, IfcParser};
use ifc_graph_parser::StepParser;
use std::path::Path;
use tracing::{debug, info};

/// Everything one build produces
#[derive(Debug)]
pub struct PipelineOutput {
    pub graph: TypedGraph,
    pub document: GraphDocument,
}

impl PipelineOutput {
    pub fn report(&self) -> &BuildReport {
        &self.document.report
    }
}

/// A finished file-to-file run
#[derive(Debug)]
pub struct RunOutput {
    pub output: PipelineOutput,
    pub paths: OutputPaths,
}

/// Build the typed graph of a parsed model
pub fn build_graph(
    model: &dyn IfcModel,
    vocabulary: &Vocabulary,
    config: &PipelineConfig,
) -> Result<PipelineOutput> {
    config.validate()?;
    let resolver = model.resolver();
    let unit_scale = model.unit_scale();
    let mut report = BuildReport::default();

    let extracted = extract(model, vocabulary)?;
    report.entities_seen = extracted.entities.len();

    let outcome = AllowlistFilter::new(vocabulary).apply(extracted.entities);
    report.denied_by_type = outcome.denied_by_type;
    report.unknown_by_type = outcome.unknown_by_type;
    for warning in outcome.warnings {
        report.push_warning(warning);
    }

    // Nodes, with geometry
    let router = GeometryRouter::with_default_processors(unit_scale);
    let mut builder = GraphBuilder::with_capacity(outcome.kept.len());
    for mut kept in outcome.kept {
        let entity = &kept.entity;
        let geometry = if kept.node_type == NodeType::System {
            NodeGeometry::Missing
        } else {
            router.element_geometry(entity.placement, entity.representation, resolver)
        };

        // A storey with neither Elevation nor geometry is levelled by its
        // placement height
        if kept.node_type == NodeType::Storey
            && entity.elevation.is_none()
            && geometry.is_missing()
        {
            kept.entity.elevation = kept
                .entity
                .placement
                .and_then(|p| router.placement_transform(p, resolver))
                .map(|m| m[(2, 3)]);
        }

        let index = builder.add_node(&kept, geometry, unit_scale);
        if geometry.is_missing() && kept.node_type.is_physical() {
            let node = builder.nodes()[index].id.clone();
            debug!(node = %node, "no geometry");
            report.push_warning(Warning::GeometryMissing { node });
        }
    }

    // Structural edges
    let options = RelationOptions {
        include_connects: config.include_connects,
        include_systems: config.include_systems,
    };
    for relation in &extracted.relations {
        if let RelationOutcome::Dangling(warning) = builder.add_relation(relation, options) {
            debug!(%warning, "omitting relation");
            report.push_warning(warning);
        }
    }

    // Inferred edges
    if config.infer_spatial {
        let storeys = StoreyIndex::from_graph(builder.nodes(), builder.edges());
        let inferred = SpatialInferrer::new(config.tolerance)
            .with_parallel(config.parallel)
            .infer(builder.nodes(), &storeys);
        for edge in inferred {
            if builder.add_edge(edge) {
                match edge.edge_type {
                    EdgeType::Adjacent => report.inferred.adjacent += 1,
                    EdgeType::Above => report.inferred.above += 1,
                    EdgeType::Below => report.inferred.below += 1,
                    _ => {}
                }
            }
        }
    }

    let graph = builder.finish();
    report.nodes = graph.node_count();
    report.edges = graph.edge_count();
    for node_type in NodeType::ALL {
        let count = graph.nodes_of_type(node_type).count();
        if count > 0 {
            report.nodes_by_type.insert(node_type.name().to_string(), count);
        }
    }
    for edge_type in EdgeType::ALL {
        let count = graph.count_edges(edge_type);
        if count > 0 {
            report.edges_by_type.insert(edge_type.name().to_string(), count);
        }
    }
    report.log_summary();

    let document = GraphDocument::from_graph(&graph, model.metadata(), unit_scale, report);
    Ok(PipelineOutput { graph, document })
}

/// Vocabulary named by the configuration, or the built-in one
pub fn load_vocabulary(config: &PipelineConfig) -> Result<Vocabulary> {
    match &config.vocabulary_path {
        Some(path) => Vocabulary::with_extension_file(path),
        None => Ok(Vocabulary::builtin()),
    }
}

/// Parse an IFC file, build its graph and write all exports into `out_dir`
pub fn run_file(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<RunOutput> {
    let input = input.as_ref();
    config.validate()?;
    let vocabulary = load_vocabulary(config)?;

    let bytes = std::fs::read(input).map_err(|e| GraphError::io(input, e))?;
    // STEP text is nominally ASCII; stray Latin-1 bytes must not abort a run
    let content = String::from_utf8_lossy(&bytes);
    info!(input = %input.display(), bytes = bytes.len(), "parsing");

    let model = StepParser::new()
        .with_strict(config.strict_parse)
        .parse(&content)?;
    let mut output = build_graph(model.as_ref(), &vocabulary, config)?;
    if let Some(name) = input.file_name() {
        output.document.source = Some(name.to_string_lossy().into_owned());
    }

    let paths = output.document.write_all(out_dir, &config.outputs)?;
    Ok(RunOutput { output, paths })
}
