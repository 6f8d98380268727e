// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Directory-level runs and result files

use crate::engine::{Engine, ReasoningOutcome, TraceRecord};
use crate::error::{ReasoningError, Result};
use crate::facts::{read_facts_file, write_facts_file, FactBase};
use crate::rules::PrecedenceEdge;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const FACTS_TSV: &str = "facts.tsv";
pub const ENRICHED_FACTS_TSV: &str = "enriched_facts.tsv";
pub const DERIVED_FACTS_TSV: &str = "derived_facts.tsv";
pub const PRECEDENCE_EDGES_CSV: &str = "precedence_edges.csv";
pub const LOGIC_GRAPH_CSV: &str = "construction_logic_graph.csv";
pub const CONSTRAINTS_TSV: &str = "constraints.tsv";
pub const TRACE_JSONL: &str = "trace.jsonl";

/// Files written by [`run_dir`]
#[derive(Clone, Debug)]
pub struct ReasoningPaths {
    pub derived_facts: PathBuf,
    pub precedence_edges: PathBuf,
    pub logic_graph: PathBuf,
    pub constraints: PathBuf,
    pub trace: PathBuf,
    pub enriched_facts: PathBuf,
}

impl ReasoningPaths {
    fn in_dir(dir: &Path) -> Self {
        Self {
            derived_facts: dir.join(DERIVED_FACTS_TSV),
            precedence_edges: dir.join(PRECEDENCE_EDGES_CSV),
            logic_graph: dir.join(LOGIC_GRAPH_CSV),
            constraints: dir.join(CONSTRAINTS_TSV),
            trace: dir.join(TRACE_JSONL),
            enriched_facts: dir.join(ENRICHED_FACTS_TSV),
        }
    }
}

#[derive(Debug)]
pub struct ReasoningRun {
    pub input_facts: usize,
    pub outcome: ReasoningOutcome,
    pub paths: ReasoningPaths,
}

/// Load `facts.tsv` from `facts_dir` plus `enriched_facts.tsv` from
/// `out_dir` when it exists
pub fn load_fact_base(facts_dir: &Path, out_dir: &Path) -> Result<FactBase> {
    let mut base = FactBase::from_facts(read_facts_file(facts_dir.join(FACTS_TSV))?);
    let enriched = out_dir.join(ENRICHED_FACTS_TSV);
    if enriched.is_file() {
        let added = base.extend(read_facts_file(&enriched)?);
        info!(path = %enriched.display(), added, "merged enriched facts");
    }
    Ok(base)
}

/// Reason over the facts of an extraction run and write every result file
pub fn run_dir(
    facts_dir: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    engine: &Engine,
) -> Result<ReasoningRun> {
    let (facts_dir, out_dir) = (facts_dir.as_ref(), out_dir.as_ref());
    std::fs::create_dir_all(out_dir).map_err(|e| ReasoningError::io(out_dir, e))?;

    let mut base = load_fact_base(facts_dir, out_dir)?;
    let input_facts = base.len();
    info!(facts = input_facts, rules = engine.rules().len(), "reasoning");

    let outcome = engine.run(&mut base);
    let paths = ReasoningPaths::in_dir(out_dir);

    write_facts_file(&paths.derived_facts, &outcome.derived)?;
    write_precedence_file(&paths.precedence_edges, &outcome.precedence)?;
    write_precedence_file(&paths.logic_graph, &outcome.precedence)?;
    write_facts_file(&paths.constraints, &outcome.constraints)?;
    write_trace_file(&paths.trace, &outcome.trace)?;
    if !paths.enriched_facts.exists() {
        write_facts_file(&paths.enriched_facts, &[])?;
    }

    Ok(ReasoningRun {
        input_facts,
        outcome,
        paths,
    })
}

/// Precedence rows as CSV with a header, even when empty
pub fn write_precedence<W: Write>(edges: &[PrecedenceEdge], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for edge in edges {
        csv.serialize(edge)?;
    }
    if edges.is_empty() {
        csv.write_record(["src", "dst", "edge_type", "rule_id", "confidence", "evidence"])?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// One JSON object per line
pub fn write_trace<W: Write>(trace: &[TraceRecord], mut writer: W) -> Result<()> {
    for record in trace {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n").map_err(serde_json::Error::io)?;
    }
    Ok(())
}

fn write_precedence_file(path: &Path, edges: &[PrecedenceEdge]) -> Result<()> {
    write_with(path, |w| write_precedence(edges, w))
}

fn write_trace_file(path: &Path, trace: &[TraceRecord]) -> Result<()> {
    write_with(path, |w| write_trace(trace, w))
}

fn write_with(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> Result<()>) -> Result<()> {
    let file = File::create(path).map_err(|e| ReasoningError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush().map_err(|e| ReasoningError::io(path, e))
}
