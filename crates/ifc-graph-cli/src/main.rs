// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ifc-graph` command line
//!
//! - `extract`: IFC file → graph.json, nodes.csv, edges.csv, facts.tsv
//! - `reason`: facts.tsv → precedence edges, constraints and trace
//! - `vocabulary`: print the type tables and the allowlist

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ifc_graph::{edge_type_table, load_vocabulary, node_type_table, run_file, PipelineConfig};
use ifc_graph_reasoning::{run_dir, Engine, RuleSet};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ifc-graph")]
#[command(author, version, about = "Typed multi-relational graphs from IFC models")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the graph of an IFC file and write all exports
    Extract(ExtractArgs),

    /// Derive construction precedence from an extraction's facts.tsv
    Reason(ReasonArgs),

    /// Print the node/edge type id tables and the type allowlist
    Vocabulary {
        /// JSON file extending the built-in vocabulary
        #[arg(long)]
        vocabulary: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ExtractArgs {
    /// IFC (STEP) file to read
    input: PathBuf,

    /// Directory the exports are written to
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// File name for the authoritative graph document
    #[arg(long, value_name = "NAME")]
    json: Option<String>,

    /// Adjacency tolerance in metres
    #[arg(long, value_name = "M")]
    tolerance: Option<f64>,

    /// Skip ADJACENT/ABOVE/BELOW inference
    #[arg(long)]
    no_spatial: bool,

    /// Skip CONNECTS edges
    #[arg(long)]
    no_connects: bool,

    /// Skip system membership edges
    #[arg(long)]
    no_systems: bool,

    /// Compare spatial pairs on one thread
    #[arg(long)]
    sequential: bool,

    /// Decode records lazily instead of validating the whole file first
    #[arg(long)]
    lenient: bool,

    /// JSON file extending the built-in vocabulary
    #[arg(long, value_name = "FILE")]
    vocabulary: Option<PathBuf>,
}

#[derive(Args)]
struct ReasonArgs {
    /// Directory holding facts.tsv
    facts_dir: PathBuf,

    /// Directory the reasoning results are written to
    out_dir: PathBuf,

    #[arg(long, default_value_t = ifc_graph_reasoning::DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Extract(args) => extract(args),
        Command::Reason(args) => reason(args),
        Command::Vocabulary { vocabulary } => print_vocabulary(vocabulary),
    }
}

/// Apply command line flags on top of `config`
///
/// Switches only ever turn a feature off, so an environment setting that
/// disabled one stays disabled.
fn apply_flags(mut config: PipelineConfig, args: &ExtractArgs) -> PipelineConfig {
    if let Some(tolerance) = args.tolerance {
        config.tolerance = tolerance;
    }
    if let Some(json) = &args.json {
        config.outputs.graph_json = json.clone();
    }
    config.infer_spatial &= !args.no_spatial;
    config.include_connects &= !args.no_connects;
    config.include_systems &= !args.no_systems;
    config.parallel &= !args.sequential;
    config.strict_parse = !args.lenient;
    if let Some(vocabulary) = &args.vocabulary {
        config.vocabulary_path = Some(vocabulary.clone());
    }
    config
}

fn extract(args: ExtractArgs) -> Result<()> {
    let config = apply_flags(PipelineConfig::from_env(), &args);

    info!(input = %args.input.display(), output = %args.output.display(), "extracting");
    let run = run_file(&args.input, &args.output, &config)
        .with_context(|| format!("failed to extract a graph from {}", args.input.display()))?;

    println!("{}", run.output.report());
    for path in [
        &run.paths.graph_json,
        &run.paths.nodes_csv,
        &run.paths.edges_csv,
        &run.paths.facts_tsv,
    ] {
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn reason(args: ReasonArgs) -> Result<()> {
    let engine = Engine::new(RuleSet::standard()).with_max_iterations(args.max_iterations)?;
    info!(rules = ?engine.rules().ids(), "reasoning with");
    let run = run_dir(&args.facts_dir, &args.out_dir, &engine).with_context(|| {
        format!("failed to reason over {}", args.facts_dir.display())
    })?;

    let outcome = &run.outcome;
    println!(
        "facts: {}  derived: {}  precedence edges: {}  constraints: {}  iterations: {}{}",
        run.input_facts,
        outcome.derived.len(),
        outcome.precedence.len(),
        outcome.constraints.len(),
        outcome.iterations,
        if outcome.converged { "" } else { " (bound reached)" },
    );
    for path in [
        &run.paths.derived_facts,
        &run.paths.precedence_edges,
        &run.paths.logic_graph,
        &run.paths.constraints,
        &run.paths.trace,
    ] {
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn print_vocabulary(extension: Option<PathBuf>) -> Result<()> {
    let config = PipelineConfig {
        vocabulary_path: extension,
        ..PipelineConfig::from_env()
    };
    let vocabulary = load_vocabulary(&config).context("failed to load the vocabulary")?;

    println!("node types");
    for row in node_type_table() {
        println!("  {}  {}", row.id, row.name);
    }
    println!("edge types");
    for row in edge_type_table() {
        println!("  {}  {}", row.id, row.name);
    }
    for (node_type, names) in vocabulary.kept_by_node_type() {
        println!("{} ({})", node_type, names.len());
        for name in names {
            println!("  {}", name);
        }
    }
    let denied = vocabulary.denied();
    println!("denied ({})", denied.len());
    for name in denied {
        println!("  {}", name);
    }
    Ok(())
}
