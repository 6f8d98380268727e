// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC Graph Reasoning
//!
//! Forward-chaining construction sequencing over the `facts.tsv` written by
//! the graph extractor. Rules turn spatial facts (`adjacent`, `above`) and
//! element types into `requires_before` precedence edges, `supports` facts
//! and `cannot_before` constraints, with a JSONL trace of every derivation.
//!
//! ```rust,ignore
//! use ifc_graph_reasoning::{run_dir, Engine};
//!
//! let run = run_dir("out/graph", "out/reasoning", &Engine::default())?;
//! println!("{} precedence edges", run.outcome.precedence.len());
//! ```

pub mod engine;
pub mod error;
pub mod facts;
pub mod output;
pub mod rules;

pub use engine::{Engine, ReasoningOutcome, TraceRecord, DEFAULT_MAX_ITERATIONS};
pub use error::{ReasoningError, Result};
pub use facts::{read_facts, read_facts_file, write_facts_file, FactBase};
pub use output::{load_fact_base, run_dir, ReasoningPaths, ReasoningRun};
pub use rules::{
    AbovePairRule, AdjacentPairRule, FactView, Firing, PrecedenceEdge, Rule, RuleSet,
    CANNOT_BEFORE, REQUIRES_BEFORE, SUPPORTS,
};
