// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Forward-chaining engine
//!
//! Rules run in id order, each against the facts left by the rules before
//! it, until an iteration adds no fact or the iteration bound is reached.

use crate::error::{ReasoningError, Result};
use crate::facts::FactBase;
use crate::rules::{FactView, Firing, PrecedenceEdge, RuleSet};
use ifc_graph::Fact;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// One line of `trace.jsonl`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub step: usize,
    pub iter: usize,
    pub rule_id: String,
    pub bindings: BTreeMap<String, String>,
    pub evidence: Vec<[String; 3]>,
    pub new_edges: Vec<PrecedenceEdge>,
    pub new_facts: Vec<[String; 3]>,
}

fn triple(fact: &Fact) -> [String; 3] {
    [
        fact.subject.clone(),
        fact.predicate.clone(),
        fact.object.clone(),
    ]
}

#[derive(Debug, Default)]
pub struct ReasoningOutcome {
    /// Facts added by rules, in derivation order
    pub derived: Vec<Fact>,
    /// One edge per (src, dst, edge type), highest confidence kept, no self loops
    pub precedence: Vec<PrecedenceEdge>,
    pub constraints: Vec<Fact>,
    pub trace: Vec<TraceRecord>,
    pub iterations: usize,
    /// False when the iteration bound stopped the run
    pub converged: bool,
}

pub struct Engine {
    rules: RuleSet,
    max_iterations: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(RuleSet::standard())
    }
}

impl Engine {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Result<Self> {
        if max_iterations == 0 {
            return Err(ReasoningError::Config(
                "at least one iteration is required".into(),
            ));
        }
        self.max_iterations = max_iterations;
        Ok(self)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Run every rule to a fixpoint, adding derived facts to `base`
    pub fn run(&self, base: &mut FactBase) -> ReasoningOutcome {
        let mut state = RunState::default();
        let mut converged = false;
        let mut iteration = 0;

        while iteration < self.max_iterations {
            iteration += 1;
            let mut added = 0;
            for rule in self.rules.iter() {
                let firings = rule.fire(&FactView::new(base));
                debug!(rule = rule.id(), iteration, firings = firings.len(), "rule fired");
                for firing in firings {
                    added += state.commit(firing, iteration, base);
                }
            }
            debug!(iteration, added, "iteration finished");
            if added == 0 {
                converged = true;
                break;
            }
        }

        let outcome = state.finish(iteration, converged);
        info!(
            iterations = outcome.iterations,
            converged = outcome.converged,
            derived = outcome.derived.len(),
            precedence = outcome.precedence.len(),
            constraints = outcome.constraints.len(),
            "reasoning finished"
        );
        outcome
    }
}

#[derive(Default)]
struct RunState {
    derived: Vec<Fact>,
    edges: Vec<PrecedenceEdge>,
    edge_index: FxHashMap<(String, String, String), usize>,
    constraints: Vec<Fact>,
    constraint_set: FxHashSet<Fact>,
    trace: Vec<TraceRecord>,
}

impl RunState {
    /// Apply one firing; returns how many facts it added
    fn commit(&mut self, firing: Firing, iteration: usize, base: &mut FactBase) -> usize {
        let mut new_facts = Vec::new();
        for fact in &firing.facts {
            if base.add(fact.clone()) {
                self.derived.push(fact.clone());
                new_facts.push(fact.clone());
            }
        }
        let added = new_facts.len();

        for constraint in &firing.constraints {
            if self.constraint_set.insert(constraint.clone()) {
                self.constraints.push(constraint.clone());
                new_facts.push(constraint.clone());
            }
        }

        let mut new_edges = Vec::new();
        if let Some(edge) = firing.edge {
            match self.edge_index.get(&edge.key()) {
                Some(&i) => {
                    if edge.confidence > self.edges[i].confidence {
                        self.edges[i] = edge;
                    }
                }
                None => {
                    self.edge_index.insert(edge.key(), self.edges.len());
                    self.edges.push(edge.clone());
                    new_edges.push(edge);
                }
            }
        }

        if !new_facts.is_empty() || !new_edges.is_empty() {
            self.trace.push(TraceRecord {
                step: self.trace.len() + 1,
                iter: iteration,
                rule_id: firing.rule_id.to_string(),
                bindings: firing
                    .bindings
                    .into_iter()
                    .map(|(role, node)| (role.to_string(), node))
                    .collect(),
                evidence: firing.evidence.iter().map(triple).collect(),
                new_edges,
                new_facts: new_facts.iter().map(triple).collect(),
            });
        }
        added
    }

    fn finish(self, iterations: usize, converged: bool) -> ReasoningOutcome {
        ReasoningOutcome {
            derived: self.derived,
            precedence: self
                .edges
                .into_iter()
                .filter(|e| e.src != e.dst)
                .collect(),
            constraints: self.constraints,
            trace: self.trace,
            iterations,
            converged,
        }
    }
}
