// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Construction sequencing rules
//!
//! Every rule reads a [`FactView`] snapshot and proposes [`Firing`]s; the
//! engine decides which of them are new. Rules never mutate the fact base.

use crate::facts::FactBase;
use ifc_graph::{EdgeType, Fact, HAS_TYPE, IN_STOREY};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub const REQUIRES_BEFORE: &str = "requires_before";
pub const CANNOT_BEFORE: &str = "cannot_before";
pub const SUPPORTS: &str = "supports";

const WALLS: &[&str] = &["IfcWall", "IfcWallStandardCase", "IfcWallElementedCase"];
const OPENINGS: &[&str] = &[
    "IfcDoor",
    "IfcDoorStandardCase",
    "IfcWindow",
    "IfcWindowStandardCase",
];
const BEAMS: &[&str] = &["IfcBeam", "IfcBeamStandardCase"];
const MEMBERS: &[&str] = &["IfcMember", "IfcMemberStandardCase"];
const COLUMNS: &[&str] = &["IfcColumn", "IfcColumnStandardCase"];
const SLABS: &[&str] = &["IfcSlab", "IfcSlabStandardCase", "IfcSlabElementedCase"];

/// One row of `precedence_edges.csv`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrecedenceEdge {
    pub src: String,
    pub dst: String,
    pub edge_type: String,
    pub rule_id: String,
    pub confidence: f64,
    /// Predicates the rule matched, `|`-separated
    pub evidence: String,
}

impl PrecedenceEdge {
    pub fn key(&self) -> (String, String, String) {
        (self.src.clone(), self.dst.clone(), self.edge_type.clone())
    }
}

/// What one rule match proposes
#[derive(Clone, Debug, PartialEq)]
pub struct Firing {
    pub rule_id: &'static str,
    /// Role name → node id
    pub bindings: Vec<(&'static str, String)>,
    pub edge: Option<PrecedenceEdge>,
    pub facts: Vec<Fact>,
    pub constraints: Vec<Fact>,
    /// Facts of the base that justify the match
    pub evidence: Vec<Fact>,
}

/// Read-only snapshot of a fact base with type and storey lookups
pub struct FactView<'a> {
    base: &'a FactBase,
    types: FxHashMap<&'a str, &'a str>,
    storeys: FxHashMap<&'a str, Vec<&'a str>>,
}

impl<'a> FactView<'a> {
    pub fn new(base: &'a FactBase) -> Self {
        Self {
            base,
            types: base.types(),
            storeys: base.storeys(),
        }
    }

    pub fn base(&self) -> &'a FactBase {
        self.base
    }

    pub fn type_of(&self, node: &str) -> Option<&'a str> {
        self.types.get(node).copied()
    }

    fn is_a(&self, node: &str, family: &[&str]) -> bool {
        self.type_of(node).is_some_and(|t| family.contains(&t))
    }

    /// False only when both nodes have storeys and share none
    pub fn same_storey(&self, a: &str, b: &str) -> bool {
        match (self.storeys.get(a), self.storeys.get(b)) {
            (Some(sa), Some(sb)) => sa.iter().any(|s| sb.contains(s)),
            _ => true,
        }
    }

    /// `(s, o)` for every `predicate(s, o)` fact
    pub fn pairs(&self, predicate: &str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.base
            .with_predicate(predicate)
            .map(|f| (f.subject.as_str(), f.object.as_str()))
    }

    /// The fact, if the base holds it
    fn fact(&self, subject: &str, predicate: &str, object: &str) -> Option<Fact> {
        self.base
            .contains(subject, predicate, object)
            .then(|| Fact::new(subject, predicate, object))
    }

    /// `has_type` and `in_storey` facts of the given nodes
    fn node_evidence(&self, nodes: &[&str], out: &mut Vec<Fact>) {
        for node in nodes {
            if let Some(t) = self.type_of(node) {
                out.push(Fact::new(*node, HAS_TYPE, t));
            }
        }
        for node in nodes {
            for storey in self.storeys.get(node).into_iter().flatten() {
                out.push(Fact::new(*node, IN_STOREY, *storey));
            }
        }
    }
}

/// A sequencing rule
pub trait Rule: Send + Sync {
    /// Stable id, e.g. `R1_SLAB_BEFORE_ABOVE`; rules run in id order
    fn id(&self) -> &'static str;

    /// Propose every match in the current facts
    fn fire(&self, view: &FactView<'_>) -> Vec<Firing>;
}

/// Ordered rule registry
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// R1 to R7
    pub fn standard() -> Self {
        let mut rules = Self::new();
        rules.register(Box::new(AbovePairRule {
            id: "R1_SLAB_BEFORE_ABOVE",
            confidence: 0.75,
            lower: (SLABS, "slab"),
            upper: (&[], "elem"),
        }));
        rules.register(Box::new(AdjacentPairRule {
            id: "R2_WALL_BEFORE_OPENING",
            confidence: 0.85,
            first: (WALLS, "wall"),
            then: (OPENINGS, "opening"),
            hard_constraint: true,
        }));
        rules.register(Box::new(AdjacentPairRule {
            id: "R3_BEAM_BEFORE_MEMBER",
            confidence: 0.70,
            first: (BEAMS, "beam"),
            then: (MEMBERS, "member"),
            hard_constraint: false,
        }));
        rules.register(Box::new(SupportsFromAbove));
        rules.register(Box::new(AdjacentPairRule {
            id: "R5_COLUMN_BEFORE_BEAM",
            confidence: 0.80,
            first: (COLUMNS, "column"),
            then: (BEAMS, "beam"),
            hard_constraint: false,
        }));
        rules.register(Box::new(BeamBeforeSlab));
        rules.register(Box::new(AbovePairRule {
            id: "R7_SLAB_BEFORE_WALL",
            confidence: 0.70,
            lower: (SLABS, "slab"),
            upper: (WALLS, "wall"),
        }));
        rules
    }

    /// Add a rule, keeping id order; a rule with a known id replaces it
    pub fn register(&mut self, rule: Box<dyn Rule>) {
        match self.rules.binary_search_by(|r| r.id().cmp(rule.id())) {
            Ok(i) => self.rules[i] = rule,
            Err(i) => self.rules.insert(i, rule),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Type family and role name of one rule endpoint; an empty family matches
/// any type
type Role = (&'static [&'static str], &'static str);

fn requires_before(rule_id: &str, confidence: f64, src: &str, dst: &str, evidence: &str) -> PrecedenceEdge {
    PrecedenceEdge {
        src: src.to_string(),
        dst: dst.to_string(),
        edge_type: REQUIRES_BEFORE.to_string(),
        rule_id: rule_id.to_string(),
        confidence,
        evidence: evidence.to_string(),
    }
}

/// `adjacent(a, b)` between two type families on a shared storey ⇒
/// `requires_before(first, then)`
pub struct AdjacentPairRule {
    pub id: &'static str,
    pub confidence: f64,
    pub first: Role,
    pub then: Role,
    /// Also emit `cannot_before(then, first)`
    pub hard_constraint: bool,
}

impl AdjacentPairRule {
    fn matches(&self, view: &FactView<'_>, a: &str, b: &str) -> bool {
        view.is_a(a, self.first.0) && view.is_a(b, self.then.0) && view.same_storey(a, b)
    }

    fn firing(&self, view: &FactView<'_>, first: &str, then: &str) -> Firing {
        let adjacent = EdgeType::Adjacent.predicate();
        let mut evidence: Vec<Fact> = [
            view.fact(first, adjacent, then),
            view.fact(then, adjacent, first),
        ]
        .into_iter()
        .flatten()
        .collect();
        view.node_evidence(&[first, then], &mut evidence);

        let edge = requires_before(self.id, self.confidence, first, then, "adjacent|has_type|in_storey");
        let constraints = if self.hard_constraint {
            vec![Fact::new(then, CANNOT_BEFORE, first)]
        } else {
            Vec::new()
        };
        Firing {
            rule_id: self.id,
            bindings: vec![(self.first.1, first.to_string()), (self.then.1, then.to_string())],
            facts: vec![Fact::new(first, REQUIRES_BEFORE, then)],
            edge: Some(edge),
            constraints,
            evidence,
        }
    }

    fn collect(&self, view: &FactView<'_>, out: &mut Vec<Firing>) {
        for (a, b) in view.pairs(EdgeType::Adjacent.predicate()) {
            if self.matches(view, a, b) {
                out.push(self.firing(view, a, b));
            }
            if self.matches(view, b, a) {
                out.push(self.firing(view, b, a));
            }
        }
    }
}

impl Rule for AdjacentPairRule {
    fn id(&self) -> &'static str {
        self.id
    }

    fn fire(&self, view: &FactView<'_>) -> Vec<Firing> {
        let mut out = Vec::new();
        self.collect(view, &mut out);
        out
    }
}

/// `above(upper, lower)` between two type families ⇒
/// `requires_before(lower, upper)`
pub struct AbovePairRule {
    pub id: &'static str,
    pub confidence: f64,
    pub lower: Role,
    pub upper: Role,
}

impl AbovePairRule {
    fn collect(&self, view: &FactView<'_>, out: &mut Vec<Firing>) {
        let matches = |node: &str, role: &Role| role.0.is_empty() || view.is_a(node, role.0);
        for (upper, lower) in view.pairs(EdgeType::Above.predicate()) {
            if !matches(lower, &self.lower) || !matches(upper, &self.upper) {
                continue;
            }
            let mut evidence = vec![Fact::new(upper, EdgeType::Above.predicate(), lower)];
            view.node_evidence(&[lower, upper], &mut evidence);
            out.push(Firing {
                rule_id: self.id,
                bindings: vec![(self.lower.1, lower.to_string()), (self.upper.1, upper.to_string())],
                edge: Some(requires_before(self.id, self.confidence, lower, upper, "above|has_type")),
                facts: vec![Fact::new(lower, REQUIRES_BEFORE, upper)],
                constraints: Vec::new(),
                evidence,
            });
        }
    }
}

impl Rule for AbovePairRule {
    fn id(&self) -> &'static str {
        self.id
    }

    fn fire(&self, view: &FactView<'_>) -> Vec<Firing> {
        let mut out = Vec::new();
        self.collect(view, &mut out);
        out
    }
}

/// `above(x, y)` ⇒ `supports(y, x)`
pub struct SupportsFromAbove;

impl Rule for SupportsFromAbove {
    fn id(&self) -> &'static str {
        "R4_SUPPORTS_FROM_ABOVE"
    }

    fn fire(&self, view: &FactView<'_>) -> Vec<Firing> {
        view.pairs(EdgeType::Above.predicate())
            .map(|(upper, lower)| Firing {
                rule_id: self.id(),
                bindings: vec![("support", lower.to_string()), ("supported", upper.to_string())],
                edge: None,
                facts: vec![Fact::new(lower, SUPPORTS, upper)],
                constraints: Vec::new(),
                evidence: vec![Fact::new(upper, EdgeType::Above.predicate(), lower)],
            })
            .collect()
    }
}

/// Beams carry slabs: adjacent on a shared storey, or the slab above
pub struct BeamBeforeSlab;

impl Rule for BeamBeforeSlab {
    fn id(&self) -> &'static str {
        "R6_BEAM_BEFORE_SLAB"
    }

    fn fire(&self, view: &FactView<'_>) -> Vec<Firing> {
        let mut out = Vec::new();
        AdjacentPairRule {
            id: self.id(),
            confidence: 0.75,
            first: (BEAMS, "beam"),
            then: (SLABS, "slab"),
            hard_constraint: false,
        }
        .collect(view, &mut out);
        AbovePairRule {
            id: self.id(),
            confidence: 0.75,
            lower: (BEAMS, "beam"),
            upper: (SLABS, "slab"),
        }
        .collect(view, &mut out);
        out
    }
}
