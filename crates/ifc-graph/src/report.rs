// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build report: counts and the warning summary of one run

use crate::error::Warning;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

/// Warnings kept verbatim; the rest are only counted
pub const MAX_REPORTED_WARNINGS: usize = 200;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredCounts {
    pub adjacent: usize,
    pub above: usize,
    pub below: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Candidate entities handed to the filter
    pub entities_seen: usize,
    pub nodes: usize,
    pub edges: usize,
    pub nodes_by_type: BTreeMap<String, usize>,
    pub edges_by_type: BTreeMap<String, usize>,
    pub denied_by_type: BTreeMap<String, usize>,
    pub unknown_by_type: BTreeMap<String, usize>,
    pub dangling_relations: usize,
    pub geometry_missing: usize,
    pub inferred: InferredCounts,
    pub warnings: Vec<Warning>,
    /// Warnings beyond [`MAX_REPORTED_WARNINGS`]
    #[serde(default)]
    pub warnings_omitted: usize,
}

impl BuildReport {
    pub fn push_warning(&mut self, warning: Warning) {
        match &warning {
            Warning::DanglingRelation { .. } => self.dangling_relations += 1,
            Warning::GeometryMissing { .. } => self.geometry_missing += 1,
            Warning::UnknownType { .. } => {}
        }
        if self.warnings.len() < MAX_REPORTED_WARNINGS {
            self.warnings.push(warning);
        } else {
            self.warnings_omitted += 1;
        }
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len() + self.warnings_omitted
    }

    /// Emit the summary through `tracing`
    pub fn log_summary(&self) {
        info!(
            nodes = self.nodes,
            edges = self.edges,
            adjacent = self.inferred.adjacent,
            above = self.inferred.above,
            below = self.inferred.below,
            "graph built"
        );
        let unknown: usize = self.unknown_by_type.values().sum();
        if unknown > 0 || self.dangling_relations > 0 || self.geometry_missing > 0 {
            warn!(
                unknown_entities = unknown,
                unknown_types = self.unknown_by_type.len(),
                dangling_relations = self.dangling_relations,
                geometry_missing = self.geometry_missing,
                "completed with warnings"
            );
        }
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "entities: {}  nodes: {}  edges: {}",
            self.entities_seen, self.nodes, self.edges
        )?;
        for (name, count) in &self.nodes_by_type {
            writeln!(f, "  node {:<16} {}", name, count)?;
        }
        for (name, count) in &self.edges_by_type {
            writeln!(f, "  edge {:<16} {}", name, count)?;
        }
        let denied: usize = self.denied_by_type.values().sum();
        let unknown: usize = self.unknown_by_type.values().sum();
        writeln!(f, "denied entities: {}", denied)?;
        write!(f, "unknown entities: {}", unknown)?;
        if !self.unknown_by_type.is_empty() {
            let names: Vec<&str> = self.unknown_by_type.keys().map(String::as_str).collect();
            write!(f, " ({})", names.join(", "))?;
        }
        writeln!(f)?;
        writeln!(f, "dangling relations: {}", self.dangling_relations)?;
        write!(f, "nodes without geometry: {}", self.geometry_missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_graph_model::EntityId;

    #[test]
    fn test_warning_cap() {
        let mut report = BuildReport::default();
        for i in 0..(MAX_REPORTED_WARNINGS + 5) {
            report.push_warning(Warning::DanglingRelation {
                relation: EntityId(i as u32),
                relation_type: "IfcRelAggregates".to_string(),
                missing: EntityId(1),
            });
        }
        assert_eq!(report.dangling_relations, MAX_REPORTED_WARNINGS + 5);
        assert_eq!(report.warnings.len(), MAX_REPORTED_WARNINGS);
        assert_eq!(report.warnings_omitted, 5);
        assert_eq!(report.warning_count(), MAX_REPORTED_WARNINGS + 5);
    }

    #[test]
    fn test_display_lists_unknown_types() {
        let mut report = BuildReport::default();
        report.unknown_by_type.insert("IFCALIGNMENT".to_string(), 2);
        let text = report.to_string();
        assert!(text.contains("unknown entities: 2 (IFCALIGNMENT)"));
    }
}
