// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline configuration
//!
//! Defaults, overridden by environment variables, overridden by whatever the
//! caller sets afterwards (the CLI applies its flags last).

use crate::error::{GraphError, Result};
use crate::spatial::DEFAULT_TOLERANCE;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Adjacency tolerance in metres
    pub tolerance: f64,
    /// Derive ADJACENT/ABOVE/BELOW edges
    pub infer_spatial: bool,
    /// Emit CONNECTS edges for IfcRelConnects* relations
    pub include_connects: bool,
    /// Emit PART_OF edges for system membership
    pub include_systems: bool,
    /// Compare spatial pairs on the rayon pool
    pub parallel: bool,
    /// Decode every record up front so a malformed one aborts the run
    pub strict_parse: bool,
    /// JSON file extending the built-in vocabulary
    pub vocabulary_path: Option<PathBuf>,
    pub outputs: OutputNames,
}

/// File names written into the output directory
#[derive(Debug, Clone)]
pub struct OutputNames {
    pub graph_json: String,
    pub nodes_csv: String,
    pub edges_csv: String,
    pub facts_tsv: String,
}

impl Default for OutputNames {
    fn default() -> Self {
        Self {
            graph_json: "graph.json".into(),
            nodes_csv: "nodes.csv".into(),
            edges_csv: "edges.csv".into(),
            facts_tsv: "facts.tsv".into(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            infer_spatial: true,
            include_connects: true,
            include_systems: true,
            parallel: true,
            strict_parse: true,
            vocabulary_path: None,
            outputs: OutputNames::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `IFC_GRAPH_*` environment variables
    ///
    /// Unparseable values fall back to the default with a warning.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `var` returns for each `IFC_GRAPH_*` name
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |name: &str, default: bool| setting(&var, name, parse_flag).unwrap_or(default);
        Self {
            tolerance: setting(&var, "IFC_GRAPH_TOLERANCE", |v| v.parse().ok())
                .unwrap_or(defaults.tolerance),
            infer_spatial: flag("IFC_GRAPH_SPATIAL", defaults.infer_spatial),
            include_connects: flag("IFC_GRAPH_CONNECTS", defaults.include_connects),
            include_systems: flag("IFC_GRAPH_SYSTEMS", defaults.include_systems),
            parallel: flag("IFC_GRAPH_PARALLEL", defaults.parallel),
            vocabulary_path: var("IFC_GRAPH_VOCABULARY").map(PathBuf::from),
            ..defaults
        }
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(GraphError::Config(format!(
                "tolerance must be a non-negative number of metres, got {}",
                self.tolerance
            )));
        }
        let names = [
            &self.outputs.graph_json,
            &self.outputs.nodes_csv,
            &self.outputs.edges_csv,
            &self.outputs.facts_tsv,
        ];
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(GraphError::Config("output file names must not be empty".into()));
        }
        Ok(())
    }
}

fn setting<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = var(name)?;
    let value = parse(raw.trim());
    if value.is_none() {
        warn!(variable = name, value = %raw, "ignoring unparseable setting");
    }
    value
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tolerance, 0.01);
        assert_eq!(config.outputs.facts_tsv, "facts.tsv");
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let config = PipelineConfig {
            tolerance: -1.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(GraphError::Config(_))));
    }

    #[test]
    fn test_settings_from_vars() {
        let vars = |name: &str| match name {
            "IFC_GRAPH_TOLERANCE" => Some(" 0.05 ".to_string()),
            "IFC_GRAPH_SPATIAL" => Some("off".to_string()),
            "IFC_GRAPH_VOCABULARY" => Some("extra.json".to_string()),
            _ => None,
        };
        let config = PipelineConfig::from_vars(vars);
        assert_eq!(config.tolerance, 0.05);
        assert!(!config.infer_spatial);
        assert!(config.include_connects);
        assert_eq!(config.vocabulary_path, Some(PathBuf::from("extra.json")));
    }

    #[test]
    fn test_unparseable_settings_keep_defaults() {
        let vars = |name: &str| match name {
            "IFC_GRAPH_TOLERANCE" => Some("1cm".to_string()),
            "IFC_GRAPH_PARALLEL" => Some("sometimes".to_string()),
            _ => None,
        };
        let config = PipelineConfig::from_vars(vars);
        assert_eq!(config.tolerance, DEFAULT_TOLERANCE);
        assert!(config.parallel);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("ON"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
