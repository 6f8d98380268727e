// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for graph extraction
//!
//! Only [`GraphError`] stops a run. Recoverable conditions are recorded as
//! [`Warning`]s in the build report and the run continues.

use ifc_graph_model::{EntityId, ParseError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Fatal errors
#[derive(Error, Debug)]
pub enum GraphError {
    /// The input could not be parsed as IFC
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Reading or writing a file failed
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV/TSV serialization failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Vocabulary extension is inconsistent
    #[error("Invalid vocabulary: {0}")]
    Vocabulary(String),

    /// A loaded graph document is inconsistent
    #[error("Invalid graph document: {0}")]
    Document(String),

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A representation item could not be turned into points
    #[error("Geometry error for entity {entity}: {message}")]
    Geometry { entity: EntityId, message: String },
}

impl GraphError {
    /// Wrap an IO error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        GraphError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a geometry error
    pub fn geometry(entity: EntityId, msg: impl Into<String>) -> Self {
        GraphError::Geometry {
            entity,
            message: msg.into(),
        }
    }

    /// Create a vocabulary error
    pub fn vocabulary(msg: impl Into<String>) -> Self {
        GraphError::Vocabulary(msg.into())
    }
}

/// Non-fatal conditions met while building the graph
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// An entity type that is neither allowed nor denied
    UnknownType { entity: EntityId, type_name: String },
    /// A relation whose endpoint did not become a node
    DanglingRelation {
        relation: EntityId,
        relation_type: String,
        missing: EntityId,
    },
    /// A node with no usable placement or shape
    GeometryMissing { node: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnknownType { entity, type_name } => {
                write!(f, "unknown type {} on {}", type_name, entity)
            }
            Warning::DanglingRelation {
                relation,
                relation_type,
                missing,
            } => write!(
                f,
                "{} {} references {} which is not a node",
                relation_type, relation, missing
            ),
            Warning::GeometryMissing { node } => write!(f, "no geometry for {}", node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_is_wrapped() {
        let err: GraphError = ParseError::format("missing DATA section").into();
        assert_eq!(
            err.to_string(),
            "Parse error: Invalid IFC format: missing DATA section"
        );
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let warning = Warning::GeometryMissing {
            node: "IfcWall_abc".to_string(),
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "geometry_missing");
        assert_eq!(json["node"], "IfcWall_abc");
    }
}
