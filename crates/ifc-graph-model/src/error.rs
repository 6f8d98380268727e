// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for IFC parsing operations
//!
//! Every variant here is fatal for a pipeline run: a model that fails to
//! parse never reaches graph construction.

use crate::EntityId;
use thiserror::Error;

/// Result type alias for parser operations
pub type Result<T> = std::result::Result<T, ParseError>;

/// Errors that can occur during IFC parsing
#[derive(Error, Debug)]
pub enum ParseError {
    /// Not a STEP physical file, or a required section is missing
    #[error("Invalid IFC format: {0}")]
    InvalidFormat(String),

    /// Failed to parse header section
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// A DATA record could not be decoded
    #[error("Failed to parse entity {id} (line {line}): {message}")]
    EntityParse {
        id: EntityId,
        line: usize,
        message: String,
    },

    /// Entity not found
    #[error("Entity {0} not found")]
    EntityNotFound(EntityId),

    /// Invalid entity reference
    #[error("Invalid entity reference at {entity}: attribute {attribute}")]
    InvalidReference { entity: EntityId, attribute: usize },

    /// Schema named in FILE_SCHEMA is not one we can read
    #[error("Unsupported schema version: {0}")]
    UnsupportedSchema(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl ParseError {
    /// Create a new format error
    pub fn format(msg: impl Into<String>) -> Self {
        ParseError::InvalidFormat(msg.into())
    }

    /// Create a new entity parse error
    pub fn entity_parse(id: EntityId, line: usize, msg: impl Into<String>) -> Self {
        ParseError::EntityParse {
            id,
            line,
            message: msg.into(),
        }
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        ParseError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_parse_message_names_entity_and_line() {
        let err = ParseError::entity_parse(EntityId(42), 17, "unterminated string");
        assert_eq!(
            err.to_string(),
            "Failed to parse entity #42 (line 17): unterminated string"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.ifc");
        let err: ParseError = io.into();
        assert!(matches!(err, ParseError::Io(_)));
    }
}
