// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the reasoning stage

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReasoningError>;

#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rule confidence or iteration bound out of range
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ReasoningError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        ReasoningError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
