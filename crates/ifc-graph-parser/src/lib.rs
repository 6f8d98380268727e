// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC Graph Parser - STEP/IFC reader for the graph pipeline
//!
//! Implements the `ifc-graph-model` traits on top of a byte-level scanner and
//! a nom tokenizer.
//!
//! # Features
//!
//! - **Fast tokenization** using `nom` combinators
//! - **SIMD-accelerated scanning** using `memchr`
//! - **Strict loading** - malformed records are reported with their line
//! - **Arc-based caching** of decoded entities
//!
//! # Example
//!
//! ```ignore
//! use ifc_graph_parser::StepParser;
//! use ifc_graph_model::IfcParser;
//!
//! let model = StepParser::new().parse(ifc_content)?;
//! let walls = model.resolver().find_by_type_name("IFCWALL");
//! println!("Found {} walls", walls.len());
//! ```

mod model;
mod resolver;
mod scanner;
mod tokenizer;
mod units;

pub use model::ParsedModel;
pub use resolver::ResolverImpl;
pub use scanner::{parse_header, EntityScanner, HeaderInfo, ScannedRecord};
pub use tokenizer::{decode_step_string, parse_entity, Token};
pub use units::si_prefix_scale;

use ifc_graph_model::{IfcModel, IfcParser, ProgressCallback, Result};
use std::sync::Arc;

/// STEP/IFC parser implementing `IfcParser`
pub struct StepParser {
    /// Decode every record while loading
    pub strict: bool,
}

impl Default for StepParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StepParser {
    /// Create a strict parser
    pub fn new() -> Self {
        Self { strict: true }
    }

    /// Set whether malformed records fail the parse up front
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl IfcParser for StepParser {
    fn parse(&self, content: &str) -> Result<Arc<dyn IfcModel>> {
        ParsedModel::parse(content, self.strict).map(|m| Arc::new(m) as Arc<dyn IfcModel>)
    }

    fn parse_with_progress(
        &self,
        content: &str,
        on_progress: ProgressCallback,
    ) -> Result<Arc<dyn IfcModel>> {
        ParsedModel::parse_with_progress(content, self.strict, on_progress)
            .map(|m| Arc::new(m) as Arc<dyn IfcModel>)
    }
}

/// Quick parse function for simple use cases
pub fn parse(content: &str) -> Result<Arc<dyn IfcModel>> {
    StepParser::new().parse(content)
}
