// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core traits for IFC parsing

use crate::{EntityResolver, ModelMetadata, Result};
use std::sync::Arc;

/// Progress callback type for parsing operations
pub type ProgressCallback = Box<dyn Fn(&str, f32) + Send>;

/// Main parsing interface - entry point for parsing IFC content
///
/// A successful parse yields a fully loaded, read-only model. Any problem with
/// the input (bad magic, unsupported schema, a malformed DATA record) is
/// reported as a [`ParseError`](crate::ParseError) instead.
pub trait IfcParser: Send + Sync {
    /// Parse IFC content and return a model
    fn parse(&self, content: &str) -> Result<Arc<dyn IfcModel>>;

    /// Parse IFC content with progress reporting
    ///
    /// `on_progress` receives `(phase_name, percent_complete)`.
    fn parse_with_progress(
        &self,
        content: &str,
        on_progress: ProgressCallback,
    ) -> Result<Arc<dyn IfcModel>>;
}

/// Read-only access to a parsed IFC model
///
/// The model is thread-safe (`Send + Sync`) so downstream stages may fan out
/// across threads.
pub trait IfcModel: Send + Sync {
    /// Entity lookups and reference resolution
    fn resolver(&self) -> &dyn EntityResolver;

    /// Unit scale factor (file length units to meters)
    ///
    /// Common values: 1.0 for meters, 0.001 for millimeters, 0.3048 for feet.
    fn unit_scale(&self) -> f64;

    /// File metadata (schema version, originating system, etc.)
    fn metadata(&self) -> &ModelMetadata;
}
