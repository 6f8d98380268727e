// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC Graph Model - the parser contract used by the graph pipeline
//!
//! This crate defines what the graph pipeline needs from an IFC parser and
//! nothing more: entity lookup by id and by type, decoded attribute values,
//! reference resolution, the file's length unit, and header metadata.
//!
//! # Architecture
//!
//! - [`IfcParser`] - Entry point for parsing IFC content
//! - [`IfcModel`] - Read-only access to a parsed IFC model
//! - [`EntityResolver`] - Entity lookup and reference resolution
//!
//! # Example
//!
//! ```ignore
//! use ifc_graph_model::{EntityId, IfcModel, IfcParser, IfcType};
//!
//! let model = parser.parse(ifc_content)?;
//! for storey in model.resolver().entities_by_type(&IfcType::IfcBuildingStorey) {
//!     println!("{} {:?}", storey.id, storey.get_string(2));
//! }
//! ```

pub mod error;
pub mod resolver;
pub mod traits;
pub mod types;

pub use error::*;
pub use resolver::*;
pub use traits::*;
pub use types::*;
