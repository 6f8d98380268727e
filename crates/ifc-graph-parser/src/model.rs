// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ParsedModel - fully loaded IFC model

use crate::resolver::ResolverImpl;
use crate::scanner::{data_section_start, line_of, parse_header, EntityIndex, EntityScanner};
use crate::units::extract_unit_scale;

use ifc_graph_model::{
    EntityId, EntityResolver, IfcModel, IfcType, ModelMetadata, ParseError, ProgressCallback,
    Result,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// Schemas whose entity layouts the pipeline reads
const SUPPORTED_SCHEMAS: &[&str] = &["IFC2X3", "IFC4", "IFC4X1", "IFC4X2", "IFC4X3"];

/// Parsed IFC model implementing the `IfcModel` trait
pub struct ParsedModel {
    resolver: Arc<ResolverImpl>,
    /// Unit scale (file units to meters)
    unit_scale: f64,
    metadata: ModelMetadata,
}

impl ParsedModel {
    /// Parse IFC content and create a model
    ///
    /// With `strict` set every DATA record is decoded up front, so a
    /// malformed record fails the parse instead of surfacing later.
    pub fn parse(content: &str, strict: bool) -> Result<Self> {
        Self::parse_with_progress(content, strict, Box::new(|_: &str, _: f32| {}))
    }

    /// Parse with progress reporting
    pub fn parse_with_progress(
        content: &str,
        strict: bool,
        on_progress: ProgressCallback,
    ) -> Result<Self> {
        on_progress("Checking header", 0.0);
        let metadata = read_metadata(content)?;

        on_progress("Scanning entities", 10.0);
        let mut scanner = EntityScanner::new(content);
        let mut index = EntityIndex::default();
        let mut type_index: FxHashMap<IfcType, Vec<EntityId>> = FxHashMap::default();
        while let Some(record) = scanner.next_entity() {
            if index.insert(record.id, (record.start, record.end)).is_some() {
                return Err(ParseError::entity_parse(
                    EntityId(record.id),
                    line_of(content, record.start),
                    "duplicate entity id",
                ));
            }
            type_index
                .entry(IfcType::parse(record.type_name))
                .or_default()
                .push(EntityId(record.id));
        }
        if let Some(start) = scanner.unterminated() {
            let id = content[start + 1..]
                .split(|c: char| !c.is_ascii_digit())
                .next()
                .and_then(|digits| digits.parse().ok())
                .unwrap_or(0);
            return Err(ParseError::entity_parse(
                EntityId(id),
                line_of(content, start),
                "record is not terminated by ';'",
            ));
        }
        debug!(entities = index.len(), types = type_index.len(), "scanned DATA section");

        on_progress("Indexing types", 30.0);
        let resolver = Arc::new(ResolverImpl::new(content.to_string(), index, type_index));

        if strict {
            on_progress("Decoding entities", 40.0);
            resolver.decode_all()?;
        }

        on_progress("Extracting units", 90.0);
        let unit_scale = extract_unit_scale(resolver.as_ref());

        on_progress("Complete", 100.0);

        Ok(Self {
            resolver,
            unit_scale,
            metadata,
        })
    }

    /// Shared handle to the resolver
    pub fn resolver_arc(&self) -> Arc<ResolverImpl> {
        self.resolver.clone()
    }
}

/// Validate the envelope of a STEP file and read its header
fn read_metadata(content: &str) -> Result<ModelMetadata> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    if !trimmed.starts_with("ISO-10303-21") {
        return Err(ParseError::format(
            "missing ISO-10303-21 magic at start of file",
        ));
    }
    if data_section_start(content).is_none() {
        return Err(ParseError::format("missing DATA section"));
    }

    let header = parse_header(content);
    if header.schema_version.is_empty() {
        return Err(ParseError::InvalidHeader(
            "FILE_SCHEMA is missing or empty".to_string(),
        ));
    }
    let schema = header.schema_version.to_ascii_uppercase();
    // IFC4X3 ships under several addendum names (IFC4X3_TC1, IFC4X3_ADD2, ...)
    if !(SUPPORTED_SCHEMAS.contains(&schema.as_str()) || schema.starts_with("IFC4X3")) {
        return Err(ParseError::UnsupportedSchema(header.schema_version));
    }

    Ok(ModelMetadata {
        schema_version: header.schema_version,
        originating_system: header.originating_system,
        preprocessor_version: header.preprocessor_version,
        file_name: header.file_name,
        file_description: header.file_description,
        author: header.author,
        organization: header.organization,
        timestamp: header.timestamp,
    })
}

impl IfcModel for ParsedModel {
    fn resolver(&self) -> &dyn EntityResolver {
        self.resolver.as_ref()
    }

    fn unit_scale(&self) -> f64 {
        self.unit_scale
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::Mutex;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('test.ifc','2024-01-01T00:00:00',('Author'),('Org'),'Preprocessor','App','');
FILE_SCHEMA(('IFC2X3'));
ENDSEC;
DATA;
#1=IFCPROJECT('guid',$,'Test Project',$,$,$,$,$,#2);
#2=IFCUNITASSIGNMENT((#3));
#3=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);
#4=IFCSITE('guid2',$,'Site',$,$,$,$,$,$,$,$,$,$,$);
#5=IFCRELAGGREGATES('guid3',$,$,$,#1,(#4));
#6=IFCBUILDING('guid4',$,'Building',$,$,$,$,$,$,$,$,$);
#7=IFCRELAGGREGATES('guid5',$,$,$,#4,(#6));
#8=IFCBUILDINGSTOREY('guid6',$,'Ground Floor',$,$,$,$,$,.ELEMENT.,0.0);
#9=IFCRELAGGREGATES('guid7',$,$,$,#6,(#8));
#10=IFCWALL('guid8',$,'Wall 1',$,$,$,$,$);
#11=IFCRELCONTAINEDINSPATIALSTRUCTURE('guid9',$,$,$,(#10),#8);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_parse_model() {
        let model = ParsedModel::parse(TEST_IFC, true).unwrap();

        assert_eq!(model.metadata().schema_version, "IFC2X3");
        assert_eq!(model.metadata().file_name.as_deref(), Some("test.ifc"));
        assert_relative_eq!(model.unit_scale(), 0.001);

        let walls = model.resolver().find_by_type_name("IFCWALL");
        assert_eq!(walls.len(), 1);
        assert_eq!(walls[0].get_string(2), Some("Wall 1"));

        let storeys = model.resolver().entities_by_type(&IfcType::IfcBuildingStorey);
        assert_eq!(storeys[0].get_float(9), Some(0.0));
    }

    #[test]
    fn test_progress_reaches_completion() {
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        ParsedModel::parse_with_progress(
            TEST_IFC,
            true,
            Box::new(move |phase: &str, pct: f32| sink.lock().unwrap().push((phase.to_string(), pct))),
        )
        .unwrap();

        let phases = phases.lock().unwrap();
        assert_eq!(phases.first().map(|p| p.0.as_str()), Some("Checking header"));
        assert_eq!(phases.last().map(|p| p.1), Some(100.0));
    }

    #[test]
    fn test_rejects_non_step_input() {
        let err = ParsedModel::parse("{\"not\": \"ifc\"}", true).err().unwrap();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
    }

    #[test]
    fn test_rejects_unsupported_schema() {
        let content = TEST_IFC.replace("IFC2X3", "CONFIG_CONTROL_DESIGN");
        let err = ParsedModel::parse(&content, true).err().unwrap();
        assert!(matches!(err, ParseError::UnsupportedSchema(s) if s == "CONFIG_CONTROL_DESIGN"));
    }

    #[test]
    fn test_accepts_ifc4x3_variants() {
        let content = TEST_IFC.replace("IFC2X3", "IFC4X3_ADD2");
        assert!(ParsedModel::parse(&content, true).is_ok());
    }

    #[test]
    fn test_strict_parse_names_bad_record() {
        let content = TEST_IFC.replace(
            "#10=IFCWALL('guid8',$,'Wall 1',$,$,$,$,$);",
            "#10=IFCWALL('guid8',$,'Wall 1',$,$,$,$,$)) ;",
        );
        match ParsedModel::parse(&content, true) {
            Err(ParseError::EntityParse { id, line, .. }) => {
                assert_eq!(id, EntityId(10));
                assert_eq!(line, 17);
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("malformed record accepted"),
        }

        // Lenient mode defers the failure to the first lookup
        let model = ParsedModel::parse(&content, false).unwrap();
        assert!(model.resolver().get(EntityId(10)).is_none());
        assert!(model.resolver().get(EntityId(8)).is_some());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let content = TEST_IFC.replace("#11=", "#10=");
        assert!(matches!(
            ParsedModel::parse(&content, false),
            Err(ParseError::EntityParse { id: EntityId(10), .. })
        ));
    }
}
