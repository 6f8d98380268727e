// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Allowlist/denylist of IFC types
//!
//! Every entity type is either kept as a node of a fixed [`NodeType`],
//! denied (known noise, dropped quietly) or unknown (dropped with a warning).
//! The table is built once at start-up and read-only afterwards.

use crate::error::{GraphError, Result};
use crate::types::NodeType;
use ifc_graph_model::IfcType;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Outcome of classifying one entity type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Keep(NodeType),
    Denied,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rule {
    Keep(NodeType),
    Deny,
}

#[derive(Clone, Debug)]
struct Entry {
    schema_name: String,
    rule: Rule,
}

const KEEP: &[(&str, NodeType)] = &[
    // Building elements
    ("IfcWall", NodeType::Element),
    ("IfcWallStandardCase", NodeType::Element),
    ("IfcWallElementedCase", NodeType::Element),
    ("IfcCurtainWall", NodeType::Element),
    ("IfcSlab", NodeType::Element),
    ("IfcSlabStandardCase", NodeType::Element),
    ("IfcSlabElementedCase", NodeType::Element),
    ("IfcRoof", NodeType::Element),
    ("IfcBeam", NodeType::Element),
    ("IfcBeamStandardCase", NodeType::Element),
    ("IfcColumn", NodeType::Element),
    ("IfcColumnStandardCase", NodeType::Element),
    ("IfcDoor", NodeType::Element),
    ("IfcDoorStandardCase", NodeType::Element),
    ("IfcWindow", NodeType::Element),
    ("IfcWindowStandardCase", NodeType::Element),
    ("IfcStair", NodeType::Element),
    ("IfcRamp", NodeType::Element),
    ("IfcRailing", NodeType::Element),
    ("IfcCovering", NodeType::Element),
    ("IfcPlate", NodeType::Element),
    ("IfcPlateStandardCase", NodeType::Element),
    ("IfcMember", NodeType::Element),
    ("IfcMemberStandardCase", NodeType::Element),
    ("IfcFooting", NodeType::Element),
    ("IfcPile", NodeType::Element),
    ("IfcChimney", NodeType::Element),
    ("IfcShadingDevice", NodeType::Element),
    ("IfcBuildingElementProxy", NodeType::Element),
    ("IfcElementAssembly", NodeType::Element),
    ("IfcFurnishingElement", NodeType::Element),
    ("IfcFurniture", NodeType::Element),
    ("IfcSystemFurnitureElement", NodeType::Element),
    ("IfcTransportElement", NodeType::Element),
    ("IfcCivilElement", NodeType::Element),
    // Distribution elements
    ("IfcDistributionElement", NodeType::Element),
    ("IfcDistributionFlowElement", NodeType::Element),
    ("IfcDistributionControlElement", NodeType::Element),
    ("IfcFlowTerminal", NodeType::Element),
    ("IfcFlowSegment", NodeType::Element),
    ("IfcFlowFitting", NodeType::Element),
    ("IfcFlowController", NodeType::Element),
    ("IfcFlowMovingDevice", NodeType::Element),
    ("IfcFlowStorageDevice", NodeType::Element),
    ("IfcFlowTreatmentDevice", NodeType::Element),
    ("IfcEnergyConversionDevice", NodeType::Element),
    ("IfcDuctSegment", NodeType::Element),
    ("IfcDuctFitting", NodeType::Element),
    ("IfcPipeSegment", NodeType::Element),
    ("IfcPipeFitting", NodeType::Element),
    ("IfcCableCarrierSegment", NodeType::Element),
    ("IfcCableCarrierFitting", NodeType::Element),
    ("IfcCableSegment", NodeType::Element),
    ("IfcAirTerminal", NodeType::Element),
    ("IfcSanitaryTerminal", NodeType::Element),
    ("IfcLightFixture", NodeType::Element),
    ("IfcOutlet", NodeType::Element),
    ("IfcValve", NodeType::Element),
    ("IfcPump", NodeType::Element),
    ("IfcFan", NodeType::Element),
    ("IfcBoiler", NodeType::Element),
    ("IfcTank", NodeType::Element),
    ("IfcUnitaryEquipment", NodeType::Element),
    ("IfcElectricAppliance", NodeType::Element),
    ("IfcSwitchingDevice", NodeType::Element),
    // Components hosted by another element
    ("IfcStairFlight", NodeType::ElementSubtype),
    ("IfcRampFlight", NodeType::ElementSubtype),
    ("IfcBuildingElementPart", NodeType::ElementSubtype),
    ("IfcOpeningElement", NodeType::ElementSubtype),
    ("IfcOpeningStandardCase", NodeType::ElementSubtype),
    ("IfcProjectionElement", NodeType::ElementSubtype),
    ("IfcVoidingFeature", NodeType::ElementSubtype),
    ("IfcFastener", NodeType::ElementSubtype),
    ("IfcMechanicalFastener", NodeType::ElementSubtype),
    ("IfcDiscreteAccessory", NodeType::ElementSubtype),
    ("IfcReinforcingBar", NodeType::ElementSubtype),
    ("IfcReinforcingMesh", NodeType::ElementSubtype),
    ("IfcTendon", NodeType::ElementSubtype),
    // Spatial
    ("IfcSpace", NodeType::Space),
    ("IfcBuildingStorey", NodeType::Storey),
    // Systems
    ("IfcSystem", NodeType::System),
    ("IfcDistributionSystem", NodeType::System),
    ("IfcDistributionCircuit", NodeType::System),
    ("IfcBuildingSystem", NodeType::System),
    ("IfcBuiltSystem", NodeType::System),
];

const DENY: &[&str] = &[
    // Spatial roots
    "IfcProject",
    "IfcProjectLibrary",
    "IfcSite",
    "IfcBuilding",
    "IfcFacility",
    "IfcFacilityPart",
    "IfcBridge",
    "IfcRoad",
    "IfcRailway",
    "IfcMarineFacility",
    "IfcExternalSpatialElement",
    // Placement, annotation and grouping noise
    "IfcGrid",
    "IfcAnnotation",
    "IfcVirtualElement",
    "IfcZone",
    "IfcGroup",
    "IfcDistributionPort",
    "IfcGeographicElement",
];

/// On-disk extension format
///
/// ```json
/// {"keep": {"IfcAlignment": "Element"}, "deny": ["IfcSpatialZone"]}
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VocabularyFile {
    #[serde(default)]
    pub keep: BTreeMap<String, NodeType>,
    #[serde(default)]
    pub deny: Vec<String>,
}

/// Immutable type-name classification table
#[derive(Clone, Debug)]
pub struct Vocabulary {
    entries: FxHashMap<String, Entry>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Vocabulary {
    /// The built-in table
    pub fn builtin() -> Self {
        let mut entries = FxHashMap::default();
        for &(name, node_type) in KEEP {
            entries.insert(
                name.to_ascii_uppercase(),
                Entry {
                    schema_name: name.to_string(),
                    rule: Rule::Keep(node_type),
                },
            );
        }
        for &name in DENY {
            entries.insert(
                name.to_ascii_uppercase(),
                Entry {
                    schema_name: name.to_string(),
                    rule: Rule::Deny,
                },
            );
        }
        Self { entries }
    }

    /// Built-in table extended by a JSON file
    pub fn with_extension_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
        let file: VocabularyFile = serde_json::from_str(&text)?;
        let mut vocabulary = Self::builtin();
        vocabulary.extend(file)?;
        Ok(vocabulary)
    }

    /// Add entries from an extension
    ///
    /// New types may be kept or denied and kept types may be denied, but a
    /// built-in denial cannot be turned into a node type.
    pub fn extend(&mut self, file: VocabularyFile) -> Result<()> {
        for (name, node_type) in file.keep {
            let key = name.trim().to_ascii_uppercase();
            if key.is_empty() {
                return Err(GraphError::vocabulary("empty type name in keep list"));
            }
            if let Some(Entry {
                rule: Rule::Deny, ..
            }) = self.entries.get(&key)
            {
                return Err(GraphError::vocabulary(format!(
                    "{} is denied and cannot be kept",
                    name
                )));
            }
            self.entries.insert(
                key,
                Entry {
                    schema_name: name.trim().to_string(),
                    rule: Rule::Keep(node_type),
                },
            );
        }
        for name in file.deny {
            let key = name.trim().to_ascii_uppercase();
            if key.is_empty() {
                return Err(GraphError::vocabulary("empty type name in deny list"));
            }
            self.entries.insert(
                key,
                Entry {
                    schema_name: name.trim().to_string(),
                    rule: Rule::Deny,
                },
            );
        }
        Ok(())
    }

    /// Classify an entity type
    pub fn classify(&self, ifc_type: &IfcType) -> Classification {
        match self.entries.get(ifc_type.name()) {
            Some(Entry {
                rule: Rule::Keep(node_type),
                ..
            }) => Classification::Keep(*node_type),
            Some(Entry {
                rule: Rule::Deny, ..
            }) => Classification::Denied,
            None => Classification::Unknown,
        }
    }

    /// Schema spelling used in node ids and `has_type` facts, e.g. `IfcWall`
    pub fn display_name(&self, ifc_type: &IfcType) -> String {
        self.entries
            .get(ifc_type.name())
            .map(|e| e.schema_name.clone())
            .or_else(|| ifc_type.schema_name().map(str::to_string))
            .unwrap_or_else(|| ifc_type.name().to_string())
    }

    /// Every listed type (kept or denied), sorted by STEP name
    pub fn listed_types(&self) -> Vec<IfcType> {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        names.into_iter().map(|n| IfcType::parse(n)).collect()
    }

    /// Kept types grouped by node type, for documentation output
    pub fn kept_by_node_type(&self) -> BTreeMap<NodeType, Vec<String>> {
        let mut grouped: BTreeMap<NodeType, Vec<String>> = BTreeMap::new();
        for entry in self.entries.values() {
            if let Rule::Keep(node_type) = entry.rule {
                grouped
                    .entry(node_type)
                    .or_default()
                    .push(entry.schema_name.clone());
            }
        }
        for names in grouped.values_mut() {
            names.sort();
        }
        grouped
    }

    /// Denied type names, sorted
    pub fn denied(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .values()
            .filter(|e| e.rule == Rule::Deny)
            .map(|e| e.schema_name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_classification() {
        let vocab = Vocabulary::builtin();
        assert_eq!(
            vocab.classify(&IfcType::IfcWall),
            Classification::Keep(NodeType::Element)
        );
        assert_eq!(
            vocab.classify(&IfcType::IfcStairFlight),
            Classification::Keep(NodeType::ElementSubtype)
        );
        assert_eq!(
            vocab.classify(&IfcType::IfcBuildingStorey),
            Classification::Keep(NodeType::Storey)
        );
        assert_eq!(
            vocab.classify(&IfcType::IfcDistributionSystem),
            Classification::Keep(NodeType::System)
        );
        for denied in [IfcType::IfcProject, IfcType::IfcSite, IfcType::IfcBuilding] {
            assert_eq!(vocab.classify(&denied), Classification::Denied);
        }
        assert_eq!(
            vocab.classify(&IfcType::parse("IFCALIGNMENT")),
            Classification::Unknown
        );
    }

    #[test]
    fn test_lists_are_disjoint() {
        for &(name, _) in KEEP {
            assert!(!DENY.contains(&name), "{name} is both kept and denied");
        }
    }

    #[test]
    fn test_every_builtin_name_is_a_known_type() {
        for name in KEEP.iter().map(|(n, _)| *n).chain(DENY.iter().copied()) {
            assert_eq!(
                IfcType::parse(name).schema_name(),
                Some(name),
                "{name} missing from the type table"
            );
        }
    }

    #[test]
    fn test_display_name_uses_schema_spelling() {
        let vocab = Vocabulary::builtin();
        assert_eq!(vocab.display_name(&IfcType::parse("IFCWALL")), "IfcWall");
        assert_eq!(
            vocab.display_name(&IfcType::parse("IFCALIGNMENT")),
            "IFCALIGNMENT"
        );
    }

    #[test]
    fn test_extension_adds_and_denies() {
        let mut vocab = Vocabulary::builtin();
        let file: VocabularyFile = serde_json::from_str(
            r#"{"keep": {"IfcAlignment": "Element"}, "deny": ["IfcFurniture"]}"#,
        )
        .unwrap();
        vocab.extend(file).unwrap();

        let alignment = IfcType::parse("IFCALIGNMENT");
        assert_eq!(
            vocab.classify(&alignment),
            Classification::Keep(NodeType::Element)
        );
        assert_eq!(vocab.display_name(&alignment), "IfcAlignment");
        assert_eq!(vocab.classify(&IfcType::IfcFurniture), Classification::Denied);
    }

    #[test]
    fn test_extension_cannot_keep_denied_type() {
        let mut vocab = Vocabulary::builtin();
        let file = VocabularyFile {
            keep: BTreeMap::from([("IfcSite".to_string(), NodeType::Space)]),
            deny: Vec::new(),
        };
        assert!(matches!(vocab.extend(file), Err(GraphError::Vocabulary(_))));
    }

    #[test]
    fn test_extension_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");
        std::fs::write(&path, r#"{"keep": {"IfcSpatialZone": "Space"}}"#).unwrap();

        let vocab = Vocabulary::with_extension_file(&path).unwrap();
        assert_eq!(
            vocab.classify(&IfcType::IfcSpatialZone),
            Classification::Keep(NodeType::Space)
        );
        assert!(Vocabulary::with_extension_file(dir.path().join("absent.json")).is_err());
    }
}
