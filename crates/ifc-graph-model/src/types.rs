// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for IFC data representation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type-safe entity identifier
///
/// Wraps the raw IFC entity ID (e.g., #123 becomes EntityId(123))
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        EntityId(id)
    }
}

impl From<EntityId> for u32 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Declares [`IfcType`] together with its STEP spelling, so `parse` and
/// `name` can never drift apart.
macro_rules! ifc_types {
    ($( $section:literal => { $( $variant:ident => $step:literal ),* $(,)? } )*) => {
        /// IFC entity types the graph pipeline knows by name
        ///
        /// Anything else is captured as `Unknown` with its upper-cased STEP name.
        #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
        pub enum IfcType {
            $( $( $variant, )* )*
            /// Unknown type - stores the upper-cased type name
            Unknown(String),
        }

        impl IfcType {
            /// Parse a type name string into an IfcType (case-insensitive)
            pub fn parse(s: &str) -> Self {
                let upper = s.trim().to_ascii_uppercase();
                match upper.as_str() {
                    $( $( $step => IfcType::$variant, )* )*
                    _ => IfcType::Unknown(upper),
                }
            }

            /// STEP spelling of the type, e.g. `IFCWALL`
            pub fn name(&self) -> &str {
                match self {
                    $( $( IfcType::$variant => $step, )* )*
                    IfcType::Unknown(s) => s,
                }
            }

            /// Schema spelling of a known type, e.g. `IfcWall`
            pub fn schema_name(&self) -> Option<&'static str> {
                match self {
                    $( $( IfcType::$variant => Some(stringify!($variant)), )* )*
                    IfcType::Unknown(_) => None,
                }
            }

            /// Which group of the type table the type was declared in
            pub fn family(&self) -> Option<&'static str> {
                match self {
                    $( $( IfcType::$variant => Some($section), )* )*
                    IfcType::Unknown(_) => None,
                }
            }
        }
    };
}

ifc_types! {
    "spatial" => {
        IfcProject => "IFCPROJECT",
        IfcProjectLibrary => "IFCPROJECTLIBRARY",
        IfcSite => "IFCSITE",
        IfcBuilding => "IFCBUILDING",
        IfcBuildingStorey => "IFCBUILDINGSTOREY",
        IfcSpace => "IFCSPACE",
        IfcFacility => "IFCFACILITY",
        IfcFacilityPart => "IFCFACILITYPART",
        IfcBridge => "IFCBRIDGE",
        IfcRoad => "IFCROAD",
        IfcRailway => "IFCRAILWAY",
        IfcMarineFacility => "IFCMARINEFACILITY",
        IfcExternalSpatialElement => "IFCEXTERNALSPATIALELEMENT",
        IfcSpatialZone => "IFCSPATIALZONE",
    }
    "element" => {
        IfcWall => "IFCWALL",
        IfcWallStandardCase => "IFCWALLSTANDARDCASE",
        IfcWallElementedCase => "IFCWALLELEMENTEDCASE",
        IfcCurtainWall => "IFCCURTAINWALL",
        IfcSlab => "IFCSLAB",
        IfcSlabStandardCase => "IFCSLABSTANDARDCASE",
        IfcSlabElementedCase => "IFCSLABELEMENTEDCASE",
        IfcRoof => "IFCROOF",
        IfcBeam => "IFCBEAM",
        IfcBeamStandardCase => "IFCBEAMSTANDARDCASE",
        IfcColumn => "IFCCOLUMN",
        IfcColumnStandardCase => "IFCCOLUMNSTANDARDCASE",
        IfcDoor => "IFCDOOR",
        IfcDoorStandardCase => "IFCDOORSTANDARDCASE",
        IfcWindow => "IFCWINDOW",
        IfcWindowStandardCase => "IFCWINDOWSTANDARDCASE",
        IfcStair => "IFCSTAIR",
        IfcStairFlight => "IFCSTAIRFLIGHT",
        IfcRamp => "IFCRAMP",
        IfcRampFlight => "IFCRAMPFLIGHT",
        IfcRailing => "IFCRAILING",
        IfcCovering => "IFCCOVERING",
        IfcPlate => "IFCPLATE",
        IfcPlateStandardCase => "IFCPLATESTANDARDCASE",
        IfcMember => "IFCMEMBER",
        IfcMemberStandardCase => "IFCMEMBERSTANDARDCASE",
        IfcFooting => "IFCFOOTING",
        IfcPile => "IFCPILE",
        IfcChimney => "IFCCHIMNEY",
        IfcShadingDevice => "IFCSHADINGDEVICE",
        IfcBuildingElementProxy => "IFCBUILDINGELEMENTPROXY",
        IfcElementAssembly => "IFCELEMENTASSEMBLY",
        IfcFurnishingElement => "IFCFURNISHINGELEMENT",
        IfcFurniture => "IFCFURNITURE",
        IfcSystemFurnitureElement => "IFCSYSTEMFURNITUREELEMENT",
        IfcTransportElement => "IFCTRANSPORTELEMENT",
        IfcCivilElement => "IFCCIVILELEMENT",
        IfcGeographicElement => "IFCGEOGRAPHICELEMENT",
        IfcVirtualElement => "IFCVIRTUALELEMENT",
        IfcAnnotation => "IFCANNOTATION",
        IfcGrid => "IFCGRID",
    }
    "distribution" => {
        IfcDistributionElement => "IFCDISTRIBUTIONELEMENT",
        IfcDistributionFlowElement => "IFCDISTRIBUTIONFLOWELEMENT",
        IfcDistributionControlElement => "IFCDISTRIBUTIONCONTROLELEMENT",
        IfcDistributionPort => "IFCDISTRIBUTIONPORT",
        IfcFlowTerminal => "IFCFLOWTERMINAL",
        IfcFlowSegment => "IFCFLOWSEGMENT",
        IfcFlowFitting => "IFCFLOWFITTING",
        IfcFlowController => "IFCFLOWCONTROLLER",
        IfcFlowMovingDevice => "IFCFLOWMOVINGDEVICE",
        IfcFlowStorageDevice => "IFCFLOWSTORAGEDEVICE",
        IfcFlowTreatmentDevice => "IFCFLOWTREATMENTDEVICE",
        IfcEnergyConversionDevice => "IFCENERGYCONVERSIONDEVICE",
        IfcDuctSegment => "IFCDUCTSEGMENT",
        IfcDuctFitting => "IFCDUCTFITTING",
        IfcPipeSegment => "IFCPIPESEGMENT",
        IfcPipeFitting => "IFCPIPEFITTING",
        IfcCableCarrierSegment => "IFCCABLECARRIERSEGMENT",
        IfcCableCarrierFitting => "IFCCABLECARRIERFITTING",
        IfcCableSegment => "IFCCABLESEGMENT",
        IfcAirTerminal => "IFCAIRTERMINAL",
        IfcSanitaryTerminal => "IFCSANITARYTERMINAL",
        IfcLightFixture => "IFCLIGHTFIXTURE",
        IfcOutlet => "IFCOUTLET",
        IfcValve => "IFCVALVE",
        IfcPump => "IFCPUMP",
        IfcFan => "IFCFAN",
        IfcBoiler => "IFCBOILER",
        IfcTank => "IFCTANK",
        IfcUnitaryEquipment => "IFCUNITARYEQUIPMENT",
        IfcElectricAppliance => "IFCELECTRICAPPLIANCE",
        IfcSwitchingDevice => "IFCSWITCHINGDEVICE",
    }
    "component" => {
        IfcBuildingElementPart => "IFCBUILDINGELEMENTPART",
        IfcOpeningElement => "IFCOPENINGELEMENT",
        IfcOpeningStandardCase => "IFCOPENINGSTANDARDCASE",
        IfcProjectionElement => "IFCPROJECTIONELEMENT",
        IfcVoidingFeature => "IFCVOIDINGFEATURE",
        IfcFastener => "IFCFASTENER",
        IfcMechanicalFastener => "IFCMECHANICALFASTENER",
        IfcDiscreteAccessory => "IFCDISCRETEACCESSORY",
        IfcReinforcingBar => "IFCREINFORCINGBAR",
        IfcReinforcingMesh => "IFCREINFORCINGMESH",
        IfcTendon => "IFCTENDON",
    }
    "group" => {
        IfcGroup => "IFCGROUP",
        IfcZone => "IFCZONE",
        IfcSystem => "IFCSYSTEM",
        IfcDistributionSystem => "IFCDISTRIBUTIONSYSTEM",
        IfcDistributionCircuit => "IFCDISTRIBUTIONCIRCUIT",
        IfcBuildingSystem => "IFCBUILDINGSYSTEM",
        IfcBuiltSystem => "IFCBUILTSYSTEM",
    }
    "relation" => {
        IfcRelAggregates => "IFCRELAGGREGATES",
        IfcRelNests => "IFCRELNESTS",
        IfcRelContainedInSpatialStructure => "IFCRELCONTAINEDINSPATIALSTRUCTURE",
        IfcRelConnectsElements => "IFCRELCONNECTSELEMENTS",
        IfcRelConnectsPathElements => "IFCRELCONNECTSPATHELEMENTS",
        IfcRelAssignsToGroup => "IFCRELASSIGNSTOGROUP",
        IfcRelServicesBuildings => "IFCRELSERVICESBUILDINGS",
        IfcRelVoidsElement => "IFCRELVOIDSELEMENT",
        IfcRelProjectsElement => "IFCRELPROJECTSELEMENT",
        IfcRelFillsElement => "IFCRELFILLSELEMENT",
        IfcRelDefinesByProperties => "IFCRELDEFINESBYPROPERTIES",
    }
    "placement" => {
        IfcLocalPlacement => "IFCLOCALPLACEMENT",
        IfcAxis2Placement2D => "IFCAXIS2PLACEMENT2D",
        IfcAxis2Placement3D => "IFCAXIS2PLACEMENT3D",
        IfcCartesianPoint => "IFCCARTESIANPOINT",
        IfcDirection => "IFCDIRECTION",
        IfcCartesianTransformationOperator3D => "IFCCARTESIANTRANSFORMATIONOPERATOR3D",
        IfcCartesianTransformationOperator3DnonUniform => "IFCCARTESIANTRANSFORMATIONOPERATOR3DNONUNIFORM",
    }
    "representation" => {
        IfcProductDefinitionShape => "IFCPRODUCTDEFINITIONSHAPE",
        IfcShapeRepresentation => "IFCSHAPEREPRESENTATION",
        IfcRepresentationMap => "IFCREPRESENTATIONMAP",
        IfcMappedItem => "IFCMAPPEDITEM",
        IfcExtrudedAreaSolid => "IFCEXTRUDEDAREASOLID",
        IfcBoundingBox => "IFCBOUNDINGBOX",
        IfcBlock => "IFCBLOCK",
        IfcFacetedBrep => "IFCFACETEDBREP",
        IfcFacetedBrepWithVoids => "IFCFACETEDBREPWITHVOIDS",
        IfcClosedShell => "IFCCLOSEDSHELL",
        IfcOpenShell => "IFCOPENSHELL",
        IfcFace => "IFCFACE",
        IfcFaceBound => "IFCFACEBOUND",
        IfcFaceOuterBound => "IFCFACEOUTERBOUND",
        IfcPolyLoop => "IFCPOLYLOOP",
        IfcShellBasedSurfaceModel => "IFCSHELLBASEDSURFACEMODEL",
        IfcTriangulatedFaceSet => "IFCTRIANGULATEDFACESET",
        IfcPolygonalFaceSet => "IFCPOLYGONALFACESET",
        IfcCartesianPointList2D => "IFCCARTESIANPOINTLIST2D",
        IfcCartesianPointList3D => "IFCCARTESIANPOINTLIST3D",
        IfcBooleanResult => "IFCBOOLEANRESULT",
        IfcBooleanClippingResult => "IFCBOOLEANCLIPPINGRESULT",
    }
    "profile" => {
        IfcRectangleProfileDef => "IFCRECTANGLEPROFILEDEF",
        IfcRectangleHollowProfileDef => "IFCRECTANGLEHOLLOWPROFILEDEF",
        IfcRoundedRectangleProfileDef => "IFCROUNDEDRECTANGLEPROFILEDEF",
        IfcCircleProfileDef => "IFCCIRCLEPROFILEDEF",
        IfcCircleHollowProfileDef => "IFCCIRCLEHOLLOWPROFILEDEF",
        IfcArbitraryClosedProfileDef => "IFCARBITRARYCLOSEDPROFILEDEF",
        IfcArbitraryProfileDefWithVoids => "IFCARBITRARYPROFILEDEFWITHVOIDS",
        IfcIShapeProfileDef => "IFCISHAPEPROFILEDEF",
        IfcLShapeProfileDef => "IFCLSHAPEPROFILEDEF",
        IfcTShapeProfileDef => "IFCTSHAPEPROFILEDEF",
        IfcUShapeProfileDef => "IFCUSHAPEPROFILEDEF",
        IfcCShapeProfileDef => "IFCCSHAPEPROFILEDEF",
        IfcZShapeProfileDef => "IFCZSHAPEPROFILEDEF",
        IfcPolyline => "IFCPOLYLINE",
        IfcIndexedPolyCurve => "IFCINDEXEDPOLYCURVE",
        IfcCompositeCurve => "IFCCOMPOSITECURVE",
        IfcCompositeCurveSegment => "IFCCOMPOSITECURVESEGMENT",
        IfcTrimmedCurve => "IFCTRIMMEDCURVE",
        IfcCircle => "IFCCIRCLE",
        IfcLine => "IFCLINE",
    }
    "unit" => {
        IfcUnitAssignment => "IFCUNITASSIGNMENT",
        IfcSIUnit => "IFCSIUNIT",
        IfcConversionBasedUnit => "IFCCONVERSIONBASEDUNIT",
        IfcMeasureWithUnit => "IFCMEASUREWITHUNIT",
    }
}

impl FromStr for IfcType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl IfcType {
    /// Check if this type is a spatial structure element
    pub fn is_spatial(&self) -> bool {
        self.family() == Some("spatial")
    }

    /// Check if this type is an objectified relationship we read
    pub fn is_relation(&self) -> bool {
        self.family() == Some("relation")
    }
}

impl Default for IfcType {
    fn default() -> Self {
        IfcType::Unknown(String::new())
    }
}

impl fmt::Display for IfcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decoded attribute value
///
/// Represents any value that can appear in an IFC entity's attribute list.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum AttributeValue {
    /// Null value ($)
    #[default]
    Null,
    /// Derived value (*)
    Derived,
    /// Entity reference (#123)
    EntityRef(EntityId),
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value, with STEP quote escapes already undone
    String(String),
    /// Enumeration value (.VALUE.)
    Enum(String),
    /// List of values
    List(Vec<AttributeValue>),
    /// Typed value like IFCLABEL('text')
    TypedValue(String, Vec<AttributeValue>),
}

impl AttributeValue {
    /// Try to get as entity reference
    pub fn as_entity_ref(&self) -> Option<EntityId> {
        match self {
            AttributeValue::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Try to get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            AttributeValue::TypedValue(_, args) if !args.is_empty() => args[0].as_string(),
            _ => None,
        }
    }

    /// Try to get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(f) => Some(*f),
            AttributeValue::Integer(i) => Some(*i as f64),
            AttributeValue::TypedValue(_, args) if !args.is_empty() => args[0].as_float(),
            _ => None,
        }
    }

    /// Try to get as integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            AttributeValue::Enum(s) => match s.to_uppercase().as_str() {
                "TRUE" | "T" => Some(true),
                "FALSE" | "F" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Try to get as enum string
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            AttributeValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as list
    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            AttributeValue::List(list) => Some(list),
            _ => None,
        }
    }

    /// Numbers of a list attribute, skipping non-numeric members
    pub fn as_float_list(&self) -> Option<Vec<f64>> {
        self.as_list()
            .map(|list| list.iter().filter_map(|v| v.as_float()).collect())
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

/// Decoded IFC entity
#[derive(Clone, Debug)]
pub struct DecodedEntity {
    /// Entity ID
    pub id: EntityId,
    /// Entity type
    pub ifc_type: IfcType,
    /// Attribute values in order
    pub attributes: Vec<AttributeValue>,
}

impl DecodedEntity {
    /// Get attribute at index
    pub fn get(&self, index: usize) -> Option<&AttributeValue> {
        self.attributes.get(index)
    }

    /// Get entity reference at index
    pub fn get_ref(&self, index: usize) -> Option<EntityId> {
        self.get(index).and_then(|v| v.as_entity_ref())
    }

    /// Get string at index
    pub fn get_string(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|v| v.as_string())
    }

    /// Get float at index
    pub fn get_float(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|v| v.as_float())
    }

    /// Get list at index
    pub fn get_list(&self, index: usize) -> Option<&[AttributeValue]> {
        self.get(index).and_then(|v| v.as_list())
    }

    /// Get enum string at index
    pub fn get_enum(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|v| v.as_enum())
    }

    /// Get list of entity references at index
    pub fn get_refs(&self, index: usize) -> Option<Vec<EntityId>> {
        self.get_list(index)
            .map(|list| list.iter().filter_map(|v| v.as_entity_ref()).collect())
    }

    /// Entity references at index, accepting a single reference as a
    /// one-element list
    pub fn get_ref_or_refs(&self, index: usize) -> Vec<EntityId> {
        match self.get(index) {
            Some(AttributeValue::EntityRef(id)) => vec![*id],
            Some(AttributeValue::List(_)) => self.get_refs(index).unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

/// Model metadata extracted from IFC header
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// IFC schema version (e.g., "IFC2X3", "IFC4", "IFC4X3")
    pub schema_version: String,
    /// Originating system (CAD application)
    pub originating_system: Option<String>,
    /// Preprocessor version
    pub preprocessor_version: Option<String>,
    /// File name from header
    pub file_name: Option<String>,
    /// File description
    pub file_description: Option<String>,
    /// Author
    pub author: Option<String>,
    /// Organization
    pub organization: Option<String>,
    /// Timestamp
    pub timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(IfcType::parse("IFCWALL"), IfcType::IfcWall);
        assert_eq!(IfcType::parse("IfcWall"), IfcType::IfcWall);
        assert_eq!(
            IfcType::parse("IfcBuildingStorey"),
            IfcType::IfcBuildingStorey
        );
    }

    #[test]
    fn test_name_and_schema_name_agree() {
        let t = IfcType::IfcRelContainedInSpatialStructure;
        assert_eq!(t.name(), "IFCRELCONTAINEDINSPATIALSTRUCTURE");
        assert_eq!(t.schema_name(), Some("IfcRelContainedInSpatialStructure"));
        assert_eq!(IfcType::parse(t.name()), t);
    }

    #[test]
    fn test_unknown_keeps_upper_name() {
        let t = IfcType::parse("IfcAlignmentSegment");
        assert_eq!(t, IfcType::Unknown("IFCALIGNMENTSEGMENT".to_string()));
        assert_eq!(t.name(), "IFCALIGNMENTSEGMENT");
        assert_eq!(t.schema_name(), None);
    }

    #[test]
    fn test_families() {
        assert!(IfcType::IfcSite.is_spatial());
        assert!(!IfcType::IfcWall.is_spatial());
        assert!(IfcType::IfcRelAggregates.is_relation());
        assert_eq!(IfcType::IfcPipeSegment.family(), Some("distribution"));
    }

    #[test]
    fn test_ref_or_refs_accepts_both_shapes() {
        let entity = DecodedEntity {
            id: EntityId(1),
            ifc_type: IfcType::IfcRelConnectsElements,
            attributes: vec![
                AttributeValue::EntityRef(EntityId(5)),
                AttributeValue::List(vec![
                    AttributeValue::EntityRef(EntityId(6)),
                    AttributeValue::Null,
                    AttributeValue::EntityRef(EntityId(7)),
                ]),
                AttributeValue::Null,
            ],
        };
        assert_eq!(entity.get_ref_or_refs(0), vec![EntityId(5)]);
        assert_eq!(entity.get_ref_or_refs(1), vec![EntityId(6), EntityId(7)]);
        assert!(entity.get_ref_or_refs(2).is_empty());
    }
}
