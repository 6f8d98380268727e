// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Length unit extraction
//!
//! Every coordinate the graph pipeline reports is in meters, so the file's
//! length unit has to be known before any geometry is read.

use ifc_graph_model::{AttributeValue, DecodedEntity, EntityResolver, IfcType};
use tracing::debug;

/// Meters per file length unit
///
/// Follows `IFCPROJECT.UnitsInContext` (attribute 8) to the length unit of
/// its `IFCUNITASSIGNMENT`. Falls back to 1.0 when the file does not say.
pub fn extract_unit_scale(resolver: &dyn EntityResolver) -> f64 {
    let scale = resolver
        .entities_by_type(&IfcType::IfcProject)
        .first()
        .and_then(|project| project.get_ref(8))
        .and_then(|units| resolver.get(units))
        .and_then(|assignment| {
            assignment
                .get_refs(0)?
                .into_iter()
                .filter_map(|id| resolver.get(id))
                .find_map(|unit| length_unit_scale(&unit, resolver, 0))
        });

    match scale {
        Some(scale) if scale.is_finite() && scale > 0.0 => scale,
        _ => {
            debug!("no usable length unit, assuming meters");
            1.0
        }
    }
}

/// Scale of a unit entity if it is a length unit
fn length_unit_scale(
    unit: &DecodedEntity,
    resolver: &dyn EntityResolver,
    depth: usize,
) -> Option<f64> {
    // IFCSIUNIT(*, UnitType, Prefix, Name) and
    // IFCCONVERSIONBASEDUNIT(Dimensions, UnitType, Name, ConversionFactor)
    // both carry the unit type at attribute 1.
    if unit.get_enum(1)? != "LENGTHUNIT" || depth > 4 {
        return None;
    }

    match unit.ifc_type {
        IfcType::IfcSIUnit => {
            if unit.get_enum(3)? != "METRE" {
                return None;
            }
            Some(unit.get_enum(2).map_or(1.0, si_prefix_scale))
        }
        IfcType::IfcConversionBasedUnit => {
            let from_factor = unit
                .get_ref(3)
                .and_then(|id| resolver.get(id))
                .filter(|m| m.ifc_type == IfcType::IfcMeasureWithUnit)
                .and_then(|measure| {
                    // IFCMEASUREWITHUNIT(ValueComponent, UnitComponent)
                    let value = measure.get(0).and_then(AttributeValue::as_float)?;
                    let base = measure
                        .get_ref(1)
                        .and_then(|id| resolver.get(id))
                        .and_then(|base| length_unit_scale(&base, resolver, depth + 1))
                        .unwrap_or(1.0);
                    Some(value * base)
                });
            from_factor.or_else(|| unit.get_string(2).and_then(imperial_scale))
        }
        _ => None,
    }
}

/// SI prefix multiplier (`.MILLI.` and friends)
pub fn si_prefix_scale(prefix: &str) -> f64 {
    match prefix {
        "EXA" => 1e18,
        "PETA" => 1e15,
        "TERA" => 1e12,
        "GIGA" => 1e9,
        "MEGA" => 1e6,
        "KILO" => 1e3,
        "HECTO" => 1e2,
        "DECA" => 1e1,
        "DECI" => 1e-1,
        "CENTI" => 1e-2,
        "MILLI" => 1e-3,
        "MICRO" => 1e-6,
        "NANO" => 1e-9,
        "PICO" => 1e-12,
        "FEMTO" => 1e-15,
        "ATTO" => 1e-18,
        _ => 1.0,
    }
}

/// Named conversion units written without a usable conversion factor
fn imperial_scale(name: &str) -> Option<f64> {
    match name.to_ascii_uppercase().as_str() {
        "INCH" => Some(0.0254),
        "FOOT" => Some(0.3048),
        "YARD" => Some(0.9144),
        "MILE" => Some(1609.344),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParsedModel;
    use approx::assert_relative_eq;
    use ifc_graph_model::IfcModel;

    fn model_with_units(units: &str) -> ParsedModel {
        let content = format!(
            "ISO-10303-21;\nHEADER;\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n\
             #1=IFCPROJECT('guid',$,'P',$,$,$,$,$,#2);\n{}\nENDSEC;\nEND-ISO-10303-21;\n",
            units
        );
        ParsedModel::parse(&content, true).unwrap()
    }

    #[test]
    fn test_millimetre_prefix() {
        let model = model_with_units(
            "#2=IFCUNITASSIGNMENT((#4,#3));\n\
             #3=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);\n\
             #4=IFCSIUNIT(*,.AREAUNIT.,$,.SQUARE_METRE.);",
        );
        assert_relative_eq!(model.unit_scale(), 0.001);
    }

    #[test]
    fn test_conversion_based_foot() {
        let model = model_with_units(
            "#2=IFCUNITASSIGNMENT((#3));\n\
             #3=IFCCONVERSIONBASEDUNIT(#5,.LENGTHUNIT.,'FOOT',#4);\n\
             #4=IFCMEASUREWITHUNIT(IFCLENGTHMEASURE(0.3048),#6);\n\
             #5=IFCDIMENSIONALEXPONENTS(1,0,0,0,0,0,0);\n\
             #6=IFCSIUNIT(*,.LENGTHUNIT.,$,.METRE.);",
        );
        assert_relative_eq!(model.unit_scale(), 0.3048);
    }

    #[test]
    fn test_missing_units_default_to_meters() {
        let model = model_with_units("#2=IFCUNITASSIGNMENT(());");
        assert_relative_eq!(model.unit_scale(), 1.0);
    }

    #[test]
    fn test_prefix_table() {
        assert_relative_eq!(si_prefix_scale("CENTI"), 0.01);
        assert_relative_eq!(si_prefix_scale("KILO"), 1000.0);
        assert_relative_eq!(si_prefix_scale("UNHEARD_OF"), 1.0);
    }
}
