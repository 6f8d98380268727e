// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Profile outlines
//!
//! Only the outer boundary matters for bounds, so holes and fillets are
//! ignored and every parameterized profile collapses to its bounding
//! rectangle (IFC4 centers them on the position).

use super::router::{point_from_coords, GeometryRouter};
use crate::{GraphError, Result};
use ifc_graph_model::{DecodedEntity, EntityId, EntityResolver, IfcType};
use nalgebra::{Point2, Point3};
use std::f64::consts::PI;

/// Segments of the polygon circumscribing a circle
const CIRCLE_SEGMENTS: usize = 16;

/// Nesting limit for composite and trimmed curves
const MAX_CURVE_DEPTH: usize = 8;

/// Outer boundary of a profile definition in the profile's placement
pub(crate) fn profile_outline(
    profile: &DecodedEntity,
    router: &GeometryRouter,
    resolver: &dyn EntityResolver,
) -> Result<Vec<Point2<f64>>> {
    let outline = match profile.ifc_type {
        IfcType::IfcArbitraryClosedProfileDef | IfcType::IfcArbitraryProfileDefWithVoids => {
            let curve = profile
                .get_ref(2)
                .ok_or_else(|| GraphError::geometry(profile.id, "missing OuterCurve"))?;
            let points = curve_points(curve, router, resolver, 0)?;
            return Ok(points.iter().map(|p| Point2::new(p.x, p.y)).collect());
        }
        IfcType::IfcRectangleProfileDef
        | IfcType::IfcRectangleHollowProfileDef
        | IfcType::IfcRoundedRectangleProfileDef
        | IfcType::IfcIShapeProfileDef
        | IfcType::IfcLShapeProfileDef
        | IfcType::IfcCShapeProfileDef => {
            // XDim/OverallWidth/Depth at 3, YDim/OverallDepth/Width at 4
            let a = dimension(profile, 3)?;
            let b = profile.get_float(4).unwrap_or(a);
            match profile.ifc_type {
                // Depth runs along y for L and C shapes
                IfcType::IfcLShapeProfileDef | IfcType::IfcCShapeProfileDef => rectangle(b, a),
                _ => rectangle(a, b),
            }
        }
        IfcType::IfcTShapeProfileDef | IfcType::IfcUShapeProfileDef => {
            let depth = dimension(profile, 3)?;
            let flange = dimension(profile, 4)?;
            rectangle(flange, depth)
        }
        IfcType::IfcZShapeProfileDef => {
            let depth = dimension(profile, 3)?;
            let flange = dimension(profile, 4)?;
            rectangle(2.0 * flange, depth)
        }
        IfcType::IfcCircleProfileDef | IfcType::IfcCircleHollowProfileDef => {
            circle(dimension(profile, 3)?)
        }
        _ => {
            return Err(GraphError::geometry(
                profile.id,
                format!("unsupported profile type {}", profile.ifc_type),
            ))
        }
    };

    // Position (2) of IfcParameterizedProfileDef
    let Some(transform) = profile
        .get_ref(2)
        .and_then(|id| router.axis2_placement(id, resolver))
    else {
        return Ok(outline);
    };
    Ok(outline
        .into_iter()
        .map(|p| {
            let q = transform.transform_point(&Point3::new(p.x, p.y, 0.0));
            Point2::new(q.x, q.y)
        })
        .collect())
}

/// Points bounding a curve
pub(crate) fn curve_points(
    curve_id: EntityId,
    router: &GeometryRouter,
    resolver: &dyn EntityResolver,
    depth: usize,
) -> Result<Vec<Point3<f64>>> {
    if depth >= MAX_CURVE_DEPTH {
        return Err(GraphError::geometry(curve_id, "curve nested too deep"));
    }
    let curve = resolver
        .get(curve_id)
        .ok_or_else(|| GraphError::geometry(curve_id, "curve not found"))?;

    let points = match curve.ifc_type {
        IfcType::IfcPolyline => curve
            .get_refs(0)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| router.cartesian_point(id, resolver))
            .collect(),
        IfcType::IfcIndexedPolyCurve => {
            let list = curve
                .get_ref(0)
                .ok_or_else(|| GraphError::geometry(curve_id, "missing Points"))?;
            point_list(list, resolver)?
        }
        IfcType::IfcCompositeCurve => {
            let mut points = Vec::new();
            for segment_id in curve.get_refs(0).unwrap_or_default() {
                // ParentCurve (2) of IfcCompositeCurveSegment
                let Some(parent) = resolver.get(segment_id).and_then(|s| s.get_ref(2)) else {
                    continue;
                };
                points.extend(curve_points(parent, router, resolver, depth + 1)?);
            }
            points
        }
        IfcType::IfcTrimmedCurve => {
            // Trim1 (1) and Trim2 (2) may hold an IfcCartesianPoint
            let mut points: Vec<Point3<f64>> = [1, 2]
                .into_iter()
                .flat_map(|index| curve.get_ref_or_refs(index))
                .filter_map(|id| router.cartesian_point(id, resolver))
                .collect();
            let basis = curve
                .get_ref(0)
                .ok_or_else(|| GraphError::geometry(curve_id, "missing BasisCurve"))?;
            // An unbounded line is only known through its trims
            let basis_is_line = resolver
                .get(basis)
                .is_some_and(|b| b.ifc_type == IfcType::IfcLine);
            if !basis_is_line {
                points.extend(curve_points(basis, router, resolver, depth + 1)?);
            }
            points
        }
        IfcType::IfcCircle => {
            let radius = dimension(&curve, 1)?;
            let transform = curve
                .get_ref(0)
                .and_then(|id| router.axis2_placement(id, resolver));
            circle(radius)
                .into_iter()
                .map(|p| {
                    let q = Point3::new(p.x, p.y, 0.0);
                    match &transform {
                        Some(m) => m.transform_point(&q),
                        None => q,
                    }
                })
                .collect()
        }
        _ => {
            return Err(GraphError::geometry(
                curve_id,
                format!("unsupported curve type {}", curve.ifc_type),
            ))
        }
    };

    if points.is_empty() {
        return Err(GraphError::geometry(curve_id, "curve has no points"));
    }
    Ok(points)
}

/// Coordinates of an IfcCartesianPointList2D or IfcCartesianPointList3D
pub(crate) fn point_list(
    list_id: EntityId,
    resolver: &dyn EntityResolver,
) -> Result<Vec<Point3<f64>>> {
    let list = resolver
        .get(list_id)
        .ok_or_else(|| GraphError::geometry(list_id, "point list not found"))?;
    let coords = list
        .get_list(0)
        .ok_or_else(|| GraphError::geometry(list_id, "missing CoordList"))?;
    Ok(coords
        .iter()
        .filter_map(|c| c.as_float_list())
        .filter_map(|c| point_from_coords(&c))
        .collect())
}

fn dimension(entity: &DecodedEntity, index: usize) -> Result<f64> {
    entity
        .get_float(index)
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| GraphError::geometry(entity.id, format!("missing dimension at {index}")))
}

fn rectangle(width: f64, height: f64) -> Vec<Point2<f64>> {
    let (hx, hy) = (width * 0.5, height * 0.5);
    vec![
        Point2::new(-hx, -hy),
        Point2::new(hx, -hy),
        Point2::new(hx, hy),
        Point2::new(-hx, hy),
    ]
}

/// Polygon circumscribing a circle, so its bounds never fall short
fn circle(radius: f64) -> Vec<Point2<f64>> {
    let r = radius / (PI / CIRCLE_SEGMENTS as f64).cos();
    (0..CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / CIRCLE_SEGMENTS as f64;
            Point2::new(r * angle.cos(), r * angle.sin())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ifc_graph_model::IfcModel;
    use ifc_graph_parser::ParsedModel;

    fn parse(data: &str) -> ParsedModel {
        let content = format!(
            "ISO-10303-21;\nHEADER;\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n{data}\nENDSEC;\nEND-ISO-10303-21;\n"
        );
        ParsedModel::parse(&content, true).unwrap()
    }

    fn extent(points: &[Point2<f64>]) -> (f64, f64, f64, f64) {
        points.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }

    #[test]
    fn test_rectangle_with_position() {
        let model = parse(
            "#1=IFCCARTESIANPOINT((1.,2.));\n\
             #2=IFCAXIS2PLACEMENT2D(#1,$);\n\
             #3=IFCRECTANGLEPROFILEDEF(.AREA.,$,#2,4.,2.);",
        );
        let router = GeometryRouter::new(1.0);
        let profile = model.resolver().get(EntityId(3)).unwrap();
        let outline = profile_outline(&profile, &router, model.resolver()).unwrap();
        let (x0, y0, x1, y1) = extent(&outline);
        assert_relative_eq!(x0, -1.0);
        assert_relative_eq!(x1, 3.0);
        assert_relative_eq!(y0, 1.0);
        assert_relative_eq!(y1, 3.0);
    }

    #[test]
    fn test_circle_is_covered() {
        let model = parse("#1=IFCCIRCLEPROFILEDEF(.AREA.,$,$,0.5);");
        let router = GeometryRouter::new(1.0);
        let profile = model.resolver().get(EntityId(1)).unwrap();
        let outline = profile_outline(&profile, &router, model.resolver()).unwrap();
        let (x0, _, x1, _) = extent(&outline);
        assert!(x0 <= -0.5 && x1 >= 0.5);
        assert!(x1 < 0.52);
    }

    #[test]
    fn test_arbitrary_polyline_profile() {
        let model = parse(
            "#1=IFCCARTESIANPOINT((0.,0.));\n\
             #2=IFCCARTESIANPOINT((5.,0.));\n\
             #3=IFCCARTESIANPOINT((5.,0.2));\n\
             #4=IFCPOLYLINE((#1,#2,#3,#1));\n\
             #5=IFCARBITRARYCLOSEDPROFILEDEF(.AREA.,$,#4);",
        );
        let router = GeometryRouter::new(1.0);
        let profile = model.resolver().get(EntityId(5)).unwrap();
        let outline = profile_outline(&profile, &router, model.resolver()).unwrap();
        let (_, _, x1, y1) = extent(&outline);
        assert_relative_eq!(x1, 5.0);
        assert_relative_eq!(y1, 0.2);
    }

    #[test]
    fn test_indexed_and_composite_curves() {
        let model = parse(
            "#1=IFCCARTESIANPOINTLIST2D(((0.,0.),(2.,0.),(2.,3.)));\n\
             #2=IFCINDEXEDPOLYCURVE(#1,$,.F.);\n\
             #3=IFCCARTESIANPOINT((-1.,0.));\n\
             #4=IFCCARTESIANPOINT((0.,0.));\n\
             #5=IFCPOLYLINE((#3,#4));\n\
             #6=IFCCOMPOSITECURVESEGMENT(.CONTINUOUS.,.T.,#2);\n\
             #7=IFCCOMPOSITECURVESEGMENT(.CONTINUOUS.,.T.,#5);\n\
             #8=IFCCOMPOSITECURVE((#6,#7),.F.);",
        );
        let router = GeometryRouter::new(1.0);
        let points = curve_points(EntityId(8), &router, model.resolver(), 0).unwrap();
        assert_eq!(points.len(), 5);
        assert!(points.iter().any(|p| p.x == -1.0));
        assert!(points.iter().any(|p| p.y == 3.0));
    }

    #[test]
    fn test_trimmed_line_uses_trim_points() {
        let model = parse(
            "#1=IFCCARTESIANPOINT((0.,0.));\n\
             #2=IFCDIRECTION((1.,0.));\n\
             #3=IFCVECTOR(#2,1.);\n\
             #4=IFCLINE(#1,#3);\n\
             #5=IFCCARTESIANPOINT((4.,0.));\n\
             #6=IFCTRIMMEDCURVE(#4,(#1),(#5),.T.,.CARTESIAN.);",
        );
        let router = GeometryRouter::new(1.0);
        let points = curve_points(EntityId(6), &router, model.resolver(), 0).unwrap();
        assert_eq!(points.len(), 2);
        assert_relative_eq!(points[1].x, 4.0);
    }

    #[test]
    fn test_unsupported_profile() {
        let model = parse("#1=IFCELLIPSEPROFILEDEF(.AREA.,$,$,1.,2.);");
        let router = GeometryRouter::new(1.0);
        let profile = model.resolver().get(EntityId(1)).unwrap();
        assert!(profile_outline(&profile, &router, model.resolver()).is_err());
    }
}
