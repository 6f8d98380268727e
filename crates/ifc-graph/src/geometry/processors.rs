// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounds processors - one per family of IFC representation items
//!
//! Each processor appends the points bounding an item in the item's own
//! coordinate system. Nothing is triangulated.

use super::profile::{point_list, profile_outline};
use super::router::{BoundsProcessor, GeometryRouter};
use crate::{GraphError, Result};
use ifc_graph_model::{DecodedEntity, EntityId, EntityResolver, IfcType};
use nalgebra::{Matrix4, Point3, Vector3};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// IfcExtrudedAreaSolid: profile outline swept along the extrusion vector
pub struct ExtrudedAreaSolidProcessor;

impl BoundsProcessor for ExtrudedAreaSolidProcessor {
    fn collect(
        &self,
        item: &DecodedEntity,
        router: &GeometryRouter,
        resolver: &dyn EntityResolver,
        out: &mut Vec<Point3<f64>>,
    ) -> Result<()> {
        // SweptArea (0), Position (1), ExtrudedDirection (2), Depth (3)
        let profile = item
            .get_ref(0)
            .and_then(|id| resolver.get(id))
            .ok_or_else(|| GraphError::geometry(item.id, "missing SweptArea"))?;
        let outline = profile_outline(&profile, router, resolver)?;
        let depth = item
            .get_float(3)
            .filter(|d| d.is_finite())
            .ok_or_else(|| GraphError::geometry(item.id, "missing Depth"))?;
        let direction = item
            .get_ref(2)
            .and_then(|id| router.direction(id, resolver))
            .map(|d| d.normalize())
            .unwrap_or_else(Vector3::z);
        let position = item
            .get_ref(1)
            .and_then(|id| router.axis2_placement(id, resolver))
            .unwrap_or_else(Matrix4::identity);

        let sweep = direction * depth;
        for p in outline {
            let base = Point3::new(p.x, p.y, 0.0);
            out.push(position.transform_point(&base));
            out.push(position.transform_point(&(base + sweep)));
        }
        Ok(())
    }

    fn supported_types(&self) -> Vec<IfcType> {
        vec![IfcType::IfcExtrudedAreaSolid]
    }
}

/// IfcBoundingBox and IfcBlock: boxes given by a corner and three lengths
pub struct BoundingBoxProcessor;

impl BoundsProcessor for BoundingBoxProcessor {
    fn collect(
        &self,
        item: &DecodedEntity,
        router: &GeometryRouter,
        resolver: &dyn EntityResolver,
        out: &mut Vec<Point3<f64>>,
    ) -> Result<()> {
        // IfcBoundingBox: Corner (0), XDim..ZDim (1..=3)
        // IfcBlock: Position (0), XLength..ZLength (1..=3)
        let dims = [item.get_float(1), item.get_float(2), item.get_float(3)];
        let [Some(dx), Some(dy), Some(dz)] = dims else {
            return Err(GraphError::geometry(item.id, "missing box dimensions"));
        };

        let transform = match item.ifc_type {
            IfcType::IfcBoundingBox => {
                let corner = item
                    .get_ref(0)
                    .and_then(|id| router.cartesian_point(id, resolver))
                    .unwrap_or_else(Point3::origin);
                Matrix4::new_translation(&corner.coords)
            }
            _ => item
                .get_ref(0)
                .and_then(|id| router.axis2_placement(id, resolver))
                .unwrap_or_else(Matrix4::identity),
        };

        for &x in &[0.0, dx] {
            for &y in &[0.0, dy] {
                for &z in &[0.0, dz] {
                    out.push(transform.transform_point(&Point3::new(x, y, z)));
                }
            }
        }
        Ok(())
    }

    fn supported_types(&self) -> Vec<IfcType> {
        vec![IfcType::IfcBoundingBox, IfcType::IfcBlock]
    }
}

/// Faceted B-reps and shell-based surface models: every poly loop vertex
pub struct FacetedBrepProcessor;

impl FacetedBrepProcessor {
    fn collect_shell(
        &self,
        shell_id: EntityId,
        router: &GeometryRouter,
        resolver: &dyn EntityResolver,
        seen: &mut FxHashSet<EntityId>,
        out: &mut Vec<Point3<f64>>,
    ) {
        // IfcClosedShell / IfcOpenShell: CfsFaces (0)
        let Some(shell) = resolver.get(shell_id) else {
            return;
        };
        for face_id in shell.get_refs(0).unwrap_or_default() {
            // IfcFace: Bounds (0)
            let Some(face) = resolver.get(face_id) else {
                continue;
            };
            for bound_id in face.get_refs(0).unwrap_or_default() {
                // IfcFaceBound: Bound (0) -> IfcPolyLoop: Polygon (0)
                let Some(loop_id) = resolver.get(bound_id).and_then(|b| b.get_ref(0)) else {
                    continue;
                };
                let Some(poly_loop) = resolver.get(loop_id) else {
                    continue;
                };
                for point_id in poly_loop.get_refs(0).unwrap_or_default() {
                    if !seen.insert(point_id) {
                        continue;
                    }
                    if let Some(p) = router.cartesian_point(point_id, resolver) {
                        out.push(p);
                    }
                }
            }
        }
    }
}

impl BoundsProcessor for FacetedBrepProcessor {
    fn collect(
        &self,
        item: &DecodedEntity,
        router: &GeometryRouter,
        resolver: &dyn EntityResolver,
        out: &mut Vec<Point3<f64>>,
    ) -> Result<()> {
        // Voids lie inside the outer shell, so only attribute 0 is read:
        // Outer for B-reps, SbsmBoundary for surface models
        let shells = item.get_ref_or_refs(0);
        if shells.is_empty() {
            return Err(GraphError::geometry(item.id, "no shells"));
        }

        let mut seen = FxHashSet::default();
        let before = out.len();
        for shell in shells {
            self.collect_shell(shell, router, resolver, &mut seen, out);
        }
        if out.len() == before {
            return Err(GraphError::geometry(item.id, "shells have no vertices"));
        }
        Ok(())
    }

    fn supported_types(&self) -> Vec<IfcType> {
        vec![
            IfcType::IfcFacetedBrep,
            IfcType::IfcFacetedBrepWithVoids,
            IfcType::IfcShellBasedSurfaceModel,
        ]
    }
}

/// IfcTriangulatedFaceSet and IfcPolygonalFaceSet: the coordinate list
pub struct FaceSetProcessor;

impl BoundsProcessor for FaceSetProcessor {
    fn collect(
        &self,
        item: &DecodedEntity,
        _router: &GeometryRouter,
        resolver: &dyn EntityResolver,
        out: &mut Vec<Point3<f64>>,
    ) -> Result<()> {
        // Coordinates (0)
        let coordinates = item
            .get_ref(0)
            .ok_or_else(|| GraphError::geometry(item.id, "missing Coordinates"))?;
        let points = point_list(coordinates, resolver)?;
        if points.is_empty() {
            return Err(GraphError::geometry(item.id, "empty coordinate list"));
        }
        out.extend(points);
        Ok(())
    }

    fn supported_types(&self) -> Vec<IfcType> {
        vec![IfcType::IfcTriangulatedFaceSet, IfcType::IfcPolygonalFaceSet]
    }
}

/// IfcMappedItem: instanced representation map placed by a transformation
/// operator
pub struct MappedItemProcessor;

impl MappedItemProcessor {
    fn source_points(
        &self,
        map_id: EntityId,
        router: &GeometryRouter,
        resolver: &dyn EntityResolver,
    ) -> Result<Arc<Vec<Point3<f64>>>> {
        if let Some(points) = router.cached_mapped_points(map_id) {
            return Ok(points);
        }

        // IfcRepresentationMap: MappingOrigin (0), MappedRepresentation (1)
        let map = resolver
            .get(map_id)
            .ok_or_else(|| GraphError::geometry(map_id, "representation map not found"))?;
        let representation = map
            .get_ref(1)
            .and_then(|id| resolver.get(id))
            .ok_or_else(|| GraphError::geometry(map_id, "missing MappedRepresentation"))?;

        let mut points = Vec::new();
        router.collect_items(&representation, resolver, &mut points);

        let origin = map
            .get_ref(0)
            .and_then(|id| router.axis2_placement(id, resolver));
        if let Some(origin) = origin {
            for p in points.iter_mut() {
                *p = origin.transform_point(p);
            }
        }

        let points = Arc::new(points);
        router.cache_mapped_points(map_id, Arc::clone(&points));
        Ok(points)
    }
}

impl BoundsProcessor for MappedItemProcessor {
    fn collect(
        &self,
        item: &DecodedEntity,
        router: &GeometryRouter,
        resolver: &dyn EntityResolver,
        out: &mut Vec<Point3<f64>>,
    ) -> Result<()> {
        // MappingSource (0), MappingTarget (1)
        let source = item
            .get_ref(0)
            .ok_or_else(|| GraphError::geometry(item.id, "missing MappingSource"))?;
        let points = self.source_points(source, router, resolver)?;
        if points.is_empty() {
            return Err(GraphError::geometry(item.id, "mapped representation is empty"));
        }

        let target = item
            .get_ref(1)
            .and_then(|id| router.transformation_operator(id, resolver));
        match target {
            Some(m) => out.extend(points.iter().map(|p| m.transform_point(p))),
            None => out.extend_from_slice(&points),
        }
        Ok(())
    }

    fn supported_types(&self) -> Vec<IfcType> {
        vec![IfcType::IfcMappedItem]
    }
}

/// IfcBooleanResult and IfcBooleanClippingResult
///
/// Difference and intersection never grow the first operand, so its bounds
/// are kept as is. A union adds the second operand.
pub struct BooleanResultProcessor;

impl BoundsProcessor for BooleanResultProcessor {
    fn collect(
        &self,
        item: &DecodedEntity,
        router: &GeometryRouter,
        resolver: &dyn EntityResolver,
        out: &mut Vec<Point3<f64>>,
    ) -> Result<()> {
        // Operator (0), FirstOperand (1), SecondOperand (2)
        let first = item
            .get_ref(1)
            .ok_or_else(|| GraphError::geometry(item.id, "missing FirstOperand"))?;
        router.collect_item(first, resolver, out)?;

        if item.get_enum(0) == Some("UNION") {
            if let Some(second) = item.get_ref(2) {
                router.collect_item(second, resolver, out)?;
            }
        }
        Ok(())
    }

    fn supported_types(&self) -> Vec<IfcType> {
        vec![IfcType::IfcBooleanResult, IfcType::IfcBooleanClippingResult]
    }
}
