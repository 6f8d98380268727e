// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry router - dispatches representation items to bounds processors
//!
//! Items are reduced to the points that bound them in their own coordinate
//! system. The router then applies the element's chained object placement and
//! the model's unit scale, and folds the points into a world-space box.

use super::{BoundingBox, NodeGeometry};
use crate::{GraphError, Result};
use ifc_graph_model::{DecodedEntity, EntityId, EntityResolver, IfcType};
use nalgebra::{Matrix4, Point3, Vector3};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::{Cell, RefCell};
use std::sync::Arc;
use tracing::debug;

/// Nesting limit for mapped items and boolean operands
const MAX_ITEM_DEPTH: usize = 16;

/// Nesting limit for `PlacementRelTo` chains
const MAX_PLACEMENT_DEPTH: usize = 64;

/// Bounds processor trait
///
/// Each processor handles one or more IFC representation item types and
/// appends the points that bound the item, in the item's coordinate system and
/// file units.
pub trait BoundsProcessor: Send + Sync {
    fn collect(
        &self,
        item: &DecodedEntity,
        router: &GeometryRouter,
        resolver: &dyn EntityResolver,
        out: &mut Vec<Point3<f64>>,
    ) -> Result<()>;

    /// IFC types this processor is registered for
    fn supported_types(&self) -> Vec<IfcType>;
}

/// Routes representation items to processors and resolves placements
pub struct GeometryRouter {
    processors: FxHashMap<IfcType, Arc<dyn BoundsProcessor>>,
    /// World transforms of IfcLocalPlacement entities
    placement_cache: RefCell<FxHashMap<EntityId, Option<Matrix4<f64>>>>,
    /// Points of an IfcRepresentationMap's representation, before MappingOrigin
    mapped_cache: RefCell<FxHashMap<EntityId, Arc<Vec<Point3<f64>>>>>,
    depth: Cell<usize>,
    unit_scale: f64,
}

impl GeometryRouter {
    /// Create a router without any processors registered
    pub fn new(unit_scale: f64) -> Self {
        Self {
            processors: FxHashMap::default(),
            placement_cache: RefCell::new(FxHashMap::default()),
            mapped_cache: RefCell::new(FxHashMap::default()),
            depth: Cell::new(0),
            unit_scale,
        }
    }

    /// Create a router with every built-in processor registered
    pub fn with_default_processors(unit_scale: f64) -> Self {
        use super::processors::{
            BooleanResultProcessor, BoundingBoxProcessor, ExtrudedAreaSolidProcessor,
            FaceSetProcessor, FacetedBrepProcessor, MappedItemProcessor,
        };

        let mut router = Self::new(unit_scale);
        router.register(Arc::new(ExtrudedAreaSolidProcessor));
        router.register(Arc::new(BoundingBoxProcessor));
        router.register(Arc::new(FacetedBrepProcessor));
        router.register(Arc::new(FaceSetProcessor));
        router.register(Arc::new(MappedItemProcessor));
        router.register(Arc::new(BooleanResultProcessor));
        router
    }

    pub fn unit_scale(&self) -> f64 {
        self.unit_scale
    }

    /// Register a processor for all of its supported types
    pub fn register(&mut self, processor: Arc<dyn BoundsProcessor>) {
        for ifc_type in processor.supported_types() {
            self.processors.insert(ifc_type, Arc::clone(&processor));
        }
    }

    pub fn has_processor(&self, ifc_type: &IfcType) -> bool {
        self.processors.contains_key(ifc_type)
    }

    /// World-space bounds of an element
    ///
    /// `Body` and `Facetation` representations are preferred; a `Box`
    /// representation is used only when no body item yields points. Items
    /// that fail are skipped, and an unresolvable placement counts as
    /// identity.
    pub fn element_geometry(
        &self,
        placement: Option<EntityId>,
        representation: Option<EntityId>,
        resolver: &dyn EntityResolver,
    ) -> NodeGeometry {
        let Some(representation) = representation else {
            return NodeGeometry::Missing;
        };
        let local = self.representation_points(representation, resolver);
        if local.is_empty() {
            return NodeGeometry::Missing;
        }

        let transform = placement
            .and_then(|id| self.placement_transform(id, resolver))
            .unwrap_or_else(Matrix4::identity);
        let world: Vec<Point3<f64>> = local
            .iter()
            .map(|p| transform.transform_point(p) * self.unit_scale)
            .collect();

        match BoundingBox::from_points(&world) {
            Some(bounds) => NodeGeometry::Bounded(bounds),
            None => NodeGeometry::Missing,
        }
    }

    /// Points of an IfcProductDefinitionShape, in object coordinates
    fn representation_points(
        &self,
        shape_id: EntityId,
        resolver: &dyn EntityResolver,
    ) -> Vec<Point3<f64>> {
        let Some(shape) = resolver.get(shape_id) else {
            debug!(entity = %shape_id, "product shape not found");
            return Vec::new();
        };
        if shape.ifc_type != IfcType::IfcProductDefinitionShape {
            debug!(entity = %shape_id, ifc_type = %shape.ifc_type, "not a product definition shape");
            return Vec::new();
        }

        let mut body = Vec::new();
        let mut boxes = Vec::new();
        for rep_id in shape.get_refs(2).unwrap_or_default() {
            let Some(rep) = resolver.get(rep_id) else {
                continue;
            };
            let target = match rep.get_string(1) {
                None | Some("Body") | Some("Facetation") => &mut body,
                Some("Box") => &mut boxes,
                Some(_) => continue,
            };
            self.collect_items(&rep, resolver, target);
        }

        if body.is_empty() {
            boxes
        } else {
            body
        }
    }

    /// Collect every item of an IfcShapeRepresentation, skipping failures
    pub(crate) fn collect_items(
        &self,
        representation: &DecodedEntity,
        resolver: &dyn EntityResolver,
        out: &mut Vec<Point3<f64>>,
    ) {
        let mut scratch = Vec::new();
        for item_id in representation.get_refs(3).unwrap_or_default() {
            scratch.clear();
            match self.collect_item(item_id, resolver, &mut scratch) {
                Ok(()) => out.extend_from_slice(&scratch),
                Err(e) => debug!(item = %item_id, error = %e, "skipping representation item"),
            }
        }
    }

    /// Dispatch one representation item to its processor
    pub fn collect_item(
        &self,
        item_id: EntityId,
        resolver: &dyn EntityResolver,
        out: &mut Vec<Point3<f64>>,
    ) -> Result<()> {
        let depth = self.depth.get();
        if depth >= MAX_ITEM_DEPTH {
            return Err(GraphError::geometry(item_id, "representation items nested too deep"));
        }

        let item = resolver
            .get(item_id)
            .ok_or_else(|| GraphError::geometry(item_id, "item not found"))?;
        let processor = self.processors.get(&item.ifc_type).ok_or_else(|| {
            GraphError::geometry(item_id, format!("unsupported item type {}", item.ifc_type))
        })?;

        self.depth.set(depth + 1);
        let result = processor.collect(&item, self, resolver, out);
        self.depth.set(depth);
        result
    }

    pub(crate) fn cached_mapped_points(&self, map_id: EntityId) -> Option<Arc<Vec<Point3<f64>>>> {
        self.mapped_cache.borrow().get(&map_id).cloned()
    }

    pub(crate) fn cache_mapped_points(&self, map_id: EntityId, points: Arc<Vec<Point3<f64>>>) {
        self.mapped_cache.borrow_mut().insert(map_id, points);
    }

    /// World transform of an object placement, following `PlacementRelTo`
    pub fn placement_transform(
        &self,
        placement_id: EntityId,
        resolver: &dyn EntityResolver,
    ) -> Option<Matrix4<f64>> {
        let mut visited = FxHashSet::default();
        self.chained_placement(placement_id, resolver, &mut visited)
    }

    fn chained_placement(
        &self,
        placement_id: EntityId,
        resolver: &dyn EntityResolver,
        visited: &mut FxHashSet<EntityId>,
    ) -> Option<Matrix4<f64>> {
        if let Some(cached) = self.placement_cache.borrow().get(&placement_id) {
            return *cached;
        }
        if visited.len() >= MAX_PLACEMENT_DEPTH || !visited.insert(placement_id) {
            debug!(placement = %placement_id, "placement chain is cyclic or too deep");
            return None;
        }

        let placement = resolver.get(placement_id)?;
        let transform = match placement.ifc_type {
            IfcType::IfcLocalPlacement => {
                let relative = placement
                    .get_ref(1)
                    .and_then(|id| self.axis2_placement(id, resolver))
                    .unwrap_or_else(Matrix4::identity);
                let parent = placement
                    .get_ref(0)
                    .and_then(|id| self.chained_placement(id, resolver, visited))
                    .unwrap_or_else(Matrix4::identity);
                Some(parent * relative)
            }
            IfcType::IfcAxis2Placement3D | IfcType::IfcAxis2Placement2D => {
                self.axis2_placement(placement_id, resolver)
            }
            _ => None,
        };

        self.placement_cache
            .borrow_mut()
            .insert(placement_id, transform);
        transform
    }

    /// Matrix of an IfcAxis2Placement3D or IfcAxis2Placement2D
    pub fn axis2_placement(
        &self,
        placement_id: EntityId,
        resolver: &dyn EntityResolver,
    ) -> Option<Matrix4<f64>> {
        let placement = resolver.get(placement_id)?;

        let (location, axis, ref_dir) = match placement.ifc_type {
            IfcType::IfcAxis2Placement3D => (
                placement.get_ref(0),
                placement.get_ref(1).and_then(|id| self.direction(id, resolver)),
                placement.get_ref(2).and_then(|id| self.direction(id, resolver)),
            ),
            IfcType::IfcAxis2Placement2D => (
                placement.get_ref(0),
                None,
                placement.get_ref(1).and_then(|id| self.direction(id, resolver)),
            ),
            _ => return None,
        };

        let location = location
            .and_then(|id| self.cartesian_point(id, resolver))
            .unwrap_or_else(Point3::origin);
        let (x, y, z) = orthonormal_basis(
            axis.unwrap_or_else(Vector3::z),
            ref_dir.unwrap_or_else(Vector3::x),
        );

        Some(Matrix4::new(
            x.x, y.x, z.x, location.x, x.y, y.y, z.y, location.y, x.z, y.z, z.z, location.z, 0.0,
            0.0, 0.0, 1.0,
        ))
    }

    /// Matrix of an IfcCartesianTransformationOperator3D (optionally non-uniform)
    pub fn transformation_operator(
        &self,
        operator_id: EntityId,
        resolver: &dyn EntityResolver,
    ) -> Option<Matrix4<f64>> {
        let op = resolver.get(operator_id)?;
        if !matches!(
            op.ifc_type,
            IfcType::IfcCartesianTransformationOperator3D
                | IfcType::IfcCartesianTransformationOperator3DnonUniform
        ) {
            return None;
        }

        // Axis1 (0), Axis2 (1), LocalOrigin (2), Scale (3), Axis3 (4)
        let axis1 = op.get_ref(0).and_then(|id| self.direction(id, resolver));
        let origin = op
            .get_ref(2)
            .and_then(|id| self.cartesian_point(id, resolver))
            .unwrap_or_else(Point3::origin);
        let scale = op.get_float(3).unwrap_or(1.0);
        let axis3 = op.get_ref(4).and_then(|id| self.direction(id, resolver));

        // Scale2 (5) and Scale3 (6) only exist on the non-uniform variant
        let (sy, sz) = if op.ifc_type == IfcType::IfcCartesianTransformationOperator3DnonUniform {
            (
                op.get_float(5).unwrap_or(scale),
                op.get_float(6).unwrap_or(scale),
            )
        } else {
            (scale, scale)
        };

        let (x, y, z) = orthonormal_basis(
            axis3.unwrap_or_else(Vector3::z),
            axis1.unwrap_or_else(Vector3::x),
        );
        let (x, y, z) = (x * scale, y * sy, z * sz);

        Some(Matrix4::new(
            x.x, y.x, z.x, origin.x, x.y, y.y, z.y, origin.y, x.z, y.z, z.z, origin.z, 0.0, 0.0,
            0.0, 1.0,
        ))
    }

    /// IfcCartesianPoint; 2D points get z = 0
    pub fn cartesian_point(
        &self,
        point_id: EntityId,
        resolver: &dyn EntityResolver,
    ) -> Option<Point3<f64>> {
        let point = resolver.get(point_id)?;
        if point.ifc_type != IfcType::IfcCartesianPoint {
            return None;
        }
        let coords = point.get(0)?.as_float_list()?;
        point_from_coords(&coords)
    }

    /// IfcDirection; 2D directions get z = 0
    pub fn direction(
        &self,
        direction_id: EntityId,
        resolver: &dyn EntityResolver,
    ) -> Option<Vector3<f64>> {
        let direction = resolver.get(direction_id)?;
        if direction.ifc_type != IfcType::IfcDirection {
            return None;
        }
        let ratios = direction.get(0)?.as_float_list()?;
        let v = point_from_coords(&ratios)?.coords;
        (v.norm() > f64::EPSILON).then_some(v)
    }
}

pub(crate) fn point_from_coords(coords: &[f64]) -> Option<Point3<f64>> {
    match coords {
        [x, y] => Some(Point3::new(*x, *y, 0.0)),
        [x, y, z, ..] => Some(Point3::new(*x, *y, *z)),
        _ => None,
    }
}

/// Right-handed basis from a z axis and an approximate x axis
///
/// When the two are parallel another x axis is picked.
fn orthonormal_basis(
    axis: Vector3<f64>,
    ref_dir: Vector3<f64>,
) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
    let z = axis.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::z);
    let projected = ref_dir - z * ref_dir.dot(&z);
    let x = projected
        .try_normalize(1e-9)
        .or_else(|| {
            let fallback = if z.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
            (fallback - z * fallback.dot(&z)).try_normalize(1e-9)
        })
        .unwrap_or_else(Vector3::x);
    let y = z.cross(&x);
    (x, y, z)
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

    #[test]
    fn test_chained_local_placement() {
        let model = parse(
            "#1=IFCCARTESIANPOINT((10.,0.,0.));\n\
             #2=IFCAXIS2PLACEMENT3D(#1,$,$);\n\
             #3=IFCLOCALPLACEMENT($,#2);\n\
             #4=IFCCARTESIANPOINT((0.,5.,3.));\n\
             #5=IFCAXIS2PLACEMENT3D(#4,$,$);\n\
             #6=IFCLOCALPLACEMENT(#3,#5);",
        );
        let router = GeometryRouter::with_default_processors(1.0);
        let m = router.placement_transform(EntityId(6), model.resolver()).unwrap();
        let p = m.transform_point(&Point3::origin());
        assert_relative_eq!(p.x, 10.0);
        assert_relative_eq!(p.y, 5.0);
        assert_relative_eq!(p.z, 3.0);
    }

    #[test]
    fn test_cyclic_placement_terminates() {
        let model = parse(
            "#1=IFCCARTESIANPOINT((1.,0.,0.));\n\
             #2=IFCAXIS2PLACEMENT3D(#1,$,$);\n\
             #3=IFCLOCALPLACEMENT(#4,#2);\n\
             #4=IFCLOCALPLACEMENT(#3,#2);",
        );
        let router = GeometryRouter::new(1.0);
        // The cycle is cut, so the chain still yields a transform
        assert!(router.placement_transform(EntityId(3), model.resolver()).is_some());
    }

    #[test]
    fn test_rotated_placement() {
        let model = parse(
            "#1=IFCCARTESIANPOINT((0.,0.,0.));\n\
             #2=IFCDIRECTION((0.,0.,1.));\n\
             #3=IFCDIRECTION((0.,1.,0.));\n\
             #4=IFCAXIS2PLACEMENT3D(#1,#2,#3);",
        );
        let router = GeometryRouter::new(1.0);
        let m = router.axis2_placement(EntityId(4), model.resolver()).unwrap();
        let p = m.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parallel_ref_direction_falls_back() {
        let (x, y, z) = orthonormal_basis(Vector3::z(), Vector3::z());
        assert_relative_eq!(x.dot(&z), 0.0, epsilon = 1e-12);
        assert_relative_eq!(y.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_transformation_operator_scale_and_origin() {
        let model = parse(
            "#1=IFCCARTESIANPOINT((1.,2.,3.));\n\
             #2=IFCCARTESIANTRANSFORMATIONOPERATOR3D($,$,#1,2.,$);",
        );
        let router = GeometryRouter::new(1.0);
        let m = router
            .transformation_operator(EntityId(2), model.resolver())
            .unwrap();
        let p = m.transform_point(&Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(p.x, 3.0);
        assert_relative_eq!(p.y, 4.0);
        assert_relative_eq!(p.z, 5.0);
    }

    #[test]
    fn test_missing_representation() {
        let model = parse("#1=IFCCARTESIANPOINT((0.,0.,0.));");
        let router = GeometryRouter::with_default_processors(1.0);
        assert!(router
            .element_geometry(None, None, model.resolver())
            .is_missing());
        assert!(router
            .element_geometry(None, Some(EntityId(99)), model.resolver())
            .is_missing());
    }
}
