// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry-lite features
//!
//! Each node gets an axis-aligned bounding box and centroid in world
//! coordinates (meters), or [`NodeGeometry::Missing`] when nothing usable is
//! attached. No meshes are built: representation items are reduced to the
//! points that bound them.

mod processors;
mod profile;
mod router;

pub use processors::{
    BooleanResultProcessor, BoundingBoxProcessor, ExtrudedAreaSolidProcessor,
    FaceSetProcessor, FacetedBrepProcessor, MappedItemProcessor,
};
pub use router::{BoundsProcessor, GeometryRouter};

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all finite points, `None` if there are none
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        for p in points {
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                continue;
            }
            let coords = [p.x, p.y, p.z];
            match bounds.as_mut() {
                None => bounds = Some(Self::new(coords, coords)),
                Some(b) => {
                    for k in 0..3 {
                        b.min[k] = b.min[k].min(coords[k]);
                        b.max[k] = b.max[k].max(coords[k]);
                    }
                }
            }
        }
        bounds
    }

    /// Center of the box
    pub fn centroid(&self) -> [f64; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    pub fn extent(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    /// Signed gap between two boxes along an axis; negative when they overlap
    pub fn gap(&self, other: &BoundingBox, axis: usize) -> f64 {
        self.min[axis].max(other.min[axis]) - self.max[axis].min(other.max[axis])
    }

    /// Length of the shared interval along an axis; negative when apart
    pub fn overlap(&self, other: &BoundingBox, axis: usize) -> f64 {
        -self.gap(other, axis)
    }
}

/// Geometric summary attached to a node
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeGeometry {
    Bounded(BoundingBox),
    /// No placement or shape could be resolved; never a zero-size box
    Missing,
}

impl NodeGeometry {
    pub fn bounds(&self) -> Option<&BoundingBox> {
        match self {
            NodeGeometry::Bounded(b) => Some(b),
            NodeGeometry::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, NodeGeometry::Missing)
    }
}
