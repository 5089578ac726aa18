//! Shape trait for ray-primitive intersection.

use crate::Material;
use tessera_math::{Aabb, Ray, Vec3};

/// Minimum hit distance; rejects self-intersections at the ray origin.
///
/// Larger than the usual `1e-6..1e-5` offsets: hit points are `f32`, and
/// in a scene a few units across their rounding error already reaches
/// `1e-6`, so secondary rays would re-hit the surface they left.
pub const RAY_EPSILON: f32 = 1e-4;

/// Geometric primitive that rays can be tested against.
///
/// Implementations are immutable after scene construction and are read
/// concurrently by every render thread.
pub trait Shape: Send + Sync {
    /// Distance to the nearest intersection in `(RAY_EPSILON, ray.t_max)`.
    fn intersect(&self, ray: &Ray) -> Option<f32>;

    /// Outward-facing unit normal at a point on the surface.
    fn normal(&self, point: Vec3) -> Vec3;

    /// Get the axis-aligned bounding box of this shape.
    fn bounding_box(&self) -> Aabb;

    /// Representative center point.
    fn centroid(&self) -> Vec3 {
        self.bounding_box().centroid()
    }

    /// Material assigned at build time.
    fn material(&self) -> Material;
}

/// Brute-force nearest hit over a primitive slice.
///
/// Used as the reference answer when checking the BVH, and handy for tiny
/// primitive sets that do not warrant a tree.
pub fn intersect_linear<P: Shape>(primitives: &[P], ray: &Ray) -> Option<(usize, f32)> {
    let mut ray = *ray;
    let mut closest = None;
    for (index, primitive) in primitives.iter().enumerate() {
        if let Some(t) = primitive.intersect(&ray) {
            ray.t_max = t;
            closest = Some((index, t));
        }
    }
    closest
}
