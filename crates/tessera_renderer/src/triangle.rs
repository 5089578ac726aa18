//! Triangle primitive for ray tracing.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use crate::shape::{Shape, RAY_EPSILON};
use crate::{Material, TriangleMesh};
use std::sync::Arc;
use tessera_math::{Aabb, Ray, Vec3};

/// Determinants below this are treated as a ray parallel to the triangle.
pub const PARALLEL_EPSILON: f32 = 1e-5;

/// One face of a shared [`TriangleMesh`].
///
/// Holds the mesh by `Arc` and the face index; vertex data is never copied.
#[derive(Debug, Clone)]
pub struct Triangle {
    mesh: Arc<TriangleMesh>,
    index: usize,
}

impl Triangle {
    /// Create a view of face `index`. The index must be below `mesh.triangle_count()`.
    pub fn new(mesh: Arc<TriangleMesh>, index: usize) -> Self {
        debug_assert!(index < mesh.triangle_count());
        Self { mesh, index }
    }

    pub fn mesh(&self) -> &Arc<TriangleMesh> {
        &self.mesh
    }

    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn vertices(&self) -> [Vec3; 3] {
        self.mesh.triangle_vertices(self.index)
    }

    /// Unit geometric normal following the counter-clockwise winding.
    pub fn face_normal(&self) -> Vec3 {
        let [v0, v1, v2] = self.vertices();
        (v1 - v0).cross(v2 - v0).normalize_or_zero()
    }

    /// Barycentric weights (w0, w1, w2) of a point in the triangle's plane.
    fn barycentric(&self, p: Vec3) -> Vec3 {
        let [v0, v1, v2] = self.vertices();
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let ep = p - v0;
        let d11 = e1.dot(e1);
        let d12 = e1.dot(e2);
        let d22 = e2.dot(e2);
        let dp1 = ep.dot(e1);
        let dp2 = ep.dot(e2);
        let denom = d11 * d22 - d12 * d12;
        if denom.abs() < f32::EPSILON {
            return Vec3::new(1.0, 0.0, 0.0);
        }
        let v = (d22 * dp1 - d12 * dp2) / denom;
        let w = (d11 * dp2 - d12 * dp1) / denom;
        Vec3::new(1.0 - v - w, v, w)
    }
}

impl Shape for Triangle {
    /// Möller-Trumbore ray-triangle intersection algorithm.
    fn intersect(&self, ray: &Ray) -> Option<f32> {
        let [v0, v1, v2] = self.vertices();
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let h = ray.direction().cross(edge2);
        let det = edge1.dot(h);

        // Ray is parallel to triangle (or the triangle is degenerate)
        if !(det.abs() >= PARALLEL_EPSILON) {
            return None;
        }

        let f = 1.0 / det;
        let s = ray.origin - v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction().dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        (t > RAY_EPSILON && t < ray.t_max).then_some(t)
    }

    fn normal(&self, point: Vec3) -> Vec3 {
        let geometric = self.face_normal();
        let Some(normals) = self.mesh.normals() else {
            return geometric;
        };

        let [a, b, c] = self.mesh.triangle_indices(self.index);
        let w = self.barycentric(point);
        let smooth = (normals[a] * w.x + normals[b] * w.y + normals[c] * w.z).normalize_or_zero();
        if smooth == Vec3::ZERO {
            geometric
        } else {
            smooth
        }
    }

    fn bounding_box(&self) -> Aabb {
        let [v0, v1, v2] = self.vertices();
        Aabb::from_points(v0, v1).union_point(v2)
    }

    fn centroid(&self) -> Vec3 {
        let [v0, v1, v2] = self.vertices();
        (v0 + v1 + v2) / 3.0
    }

    fn material(&self) -> Material {
        self.mesh.material()
    }
}
