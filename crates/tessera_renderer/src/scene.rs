//! Scene aggregate: triangle meshes behind a BVH plus a short sphere list.
//!
//! Built once through [`SceneBuilder`], then read-only; render threads share
//! it through an `Arc` without locking.

use crate::bvh::{Bvh, BvhError, DEFAULT_BVH_SEED};
use crate::mesh::{triangulate, MeshError};
use crate::shape::Shape;
use crate::{stats, Material, Sphere, Triangle, TriangleMesh};
use std::sync::Arc;
use tessera_math::{Aabb, Ray, Vec3};
use thiserror::Error;

/// Errors raised while assembling a scene.
#[derive(Debug, Error, PartialEq)]
pub enum SceneError {
    #[error("scene contains no primitives")]
    Empty,

    #[error("failed to build triangle BVH: {0}")]
    Bvh(#[from] BvhError),

    #[error("invalid mesh: {0}")]
    Mesh(#[from] MeshError),
}

/// Everything the integrator needs to know about a ray hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceInteraction {
    /// Distance along the ray.
    pub t: f32,
    /// World-space hit point.
    pub point: Vec3,
    /// Outward geometric (or interpolated) surface normal.
    pub normal: Vec3,
    /// `normal` flipped to face the incoming ray.
    pub shading_normal: Vec3,
    /// Whether the ray arrived from outside the surface.
    pub front_face: bool,
    pub material: Material,
}

impl SurfaceInteraction {
    fn new(ray: &Ray, t: f32, shape: &dyn Shape) -> Self {
        let point = ray.at(t);
        let normal = shape.normal(point);
        let front_face = ray.direction().dot(normal) < 0.0;
        Self {
            t,
            point,
            normal,
            shading_normal: if front_face { normal } else { -normal },
            front_face,
            material: shape.material(),
        }
    }
}

/// Collects primitives, then builds the acceleration structure once.
#[derive(Debug, Default)]
pub struct SceneBuilder {
    meshes: Vec<Arc<TriangleMesh>>,
    spheres: Vec<Sphere>,
    bvh_seed: Option<u64>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sphere(&mut self, sphere: Sphere) -> &mut Self {
        self.spheres.push(sphere);
        self
    }

    pub fn add_mesh(&mut self, mesh: Arc<TriangleMesh>) -> &mut Self {
        self.meshes.push(mesh);
        self
    }

    /// Seed for the BVH's split-axis choice.
    pub fn bvh_seed(&mut self, seed: u64) -> &mut Self {
        self.bvh_seed = Some(seed);
        self
    }

    pub fn build(&self) -> Result<Scene, SceneError> {
        let triangles: Vec<Triangle> = self.meshes.iter().flat_map(triangulate).collect();
        if triangles.is_empty() && self.spheres.is_empty() {
            return Err(SceneError::Empty);
        }

        let bvh = if triangles.is_empty() {
            None
        } else {
            Some(Bvh::build(&triangles, self.bvh_seed.unwrap_or(DEFAULT_BVH_SEED))?)
        };

        let bounds = self
            .spheres
            .iter()
            .map(Shape::bounding_box)
            .fold(bvh.as_ref().map_or(Aabb::EMPTY, Bvh::bounds), |acc, b| {
                Aabb::surrounding(&acc, &b)
            });

        log::info!(
            "Scene built: {} meshes, {} triangles, {} spheres",
            self.meshes.len(),
            triangles.len(),
            self.spheres.len()
        );

        Ok(Scene {
            meshes: self.meshes.clone(),
            triangles,
            bvh,
            spheres: self.spheres.clone(),
            bounds,
        })
    }
}

/// Immutable renderable scene.
pub struct Scene {
    meshes: Vec<Arc<TriangleMesh>>,
    triangles: Vec<Triangle>,
    bvh: Option<Bvh>,
    spheres: Vec<Sphere>,
    bounds: Aabb,
}

impl Scene {
    /// Nearest surface along the ray within `(RAY_EPSILON, ray.t_max)`.
    pub fn intersect(&self, ray: &Ray) -> Option<SurfaceInteraction> {
        let mut ray = *ray;
        let mut nearest: Option<(&dyn Shape, f32)> = None;

        if let Some(bvh) = &self.bvh {
            if let Some(hit) = bvh.intersect(&self.triangles, &mut ray) {
                let shape: &dyn Shape = &self.triangles[hit.primitive];
                nearest = Some((shape, hit.t));
            }
        }

        stats::record(|s| s.sphere_tests += self.spheres.len() as u64);
        for sphere in &self.spheres {
            if let Some(t) = sphere.intersect(&ray) {
                ray.t_max = t;
                let shape: &dyn Shape = sphere;
                nearest = Some((shape, t));
            }
        }

        nearest.map(|(shape, t)| SurfaceInteraction::new(&ray, t, shape))
    }

    /// Occlusion query: is anything hit before `ray.t_max`?
    pub fn intersect_p(&self, ray: &Ray) -> bool {
        if let Some(bvh) = &self.bvh {
            if bvh.intersect_any(&self.triangles, ray) {
                return true;
            }
        }
        self.spheres.iter().any(|s| s.intersect(ray).is_some())
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn bvh(&self) -> Option<&Bvh> {
        self.bvh.as_ref()
    }

    pub fn meshes(&self) -> &[Arc<TriangleMesh>] {
        &self.meshes
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn sphere_count(&self) -> usize {
        self.spheres.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    fn diffuse() -> Material {
        Material::Diffuse {
            albedo: Color::splat(0.5),
        }
    }

    #[test]
    fn test_empty_scene_rejected() {
        assert_eq!(SceneBuilder::new().build().err(), Some(SceneError::Empty));
    }

    #[test]
    fn test_mesh_error_is_kept_as_source() {
        let bad = TriangleMesh::new(vec![Vec3::ZERO], vec![0, 0, 5], diffuse()).unwrap_err();
        let err = SceneError::from(bad);

        assert_eq!(
            err,
            SceneError::Mesh(MeshError::IndexOutOfRange {
                index: 5,
                vertex_count: 1
            })
        );
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "vertex index 5 out of range for 1 vertices");
    }

    #[test]
    fn test_spheres_only_scene() {
        let mut builder = SceneBuilder::new();
        builder.add_sphere(Sphere::new(Vec3::ZERO, 1.0, diffuse()));
        let scene = builder.build().unwrap();

        assert!(scene.bvh().is_none());
        let ray = Ray::new_simple(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = scene.intersect(&ray).unwrap();

        assert!((hit.t - 4.0).abs() < 1e-6);
        assert!((hit.point - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-6);
        assert!((hit.normal - Vec3::Z).length() < 1e-6);
        assert!(hit.front_face);
        assert_eq!(hit.material, diffuse());
    }

    #[test]
    fn test_nearest_of_mesh_and_sphere() {
        let wall = TriangleMesh::quad(
            Vec3::new(-2.0, -2.0, -3.0),
            Vec3::X * 4.0,
            Vec3::Y * 4.0,
            Material::Specular { albedo: Color::ONE },
        )
        .unwrap();
        let mut builder = SceneBuilder::new();
        builder
            .add_mesh(Arc::new(wall))
            .add_sphere(Sphere::new(Vec3::new(0.0, 0.0, -6.0), 1.0, diffuse()));
        let scene = builder.build().unwrap();

        // Wall at z=-3 is in front of the sphere
        let ray = Ray::new_simple(Vec3::ZERO, -Vec3::Z);
        let hit = scene.intersect(&ray).unwrap();
        assert!((hit.t - 3.0).abs() < 1e-5);
        assert!(matches!(hit.material, Material::Specular { .. }));

        // Beside the wall only the sphere is reachable
        let ray = Ray::new_simple(Vec3::new(0.0, 0.0, -4.0), -Vec3::Z);
        let hit = scene.intersect(&ray).unwrap();
        assert!((hit.t - 1.0).abs() < 1e-5);
        assert_eq!(hit.material, diffuse());
    }

    #[test]
    fn test_back_face_flips_shading_normal() {
        let mut builder = SceneBuilder::new();
        builder.add_sphere(Sphere::new(Vec3::ZERO, 2.0, diffuse()));
        let scene = builder.build().unwrap();

        let hit = scene.intersect(&Ray::new_simple(Vec3::ZERO, Vec3::Y)).unwrap();
        assert!(!hit.front_face);
        assert!((hit.normal - Vec3::Y).length() < 1e-6);
        assert!((hit.shading_normal + Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_occlusion_query() {
        let mut builder = SceneBuilder::new();
        builder.add_sphere(Sphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0, diffuse()));
        let scene = builder.build().unwrap();

        let ray = Ray::new_simple(Vec3::ZERO, -Vec3::Z);
        assert!(scene.intersect_p(&ray));
        assert!(!scene.intersect_p(&ray.with_t_max(3.0)));
        assert!(!scene.intersect_p(&Ray::new_simple(Vec3::ZERO, Vec3::Z)));
    }

    #[test]
    fn test_bounds_cover_everything() {
        let mesh = TriangleMesh::icosphere(Vec3::new(3.0, 0.0, 0.0), 1.0, 1, diffuse()).unwrap();
        let mut builder = SceneBuilder::new();
        builder
            .add_mesh(Arc::new(mesh))
            .add_sphere(Sphere::new(Vec3::new(-3.0, 0.0, 0.0), 1.0, diffuse()));
        let scene = builder.build().unwrap();

        let bounds = scene.bounds();
        assert!(bounds.min.x <= -4.0 && bounds.max.x >= 3.99);
        assert_eq!(scene.sphere_count(), 1);
        assert_eq!(scene.triangle_count(), 80);
    }
}
