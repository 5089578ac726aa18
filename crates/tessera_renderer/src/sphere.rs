//! Sphere primitive for ray tracing.

use crate::shape::{Shape, RAY_EPSILON};
use crate::Material;
use tessera_math::{Aabb, Ray, Vec3};

/// A sphere primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    center: Vec3,
    radius: f32,
    material: Material,
}

impl Sphere {
    /// Create a new sphere. Negative radii are clamped to zero.
    pub fn new(center: Vec3, radius: f32, material: Material) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            material,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}

impl Shape for Sphere {
    fn intersect(&self, ray: &Ray) -> Option<f32> {
        let oc = self.center - ray.origin;
        let a = ray.direction().length_squared();
        if a == 0.0 {
            return None;
        }
        let h = ray.direction().dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrtd = discriminant.sqrt();

        // Nearest root first, then the far one (ray starts inside)
        [(h - sqrtd) / a, (h + sqrtd) / a]
            .into_iter()
            .find(|&t| t > RAY_EPSILON && t < ray.t_max)
    }

    fn normal(&self, point: Vec3) -> Vec3 {
        if self.radius == 0.0 {
            return Vec3::Z;
        }
        (point - self.center) / self.radius
    }

    fn bounding_box(&self) -> Aabb {
        let r = Vec3::splat(self.radius);
        Aabb::from_points(self.center - r, self.center + r)
    }

    fn centroid(&self) -> Vec3 {
        self.center
    }

    fn material(&self) -> Material {
        self.material
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    fn grey() -> Material {
        Material::Diffuse {
            albedo: Color::splat(0.5),
        }
    }

    #[test]
    fn test_unit_sphere_head_on() {
        let sphere = Sphere::new(Vec3::ZERO, 1.0, grey());
        let ray = Ray::new_simple(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));

        let t = sphere.intersect(&ray).unwrap();
        assert!((t - 4.0).abs() < 1e-6);

        let p = ray.at(t);
        assert!((p - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-6);
        assert!((sphere.normal(p) - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_sphere_miss() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -1.0), 0.5, grey());

        // Ray pointing away from sphere
        let ray = Ray::new_simple(Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0));
        assert!(sphere.intersect(&ray).is_none());
    }

    #[test]
    fn test_ray_from_inside_hits_far_side() {
        let sphere = Sphere::new(Vec3::ZERO, 2.0, grey());
        let ray = Ray::new_simple(Vec3::ZERO, Vec3::X);

        let t = sphere.intersect(&ray).unwrap();
        assert!((t - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_t_max_limits_search() {
        let sphere = Sphere::new(Vec3::ZERO, 1.0, grey());
        let ray = Ray::new_simple(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z).with_t_max(3.5);
        assert!(sphere.intersect(&ray).is_none());
    }

    #[test]
    fn test_zero_direction_is_a_miss() {
        let sphere = Sphere::new(Vec3::ZERO, 1.0, grey());
        let ray = Ray::new_simple(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert!(sphere.intersect(&ray).is_none());
    }

    #[test]
    fn test_bounds_and_centroid() {
        let sphere = Sphere::new(Vec3::new(1.0, 2.0, 3.0), 0.5, grey());
        let bbox = sphere.bounding_box();

        assert_eq!(bbox.min, Vec3::new(0.5, 1.5, 2.5));
        assert_eq!(bbox.max, Vec3::new(1.5, 2.5, 3.5));
        assert_eq!(sphere.centroid(), Vec3::new(1.0, 2.0, 3.0));
    }
}
