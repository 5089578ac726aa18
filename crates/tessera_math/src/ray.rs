use crate::{Vec3, T_INFINITY};

/// A ray with origin, direction, cached inverse direction and a search limit.
///
/// `inv_direction` is derived from `direction` at construction; the direction
/// is only reachable through [`Ray::set_direction`] so the two never drift
/// apart. Zero direction components give an infinite inverse, which the
/// slab test in [`crate::Aabb::hit`] is written to accept.
///
/// `t_max` is the closest hit distance found so far. Traversal code only ever
/// lowers it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    direction: Vec3,
    inv_direction: Vec3,
    pub t_max: f32,
    pub time: f32,
}

impl Ray {
    /// Create a new ray with an unbounded search range.
    pub fn new(origin: Vec3, direction: Vec3, time: f32) -> Self {
        Self {
            origin,
            direction,
            inv_direction: direction.recip(),
            t_max: T_INFINITY,
            time,
        }
    }

    /// Create a ray at time 0.
    #[inline]
    pub fn new_simple(origin: Vec3, direction: Vec3) -> Self {
        Self::new(origin, direction, 0.0)
    }

    /// Same ray with a different search limit.
    #[inline]
    pub fn with_t_max(mut self, t_max: f32) -> Self {
        self.t_max = t_max;
        self
    }

    /// Get the origin point of the ray.
    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Get the direction vector of the ray (not necessarily normalized).
    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Per-axis `1 / direction`, possibly infinite.
    #[inline]
    pub fn inv_direction(&self) -> Vec3 {
        self.inv_direction
    }

    /// Replace the direction, recomputing the cached inverse.
    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction;
        self.inv_direction = direction.recip();
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
