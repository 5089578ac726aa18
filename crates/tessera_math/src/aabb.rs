use crate::{Interval, Ray, Vec3};

/// Axis-Aligned Bounding Box for the BVH.
///
/// The default / [`Aabb::EMPTY`] box has `min = +inf`, `max = -inf` so that it
/// is the identity of [`Aabb::surrounding`]. It must not be ray-tested before at
/// least one union; once unioned, `min[i] <= max[i]` holds on every axis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create an empty AABB (contains nothing).
    pub fn empty() -> Self {
        Self::EMPTY
    }

    /// Create an AABB from two corner points, in any order.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Tight box around a set of points.
    pub fn enclosing<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        points
            .into_iter()
            .fold(Self::EMPTY, |acc, p| acc.union_point(p))
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            min: box0.min.min(box1.min),
            max: box0.max.max(box1.max),
        }
    }

    /// Grow the box to include a point.
    pub fn union_point(&self, p: Vec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    /// True until something has been unioned in.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// True if `other` lies entirely inside this box (boundaries included).
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    /// True if the point lies inside the box (boundaries included).
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.min.cmple(p).all() && self.max.cmpge(p).all()
    }

    /// Get the interval for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, n: usize) -> Interval {
        Interval::new(self.min[n], self.max[n])
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Size of the box along each axis.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let e = self.extent();
        if e.x > e.y && e.x > e.z {
            0
        } else if e.y > e.z {
            1
        } else {
            2
        }
    }

    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let e = self.extent();
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    /// Slab test against the ray's cached inverse direction.
    ///
    /// An axis with a zero direction component has an infinite inverse. When
    /// the origin sits exactly on that slab's plane the product is NaN, and
    /// `f32::max`/`f32::min` drop NaN operands, so the axis simply does not
    /// narrow the range. Touching (zero-width) overlaps count as hits so that
    /// flat, axis-aligned primitives are never culled.
    pub fn hit(&self, r: &Ray, ray_t: Interval) -> bool {
        self.hit_range(r, ray_t).is_some()
    }

    /// Like [`Aabb::hit`], returning the clipped parametric range on a hit.
    pub fn hit_range(&self, r: &Ray, mut ray_t: Interval) -> Option<Interval> {
        let origin = r.origin;
        let inv = r.inv_direction();

        for axis in 0..3 {
            let mut slab = self.axis_interval(axis);
            slab.min = (slab.min - origin[axis]) * inv[axis];
            slab.max = (slab.max - origin[axis]) * inv[axis];
            if inv[axis] < 0.0 {
                std::mem::swap(&mut slab.min, &mut slab.max);
            }
            ray_t = ray_t.intersect(&slab);
            if ray_t.is_empty() {
                return None;
            }
        }

        Some(ray_t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points(Vec3::new(10.0, 0.0, 10.0), Vec3::new(0.0, 10.0, 0.0));

        assert_eq!(aabb.min, Vec3::ZERO);
        assert_eq!(aabb.max, Vec3::splat(10.0));
    }

    #[test]
    fn test_aabb_surrounding() {
        let box1 = Aabb::from_points(Vec3::ZERO, Vec3::new(5.0, 5.0, 5.0));
        let box2 = Aabb::from_points(Vec3::new(3.0, 3.0, 3.0), Vec3::new(10.0, 10.0, 10.0));
        let surrounding = Aabb::surrounding(&box1, &box2);

        assert_eq!(surrounding.min, Vec3::ZERO);
        assert_eq!(surrounding.max, Vec3::splat(10.0));
        assert!(surrounding.contains(&box1));
        assert!(surrounding.contains(&box2));
    }

    #[test]
    fn test_empty_is_union_identity() {
        let b = Aabb::from_points(Vec3::new(-1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0));

        assert!(Aabb::EMPTY.is_empty());
        assert!(Aabb::default().is_empty());
        assert_eq!(Aabb::surrounding(&Aabb::EMPTY, &b), b);
        assert_eq!(Aabb::EMPTY.surface_area(), 0.0);
    }

    #[test]
    fn test_aabb_hit() {
        let aabb = Aabb::from_points(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        // Ray pointing at center
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0), 0.0);
        assert!(aabb.hit(&ray, Interval::new(0.0, 100.0)));

        // Ray pointing away
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, -1.0), 0.0);
        assert!(!aabb.hit(&ray, Interval::new(0.0, 100.0)));

        // Ray missing the box
        let ray = Ray::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0), 0.0);
        assert!(!aabb.hit(&ray, Interval::new(0.0, 100.0)));

        // Box beyond the search limit
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0), 0.0);
        assert!(!aabb.hit(&ray, Interval::new(0.0, 3.0)));
    }

    #[test]
    fn test_hit_range_clips_to_box() {
        let aabb = Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0));
        let ray = Ray::new_simple(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let range = aabb.hit_range(&ray, Interval::new(0.0, 100.0)).unwrap();

        assert!((range.min - 4.0).abs() < 1e-6);
        assert!((range.max - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_axis_parallel_ray_with_infinite_inverse() {
        let aabb = Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0));

        // Direction has zero x and y components: inverse is +/- infinity there.
        let inside = Ray::new_simple(Vec3::new(0.5, -0.5, -5.0), Vec3::Z);
        assert!(aabb.hit(&inside, Interval::new(0.0, 100.0)));

        let outside = Ray::new_simple(Vec3::new(2.0, 0.0, -5.0), Vec3::Z);
        assert!(!aabb.hit(&outside, Interval::new(0.0, 100.0)));

        // Negative zero flips the sign of the infinity; still no trap.
        let neg_zero = Ray::new_simple(Vec3::new(2.0, 0.0, -5.0), Vec3::new(-0.0, 0.0, 1.0));
        assert!(!aabb.hit(&neg_zero, Interval::new(0.0, 100.0)));

        // Origin exactly on a slab plane produces NaN products.
        let on_plane = Ray::new_simple(Vec3::new(1.0, 0.0, -5.0), Vec3::Z);
        assert!(aabb.hit(&on_plane, Interval::new(0.0, 100.0)));
    }

    #[test]
    fn test_flat_box_is_hit() {
        // A triangle lying in the z = 2 plane has a zero-thickness box.
        let flat = Aabb::from_points(Vec3::new(-1.0, -1.0, 2.0), Vec3::new(1.0, 1.0, 2.0));
        let ray = Ray::new_simple(Vec3::ZERO, Vec3::Z);

        assert!(flat.hit(&ray, Interval::new(0.0, 10.0)));
    }

    #[test]
    fn test_aabb_centroid_and_axis() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::new(10.0, 2.0, 4.0));

        assert_eq!(aabb.centroid(), Vec3::new(5.0, 1.0, 2.0));
        assert_eq!(aabb.longest_axis(), 0);
        assert_eq!(aabb.axis_interval(2), Interval::new(0.0, 4.0));
        assert_eq!(aabb.surface_area(), 2.0 * (20.0 + 8.0 + 40.0));
    }

    #[test]
    fn test_enclosing_points() {
        let aabb = Aabb::enclosing([
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-1.0, 3.0, 0.0),
            Vec3::new(0.0, 0.0, -2.0),
        ]);

        assert_eq!(aabb.min, Vec3::new(-1.0, 0.0, -2.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 3.0, 0.0));
        assert!(aabb.contains_point(Vec3::new(0.0, 1.0, -1.0)));
    }
}
