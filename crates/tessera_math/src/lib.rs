//! Tessera math - value types shared by the path tracer.
//!
//! Vectors come from `glam` (re-exported wholesale). On top of that this
//! crate adds the ray-tracing specific types:
//!
//! - [`Ray`] with a cached inverse direction and a narrowing `t_max`
//! - [`Aabb`] with a slab test that tolerates infinite inverse directions
//! - [`Interval`] for parametric ranges along a ray
//! - [`Bounds2`] for integer pixel regions (film, tiles)

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod bounds2;
mod interval;
mod ray;

pub use aabb::Aabb;
pub use bounds2::Bounds2;
pub use interval::Interval;
pub use ray::Ray;

/// Sentinel distance meaning "no hit yet".
///
/// Kept finite so arithmetic on it never produces NaN.
pub const T_INFINITY: f32 = 1e20;
