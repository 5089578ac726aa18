//! Surface materials and the scattering helpers the integrator uses.
//!
//! Materials are a closed set decided when the scene is built. The hit
//! record carries a copy, so shading never needs to inspect the primitive.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Color type alias (RGB values typically 0-1)
pub type Color = Vec3;

/// How a surface interacts with light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Material {
    /// Lambertian reflector.
    Diffuse { albedo: Color },
    /// Perfect mirror.
    Specular { albedo: Color },
    /// Glass-like surface that both reflects and refracts.
    Dielectric { albedo: Color, ior: f32 },
    /// Light source; absorbs everything it is hit by.
    Emissive { radiance: Color },
}

impl Material {
    /// Light emitted by the surface itself.
    pub fn emitted(&self) -> Color {
        match self {
            Material::Emissive { radiance } => *radiance,
            _ => Color::ZERO,
        }
    }

    /// Fraction of incoming light the surface passes on (zero for lights).
    pub fn albedo(&self) -> Color {
        match self {
            Material::Diffuse { albedo }
            | Material::Specular { albedo }
            | Material::Dielectric { albedo, .. } => *albedo,
            Material::Emissive { .. } => Color::ZERO,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::Diffuse {
            albedo: Color::splat(0.5),
        }
    }
}

/// Reflect a vector about a normal.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a unit vector through a surface whose normal faces the incoming
/// side. Returns `None` on total internal reflection.
#[inline]
pub fn refract(uv: Vec3, n: Vec3, etai_over_etat: f32) -> Option<Vec3> {
    let cos_theta = (-uv).dot(n).min(1.0);
    let sin2_theta_t = etai_over_etat * etai_over_etat * (1.0 - cos_theta * cos_theta);
    if sin2_theta_t > 1.0 {
        return None;
    }
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - sin2_theta_t).sqrt() * n;
    Some((r_out_perp + r_out_parallel).normalize())
}

/// Schlick's approximation for Fresnel reflectance.
///
/// `cosine` is measured on the optically thinner side of the interface.
#[inline]
pub fn schlick(cosine: f32, ior: f32) -> f32 {
    let r0 = ((1.0 - ior) / (1.0 + ior)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine.clamp(0.0, 1.0)).powi(5)
}

/// Cosine-weighted direction on the hemisphere around `n`, from a
/// uniform sample in `[0,1)^2`.
pub fn cosine_sample_hemisphere(n: Vec3, u: Vec2) -> Vec3 {
    let phi = 2.0 * PI * u.x;
    let r = u.y.sqrt();
    let (tangent, bitangent) = n.any_orthonormal_pair();
    let local_z = (1.0 - u.y).max(0.0).sqrt();
    (tangent * (phi.cos() * r) + bitangent * (phi.sin() * r) + n * local_z).normalize()
}
