//! Built-in demo scenes.

use crate::mesh::{MeshError, TriangleMesh};
use crate::{Camera, Color, Material, Scene, SceneBuilder, SceneError, Sphere};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;
use std::sync::Arc;
use tessera_math::Vec3;
use thiserror::Error;

/// Which groups of the Cornell box to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneMask(u32);

impl SceneMask {
    pub const NONE: SceneMask = SceneMask(0);
    /// Floor, ceiling, back and side walls.
    pub const WALLS: SceneMask = SceneMask(1 << 0);
    /// Mirror and glass spheres.
    pub const SPHERES: SceneMask = SceneMask(1 << 1);
    /// Emissive ceiling panel.
    pub const LIGHT: SceneMask = SceneMask(1 << 2);
    /// Procedural icosphere mesh.
    pub const MESH: SceneMask = SceneMask(1 << 3);
    pub const ALL: SceneMask = SceneMask(0b1111);

    const NAMES: [(&'static str, SceneMask); 4] = [
        ("walls", SceneMask::WALLS),
        ("spheres", SceneMask::SPHERES),
        ("light", SceneMask::LIGHT),
        ("mesh", SceneMask::MESH),
    ];

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: SceneMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for SceneMask {
    fn default() -> Self {
        SceneMask::ALL
    }
}

impl BitOr for SceneMask {
    type Output = SceneMask;

    fn bitor(self, rhs: SceneMask) -> SceneMask {
        SceneMask(self.0 | rhs.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown scene group {0:?} (expected walls, spheres, light, mesh, all or none)")]
pub struct ParseSceneMaskError(String);

/// Comma-separated group names, e.g. `walls,light`.
impl FromStr for SceneMask {
    type Err = ParseSceneMaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mask = SceneMask::NONE;
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let name = name.to_ascii_lowercase();
            mask = mask
                | match name.as_str() {
                    "all" => SceneMask::ALL,
                    "none" => SceneMask::NONE,
                    _ => SceneMask::NAMES
                        .iter()
                        .find(|(n, _)| *n == name)
                        .map(|&(_, m)| m)
                        .ok_or(ParseSceneMaskError(name.clone()))?,
                };
        }
        Ok(mask)
    }
}

impl fmt::Display for SceneMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = SceneMask::NAMES
            .iter()
            .filter(|(_, m)| self.contains(*m))
            .map(|(n, _)| *n)
            .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join(","))
        }
    }
}

const WHITE: Color = Color::new(0.75, 0.75, 0.75);
const RED: Color = Color::new(0.75, 0.25, 0.25);
const BLUE: Color = Color::new(0.25, 0.25, 0.75);
const GREEN: Color = Color::new(0.25, 0.75, 0.25);
const LIGHT_RADIANCE: Color = Color::new(12.0, 12.0, 12.0);

fn diffuse(albedo: Color) -> Material {
    Material::Diffuse { albedo }
}

/// Cornell box spanning `x, z in [-1, 1]`, `y in [0, 2]`, open towards `+z`.
///
/// `ior` is the index of refraction of the glass sphere.
pub fn cornell_box(mask: SceneMask, ior: f32) -> Result<Scene, SceneError> {
    let mut builder = SceneBuilder::new();

    if mask.contains(SceneMask::WALLS) {
        let c = Vec3::new(-1.0, 0.0, -1.0);
        let walls = [
            // floor, ceiling, back, left, right
            TriangleMesh::quad(c, Vec3::X * 2.0, Vec3::Z * 2.0, diffuse(WHITE))?,
            TriangleMesh::quad(c + Vec3::Y * 2.0, Vec3::X * 2.0, Vec3::Z * 2.0, diffuse(WHITE))?,
            TriangleMesh::quad(c, Vec3::X * 2.0, Vec3::Y * 2.0, diffuse(WHITE))?,
            TriangleMesh::quad(c, Vec3::Z * 2.0, Vec3::Y * 2.0, diffuse(RED))?,
            TriangleMesh::quad(c + Vec3::X * 2.0, Vec3::Z * 2.0, Vec3::Y * 2.0, diffuse(BLUE))?,
        ];
        for wall in walls {
            builder.add_mesh(Arc::new(wall));
        }
    }

    if mask.contains(SceneMask::LIGHT) {
        let panel = TriangleMesh::quad(
            Vec3::new(-0.3, 1.98, -0.3),
            Vec3::X * 0.6,
            Vec3::Z * 0.6,
            Material::Emissive {
                radiance: LIGHT_RADIANCE,
            },
        )?;
        builder.add_mesh(Arc::new(panel));
    }

    if mask.contains(SceneMask::SPHERES) {
        builder
            .add_sphere(Sphere::new(
                Vec3::new(-0.45, 0.35, -0.4),
                0.35,
                Material::Specular {
                    albedo: Color::splat(0.999),
                },
            ))
            .add_sphere(Sphere::new(
                Vec3::new(0.45, 0.35, 0.2),
                0.35,
                Material::Dielectric {
                    albedo: Color::splat(0.999),
                    ior,
                },
            ));
    }

    if mask.contains(SceneMask::MESH) {
        let blob = TriangleMesh::icosphere(Vec3::new(-0.35, 0.2, 0.5), 0.2, 2, diffuse(GREEN))?;
        builder.add_mesh(Arc::new(blob));
    }

    builder.build()
}

/// Camera framing [`cornell_box`] from the open side.
pub fn cornell_camera() -> Camera {
    Camera::new()
        .with_position(Vec3::new(0.0, 1.0, 3.5), Vec3::new(0.0, 1.0, 0.0), Vec3::Y)
        .with_lens(40.0, 0.0, 3.5)
}

/// `count` random triangles with edges up to 1 unit, centered in `[-5, 5]^3`.
pub fn random_triangles(count: usize, seed: u64) -> Result<TriangleMesh, MeshError> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut positions = Vec::with_capacity(count * 3);
    for _ in 0..count {
        let center = Vec3::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0));
        for _ in 0..3 {
            let offset = Vec3::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5));
            positions.push(center + offset);
        }
    }
    let indices = (0..positions.len() as u32).collect();
    TriangleMesh::new(positions, indices, Material::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_math::Ray;

    #[test]
    fn test_full_box_contents() {
        let scene = cornell_box(SceneMask::ALL, 1.5).unwrap();
        // 5 walls + light panel as quads, plus an icosphere with 2 subdivisions
        assert_eq!(scene.triangle_count(), 6 * 2 + 320);
        assert_eq!(scene.sphere_count(), 2);

        let bounds = scene.bounds();
        assert_eq!(bounds.min, Vec3::new(-1.0, 0.0, -1.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 2.0, 1.0));
    }

    #[test]
    fn test_mask_selects_groups() {
        let walls = cornell_box(SceneMask::WALLS, 1.5).unwrap();
        assert_eq!(walls.triangle_count(), 10);
        assert_eq!(walls.sphere_count(), 0);

        let spheres = cornell_box(SceneMask::SPHERES, 1.5).unwrap();
        assert!(spheres.bvh().is_none());
        assert_eq!(spheres.sphere_count(), 2);

        let lit = cornell_box(SceneMask::WALLS | SceneMask::LIGHT, 1.5).unwrap();
        assert_eq!(lit.triangle_count(), 12);

        assert_eq!(cornell_box(SceneMask::NONE, 1.5).err(), Some(SceneError::Empty));
    }

    #[test]
    fn test_camera_looks_at_back_wall() {
        let scene = cornell_box(SceneMask::ALL, 1.5).unwrap();
        let camera = cornell_camera().with_resolution(64, 64).build().unwrap();
        let ray = Ray::new_simple(camera.look_from(), -Vec3::Z);

        let hit = scene.intersect(&ray).unwrap();
        assert!((hit.t - 4.5).abs() < 1e-4);
        assert!(hit.front_face);
    }

    #[test]
    fn test_light_is_emissive() {
        let scene = cornell_box(SceneMask::LIGHT, 1.5).unwrap();
        let ray = Ray::new_simple(Vec3::new(0.0, 1.0, 0.0), Vec3::Y);
        let hit = scene.intersect(&ray).unwrap();
        assert_eq!(hit.material.emitted(), LIGHT_RADIANCE);
    }

    #[test]
    fn test_parse_mask() {
        assert_eq!("all".parse::<SceneMask>().unwrap(), SceneMask::ALL);
        assert_eq!(
            "walls, Light".parse::<SceneMask>().unwrap(),
            SceneMask::WALLS | SceneMask::LIGHT
        );
        assert_eq!("".parse::<SceneMask>().unwrap(), SceneMask::NONE);
        assert!("teapot".parse::<SceneMask>().is_err());

        let mask = SceneMask::SPHERES | SceneMask::MESH;
        assert_eq!(mask.to_string(), "spheres,mesh");
        assert_eq!(mask.to_string().parse::<SceneMask>().unwrap(), mask);
        assert_eq!(SceneMask::NONE.to_string(), "none");
    }

    #[test]
    fn test_mask_json_is_plain_bits() {
        let mask: SceneMask = serde_json::from_str("5").unwrap();
        assert_eq!(mask, SceneMask::WALLS | SceneMask::LIGHT);
        assert_eq!(serde_json::to_string(&SceneMask::ALL).unwrap(), "15");
    }

    #[test]
    fn test_random_triangles_deterministic() {
        let a = random_triangles(100, 3).unwrap();
        let b = random_triangles(100, 3).unwrap();
        let c = random_triangles(100, 4).unwrap();
        assert_eq!(a.triangle_count(), 100);
        assert_eq!(a.positions(), b.positions());
        assert_ne!(a.positions(), c.positions());
        assert!(a.bounds().min.cmpge(Vec3::splat(-5.5)).all());
        assert!(a.bounds().max.cmple(Vec3::splat(5.5)).all());
    }
}
