//! Indexed triangle meshes.
//!
//! A [`TriangleMesh`] owns vertex data and is shared (`Arc`) by the
//! [`Triangle`](crate::Triangle) views the scene builds over it. Indices are
//! validated once here so intersection code can index without checks
//! failing at render time.

use crate::Material;
use std::sync::Arc;
use tessera_math::{Aabb, Vec3};
use thiserror::Error;

/// Errors raised while assembling a mesh.
#[derive(Debug, Error, PartialEq)]
pub enum MeshError {
    #[error("index count {0} is not a multiple of 3")]
    IndexCount(usize),

    #[error("vertex index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    #[error("normal count {normals} does not match vertex count {vertices}")]
    NormalCount { normals: usize, vertices: usize },
}

/// A mesh consisting of vertex positions, optional normals, and triangle indices.
#[derive(Clone, Debug)]
pub struct TriangleMesh {
    positions: Vec<Vec3>,
    normals: Option<Vec<Vec3>>,
    indices: Vec<u32>,
    material: Material,
    bounds: Aabb,
}

impl TriangleMesh {
    /// Create a flat-shaded mesh from positions and indices.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, material: Material) -> Result<Self, MeshError> {
        Self::with_normals(positions, indices, None, material)
    }

    /// Create a mesh with optional per-vertex normals for smooth shading.
    pub fn with_normals(
        positions: Vec<Vec3>,
        indices: Vec<u32>,
        normals: Option<Vec<Vec3>>,
        material: Material,
    ) -> Result<Self, MeshError> {
        if indices.len() % 3 != 0 {
            return Err(MeshError::IndexCount(indices.len()));
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertex_count: positions.len(),
            });
        }
        if let Some(normals) = &normals {
            if normals.len() != positions.len() {
                return Err(MeshError::NormalCount {
                    normals: normals.len(),
                    vertices: positions.len(),
                });
            }
        }

        let bounds = Aabb::enclosing(positions.iter().copied());
        Ok(Self {
            positions,
            normals,
            indices,
            material,
            bounds,
        })
    }

    /// Axis-aligned quad from a corner and two edge vectors (two triangles).
    pub fn quad(corner: Vec3, edge_u: Vec3, edge_v: Vec3, material: Material) -> Result<Self, MeshError> {
        let positions = vec![
            corner,
            corner + edge_u,
            corner + edge_u + edge_v,
            corner + edge_v,
        ];
        Self::new(positions, vec![0, 1, 2, 0, 2, 3], material)
    }

    /// Subdivided icosahedron projected onto a sphere, with smooth normals.
    pub fn icosphere(center: Vec3, radius: f32, subdivisions: u32, material: Material) -> Result<Self, MeshError> {
        let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
        let mut unit: Vec<Vec3> = [
            (-1.0, t, 0.0),
            (1.0, t, 0.0),
            (-1.0, -t, 0.0),
            (1.0, -t, 0.0),
            (0.0, -1.0, t),
            (0.0, 1.0, t),
            (0.0, -1.0, -t),
            (0.0, 1.0, -t),
            (t, 0.0, -1.0),
            (t, 0.0, 1.0),
            (-t, 0.0, -1.0),
            (-t, 0.0, 1.0),
        ]
        .iter()
        .map(|&(x, y, z)| Vec3::new(x, y, z).normalize())
        .collect();

        let mut faces: Vec<[u32; 3]> = vec![
            [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
            [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
            [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
            [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
        ];

        for _ in 0..subdivisions {
            let mut midpoints = std::collections::HashMap::new();
            let mut midpoint = |a: u32, b: u32, unit: &mut Vec<Vec3>| -> u32 {
                let key = (a.min(b), a.max(b));
                *midpoints.entry(key).or_insert_with(|| {
                    let p = ((unit[a as usize] + unit[b as usize]) * 0.5).normalize();
                    unit.push(p);
                    (unit.len() - 1) as u32
                })
            };

            let mut next = Vec::with_capacity(faces.len() * 4);
            for [a, b, c] in faces {
                let ab = midpoint(a, b, &mut unit);
                let bc = midpoint(b, c, &mut unit);
                let ca = midpoint(c, a, &mut unit);
                next.extend_from_slice(&[[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
            }
            faces = next;
        }

        let positions = unit.iter().map(|&n| center + n * radius).collect();
        let indices = faces.into_iter().flatten().collect();
        Self::with_normals(positions, indices, Some(unit), material)
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> Option<&[Vec3]> {
        self.normals.as_deref()
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn material(&self) -> Material {
        self.material
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex indices of one triangle.
    #[inline]
    pub fn triangle_indices(&self, triangle: usize) -> [usize; 3] {
        let base = triangle * 3;
        [
            self.indices[base] as usize,
            self.indices[base + 1] as usize,
            self.indices[base + 2] as usize,
        ]
    }

    /// Vertex positions of one triangle.
    #[inline]
    pub fn triangle_vertices(&self, triangle: usize) -> [Vec3; 3] {
        let [a, b, c] = self.triangle_indices(triangle);
        [self.positions[a], self.positions[b], self.positions[c]]
    }
}

/// Build one [`Triangle`](crate::Triangle) view per face of a shared mesh.
pub fn triangulate(mesh: &Arc<TriangleMesh>) -> Vec<crate::Triangle> {
    (0..mesh.triangle_count())
        .map(|i| crate::Triangle::new(Arc::clone(mesh), i))
        .collect()
}
