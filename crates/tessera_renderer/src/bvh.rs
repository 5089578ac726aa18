//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! The tree is stored as a flat node array with the root at index 0. Leaves
//! reference a contiguous run of a permutation array (`indices`) into the
//! caller's primitive slice; the BVH never owns the primitives themselves.
//!
//! Construction is a recursive count-median split: at every node one axis is
//! drawn at random (seeded, so builds are reproducible), the primitive range
//! is sorted by the minimum bound of each box on that axis, and the range is
//! halved by count. No surface area heuristic is evaluated.

use crate::shape::Shape;
use crate::stats;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tessera_math::{Aabb, Interval, Ray, Vec3};
use thiserror::Error;

/// Maximum primitives per leaf node before splitting.
pub const TRIANGLES_IN_LEAF: usize = 12;

/// Seed used when the caller does not pick one.
pub const DEFAULT_BVH_SEED: u64 = 0x5EED_B0B5;

/// Errors raised while building a BVH.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BvhError {
    #[error("cannot build a BVH over zero primitives")]
    EmptyInput,

    #[error("{0} primitives exceed the 32-bit index range of the BVH")]
    TooManyPrimitives(usize),
}

/// BVH node, stored by value in [`Bvh::nodes`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BvhNode {
    /// Internal node; children are indices into the node array.
    Branch { bbox: Aabb, left: u32, right: u32 },
    /// Leaf covering `indices[start..start + count]`.
    Leaf { bbox: Aabb, start: u32, count: u32 },
}

impl BvhNode {
    pub fn bbox(&self) -> &Aabb {
        match self {
            BvhNode::Branch { bbox, .. } | BvhNode::Leaf { bbox, .. } => bbox,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BvhNode::Leaf { .. })
    }
}

/// Nearest intersection reported by [`Bvh::intersect`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhHit {
    /// Index into the primitive slice the tree was built over.
    pub primitive: usize,
    /// Distance along the ray.
    pub t: f32,
    /// World-space hit point.
    pub point: Vec3,
}

/// Flat binary BVH over a primitive slice.
#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    indices: Vec<u32>,
}

struct BuildContext<'a> {
    boxes: &'a [Aabb],
    indices: Vec<u32>,
    nodes: Vec<BvhNode>,
    rng: SmallRng,
}

impl Bvh {
    /// Build with the default seed.
    pub fn new<P: Shape>(primitives: &[P]) -> Result<Self, BvhError> {
        Self::build(primitives, DEFAULT_BVH_SEED)
    }

    /// Build a tree over `primitives`. The same seed and input order always
    /// produce the same tree.
    pub fn build<P: Shape>(primitives: &[P], seed: u64) -> Result<Self, BvhError> {
        if primitives.is_empty() {
            return Err(BvhError::EmptyInput);
        }
        if u32::try_from(primitives.len()).is_err() {
            return Err(BvhError::TooManyPrimitives(primitives.len()));
        }

        let start = Instant::now();
        let boxes: Vec<Aabb> = primitives.iter().map(|p| p.bounding_box()).collect();

        let mut ctx = BuildContext {
            boxes: &boxes,
            indices: (0..primitives.len() as u32).collect(),
            nodes: Vec::with_capacity(2 * primitives.len() / TRIANGLES_IN_LEAF + 1),
            rng: SmallRng::seed_from_u64(seed),
        };
        ctx.build_recursive(0, primitives.len());

        let bvh = Bvh {
            nodes: ctx.nodes,
            indices: ctx.indices,
        };
        log::info!(
            "Built BVH over {} primitives: {} nodes, {} leaves in {:?}",
            primitives.len(),
            bvh.node_count(),
            bvh.leaf_count(),
            start.elapsed()
        );
        Ok(bvh)
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Permutation of primitive indices in leaf order.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Box enclosing every primitive.
    pub fn bounds(&self) -> Aabb {
        *self.nodes[0].bbox()
    }

    /// Nearest hit in `[0, ray.t_max)`.
    ///
    /// `primitives` must be the slice the tree was built over. On a hit,
    /// `ray.t_max` is left at the hit distance.
    pub fn intersect<P: Shape>(&self, primitives: &[P], ray: &mut Ray) -> Option<BvhHit> {
        debug_assert_eq!(primitives.len(), self.indices.len());
        self.intersect_node(0, primitives, ray)
            .map(|(primitive, t)| BvhHit {
                primitive,
                t,
                point: ray.at(t),
            })
    }

    /// Branch-and-bound nearest hit.
    ///
    /// Children are visited left first. Any hit lowers `ray.t_max`, so the
    /// right subtree only reports something strictly closer than the left.
    fn intersect_node<P: Shape>(&self, index: u32, primitives: &[P], ray: &mut Ray) -> Option<(usize, f32)> {
        stats::record(|s| s.bvh_nodes_visited += 1);
        let node = &self.nodes[index as usize];
        if !node.bbox().hit(ray, Interval::of_ray(ray)) {
            return None;
        }

        match *node {
            BvhNode::Leaf { start, count, .. } => {
                let range = start as usize..(start + count) as usize;
                stats::record(|s| s.triangle_tests += count as u64);
                let mut closest = None;
                for &prim in &self.indices[range] {
                    if let Some(t) = primitives[prim as usize].intersect(ray) {
                        ray.t_max = t;
                        closest = Some((prim as usize, t));
                    }
                }
                closest
            }
            BvhNode::Branch { left, right, .. } => {
                let hit_left = self.intersect_node(left, primitives, ray);
                let hit_right = self.intersect_node(right, primitives, ray);
                hit_right.or(hit_left)
            }
        }
    }

    /// True if anything is hit in `[0, ray.t_max)`; stops at the first hit.
    pub fn intersect_any<P: Shape>(&self, primitives: &[P], ray: &Ray) -> bool {
        debug_assert_eq!(primitives.len(), self.indices.len());
        self.intersect_any_node(0, primitives, ray)
    }

    fn intersect_any_node<P: Shape>(&self, index: u32, primitives: &[P], ray: &Ray) -> bool {
        stats::record(|s| s.bvh_nodes_visited += 1);
        let node = &self.nodes[index as usize];
        if !node.bbox().hit(ray, Interval::of_ray(ray)) {
            return false;
        }

        match *node {
            BvhNode::Leaf { start, count, .. } => {
                let range = start as usize..(start + count) as usize;
                self.indices[range].iter().any(|&prim| {
                    stats::record(|s| s.triangle_tests += 1);
                    primitives[prim as usize].intersect(ray).is_some()
                })
            }
            BvhNode::Branch { left, right, .. } => {
                self.intersect_any_node(left, primitives, ray)
                    || self.intersect_any_node(right, primitives, ray)
            }
        }
    }
}

impl BuildContext<'_> {
    /// Build the subtree over `indices[start..end]`, returning its node index.
    fn build_recursive(&mut self, start: usize, end: usize) -> u32 {
        let node_index = self.nodes.len() as u32;
        // Reserve the slot so parents precede their children.
        self.nodes.push(BvhNode::Leaf {
            bbox: Aabb::EMPTY,
            start: 0,
            count: 0,
        });

        let axis = self.rng.gen_range(0..3);
        let boxes = self.boxes;
        self.indices[start..end]
            .sort_by(|&a, &b| boxes[a as usize].min[axis].total_cmp(&boxes[b as usize].min[axis]));

        let node = if end - start <= TRIANGLES_IN_LEAF {
            let bbox = self.indices[start..end]
                .iter()
                .fold(Aabb::EMPTY, |acc, &i| Aabb::surrounding(&acc, &boxes[i as usize]));
            BvhNode::Leaf {
                bbox,
                start: start as u32,
                count: (end - start) as u32,
            }
        } else {
            let mid = start + (end - start) / 2;
            let left = self.build_recursive(start, mid);
            let right = self.build_recursive(mid, end);
            let bbox = Aabb::surrounding(
                self.nodes[left as usize].bbox(),
                self.nodes[right as usize].bbox(),
            );
            BvhNode::Branch { bbox, left, right }
        };

        self.nodes[node_index as usize] = node;
        node_index
    }
}
