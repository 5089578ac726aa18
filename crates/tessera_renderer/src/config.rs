//! Render configuration.

use crate::sampler::SamplerKind;
use crate::scenes::SceneMask;
use crate::Color;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for one render, loadable from JSON.
///
/// Missing fields take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Samples per pixel (per pass in progressive mode)
    pub samples_per_pixel: u32,
    pub sampler: SamplerKind,
    /// Base seed for sampling and BVH construction
    pub seed: u64,
    /// Total render threads; 0 uses every hardware thread
    pub threads: usize,
    /// Index of refraction of the glass sphere
    pub ior: f32,
    /// Scene groups to include
    pub scene: SceneMask,
    /// Radiance of rays that leave the scene
    pub background: [f32; 3],
    /// Output image; `.ppm` is written natively
    pub output: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            samples_per_pixel: 16,
            sampler: SamplerKind::Random,
            seed: 0,
            threads: 0,
            ior: 1.5,
            scene: SceneMask::ALL,
            background: [0.0; 3],
            output: PathBuf::from("render.ppm"),
        }
    }
}

impl RenderConfig {
    pub fn background_color(&self) -> Color {
        Color::from_array(self.background)
    }
}
