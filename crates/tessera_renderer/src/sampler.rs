//! Pixel samplers.
//!
//! A sampler hands out the random numbers for one pixel at a time. The
//! integrator clones the job's sampler once per tile with a tile-specific
//! seed, so every tile draws from its own reproducible stream regardless of
//! which thread renders it.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tessera_math::{UVec2, Vec2};

/// Everything the camera needs to build one primary ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSample {
    /// Continuous film position in pixels; pixel `(x, y)` covers `[x, x+1) x [y, y+1)`.
    pub film: Vec2,
    /// Point on the unit square, mapped onto the lens.
    pub lens: Vec2,
    pub time: f32,
}

/// Source of sample values for one pixel at a time.
///
/// Usage per pixel: `start_pixel`, then draw values and call
/// `start_next_sample` until it returns `false`.
pub trait Sampler: Send + Sync {
    /// Samples taken per pixel.
    fn samples_per_pixel(&self) -> u32;

    /// Begin sampling `pixel`, resetting the per-pixel sample index.
    fn start_pixel(&mut self, pixel: UVec2);

    /// Advance to the next sample. Returns `false` once every sample of the
    /// current pixel has been taken.
    fn start_next_sample(&mut self) -> bool;

    /// Uniform value in `[0, 1)`.
    fn get_1d(&mut self) -> f32;

    /// Uniform point in `[0, 1)^2`.
    fn get_2d(&mut self) -> Vec2;

    fn get_camera_sample(&mut self, pixel: UVec2) -> CameraSample {
        let film = pixel.as_vec2() + self.get_2d();
        let lens = self.get_2d();
        let time = self.get_1d();
        CameraSample { film, lens, time }
    }

    /// Independent copy with the same settings and a fresh stream.
    fn clone_with_seed(&self, seed: u64) -> Box<dyn Sampler>;

    /// Same kind of sampler taking `samples_per_pixel` samples, subject to
    /// the kind's own rounding.
    fn with_samples_per_pixel(&self, samples_per_pixel: u32) -> Box<dyn Sampler>;
}

/// Which sampler a render uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    #[default]
    Random,
    Stratified,
}

impl SamplerKind {
    pub fn create(self, samples_per_pixel: u32, seed: u64) -> Box<dyn Sampler> {
        match self {
            SamplerKind::Random => Box::new(RandomSampler::new(samples_per_pixel, seed)),
            SamplerKind::Stratified => Box::new(StratifiedSampler::new(samples_per_pixel, seed)),
        }
    }
}

/// Independent uniform samples.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    samples_per_pixel: u32,
    current_sample: u32,
    rng: SmallRng,
}

impl RandomSampler {
    pub fn new(samples_per_pixel: u32, seed: u64) -> Self {
        Self {
            samples_per_pixel: samples_per_pixel.max(1),
            current_sample: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn samples_per_pixel(&self) -> u32 {
        self.samples_per_pixel
    }

    fn start_pixel(&mut self, _pixel: UVec2) {
        self.current_sample = 0;
    }

    fn start_next_sample(&mut self) -> bool {
        self.current_sample += 1;
        self.current_sample < self.samples_per_pixel
    }

    fn get_1d(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    fn get_2d(&mut self) -> Vec2 {
        Vec2::new(self.rng.gen::<f32>(), self.rng.gen::<f32>())
    }

    fn clone_with_seed(&self, seed: u64) -> Box<dyn Sampler> {
        Box::new(RandomSampler::new(self.samples_per_pixel, seed))
    }

    fn with_samples_per_pixel(&self, samples_per_pixel: u32) -> Box<dyn Sampler> {
        Box::new(RandomSampler::new(samples_per_pixel, 0))
    }
}

/// Strata per pixel along each axis.
pub const STRATA_PER_AXIS: u32 = 2;

const STRATA_PER_PIXEL: u32 = STRATA_PER_AXIS * STRATA_PER_AXIS;

/// 2x2 sub-pixel strata, each jittered with a tent filter.
///
/// Sample `i` of a pixel lands in stratum `i % 4`; the sample count is
/// rounded up so every stratum gets the same number of samples. One sample
/// per stratum (4 per pixel) is therefore the smallest pass.
#[derive(Debug, Clone)]
pub struct StratifiedSampler {
    samples_per_pixel: u32,
    current_sample: u32,
    rng: SmallRng,
}

impl StratifiedSampler {
    pub fn new(samples_per_pixel: u32, seed: u64) -> Self {
        let rounded = samples_per_pixel.max(1).div_ceil(STRATA_PER_PIXEL) * STRATA_PER_PIXEL;
        Self {
            samples_per_pixel: rounded,
            current_sample: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn stratum(&self) -> UVec2 {
        let s = self.current_sample % STRATA_PER_PIXEL;
        UVec2::new(s % STRATA_PER_AXIS, s / STRATA_PER_AXIS)
    }
}

/// Map `u` in `[0, 1)` to the tent distribution on `[-1, 1]`.
fn tent(u: f32) -> f32 {
    let r = 2.0 * u;
    if r < 1.0 {
        r.sqrt() - 1.0
    } else {
        1.0 - (2.0 - r).sqrt()
    }
}

impl Sampler for StratifiedSampler {
    fn samples_per_pixel(&self) -> u32 {
        self.samples_per_pixel
    }

    fn start_pixel(&mut self, _pixel: UVec2) {
        self.current_sample = 0;
    }

    fn start_next_sample(&mut self) -> bool {
        self.current_sample += 1;
        self.current_sample < self.samples_per_pixel
    }

    fn get_1d(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    fn get_2d(&mut self) -> Vec2 {
        Vec2::new(self.rng.gen::<f32>(), self.rng.gen::<f32>())
    }

    fn get_camera_sample(&mut self, pixel: UVec2) -> CameraSample {
        let stratum = self.stratum().as_vec2();
        let jitter = Vec2::new(tent(self.rng.gen::<f32>()), tent(self.rng.gen::<f32>()));
        let offset = (stratum + Vec2::splat(0.5) + jitter) / STRATA_PER_AXIS as f32;

        let film = pixel.as_vec2() + offset;
        let lens = self.get_2d();
        let time = self.get_1d();
        CameraSample { film, lens, time }
    }

    fn clone_with_seed(&self, seed: u64) -> Box<dyn Sampler> {
        Box::new(StratifiedSampler::new(self.samples_per_pixel, seed))
    }

    fn with_samples_per_pixel(&self, samples_per_pixel: u32) -> Box<dyn Sampler> {
        Box::new(StratifiedSampler::new(samples_per_pixel, 0))
    }
}
