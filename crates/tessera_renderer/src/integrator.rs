//! Tile-parallel path tracing integrator.
//!
//! Radiance is estimated Kajiya style: one continuation ray per bounce for
//! diffuse and mirror surfaces, and for glass either both Fresnel branches
//! (shallow paths) or one branch chosen in proportion to reflectance.
//! Paths longer than [`RR_START_DEPTH`] are subject to Russian roulette and
//! cut off after [`MAX_PATH_DEPTH`].

use crate::film::{Film, FilmError};
use crate::material::{cosine_sample_hemisphere, reflect, refract, schlick, Color, Material};
use crate::sampler::Sampler;
use crate::scene::Scene;
use crate::scheduler::{Scheduler, SchedulerError};
use crate::stats;
use crate::tiles::{TileGrid, TILE_SIZE};
use crate::Camera;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tessera_math::{Bounds2, Ray, UVec2};
use thiserror::Error;

/// Bounce depth after which Russian roulette may end a path.
pub const RR_START_DEPTH: u32 = 4;

/// Bounce depth after which a path returns only emitted light.
pub const MAX_PATH_DEPTH: u32 = 6;

/// Chance a path survives a Russian roulette test.
pub const RR_CONTINUE_PROBABILITY: f32 = 0.8;

/// Up to this depth glass surfaces trace both reflection and refraction.
pub const DIELECTRIC_SPLIT_DEPTH: u32 = 2;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("camera sample bounds {0:?} contain no pixels")]
    DegenerateBounds(Bounds2),

    #[error("camera film size {camera} does not match film {film}")]
    FilmMismatch { camera: UVec2, film: UVec2 },

    #[error(transparent)]
    Film(#[from] FilmError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("render thread panicked")]
    RenderThreadPanicked,
}

/// Settings that shape the radiance estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegratorSettings {
    /// Radiance returned by rays that escape the scene.
    pub background: Color,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            background: Color::ZERO,
        }
    }
}

/// Everything one render pass reads, shared with the worker threads.
#[derive(Clone)]
pub struct RenderJob {
    pub scene: Arc<Scene>,
    pub camera: Arc<Camera>,
    pub sampler: Arc<dyn Sampler>,
    pub film: Arc<Film>,
    /// Base seed; every tile and pass derives its own stream from it.
    pub seed: u64,
}

impl RenderJob {
    pub fn new(scene: Arc<Scene>, camera: Arc<Camera>, sampler: Box<dyn Sampler>, film: Arc<Film>, seed: u64) -> Self {
        Self {
            scene,
            camera,
            sampler: Arc::from(sampler),
            film,
            seed,
        }
    }

    /// Check that the camera covers some pixels and matches the film.
    pub fn validate(&self) -> Result<Bounds2, RenderError> {
        let bounds = self.camera.sample_bounds();
        if bounds.is_degenerate() {
            return Err(RenderError::DegenerateBounds(bounds));
        }
        if self.camera.film_size() != self.film.size() {
            return Err(RenderError::FilmMismatch {
                camera: self.camera.film_size(),
                film: self.film.size(),
            });
        }
        Ok(bounds)
    }
}

/// Seed for one tile of one pass: a SplitMix64 mix of the inputs.
pub fn tile_seed(base: u64, pass: u32, tile: UVec2) -> u64 {
    let mut z = base
        ^ (pass as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (((tile.y as u64) << 32) | tile.x as u64).wrapping_mul(0xD6E8_FEB8_6659_FD93);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PathIntegrator {
    settings: IntegratorSettings,
}

impl PathIntegrator {
    pub fn new(settings: IntegratorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &IntegratorSettings {
        &self.settings
    }

    /// Radiance arriving along `ray` (unit direction). `depth` counts the
    /// bounces already taken; camera rays start at 0.
    pub fn radiance(&self, scene: &Scene, ray: &Ray, depth: u32, sampler: &mut dyn Sampler) -> Color {
        let Some(hit) = scene.intersect(ray) else {
            return self.settings.background;
        };

        let depth = depth + 1;
        let emitted = hit.material.emitted();
        if depth > MAX_PATH_DEPTH {
            return emitted;
        }

        let mut albedo = hit.material.albedo();
        if depth > RR_START_DEPTH {
            if sampler.get_1d() < RR_CONTINUE_PROBABILITY {
                albedo /= RR_CONTINUE_PROBABILITY;
            } else {
                return emitted;
            }
        }

        let d = ray.direction();
        let nl = hit.shading_normal;
        let spawn = |dir| Ray::new(hit.point, dir, ray.time);

        match hit.material {
            Material::Emissive { .. } => emitted,
            Material::Diffuse { .. } => {
                let dir = cosine_sample_hemisphere(nl, sampler.get_2d());
                emitted + albedo * self.radiance(scene, &spawn(dir), depth, sampler)
            }
            Material::Specular { .. } => {
                let dir = reflect(d, nl);
                emitted + albedo * self.radiance(scene, &spawn(dir), depth, sampler)
            }
            Material::Dielectric { ior, .. } => {
                let reflected = spawn(reflect(d, nl));
                let eta = if hit.front_face { 1.0 / ior } else { ior };

                let Some(transmitted) = refract(d, nl, eta) else {
                    // Total internal reflection
                    return emitted + albedo * self.radiance(scene, &reflected, depth, sampler);
                };

                // Cosine on the outside of the interface
                let cosine = if hit.front_face {
                    -d.dot(nl)
                } else {
                    transmitted.dot(hit.normal)
                };
                let re = schlick(cosine, ior);
                let tr = 1.0 - re;

                let incoming = if depth > DIELECTRIC_SPLIT_DEPTH {
                    let p = 0.25 + 0.5 * re;
                    if sampler.get_1d() < p {
                        self.radiance(scene, &reflected, depth, sampler) * (re / p)
                    } else {
                        self.radiance(scene, &spawn(transmitted), depth, sampler) * (tr / (1.0 - p))
                    }
                } else {
                    self.radiance(scene, &reflected, depth, sampler) * re
                        + self.radiance(scene, &spawn(transmitted), depth, sampler) * tr
                };
                emitted + albedo * incoming
            }
        }
    }

    /// Render one full pass of `job` into its film.
    ///
    /// Tiles are dispatched through `scheduler`; each tile clones the job's
    /// sampler with [`tile_seed`] so the image depends only on the seed,
    /// never on the thread count or scheduling order.
    pub fn render(&self, scheduler: &Scheduler, job: &RenderJob, pass: u32) -> Result<(), RenderError> {
        let bounds = job.validate()?;
        let grid = TileGrid::new(bounds, TILE_SIZE);
        let start = Instant::now();
        log::info!(
            "Rendering pass {}: {}x{} at {} spp, {} tiles on {} threads",
            pass,
            bounds.width(),
            bounds.height(),
            job.sampler.samples_per_pixel(),
            grid.tile_count(),
            scheduler.thread_count()
        );

        let first_error: Arc<Mutex<Option<FilmError>>> = Arc::new(Mutex::new(None));
        let integrator = *self;
        let tile_job = job.clone();
        let errors = Arc::clone(&first_error);

        scheduler.parallel_for_2d(
            move |tile| {
                let seed = tile_seed(tile_job.seed, pass, tile);
                if let Err(err) = integrator.render_tile(&tile_job, grid.tile_bounds(tile), seed) {
                    errors.lock().unwrap_or_else(PoisonError::into_inner).get_or_insert(err);
                }
            },
            grid.count(),
        );

        if let Some(err) = first_error.lock().unwrap_or_else(PoisonError::into_inner).take() {
            return Err(err.into());
        }

        log::info!("Pass {} finished in {:.2?}", pass, start.elapsed());
        Ok(())
    }

    fn render_tile(&self, job: &RenderJob, bounds: Bounds2, seed: u64) -> Result<(), FilmError> {
        let mut sampler = job.sampler.clone_with_seed(seed);
        let mut tile = job.film.get_tile(bounds)?;

        for pixel in bounds.pixels() {
            sampler.start_pixel(pixel);
            loop {
                let camera_sample = sampler.get_camera_sample(pixel);
                let ray = job.camera.generate_ray(&camera_sample);
                stats::record(|s| s.camera_rays += 1);

                let l = self.radiance(&job.scene, &ray, 0, sampler.as_mut());
                tile.add_sample(pixel, l);

                if !sampler.start_next_sample() {
                    break;
                }
            }
        }

        job.film.merge_tile(tile)?;
        stats::record(|s| s.tiles_rendered += 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{RandomSampler, SamplerKind};
    use crate::scenes::{cornell_box, cornell_camera, SceneMask};
    use crate::{SceneBuilder, Sphere};
    use tessera_math::Vec3;

    fn uniform_background() -> PathIntegrator {
        PathIntegrator::new(IntegratorSettings {
            background: Color::ONE,
        })
    }

    fn single_sphere(material: Material) -> Scene {
        let mut builder = SceneBuilder::new();
        builder.add_sphere(Sphere::new(Vec3::ZERO, 1.0, material));
        builder.build().unwrap()
    }

    fn toward_origin() -> Ray {
        Ray::new_simple(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0))
    }

    #[test]
    fn test_miss_returns_background() {
        let scene = single_sphere(Material::default());
        let mut sampler = RandomSampler::new(1, 0);
        let ray = Ray::new_simple(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);

        assert_eq!(PathIntegrator::default().radiance(&scene, &ray, 0, &mut sampler), Color::ZERO);
        assert_eq!(uniform_background().radiance(&scene, &ray, 0, &mut sampler), Color::ONE);
    }

    #[test]
    fn test_emissive_returns_emission() {
        let radiance = Color::new(4.0, 3.0, 2.0);
        let scene = single_sphere(Material::Emissive { radiance });
        let mut sampler = RandomSampler::new(1, 0);
        let l = uniform_background().radiance(&scene, &toward_origin(), 0, &mut sampler);
        assert_eq!(l, radiance);
    }

    #[test]
    fn test_mirror_reflects_background() {
        let albedo = Color::new(0.9, 0.8, 0.7);
        let scene = single_sphere(Material::Specular { albedo });
        let mut sampler = RandomSampler::new(1, 0);
        let l = uniform_background().radiance(&scene, &toward_origin(), 0, &mut sampler);
        assert!((l - albedo).length() < 1e-6);
    }

    #[test]
    fn test_depth_cap_returns_emission_only() {
        let scene = single_sphere(Material::Diffuse { albedo: Color::ONE });
        let mut sampler = RandomSampler::new(1, 0);
        let l = uniform_background().radiance(&scene, &toward_origin(), MAX_PATH_DEPTH, &mut sampler);
        assert_eq!(l, Color::ZERO);
    }

    #[test]
    fn test_russian_roulette_is_unbiased() {
        // One diffuse bounce off a convex sphere always escapes to the
        // uniform background, so the expected radiance is the albedo even
        // with roulette active at this depth.
        let albedo: f64 = 0.5;
        let scene = single_sphere(Material::Diffuse {
            albedo: Color::splat(albedo as f32),
        });
        let integrator = uniform_background();
        let mut sampler = RandomSampler::new(1, 1234);
        let ray = toward_origin();

        let estimate = |n: usize, sampler: &mut RandomSampler| {
            let (mut sum, mut sum_sq) = (0.0f64, 0.0f64);
            for _ in 0..n {
                let l = integrator.radiance(&scene, &ray, RR_START_DEPTH, sampler).x as f64;
                sum += l;
                sum_sq += l * l;
            }
            let mean = sum / n as f64;
            (mean, sum_sq / n as f64 - mean * mean)
        };

        let (mean, variance) = estimate(40_000, &mut sampler);
        // Survivors carry albedo / p, so the per-sample variance is a^2 (1/p - 1)
        let expected_variance = albedo * albedo * (1.0 / RR_CONTINUE_PROBABILITY as f64 - 1.0);
        let std_error = (expected_variance / 40_000.0).sqrt();
        assert!((mean - albedo).abs() < 5.0 * std_error, "mean {} std err {}", mean, std_error);
        assert!((variance - expected_variance).abs() < 0.1 * expected_variance, "variance {}", variance);

        // The error of the mean shrinks as the sample count grows
        let trials = 50;
        let spread = |n: usize, sampler: &mut RandomSampler| {
            (0..trials).map(|_| (estimate(n, sampler).0 - albedo).powi(2)).sum::<f64>() / trials as f64
        };
        let coarse = spread(100, &mut sampler);
        let fine = spread(1600, &mut sampler);
        assert!(fine < coarse / 4.0, "coarse {} fine {}", coarse, fine);
    }

    #[test]
    fn test_glass_sphere_conserves_energy() {
        let scene = single_sphere(Material::Dielectric {
            albedo: Color::ONE,
            ior: 1.5,
        });
        let integrator = uniform_background();
        let mut sampler = RandomSampler::new(1, 99);

        let n = 4000;
        let mut sum = 0.0;
        for i in 0..n {
            // Spread the rays over the sphere's silhouette
            let x = (i % 63) as f32 / 63.0 * 1.6 - 0.8;
            let ray = Ray::new_simple(Vec3::new(x, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
            sum += integrator.radiance(&scene, &ray, 0, &mut sampler).x;
        }
        let mean = sum / n as f32;
        assert!(mean > 0.8 && mean < 1.05, "mean {}", mean);
    }

    fn cornell_job(width: u32, height: u32, spp: u32, seed: u64, kind: SamplerKind) -> RenderJob {
        let scene = Arc::new(cornell_box(SceneMask::ALL, 1.5).unwrap());
        let camera = Arc::new(cornell_camera().with_resolution(width, height).build().unwrap());
        let film = Arc::new(Film::new(width, height).unwrap());
        RenderJob::new(scene, camera, kind.create(spp, seed), film, seed)
    }

    #[test]
    fn test_render_is_deterministic_across_thread_counts() {
        let integrator = PathIntegrator::default();
        let render = |threads: usize| {
            let scheduler = Scheduler::with_threads(threads).unwrap();
            let job = cornell_job(40, 24, 2, 7, SamplerKind::Stratified);
            integrator.render(&scheduler, &job, 0).unwrap();
            integrator.render(&scheduler, &job, 1).unwrap();
            job.film.to_rgb_buffer()
        };

        let first = render(4);
        let second = render(4);
        let serial = render(1);
        assert_eq!(first, second);
        assert_eq!(first, serial);
        assert!(first.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_render_covers_every_pixel() {
        let scheduler = Scheduler::with_threads(3).unwrap();
        let job = cornell_job(37, 21, 3, 1, SamplerKind::Random);
        PathIntegrator::default().render(&scheduler, &job, 0).unwrap();

        for y in 0..21 {
            for x in 0..37 {
                assert_eq!(job.film.pixel(x, y).unwrap().samples, 3);
            }
        }

        let stats = scheduler.merge_worker_thread_stats().unwrap();
        assert_eq!(stats.camera_rays, 37 * 21 * 3);
        assert_eq!(stats.tiles_rendered, 3 * 2);
    }

    #[test]
    fn test_different_passes_use_different_samples() {
        assert_ne!(tile_seed(1, 0, UVec2::ZERO), tile_seed(1, 1, UVec2::ZERO));
        assert_ne!(tile_seed(1, 0, UVec2::new(1, 0)), tile_seed(1, 0, UVec2::new(0, 1)));
        assert_ne!(tile_seed(1, 0, UVec2::ZERO), tile_seed(2, 0, UVec2::ZERO));
        assert_eq!(tile_seed(5, 3, UVec2::new(2, 9)), tile_seed(5, 3, UVec2::new(2, 9)));
    }

    #[test]
    fn test_film_mismatch_rejected() {
        let scheduler = Scheduler::new();
        let mut job = cornell_job(16, 16, 1, 0, SamplerKind::Random);
        job.film = Arc::new(Film::new(8, 8).unwrap());
        assert!(matches!(
            PathIntegrator::default().render(&scheduler, &job, 0),
            Err(RenderError::FilmMismatch { .. })
        ));
    }
}
