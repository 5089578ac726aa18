//! Tessera renderer - BVH accelerated CPU path tracing.
//!
//! A Monte Carlo path tracer split into tiles that a small thread pool
//! renders in parallel:
//!
//! - **Geometry**: spheres and triangles over shared meshes, gathered by a
//!   [`SceneBuilder`] into an immutable [`Scene`] with a flat [`Bvh`]
//! - **Scheduling**: [`Scheduler`] runs parallel loops on `N - 1` workers
//!   plus the calling thread
//! - **Integration**: [`PathIntegrator`] renders a [`RenderJob`] tile by
//!   tile into a shared [`Film`]
//! - **Output**: averaged RGB buffers and PPM files
//!
//! # Example
//!
//! ```ignore
//! let scene = Arc::new(cornell_box(SceneMask::ALL, 1.5)?);
//! let camera = Arc::new(cornell_camera().with_resolution(320, 240).build()?);
//! let film = Arc::new(Film::new(320, 240)?);
//! let job = RenderJob::new(scene, camera, SamplerKind::Random.create(16, 0), film.clone(), 0);
//!
//! let scheduler = Scheduler::with_threads(0)?;
//! PathIntegrator::default().render(&scheduler, &job, 0)?;
//! film.write_ppm("render.ppm")?;
//! ```

mod bvh;
mod camera;
mod config;
mod film;
mod integrator;
mod material;
mod mesh;
mod ppm;
mod progressive;
mod sampler;
mod scene;
mod scenes;
mod scheduler;
mod shape;
mod sphere;
mod stats;
mod tiles;
mod triangle;

pub use bvh::{Bvh, BvhError, BvhHit, BvhNode, DEFAULT_BVH_SEED, TRIANGLES_IN_LEAF};
pub use camera::{Camera, CameraError};
pub use config::RenderConfig;
pub use film::{Film, FilmError, FilmPixel, FilmTile};
pub use integrator::{
    tile_seed, IntegratorSettings, PathIntegrator, RenderError, RenderJob, DIELECTRIC_SPLIT_DEPTH, MAX_PATH_DEPTH,
    RR_CONTINUE_PROBABILITY, RR_START_DEPTH,
};
pub use material::{cosine_sample_hemisphere, reflect, refract, schlick, Color, Material};
pub use mesh::{triangulate, MeshError, TriangleMesh};
pub use ppm::{read_ppm, to_byte, write_ppm, PpmError, PpmImage, GAMMA};
pub use progressive::ProgressiveRender;
pub use sampler::{CameraSample, RandomSampler, Sampler, SamplerKind, StratifiedSampler, STRATA_PER_AXIS};
pub use scene::{Scene, SceneBuilder, SceneError, SurfaceInteraction};
pub use scenes::{cornell_box, cornell_camera, random_triangles, ParseSceneMaskError, SceneMask};
pub use scheduler::{Scheduler, SchedulerError};
pub use shape::{intersect_linear, Shape, RAY_EPSILON};
pub use sphere::Sphere;
pub use stats::{take_thread_stats, RenderStats};
pub use tiles::{TileGrid, TILE_SIZE};
pub use triangle::{Triangle, PARALLEL_EPSILON};

/// Re-export Vec3 and common math types from tessera_math
pub use tessera_math::{Aabb, Bounds2, Interval, Ray, UVec2, Vec2, Vec3};
