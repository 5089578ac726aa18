//! `tessera` - render the built-in Cornell box from the command line.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tessera_renderer::{
    cornell_box, cornell_camera, Film, IntegratorSettings, PathIntegrator, ProgressiveRender, RenderConfig, RenderJob,
    SamplerKind, SceneMask, Scheduler,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SamplerArg {
    Random,
    Stratified,
}

impl From<SamplerArg> for SamplerKind {
    fn from(arg: SamplerArg) -> Self {
        match arg {
            SamplerArg::Random => SamplerKind::Random,
            SamplerArg::Stratified => SamplerKind::Stratified,
        }
    }
}

/// Flags override values loaded from `--config`.
#[derive(Debug, Parser)]
#[command(version, about = "BVH path tracer rendering a Cornell box")]
struct Args {
    /// JSON render configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Samples per pixel; when rendering progressively, the pass limit
    #[arg(short, long)]
    spp: Option<u32>,

    #[arg(long, value_enum)]
    sampler: Option<SamplerArg>,

    #[arg(long)]
    seed: Option<u64>,

    /// Total threads, 0 for one per core
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Index of refraction of the glass sphere
    #[arg(long)]
    ior: Option<f32>,

    /// Scene groups, e.g. `walls,light,spheres,mesh` or `all`
    #[arg(long)]
    scene: Option<SceneMask>,

    /// Background radiance as `r,g,b`
    #[arg(long, value_delimiter = ',', num_args = 3)]
    background: Option<Vec<f32>>,

    /// Output image (.ppm, or any format the image crate writes)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Render progressively, one sample per pixel per pass, for this many
    /// passes (overrides --spp)
    #[arg(long)]
    passes: Option<u32>,

    /// Render progressively for at most this many seconds
    #[arg(long)]
    seconds: Option<f32>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

impl Args {
    fn resolve_config(&self) -> Result<RenderConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path).with_context(|| format!("Failed to open config {}", path.display()))?;
                serde_json::from_reader(BufReader::new(file))
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => RenderConfig::default(),
        };

        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(spp) = self.spp {
            config.samples_per_pixel = spp;
        }
        if let Some(sampler) = self.sampler {
            config.sampler = sampler.into();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(ior) = self.ior {
            config.ior = ior;
        }
        if let Some(scene) = self.scene {
            config.scene = scene;
        }
        if let Some(background) = &self.background {
            config.background = [background[0], background[1], background[2]];
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        Ok(config)
    }

    fn progressive(&self) -> bool {
        self.passes.is_some() || self.seconds.is_some()
    }

    /// Pass limit in progressive mode: `--passes`, else the sample count.
    fn pass_limit(&self, config: &RenderConfig) -> u32 {
        self.passes.unwrap_or(config.samples_per_pixel)
    }
}

fn render_deadline(seconds: f32) -> Result<Duration> {
    Duration::try_from_secs_f32(seconds.max(0.0)).with_context(|| format!("Invalid --seconds value {}", seconds))
}

fn write_image(film: &Film, path: &Path) -> Result<()> {
    let is_ppm = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ppm"));
    if is_ppm {
        film.write_ppm(path)?;
        return Ok(());
    }

    let image = image::RgbImage::from_raw(film.width(), film.height(), film.to_rgb8())
        .context("Film buffer does not match its dimensions")?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {}x{} image to {}", film.width(), film.height(), path.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.resolve_config()?;
    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    log::info!("Starting tessera: scene [{}], {}x{}", config.scene, config.width, config.height);

    let start = Instant::now();
    let scene = Arc::new(cornell_box(config.scene, config.ior).context("Failed to build scene")?);
    let camera = Arc::new(
        cornell_camera()
            .with_resolution(config.width, config.height)
            .build()
            .context("Invalid camera settings")?,
    );
    let film = Arc::new(Film::new(config.width, config.height)?);
    log::info!("Scene ready in {:.2?}", start.elapsed());

    let sampler = config.sampler.create(config.samples_per_pixel, config.seed);
    let job = RenderJob::new(scene, camera, sampler, Arc::clone(&film), config.seed);
    let integrator = PathIntegrator::new(IntegratorSettings {
        background: config.background_color(),
    });
    let scheduler = Scheduler::with_threads(config.threads).context("Failed to start render threads")?;

    let deadline = args.seconds.map(render_deadline).transpose()?;

    let start = Instant::now();
    let scheduler = if args.progressive() {
        let render = ProgressiveRender::start(scheduler, integrator, job, Some(args.pass_limit(&config)))?;
        if let Some(deadline) = deadline {
            while start.elapsed() < deadline && !render.is_finished() {
                thread::sleep(Duration::from_millis(50));
            }
            render.stop()?
        } else {
            render.wait()?
        }
    } else {
        integrator.render(&scheduler, &job, 0)?;
        scheduler
    };
    log::info!("Rendered in {:.2?}", start.elapsed());

    let stats = scheduler.merge_worker_thread_stats()?;
    log::info!("Stats: {}", stats);

    write_image(&film, &config.output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_deadline() {
        assert_eq!(render_deadline(1.5).unwrap(), Duration::from_millis(1500));
        assert_eq!(render_deadline(-3.0).unwrap(), Duration::ZERO);
        assert!(render_deadline(f32::INFINITY).is_err());
    }

    #[test]
    fn test_progressive_pass_limit() {
        let config = RenderConfig::default();

        let args = Args::parse_from(["tessera", "--seconds", "2", "--spp", "8"]);
        assert!(args.progressive());
        assert_eq!(args.pass_limit(&args.resolve_config().unwrap()), 8);

        let args = Args::parse_from(["tessera", "--passes", "3", "--spp", "8"]);
        assert_eq!(args.pass_limit(&config), 3);

        let args = Args::parse_from(["tessera"]);
        assert!(!args.progressive());
    }
}
