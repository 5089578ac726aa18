//! Background progressive rendering.
//!
//! [`ProgressiveRender`] moves a [`Scheduler`] onto a dedicated thread that
//! renders pass after pass into the job's film. Every pass takes one sample
//! per pixel (one per stratum for the stratified sampler) and the stop flag
//! is checked between passes, so stopping waits for at most one sample of
//! every pixel.

use crate::integrator::{PathIntegrator, RenderError, RenderJob};
use crate::scheduler::{Scheduler, SchedulerError};
use crate::Film;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct ProgressiveRender {
    stop: Arc<AtomicBool>,
    passes: Arc<AtomicU32>,
    film: Arc<Film>,
    handle: Option<JoinHandle<Result<Scheduler, (Scheduler, RenderError)>>>,
}

impl ProgressiveRender {
    /// Start rendering passes of `job` until stopped, or until `max_passes`
    /// passes have completed.
    ///
    /// The job's sampler only selects the sampler kind; its sample count is
    /// replaced by a single sample per pass. An invalid job is rejected here,
    /// before the render thread exists.
    pub fn start(
        scheduler: Scheduler,
        integrator: PathIntegrator,
        mut job: RenderJob,
        max_passes: Option<u32>,
    ) -> Result<Self, RenderError> {
        job.validate()?;
        job.sampler = Arc::from(job.sampler.with_samples_per_pixel(1));

        let stop = Arc::new(AtomicBool::new(false));
        let passes = Arc::new(AtomicU32::new(0));
        let film = Arc::clone(&job.film);

        let handle = {
            let stop = Arc::clone(&stop);
            let passes = Arc::clone(&passes);
            thread::Builder::new()
                .name("tessera-render".into())
                .spawn(move || {
                    let mut pass = 0;
                    while !stop.load(Ordering::Acquire) && max_passes.map_or(true, |max| pass < max) {
                        if let Err(err) = integrator.render(&scheduler, &job, pass) {
                            return Err((scheduler, err));
                        }
                        pass += 1;
                        passes.store(pass, Ordering::Release);
                        log::debug!("Progressive pass {} complete", pass);
                    }
                    // This thread submitted every loop, so fold its counters in here
                    if let Err(err) = scheduler.merge_worker_thread_stats() {
                        log::warn!("Failed to merge render statistics: {}", err);
                    }
                    Ok(scheduler)
                })
                .map_err(SchedulerError::Spawn)?
        };

        Ok(Self {
            stop,
            passes,
            film,
            handle: Some(handle),
        })
    }

    /// Passes fully merged into the film so far.
    pub fn passes_completed(&self) -> u32 {
        self.passes.load(Ordering::Acquire)
    }

    /// Film being rendered into; safe to read while passes run.
    pub fn film(&self) -> &Arc<Film> {
        &self.film
    }

    /// Whether the render thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Ask the render thread to exit after the current pass, join it, and
    /// hand the scheduler back.
    pub fn stop(mut self) -> Result<Scheduler, RenderError> {
        self.stop.store(true, Ordering::Release);
        self.join()
    }

    /// Wait for the pass limit to be reached without requesting a stop.
    pub fn wait(mut self) -> Result<Scheduler, RenderError> {
        self.join()
    }

    fn join(&mut self) -> Result<Scheduler, RenderError> {
        let handle = self.handle.take().ok_or(RenderError::RenderThreadPanicked)?;
        match handle.join() {
            Ok(Ok(scheduler)) => {
                log::info!("Progressive render stopped after {} passes", self.passes_completed());
                Ok(scheduler)
            }
            Ok(Err((_scheduler, err))) => Err(err),
            Err(_) => Err(RenderError::RenderThreadPanicked),
        }
    }
}

impl Drop for ProgressiveRender {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop.store(true, Ordering::Release);
            if let Err(err) = self.join() {
                log::error!("Progressive render ended with error: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::SamplerKind;
    use crate::scenes::{cornell_box, cornell_camera, SceneMask};
    use std::time::Duration;

    fn job(width: u32, height: u32, seed: u64) -> RenderJob {
        let scene = Arc::new(cornell_box(SceneMask::ALL, 1.5).unwrap());
        let camera = Arc::new(cornell_camera().with_resolution(width, height).build().unwrap());
        let film = Arc::new(Film::new(width, height).unwrap());
        RenderJob::new(scene, camera, SamplerKind::Random.create(1, seed), film, seed)
    }

    #[test]
    fn test_pass_limit() {
        let scheduler = Scheduler::with_threads(3).unwrap();
        let job = job(24, 16, 5);
        let film = Arc::clone(&job.film);

        let render = ProgressiveRender::start(scheduler, PathIntegrator::default(), job, Some(3)).unwrap();
        let scheduler = render.wait().unwrap();

        assert_eq!(scheduler.thread_count(), 3);
        assert_eq!(film.sample_count(), 3 * 24 * 16);
        assert_eq!(film.pixel(10, 10).unwrap().samples, 3);
    }

    #[test]
    fn test_stop_between_passes() {
        let scheduler = Scheduler::with_threads(2).unwrap();
        let render = ProgressiveRender::start(scheduler, PathIntegrator::default(), job(16, 16, 1), None).unwrap();

        while render.passes_completed() < 2 {
            thread::sleep(Duration::from_millis(1));
        }
        let film = Arc::clone(render.film());
        assert!(!render.is_finished());

        let scheduler = render.stop().unwrap();
        // Only whole passes ever reach the film
        let samples = film.sample_count();
        assert!(samples >= 2 * 256);
        assert_eq!(samples % 256, 0);
        assert_eq!(scheduler.thread_count(), 2);
    }

    #[test]
    fn test_matches_direct_passes() {
        let integrator = PathIntegrator::default();

        let direct = job(20, 12, 42);
        let scheduler = Scheduler::with_threads(2).unwrap();
        integrator.render(&scheduler, &direct, 0).unwrap();
        integrator.render(&scheduler, &direct, 1).unwrap();

        let progressive = job(20, 12, 42);
        let film = Arc::clone(&progressive.film);
        let render = ProgressiveRender::start(scheduler, integrator, progressive, Some(2)).unwrap();
        render.wait().unwrap();

        assert_eq!(film.to_rgb_buffer(), direct.film.to_rgb_buffer());
    }

    #[test]
    fn test_invalid_job_rejected_before_start() {
        let mut bad = job(16, 16, 0);
        bad.film = Arc::new(Film::new(4, 4).unwrap());
        let film = Arc::clone(&bad.film);

        let started = ProgressiveRender::start(Scheduler::new(), PathIntegrator::default(), bad, None);
        assert!(matches!(started, Err(RenderError::FilmMismatch { .. })));
        assert_eq!(film.sample_count(), 0);
    }

    #[test]
    fn test_each_pass_is_one_sample() {
        let pass_samples = |kind: SamplerKind, spp: u32| {
            let scene = Arc::new(cornell_box(SceneMask::ALL, 1.5).unwrap());
            let camera = Arc::new(cornell_camera().with_resolution(16, 8).build().unwrap());
            let film = Arc::new(Film::new(16, 8).unwrap());
            let job = RenderJob::new(scene, camera, kind.create(spp, 3), Arc::clone(&film), 3);

            let render =
                ProgressiveRender::start(Scheduler::with_threads(2).unwrap(), PathIntegrator::default(), job, Some(1))
                    .unwrap();
            render.wait().unwrap();
            (film.pixel(5, 5).unwrap().samples, film.sample_count())
        };

        assert_eq!(pass_samples(SamplerKind::Random, 16), (1, 16 * 8));
        assert_eq!(pass_samples(SamplerKind::Stratified, 16), (4, 4 * 16 * 8));
    }
}
