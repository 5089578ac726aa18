//! Thread pool with a shared list of parallel loops.
//!
//! A [`Scheduler`] owns `N - 1` worker threads. Loops submitted through
//! [`Scheduler::parallel_for`] are pushed to the front of a shared work list;
//! every thread (the workers and the submitting thread itself) claims the next
//! unclaimed chunk of indices from the first loop that still has work, runs
//! the callback with the lock released, then re-acquires the lock to report
//! completion.
//!
//! A loop is finished only when every index has been claimed *and* no thread
//! is still running one of its chunks. Both counters live behind the single
//! work-list mutex, and completion is always checked while holding it.

use crate::stats::{self, RenderStats};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tessera_math::UVec2;
use thiserror::Error;

/// Errors reported by the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("cannot merge worker statistics while {0} parallel loop(s) are in flight")]
    LoopsInFlight(usize),
}

type LoopFn = Arc<dyn Fn(usize) + Send + Sync>;
type PanicPayload = Box<dyn Any + Send + 'static>;

/// One pending `parallel_for`.
struct ParallelLoop {
    id: u64,
    func: LoopFn,
    next_index: usize,
    max_index: usize,
    chunk_size: usize,
    active_workers: usize,
    panic: Option<PanicPayload>,
}

impl ParallelLoop {
    fn has_work(&self) -> bool {
        self.next_index < self.max_index
    }

    fn finished(&self) -> bool {
        self.next_index >= self.max_index && self.active_workers == 0
    }

    /// Claim the next contiguous chunk. Caller holds the work-list lock.
    fn claim(&mut self) -> Chunk {
        let start = self.next_index;
        let end = (start + self.chunk_size).min(self.max_index);
        self.next_index = end;
        self.active_workers += 1;
        Chunk {
            loop_id: self.id,
            func: Arc::clone(&self.func),
            start,
            end,
        }
    }
}

/// A claimed index range, run without holding the lock.
struct Chunk {
    loop_id: u64,
    func: LoopFn,
    start: usize,
    end: usize,
}

impl Chunk {
    /// Run every index, consuming the chunk so its callback handle is
    /// released before completion is reported.
    fn run(self) -> Option<PanicPayload> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            for index in self.start..self.end {
                (self.func)(index);
            }
        }))
        .err()
    }
}

#[derive(Default)]
struct WorkList {
    /// Front is the most recently submitted loop.
    loops: VecDeque<ParallelLoop>,
    next_loop_id: u64,
    shutdown: bool,
    /// Bumped once per stats merge; workers report when theirs lags behind.
    stats_generation: u64,
    pending_reporters: usize,
}

impl WorkList {
    fn find(&mut self, id: u64) -> Option<&mut ParallelLoop> {
        self.loops.iter_mut().find(|l| l.id == id)
    }

    /// Record that a chunk finished. Returns true if its loop is now done.
    fn complete(&mut self, loop_id: u64, panic: Option<PanicPayload>) -> bool {
        let Some(entry) = self.find(loop_id) else {
            return false;
        };
        entry.active_workers -= 1;
        if entry.panic.is_none() {
            entry.panic = panic;
        }
        entry.finished()
    }
}

struct Shared {
    work: Mutex<WorkList>,
    /// Signalled when loops are pushed, make progress, or on shutdown.
    work_cond: Condvar,
    /// Signalled when the last worker has reported its statistics.
    report_done: Condvar,
    stats: Mutex<RenderStats>,
}

impl Shared {
    fn lock_work(&self) -> MutexGuard<'_, WorkList> {
        self.work.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_work<'a>(&self, guard: MutexGuard<'a, WorkList>) -> MutexGuard<'a, WorkList> {
        self.work_cond.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    fn add_stats(&self, thread_stats: RenderStats) {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) += thread_stats;
    }
}

/// Fixed-size thread pool; the calling thread participates in every loop.
///
/// Dropping the scheduler shuts the pool down.
pub struct Scheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    initialized: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create an uninitialized scheduler. Until [`Scheduler::init`] is
    /// called every loop runs serially on the caller.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                work: Mutex::new(WorkList::default()),
                work_cond: Condvar::new(),
                report_done: Condvar::new(),
                stats: Mutex::new(RenderStats::default()),
            }),
            workers: Vec::new(),
            initialized: false,
        }
    }

    /// Create and start a scheduler using `thread_count` threads in total
    /// (0 means one per hardware thread).
    pub fn with_threads(thread_count: usize) -> Result<Self, SchedulerError> {
        let mut scheduler = Self::new();
        scheduler.init(thread_count)?;
        Ok(scheduler)
    }

    /// Number of hardware threads, at least 1.
    pub fn hardware_concurrency() -> usize {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }

    /// Spawn `thread_count - 1` workers (0 means one per hardware thread).
    ///
    /// Initializing twice is logged and ignored.
    pub fn init(&mut self, thread_count: usize) -> Result<(), SchedulerError> {
        if self.initialized {
            log::error!("Scheduler already initialized with {} threads; ignoring", self.thread_count());
            return Ok(());
        }

        let thread_count = if thread_count == 0 {
            Self::hardware_concurrency()
        } else {
            thread_count
        };

        // Workers from an earlier init may have left the generation non-zero
        let generation = self.shared.lock_work().stats_generation;
        for index in 0..thread_count - 1 {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("tessera-worker-{}", index))
                .spawn(move || worker_loop(shared, index, generation));
            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(err) => {
                    self.join_workers();
                    return Err(SchedulerError::Spawn(err));
                }
            }
        }

        self.initialized = true;
        log::info!("Scheduler started with {} threads ({} workers)", thread_count, self.workers.len());
        Ok(())
    }

    /// Stop and join every worker. No-op when nothing was started.
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        self.join_workers();
        self.initialized = false;
        log::debug!("Scheduler shut down");
    }

    fn join_workers(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.shared.lock_work().shutdown = true;
        self.shared.work_cond.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Scheduler worker thread panicked");
            }
        }
        self.shared.lock_work().shutdown = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Threads taking part in a loop: the workers plus the caller.
    pub fn thread_count(&self) -> usize {
        self.workers.len() + 1
    }

    /// Call `func(i)` exactly once for every `i` in `0..count`.
    ///
    /// Indices are handed out in chunks of `chunk_size` (at least 1). The
    /// calling thread works on the loop too and returns once every chunk has
    /// completed. If a callback panics the loop still runs to completion and
    /// the panic is then resumed on the calling thread.
    pub fn parallel_for<F>(&self, func: F, count: usize, chunk_size: usize)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let chunk_size = chunk_size.max(1);
        if self.workers.is_empty() || count < chunk_size {
            for index in 0..count {
                func(index);
            }
            return;
        }

        let mut work = self.shared.lock_work();
        let id = work.next_loop_id;
        work.next_loop_id += 1;
        work.loops.push_front(ParallelLoop {
            id,
            func: Arc::new(func),
            next_index: 0,
            max_index: count,
            chunk_size,
            active_workers: 0,
            panic: None,
        });
        self.shared.work_cond.notify_all();

        loop {
            let Some(entry) = work.find(id) else {
                break;
            };

            if entry.finished() {
                let panic = entry.panic.take();
                work.loops.retain(|l| l.id != id);
                drop(work);
                if let Some(payload) = panic {
                    panic::resume_unwind(payload);
                }
                return;
            }

            if entry.has_work() {
                let chunk = entry.claim();
                drop(work);
                let panic = chunk.run();
                work = self.shared.lock_work();
                work.complete(id, panic);
            } else {
                // Remaining chunks are running elsewhere
                work = self.shared.wait_work(work);
            }
        }
    }

    /// Call `func(p)` once for every `p` in `[0, count.x) x [0, count.y)`,
    /// one index per chunk. Index `i` maps to `(i % count.x, i / count.x)`.
    pub fn parallel_for_2d<F>(&self, func: F, count: UVec2)
    where
        F: Fn(UVec2) + Send + Sync + 'static,
    {
        let width = count.x;
        let total = count.x as usize * count.y as usize;
        self.parallel_for(
            move |i| {
                let i = i as u32;
                func(UVec2::new(i % width, i / width))
            },
            total,
            1,
        );
    }

    /// Fold every thread's statistics into the shared total and return it.
    ///
    /// Blocks until each worker has reported. Must not run while a loop is
    /// in flight; that is checked under the work-list lock.
    pub fn merge_worker_thread_stats(&self) -> Result<RenderStats, SchedulerError> {
        let mut work = self.shared.lock_work();
        if !work.loops.is_empty() {
            return Err(SchedulerError::LoopsInFlight(work.loops.len()));
        }

        if !self.workers.is_empty() {
            work.stats_generation += 1;
            work.pending_reporters = self.workers.len();
            self.shared.work_cond.notify_all();
            while work.pending_reporters > 0 {
                work = self
                    .shared
                    .report_done
                    .wait(work)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
        drop(work);

        self.shared.add_stats(stats::take_thread_stats());
        Ok(self.stats())
    }

    /// Statistics merged so far.
    pub fn stats(&self) -> RenderStats {
        *self.shared.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the merged statistics.
    pub fn reset_stats(&self) {
        *self.shared.stats.lock().unwrap_or_else(PoisonError::into_inner) = RenderStats::default();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<Shared>, index: usize, mut reported_generation: u64) {
    log::debug!("Worker {} started", index);
    let mut work = shared.lock_work();

    loop {
        if work.shutdown {
            break;
        }

        if work.stats_generation != reported_generation {
            reported_generation = work.stats_generation;
            shared.add_stats(stats::take_thread_stats());
            work.pending_reporters -= 1;
            if work.pending_reporters == 0 {
                shared.report_done.notify_all();
            }
            continue;
        }

        let claimed = work
            .loops
            .iter_mut()
            .find(|l| l.has_work())
            .map(ParallelLoop::claim);
        let Some(chunk) = claimed else {
            work = shared.wait_work(work);
            continue;
        };

        drop(work);
        let loop_id = chunk.loop_id;
        let panic = chunk.run();
        work = shared.lock_work();
        if work.complete(loop_id, panic) {
            shared.work_cond.notify_all();
        }
    }

    log::debug!("Worker {} exiting", index);
}
