//! Per-thread render statistics.
//!
//! Counters are bumped on the hot path without any synchronization: each
//! thread owns its own copy in a thread-local. The scheduler folds every
//! worker's copy into a shared total when asked to merge
//! (see [`crate::Scheduler::merge_worker_thread_stats`]).

use std::cell::Cell;
use std::fmt;
use std::ops::AddAssign;

/// Counters collected while rendering.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub camera_rays: u64,
    pub bvh_nodes_visited: u64,
    pub triangle_tests: u64,
    pub sphere_tests: u64,
    pub tiles_rendered: u64,
}

impl AddAssign for RenderStats {
    fn add_assign(&mut self, rhs: Self) {
        self.camera_rays += rhs.camera_rays;
        self.bvh_nodes_visited += rhs.bvh_nodes_visited;
        self.triangle_tests += rhs.triangle_tests;
        self.sphere_tests += rhs.sphere_tests;
        self.tiles_rendered += rhs.tiles_rendered;
    }
}

impl fmt::Display for RenderStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} camera rays, {} tiles, {} BVH nodes, {} triangle tests, {} sphere tests",
            self.camera_rays,
            self.tiles_rendered,
            self.bvh_nodes_visited,
            self.triangle_tests,
            self.sphere_tests
        )
    }
}

thread_local! {
    static THREAD_STATS: Cell<RenderStats> = Cell::new(RenderStats::default());
}

/// Update this thread's counters.
#[inline]
pub(crate) fn record(update: impl FnOnce(&mut RenderStats)) {
    THREAD_STATS.with(|cell| {
        let mut stats = cell.get();
        update(&mut stats);
        cell.set(stats);
    });
}

/// Return this thread's counters and reset them to zero.
pub fn take_thread_stats() -> RenderStats {
    THREAD_STATS.with(|cell| cell.take())
}
