//! Pipeline statistics.
//!
//! Counters are updated by the stage workers with relaxed atomics and read
//! as point-in-time snapshots. They are intended for monitoring and tests,
//! not for coordination.

use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of processing one item in a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Backend succeeded and the item was handed on
    Completed,
    /// Backend failed or panicked; the request was resolved with an error
    Failed,
    /// The caller dropped its result handle, so the backend was not called
    Skipped,
    /// The item was rejected because the pipeline is shutting down
    Rejected,
}

/// Live counters for one stage.
#[derive(Debug, Default)]
pub(crate) struct StageCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    rejected: AtomicU64,
    workers_started: AtomicU64,
    workers_stopped: AtomicU64,
}

impl StageCounters {
    pub(crate) fn record(&self, outcome: StageOutcome) {
        let counter = match outcome {
            StageOutcome::Completed => &self.completed,
            StageOutcome::Failed => &self.failed,
            StageOutcome::Skipped => &self.skipped,
            StageOutcome::Rejected => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn worker_started(&self) {
        self.workers_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn worker_stopped(&self) {
        self.workers_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, pending: usize, worker_active: bool) -> StageStats {
        StageStats {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            workers_started: self.workers_started.load(Ordering::Relaxed),
            workers_stopped: self.workers_stopped.load(Ordering::Relaxed),
            pending,
            worker_active,
        }
    }
}

/// Snapshot of one stage's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub rejected: u64,
    /// Worker loops spawned since the pipeline was created
    pub workers_started: u64,
    /// Worker loops that exited after going idle or draining on shutdown
    pub workers_stopped: u64,
    /// Items queued or in flight at snapshot time
    pub pending: usize,
    /// Whether a worker currently owns the stage
    pub worker_active: bool,
}

impl StageStats {
    /// Items that left the stage by any route.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed + self.skipped + self.rejected
    }
}

/// Snapshot of the whole pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Requests accepted through `submit`
    pub submitted: u64,
    pub fetch: StageStats,
    pub transform: StageStats,
}

impl PipelineStats {
    /// True when no request is queued or in flight in either stage.
    pub fn is_idle(&self) -> bool {
        self.fetch.pending == 0 && self.transform.pending == 0
    }
}
