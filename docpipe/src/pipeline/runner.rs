//! Stage runner: one lazily started worker per stage.
//!
//! A [`StageRunner`] owns a [`StageQueue`] and a [`Stage`] implementation.
//! Submitting an item never blocks. The submit that claims an idle stage
//! spawns the worker loop on the pipeline's runtime; the loop drains the
//! queue one item at a time and exits after the configured number of empty
//! polls. Because the stage is claimed by at most one loop at a time, the
//! stage's backend is never invoked concurrently with itself.
//!
//! # Worker states
//!
//! ```text
//!            submit claims stage
//!   IDLE ─────────────────────────► DRAINING ──┐ pop → process → complete
//!    ▲                                 │  ▲    │
//!    │      release() == true          │  └────┘
//!    └─────────────────────────────────┘
//!          (idle polls exhausted, or shutdown drained)
//! ```

use super::config::StageConfig;
use super::error::{panic_message, RequestError};
use super::queue::StageQueue;
use super::stats::{StageCounters, StageOutcome, StageStats};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Identifies a pipeline stage in logs, stats and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Fetch,
    Transform,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Fetch => "fetch",
            StageKind::Transform => "transform",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-item behaviour of a pipeline stage.
///
/// `process` owns the item and is responsible for either handing it to the
/// next stage or resolving its result handle.
pub(crate) trait Stage: Send + Sync + 'static {
    type Item: Send + 'static;

    const KIND: StageKind;

    /// Runs the stage's backend for one item.
    fn process(&self, item: Self::Item) -> impl Future<Output = StageOutcome> + Send;

    /// Fails an item without running the backend.
    fn reject(&self, item: Self::Item, error: RequestError);
}

/// Queue plus lazily managed worker for a single stage.
pub(crate) struct StageRunner<S: Stage> {
    stage: S,
    queue: StageQueue<S::Item>,
    config: StageConfig,
    counters: StageCounters,
    runtime: Handle,
    shutdown: CancellationToken,
}

impl<S: Stage> StageRunner<S> {
    pub(crate) fn new(
        stage: S,
        config: StageConfig,
        runtime: Handle,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            stage,
            queue: StageQueue::new(),
            config,
            counters: StageCounters::default(),
            runtime,
            shutdown,
        })
    }

    /// Enqueues an item, starting a worker if the stage is idle.
    pub(crate) fn submit(self: &Arc<Self>, item: S::Item) {
        if self.queue.push(item) {
            self.spawn_worker();
        } else {
            trace!(stage = %S::KIND, pending = self.queue.pending(), "Item queued");
        }
    }

    pub(crate) fn stats(&self) -> StageStats {
        self.counters.snapshot(self.queue.pending(), self.queue.is_claimed())
    }

    fn spawn_worker(self: &Arc<Self>) {
        self.counters.worker_started();
        let runner = Arc::clone(self);
        self.runtime.spawn(runner.run_worker());
    }

    async fn run_worker(self: Arc<Self>) {
        debug!(
            stage = %S::KIND,
            pending = self.queue.pending(),
            "Stage worker started"
        );

        let mut idle_polls: u32 = 0;
        loop {
            if self.shutdown.is_cancelled() {
                self.reject_queued();
                if self.queue.release() {
                    break;
                }
                continue;
            }

            if let Some(item) = self.queue.pop() {
                idle_polls = 0;
                self.process_item(item).await;
                continue;
            }

            if idle_polls >= self.config.idle_poll_limit {
                if self.queue.release() {
                    break;
                }
                // Work arrived while releasing; the slot is ours again.
                idle_polls = 0;
                continue;
            }

            idle_polls += 1;
            tokio::select! {
                _ = self.shutdown.cancelled() => {}
                _ = self.queue.wait_for_work(self.config.idle_poll_interval) => {}
            }
        }

        self.counters.worker_stopped();
        debug!(stage = %S::KIND, "Stage worker stopped");
    }

    async fn process_item(&self, item: S::Item) {
        let outcome = match AssertUnwindSafe(self.stage.process(item)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!(
                    stage = %S::KIND,
                    panic = %panic_message(payload.as_ref()),
                    "Stage processing panicked"
                );
                StageOutcome::Failed
            }
        };
        self.counters.record(outcome);
        self.queue.complete();
    }

    fn reject_queued(&self) {
        while let Some(item) = self.queue.pop() {
            self.stage.reject(item, RequestError::Shutdown);
            self.counters.record(StageOutcome::Rejected);
            self.queue.complete();
        }
    }
}
