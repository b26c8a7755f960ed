//! Pipeline configuration.
//!
//! Only the worker idle policy is tunable. It controls how long an idle
//! stage worker lingers before shutting itself down; it has no effect on
//! correctness.

use std::time::Duration;

// =============================================================================
// Configuration Constants
// =============================================================================

/// Default wait between idle polls of an empty stage queue.
pub const DEFAULT_IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default number of consecutive empty polls before a worker exits.
pub const DEFAULT_IDLE_POLL_LIMIT: u32 = 100;

// =============================================================================
// Stage Configuration
// =============================================================================

/// Idle policy for a single stage worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageConfig {
    /// How long the worker waits for new work before counting an idle poll.
    ///
    /// An enqueue wakes the worker before the interval elapses.
    pub idle_poll_interval: Duration,

    /// Consecutive empty polls after which the worker exits.
    pub idle_poll_limit: u32,
}

impl StageConfig {
    pub fn new(idle_poll_interval: Duration, idle_poll_limit: u32) -> Self {
        Self {
            idle_poll_interval,
            idle_poll_limit,
        }
    }

    /// Approximate time an idle worker stays alive.
    pub fn idle_grace(&self) -> Duration {
        self.idle_poll_interval.saturating_mul(self.idle_poll_limit)
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_POLL_INTERVAL, DEFAULT_IDLE_POLL_LIMIT)
    }
}

// =============================================================================
// Pipeline Configuration
// =============================================================================

/// Configuration for both pipeline stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    pub fetch: StageConfig,
    pub transform: StageConfig,
}

impl PipelineConfig {
    /// Applies the same idle policy to both stages.
    pub fn with_idle_policy(idle_poll_interval: Duration, idle_poll_limit: u32) -> Self {
        let stage = StageConfig::new(idle_poll_interval, idle_poll_limit);
        Self {
            fetch: stage,
            transform: stage,
        }
    }
}
