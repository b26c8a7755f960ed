//! Two-stage fetch/transform pipeline.
//!
//! Requests are identified by a string key. Each request is fetched by a
//! [`Fetcher`], then transformed by a [`Transformer`], and the outcome is
//! delivered through the [`PendingResult`] returned from
//! [`Pipeline::submit`].
//!
//! # Architecture
//!
//! ```text
//! submit(key) → Fetch Queue → Fetch Worker → Transform Queue → Transform Worker → PendingResult
//!                                 │                                  │
//!                            Fetcher::fetch                  Transformer::transform
//!                             (async I/O)                     (blocking executor)
//! ```
//!
//! # Single-flight stages
//!
//! Each stage has at most one worker, so at most one fetch and at most one
//! transform are in flight at any instant. The two stages run independently:
//! request B can be fetched while request A is being transformed. Requests
//! pass through each stage in submission order.
//!
//! Workers are started by the first submission after an idle period and
//! exit after the stage has been empty for
//! [`StageConfig::idle_grace`]. See [`StageQueue`] for the claim protocol
//! that keeps start and stop race-free.
//!
//! # Key Components
//!
//! - [`Pipeline`] - Entry point; submit requests and read statistics
//! - [`PipelineBuilder`] - Configures backends, executor, idle policy, runtime
//! - [`Fetcher`] / [`Transformer`] - Backend traits
//! - [`PendingResult`] - Awaitable (or blocking) handle to a request's outcome
//! - [`RequestError`] - Per-request failure
//!
//! # Example
//!
//! ```ignore
//! use docpipe::pipeline::{Fetcher, FetchError, Pipeline, Transformer, TransformError};
//!
//! struct Echo;
//!
//! impl Fetcher for Echo {
//!     type Content = String;
//!     async fn fetch(&self, key: &str) -> Result<String, FetchError> {
//!         Ok(key.to_string())
//!     }
//! }
//!
//! struct Upper;
//!
//! impl Transformer for Upper {
//!     type Content = String;
//!     type Output = String;
//!     fn transform(&self, content: String) -> Result<String, TransformError> {
//!         Ok(content.to_uppercase())
//!     }
//! }
//!
//! let pipeline = Pipeline::new(Echo, Upper)?;
//! assert_eq!(pipeline.submit("a").await?, "A");
//! ```

pub mod adapters;
mod config;
mod context;
mod core;
mod error;
mod executor;
mod job;
mod queue;
mod runner;
mod stages;
mod stats;

pub use self::core::{Pipeline, PipelineBuilder};
pub use config::{
    PipelineConfig, StageConfig, DEFAULT_IDLE_POLL_INTERVAL, DEFAULT_IDLE_POLL_LIMIT,
};
pub use context::{Fetcher, Transformer};
pub use error::{FetchError, PipelineError, RequestError, TransformError};
pub use executor::{BlockingExecutor, ExecutorError, InlineExecutor, TokioExecutor};
pub use job::{PendingResult, RequestId, RequestResult, ResultSender};
pub use queue::StageQueue;
pub use runner::StageKind;
pub use stats::{PipelineStats, StageStats};
