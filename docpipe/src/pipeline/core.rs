//! Pipeline facade: wires the fetch runner into the transform runner.
//!
//! [`Pipeline`] is the public entry point. It owns both stage runners and
//! exposes [`submit`](Pipeline::submit), which returns immediately with a
//! [`PendingResult`]. Workers for either stage are started on demand as a
//! side effect of submission and shut down again when idle.

use super::config::PipelineConfig;
use super::context::{Fetcher, Transformer};
use super::error::{PipelineError, RequestError};
use super::executor::{BlockingExecutor, TokioExecutor};
use super::job::{result_channel, FetchUnit, PendingResult, RequestId};
use super::runner::StageRunner;
use super::stages::{FetchStage, TransformStage};
use super::stats::PipelineStats;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

/// Two-stage fetch/transform pipeline with single-flight stages.
///
/// At most one fetch and one transform run at any instant, but the fetch of
/// one request may overlap the transform of another. `Pipeline` is cheap to
/// clone; all clones share the same stages.
///
/// # Example
///
/// ```ignore
/// use docpipe::pipeline::Pipeline;
/// use docpipe::pipeline::adapters::{HtmlParser, HttpFetcher};
///
/// let pipeline = Pipeline::new(HttpFetcher::new()?, HtmlParser::new())?;
/// let document = pipeline.submit("https://example.com").await?;
/// println!("{:?}", document.title);
/// ```
pub struct Pipeline<F, T, X = TokioExecutor>
where
    F: Fetcher,
    T: Transformer<Content = F::Content>,
    X: BlockingExecutor,
{
    fetch: Arc<StageRunner<FetchStage<F, T, X>>>,
    transform: Arc<StageRunner<TransformStage<T, X>>>,
    submitted: Arc<AtomicU64>,
    shutdown: CancellationToken,
}

impl<F, T> Pipeline<F, T, TokioExecutor>
where
    F: Fetcher,
    T: Transformer<Content = F::Content>,
{
    /// Creates a pipeline with default configuration on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoRuntime`] when called outside a Tokio
    /// runtime. Use [`PipelineBuilder::runtime`] to construct from a plain
    /// thread.
    pub fn new(fetcher: F, transformer: T) -> Result<Self, PipelineError> {
        PipelineBuilder::new()
            .fetcher(fetcher)
            .transformer(transformer)
            .build()
    }

    /// Returns a builder for configuring a pipeline.
    pub fn builder() -> PipelineBuilder<F, T, TokioExecutor> {
        PipelineBuilder::new()
    }
}

impl<F, T, X> Pipeline<F, T, X>
where
    F: Fetcher,
    T: Transformer<Content = F::Content>,
    X: BlockingExecutor,
{
    /// Submits a request for `key` and returns a handle to its result.
    ///
    /// Never blocks and may be called from any thread. The returned
    /// [`PendingResult`] resolves with the transformer's output, or with the
    /// first error that occurred for this request.
    pub fn submit(&self, key: impl Into<String>) -> PendingResult<T::Output> {
        let key = key.into();
        let (sender, pending) = result_channel(RequestId::new());
        self.submitted.fetch_add(1, Ordering::Relaxed);

        if self.shutdown.is_cancelled() {
            trace!(request_id = %pending.id(), key = %key, "Rejected: pipeline shut down");
            sender.resolve(Err(RequestError::Shutdown));
            return pending;
        }

        trace!(request_id = %pending.id(), key = %key, "Request submitted");
        self.fetch.submit(FetchUnit::new(key, sender));
        pending
    }

    /// Returns a snapshot of pipeline statistics.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            fetch: self.fetch.stats(),
            transform: self.transform.stats(),
        }
    }

    /// Stops accepting work.
    ///
    /// Queued requests and any submitted afterwards resolve with
    /// [`RequestError::Shutdown`]. A backend call already in progress runs
    /// to completion. Idempotent.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Pipeline shutting down");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl<F, T, X> Clone for Pipeline<F, T, X>
where
    F: Fetcher,
    T: Transformer<Content = F::Content>,
    X: BlockingExecutor,
{
    fn clone(&self) -> Self {
        Self {
            fetch: Arc::clone(&self.fetch),
            transform: Arc::clone(&self.transform),
            submitted: Arc::clone(&self.submitted),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<F, T, X> std::fmt::Debug for Pipeline<F, T, X>
where
    F: Fetcher,
    T: Transformer<Content = F::Content>,
    X: BlockingExecutor,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stats", &self.stats())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Builder for [`Pipeline`].
///
/// Both backends are required. The executor defaults to [`TokioExecutor`],
/// the configuration to [`PipelineConfig::default`] and the runtime to the
/// one the builder is invoked from.
pub struct PipelineBuilder<F, T, X = TokioExecutor> {
    fetcher: Option<Arc<F>>,
    transformer: Option<Arc<T>>,
    executor: Arc<X>,
    config: PipelineConfig,
    runtime: Option<Handle>,
}

impl<F, T> PipelineBuilder<F, T, TokioExecutor> {
    pub fn new() -> Self {
        Self {
            fetcher: None,
            transformer: None,
            executor: Arc::new(TokioExecutor::new()),
            config: PipelineConfig::default(),
            runtime: None,
        }
    }
}

impl<F, T> Default for PipelineBuilder<F, T, TokioExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F, T, X> PipelineBuilder<F, T, X> {
    pub fn fetcher(mut self, fetcher: F) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Uses an already shared fetcher.
    pub fn shared_fetcher(mut self, fetcher: Arc<F>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn transformer(mut self, transformer: T) -> Self {
        self.transformer = Some(Arc::new(transformer));
        self
    }

    /// Uses an already shared transformer.
    pub fn shared_transformer(mut self, transformer: Arc<T>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Runtime that hosts the stage workers.
    ///
    /// Required when building from a thread that is not inside a Tokio
    /// runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Replaces the executor used for the transform stage.
    pub fn executor<Y>(self, executor: Y) -> PipelineBuilder<F, T, Y> {
        PipelineBuilder {
            fetcher: self.fetcher,
            transformer: self.transformer,
            executor: Arc::new(executor),
            config: self.config,
            runtime: self.runtime,
        }
    }
}

impl<F, T, X> PipelineBuilder<F, T, X>
where
    F: Fetcher,
    T: Transformer<Content = F::Content>,
    X: BlockingExecutor,
{
    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::MissingBackend`] if the fetcher or transformer was
    ///   not supplied
    /// - [`PipelineError::NoRuntime`] if no runtime was supplied and none is
    ///   current
    pub fn build(self) -> Result<Pipeline<F, T, X>, PipelineError> {
        let fetcher = self.fetcher.ok_or(PipelineError::MissingBackend("fetch"))?;
        let transformer = self
            .transformer
            .ok_or(PipelineError::MissingBackend("transform"))?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| PipelineError::NoRuntime(e.to_string()))?,
        };

        let shutdown = CancellationToken::new();
        let transform = StageRunner::new(
            TransformStage::new(transformer, self.executor),
            self.config.transform,
            runtime.clone(),
            shutdown.clone(),
        );
        let fetch = StageRunner::new(
            FetchStage::new(fetcher, Arc::clone(&transform)),
            self.config.fetch,
            runtime,
            shutdown.clone(),
        );

        info!(
            fetch_idle_grace_ms = self.config.fetch.idle_grace().as_millis() as u64,
            transform_idle_grace_ms = self.config.transform.idle_grace().as_millis() as u64,
            "Pipeline created"
        );

        Ok(Pipeline {
            fetch,
            transform,
            submitted: Arc::new(AtomicU64::new(0)),
            shutdown,
        })
    }
}
