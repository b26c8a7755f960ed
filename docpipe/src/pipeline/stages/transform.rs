//! Transform stage - turns fetched content into the caller's result.
//!
//! The transformer is synchronous and usually CPU-bound, so each call is
//! moved onto the [`BlockingExecutor`]. The stage worker awaits the call
//! before taking the next unit, which keeps transform single-flight.

use crate::pipeline::error::RequestError;
use crate::pipeline::executor::{BlockingExecutor, ExecutorError};
use crate::pipeline::job::TransformUnit;
use crate::pipeline::runner::{Stage, StageKind};
use crate::pipeline::stats::StageOutcome;
use crate::pipeline::Transformer;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Final pipeline stage: resolves each request's result handle.
pub(crate) struct TransformStage<T, X>
where
    T: Transformer,
    X: BlockingExecutor,
{
    transformer: Arc<T>,
    executor: Arc<X>,
}

impl<T, X> TransformStage<T, X>
where
    T: Transformer,
    X: BlockingExecutor,
{
    pub(crate) fn new(transformer: Arc<T>, executor: Arc<X>) -> Self {
        Self {
            transformer,
            executor,
        }
    }
}

impl<T, X> Stage for TransformStage<T, X>
where
    T: Transformer,
    X: BlockingExecutor,
{
    type Item = TransformUnit<T::Content, T::Output>;

    const KIND: StageKind = StageKind::Transform;

    async fn process(&self, unit: Self::Item) -> StageOutcome {
        let TransformUnit {
            id,
            key,
            content,
            result,
            submitted_at,
        } = unit;

        if result.is_closed() {
            debug!(request_id = %id, key = %key, "Caller dropped request, skipping transform");
            return StageOutcome::Skipped;
        }

        let started = Instant::now();
        let transformer = Arc::clone(&self.transformer);
        let transformed = self
            .executor
            .execute_blocking(move || transformer.transform(content))
            .await;

        match transformed {
            Ok(Ok(output)) => {
                debug!(
                    request_id = %id,
                    key = %key,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    total_ms = submitted_at.elapsed().as_millis() as u64,
                    "Transform stage complete"
                );
                result.resolve(Ok(output));
                StageOutcome::Completed
            }
            Ok(Err(e)) => {
                warn!(request_id = %id, key = %key, error = %e, "Transform failed");
                result.resolve(Err(RequestError::Transform(e)));
                StageOutcome::Failed
            }
            Err(ExecutorError::TaskPanicked(message)) => {
                error!(request_id = %id, key = %key, panic = %message, "Transformer panicked");
                result.resolve(Err(RequestError::Panicked {
                    stage: StageKind::Transform,
                    message,
                }));
                StageOutcome::Failed
            }
            Err(ExecutorError::Shutdown) => {
                result.resolve(Err(RequestError::Shutdown));
                StageOutcome::Rejected
            }
        }
    }

    fn reject(&self, unit: Self::Item, error: RequestError) {
        unit.result.resolve(Err(error));
    }
}
