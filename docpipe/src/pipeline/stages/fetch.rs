//! Fetch stage - retrieves raw content for each request key.
//!
//! This stage:
//! 1. Skips requests whose caller has already dropped the result handle
//! 2. Calls the [`Fetcher`] for the request key (the only suspension point
//!    in the pipeline expected to wait on I/O)
//! 3. Hands the content to the transform stage, or resolves the request
//!    with the fetch failure
//!
//! A failed fetch never reaches the transform stage.

use super::transform::TransformStage;
use crate::pipeline::error::{panic_message, RequestError};
use crate::pipeline::executor::BlockingExecutor;
use crate::pipeline::job::FetchUnit;
use crate::pipeline::runner::{Stage, StageKind, StageRunner};
use crate::pipeline::stats::StageOutcome;
use crate::pipeline::{Fetcher, Transformer};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// First pipeline stage: forwards fetched content to the transform runner.
pub(crate) struct FetchStage<F, T, X>
where
    F: Fetcher,
    T: Transformer<Content = F::Content>,
    X: BlockingExecutor,
{
    fetcher: Arc<F>,
    next: Arc<StageRunner<TransformStage<T, X>>>,
}

impl<F, T, X> FetchStage<F, T, X>
where
    F: Fetcher,
    T: Transformer<Content = F::Content>,
    X: BlockingExecutor,
{
    pub(crate) fn new(fetcher: Arc<F>, next: Arc<StageRunner<TransformStage<T, X>>>) -> Self {
        Self { fetcher, next }
    }
}

impl<F, T, X> Stage for FetchStage<F, T, X>
where
    F: Fetcher,
    T: Transformer<Content = F::Content>,
    X: BlockingExecutor,
{
    type Item = FetchUnit<T::Output>;

    const KIND: StageKind = StageKind::Fetch;

    async fn process(&self, unit: Self::Item) -> StageOutcome {
        if unit.result.is_closed() {
            debug!(
                request_id = %unit.id,
                key = %unit.key,
                "Caller dropped request, skipping fetch"
            );
            return StageOutcome::Skipped;
        }

        let started = Instant::now();
        let fetched = AssertUnwindSafe(self.fetcher.fetch(&unit.key)).catch_unwind().await;

        match fetched {
            Ok(Ok(content)) => {
                debug!(
                    request_id = %unit.id,
                    key = %unit.key,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    total_ms = unit.elapsed().as_millis() as u64,
                    "Fetch stage complete"
                );
                self.next.submit(unit.into_transform(content));
                StageOutcome::Completed
            }
            Ok(Err(e)) => {
                warn!(request_id = %unit.id, key = %unit.key, error = %e, "Fetch failed");
                unit.result.resolve(Err(RequestError::Fetch {
                    key: unit.key,
                    source: e,
                }));
                StageOutcome::Failed
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    request_id = %unit.id,
                    key = %unit.key,
                    panic = %message,
                    "Fetcher panicked"
                );
                unit.result.resolve(Err(RequestError::Panicked {
                    stage: StageKind::Fetch,
                    message,
                }));
                StageOutcome::Failed
            }
        }
    }

    fn reject(&self, unit: Self::Item, error: RequestError) {
        unit.result.resolve(Err(error));
    }
}
