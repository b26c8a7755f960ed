//! Executor abstraction for the CPU-bound transform stage.
//!
//! The transform backend is synchronous and may be expensive. Running it
//! directly inside the transform worker would stall a runtime thread, so the
//! stage hands it to a [`BlockingExecutor`] and awaits the result. The worker
//! still awaits each call before dequeuing the next item, so transform
//! remains single-flight.
//!
//! ```text
//! ┌─────────────────────┐
//! │  Transform Stage    │
//! └─────────┬───────────┘
//!           │ depends on
//!           ▼
//! ┌─────────────────────┐
//! │  BlockingExecutor   │
//! └─────────┬───────────┘
//!           │ implemented by
//!           ▼
//! ┌─────────────────────┐     ┌─────────────────────┐
//! │  TokioExecutor      │     │  InlineExecutor     │
//! │  (spawn_blocking)   │     │  (calling thread)   │
//! └─────────────────────┘     └─────────────────────┘
//! ```

use super::error::panic_message;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;

/// Trait for executing blocking (CPU-bound) work off the async runtime.
pub trait BlockingExecutor: Send + Sync + 'static {
    /// Executes a blocking closure and resolves with its return value.
    ///
    /// A panic inside the closure must surface as
    /// [`ExecutorError::TaskPanicked`] rather than unwinding into the caller.
    fn execute_blocking<F, R>(
        &self,
        f: F,
    ) -> Pin<Box<dyn Future<Output = Result<R, ExecutorError>> + Send>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static;
}

/// Errors that can occur during executor operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The closure panicked
    TaskPanicked(String),
    /// The runtime shut down before the closure completed
    Shutdown,
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorError::TaskPanicked(msg) => write!(f, "task panicked: {}", msg),
            ExecutorError::Shutdown => write!(f, "executor shut down"),
        }
    }
}

impl std::error::Error for ExecutorError {}

/// Tokio-based executor using the runtime's blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

impl TokioExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl BlockingExecutor for TokioExecutor {
    fn execute_blocking<F, R>(
        &self,
        f: F,
    ) -> Pin<Box<dyn Future<Output = Result<R, ExecutorError>> + Send>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        Box::pin(async move {
            tokio::task::spawn_blocking(f).await.map_err(|e| {
                if e.is_panic() {
                    ExecutorError::TaskPanicked(panic_message(e.into_panic().as_ref()))
                } else {
                    ExecutorError::Shutdown
                }
            })
        })
    }
}

/// Executor that runs work immediately on the calling thread.
///
/// Suitable for cheap transforms where a thread hop costs more than the work
/// itself, and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl BlockingExecutor for InlineExecutor {
    fn execute_blocking<F, R>(
        &self,
        f: F,
    ) -> Pin<Box<dyn Future<Output = Result<R, ExecutorError>> + Send>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let result = catch_unwind(AssertUnwindSafe(f))
            .map_err(|payload| ExecutorError::TaskPanicked(panic_message(payload.as_ref())));
        Box::pin(std::future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_error_display() {
        let err = ExecutorError::TaskPanicked("oops".to_string());
        assert_eq!(format!("{}", err), "task panicked: oops");

        let err = ExecutorError::Shutdown;
        assert_eq!(format!("{}", err), "executor shut down");
    }

    #[tokio::test]
    async fn test_tokio_executor_blocking() {
        let executor = TokioExecutor::new();

        let result = executor.execute_blocking(|| 42).await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_tokio_executor_reports_panic() {
        let executor = TokioExecutor::new();

        let result: Result<(), _> = executor
            .execute_blocking(|| panic!("transform blew up"))
            .await;

        assert_eq!(
            result,
            Err(ExecutorError::TaskPanicked("transform blew up".to_string()))
        );
    }

    #[test]
    fn test_inline_executor_blocking() {
        // This test doesn't need #[tokio::test]!
        let executor = InlineExecutor;

        let future = executor.execute_blocking(|| 42);

        let result = futures::executor::block_on(future);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_inline_executor_reports_panic() {
        let executor = InlineExecutor;

        let future = executor.execute_blocking(|| -> u32 { panic!("inline panic") });

        let result = futures::executor::block_on(future);
        assert!(matches!(result, Err(ExecutorError::TaskPanicked(msg)) if msg == "inline panic"));
    }
}
