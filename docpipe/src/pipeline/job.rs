//! Request and work-unit models for the pipeline.
//!
//! Every call to [`Pipeline::submit`](super::Pipeline::submit) creates a
//! [`RequestId`] and a result channel. The sending half travels through the
//! stages inside a [`FetchUnit`] and then a [`TransformUnit`]; the receiving
//! half is returned to the caller as a [`PendingResult`].

use super::error::RequestError;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Global counter for generating unique request IDs.
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a request in the pipeline.
///
/// Request IDs are monotonically increasing and unique within a process
/// lifetime. They carry no meaning beyond log correlation; two requests for
/// the same key get distinct IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Creates a new unique request ID.
    pub fn new() -> Self {
        Self(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Outcome delivered to a request's caller.
pub type RequestResult<R> = Result<R, RequestError>;

/// Creates a linked sender/receiver pair for one request.
pub(crate) fn result_channel<R>(id: RequestId) -> (ResultSender<R>, PendingResult<R>) {
    let (tx, rx) = oneshot::channel();
    (ResultSender { id, tx }, PendingResult { id, rx })
}

/// Single-assignment half of a request's result handle.
///
/// `resolve` consumes the sender, so a request can only ever be resolved
/// once.
pub struct ResultSender<R> {
    id: RequestId,
    tx: oneshot::Sender<RequestResult<R>>,
}

impl<R> ResultSender<R> {
    /// Delivers the final outcome to the caller.
    ///
    /// Returns `false` if the caller already dropped its [`PendingResult`].
    pub fn resolve(self, result: RequestResult<R>) -> bool {
        self.tx.send(result).is_ok()
    }

    /// Returns true if the caller is no longer waiting for this result.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    #[inline]
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl<R> std::fmt::Debug for ResultSender<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSender")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Caller-side half of a request's result handle.
///
/// Await it from async code, or call [`wait_blocking`](Self::wait_blocking)
/// from a plain thread. Dropping it tells the pipeline the caller lost
/// interest; stages skip work for requests nobody is waiting on.
#[must_use = "a pending result does nothing unless awaited or waited on"]
pub struct PendingResult<R> {
    id: RequestId,
    rx: oneshot::Receiver<RequestResult<R>>,
}

impl<R> PendingResult<R> {
    #[inline]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Blocks the current thread until the request resolves.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn wait_blocking(self) -> RequestResult<R> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(RequestError::Abandoned))
    }
}

impl<R> Future for PendingResult<R> {
    type Output = RequestResult<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(RequestError::Abandoned)))
    }
}

impl<R> std::fmt::Debug for PendingResult<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResult")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// A request waiting for, or undergoing, the fetch stage.
pub struct FetchUnit<R> {
    pub id: RequestId,
    pub key: String,
    pub result: ResultSender<R>,
    pub submitted_at: Instant,
}

impl<R> FetchUnit<R> {
    pub fn new(key: String, result: ResultSender<R>) -> Self {
        Self {
            id: result.id(),
            key,
            result,
            submitted_at: Instant::now(),
        }
    }

    /// Time since the request was submitted.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.submitted_at.elapsed()
    }

    /// Converts this unit into the transform stage's unit once its content
    /// has been fetched.
    pub fn into_transform<C>(self, content: C) -> TransformUnit<C, R> {
        TransformUnit {
            id: self.id,
            key: self.key,
            content,
            result: self.result,
            submitted_at: self.submitted_at,
        }
    }
}

impl<R> std::fmt::Debug for FetchUnit<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchUnit")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("submitted_at", &self.submitted_at)
            .finish()
    }
}

/// A request whose content has been fetched and awaits the transform stage.
pub struct TransformUnit<C, R> {
    pub id: RequestId,
    pub key: String,
    pub content: C,
    pub result: ResultSender<R>,
    pub submitted_at: Instant,
}

impl<C, R> std::fmt::Debug for TransformUnit<C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformUnit")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("content", &"<fetched content>")
            .field("submitted_at", &self.submitted_at)
            .finish()
    }
}
