//! Backend traits consumed by the pipeline.
//!
//! The pipeline is generic over two collaborators: a [`Fetcher`] that turns
//! a key into raw content, and a [`Transformer`] that turns raw content into
//! the caller-visible result. Neither is ever invoked concurrently with
//! itself by the pipeline, so implementations need not be reentrant-safe
//! beyond `Send + Sync`.

use super::error::{FetchError, TransformError};
use std::future::Future;
use std::sync::Arc;

/// Trait for async content fetchers.
///
/// Implementations typically perform network I/O. The returned future may
/// suspend for as long as it needs; the fetch stage waits for it before
/// starting the next fetch.
pub trait Fetcher: Send + Sync + 'static {
    /// Raw content produced by a successful fetch.
    type Content: Send + 'static;

    /// Fetches the content identified by `key`.
    ///
    /// # Arguments
    ///
    /// * `key` - Request key, e.g. a URL. Not validated by the pipeline.
    fn fetch(&self, key: &str) -> impl Future<Output = Result<Self::Content, FetchError>> + Send;
}

/// Trait for synchronous content transformers.
///
/// This is expected to be CPU-bound and is run on a
/// [`BlockingExecutor`](super::BlockingExecutor).
pub trait Transformer: Send + Sync + 'static {
    /// Input accepted by the transformer; matches the fetcher's content.
    type Content: Send + 'static;

    /// Structured result returned to the caller.
    type Output: Send + 'static;

    fn transform(&self, content: Self::Content) -> Result<Self::Output, TransformError>;
}

impl<F: Fetcher> Fetcher for Arc<F> {
    type Content = F::Content;

    fn fetch(&self, key: &str) -> impl Future<Output = Result<Self::Content, FetchError>> + Send {
        (**self).fetch(key)
    }
}

impl<T: Transformer> Transformer for Arc<T> {
    type Content = T::Content;
    type Output = T::Output;

    fn transform(&self, content: Self::Content) -> Result<Self::Output, TransformError> {
        (**self).transform(content)
    }
}
