//! Error types for the fetch/transform pipeline.
//!
//! Errors are split by scope: [`PipelineError`] is raised once at
//! construction time, while [`RequestError`] is delivered to a single
//! request's [`PendingResult`](super::PendingResult) and never affects other
//! requests or the worker loops.

use super::runner::StageKind;
use std::any::Any;
use thiserror::Error;

/// Errors that prevent a pipeline from being constructed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required backend was not supplied to the builder
    #[error("missing {0} backend")]
    MissingBackend(&'static str),

    /// No Tokio runtime is available to host the stage workers
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}

/// Error returned by a [`Fetcher`](super::Fetcher) backend.
///
/// The pipeline does not interpret fetch failures; the message is carried
/// through to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error returned by a [`Transformer`](super::Transformer) backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransformError {
    pub message: String,
}

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Terminal failure of a single request.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// The fetch backend failed for this request's key
    #[error("fetch failed for {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: FetchError,
    },

    /// The transform backend rejected the fetched content
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    /// A backend panicked while handling this request
    #[error("{stage} stage panicked: {message}")]
    Panicked { stage: StageKind, message: String },

    /// The pipeline was shut down before the request completed
    #[error("pipeline shut down before request completed")]
    Shutdown,

    /// The result handle was dropped without being resolved
    #[error("request abandoned before completion")]
    Abandoned,
}

impl RequestError {
    /// Returns the stage the failure originated in, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            RequestError::Fetch { .. } => Some(StageKind::Fetch),
            RequestError::Transform(_) => Some(StageKind::Transform),
            RequestError::Panicked { stage, .. } => Some(*stage),
            RequestError::Shutdown | RequestError::Abandoned => None,
        }
    }
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
