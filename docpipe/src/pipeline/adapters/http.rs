//! HTTP fetcher backed by `reqwest`.

use crate::pipeline::error::FetchError;
use crate::pipeline::Fetcher;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("docpipe/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout used by [`HttpFetcher::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches the body of a URL as text.
///
/// Non-success status codes are reported as [`FetchError`]s; the body of an
/// error response is discarded.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with [`DEFAULT_TIMEOUT`].
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a fetcher with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| FetchError::new(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wraps an existing client, e.g. one with a proxy configured.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher").finish_non_exhaustive()
    }
}

impl Fetcher for HttpFetcher {
    type Content = String;

    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        trace!(url = url, "HTTP GET request starting");

        let response = match self.client.get(url).send().await {
            Ok(resp) => {
                debug!(
                    url = url,
                    status = resp.status().as_u16(),
                    "HTTP response received"
                );
                resp
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    is_request = e.is_request(),
                    "HTTP request failed"
                );
                return Err(FetchError::new(format!("request failed: {}", e)));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(format!("HTTP {} from {}", status, url)));
        }

        match response.text().await {
            Ok(body) => {
                trace!(url = url, bytes = body.len(), "HTTP response body read");
                Ok(body)
            }
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read response body");
                Err(FetchError::new(format!("failed to read response: {}", e)))
            }
        }
    }
}
