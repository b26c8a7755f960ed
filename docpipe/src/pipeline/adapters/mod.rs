//! Concrete backends for the pipeline traits.
//!
//! - [`HttpFetcher`] - Fetches pages over HTTP with `reqwest`
//! - [`HtmlParser`] - Parses HTML into an [`HtmlDocument`] with `scraper`

mod html;
mod http;

pub use html::{HtmlDocument, HtmlParser};
pub use http::{HttpFetcher, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
