//! docpipe - single-flight fetch/transform pipeline
//!
//! This library retrieves documents by key and transforms them into
//! structured results through two serial stages. Callers on any thread
//! submit keys and receive a handle to the eventual result; the pipeline
//! guarantees that neither backend is ever invoked concurrently with itself.
//!
//! # High-Level API
//!
//! ```ignore
//! use docpipe::pipeline::Pipeline;
//! use docpipe::pipeline::adapters::{HtmlParser, HttpFetcher};
//!
//! let pipeline = Pipeline::new(HttpFetcher::new()?, HtmlParser::new())?;
//! let page = pipeline.submit("https://example.com").await?;
//! println!("{:?} ({} links)", page.title, page.links.len());
//! ```

pub mod logging;
pub mod pipeline;

pub use pipeline::{Pipeline, PipelineBuilder, PipelineConfig, RequestError};

/// Version of the docpipe library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
