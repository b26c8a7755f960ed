//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use docpipe::pipeline::{FetchError, PipelineError};
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Failed to start the async runtime or client threads
    Runtime(std::io::Error),
    /// Invalid command-line arguments
    Config(String),
    /// Failed to build the pipeline
    Pipeline(PipelineError),
    /// Failed to create the HTTP client
    HttpClient(FetchError),
    /// A backend was invoked while another call to it was still running
    ParallelInvocation { fetch: usize, transform: usize },
    /// Some requests did not produce a result
    RequestsFailed { failed: usize, total: usize },
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ParallelInvocation { .. } => 2,
            CliError::RequestsFailed { .. } => 3,
            _ => 1,
        }
    }

    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::ParallelInvocation { .. } = self {
            eprintln!();
            eprintln!("A stage ran its backend concurrently with itself.");
            eprintln!("Re-run with --verbose and check the log for overlapping request ids.");
        }

        process::exit(self.exit_code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start threads: {}", e),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Pipeline(e) => write!(f, "Failed to create pipeline: {}", e),
            CliError::HttpClient(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::ParallelInvocation { fetch, transform } => write!(
                f,
                "Parallel invocation detected ({} fetch, {} transform)",
                fetch, transform
            ),
            CliError::RequestsFailed { failed, total } => {
                write!(f, "{} of {} requests failed", failed, total)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Runtime(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
            CliError::HttpClient(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}
