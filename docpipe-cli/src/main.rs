//! docpipe CLI - Command-line interface
//!
//! This binary drives the docpipe library: `demo` runs the concurrency
//! harness with simulated backends, `fetch` downloads and parses real pages.

mod commands;
mod error;
mod runner;
mod simulated;

use clap::{Parser, Subcommand};
use docpipe::logging::default_log_dir;
use docpipe::pipeline::{DEFAULT_IDLE_POLL_INTERVAL, DEFAULT_IDLE_POLL_LIMIT};
use std::path::PathBuf;

use crate::commands::{demo, fetch};
use crate::runner::GlobalOptions;

#[derive(Parser)]
#[command(name = "docpipe")]
#[command(version = docpipe::VERSION)]
#[command(about = "Single-flight fetch/transform pipeline", long_about = None)]
struct Cli {
    /// Directory for the log file
    #[arg(long, global = true, default_value = default_log_dir())]
    log_dir: PathBuf,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// How long an idle worker waits for new work per poll
    #[arg(long, global = true, default_value_t = DEFAULT_IDLE_POLL_INTERVAL.as_millis() as u64)]
    idle_interval_ms: u64,

    /// Empty polls before an idle worker stops
    #[arg(long, global = true, default_value_t = DEFAULT_IDLE_POLL_LIMIT)]
    idle_polls: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit requests from many threads against simulated backends
    Demo {
        /// Number of requests, each submitted from its own thread
        #[arg(short = 'n', long, default_value = "50")]
        requests: usize,

        /// Upper bound for the random delay of each backend call
        #[arg(long, default_value = "100")]
        max_delay_ms: u64,

        /// Make every Kth fetch fail (0 disables)
        #[arg(long, default_value = "0")]
        fail_every: u64,
    },

    /// Fetch URLs and print a summary of each page
    Fetch {
        /// URLs to fetch, processed in order
        #[arg(required = true)]
        urls: Vec<String>,

        /// Per-request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    let options = GlobalOptions {
        log_dir: cli.log_dir,
        verbose: cli.verbose,
        idle_interval_ms: cli.idle_interval_ms,
        idle_polls: cli.idle_polls,
    };

    let result = match cli.command {
        Commands::Demo {
            requests,
            max_delay_ms,
            fail_every,
        } => demo::run(
            &options,
            demo::DemoArgs {
                requests,
                max_delay_ms,
                fail_every,
            },
        ),
        Commands::Fetch { urls, timeout_secs } => {
            fetch::run(&options, fetch::FetchArgs { urls, timeout_secs })
        }
    };

    if let Err(e) = result {
        e.exit();
    }
}
