//! CLI runner for common setup and operations.
//!
//! Encapsulates logging initialization, runtime creation and pipeline
//! configuration to reduce duplication across command handlers.

use crate::error::CliError;
use docpipe::logging::{default_log_file, init_logging, LoggingGuard};
use docpipe::pipeline::{
    Fetcher, Pipeline, PipelineConfig, PipelineStats, StageStats, Transformer,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::info;

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub log_dir: PathBuf,
    pub verbose: bool,
    pub idle_interval_ms: u64,
    pub idle_polls: u32,
}

impl GlobalOptions {
    /// Idle policy applied to both stages.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, CliError> {
        if self.idle_interval_ms == 0 {
            return Err(CliError::Config(
                "--idle-interval-ms must be greater than zero".to_string(),
            ));
        }
        Ok(PipelineConfig::with_idle_policy(
            Duration::from_millis(self.idle_interval_ms),
            self.idle_polls,
        ))
    }
}

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    runtime: Runtime,
    config: PipelineConfig,
}

impl CliRunner {
    /// Initializes logging and starts the multi-threaded runtime that hosts
    /// the pipeline's stage workers.
    pub fn new(options: &GlobalOptions) -> Result<Self, CliError> {
        let config = options.pipeline_config()?;

        let logging_guard = init_logging(&options.log_dir, default_log_file(), options.verbose)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("docpipe-worker")
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            logging_guard,
            runtime,
            config,
        })
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("docpipe v{}", docpipe::VERSION);
        info!(
            command = command,
            idle_grace_ms = self.config.fetch.idle_grace().as_millis() as u64,
            "docpipe CLI starting"
        );
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Builds a pipeline whose workers run on this runner's runtime.
    pub fn create_pipeline<F, T>(
        &self,
        fetcher: F,
        transformer: T,
    ) -> Result<Pipeline<F, T>, CliError>
    where
        F: Fetcher,
        T: Transformer<Content = F::Content>,
    {
        Pipeline::builder()
            .fetcher(fetcher)
            .transformer(transformer)
            .config(self.config)
            .runtime(self.runtime.handle().clone())
            .build()
            .map_err(CliError::from)
            .inspect(|_| info!("Pipeline created"))
    }
}

/// Prints per-stage counters.
pub fn print_stats(stats: &PipelineStats) {
    println!("Submitted: {}", stats.submitted);
    print_stage("Fetch", &stats.fetch);
    print_stage("Transform", &stats.transform);
}

fn print_stage(name: &str, stage: &StageStats) {
    println!(
        "  {:<10} completed={} failed={} skipped={} rejected={} workers={}",
        name,
        stage.completed,
        stage.failed,
        stage.skipped,
        stage.rejected,
        stage.workers_started
    );
}
