//! Demo command - drive the pipeline from many OS threads with simulated
//! backends and verify that neither backend ever ran concurrently.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use docpipe::pipeline::RequestError;
use tracing::info;

use crate::error::CliError;
use crate::runner::{print_stats, CliRunner, GlobalOptions};
use crate::simulated::{OverlapDetector, SimulatedParser, SimulatedWebClient};

/// Arguments for the demo command.
pub struct DemoArgs {
    pub requests: usize,
    pub max_delay_ms: u64,
    pub fail_every: u64,
}

/// Run the demo command.
pub fn run(options: &GlobalOptions, args: DemoArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(options)?;
    runner.log_startup("demo");

    let fetch_detector = Arc::new(OverlapDetector::default());
    let parse_detector = Arc::new(OverlapDetector::default());
    let pipeline = runner.create_pipeline(
        SimulatedWebClient::new(
            Arc::clone(&fetch_detector),
            args.max_delay_ms,
            args.fail_every,
        ),
        SimulatedParser::new(Arc::clone(&parse_detector), args.max_delay_ms),
    )?;

    println!(
        "Submitting {} requests from {} threads (max delay {} ms)...",
        args.requests, args.requests, args.max_delay_ms
    );
    let start = Instant::now();

    let threads = (0..args.requests)
        .map(|i| {
            let pipeline = pipeline.clone();
            thread::Builder::new()
                .name(format!("client-{}", i))
                .spawn(move || {
                    let pending = pipeline.submit(i.to_string());
                    let id = pending.id();
                    let result = pending.wait_blocking();
                    match &result {
                        Ok(text) => println!("{} {:>4} -> {}", id, i, text),
                        Err(e) => println!("{} {:>4} -> error: {}", id, i, e),
                    }
                    result
                })
                .map_err(CliError::Runtime)
        })
        .collect::<Result<Vec<_>, CliError>>()?;

    let mut failed = 0;
    let mut unexpected = 0;
    for handle in threads {
        match handle.join() {
            Ok(Ok(_)) => {}
            Ok(Err(RequestError::Fetch { .. })) => failed += 1,
            Ok(Err(_)) | Err(_) => unexpected += 1,
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("Finished in {:.2}s", elapsed.as_secs_f64());
    print_stats(&pipeline.stats());
    println!(
        "  Simulated failures: {}, unexpected errors: {}",
        failed, unexpected
    );
    info!(
        requests = args.requests,
        failed = failed,
        unexpected = unexpected,
        elapsed_ms = elapsed.as_millis() as u64,
        "Demo finished"
    );

    pipeline.shutdown();

    let fetch_violations = fetch_detector.violations();
    let parse_violations = parse_detector.violations();
    if fetch_violations > 0 || parse_violations > 0 {
        return Err(CliError::ParallelInvocation {
            fetch: fetch_violations,
            transform: parse_violations,
        });
    }
    if unexpected > 0 {
        return Err(CliError::RequestsFailed {
            failed: unexpected,
            total: args.requests,
        });
    }

    println!("No parallel backend calls observed");
    Ok(())
}
