//! Fetch command - download pages and summarize their HTML.

use docpipe::pipeline::adapters::{HtmlParser, HttpFetcher};
use tracing::warn;

use crate::error::CliError;
use crate::runner::{print_stats, CliRunner, GlobalOptions};

/// Arguments for the fetch command.
pub struct FetchArgs {
    pub urls: Vec<String>,
    pub timeout_secs: u64,
}

/// Run the fetch command.
pub fn run(options: &GlobalOptions, args: FetchArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(options)?;
    runner.log_startup("fetch");

    let fetcher = HttpFetcher::with_timeout(std::time::Duration::from_secs(args.timeout_secs))
        .map_err(CliError::HttpClient)?;
    let total = args.urls.len();

    let pipeline = runner.create_pipeline(fetcher, HtmlParser::new())?;
    let pending: Vec<_> = args
        .urls
        .iter()
        .map(|url| (url.clone(), pipeline.submit(url.as_str())))
        .collect();

    let mut failed = 0;
    runner.runtime().block_on(async {
        for (url, result) in pending {
            match result.await {
                Ok(page) => {
                    println!("{}", url);
                    println!("  Title: {}", page.title.as_deref().unwrap_or("(none)"));
                    println!("  Links: {}", page.links.len());
                    println!("  Text:  {} bytes", page.text_length);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Request failed");
                    println!("{}", url);
                    println!("  Error: {}", e);
                    failed += 1;
                }
            }
        }
    });

    println!();
    print_stats(&pipeline.stats());
    pipeline.shutdown();

    if failed > 0 {
        return Err(CliError::RequestsFailed { failed, total });
    }
    Ok(())
}
