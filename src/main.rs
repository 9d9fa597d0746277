//! # Talk Transcripts
//!
//! A crawler for a public talk-listing site. It walks the paginated talk
//! list, visits every talk, and writes one JSON record per talk holding its
//! metadata, topics, and transcripts, either in one language or in every
//! language the talk is translated into.
//!
//! ## Usage
//!
//! ```sh
//! talk_transcripts crawl
//! talk_transcripts discover --output pages.txt
//! talk_transcripts languages
//! ```
//!
//! ## Architecture
//!
//! The crawl follows a pipeline:
//! 1. **Discovery**: follow "next" links from the first listing page
//! 2. **Listing**: read each page's talk links, titles and posted dates
//! 3. **Aggregation**: fetch each talk's topics and transcripts
//! 4. **Output**: write `<title>.json` (or `al-<title>.json`) per talk
//!
//! A halted crawl writes the pages it did not finish to
//! `<output_dir>/resume-pages.txt`; pass that file back with
//! `crawl --page-list` to resume.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod crawl;
mod error;
mod extract;
mod fetch;
mod models;
mod outputs;
mod retry;
mod scrapers;
mod utils;

use cli::{Cli, Command};
use config::CrawlConfig;
use crawl::{CrawlOrchestrator, CrawlSummary};
use fetch::HttpFetcher;
use models::CrawlProgress;
use outputs::json::JsonDirStore;
use outputs::page_list::{read_page_list, save_resume_list, write_page_list};
use retry::RetryFetch;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("talk_transcripts starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = CrawlConfig::load(args.config.as_deref()).await?;
    args.apply(&mut config);
    info!(
        base_url = %config.base_url,
        mode = ?config.mode,
        output_dir = %config.output_dir,
        "Configuration ready"
    );

    let fetcher = RetryFetch::from_config(HttpFetcher::new(&config)?, &config.retry);
    let orchestrator = CrawlOrchestrator::new(&config, fetcher)?;

    match &args.command {
        Command::Crawl { page_list, talks } => {
            let store = JsonDirStore::open(&config.output_dir).await?;
            let mut progress = CrawlProgress::new();

            let outcome = if !talks.is_empty() {
                orchestrator.run_talks(talks, &store, &mut progress).await
            } else {
                let pages = match page_list {
                    Some(path) => Some(read_page_list(path).await?),
                    None => None,
                };
                orchestrator.run(pages, &store, &mut progress).await
            };

            match outcome {
                Ok(summary) => report(&summary),
                Err(failure) => {
                    match save_resume_list(store.dir(), &failure.remaining_pages).await {
                        Ok(Some(path)) => info!(
                            path = %path.display(),
                            "Resume with: crawl --page-list {}",
                            path.display()
                        ),
                        Ok(None) => {}
                        Err(e) => error!(error = %e, "Failed to write resume list"),
                    }
                    return Err(failure.into());
                }
            }
        }
        Command::Discover { output } => {
            let pages = orchestrator.discover_pages().await?;
            match output {
                Some(path) => write_page_list(path, &pages).await?,
                None => pages.iter().for_each(|p| println!("{p}")),
            }
            info!(count = pages.len(), "Discovery complete");
        }
        Command::Languages => {
            for language in orchestrator.languages().await? {
                let count = language
                    .talk_count
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".into());
                println!("{}\t{}\t{}", language.code, language.name, count);
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

fn report(summary: &CrawlSummary) {
    for (url, reason) in &summary.failed_talks {
        error!(%url, %reason, "Talk skipped");
    }
    info!(
        pages = summary.pages,
        talks = summary.talks,
        written = summary.records_written,
        failed = summary.failed_talks.len(),
        "Crawl summary"
    );
}
