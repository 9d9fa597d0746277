//! The crawl pipeline.
//!
//! [`CrawlOrchestrator::run`] drives the whole crawl:
//! 1. **Discovery**: the listing-page list, unless the caller supplies one
//! 2. **Listing**: each page's talks, in pagination order
//! 3. **Aggregation**: one [`crate::models::TalkRecord`] per talk, in document order
//! 4. **Output**: each record written once to a [`RecordStore`]
//!
//! Execution is sequential: one fetch in flight, one talk at a time. The only
//! tolerated failures are a single language's transcript (recorded empty) and,
//! with `keep_going`, a single talk. Anything else halts the run and comes back
//! as a [`CrawlFailure`] holding the progress snapshot and the pages still to
//! crawl, so the caller can resume from there.

use crate::config::CrawlConfig;
use crate::error::{CrawlError, Result};
use crate::extract::Extractor;
use crate::fetch::Fetch;
use crate::models::{CrawlProgress, LanguageInfo, TalkRef};
use crate::outputs::RecordStore;
use crate::scrapers::catalog::fetch_languages;
use crate::scrapers::listing::{PageListDiscoverer, fetch_listing};
use crate::scrapers::talk::{AggregateOptions, TalkAggregator};
use crate::utils::collection_date;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// Label used as the page URL when talks are crawled directly.
const DIRECT_TALKS: &str = "<direct talk list>";

/// Outcome of a completed crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    pub pages: usize,
    pub talks: usize,
    pub records_written: usize,
    /// Talks skipped under `keep_going`, with the error that stopped each.
    pub failed_talks: Vec<(String, String)>,
    pub elapsed: Duration,
}

/// Why and where a crawl halted.
#[derive(Debug, thiserror::Error)]
#[error("crawl halted at {progress} ({failing_url}) after {elapsed:?}: {error}")]
pub struct CrawlFailure {
    /// Progress at the moment of failure.
    pub progress: CrawlProgress,
    pub failing_url: String,
    pub elapsed: Duration,
    /// Listing pages from the failing one onward; empty when discovery failed.
    pub remaining_pages: Vec<String>,
    #[source]
    pub error: CrawlError,
}

/// Drives discovery, aggregation and persistence.
#[derive(Debug)]
pub struct CrawlOrchestrator<F> {
    fetcher: F,
    extractor: Extractor,
    options: AggregateOptions,
    base_url: String,
    catalog_url: String,
    max_pages: usize,
    keep_going: bool,
}

impl<F: Fetch> CrawlOrchestrator<F> {
    pub fn new(config: &CrawlConfig, fetcher: F) -> Result<Self> {
        Ok(Self {
            fetcher,
            extractor: Extractor::new(&config.selectors)?,
            options: AggregateOptions {
                mode: config.mode,
                language: config.language.clone(),
                time_label_policy: config.time_label_policy,
                drop_trailing_boilerplate: config.drop_trailing_boilerplate,
            },
            base_url: config.base_url.clone(),
            catalog_url: config.catalog_url.clone(),
            max_pages: config.max_pages,
            keep_going: config.keep_going,
        })
    }

    /// Walk pagination from the base listing URL.
    pub async fn discover_pages(&self) -> Result<Vec<String>> {
        PageListDiscoverer::new(&self.fetcher, &self.extractor, self.max_pages)
            .discover(&self.base_url)
            .await
    }

    /// The site-wide language catalog.
    pub async fn languages(&self) -> Result<Vec<LanguageInfo>> {
        fetch_languages(&self.fetcher, &self.extractor, &self.catalog_url).await
    }

    /// Crawl every talk on every listing page.
    ///
    /// With `page_list`, those pages are crawled as given and pagination is not
    /// walked; this is how a halted crawl resumes. `progress` is reset at the
    /// start and left at its final position.
    #[instrument(level = "info", skip_all, fields(base_url = %self.base_url))]
    pub async fn run<S: RecordStore>(
        &self,
        page_list: Option<Vec<String>>,
        store: &S,
        progress: &mut CrawlProgress,
    ) -> std::result::Result<CrawlSummary, CrawlFailure> {
        let started = Instant::now();
        progress.reset(0);

        let pages = match page_list {
            Some(pages) => {
                info!(count = pages.len(), "Using supplied page list");
                pages
            }
            None => {
                progress.attempt(&self.base_url);
                match self.discover_pages().await {
                    Ok(pages) => pages,
                    Err(e) => return Err(self.halt(e, progress, Vec::new(), started)),
                }
            }
        };

        progress.reset(pages.len());
        let aggregator =
            TalkAggregator::new(&self.fetcher, &self.extractor, &self.options, collection_date());
        let mut summary = CrawlSummary {
            pages: pages.len(),
            ..CrawlSummary::default()
        };

        for (i, page_url) in pages.iter().enumerate() {
            progress.begin_page(i + 1, page_url);
            info!(page = i + 1, total = pages.len(), url = %page_url, "[ PROGRESS ] page");

            let listing = match fetch_listing(&self.fetcher, &self.extractor, page_url).await {
                Ok(listing) => listing,
                Err(e) => return Err(self.halt(e, progress, pages[i..].to_vec(), started)),
            };
            info!(url = %listing.url, talks = listing.talks.len(), "Listing page read");

            if let Err(e) = self
                .crawl_talks(&aggregator, &listing.talks, store, progress, &mut summary)
                .await
            {
                return Err(self.halt(e, progress, pages[i..].to_vec(), started));
            }

            let spent = progress.finish_page();
            info!(
                minutes = %format!("{:.2}", spent.as_secs_f64() / 60.0),
                "[ TIME ] page done"
            );
        }

        summary.elapsed = started.elapsed();
        info!(
            pages = summary.pages,
            talks = summary.talks,
            written = summary.records_written,
            failed = summary.failed_talks.len(),
            elapsed_secs = summary.elapsed.as_secs(),
            "Crawl complete"
        );
        Ok(summary)
    }

    /// Crawl talks given by URL, reading their metadata from the talk pages.
    #[instrument(level = "info", skip_all, fields(count = talk_urls.len()))]
    pub async fn run_talks<S: RecordStore>(
        &self,
        talk_urls: &[String],
        store: &S,
        progress: &mut CrawlProgress,
    ) -> std::result::Result<CrawlSummary, CrawlFailure> {
        let started = Instant::now();
        progress.reset(1);
        progress.begin_page(1, DIRECT_TALKS);
        progress.set_talk_total(talk_urls.len());

        let aggregator =
            TalkAggregator::new(&self.fetcher, &self.extractor, &self.options, collection_date());
        let mut summary = CrawlSummary {
            pages: 1,
            ..CrawlSummary::default()
        };

        for (j, url) in talk_urls.iter().enumerate() {
            progress.begin_talk(j + 1, url);
            info!("  [{}/{}] Target URL: {}", j + 1, talk_urls.len(), url);
            summary.talks += 1;

            let outcome = match aggregator.build_from_url(url).await {
                Ok(record) => store.store(&record.file_name(), &record).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(_) => summary.records_written += 1,
                Err(e) if self.keep_going => {
                    warn!(%url, error = %e, "Talk failed; continuing");
                    summary.failed_talks.push((url.clone(), e.to_string()));
                }
                Err(e) => return Err(self.halt(e, progress, Vec::new(), started)),
            }
        }

        progress.finish_page();
        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    async fn crawl_talks<S: RecordStore>(
        &self,
        aggregator: &TalkAggregator<'_, F>,
        talks: &[TalkRef],
        store: &S,
        progress: &mut CrawlProgress,
        summary: &mut CrawlSummary,
    ) -> Result<()> {
        progress.set_talk_total(talks.len());

        for (j, talk) in talks.iter().enumerate() {
            progress.begin_talk(j + 1, &talk.url);
            info!("  [{}/{}] Target URL: {}", j + 1, talks.len(), talk.url);
            summary.talks += 1;

            let outcome = match aggregator.build(talk).await {
                Ok(record) => store.store(&record.file_name(), &record).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(_) => summary.records_written += 1,
                Err(e) if self.keep_going => {
                    warn!(url = %talk.url, error = %e, "Talk failed; continuing");
                    summary.failed_talks.push((talk.url.clone(), e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn halt(
        &self,
        error: CrawlError,
        progress: &CrawlProgress,
        remaining_pages: Vec<String>,
        started: Instant,
    ) -> CrawlFailure {
        let snapshot = progress.snapshot();
        let failing_url = error
            .url()
            .map(str::to_string)
            .unwrap_or_else(|| snapshot.last_url.clone());
        let elapsed = started.elapsed();
        error!(
            progress = %snapshot,
            page_url = %snapshot.current_page_url,
            %failing_url,
            minutes = %format!("{:.2}", elapsed.as_secs_f64() / 60.0),
            error = %error,
            "Crawl halted"
        );
        CrawlFailure {
            progress: snapshot,
            failing_url,
            elapsed,
            remaining_pages,
            error,
        }
    }
}
