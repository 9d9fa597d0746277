//! Talk-list pagination.
//!
//! The talk list is split over many listing pages, each linking to the next.
//! [`PageListDiscoverer`] walks that chain from the base URL and returns every
//! listing-page URL in order; [`fetch_listing`] reads the talks off one page.

use crate::error::{CrawlError, Result};
use crate::extract::Extractor;
use crate::fetch::Fetch;
use crate::models::ListingPage;
use std::collections::HashSet;
use tracing::{debug, info, instrument};
use url::Url;

/// Fetch one listing page and extract its talks and next link.
///
/// A page without any talk entry is a [`CrawlError::SchemaMismatch`].
#[instrument(level = "info", skip(fetcher, extractor))]
pub async fn fetch_listing<F: Fetch>(
    fetcher: &F,
    extractor: &Extractor,
    url: &str,
) -> Result<ListingPage> {
    let base = Url::parse(url).map_err(|e| CrawlError::Config(format!("bad URL {url}: {e}")))?;
    let doc = fetcher.fetch(url).await?;
    extractor.require_talk_list(&doc, url)?;
    let talks = extractor.talk_refs(&doc, &base);
    let next = extractor.next_page(&doc, &base);
    debug!(talks = talks.len(), next = ?next, "Parsed listing page");
    Ok(ListingPage {
        url: url.to_string(),
        talks,
        next,
    })
}

enum State {
    AtPage(String),
    Done,
}

/// Walks pagination links from the base listing URL.
#[derive(Debug)]
pub struct PageListDiscoverer<'a, F> {
    fetcher: &'a F,
    extractor: &'a Extractor,
    max_pages: usize,
}

impl<'a, F: Fetch> PageListDiscoverer<'a, F> {
    pub fn new(fetcher: &'a F, extractor: &'a Extractor, max_pages: usize) -> Self {
        Self {
            fetcher,
            extractor,
            max_pages,
        }
    }

    /// Every listing-page URL, starting with `base_url`, in pagination order.
    ///
    /// A page linking back to one already seen is a [`CrawlError::PaginationCycle`];
    /// a chain longer than `max_pages` is a [`CrawlError::PaginationLimit`].
    #[instrument(level = "info", skip(self))]
    pub async fn discover(&self, base_url: &str) -> Result<Vec<String>> {
        let mut pages = vec![base_url.to_string()];
        let mut seen: HashSet<String> = HashSet::from([base_url.to_string()]);
        let mut state = State::AtPage(base_url.to_string());

        while let State::AtPage(url) = state {
            let listing = fetch_listing(self.fetcher, self.extractor, &url).await?;
            state = match listing.next {
                Some(next) => {
                    if !seen.insert(next.clone()) {
                        return Err(CrawlError::PaginationCycle { url: next });
                    }
                    if pages.len() >= self.max_pages {
                        return Err(CrawlError::PaginationLimit {
                            limit: self.max_pages,
                        });
                    }
                    info!(page = pages.len() + 1, url = %next, "Found listing page");
                    pages.push(next.clone());
                    State::AtPage(next)
                }
                None => State::Done,
            };
        }

        info!(count = pages.len(), "Discovered listing pages");
        Ok(pages)
    }
}
