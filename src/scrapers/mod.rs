//! Scrapers for the talk site.
//!
//! Crawling follows a two-phase pattern:
//!
//! 1. **Listing**: walk the paginated talk list and read each page's talks
//! 2. **Talks**: fetch each talk's page and transcripts and build a record
//!
//! | Phase | Module | Entry point |
//! |-------|--------|-------------|
//! | Listing | [`listing`] | [`listing::PageListDiscoverer`], [`listing::fetch_listing`] |
//! | Talks | [`talk`] | [`talk::TalkAggregator`] |
//! | Languages | [`catalog`] | [`catalog::fetch_languages`] |
//!
//! Both phases read documents through [`crate::fetch::Fetch`] and fields
//! through [`crate::extract::Extractor`], so they run unchanged against the
//! live site or canned pages.

pub mod catalog;
pub mod listing;
pub mod talk;
