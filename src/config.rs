//! Crawl configuration.
//!
//! Settings come from an optional YAML file and are then overridden by CLI
//! flags (see [`crate::cli`]). Every field has a default, so an empty file or
//! no file at all yields a working configuration for the talk site.
//!
//! ```yaml
//! base_url: https://www.ted.com/talks
//! mode: all-languages
//! output_dir: ./dump_files
//! time_label_policy: sentinel
//! retry:
//!   max_retries: 3
//! selectors:
//!   topics_container: div.talk-topics
//! ```

use crate::error::{CrawlError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

/// Placeholder recorded when a time label is missing under [`TimeLabelPolicy::Sentinel`].
pub const NO_TIME_DATA: &str = "no time data found.";

/// Which transcripts a crawl collects per talk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriptMode {
    /// One transcript in the configured language.
    Single,
    /// Every language offered by the talk's transcript page.
    #[default]
    AllLanguages,
}

/// What to record when a time label is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TimeLabelPolicy {
    /// Record an empty string.
    Empty,
    /// Record [`NO_TIME_DATA`].
    #[default]
    Sentinel,
    /// Skip the label entirely.
    Omit,
}

impl TimeLabelPolicy {
    /// The value standing in for one missing label, or `None` to skip it.
    pub fn placeholder(self) -> Option<String> {
        match self {
            TimeLabelPolicy::Empty => Some(String::new()),
            TimeLabelPolicy::Sentinel => Some(NO_TIME_DATA.to_string()),
            TimeLabelPolicy::Omit => None,
        }
    }

    /// The time list recorded when a transcript has text but no timing at all.
    pub fn missing_list(self) -> Vec<String> {
        match self {
            TimeLabelPolicy::Sentinel => vec![NO_TIME_DATA.to_string()],
            TimeLabelPolicy::Empty | TimeLabelPolicy::Omit => Vec::new(),
        }
    }
}

/// Retry policy applied by the orchestrator around every fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

/// CSS selectors for every semantic field the crawler reads.
///
/// The defaults match the talk site's markup at the time of writing. When the
/// site changes, override the affected entries in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorTable {
    /// One talk entry on a listing page.
    pub talk_item: String,
    /// Anchor inside a talk entry carrying the link and title.
    pub talk_anchor: String,
    /// Posted date inside a talk entry.
    pub talk_posted: String,
    /// Pagination block on a listing page.
    pub pagination: String,
    /// "Next" link inside the pagination block.
    pub next_page: String,
    /// Title of a talk page, read from `content` when present, else from text.
    pub talk_page_title: String,
    /// Upload date of a talk page, read from `content`.
    pub talk_page_date: String,
    /// Topics block on a talk page.
    pub topics_container: String,
    /// One topic inside the topics block.
    pub topic_item: String,
    /// Transcript containers, text and time alike, in document order.
    ///
    /// Where the site nests a time marker and a text span inside one paragraph,
    /// select the two children instead of the paragraph.
    pub transcript_paragraph: String,
    /// Spoken text inside a paragraph container.
    pub transcript_text: String,
    /// Time label inside a paragraph container.
    pub transcript_time: String,
    /// Options of the transcript language selector.
    pub language_option: String,
    /// Option value that marks the default entry rather than a language.
    pub language_sentinel: String,
    /// One language entry on the language catalog page.
    pub catalog_language: String,
    /// `chrono` format of the posted date on listing pages.
    pub posted_date_format: String,
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            talk_item: "div.talk-link".into(),
            talk_anchor: "h4.h9 a".into(),
            talk_posted: "div.meta span.meta__val".into(),
            pagination: "div.pagination".into(),
            next_page: "a.pagination__next".into(),
            talk_page_title: r#"meta[name="title"]"#.into(),
            talk_page_date: r#"meta[itemprop="uploadDate"]"#.into(),
            topics_container: "div.talk-topics".into(),
            topic_item: "li.talk-topics__item a".into(),
            transcript_paragraph: "p.talk-transcript__para data.talk-transcript__para__time, \
                                   p.talk-transcript__para span.talk-transcript__para__text"
                .into(),
            transcript_text: "span.talk-transcript__para__text".into(),
            transcript_time: "data.talk-transcript__para__time".into(),
            language_option: "select.talk-transcript__language option".into(),
            language_sentinel: "x-default".into(),
            catalog_language: "div.languages__list__language".into(),
            posted_date_format: "%b %Y".into(),
        }
    }
}

/// Top-level crawl configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// First listing page.
    pub base_url: String,
    /// Language catalog page.
    pub catalog_url: String,
    /// Target language in single mode.
    pub language: String,
    pub mode: TranscriptMode,
    pub output_dir: String,
    /// Hard cap on discovered listing pages.
    pub max_pages: usize,
    /// Pause between consecutive fetches.
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub time_label_policy: TimeLabelPolicy,
    /// Drop the trailing timing-less paragraph in all-languages mode.
    pub drop_trailing_boilerplate: bool,
    /// Skip failing talks instead of halting the run.
    pub keep_going: bool,
    pub retry: RetryConfig,
    pub selectors: SelectorTable,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.ted.com/talks".into(),
            catalog_url: "https://www.ted.com/participate/translate/our-languages".into(),
            language: "en".into(),
            mode: TranscriptMode::default(),
            output_dir: "./dump_files".into(),
            max_pages: 10_000,
            request_delay_ms: 0,
            timeout_secs: 30,
            user_agent: concat!("talk_transcripts/", env!("CARGO_PKG_VERSION")).into(),
            time_label_policy: TimeLabelPolicy::default(),
            drop_trailing_boilerplate: true,
            keep_going: false,
            retry: RetryConfig::default(),
            selectors: SelectorTable::default(),
        }
    }
}

impl CrawlConfig {
    /// Parse a YAML document into a config, filling unset fields with defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| CrawlError::Config(e.to_string()))
    }

    /// Load a config file, or the defaults when `path` is `None`.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CrawlError::storage(path, e))?;
        let config = Self::from_yaml(&yaml)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}
