//! Command-line interface definitions.
//!
//! Global flags override the matching fields of the YAML config; every flag can
//! also come from an environment variable.

use crate::config::{CrawlConfig, TimeLabelPolicy, TranscriptMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Crawl a talk-listing site and dump every talk's transcripts as JSON.
///
/// # Examples
///
/// ```sh
/// # Crawl everything into ./dump_files
/// talk_transcripts crawl
///
/// # English only, into another directory
/// talk_transcripts --mode single --language en -o ./english crawl
///
/// # Resume a halted crawl
/// talk_transcripts crawl --page-list ./dump_files/resume-pages.txt
///
/// # Crawl two talks directly
/// talk_transcripts crawl --talk https://www.ted.com/talks/a --talk https://www.ted.com/talks/b
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a config.yaml file
    #[arg(short, long, env = "TALK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output directory for talk records
    #[arg(short, long, env = "TALK_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    /// First listing page
    #[arg(long, env = "TALK_BASE_URL")]
    pub base_url: Option<String>,

    /// Target language in single mode
    #[arg(short, long, env = "TALK_LANGUAGE")]
    pub language: Option<String>,

    /// Collect one transcript or every available language
    #[arg(short, long, value_enum, env = "TALK_MODE")]
    pub mode: Option<TranscriptMode>,

    /// What to record when a time label is missing
    #[arg(long, value_enum, env = "TALK_TIME_LABEL_POLICY")]
    pub time_label_policy: Option<TimeLabelPolicy>,

    /// Skip talks that fail instead of halting the crawl
    #[arg(long, env = "TALK_KEEP_GOING")]
    pub keep_going: bool,

    /// Retries per fetch for transient failures
    #[arg(long, env = "TALK_MAX_RETRIES")]
    pub max_retries: Option<usize>,

    /// Pause between requests, in milliseconds
    #[arg(long, env = "TALK_REQUEST_DELAY_MS")]
    pub request_delay_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Crawl talks and write one JSON record per talk
    Crawl {
        /// Crawl these listing pages instead of walking pagination
        #[arg(long, conflicts_with = "talks")]
        page_list: Option<PathBuf>,

        /// Crawl this talk URL directly (repeatable)
        #[arg(long = "talk", value_name = "URL")]
        talks: Vec<String>,
    },
    /// Walk pagination and list every listing page
    Discover {
        /// Write the list here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List the languages the site offers transcripts in
    Languages,
}

impl Cli {
    /// Apply flag overrides on top of a loaded config.
    pub fn apply(&self, config: &mut CrawlConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(policy) = self.time_label_policy {
            config.time_label_policy = policy;
        }
        if self.keep_going {
            config.keep_going = true;
        }
        if let Some(n) = self.max_retries {
            config.retry.max_retries = n;
        }
        if let Some(ms) = self.request_delay_ms {
            config.request_delay_ms = ms;
        }
    }
}
