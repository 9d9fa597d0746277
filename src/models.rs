//! Data models for listing pages, talks, transcripts and crawl progress.
//!
//! This module defines the core data structures used throughout the crawler:
//! - [`ListingPage`] and [`TalkRef`]: what one page of the talk list yields
//! - [`ParagraphNode`] and [`Transcript`]: one language's transcript
//! - [`LanguageTranscripts`]: every language's transcript, in selector order
//! - [`TalkRecord`]: the terminal artifact written once per talk
//! - [`CrawlProgress`]: counters the orchestrator keeps for diagnostics
//!
//! The persisted JSON layout of [`TalkRecord`] uses the field names
//! `posted_date`, `update_date`, `talk_title`, `talk_link`, `talk_lang`,
//! `talk_topics`, `transcript` and `time`.

use crate::utils::record_file_name;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::ops::Index;
use std::time::{Duration, Instant};

/// Short language tag such as `"en"` or `"ja"`.
pub type LanguageCode = String;

/// A talk as listed on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalkRef {
    /// Absolute talk URL.
    pub url: String,
    pub title: String,
    /// `YYYY-MM-DD`, or the raw listing text when it could not be parsed.
    pub posted_date: String,
}

/// One fetched page of the talk list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    pub url: String,
    /// Talks in document order.
    pub talks: Vec<TalkRef>,
    /// Absolute URL of the next listing page, if any.
    pub next: Option<String>,
}

/// One transcript container, classified by what it holds.
///
/// Text and time markers are interleaved siblings on the transcript page, so
/// each container is either one or the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParagraphNode {
    Text(String),
    Time(String),
}

/// One language's transcript: spoken paragraphs and their time labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub segments: Vec<String>,
    pub times: Vec<String>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.times.is_empty()
    }
}

/// Transcripts keyed by language, in the order the language selector lists them.
///
/// Serializes as a JSON object whose keys keep that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageTranscripts {
    entries: Vec<(LanguageCode, Transcript)>,
}

impl LanguageTranscripts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a language at the end, or replace its transcript in place.
    pub fn insert(&mut self, language: LanguageCode, transcript: Transcript) {
        match self.entries.iter_mut().find(|(l, _)| *l == language) {
            Some((_, existing)) => *existing = transcript,
            None => self.entries.push((language, transcript)),
        }
    }

    pub fn get(&self, language: &str) -> Option<&Transcript> {
        self.entries
            .iter()
            .find(|(l, _)| l == language)
            .map(|(_, t)| t)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LanguageCode, &Transcript)> {
        self.entries.iter().map(|(l, t)| (l, t))
    }
}

impl FromIterator<(LanguageCode, Transcript)> for LanguageTranscripts {
    fn from_iter<I: IntoIterator<Item = (LanguageCode, Transcript)>>(iter: I) -> Self {
        let mut transcripts = Self::new();
        for (language, transcript) in iter {
            transcripts.insert(language, transcript);
        }
        transcripts
    }
}

impl Index<&str> for LanguageTranscripts {
    type Output = Transcript;

    /// Panics when `language` is absent, like map indexing.
    fn index(&self, language: &str) -> &Transcript {
        self.get(language)
            .unwrap_or_else(|| panic!("no transcript for language {language:?}"))
    }
}

/// Which half of each transcript a per-language JSON object holds.
#[derive(Clone, Copy)]
enum Part {
    Segments,
    Times,
}

/// One JSON object of a per-language record, keyed by language.
struct ByLanguage<'a> {
    transcripts: &'a LanguageTranscripts,
    part: Part,
}

impl Serialize for ByLanguage<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.transcripts.iter().map(|(language, t)| {
            let values = match self.part {
                Part::Segments => &t.segments,
                Part::Times => &t.times,
            };
            (language, values)
        }))
    }
}

/// Transcripts carried by a record, by crawl mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcripts {
    /// One transcript for the configured language.
    Single {
        language: LanguageCode,
        transcript: Transcript,
    },
    /// Every available language. A language whose fetch failed maps to an
    /// empty transcript, never a missing key.
    PerLanguage(LanguageTranscripts),
}

/// Everything collected for one talk.
///
/// Built once by [`crate::scrapers::talk::TalkAggregator`] and written once to
/// a [`crate::outputs::RecordStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalkRecord {
    /// `YYYY-MM-DD` posted date from the listing page.
    pub posted_date: String,
    /// `YYYY-MM-DD` date the crawl ran.
    pub collection_date: String,
    pub title: String,
    /// Absolute talk URL.
    pub link: String,
    /// Topics in page order, without duplicates.
    pub topics: Vec<String>,
    pub transcripts: Transcripts,
}

impl TalkRecord {
    /// Name of the JSON file this record is stored under.
    ///
    /// All-languages records are prefixed with `al-`.
    pub fn file_name(&self) -> String {
        let prefix = match self.transcripts {
            Transcripts::Single { .. } => "",
            Transcripts::PerLanguage(_) => "al-",
        };
        record_file_name(prefix, &self.title)
    }
}

impl Serialize for TalkRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let single = matches!(self.transcripts, Transcripts::Single { .. });
        let mut state = serializer.serialize_struct("TalkRecord", if single { 8 } else { 7 })?;
        state.serialize_field("posted_date", &self.posted_date)?;
        state.serialize_field("update_date", &self.collection_date)?;
        state.serialize_field("talk_title", &self.title)?;
        state.serialize_field("talk_link", &self.link)?;
        match &self.transcripts {
            Transcripts::Single {
                language,
                transcript,
            } => {
                state.serialize_field("talk_lang", language)?;
                state.serialize_field("talk_topics", &self.topics)?;
                state.serialize_field("transcript", &transcript.segments)?;
                state.serialize_field("time", &transcript.times)?;
            }
            Transcripts::PerLanguage(by_language) => {
                let segments = ByLanguage {
                    transcripts: by_language,
                    part: Part::Segments,
                };
                let times = ByLanguage {
                    transcripts: by_language,
                    part: Part::Times,
                };
                state.serialize_field("talk_topics", &self.topics)?;
                state.serialize_field("transcript", &segments)?;
                state.serialize_field("time", &times)?;
            }
        }
        state.end()
    }
}

/// An entry of the site-wide language catalog.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LanguageInfo {
    pub name: String,
    pub code: LanguageCode,
    /// Number of talks translated into this language, when the page states it.
    pub talk_count: Option<u32>,
}

/// Where the orchestrator is in a crawl.
///
/// Owned by the caller of [`crate::crawl::CrawlOrchestrator::run`] and passed
/// in by mutable reference; only the orchestrator writes to it.
#[derive(Debug, Clone, Default)]
pub struct CrawlProgress {
    /// 1-based index of the current listing page.
    pub page_index: usize,
    pub page_total: usize,
    /// 1-based index of the current talk within the page.
    pub talk_index: usize,
    pub talk_total: usize,
    pub current_page_url: String,
    /// Last URL the crawler attempted.
    pub last_url: String,
    /// Time spent on completed pages.
    pub elapsed: Duration,
    page_started: Option<Instant>,
}

impl CrawlProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, page_total: usize) {
        *self = Self {
            page_total,
            ..Self::default()
        };
    }

    pub fn begin_page(&mut self, index: usize, url: &str) {
        self.page_index = index;
        self.talk_index = 0;
        self.talk_total = 0;
        self.current_page_url = url.to_string();
        self.last_url = url.to_string();
        self.page_started = Some(Instant::now());
    }

    pub fn set_talk_total(&mut self, total: usize) {
        self.talk_total = total;
    }

    pub fn begin_talk(&mut self, index: usize, url: &str) {
        self.talk_index = index;
        self.last_url = url.to_string();
    }

    pub fn attempt(&mut self, url: &str) {
        self.last_url = url.to_string();
    }

    /// Fold the current page's time into `elapsed` and return the page's duration.
    pub fn finish_page(&mut self) -> Duration {
        let spent = self
            .page_started
            .take()
            .map(|t| t.elapsed())
            .unwrap_or_default();
        self.elapsed += spent;
        spent
    }

    /// Total time including the page in progress.
    pub fn total_elapsed(&self) -> Duration {
        self.elapsed
            + self
                .page_started
                .map(|t| t.elapsed())
                .unwrap_or_default()
    }

    /// A frozen copy for reporting, with the in-progress page folded in.
    pub fn snapshot(&self) -> CrawlProgress {
        CrawlProgress {
            elapsed: self.total_elapsed(),
            page_started: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for CrawlProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page {}/{}, talk {}/{}",
            self.page_index, self.page_total, self.talk_index, self.talk_total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(segments: &[&str], times: &[&str]) -> Transcript {
        Transcript {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            times: times.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn record(transcripts: Transcripts) -> TalkRecord {
        TalkRecord {
            posted_date: "2006-06-01".to_string(),
            collection_date: "2026-10-18".to_string(),
            title: "Do schools kill creativity?".to_string(),
            link: "https://www.ted.com/talks/ken_robinson_says_schools_kill_creativity"
                .to_string(),
            topics: vec!["culture".to_string(), "education".to_string()],
            transcripts,
        }
    }

    #[test]
    fn test_single_record_serialization() {
        let rec = record(Transcripts::Single {
            language: "en".to_string(),
            transcript: transcript(&["Good morning."], &["00:12"]),
        });
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["posted_date"], "2006-06-01");
        assert_eq!(value["update_date"], "2026-10-18");
        assert_eq!(value["talk_lang"], "en");
        assert_eq!(value["talk_topics"][1], "education");
        assert_eq!(value["transcript"][0], "Good morning.");
        assert_eq!(value["time"][0], "00:12");
    }

    #[test]
    fn test_per_language_record_serialization() {
        let mut by_language = LanguageTranscripts::new();
        by_language.insert("en".to_string(), transcript(&["Hello."], &["00:01"]));
        by_language.insert("ja".to_string(), Transcript::default());
        let rec = record(Transcripts::PerLanguage(by_language));

        let value = serde_json::to_value(&rec).unwrap();
        assert!(value.get("talk_lang").is_none());
        assert_eq!(value["transcript"]["en"][0], "Hello.");
        assert_eq!(value["transcript"]["ja"].as_array().unwrap().len(), 0);
        assert_eq!(value["time"]["ja"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_per_language_keys_keep_selector_order() {
        let by_language: LanguageTranscripts = [
            ("zh-tw", transcript(&["ni hao"], &["0:01"])),
            ("en", transcript(&["hello"], &["0:01"])),
            ("ar", Transcript::default()),
        ]
        .into_iter()
        .map(|(l, t)| (l.to_string(), t))
        .collect();
        let json = serde_json::to_string(&record(Transcripts::PerLanguage(by_language))).unwrap();

        let transcript = &json[json.find("\"transcript\"").unwrap()..];
        let zh = transcript.find("\"zh-tw\"").unwrap();
        let en = transcript.find("\"en\"").unwrap();
        let ar = transcript.find("\"ar\"").unwrap();
        assert!(zh < en && en < ar, "{transcript}");
    }

    #[test]
    fn test_language_transcripts_insert_replaces_in_place() {
        let mut by_language = LanguageTranscripts::new();
        by_language.insert("ja".to_string(), Transcript::default());
        by_language.insert("en".to_string(), Transcript::default());
        by_language.insert("ja".to_string(), transcript(&["konnichiwa"], &["0:01"]));

        let keys: Vec<&str> = by_language.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(keys, vec!["ja", "en"]);
        assert_eq!(by_language.len(), 2);
        assert_eq!(by_language["ja"].segments, vec!["konnichiwa"]);
        assert!(by_language.get("fr").is_none());
    }

    #[test]
    fn test_record_file_name_by_mode() {
        let single = record(Transcripts::Single {
            language: "en".to_string(),
            transcript: Transcript::default(),
        });
        assert_eq!(single.file_name(), "Do_schools_kill_creativity?.json");

        let all = record(Transcripts::PerLanguage(LanguageTranscripts::new()));
        assert_eq!(all.file_name(), "al-Do_schools_kill_creativity?.json");
    }

    #[test]
    fn test_progress_display_and_reset() {
        let mut progress = CrawlProgress::new();
        progress.reset(3);
        progress.begin_page(2, "https://example.com/talks?page=2");
        progress.set_talk_total(36);
        progress.begin_talk(5, "https://example.com/talks/x");
        assert_eq!(progress.to_string(), "page 2/3, talk 5/36");
        assert_eq!(progress.last_url, "https://example.com/talks/x");

        progress.finish_page();
        let snap = progress.snapshot();
        assert_eq!(snap.page_index, 2);

        progress.reset(1);
        assert_eq!(progress.to_string(), "page 0/1, talk 0/0");
        assert!(progress.last_url.is_empty());
    }
}
