//! Per-talk aggregation.
//!
//! [`TalkAggregator`] turns one talk into one [`TalkRecord`]: topics from the
//! talk page, then transcripts from the transcript page in one language
//! ([`TranscriptMode::Single`]) or in every language the page offers
//! ([`TranscriptMode::AllLanguages`]).
//!
//! # URL Pattern
//!
//! Transcripts live under the talk URL:
//! `https://www.ted.com/talks/<slug>/transcript?language=<code>`. The language
//! index is the same page without the query.
//!
//! # Failure scope
//!
//! The talk page and the language index are required; failing to fetch them
//! fails the talk. One language's transcript is optional: a failed fetch is
//! logged and recorded as an empty transcript for that language.

use crate::config::{TimeLabelPolicy, TranscriptMode};
use crate::error::Result;
use crate::extract::Extractor;
use crate::fetch::Fetch;
use crate::models::{
    LanguageCode, LanguageTranscripts, ParagraphNode, TalkRecord, TalkRef, Transcript, Transcripts,
};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::{debug, info, instrument, warn};

static LANGUAGE_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?language=[^&#]*").unwrap());

/// Transcript URL of `talk_url` in `language`.
///
/// An existing `?language=<old>` is replaced by `/transcript?language=<language>`;
/// otherwise `/transcript?language=<language>` is appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(
///     transcript_url("https://example.com/talks/x?language=en", "ja"),
///     "https://example.com/talks/x/transcript?language=ja"
/// );
/// ```
pub fn transcript_url(talk_url: &str, language: &str) -> String {
    let replacement = format!("/transcript?language={}", urlencoding::encode(language));
    if LANGUAGE_PARAM.is_match(talk_url) {
        LANGUAGE_PARAM
            .replacen(talk_url, 1, regex::NoExpand(&replacement))
            .into_owned()
    } else {
        format!("{talk_url}{replacement}")
    }
}

/// Transcript page of `talk_url` without a language, used to read the language selector.
pub fn transcript_index_url(talk_url: &str) -> String {
    let path = talk_url.split(['?', '#']).next().unwrap_or(talk_url);
    format!("{}/transcript", path.trim_end_matches('/'))
}

/// How transcripts are collected and shaped.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub mode: TranscriptMode,
    /// Target language in single mode.
    pub language: LanguageCode,
    pub time_label_policy: TimeLabelPolicy,
    /// Drop the trailing timing-less paragraph in all-languages mode.
    pub drop_trailing_boilerplate: bool,
}

/// Builds one [`TalkRecord`] per talk.
pub struct TalkAggregator<'a, F> {
    fetcher: &'a F,
    extractor: &'a Extractor,
    options: &'a AggregateOptions,
    /// Stamped on every record built by this aggregator.
    collection_date: String,
}

impl<'a, F: Fetch> TalkAggregator<'a, F> {
    pub fn new(
        fetcher: &'a F,
        extractor: &'a Extractor,
        options: &'a AggregateOptions,
        collection_date: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            options,
            collection_date: collection_date.into(),
        }
    }

    /// Languages offered for a talk, in selector order, excluding the default marker.
    #[instrument(level = "info", skip(self))]
    pub async fn get_available_languages(&self, talk_url: &str) -> Result<Vec<LanguageCode>> {
        let url = transcript_index_url(talk_url);
        let doc = self.fetcher.fetch(&url).await?;
        let languages = self.extractor.languages(&doc);
        debug!(count = languages.len(), ?languages, "Available languages");
        Ok(languages)
    }

    /// Split a transcript page into text segments and time labels.
    ///
    /// Containers are routed by kind, preserving document order in each list.
    /// With `drop_trailing`, a final text segment that has no time label of its
    /// own is removed as boilerplate.
    pub fn get_transcript(&self, doc: &Html, drop_trailing: bool) -> Transcript {
        let policy = self.options.time_label_policy;
        let nodes = self.extractor.paragraphs(doc);
        let mut transcript = Transcript::default();
        let mut time_nodes = 0usize;

        for node in &nodes {
            match node {
                ParagraphNode::Text(text) => transcript.segments.push(text.clone()),
                ParagraphNode::Time(label) => {
                    time_nodes += 1;
                    if !label.is_empty() {
                        transcript.times.push(label.clone());
                    } else if let Some(placeholder) = policy.placeholder() {
                        transcript.times.push(placeholder);
                    }
                }
            }
        }

        if drop_trailing
            && matches!(nodes.last(), Some(ParagraphNode::Text(_)))
            && transcript.segments.len() > time_nodes
        {
            let dropped = transcript.segments.pop();
            debug!(?dropped, "Dropped trailing boilerplate paragraph");
        }

        if time_nodes == 0 && !transcript.segments.is_empty() {
            transcript.times = policy.missing_list();
        }
        transcript
    }

    /// One language's transcript; a failed fetch yields an empty transcript.
    #[instrument(level = "debug", skip(self))]
    async fn language_transcript(&self, talk_url: &str, language: &str, drop_trailing: bool) -> Transcript {
        let url = transcript_url(talk_url, language);
        match self.fetcher.fetch(&url).await {
            Ok(doc) => self.get_transcript(&doc, drop_trailing),
            Err(e) => {
                warn!(%url, language, error = %e, "Transcript fetch failed; recording empty transcript");
                Transcript::default()
            }
        }
    }

    /// Transcripts for every available language of a talk.
    ///
    /// Every available language is a key of the result, even when its fetch failed.
    #[instrument(level = "info", skip(self))]
    pub async fn get_all_language_transcripts(
        &self,
        talk_url: &str,
    ) -> Result<LanguageTranscripts> {
        let languages = self.get_available_languages(talk_url).await?;
        if languages.is_empty() {
            warn!(%talk_url, "No transcript languages offered");
        }
        let total = languages.len();
        let drop_trailing = self.options.drop_trailing_boilerplate;

        let transcripts = stream::iter(languages.into_iter().enumerate())
            .then(|(i, language)| async move {
                info!("[{:3}/{:3}] target language: {}", i + 1, total, language);
                let transcript = self
                    .language_transcript(talk_url, &language, drop_trailing)
                    .await;
                (language, transcript)
            })
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<LanguageTranscripts>();

        let empty = transcripts.iter().filter(|(_, t)| t.is_empty()).count();
        if empty > 0 {
            warn!(%talk_url, empty, total = transcripts.len(), "Some languages have no transcript");
        }
        Ok(transcripts)
    }

    /// Build the record for a talk found on a listing page.
    #[instrument(level = "info", skip_all, fields(url = %talk.url))]
    pub async fn build(&self, talk: &TalkRef) -> Result<TalkRecord> {
        let doc = self.fetcher.fetch(&talk.url).await?;
        self.assemble(talk.clone(), &doc).await
    }

    /// Build the record for a talk URL given directly, reading title and date
    /// from the talk page.
    #[instrument(level = "info", skip(self))]
    pub async fn build_from_url(&self, talk_url: &str) -> Result<TalkRecord> {
        let doc = self.fetcher.fetch(talk_url).await?;
        let talk = self.extractor.talk_ref_from_page(&doc, talk_url);
        self.assemble(talk, &doc).await
    }

    async fn assemble(&self, talk: TalkRef, talk_doc: &Html) -> Result<TalkRecord> {
        let topics = self.extractor.topics(talk_doc, &talk.url)?;

        let transcripts = match self.options.mode {
            TranscriptMode::Single => {
                let language = self.options.language.clone();
                let transcript = self.language_transcript(&talk.url, &language, false).await;
                Transcripts::Single {
                    language,
                    transcript,
                }
            }
            TranscriptMode::AllLanguages => {
                Transcripts::PerLanguage(self.get_all_language_transcripts(&talk.url).await?)
            }
        };

        Ok(TalkRecord {
            posted_date: talk.posted_date,
            collection_date: self.collection_date.clone(),
            title: talk.title,
            link: talk.url,
            topics,
            transcripts,
        })
    }
}
