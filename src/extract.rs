//! Field extraction from parsed documents.
//!
//! [`Extractor`] compiles a [`SelectorTable`] once and then answers questions
//! about documents: which talks a listing page holds, where the next page is,
//! which topics a talk has, how a transcript is laid out, which languages it
//! is offered in.
//!
//! Every method takes `&Html` and returns owned values, so extracting the same
//! field twice yields the same result.
//!
//! # Missing data
//!
//! A missing leaf (one anchor, one date, one time label) yields an empty or
//! skipped value. Only a missing *container* that a record depends on, such as
//! the topics block, is a [`CrawlError::SchemaMismatch`].

use crate::config::SelectorTable;
use crate::error::{CrawlError, Result};
use crate::models::{LanguageCode, LanguageInfo, ParagraphNode, TalkRef};
use crate::utils::convert_posted_date;
use chrono::DateTime;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

static LEADING_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d[\d,]*)").unwrap());

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

static DOCUMENT_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

/// Compiled selectors for every semantic field.
#[derive(Debug)]
pub struct Extractor {
    talk_item: Selector,
    talk_anchor: Selector,
    talk_posted: Selector,
    pagination: Selector,
    next_page: Selector,
    talk_page_title: Selector,
    talk_page_date: Selector,
    topics_container: Selector,
    topic_item: Selector,
    transcript_paragraph: Selector,
    transcript_text: Selector,
    transcript_time: Selector,
    language_option: Selector,
    catalog_language: Selector,
    talk_item_css: String,
    topics_container_css: String,
    language_sentinel: String,
    posted_date_format: String,
}

fn compile(field: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| CrawlError::InvalidSelector {
        field: field.to_string(),
        selector: css.to_string(),
    })
}

/// Text of an element with whitespace runs collapsed to single spaces.
fn clean_text(el: ElementRef<'_>) -> String {
    el.text().flat_map(str::split_whitespace).join(" ")
}

/// Time labels carry no whitespace at all (`"12:34"`).
fn clean_time(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(|t| t.chars())
        .filter(|c| !c.is_whitespace())
        .collect()
}

impl Extractor {
    pub fn new(table: &SelectorTable) -> Result<Self> {
        Ok(Self {
            talk_item: compile("talk_item", &table.talk_item)?,
            talk_anchor: compile("talk_anchor", &table.talk_anchor)?,
            talk_posted: compile("talk_posted", &table.talk_posted)?,
            pagination: compile("pagination", &table.pagination)?,
            next_page: compile("next_page", &table.next_page)?,
            talk_page_title: compile("talk_page_title", &table.talk_page_title)?,
            talk_page_date: compile("talk_page_date", &table.talk_page_date)?,
            topics_container: compile("topics_container", &table.topics_container)?,
            topic_item: compile("topic_item", &table.topic_item)?,
            transcript_paragraph: compile("transcript_paragraph", &table.transcript_paragraph)?,
            transcript_text: compile("transcript_text", &table.transcript_text)?,
            transcript_time: compile("transcript_time", &table.transcript_time)?,
            language_option: compile("language_option", &table.language_option)?,
            catalog_language: compile("catalog_language", &table.catalog_language)?,
            talk_item_css: table.talk_item.clone(),
            topics_container_css: table.topics_container.clone(),
            language_sentinel: table.language_sentinel.clone(),
            posted_date_format: table.posted_date_format.clone(),
        })
    }

    /// Fails when a listing page at `url` holds no talk entries at all.
    ///
    /// Every listing page carries at least one talk, so an empty list means the
    /// entry markup changed.
    pub fn require_talk_list(&self, doc: &Html, url: &str) -> Result<()> {
        match doc.select(&self.talk_item).next() {
            Some(_) => Ok(()),
            None => Err(CrawlError::schema(url, &self.talk_item_css)),
        }
    }

    /// Talks listed on a listing page, in document order.
    ///
    /// Links are resolved against `base`. An entry without an anchor is skipped.
    pub fn talk_refs(&self, doc: &Html, base: &Url) -> Vec<TalkRef> {
        let mut refs = Vec::new();
        for item in doc.select(&self.talk_item) {
            let Some(anchor) = item.select(&self.talk_anchor).next() else {
                warn!("Talk entry without an anchor; skipping");
                continue;
            };
            let Some(href) = anchor.value().attr("href") else {
                warn!("Talk anchor without href; skipping");
                continue;
            };
            let Ok(url) = base.join(href.trim()) else {
                warn!(href, "Unresolvable talk link; skipping");
                continue;
            };

            let raw_date = item
                .select(&self.talk_posted)
                .next()
                .map(clean_text)
                .unwrap_or_default();
            let posted_date = match convert_posted_date(&raw_date, &self.posted_date_format) {
                Some(date) => date,
                None => {
                    if !raw_date.is_empty() {
                        warn!(raw = %raw_date, "Unrecognized posted date; keeping raw text");
                    }
                    raw_date
                }
            };

            refs.push(TalkRef {
                url: url.to_string(),
                title: clean_text(anchor),
                posted_date,
            });
        }
        debug!(count = refs.len(), "Extracted talk refs");
        refs
    }

    /// Absolute URL of the next listing page, or `None` on the last page.
    pub fn next_page(&self, doc: &Html, base: &Url) -> Option<String> {
        let Some(pagination) = doc.select(&self.pagination).next() else {
            debug!("No pagination block; treating page as last");
            return None;
        };
        let href = pagination
            .select(&self.next_page)
            .next()?
            .value()
            .attr("href")?;
        base.join(href.trim()).ok().map(|u| u.to_string())
    }

    /// Listing-style metadata read from a talk page itself.
    ///
    /// Used when a talk is crawled directly rather than from a listing page.
    /// The title falls back to the document `<title>`; the date is left empty
    /// when the page does not carry one.
    pub fn talk_ref_from_page(&self, doc: &Html, url: &str) -> TalkRef {
        let content_or_text = |el: ElementRef<'_>| match el.value().attr("content") {
            Some(content) => content.split_whitespace().join(" "),
            None => clean_text(el),
        };
        let title = doc
            .select(&self.talk_page_title)
            .next()
            .map(content_or_text)
            .filter(|t| !t.is_empty())
            .or_else(|| doc.select(&DOCUMENT_TITLE).next().map(clean_text))
            .unwrap_or_default();

        let raw_date = doc
            .select(&self.talk_page_date)
            .next()
            .map(content_or_text)
            .unwrap_or_default();
        let posted_date = DateTime::parse_from_rfc3339(&raw_date)
            .map(|d| d.date_naive().format("%Y-%m-%d").to_string())
            .ok()
            .or_else(|| convert_posted_date(&raw_date, &self.posted_date_format))
            .unwrap_or(raw_date);

        TalkRef {
            url: url.to_string(),
            title,
            posted_date,
        }
    }

    /// Topics of a talk, in page order without duplicates.
    ///
    /// Fails when the topics block itself is missing from the talk page at `url`.
    pub fn topics(&self, doc: &Html, url: &str) -> Result<Vec<String>> {
        let container = doc
            .select(&self.topics_container)
            .next()
            .ok_or_else(|| CrawlError::schema(url, &self.topics_container_css))?;
        Ok(container
            .select(&self.topic_item)
            .map(clean_text)
            .filter(|t| !t.is_empty())
            .unique()
            .collect())
    }

    /// Transcript containers in document order, each classified as text or time.
    ///
    /// A container that is, or holds, a text element is text. Anything else is a
    /// time marker, labelled by its time element when present and by its own
    /// text otherwise.
    pub fn paragraphs(&self, doc: &Html) -> Vec<ParagraphNode> {
        doc.select(&self.transcript_paragraph)
            .map(|container| {
                let text = if self.transcript_text.matches(&container) {
                    Some(container)
                } else {
                    container.select(&self.transcript_text).next()
                };
                match text {
                    Some(el) => ParagraphNode::Text(clean_text(el)),
                    None => {
                        let label = if self.transcript_time.matches(&container) {
                            container
                        } else {
                            container
                                .select(&self.transcript_time)
                                .next()
                                .unwrap_or(container)
                        };
                        ParagraphNode::Time(clean_time(label))
                    }
                }
            })
            .collect()
    }

    /// Languages offered by a transcript page's language selector, in option order.
    ///
    /// The default-marker option is excluded. An absent selector yields an empty list.
    pub fn languages(&self, doc: &Html) -> Vec<LanguageCode> {
        doc.select(&self.language_option)
            .filter_map(|opt| opt.value().attr("value"))
            .map(str::trim)
            .filter(|v| !v.is_empty() && *v != self.language_sentinel)
            .unique()
            .map(str::to_string)
            .collect()
    }

    /// Entries of the site-wide language catalog.
    pub fn catalog(&self, doc: &Html, base: &Url) -> Vec<LanguageInfo> {
        doc.select(&self.catalog_language)
            .filter_map(|entry| {
                let anchor = entry.select(&ANCHOR).next()?;
                let name = clean_text(anchor);
                let href = anchor.value().attr("href")?;
                let code = base
                    .join(href)
                    .ok()?
                    .query_pairs()
                    .find(|(k, _)| k == "language")
                    .map(|(_, v)| v.into_owned())?;
                let rest = clean_text(entry).replacen(&name, "", 1);
                let talk_count = LEADING_COUNT
                    .captures(&rest)
                    .and_then(|c| c[1].replace(',', "").parse().ok());
                Some(LanguageInfo {
                    name,
                    code,
                    talk_count,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
<html><body>
  <div class="talk-link">
    <div class="meta"><span class="meta__val"> Jun 2006 </span></div>
    <h4 class="h9"><a href="/talks/ken_robinson_says_schools_kill_creativity">
      Do schools kill creativity?</a></h4>
  </div>
  <div class="talk-link">
    <div class="meta"><span class="meta__val">someday</span></div>
    <h4 class="h9"><a href="https://www.ted.com/talks/amy_cuddy">Your body language</a></h4>
  </div>
  <div class="talk-link"><div class="meta"></div></div>
  <div class="pagination">
    <a class="pagination__prev" href="/talks?page=1">Prev</a>
    <a class="pagination__next" href="/talks?page=3">Next</a>
  </div>
</body></html>"#;

    const TALK: &str = r#"
<html><body>
  <div class="talk-topics">
    <ul>
      <li class="talk-topics__item"><a href="/topics/culture"> Culture </a></li>
      <li class="talk-topics__item"><a href="/topics/education">Education</a></li>
      <li class="talk-topics__item"><a href="/topics/culture">Culture</a></li>
      <li class="talk-topics__item"></li>
    </ul>
  </div>
</body></html>"#;

    const TRANSCRIPT: &str = r#"
<html><body>
  <select class="talk-transcript__language">
    <option value="x-default">Choose language</option>
    <option value="en">English</option>
    <option value="ja">Japanese</option>
    <option value="en">English</option>
    <option value="fr">French</option>
  </select>
  <div class="cells">
    <div class="cell"><p>Good morning.
      How are you?</p></div>
    <div class="cell"> 00:12 </div>
    <div class="cell"><p>It's been great.</p></div>
    <div class="cell"><data class="talk-transcript__para__time">01:05</data></div>
    <div class="cell"><p>Thank you.</p></div>
  </div>
</body></html>"#;

    fn base() -> Url {
        Url::parse("https://www.ted.com/talks").unwrap()
    }

    fn extractor() -> Extractor {
        Extractor::new(&SelectorTable::default()).unwrap()
    }

    #[test]
    fn test_invalid_selector() {
        let table = SelectorTable {
            topic_item: "li[[".into(),
            ..SelectorTable::default()
        };
        let err = Extractor::new(&table).unwrap_err();
        assert!(matches!(err, CrawlError::InvalidSelector { ref field, .. } if field == "topic_item"));
    }

    #[test]
    fn test_talk_refs() {
        let doc = Html::parse_document(LISTING);
        let refs = extractor().talk_refs(&doc, &base());
        assert_eq!(refs.len(), 2);
        assert_eq!(
            refs[0].url,
            "https://www.ted.com/talks/ken_robinson_says_schools_kill_creativity"
        );
        assert_eq!(refs[0].title, "Do schools kill creativity?");
        assert_eq!(refs[0].posted_date, "2006-06-01");
        assert_eq!(refs[1].url, "https://www.ted.com/talks/amy_cuddy");
        assert_eq!(refs[1].posted_date, "someday");
    }

    #[test]
    fn test_require_talk_list() {
        let ex = extractor();
        let listing = Html::parse_document(LISTING);
        assert!(ex.require_talk_list(&listing, "https://www.ted.com/talks").is_ok());

        let redesigned =
            Html::parse_document(r#"<main><section class="new-grid"><a href="/x">X</a></section></main>"#);
        let err = ex
            .require_talk_list(&redesigned, "https://www.ted.com/talks")
            .unwrap_err();
        assert!(
            matches!(err, CrawlError::SchemaMismatch { ref container, .. } if container == "div.talk-link")
        );
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let doc = Html::parse_document(LISTING);
        let ex = extractor();
        assert_eq!(ex.talk_refs(&doc, &base()), ex.talk_refs(&doc, &base()));
        assert_eq!(ex.next_page(&doc, &base()), ex.next_page(&doc, &base()));

        let doc = Html::parse_document(TRANSCRIPT);
        let table = SelectorTable {
            transcript_paragraph: "div.cell".into(),
            transcript_text: "p".into(),
            ..SelectorTable::default()
        };
        let ex = Extractor::new(&table).unwrap();
        assert_eq!(ex.paragraphs(&doc), ex.paragraphs(&doc));
        assert_eq!(ex.languages(&doc), ex.languages(&doc));
    }

    #[test]
    fn test_next_page() {
        let doc = Html::parse_document(LISTING);
        assert_eq!(
            extractor().next_page(&doc, &base()).as_deref(),
            Some("https://www.ted.com/talks?page=3")
        );

        let last = Html::parse_document(
            r#"<div class="pagination"><a class="pagination__prev" href="/talks?page=1">Prev</a></div>"#,
        );
        assert_eq!(extractor().next_page(&last, &base()), None);

        let bare = Html::parse_document("<p>no pagination</p>");
        assert_eq!(extractor().next_page(&bare, &base()), None);
    }

    #[test]
    fn test_talk_ref_from_page() {
        let doc = Html::parse_document(
            r#"<html><head>
<title>Ken Robinson: Do schools kill creativity? | TED Talk</title>
<meta name="title" content="Do schools kill creativity?">
<meta itemprop="uploadDate" content="2006-06-27T00:11:00+00:00">
</head><body></body></html>"#,
        );
        let talk = extractor().talk_ref_from_page(&doc, "https://www.ted.com/talks/x");
        assert_eq!(talk.title, "Do schools kill creativity?");
        assert_eq!(talk.posted_date, "2006-06-27");
        assert_eq!(talk.url, "https://www.ted.com/talks/x");

        let bare = Html::parse_document("<html><head><title> Plain </title></head></html>");
        let talk = extractor().talk_ref_from_page(&bare, "https://www.ted.com/talks/y");
        assert_eq!(talk.title, "Plain");
        assert_eq!(talk.posted_date, "");
    }

    #[test]
    fn test_topics() {
        let doc = Html::parse_document(TALK);
        let topics = extractor().topics(&doc, "https://www.ted.com/talks/x").unwrap();
        assert_eq!(topics, vec!["Culture", "Education"]);
    }

    #[test]
    fn test_topics_container_missing_is_schema_mismatch() {
        let doc = Html::parse_document("<html><body><p>redesigned</p></body></html>");
        let err = extractor()
            .topics(&doc, "https://www.ted.com/talks/x")
            .unwrap_err();
        match err {
            CrawlError::SchemaMismatch { url, container } => {
                assert_eq!(url, "https://www.ted.com/talks/x");
                assert_eq!(container, "div.talk-topics");
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_paragraphs_sibling_layout() {
        let table = SelectorTable {
            transcript_paragraph: "div.cell".into(),
            transcript_text: "p".into(),
            ..SelectorTable::default()
        };
        let doc = Html::parse_document(TRANSCRIPT);
        let nodes = Extractor::new(&table).unwrap().paragraphs(&doc);
        assert_eq!(
            nodes,
            vec![
                ParagraphNode::Text("Good morning. How are you?".into()),
                ParagraphNode::Time("00:12".into()),
                ParagraphNode::Text("It's been great.".into()),
                ParagraphNode::Time("01:05".into()),
                ParagraphNode::Text("Thank you.".into()),
            ]
        );
    }

    #[test]
    fn test_paragraphs_default_layout() {
        let doc = Html::parse_document(
            r#"
<p class="talk-transcript__para">
  <data class="talk-transcript__para__time">0:11</data>
  <span class="talk-transcript__para__text">Good morning.
  How are you?</span>
</p>
<p class="talk-transcript__para">
  <data class="talk-transcript__para__time">0:24</data>
  <span class="talk-transcript__para__text">(Laughter)</span>
</p>"#,
        );
        let nodes = extractor().paragraphs(&doc);
        assert_eq!(
            nodes,
            vec![
                ParagraphNode::Time("0:11".into()),
                ParagraphNode::Text("Good morning. How are you?".into()),
                ParagraphNode::Time("0:24".into()),
                ParagraphNode::Text("(Laughter)".into()),
            ]
        );
    }

    #[test]
    fn test_languages_exclude_sentinel_and_duplicates() {
        let doc = Html::parse_document(TRANSCRIPT);
        assert_eq!(extractor().languages(&doc), vec!["en", "ja", "fr"]);

        let none = Html::parse_document("<p>no selector</p>");
        assert!(extractor().languages(&none).is_empty());
    }

    #[test]
    fn test_catalog() {
        let doc = Html::parse_document(
            r#"
<div class="languages__list__language"><a href="/talks?language=ja">Japanese</a> 3,412 talks</div>
<div class="languages__list__language"><a href="/talks?language=zh-tw">Chinese, Traditional</a></div>
<div class="languages__list__language"><span>broken</span></div>"#,
        );
        let langs = extractor().catalog(&doc, &base());
        assert_eq!(langs.len(), 2);
        assert_eq!(langs[0].name, "Japanese");
        assert_eq!(langs[0].code, "ja");
        assert_eq!(langs[0].talk_count, Some(3412));
        assert_eq!(langs[1].code, "zh-tw");
        assert_eq!(langs[1].talk_count, None);
    }
}
