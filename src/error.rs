//! Error types for the crawl pipeline.
//!
//! Two kinds of failure matter to the crawler:
//!
//! - [`FetchError`]: the network or HTTP layer could not produce a document.
//! - [`CrawlError::SchemaMismatch`]: a container the record depends on is gone,
//!   which means the site's markup changed.
//!
//! A missing *leaf* (one time label, one posted date) is never an error. It is
//! recorded with a placeholder, see [`crate::config::TimeLabelPolicy`].

use std::fmt;
use std::path::PathBuf;

/// Why a fetch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCause {
    /// Timeout, DNS failure, refused connection, invalid URL.
    Transport(String),
    /// The server answered with a non-2xx status.
    Status(u16),
    /// The body could not be read.
    Body(String),
}

impl fmt::Display for FetchCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchCause::Transport(msg) => write!(f, "transport error: {msg}"),
            FetchCause::Status(code) => write!(f, "HTTP status {code}"),
            FetchCause::Body(msg) => write!(f, "unreadable body: {msg}"),
        }
    }
}

/// A URL could not be turned into a parsed document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to fetch {url}: {cause}")]
pub struct FetchError {
    pub url: String,
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(url: impl Into<String>, cause: FetchCause) -> Self {
        Self {
            url: url.into(),
            cause,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Transport failures, 5xx and 429 are transient; other statuses are not.
    pub fn is_transient(&self) -> bool {
        match self.cause {
            FetchCause::Transport(_) | FetchCause::Body(_) => true,
            FetchCause::Status(code) => code == 429 || (500..600).contains(&code),
        }
    }
}

/// Top-level error type for crawl operations.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A container the record depends on is absent from the page.
    #[error("markup changed at {url}: expected container `{container}` not found")]
    SchemaMismatch { url: String, container: String },

    /// A selector in the extraction table does not compile.
    #[error("invalid selector for `{field}`: {selector}")]
    InvalidSelector { field: String, selector: String },

    #[error("pagination revisited {url}")]
    PaginationCycle { url: String },

    #[error("pagination exceeded {limit} pages")]
    PaginationLimit { limit: usize },

    #[error("I/O error at {path:?}: {source}")]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CrawlError>;

impl CrawlError {
    pub fn schema(url: impl Into<String>, container: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            url: url.into(),
            container: container.into(),
        }
    }

    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// The URL this error is attached to, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            CrawlError::Fetch(e) => Some(&e.url),
            CrawlError::SchemaMismatch { url, .. } | CrawlError::PaginationCycle { url } => {
                Some(url)
            }
            _ => None,
        }
    }
}
