//! Turning URLs into parsed documents.
//!
//! [`Fetch`] is the seam between the crawler and the network. [`HttpFetcher`]
//! is the production implementation: a plain HTTP GET that follows redirects
//! and treats any non-2xx status as a [`FetchError`]. It never retries; retry
//! policy lives in [`crate::retry::RetryFetch`].

use crate::config::CrawlConfig;
use crate::error::{CrawlError, FetchCause, FetchError, Result};
use reqwest::Client;
use scraper::Html;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Something that can fetch a URL and hand back a parsed document.
pub trait Fetch {
    /// Fetch `url` and parse the body.
    ///
    /// Absence is always a typed failure; there is no empty document.
    async fn fetch(&self, url: &str) -> std::result::Result<Html, FetchError>;
}

impl<T: Fetch + ?Sized> Fetch for &T {
    async fn fetch(&self, url: &str) -> std::result::Result<Html, FetchError> {
        (**self).fetch(url).await
    }
}

/// HTTP implementation of [`Fetch`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    /// Pause before every request.
    delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CrawlError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            delay: Duration::from_millis(config.request_delay_ms),
        })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> std::result::Result<Html, FetchError> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::new(url, FetchCause::Transport(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Non-success status");
            return Err(FetchError::new(url, FetchCause::Status(status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::new(url, FetchCause::Body(e.to_string())))?;
        debug!(%url, bytes = body.len(), "Fetched document");
        Ok(Html::parse_document(&body))
    }
}
