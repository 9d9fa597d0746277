//! Exponential backoff around any [`Fetch`] implementation.
//!
//! # Retry Strategy
//!
//! - Only transient failures are retried (transport errors, 5xx, 429)
//! - Exponential backoff starting at `base_delay`
//! - Delay capped at `max_delay`
//! - Random jitter (0-250ms) added to every delay

use crate::config::RetryConfig;
use crate::error::FetchError;
use crate::fetch::Fetch;
use rand::{Rng, rng};
use scraper::Html;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Decorator that retries transient fetch failures with exponential backoff.
///
/// The delay between retries follows:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl<T> RetryFetch<T>
where
    T: Fetch,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }

    pub fn from_config(inner: T, config: &RetryConfig) -> Self {
        Self::new(
            inner,
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
        )
        .with_max_delay(Duration::from_millis(config.max_delay_ms))
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Disable jitter, for deterministic delays.
    #[cfg(test)]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(31) as u32;
        let mut delay = self.base_delay.saturating_mul(1u32 << shift);
        if delay > self.max_delay {
            delay = self.max_delay;
        }
        if self.jitter {
            let jitter_ms: u64 = rng().random_range(0..=250);
            delay += Duration::from_millis(jitter_ms);
        }
        delay
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Fetch for RetryFetch<T>
where
    T: Fetch,
{
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<Html, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.fetch(url).await {
                Ok(doc) => return Ok(doc),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !e.is_transient() {
                        return Err(e);
                    }
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchCause;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays a scripted sequence of outcomes and counts calls.
    struct Scripted {
        outcomes: RefCell<VecDeque<Result<&'static str, FetchCause>>>,
        calls: RefCell<usize>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<&'static str, FetchCause>>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes.into()),
                calls: RefCell::new(0),
            }
        }
    }

    impl Fetch for Scripted {
        async fn fetch(&self, url: &str) -> Result<Html, FetchError> {
            *self.calls.borrow_mut() += 1;
            match self.outcomes.borrow_mut().pop_front() {
                Some(Ok(body)) => Ok(Html::parse_document(body)),
                Some(Err(cause)) => Err(FetchError::new(url, cause)),
                None => Err(FetchError::new(url, FetchCause::Status(500))),
            }
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let inner = Scripted::new(vec![
            Err(FetchCause::Status(503)),
            Err(FetchCause::Transport("reset".into())),
            Ok("<p>ok</p>"),
        ]);
        let retry = RetryFetch::new(&inner, 3, Duration::from_millis(1)).without_jitter();
        assert!(retry.fetch("https://example.com").await.is_ok());
        assert_eq!(*inner.calls.borrow(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = Scripted::new(vec![]);
        let retry = RetryFetch::new(&inner, 2, Duration::from_millis(1)).without_jitter();
        let err = retry.fetch("https://example.com").await.unwrap_err();
        assert_eq!(err.cause, FetchCause::Status(500));
        assert_eq!(*inner.calls.borrow(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let inner = Scripted::new(vec![Err(FetchCause::Status(404)), Ok("<p>late</p>")]);
        let retry = RetryFetch::new(&inner, 5, Duration::from_millis(1)).without_jitter();
        let err = retry.fetch("https://example.com").await.unwrap_err();
        assert_eq!(err.cause, FetchCause::Status(404));
        assert_eq!(*inner.calls.borrow(), 1);
    }

    #[test]
    fn test_delay_for_doubles_and_caps() {
        let inner = Scripted::new(vec![]);
        let retry = RetryFetch::new(&inner, 5, Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .without_jitter();
        assert_eq!(retry.delay_for(1), Duration::from_secs(1));
        assert_eq!(retry.delay_for(2), Duration::from_secs(2));
        assert_eq!(retry.delay_for(3), Duration::from_secs(4));
        assert_eq!(retry.delay_for(4), Duration::from_secs(5));
        assert_eq!(retry.delay_for(60), Duration::from_secs(5));
    }
}
