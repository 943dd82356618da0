//! Status-code driven retry policy.
//!
//! A request whose response status is in the configured retry set is sent
//! again after a fixed pause, until a 2xx arrives or the attempt budget is
//! spent. Failures below HTTP (connection refused, timeouts) are returned
//! immediately and never retried.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Status codes retried by default.
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 6] = [425, 429, 500, 502, 503, 504];

/// Anything carrying an HTTP status code.
pub trait StatusCoded {
    /// The numeric HTTP status.
    fn status_code(&self) -> u16;

    /// Whether the status is 2xx.
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code())
    }
}

impl StatusCoded for reqwest::Response {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Response statuses that trigger a retry
    pub status_codes: BTreeSet<u16>,
    /// Total number of attempts, the first one included
    pub max_attempts: u32,
    /// Pause before each retry
    pub pause: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            status_codes: DEFAULT_RETRY_STATUS_CODES.into_iter().collect(),
            max_attempts: 16,
            pause: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    /// Replace the set of retried status codes.
    #[must_use]
    pub fn with_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.status_codes = codes.into_iter().collect();
        self
    }

    /// Set the total attempt budget (at least one).
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the pause between attempts.
    #[must_use]
    pub const fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

/// Retry policy for re-sending requests that hit a retryable status.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Check if a response status should be retried.
    #[must_use]
    pub fn should_retry(&self, status: u16) -> bool {
        self.config.status_codes.contains(&status)
    }

    /// Send with retries.
    ///
    /// `send` is called once; if the status is retryable it is called again
    /// up to `max_attempts - 1` times, sleeping `pause` before each call and
    /// stopping at the first 2xx. The last response is returned whatever its
    /// status.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `send`.
    pub async fn execute<F, Fut, T, E>(&self, mut send: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: StatusCoded,
    {
        let mut response = send().await?;
        if !self.should_retry(response.status_code()) {
            return Ok(response);
        }

        for attempt in 1..self.max_attempts() {
            debug!(
                attempt = attempt + 1,
                max_attempts = self.max_attempts(),
                status = response.status_code(),
                pause_ms = u64::try_from(self.config.pause.as_millis()).unwrap_or(u64::MAX),
                "retrying request"
            );
            if !self.config.pause.is_zero() {
                tokio::time::sleep(self.config.pause).await;
            }
            response = send().await?;
            if response.is_success() {
                break;
            }
        }

        Ok(response)
    }

    /// Get the total attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Get the underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }
}
