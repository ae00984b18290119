//! Bounded retry with exponential backoff for model calls.

use crate::error::LlmError;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

/// Retry policy for upstream model calls.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial backoff duration.
    #[serde(default = "default_initial_backoff", with = "millis")]
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    #[serde(default = "default_max_backoff", with = "millis")]
    pub max_backoff: Duration,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(500)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(20)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Executes an async operation, retrying retryable failures.
    ///
    /// A rate-limit error that names a retry delay waits that long instead
    /// of the computed backoff, capped at `max_backoff`.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts are exhausted, or the first
    /// non-retryable error.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() || attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let delay = match &e {
                        LlmError::RateLimited {
                            retry_after_secs: Some(secs),
                        } => Duration::from_secs(*secs).min(self.max_backoff),
                        _ => backoff,
                    };

                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying model call"
                    );

                    tokio::time::sleep(delay).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
