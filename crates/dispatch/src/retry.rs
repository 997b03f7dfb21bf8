//! Bounded retry with exponential backoff for provider sends.

use std::future::Future;
use std::time::Duration;

use promet_notifier::SendError;

/// How many times to try a send and how long to wait in between.
///
/// There is no sleep after the final attempt, so the default schedule waits
/// 10s, 20s, 40s and 80s; the fifth delay (160s) is never reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles after each further failure.
    pub initial_delay: Duration,
    /// Upper bound on a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a retried operation together with the attempts it took.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, SendError>,
    pub attempts: u32,
}

impl RetryPolicy {
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay after the given failed attempt (1-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(1 << shift)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. The last error is returned as-is.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Attempted<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SendError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match tokio::time::timeout(self.attempt_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(SendError::Timeout(self.attempt_timeout)),
            };

            let err = match result {
                Ok(value) => {
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= max_attempts {
                tracing::warn!(
                    operation = label,
                    attempt,
                    error = %err,
                    "Send failed, giving up"
                );
                return Attempted {
                    result: Err(err),
                    attempts: attempt,
                };
            }

            let delay = self.delay_after(attempt);
            tracing::warn!(
                operation = label,
                attempt,
                delay_secs = delay.as_secs(),
                error = %err,
                "Send failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
