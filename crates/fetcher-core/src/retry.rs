//! Retry policy with exponential backoff.
//!
//! [`RetryPolicy`] is applied explicitly at a call site with
//! [`RetryPolicy::run`]. It retries only the [`SourceError`]s it is configured
//! for and logs a warning before every sleep.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::error::SourceError;

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Backoff strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between attempts.
    Fixed {
        /// Delay between attempts.
        delay: Duration,
    },
    /// Uses an exponential delay between attempts.
    ///
    /// After the n-th failed attempt the wait is `multiplier * 2^(n-1)` seconds,
    /// clamped to `[min, max]`.
    Exponential {
        /// Scale applied to the power of two, in seconds.
        multiplier: f64,
        /// Shortest wait.
        min: Duration,
        /// Longest wait.
        max: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            multiplier: 1.0,
            min: Duration::from_secs(2),
            max: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    /// Calculate the wait after a failed attempt.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The number of the attempt that just failed (1-based)
    #[must_use]
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential { multiplier, min, max } => {
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let seconds = multiplier * 2_f64.powi(exponent);
                let clamped = seconds.min(max.as_secs_f64()).max(min.as_secs_f64());
                Duration::from_secs_f64(clamped)
            }
        }
    }
}

/// Retry policy for provider calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// The backoff strategy to use between attempts.
    pub backoff: Backoff,
    /// Whether to retry on connection failures.
    pub retry_on_connect: bool,
    /// Whether to retry on request timeouts.
    pub retry_on_timeout: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
            retry_on_connect: true,
            retry_on_timeout: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default backoff and the given attempt budget.
    #[must_use]
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Create a policy with a fixed delay between attempts.
    #[must_use]
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Check if an error should trigger another attempt.
    #[must_use]
    pub const fn should_retry(&self, error: &SourceError) -> bool {
        match error {
            SourceError::Connection(_) => self.retry_on_connect,
            SourceError::Timeout(_) => self.retry_on_timeout,
            _ => false,
        }
    }

    /// Calculate the wait after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent. The last error is returned as-is.
    pub async fn run<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && self.should_retry(&e) => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        operation = name,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
