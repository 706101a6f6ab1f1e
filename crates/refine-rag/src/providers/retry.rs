//! Bounded exponential-backoff retries for remote calls

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Retry policy applied by callers of the provider traits
///
/// Only retryable errors (`TransientNetwork`, `RateLimit`) are retried;
/// anything else is returned at once.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    max_retries: u32,
    /// Delay before the first retry
    initial_backoff: Duration,
    /// Cap on any single delay
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `attempt` (0-based)
    ///
    /// Rate limits wait at least what the provider asked for, or four times
    /// the regular backoff when it did not say.
    pub fn delay_for(&self, attempt: u32, error: &Error) -> Duration {
        let exp = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt));
        let delay = match error {
            Error::RateLimit { retry_after, .. } => {
                retry_after.unwrap_or_else(|| exp.saturating_mul(4)).max(exp)
            }
            _ => exp,
        };
        delay.min(self.max_backoff)
    }

    /// Run `operation` until it succeeds, fails fatally or attempts run out
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt, &e);
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        label,
                        attempt + 1,
                        self.max_attempts(),
                        delay,
                        e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!(
                            "{} failed after {} attempts: {}",
                            label,
                            self.max_attempts(),
                            e
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = instant(3)
            .run("embed", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::transient("reset"))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_bounded_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = instant(2)
            .run("complete", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::RateLimit {
                    message: "429".to_string(),
                    retry_after: None,
                })
            })
            .await;

        assert!(matches!(result, Err(Error::RateLimit { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = instant(5)
            .run("complete", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::llm("HTTP 400"))
            })
            .await;

        assert!(matches!(result, Err(Error::Llm(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(1));
        let transient = Error::transient("x");
        assert_eq!(policy.delay_for(0, &transient), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2, &transient), Duration::from_millis(400));
        assert_eq!(policy.delay_for(9, &transient), Duration::from_secs(1));

        let limited = Error::RateLimit {
            message: "429".to_string(),
            retry_after: None,
        };
        assert_eq!(policy.delay_for(0, &limited), Duration::from_millis(400));
    }
}
