//! Rate-limit retry with exponential backoff
//!
//! Retries an upstream call only while it reports HTTP 429. Every other
//! outcome (success or any other error) is returned immediately.
//!
//! **Backoff:** `initial_backoff_ms * 2^(attempt - 1)` between attempts, i.e.
//! 1s then 2s with the default policy. No sleep follows the final attempt;
//! the rate-limit error is returned straight away.

use safereads_common::config::RetryConfig;
use std::future::Future;
use std::time::Duration;

/// Errors that can signal an upstream rate limit
pub trait RateLimitSignal {
    fn is_rate_limited(&self) -> bool;

    /// HTTP status behind the error, when there is one
    fn status(&self) -> Option<u16>;
}

/// Backoff before the attempt following `attempt` (1-based)
pub fn backoff_for_attempt(policy: &RetryConfig, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(16);
    Duration::from_millis(policy.initial_backoff_ms.saturating_mul(factor))
}

/// Run `operation` up to `policy.max_attempts` times while it is rate limited
pub async fn retry_on_rate_limit<F, Fut, T, E>(
    operation_name: &str,
    policy: RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RateLimitSignal,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Upstream call succeeded after rate-limit retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if err.is_rate_limited() && attempt < max_attempts => {
                let backoff = backoff_for_attempt(&policy, attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    status = err.status(),
                    "Upstream rate limited, will retry after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => {
                if err.is_rate_limited() {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        status = err.status(),
                        "Upstream still rate limited, giving up"
                    );
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Limited,
        Broken,
    }

    impl RateLimitSignal for TestError {
        fn is_rate_limited(&self) -> bool {
            matches!(self, TestError::Limited)
        }

        fn status(&self) -> Option<u16> {
            match self {
                TestError::Limited => Some(429),
                TestError::Broken => None,
            }
        }
    }

    fn fast_policy() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 1,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryConfig::default();
        assert_eq!(backoff_for_attempt(&policy, 1), Duration::from_secs(1));
        assert_eq!(backoff_for_attempt(&policy, 2), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(&policy, 3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_succeeds_after_two_rate_limits() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_on_rate_limit("test_op", fast_policy(), || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(TestError::Limited)
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), TestError> = retry_on_rate_limit("test_op", fast_policy(), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Limited) }
        })
        .await;

        assert_eq!(result, Err(TestError::Limited));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_error_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), TestError> = retry_on_rate_limit("test_op", fast_policy(), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Broken) }
        })
        .await;

        assert_eq!(result, Err(TestError::Broken));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
