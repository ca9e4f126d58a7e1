//! Fixed-delay retry for flaky remote operations.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1).
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(10),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed on every attempt; carries the last error.
    Failed { error: E, attempts: u32 },
}

/// Execute an async operation, retrying after a fixed delay.
///
/// The delay is a `tokio::time::sleep`, so only the calling task waits.
///
/// # Example
/// ```ignore
/// let policy = RetryPolicy::new("fetch_video").with_max_attempts(3);
/// let result = retry_async(&policy, || async { client.get(url).send().await }).await;
/// ```
pub async fn retry_async<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> RetryResult<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
        match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) if attempt < max_attempts => {
                warn!(
                    "{} attempt {}/{} failed, retrying in {:?}: {}",
                    policy.operation_name, attempt, max_attempts, policy.delay, e
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                debug!("{} failed after {} attempts", policy.operation_name, attempt);
                return RetryResult::Failed {
                    error: e,
                    attempts: attempt,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_async_immediate_success() {
        let policy = RetryPolicy::new("test");
        let call_count = AtomicU32::new(0);

        let result = retry_async(&policy, || {
            call_count.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(42) }
        })
        .await;

        assert!(matches!(result, RetryResult::Success(42)));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_async_eventual_success() {
        let policy = RetryPolicy::new("test").with_delay(Duration::from_millis(1));
        let call_count = AtomicU32::new(0);

        let result = retry_async(&policy, || {
            let count = call_count.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err("transient error")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert!(matches!(result, RetryResult::Success(42)));
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_async_exhausts_attempts() {
        let policy = RetryPolicy::new("test")
            .with_max_attempts(3)
            .with_delay(Duration::from_millis(1));
        let call_count = AtomicU32::new(0);

        let result = retry_async(&policy, || {
            let count = call_count.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(format!("failure {count}")) }
        })
        .await;

        match result {
            RetryResult::Failed { error, attempts } => {
                assert_eq!(attempts, 3);
                assert_eq!(error, "failure 2");
            }
            RetryResult::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_non_blocking_sleep() {
        let policy = RetryPolicy::new("test")
            .with_max_attempts(2)
            .with_delay(Duration::from_secs(10));
        let start = tokio::time::Instant::now();

        let result = retry_async(&policy, || async { Err::<(), _>("down") }).await;

        assert!(matches!(result, RetryResult::Failed { attempts: 2, .. }));
        assert!(start.elapsed() >= Duration::from_secs(10));
    }
}
