//! Retry utilities with exponential backoff.
//!
//! Every external AI call goes through [`retry_async_if`]: one retry by
//! default, and only for errors the predicate marks as transient.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    /// Set the base delay for exponential backoff.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Same policy under another operation name.
    pub fn named(&self, operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..self.clone()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed after all retries exhausted, or with a permanent error.
    Failed { error: E, attempts: u32 },
}

/// Execute an async operation, retrying only errors accepted by `should_retry`.
///
/// # Example
/// ```ignore
/// let config = RetryConfig::new("critique");
/// let result = retry_async_if(&config, AiError::is_retryable, || async {
///     critic.critique(&frame).await
/// }).await;
/// ```
pub async fn retry_async_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    should_retry: P,
    operation: F,
) -> RetryResult<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) if attempt < config.max_retries && should_retry(&e) => {
                let delay = config.delay_for_attempt(attempt);
                attempt += 1;
                debug!(
                    "{} attempt {} failed, retrying in {:?}: {}",
                    config.operation_name, attempt, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return RetryResult::Failed {
                    error: e,
                    attempts: attempt + 1,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn any_error<E>(_: &E) -> bool {
        true
    }

    fn with_retries(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            ..RetryConfig::new("test").with_base_delay(Duration::from_millis(1))
        }
    }

    #[test]
    fn test_retry_config_delay_calculation() {
        let config = RetryConfig::new("test").with_base_delay(Duration::from_millis(100));

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn test_retry_config_max_delay() {
        let config = RetryConfig {
            max_retries: 10,
            ..RetryConfig::new("test").with_base_delay(Duration::from_secs(1))
        };

        // Should cap at max_delay (5s by default)
        let delay = config.delay_for_attempt(10);
        assert!(delay <= Duration::from_secs(5));
    }

    #[test]
    fn test_named_keeps_policy() {
        let config = with_retries(4).named("b");
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.operation_name, "b");
    }

    #[tokio::test]
    async fn test_retry_async_immediate_success() {
        let config = RetryConfig::new("test");
        let call_count = AtomicU32::new(0);

        let result = retry_async_if(&config, any_error, || {
            call_count.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(42) }
        })
        .await;

        assert!(matches!(result, RetryResult::Success(42)));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_policy_retries_once() {
        let config = RetryConfig::new("test").with_base_delay(Duration::from_millis(1));
        let call_count = AtomicU32::new(0);

        let result = retry_async_if(&config, any_error, || {
            call_count.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>("still down") }
        })
        .await;

        match result {
            RetryResult::Failed { error, attempts } => {
                assert_eq!(error, "still down");
                assert_eq!(attempts, 2);
            }
            RetryResult::Success(_) => panic!("expected failure"),
        }
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_async_eventual_success() {
        let config = with_retries(3);
        let call_count = AtomicU32::new(0);

        let result = retry_async_if(&config, any_error, || {
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
    async fn test_permanent_error_not_retried() {
        let config = RetryConfig::new("test").with_base_delay(Duration::from_millis(1));
        let call_count = AtomicU32::new(0);

        let result = retry_async_if(
            &config,
            |e: &&str| *e != "permanent",
            || {
                call_count.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, _>("permanent") }
            },
        )
        .await;

        assert!(matches!(result, RetryResult::Failed { attempts: 1, .. }));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }
}
