//! Retry policy for transient model overload.

use std::time::Duration;

use tracing::warn;

use crate::error::{GeminiError, GeminiResult};

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,
    /// Base delay, doubled on each attempt.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// Execute an async operation, retrying transient overload errors with
/// exponential backoff. Non-retryable errors return immediately.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    op: F,
) -> GeminiResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = GeminiResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = backoff_delay(config, attempt);
                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "model overloaded, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| GeminiError::upload_failed("retries exhausted")))
}

/// Backoff delay for an attempt: base * 2^attempt.
fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    config.base_delay.saturating_mul(2u32.saturating_pow(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles() {
        let config = RetryConfig::default();
        assert_eq!(backoff_delay(&config, 0), Duration::from_secs(2));
        assert_eq!(backoff_delay(&config, 1), Duration::from_secs(4));
        assert_eq!(backoff_delay(&config, 2), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_overload() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        };
        let attempts = AtomicU32::new(0);

        let result = with_retry(&config, "test", || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(GeminiError::ApiError {
                    status: 503,
                    message: "overloaded".into(),
                })
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_client_error() {
        let config = RetryConfig::default();
        let attempts = AtomicU32::new(0);

        let result: GeminiResult<i32> = with_retry(&config, "test", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(GeminiError::ApiError {
                status: 400,
                message: "bad request".into(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
