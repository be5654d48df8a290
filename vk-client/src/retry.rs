use repostbot_core::{CoreError, ErrorExt};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Retry config tuned for the VK API: slow start, generous cap, and
    /// enough jitter that parallel deployments do not hammer in lockstep.
    pub fn vk() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = exp.min(self.max_delay_ms as f64);
        let jitter = capped * self.jitter_factor * fastrand::f64();
        Duration::from_millis((capped + jitter) as u64)
    }
}

/// Runs `operation` until it succeeds, returns a non-retryable error, or
/// exhausts `max_attempts`. Retryable errors that carry their own
/// retry-after hint (rate limiting) override the computed backoff.
pub async fn execute_with_retry<F, Fut, T>(
    config: &RetryConfig,
    context: &str,
    mut operation: F,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{} succeeded on attempt {}", context, attempt + 1);
                }
                return Ok(value);
            }
            Err(error) => {
                attempt += 1;
                if attempt >= config.max_attempts || !error.is_retryable() {
                    return Err(error);
                }

                let delay = error
                    .retry_after()
                    .unwrap_or_else(|| config.delay_for_attempt(attempt - 1));

                warn!(
                    "{} failed (attempt {}/{}), retrying after {:?}: {}",
                    context, attempt, config.max_attempts, delay, error
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repostbot_core::VkApiError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = execute_with_retry(&fast_config(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, CoreError>(7) }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = execute_with_retry(&fast_config(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CoreError::VkApi(VkApiError::ServerError {
                        status_code: 500,
                    }))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = execute_with_retry(&fast_config(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CoreError::VkApi(VkApiError::PermissionDenied {
                    method: "wall.post".to_string(),
                }))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = execute_with_retry(&fast_config(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CoreError::VkApi(VkApiError::ServerError {
                    status_code: 502,
                }))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
