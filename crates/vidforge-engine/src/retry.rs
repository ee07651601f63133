//! Retry policy with exponential backoff and jitter.
//!
//! Retries only the retryable provider classes (throttle, transient).
//! Honors a vendor Retry-After hint when one was supplied.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use vidforge_providers::{ProviderError, ProviderResult};

use crate::metrics::record_retry;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the initial one).
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Delay cap.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

/// Execute an async provider operation with retry.
///
/// Retries on throttle and transient classes only; permanent rejections and
/// malformed responses propagate immediately.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    op: F,
) -> ProviderResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = calculate_delay(config, attempt, e.retry_after());

                warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Provider call failed, retrying: {}",
                    e
                );
                record_retry(operation);

                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| ProviderError::transient("retries exhausted")))
}

/// Exponential backoff with full jitter, capped at `max_delay`.
pub(crate) fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after: Option<Duration>) -> Duration {
    // A vendor hint wins outright.
    if let Some(after) = retry_after {
        return after;
    }

    let exp_delay = config
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt));
    let capped = exp_delay.min(config.max_delay);

    // Full jitter without pulling in a rand dependency.
    let jittered = {
        use std::time::SystemTime;
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let factor = (nanos % 1000) as f64 / 1000.0;
        capped.mul_f64(factor)
    };

    jittered.max(config.base_delay.min(capped))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_calculate_delay_honors_retry_after() {
        let config = RetryConfig::default();
        let delay = calculate_delay(&config, 0, Some(Duration::from_secs(7)));
        assert_eq!(delay, Duration::from_secs(7));
    }

    #[test]
    fn test_calculate_delay_respects_cap() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(2),
        };
        let delay = calculate_delay(&config, 10, None);
        assert!(delay <= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retried_until_success() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::default().with_max_retries(3);

        let result = with_retry(&config, "poll", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::transient("flaky"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_is_not_retried() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::default();

        let result: ProviderResult<()> = with_retry(&config, "submit", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::Rejected {
                    status: 400,
                    message: "bad".into(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::default().with_max_retries(2);

        let result: ProviderResult<()> = with_retry(&config, "poll", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::transient("still down")) }
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3); // initial + 2 retries
    }
}
