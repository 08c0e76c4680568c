//! Bounded retry with a short fixed backoff.
//!
//! Used for submissions, downloads and storage calls against the external
//! services. Errors the caller does not classify as retryable escalate on
//! the first failure.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Delay between attempts.
    pub delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(2),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Run `operation`, retrying while `should_retry` accepts the error.
///
/// At most `max_retries + 1` calls are made. The last error is returned.
pub async fn retry_async<F, Fut, T, E, P>(config: &RetryConfig, should_retry: P, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", config.operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < config.max_retries && should_retry(&e) => {
                attempt += 1;
                warn!(
                    "{} attempt {} failed, retrying in {:?}: {}",
                    config.operation_name, attempt, config.delay, e
                );
                tokio::time::sleep(config.delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(retries: u32) -> RetryConfig {
        RetryConfig::new("test")
            .with_max_retries(retries)
            .with_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let calls = AtomicU32::new(0);
        let result = retry_async(&fast(3), |_: &String| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(42) }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_eventual_success() {
        let calls = AtomicU32::new(0);
        let result = retry_async(&fast(3), |_: &&str| true, || {
            let count = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err("transient error")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_resubmission_bound() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_async(&fast(1), |_: &&str| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("connection reset") }
        })
        .await;

        assert_eq!(result, Err("connection reset"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_escalates_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_async(&fast(5), |e: &&str| *e != "bad request", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("bad request") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
