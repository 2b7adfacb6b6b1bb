//! Retry/backoff policy.
//!
//! Every network call in the engine goes through [`RetryPolicy::execute`]:
//! bounded exponential backoff with jitter for transient errors, immediate
//! failure for permanent ones. The policy is an explicit value wrapped
//! around operations rather than an annotation, so it composes with the
//! per-call timeout the orchestrator applies.

use crate::config::RetryConfig;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: f64,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            jitter: config.jitter,
        }
    }

    /// Execute an operation, retrying transient failures with backoff.
    ///
    /// Returns the first success, or the last error once attempts are
    /// exhausted or a permanent error is hit.
    pub async fn execute<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;

        loop {
            debug!("Executing '{}' (attempt {})", operation_name, attempt);

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            "'{}' succeeded after {} attempts",
                            operation_name, attempt
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !error.is_retryable() {
                        debug!(
                            "'{}' failed with non-retryable error: {}",
                            operation_name, error
                        );
                        return Err(error);
                    }

                    if attempt >= self.max_attempts {
                        warn!(
                            "'{}' failed after {} attempts: {}",
                            operation_name, attempt, error
                        );
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt - 1, &error);
                    debug!(
                        "'{}' failed (attempt {}), retrying after {:?}: {}",
                        operation_name, attempt, delay, error
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Backoff delay for the given zero-based attempt index
    fn delay_for(&self, attempt: u32, error: &Error) -> Duration {
        // Rate-limited errors carry their own suggested delay
        if let Some(retry_after) = error.retry_after() {
            return retry_after.min(self.max_delay);
        }

        let base_ms = self.initial_delay.as_millis() as f64;
        let exp_ms = base_ms * self.multiplier.powi(attempt as i32);
        let capped_ms = exp_ms.min(self.max_delay.as_millis() as f64);
        add_jitter(Duration::from_millis(capped_ms as u64), self.jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

/// Add proportional jitter to a delay to avoid thundering herds
fn add_jitter(delay: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return delay;
    }

    use rand::Rng;
    let mut rng = rand::thread_rng();
    let jitter_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
    let jitter = rng.gen_range(0..=jitter_ms);

    delay + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(&RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            multiplier: 2.0,
            jitter: 0.0,
        })
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let result = fast_policy(3)
            .execute("op", || async { Ok::<u32, Error>(42) })
            .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = fast_policy(3)
            .execute("op", move || {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    if count < 2 {
                        Err(Error::TransientSource {
                            source_name: "test".to_string(),
                            reason: "HTTP 503".to_string(),
                        })
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = fast_policy(3)
            .execute("op", move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err::<u32, Error>(Error::PermanentSource {
                        source_name: "test".to_string(),
                        status: 404,
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = fast_policy(2)
            .execute("op", move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err::<u32, Error>(Error::TransientSource {
                        source_name: "test".to_string(),
                        reason: "always down".to_string(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_jitter_bounds() {
        let delay = Duration::from_millis(1000);
        let jittered = add_jitter(delay, 0.1);
        assert!(jittered >= delay);
        assert!(jittered <= delay + Duration::from_millis(100));
    }
}
