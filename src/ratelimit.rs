//! Minimum-interval pacing between calls to a single expensive target.
//!
//! The browser-render PDF backend keeps its own limiter, independent of
//! the per-source pacing implied by sequential strategy execution.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until the minimum interval since the previous call has passed
    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("Rate limiter: waiting {}ms", wait.as_millis());
                sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Whether a call would be admitted right now without waiting
    pub async fn check(&self) -> bool {
        let last = self.last_call.lock().await;
        last.map_or(true, |previous| previous.elapsed() >= self.min_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_call_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        assert!(limiter.check().await);
        limiter.acquire().await;
        assert!(!limiter.check().await);
    }

    #[tokio::test]
    async fn test_spacing_is_enforced() {
        let limiter = RateLimiter::new(Duration::from_millis(30));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
