use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

/// Minimum spacing between requests to one source.
///
/// Callers queue on the lock, so concurrent requests through the same limiter
/// are spaced out too. Nothing is shared across processes.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_fetch: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_fetch: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Sleep until `min_interval` has passed since the previous call.
    pub async fn wait(&self) {
        self.wait_at_least(self.min_interval).await;
    }

    /// Like [`wait`](Self::wait) with a wider interval, e.g. a robots.txt crawl delay.
    pub async fn wait_at_least(&self, interval: Duration) {
        let interval = interval.max(self.min_interval);
        let mut last = self.last_fetch.lock().await;

        if let Some(at) = *last {
            let elapsed = at.elapsed();
            if elapsed < interval {
                let remaining = interval - elapsed;
                debug!(delay_ms = remaining.as_millis() as u64, "Rate limiting");
                tokio::time::sleep(remaining).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_first_call_does_not_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_back_to_back_calls_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_second_wait_pending_within_interval() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        assert_ready!(task::spawn(limiter.wait()).poll());

        let mut second = task::spawn(limiter.wait());
        assert_pending!(second.poll());
    }

    #[tokio::test]
    async fn test_wider_interval_respected() {
        let limiter = RateLimiter::new(Duration::from_millis(10));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait_at_least(Duration::from_millis(120)).await;
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_concurrent_callers_serialized() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(50)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.wait().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
