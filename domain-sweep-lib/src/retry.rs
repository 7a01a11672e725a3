//! Bounded retries with exponential backoff.

use std::future::Future;
use std::time::Duration;

/// Retries an async operation up to `retries + 1` times.
///
/// Between attempts it sleeps `base_delay * 2^attempt`, with attempts
/// numbered from 0. The policy knows nothing about what it retries: every
/// error is retried, and the last one is returned unchanged once attempts
/// run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
        }
    }

    /// Delay before the attempt following `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.retries => {
                    let delay = self.backoff(attempt);
                    tracing::debug!(
                        attempt = attempt + 1,
                        max_attempts = self.retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_success() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(500));

        let start = Instant::now();
        let result: Result<u32, String> = policy
            .run(|| {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 2 {
                        Err(format!("fail {}", n))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.get(), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_and_returns_last_error() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(500));

        let start = Instant::now();
        let result: Result<(), String> = policy
            .run(|| {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Err(format!("fail {}", n)) }
            })
            .await;

        assert_eq!(result, Err("fail 3".to_string()));
        assert_eq!(calls.get(), 3);
        // 500ms after attempt 0, 1000ms after attempt 1, no sleep after the last
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[test]
    fn test_zero_retries_runs_once() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(0, Duration::from_millis(500));

        let result: Result<(), &str> = tokio_test::block_on(policy.run(|| {
            calls.set(calls.get() + 1);
            async { Err("nope") }
        }));

        assert_eq!(result, Err("nope"));
        assert_eq!(calls.get(), 1);
    }
}
