//! Retry and throttling policy shared by the vendor clients
//!
//! One policy object configured per client; call sites never hand-roll
//! sleep loops.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::warn;

use crate::error::VendorError;

/// Bounded exponential backoff for retryable vendor failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Run `op` until it succeeds, fails non-retryably, or attempts run out.
    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T, VendorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VendorError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        op = op_name,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "vendor call failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }
}

/// Minimum spacing between calls to one vendor API (rate-limit courtesy)
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Sleep until the minimum interval since the previous call has passed.
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = policy
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(VendorError::Unavailable("boom".to_string()))
                    } else {
                        Ok(41)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 41);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(VendorError::Unavailable("down".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_auth_errors_are_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(VendorError::Auth("bad credentials".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(VendorError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spaces_calls() {
        let throttle = Throttle::new(Duration::from_millis(200));

        let start = Instant::now();
        throttle.wait().await;
        throttle.wait().await;
        throttle.wait().await;

        // two enforced gaps of 200ms each under the paused clock
        assert!(start.elapsed() >= Duration::from_millis(400));
    }
}
