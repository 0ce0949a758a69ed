use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::debug;

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt, so total attempts = max_retries + 1.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

impl RetrySettings {
    /// delay(n) = initial_delay * 2^(n-1) for the n-th retry.
    pub(crate) fn delay_ms(&self, retry: u32) -> u64 {
        self.initial_delay_ms.saturating_mul(1u64 << (retry - 1).min(63))
    }
}

/// Run an async operation, retrying only rate-limit responses with
/// exponential backoff. Any other error propagates immediately; once the
/// retries are exhausted the last error is returned.
pub async fn with_backoff<T, F, Fut>(
    settings: RetrySettings,
    mut operation: F,
) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retry < settings.max_retries => {
                retry += 1;
                let delay = settings.delay_ms(retry);
                debug!(
                    "rate limited, retrying in {}ms (retry {}/{})",
                    delay, retry, settings.max_retries
                );
                sleep(Duration::from_millis(delay)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Minimum-interval pacer for the wallet loop. The first `acquire` passes
/// straight through; each following one waits until a full interval has
/// elapsed since the previous pass, regardless of how long the work in
/// between took.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    next_slot: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: None,
        }
    }

    pub async fn acquire(&mut self) {
        if let Some(slot) = self.next_slot {
            sleep_until(slot).await;
        }
        self.next_slot = Some(Instant::now() + self.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delays_double_per_retry() {
        let settings = RetrySettings {
            max_retries: 5,
            initial_delay_ms: 1000,
        };
        assert_eq!(settings.delay_ms(1), 1000);
        assert_eq!(settings.delay_ms(2), 2000);
        assert_eq!(settings.delay_ms(3), 4000);
        assert_eq!(settings.delay_ms(4), 8000);
        assert_eq!(settings.delay_ms(5), 16000);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_exhausts_after_max_retries_plus_one_attempts() {
        let settings = RetrySettings {
            max_retries: 5,
            initial_delay_ms: 1000,
        };
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(settings, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(LedgerError::RateLimited) }
        })
        .await;
        assert!(matches!(result, Err(LedgerError::RateLimited)));
        assert_eq!(attempts.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_error_propagates_immediately() {
        let settings = RetrySettings::default();
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(settings, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(LedgerError::NotFound) }
        })
        .await;
        assert!(matches!(result, Err(LedgerError::NotFound)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_once_rate_limit_clears() {
        let settings = RetrySettings::default();
        let attempts = AtomicU32::new(0);
        let result = with_backoff(settings, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LedgerError::RateLimited)
                } else {
                    Ok(42u64)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_spaces_out_acquires() {
        let mut throttle = Throttle::new(Duration::from_millis(1000));
        let start = Instant::now();
        throttle.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        throttle.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
