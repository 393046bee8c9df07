//! Retry engine: exponential backoff with jitter for model transport calls.
//!
//! Only the transport retries. The orchestration loop never re-sends a turn.

use anyhow::Result;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay between retries in milliseconds.
    pub base_delay_ms: u64,
    /// Multiplier for each subsequent wait (exponential factor).
    pub backoff_factor: f64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Add random jitter (±25% of computed delay) to avoid thundering herd.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 10_000,
            jitter: true,
        }
    }
}

/// Outcome of one failed attempt.
#[derive(Debug)]
pub enum AttemptError {
    /// Worth another try (rate limit, 5xx, connection trouble).
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

impl AttemptError {
    /// Classify an HTTP status that was not a success.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let err = anyhow::anyhow!("HTTP {status}: {body}");
        if is_retryable_status(status) {
            AttemptError::Transient(err)
        } else {
            AttemptError::Fatal(err)
        }
    }

    /// Classify a reqwest send error.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            AttemptError::Transient(err.into())
        } else {
            AttemptError::Fatal(err.into())
        }
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Compute the delay before retry `attempt_number` (1-indexed).
    pub fn delay_for(&self, attempt_number: u32) -> Duration {
        if attempt_number == 0 {
            return Duration::ZERO;
        }
        let delay_ms = self.capped_delay_ms(attempt_number);

        let delay_ms = if self.jitter {
            let jitter = (delay_ms / 4) as i64;
            let offset: i64 = if jitter > 0 {
                (rand_offset() % (jitter as u64 * 2)) as i64 - jitter
            } else {
                0
            };
            (delay_ms as i64 + offset).max(0) as u64
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms)
    }

    fn capped_delay_ms(&self, attempt_number: u32) -> u64 {
        let delay_ms = self.base_delay_ms as f64 * self.backoff_factor.powi((attempt_number - 1) as i32);
        delay_ms.min(self.max_delay_ms as f64) as u64
    }

    /// Upper bound on the total sleep between attempts when every retry is used.
    pub fn worst_case_backoff(&self) -> Duration {
        let total_ms: u64 = (1..=self.max_retries)
            .map(|n| {
                let delay_ms = self.capped_delay_ms(n);
                if self.jitter { delay_ms + delay_ms / 4 } else { delay_ms }
            })
            .sum();
        Duration::from_millis(total_ms)
    }

    pub fn should_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }

    /// Run `op` until it succeeds, fails fatally, or retries run out.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, AttemptError>>,
    {
        let mut retries = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::Transient(err)) => {
                    if !self.should_retry(retries) {
                        return Err(err.context(format!("{label}: giving up after {} retries", retries)));
                    }
                    retries += 1;
                    let delay = self.delay_for(retries);
                    warn!(
                        target_call = label,
                        attempt = retries,
                        max = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient transport failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Simple xorshift64 for jitter without pulling in a full rand dep.
fn rand_offset() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static SEED: AtomicU64 = AtomicU64::new(0x9e3779b97f4a7c15);
    let x = SEED.load(Ordering::Relaxed);
    let x = x ^ (x << 13);
    let x = x ^ (x >> 7);
    let x = x ^ (x << 17);
    SEED.store(x, Ordering::Relaxed);
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            base_delay_ms: 1,
            jitter: false,
            ..Default::default()
        }
    }

    #[test]
    fn exponential_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_delay_ms: 3_000,
            jitter: false,
            ..Default::default()
        };
        assert_eq!(policy.delay_for(1).as_millis(), 500);
        assert_eq!(policy.delay_for(2).as_millis(), 1_000);
        assert_eq!(policy.delay_for(10).as_millis(), 3_000);
    }

    #[test]
    fn worst_case_backoff_bounds_every_jittered_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.worst_case_backoff(), Duration::from_millis(625 + 1_250));

        for _ in 0..200 {
            let slept: Duration = (1..=policy.max_retries).map(|n| policy.delay_for(n)).sum();
            assert!(slept <= policy.worst_case_backoff());
        }

        let none = RetryPolicy::default().with_max_retries(0);
        assert_eq!(none.worst_case_backoff(), Duration::ZERO);
    }

    #[test]
    fn classifies_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast()
            .run("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AttemptError::Transient(anyhow::anyhow!("503")))
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = fast()
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AttemptError::Fatal(anyhow::anyhow!("401")))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = fast()
            .with_max_retries(1)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AttemptError::Transient(anyhow::anyhow!("429")))
            })
            .await;
        assert!(result.unwrap_err().to_string().contains("giving up"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
