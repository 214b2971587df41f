//! Exponential-backoff retry, matching
//! `original_source/ddb/python/iddb/gdbserver_starter.py`'s
//! `SSHRemoteServerClient`/`SSHBridgeRemoteServerClient` connect loops:
//! `base_delay=0.5s`, `backoff_factor=2`, `max_retries=5`, each delay capped
//! so a flaky link can't stall startup for minutes.

use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

/// Retry parameters for a connect operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: u32,
    /// Total attempts made before giving up, including the first.
    pub max_retries: u32,
    /// Upper bound on any single delay.
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            backoff_factor: 2,
            max_retries: 5,
            cap: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// The delay to sleep after the `attempt`th failure (0-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scale = self.backoff_factor.saturating_pow(attempt);
        let delay = self.base_delay.saturating_mul(scale);
        delay.min(self.cap)
    }
}

/// Runs `op` until it succeeds or `policy.max_retries` attempts are spent,
/// sleeping with exponential backoff between failures.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut last_err = None;
    for attempt in 0..policy.max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let delay = policy.delay_for(attempt);
                tracing::info!(
                    target = label,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "connect attempt failed, retrying"
                );
                last_err = Some(err);
                if attempt + 1 < policy.max_retries {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(TransportError::RetriesExhausted {
        attempts: policy.max_retries,
        source: Box::new(last_err.expect("loop runs at least once since max_retries > 0")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_geometrically_and_is_capped() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(500),
            backoff_factor: 2,
            max_retries: 5,
            cap: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        // Would be 16s uncapped; clamped to the 10s ceiling.
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            backoff_factor: 2,
            max_retries: 5,
            cap: Duration::from_millis(5),
        };
        let result = retry_with_backoff(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(TransportError::Closed)
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            backoff_factor: 2,
            max_retries: 3,
            cap: Duration::from_millis(5),
        };
        let err = retry_with_backoff(&policy, "test", || async { Err::<(), _>(TransportError::Closed) })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::RetriesExhausted { attempts: 3, .. }
        ));
    }
}
