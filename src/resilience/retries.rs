//! Retry loop for idempotent chain reads.
//!
//! Only reads go through here. Signing and broadcast are never retried:
//! a repeated signing request is a new activity, and a rejected broadcast
//! needs a rebuilt transaction.

use std::future::Future;

use crate::blockchain::types::{ChainError, ChainResult};
use crate::resilience::backoff::RetryPolicy;

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
pub async fn retry_read<T, F, Fut>(policy: &RetryPolicy, name: &'static str, mut operation: F) -> ChainResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ChainResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && is_retryable(&e) => {
                let delay = policy.delay(attempt);
                tracing::info!(
                    operation = name,
                    attempt,
                    delay = ?delay,
                    error = %e,
                    "Retrying chain read"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if attempt > 1 {
                    tracing::warn!(operation = name, attempts = attempt, error = %e, "Chain read failed after retries");
                }
                return Err(e);
            }
        }
    }
}

/// Transport failures, throttling, and 5xx answers are worth repeating.
pub fn is_retryable(error: &ChainError) -> bool {
    error.is_transient()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_read(&policy(3), "nonce", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ChainError::Network("connection reset".into()))
            } else {
                Ok(7u64)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_fail_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: ChainResult<u64> = retry_read(&policy(5), "balance", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ChainError::Query {
                status: 400,
                message: "bad address".into(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_bounded() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: ChainResult<u64> = retry_read(&policy(4), "nonce", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ChainError::Query {
                status: 503,
                message: "unavailable".into(),
            })
        })
        .await;

        assert!(matches!(result, Err(ChainError::Query { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
