//! Caller-side transport retry for character library calls.

use std::future::Future;

use nm_core::retry::{next_delay, BackoffConfig, RetryBudget};
use nm_library::LibraryApiError;

/// Run `call` until it succeeds, fails with a non-retryable error, or the
/// budget of `max_attempts` is spent. Timeouts consume an attempt like any
/// other transport failure.
pub async fn with_transport_retry<T, F, Fut>(
    operation: &'static str,
    max_attempts: u32,
    backoff: &BackoffConfig,
    mut call: F,
) -> Result<T, LibraryApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LibraryApiError>>,
{
    let mut budget = RetryBudget::new(max_attempts);
    let mut delay = backoff.initial_delay;

    loop {
        // The retry arm only loops while the budget has room.
        let attempt = budget
            .next_attempt()
            .unwrap_or_else(|| budget.max_attempts());

        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && !budget.is_exhausted() => {
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = budget.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Character library call failed, retrying",
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                delay = next_delay(delay, backoff);
            }
            Err(e) => {
                tracing::warn!(operation, attempt, error = %e, "Character library call failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use assert_matches::assert_matches;

    use super::*;

    fn api_error(status: u16) -> LibraryApiError {
        LibraryApiError::Api {
            status,
            body: "boom".into(),
        }
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_transport_retry("test", 3, &BackoffConfig::immediate(), || async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(api_error(503)),
                _ => Ok("done"),
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> =
            with_transport_retry("test", 3, &BackoffConfig::immediate(), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(api_error(500))
            })
            .await;
        assert_matches!(result, Err(LibraryApiError::Api { status: 500, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> =
            with_transport_retry("test", 3, &BackoffConfig::immediate(), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(api_error(400))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
