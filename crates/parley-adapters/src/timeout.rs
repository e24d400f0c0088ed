//! Deadlines for provider calls
//!
//! Backend SDK timeouts are not trusted to fire; every outbound call made by
//! the conversation layer goes through [`with_deadline`].

use crate::{ProviderError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Timeout error
#[derive(Debug, Clone)]
pub struct TimeoutError {
    /// Duration that was exceeded
    pub duration: Duration,
    /// Operation name
    pub operation: String,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Operation '{}' timed out after {:?}",
            self.operation, self.duration
        )
    }
}

impl std::error::Error for TimeoutError {}

/// Run a provider operation, failing with [`ProviderError::Timeout`] once
/// `deadline` elapses.
///
/// The inner future is dropped on expiry, which cancels the request.
pub async fn with_deadline<F, Fut, T>(
    deadline: Duration,
    operation_name: &str,
    operation: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, operation()).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation = operation_name,
                timeout_ms = deadline.as_millis() as u64,
                "Provider call timed out"
            );
            Err(ProviderError::Timeout(TimeoutError {
                duration: deadline,
                operation: operation_name.to_string(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_success() {
        let result = with_deadline(Duration::from_secs(1), "fast", || async {
            Ok::<_, ProviderError>(42)
        })
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_deadline_passes_errors_through() {
        let result: Result<i32> = with_deadline(Duration::from_secs(1), "failing", || async {
            Err(ProviderError::EmptyResponse)
        })
        .await;

        assert!(matches!(result, Err(ProviderError::EmptyResponse)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let result: Result<i32> = with_deadline(Duration::from_millis(10), "slow_operation", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(42)
        })
        .await;

        match result {
            Err(ProviderError::Timeout(err)) => {
                assert_eq!(err.operation, "slow_operation");
                assert_eq!(err.duration, Duration::from_millis(10));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
