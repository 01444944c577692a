use crate::error::EngineError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bounded retry policy for provider calls.
///
/// Retries only the provider invocation, never tool executions or output
/// parsing. Backoff starts at 100ms and doubles per attempt.
pub struct RetryConfig {
    max_retries: u32,
    abort_signal: Option<CancellationToken>,
}

impl RetryConfig {
    /// Creates a retry policy. `max_retries` of 0 disables retries.
    pub fn new(max_retries: u32, abort_signal: Option<CancellationToken>) -> Self {
        Self {
            max_retries,
            abort_signal,
        }
    }

    /// The configured retry bound.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Runs the operation, retrying failed attempts up to the bound.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, EngineError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let mut retries = 0;
        let mut delay = Duration::from_millis(100);

        loop {
            if let Some(token) = &self.abort_signal
                && token.is_cancelled()
            {
                return Err(EngineError::Cancelled);
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if retries >= self.max_retries {
                        return Err(error);
                    }
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    retries += 1;
                }
            }
        }
    }
}

/// Validates and resolves the retry configuration. Defaults to 2 retries.
pub fn prepare_retries(
    max_retries: Option<u32>,
    abort_signal: Option<CancellationToken>,
) -> RetryConfig {
    RetryConfig::new(max_retries.unwrap_or(2), abort_signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_prepare_retries_default() {
        assert_eq!(prepare_retries(None, None).max_retries(), 2);
        assert_eq!(prepare_retries(Some(5), None).max_retries(), 5);
        assert_eq!(prepare_retries(Some(0), None).max_retries(), 0);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let config = RetryConfig::new(2, None);
        let result: Result<u32, EngineError> = config.execute(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_bound() {
        let attempts = Arc::new(AtomicU32::new(0));
        let config = RetryConfig::new(2, None);

        let counter = attempts.clone();
        let result: Result<u32, EngineError> = config
            .execute(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(EngineError::provider("test", 1, "boom"))
                }
            })
            .await;

        assert!(result.is_err());
        // Initial attempt plus two retries.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_retry() {
        let attempts = Arc::new(AtomicU32::new(0));
        let config = RetryConfig::new(3, None);

        let counter = attempts.clone();
        let result: Result<&str, EngineError> = config
            .execute(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(EngineError::provider("test", 1, "flaky"))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let config = RetryConfig::new(2, Some(token));

        let result: Result<u32, EngineError> = config.execute(|| async { Ok(1) }).await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }
}
