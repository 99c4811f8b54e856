//! Retry logic with exponential backoff
//!
//! Every remote call the engine makes goes through [`with_retry`]. Errors are
//! classified with [`IsRetryable`]; transient failures are retried with
//! exponential backoff and jitter, permanent failures return immediately.
//! The cancellation token is checked during each attempt and during each
//! backoff sleep, so a cancelled traversal never waits out a retry schedule.
//!
//! # Example
//!
//! ```no_run
//! use prefix_retriever::retry::{IsRetryable, with_retry};
//! use prefix_retriever::config::RetryConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! let result = with_retry(&config, &cancel, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! })
//! .await;
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, RemoteError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, throttling, 5xx, connection reset) should return `true`.
/// Permanent failures (not found, access denied, malformed request) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for RemoteError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Remote(e) => e.is_transient(),
            // I/O errors can be retryable in some cases
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            // Budget already spent
            Error::RetryBudgetExhausted { .. } => false,
            // Bytes were already consumed
            Error::Sink(_) => false,
            Error::Config { .. }
            | Error::InvalidPattern(_)
            | Error::InvalidPath { .. }
            | Error::Serialization(_) => false,
            Error::Cancelled => false,
        }
    }
}

/// Terminal outcome of a retried operation that did not succeed
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation failed with a non-retryable error
    #[error("{0}")]
    Permanent(E),

    /// Every attempt failed with a retryable error
    #[error("retry budget exhausted after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made, including the first
        attempts: u32,
        /// Error from the final attempt
        last: E,
    },

    /// The cancellation token fired before the operation settled
    #[error("operation cancelled")]
    Cancelled,
}

impl From<RetryError<RemoteError>> for Error {
    fn from(err: RetryError<RemoteError>) -> Self {
        match err {
            RetryError::Permanent(e) => Error::Remote(e),
            RetryError::Exhausted { attempts, last } => Error::RetryBudgetExhausted { attempts, last },
            RetryError::Cancelled => Error::Cancelled,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// # Arguments
///
/// * `config` - Retry configuration (attempt cap, base delay, delay cap, jitter)
/// * `cancel` - Token checked while each attempt runs and while backing off
/// * `operation` - Async closure that returns `Result<T, E>` where E implements IsRetryable
///
/// # Returns
///
/// The successful result, or a [`RetryError`] describing why the operation
/// was given up on.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            outcome = operation() => outcome,
        };

        match outcome {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = backoff_delay(config, attempt);
                let sleep_for = if config.jitter {
                    delay + jitter(delay)
                } else {
                    delay
                };

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = sleep_for.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(sleep_for) => {}
                }
            }
            Err(e) if e.is_retryable() => {
                tracing::error!(
                    error = %e,
                    attempts = attempt,
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Operation failed with non-retryable error");
                return Err(RetryError::Permanent(e));
            }
        }
    }
}

/// Backoff delay before the retry that follows failed attempt `attempt` (1-based)
///
/// Returns `min(initial_delay * 2^(attempt-1), max_delay)`, without jitter.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let delay = 2u32
        .checked_pow(exponent)
        .and_then(|factor| config.initial_delay.checked_mul(factor))
        .unwrap_or(config.max_delay);
    delay.min(config.max_delay)
}

/// Random jitter uniformly distributed in `[0, delay)`
///
/// Returns zero for a zero delay.
fn jitter(delay: Duration) -> Duration {
    let nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    let mut rng = rand::thread_rng();
    Duration::from_nanos(rng.gen_range(0..nanos))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteErrorKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient error"),
                TestError::Permanent => write!(f, "permanent error"),
            }
        }
    }

    impl IsRetryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_success_no_retry() {
        let config = RetryConfig::default();
        let cancel = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&config, &cancel, || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1, "should only call once");
    }

    #[tokio::test]
    async fn test_retry_transient_then_succeed() {
        let config = fast_config(3);
        let cancel = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&config, &cancel, || {
            let counter = counter_clone.clone();
            async move {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(
            counter.load(Ordering::SeqCst),
            3,
            "should retry twice before success"
        );
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let config = fast_config(3);
        let cancel = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&config, &cancel, || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Transient)
            }
        })
        .await;

        match result {
            Err(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected exhausted, got {other:?}"),
        }
        assert_eq!(
            counter.load(Ordering::SeqCst),
            3,
            "max_attempts counts the first attempt"
        );
    }

    #[tokio::test]
    async fn test_permanent_error_no_retry() {
        let config = RetryConfig::default();
        let cancel = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&config, &cancel, || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Permanent)
            }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Permanent(TestError::Permanent))));
        assert_eq!(
            counter.load(Ordering::SeqCst),
            1,
            "should not retry permanent error"
        );
    }

    #[tokio::test]
    async fn test_exponential_backoff_timing() {
        let config = fast_config(4);
        let cancel = CancellationToken::new();

        let start = std::time::Instant::now();
        let _result = with_retry(&config, &cancel, || async {
            Err::<i32, _>(TestError::Transient)
        })
        .await;
        let elapsed = start.elapsed();

        // Three backoffs: 10ms + 20ms + 40ms = 70ms
        // Upper bound is generous to tolerate CI and coverage instrumentation overhead
        assert!(
            elapsed >= Duration::from_millis(70),
            "should wait at least 70ms, waited {:?}",
            elapsed
        );
        assert!(
            elapsed < Duration::from_secs(2),
            "should not wait too long, waited {:?}",
            elapsed
        );
    }

    #[test]
    fn test_backoff_delay_sequence() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            jitter: true,
        };

        let delays: Vec<_> = (1..=6).map(|i| backoff_delay(&config, i)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
                Duration::from_millis(1000),
                Duration::from_millis(1000),
            ]
        );
    }

    #[test]
    fn test_backoff_delay_huge_attempt_is_capped() {
        let config = RetryConfig {
            max_attempts: 100,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: false,
        };
        assert_eq!(backoff_delay(&config, 40), Duration::from_secs(60));
        assert_eq!(backoff_delay(&config, u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_within_bounds() {
        let delay = Duration::from_millis(100);
        for _ in 0..1000 {
            let j = jitter(delay);
            assert!(j < delay, "jitter {:?} must be below {:?}", j, delay);
        }
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_returns_promptly() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(60),
            jitter: false,
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = std::time::Instant::now();
        let result = with_retry(&config, &cancel, || async {
            Err::<i32, _>(TestError::Transient)
        })
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancel_aborts_hanging_attempt() {
        let config = RetryConfig::default();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = with_retry(&config, &cancel, || {
            futures::future::pending::<Result<i32, TestError>>()
        })
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
    }

    #[test]
    fn test_remote_error_classification() {
        assert!(RemoteError::timeout("slow").is_retryable());
        assert!(RemoteError::new(RemoteErrorKind::Throttled, "SlowDown").is_retryable());
        assert!(!RemoteError::new(RemoteErrorKind::AccessDenied, "no").is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(Error::Remote(RemoteError::from_status(500, "x")).is_retryable());
    }

    #[test]
    fn test_retry_error_converts_into_crate_error() {
        let err: Error = RetryError::Exhausted {
            attempts: 2,
            last: RemoteError::timeout("t"),
        }
        .into();
        assert!(matches!(err, Error::RetryBudgetExhausted { attempts: 2, .. }));

        let err: Error = RetryError::<RemoteError>::Cancelled.into();
        assert!(matches!(err, Error::Cancelled));
    }
}
