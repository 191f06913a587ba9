//! Whole-attempt retry for post generation.
//!
//! Every failure consumes an attempt, including unparseable or off-schema model
//! output: a fresh call can still produce something valid. The delay before the
//! next attempt depends only on the error kind.
//!
//! | Kind                     | Sleep before next attempt |
//! |--------------------------|---------------------------|
//! | `QuotaExceeded`          | `quota_backoff` (10 s)    |
//! | anything else            | `retry_backoff` (2 s)     |

use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::generation::pipeline::{ErrorKind, GenerationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included. Values below 1 are treated as 1.
    pub max_attempts: u32,
    pub quota_backoff: Duration,
    pub retry_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            quota_backoff: Duration::from_secs(10),
            retry_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn backoff_for(&self, kind: ErrorKind) -> Duration {
        match kind {
            ErrorKind::QuotaExceeded => self.quota_backoff,
            _ => self.retry_backoff,
        }
    }
}

/// Bookkeeping for one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttemptState {
    /// 1-based.
    pub attempt: u32,
    pub kind: ErrorKind,
    pub last_error: String,
    pub delay: Duration,
}

impl RetryAttemptState {
    fn new(attempt: u32, err: &GenerationError, policy: &RetryPolicy) -> Self {
        let kind = err.kind();
        Self {
            attempt,
            kind,
            last_error: err.to_string(),
            delay: policy.backoff_for(kind),
        }
    }
}

/// Runs `operation` (given the 1-based attempt number) until it succeeds or the
/// policy's attempts are used up, then fails with `RetryExhausted` carrying the
/// last error.
pub async fn retry_generation<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, GenerationError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1u32;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, max_attempts, "Generation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                let state = RetryAttemptState::new(attempt, &err, policy);

                if attempt >= max_attempts {
                    error!(
                        attempt,
                        max_attempts,
                        kind = ?state.kind,
                        error = %err,
                        "All generation attempts failed"
                    );
                    return Err(GenerationError::RetryExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }

                warn!(
                    attempt = state.attempt,
                    max_attempts,
                    kind = ?state.kind,
                    delay_ms = state.delay.as_millis(),
                    error = %state.last_error,
                    "Generation attempt failed, retrying after back-off"
                );
                tokio::time::sleep(state.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn quota() -> GenerationError {
        GenerationError::Provider(LlmError::QuotaExceeded("429".to_owned()))
    }

    fn unavailable() -> GenerationError {
        GenerationError::Provider(LlmError::ProviderUnavailable("timeout".to_owned()))
    }

    #[test]
    fn quota_gets_the_long_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(ErrorKind::QuotaExceeded), Duration::from_secs(10));
        assert_eq!(policy.backoff_for(ErrorKind::ProviderUnavailable), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(ErrorKind::ProviderRejected), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(ErrorKind::UnrepairableOutput), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(ErrorKind::SchemaMismatch), Duration::from_secs(2));
    }

    #[test]
    fn zero_attempts_means_one() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_immediately_without_sleeping() {
        let start = Instant::now();
        let result = retry_generation(&RetryPolicy::default(), |_| async { Ok::<u32, _>(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_then_success_waits_ten_seconds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let start = Instant::now();

        let result = retry_generation(&RetryPolicy::default(), |attempt| {
            c.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 1 {
                    Err(quota())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn mixed_failures_use_per_kind_backoff() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let start = Instant::now();

        let result = retry_generation(&policy, |attempt| async move {
            match attempt {
                1 => Err(unavailable()),
                2 => Err(quota()),
                _ => Ok(()),
            }
        })
        .await;

        assert!(result.is_ok());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(12) && elapsed < Duration::from_secs(13), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_carries_last_error_and_skips_final_sleep() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let start = Instant::now();

        let result = retry_generation(&RetryPolicy::default(), |attempt| {
            c.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 1 {
                    Err::<(), _>(quota())
                } else {
                    Err(unavailable())
                }
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match result {
            Err(GenerationError::RetryExhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert_eq!(last.kind(), ErrorKind::ProviderUnavailable);
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
        // Only the sleep between attempt 1 and 2; none after the last attempt.
        assert!(start.elapsed() < Duration::from_secs(11));
    }
}
