//! Bounded retry with backoff and a hard deadline.
//!
//! Every network call in the system goes through this policy: a fixed
//! number of attempts, a doubling delay between them, and a wall-clock
//! deadline that cuts the whole sequence off. Rate-limit responses override
//! the backoff with the provider's own `retry_after` value.

use std::future::Future;
use std::time::Duration;

use redtalon_config::RetryConfig;
use redtalon_core::UpstreamError;
use tracing::warn;

/// The shared retry discipline for upstream calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    deadline: Duration,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: Duration::from_millis(config.backoff_ms),
            deadline: Duration::from_secs(config.deadline_secs),
        }
    }

    /// Run `operation` until it succeeds, a non-retryable error occurs, the
    /// attempt budget is spent, or the deadline expires.
    ///
    /// The deadline covers the entire sequence, waits included, so one call
    /// site can never stall an analysis indefinitely.
    pub async fn run<T, F, Fut>(
        &self,
        what: &str,
        mut operation: F,
    ) -> std::result::Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, UpstreamError>>,
    {
        let attempts = async {
            let mut delay = self.backoff;
            let mut attempt = 1u32;
            loop {
                match operation().await {
                    Ok(value) => return Ok(value),
                    Err(err) if attempt < self.max_attempts && err.is_retryable() => {
                        let wait = match &err {
                            UpstreamError::RateLimited { retry_after_secs } => {
                                Duration::from_secs(*retry_after_secs)
                            }
                            _ => delay,
                        };
                        warn!(what, attempt, error = %err, wait_ms = wait.as_millis() as u64, "Retrying upstream call");
                        tokio::time::sleep(wait).await;
                        delay *= 2;
                        attempt += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        match tokio::time::timeout(self.deadline, attempts).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(format!(
                "{what} deadline exceeded after {:?}",
                self.deadline
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn policy(max_attempts: u32, backoff_ms: u64, deadline_secs: u64) -> RetryPolicy {
        RetryPolicy::new(&RetryConfig {
            max_attempts,
            backoff_ms,
            deadline_secs,
        })
    }

    #[tokio::test]
    async fn first_attempt_success_makes_one_call() {
        let calls = Mutex::new(0u32);
        let result = policy(3, 1, 5)
            .run("test", || {
                *calls.lock().unwrap() += 1;
                async { Ok::<_, UpstreamError>(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let calls = Mutex::new(0u32);
        let result = policy(3, 1, 5)
            .run("test", || {
                let n = {
                    let mut guard = calls.lock().unwrap();
                    *guard += 1;
                    *guard
                };
                async move {
                    if n < 3 {
                        Err(UpstreamError::Network("connection reset".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn attempt_budget_is_bounded() {
        let calls = Mutex::new(0u32);
        let result: std::result::Result<(), _> = policy(3, 1, 5)
            .run("test", || {
                *calls.lock().unwrap() += 1;
                async { Err(UpstreamError::Network("still down".into())) }
            })
            .await;

        assert!(matches!(result, Err(UpstreamError::Network(_))));
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn auth_failures_are_not_retried() {
        let calls = Mutex::new(0u32);
        let result: std::result::Result<(), _> = policy(3, 1, 5)
            .run("test", || {
                *calls.lock().unwrap() += 1;
                async { Err(UpstreamError::AuthenticationFailed("bad key".into())) }
            })
            .await;

        assert!(matches!(result, Err(UpstreamError::AuthenticationFailed(_))));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_wait_is_honored() {
        let start = tokio::time::Instant::now();
        let calls = Mutex::new(0u32);
        let result = policy(2, 1, 60)
            .run("test", || {
                let n = {
                    let mut guard = calls.lock().unwrap();
                    *guard += 1;
                    *guard
                };
                async move {
                    if n == 1 {
                        Err(UpstreamError::RateLimited { retry_after_secs: 7 })
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert!(start.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cuts_off_retries() {
        // 400ms + 800ms of backoff blows through a 1s deadline.
        let result: std::result::Result<(), _> = policy(10, 400, 1)
            .run("test", || async {
                Err(UpstreamError::Network("down".into()))
            })
            .await;

        assert!(matches!(result, Err(UpstreamError::Timeout(_))));
    }
}
