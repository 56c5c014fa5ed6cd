//! # Bounded retry around one fallible call.
//!
//! [`RetryPolicy`] invokes an async operation up to `max_attempts` times,
//! sleeping per [`BackoffPolicy`] between attempts. It returns on the first
//! success; after the last failure it returns [`RetryExhausted`] carrying the
//! final error.
//!
//! ```text
//! attempt 1 ─► Err ─► warn! ─► on_failure(delay) ─► sleep(backoff.next(0))
//! attempt 2 ─► Err ─► warn! ─► on_failure(delay) ─► sleep(backoff.next(1))
//! attempt N ─► Err ─► error! ─► on_failure(None) ─► Err(RetryExhausted{N, last})
//! ```
//!
//! No sleep happens after the final attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::error::RetryExhausted;
use crate::policies::BackoffPolicy;

/// Details of one failed attempt, handed to the observer of
/// [`RetryPolicy::run_observed`].
#[derive(Debug)]
pub struct RetryAttempt<'a, E> {
    /// 1-based attempt number that just failed.
    pub attempt: u32,
    /// Configured attempt bound.
    pub max_attempts: u32,
    /// Delay before the next attempt; `None` when attempts are exhausted.
    pub delay: Option<Duration>,
    /// Error returned by this attempt.
    pub error: &'a E,
}

/// Bounded retry with backoff.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    /// Three attempts, one second apart.
    fn default() -> Self {
        Self::new(3, BackoffPolicy::default())
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` below 1 is raised to 1.
    pub fn new(max_attempts: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Configured attempt bound.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff used between attempts.
    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    /// Runs `op` until it succeeds or attempts are exhausted.
    ///
    /// `op` receives the 1-based attempt number. `label` names the operation
    /// in log lines.
    pub async fn run<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_observed(label, op, |_| {}).await
    }

    /// Same as [`run`](Self::run), additionally reporting every failed attempt
    /// to `on_failure` before sleeping.
    pub async fn run_observed<T, E, F, Fut, H>(
        &self,
        label: &str,
        mut op: F,
        mut on_failure: H,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        H: FnMut(&RetryAttempt<'_, E>),
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if attempt >= self.max_attempts {
                error!(op = label, attempts = attempt, error = %err, "retries exhausted");
                on_failure(&RetryAttempt {
                    attempt,
                    max_attempts: self.max_attempts,
                    delay: None,
                    error: &err,
                });
                return Err(RetryExhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.backoff.next(attempt - 1);
            warn!(
                op = label,
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );
            on_failure(&RetryAttempt {
                attempt,
                max_attempts: self.max_attempts,
                delay: Some(delay),
                error: &err,
            });
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn fail_first(calls: &AtomicU32, failures: u32) -> Result<u32, String> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= failures {
            Err(format!("boom #{n}"))
        } else {
            Ok(n)
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_k_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(4, BackoffPolicy::immediate());

        let res = policy.run("connect", |_| fail_first(&calls, 2)).await;

        assert_eq!(res.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, BackoffPolicy::immediate());

        let err = policy
            .run("connect", |_| fail_first(&calls, 3))
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 3);
        assert_eq!(err.last, "boom #3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(0, BackoffPolicy::immediate());
        assert_eq!(policy.max_attempts(), 1);

        let err = policy
            .run("connect", |_| fail_first(&calls, 10))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_delays_and_final_none() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, BackoffPolicy::constant(Duration::from_millis(500)));
        let mut seen = Vec::new();

        let started = tokio::time::Instant::now();
        let _ = policy
            .run_observed(
                "set_time",
                |_| fail_first(&calls, 5),
                |a| seen.push((a.attempt, a.delay)),
            )
            .await;

        assert_eq!(
            seen,
            vec![
                (1, Some(Duration::from_millis(500))),
                (2, Some(Duration::from_millis(500))),
                (3, None),
            ]
        );
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_attempt_number_is_passed_to_op() {
        let policy = RetryPolicy::new(5, BackoffPolicy::immediate());
        let res: Result<u32, RetryExhausted<String>> = policy
            .run("probe", |attempt| async move {
                if attempt < 4 {
                    Err(format!("attempt {attempt}"))
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(res.unwrap(), 4);
    }
}
