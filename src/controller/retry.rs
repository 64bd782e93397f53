//! Bounded retry with a fixed delay
//!
//! The operation and the on-retry hook both receive the same mutable state,
//! so a hook can invalidate cached data that the next attempt reads.

use std::fmt::Display;
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{error, warn};

/// Attempt budget and the pause between attempts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

/// Every attempt failed; carries the last error
#[derive(Debug, Error)]
#[error("{last_error}")]
pub struct RetryError<E: Display> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `operation` until it succeeds or the attempt budget is spent.
///
/// `on_retry` runs after each failed attempt that will be retried, before
/// the delay.
pub async fn retry_with_delay<S, T, E, F, R>(
    policy: RetryPolicy,
    operation_name: &str,
    state: &mut S,
    mut operation: F,
    mut on_retry: R,
) -> Result<T, RetryError<E>>
where
    F: for<'a> FnMut(&'a mut S) -> BoxFuture<'a, Result<T, E>>,
    R: FnMut(&mut S, u32, &E),
    E: Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation(state).await {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= attempts => {
                error!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    "Operation failed after max retries"
                );
                return Err(RetryError {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = policy.delay.as_millis(),
                    "Operation failed, retrying"
                );
                on_retry(state, attempt, &e);
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use tokio::time::Instant;

    #[derive(Default)]
    struct Counter {
        calls: u32,
        retries: Vec<u32>,
        succeed_on: Option<u32>,
    }

    async fn attempt(counter: &mut Counter) -> Result<u32, String> {
        counter.calls += 1;
        match counter.succeed_on {
            Some(n) if counter.calls >= n => Ok(counter.calls),
            _ => Err(format!("failure #{}", counter.calls)),
        }
    }

    #[test]
    fn test_policy_has_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
        assert_eq!(RetryPolicy::default().delay, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_retries() {
        let mut counter = Counter {
            succeed_on: Some(3),
            ..Default::default()
        };
        let started = Instant::now();
        let result = retry_with_delay(
            RetryPolicy::new(5, Duration::from_secs(2)),
            "test",
            &mut counter,
            |c| attempt(c).boxed(),
            |c, n, _| c.retries.push(n),
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(counter.retries, vec![1, 2]);
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let mut counter = Counter::default();
        let started = Instant::now();
        let err = retry_with_delay(
            RetryPolicy::new(3, Duration::from_secs(5)),
            "test",
            &mut counter,
            |c| attempt(c).boxed(),
            |c, n, _| c.retries.push(n),
        )
        .await
        .unwrap_err();

        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, "failure #3");
        assert_eq!(err.to_string(), "failure #3");
        assert_eq!(counter.calls, 3);
        assert_eq!(counter.retries, vec![1, 2]);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_never_sleeps() {
        let mut counter = Counter::default();
        let started = Instant::now();
        let err = retry_with_delay(
            RetryPolicy::default(),
            "test",
            &mut counter,
            |c| attempt(c).boxed(),
            |_, _, _| panic!("no retry expected"),
        )
        .await
        .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
