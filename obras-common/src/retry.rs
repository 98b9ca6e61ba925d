//! Bounded retry-with-backoff combinator
//!
//! One loop shared by the store connection (bounded, fixed delay) and the
//! upstream page fetch (unbounded, delay chosen per failure kind).
//!
//! **Algorithm:**
//! 1. Attempt operation
//! 2. If successful, return result
//! 3. Classify the error:
//!    a. `Fail`: return immediately as [`RetryError::Fatal`]
//!    b. `Retry` / `RetryAfter`: if attempts remain, log WARN, sleep, retry
//!    c. Attempts exhausted: log ERROR, return [`RetryError::Exhausted`]

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// How many times to attempt an operation and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one; `None` retries until success
    pub max_attempts: Option<u32>,
    /// Pause before the next attempt unless the classifier overrides it
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            delay,
        }
    }

    pub fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Attempt counter step; an unbounded policy may outlive `u32`
fn next_attempt(attempt: u32) -> u32 {
    attempt.saturating_add(1)
}

/// Classifier verdict for a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the policy delay
    Retry,
    /// Retry after a specific delay (e.g. rate-limit backoff)
    RetryAfter(Duration),
    /// Not recoverable by retrying
    Fail,
}

/// Terminal outcome of a retried operation
#[derive(Debug, Error)]
pub enum RetryError<E: Display> {
    /// Classifier refused to retry
    #[error("{0}")]
    Fatal(E),

    /// Retry budget spent
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E: Display> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// Run `operation` until it succeeds, the classifier says `Fail`, or the
/// policy's attempt budget is spent.
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "store connection", "page 3")
/// * `policy` - Attempt budget and default delay
/// * `classify` - Maps an error to a [`RetryDecision`]
/// * `operation` - Async closure performing one attempt
pub async fn retry<T, E, F, Fut, C>(
    operation_name: &str,
    policy: &RetryPolicy,
    classify: C,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryDecision,
{
    let mut attempt = 0u32;

    loop {
        attempt = next_attempt(attempt);

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying operation");
        }

        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let delay = match classify(&err) {
            RetryDecision::Fail => return Err(RetryError::Fatal(err)),
            RetryDecision::Retry => policy.delay,
            RetryDecision::RetryAfter(delay) => delay,
        };

        if !policy.allows(attempt) {
            tracing::error!(
                operation = operation_name,
                attempt,
                error = %err,
                "Operation failed: retry budget exhausted"
            );
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        tracing::warn!(
            operation = operation_name,
            attempt,
            backoff_ms = delay.as_millis() as u64,
            error = %err,
            "Operation failed, will retry after backoff"
        );

        tokio::time::sleep(delay).await;
    }
}
