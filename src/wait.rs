//! Waiting on remote state transitions.
//!
//! Creating or deleting a resource returns before the service has settled.
//! [`wait_until`] polls with exponential backoff until the probe reports the
//! target state, and gives up at a hard deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::{ApiError, ApiResult, ProviderError};

/// Delay schedule between polls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay before the second poll.
    pub initial_delay: Duration,
    /// Ceiling for any single delay.
    pub max_delay: Duration,
    /// Growth factor applied after every unsuccessful poll.
    pub multiplier: f64,
}

impl Backoff {
    /// The delay following `current`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Outcome of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitStatus<T> {
    /// The target state was reached.
    Done(T),
    /// Not there yet; the string describes the observed state.
    Pending(String),
}

/// Poll `probe` until it returns [`WaitStatus::Done`] or `timeout` elapses.
///
/// Errors from the probe end the wait immediately. A probe that hangs past
/// the deadline is cancelled.
pub async fn wait_until<T, F, Fut>(
    what: &str,
    timeout: Duration,
    backoff: Backoff,
    mut probe: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<WaitStatus<T>, ProviderError>>,
{
    let deadline = deadline_after(timeout);
    let mut delay = backoff.initial_delay;
    let mut attempts = 0u32;
    let mut last_state = String::from("unknown");

    loop {
        attempts += 1;
        match tokio::time::timeout_at(deadline, probe()).await {
            Ok(Ok(WaitStatus::Done(value))) => {
                debug!(what, attempts, "wait completed");
                return Ok(value);
            },
            Ok(Ok(WaitStatus::Pending(state))) => last_state = state,
            Ok(Err(e)) => return Err(e),
            Err(_) => break,
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        debug!(what, attempts, state = %last_state, delay = ?delay, "still waiting");
        tokio::time::sleep(delay.min(deadline - now)).await;
        delay = backoff.next_delay(delay);
    }

    Err(ProviderError::DeadlineExceeded(format!(
        "timeout after {:?} waiting for {} (last state: {}, {} attempt(s))",
        timeout, what, last_state, attempts
    )))
}

/// `timeout` from now, saturating at roughly thirty years.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

/// Bound a single remote call by `timeout`.
///
/// An elapsed deadline is reported as a transient error so callers treat it
/// like any other retryable failure.
pub async fn with_deadline<T, Fut>(timeout: Duration, operation: &str, call: Fut) -> ApiResult<T>
where
    Fut: Future<Output = ApiResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Transient(format!(
            "{}: request deadline of {:?} exceeded",
            operation, timeout
        ))),
    }
}
