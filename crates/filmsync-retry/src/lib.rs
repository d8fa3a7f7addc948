//! Exponential-backoff retry for transient failures.
//!
//! The source and sink adapters wrap their network calls with
//! [`retry_transient`]: connection-level failures are retried forever
//! with exponentially growing, capped delays, while data errors pass
//! straight through to the caller. Each failed attempt is logged.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::warn;

/// Classifies which errors are worth another attempt.
///
/// Only connection-level unavailability qualifies; malformed queries,
/// rejected documents and decode failures must return `false` so they
/// surface immediately.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Delay schedule for retries: `start_delay`, growing by `multiplier`
/// per attempt, capped at `max_delay`. Attempts are unbounded.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub start_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub(crate) fn to_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.start_delay,
            current_interval: self.start_delay,
            multiplier: self.multiplier,
            max_interval: self.max_delay,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }
}

/// Run `op` until it succeeds or fails with a non-transient error.
///
/// `what` names the operation in retry logs.
pub async fn retry_transient<T, E, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = policy.to_backoff();
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                // next_backoff is None only when max_elapsed_time is set
                let delay = backoff.next_backoff().unwrap_or(policy.max_delay);
                warn!(
                    operation = what,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
