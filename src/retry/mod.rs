//! Bounded retry with a fixed, cancellable delay
//!
//! **Semantics**:
//! - `retries = N` allows N + 1 invocations of the operation
//! - the delay between attempts is fixed (no backoff, no jitter)
//! - a delay of zero retries immediately
//! - the shutdown token aborts the loop with [`Error::Cancelled`] while waiting and
//!   before each attempt; an attempt that is already running is not interrupted
//! - exhaustion surfaces the last failure with the total attempt count

use crate::config::ConnectionConfig;
use crate::error::ConnectionError;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry policy for connection attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failure
    pub retries: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
    /// Bound on a single attempt
    pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Create a policy without a per-attempt bound
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self {
            retries,
            delay,
            attempt_timeout: None,
        }
    }

    /// Policy described by a connection configuration
    pub fn from_config(config: &ConnectionConfig) -> Self {
        let policy = Self::new(config.retry_attempts, config.retry_delay);
        match config.connect_timeout {
            Some(timeout) => policy.with_attempt_timeout(timeout),
            None => policy,
        }
    }

    /// Bound every attempt; an attempt exceeding it counts as a failure
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Total invocations allowed
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Drive `operation` until it succeeds, attempts run out, or `cancel` fires
    ///
    /// The operation receives the 1-based attempt number.
    pub async fn execute<T, F, Fut>(&self, cancel: &CancellationToken, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, ConnectionError>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            attempt += 1;
            let outcome = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, operation(attempt)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ConnectionError::msg(format!(
                        "connection attempt timed out after {:?}",
                        limit
                    ))),
                },
                None => operation(attempt).await,
            };

            let cause = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "connection attempt succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(cause) => cause,
            };

            if attempt >= max_attempts {
                tracing::error!(attempts = attempt, error = %cause, "connection retries exhausted");
                return Err(Error::RetryExhausted {
                    attempts: attempt,
                    last_cause: cause,
                });
            }

            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = self.delay.as_millis() as u64,
                error = %cause,
                "connection attempt failed, retrying"
            );

            if !self.delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!(attempt, "retry wait cancelled by shutdown");
                        return Err(Error::Cancelled);
                    }
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
        }
    }
}

/// Run `operation` with `retries` retries and a fixed `delay`
///
/// Shorthand for [`RetryPolicy::execute`].
pub async fn execute_with_retry<T, F, Fut>(
    operation: F,
    retries: u32,
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, ConnectionError>>,
{
    RetryPolicy::new(retries, delay).execute(cancel, operation).await
}
