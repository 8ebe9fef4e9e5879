//! Retry logic.
//!
//! # Responsibilities
//! - Turn each attempt's result into a [`RequestAttempt`]
//! - Sleep the backoff delay between transient failures
//! - Stop at the first fatal error or after `max_attempts`
//!
//! # Design Decisions
//! - Classification lives on the error (`IntegrationError::retry_class`)
//! - Retries are sequential delays inside one logical call, never concurrent
//! - The last error is returned unchanged on exhaustion so callers keep its kind

use std::future::Future;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::RetryConfig;
use crate::error::{IntegrationError, IntegrationResult, RetryClass};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Bounded exponential-backoff policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// What happens after one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome<T> {
    Success(T),
    Retry(Duration),
    Fatal(IntegrationError),
}

/// One attempt within a logical call. Never outlives the call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAttempt<T> {
    pub attempt_number: u32,
    pub outcome: AttemptOutcome<T>,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter_ratio: config.jitter_ratio,
        }
    }

    /// Backoff delay after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms, self.jitter_ratio)
    }

    /// Decide what follows attempt `attempt_number` given its result.
    pub fn evaluate<T>(&self, attempt_number: u32, result: IntegrationResult<T>) -> RequestAttempt<T> {
        let outcome = match result {
            Ok(value) => AttemptOutcome::Success(value),
            Err(error) => match error.retry_class() {
                RetryClass::Transient if attempt_number < self.max_attempts => {
                    AttemptOutcome::Retry(self.delay_for(attempt_number))
                }
                _ => AttemptOutcome::Fatal(error),
            },
        };
        RequestAttempt {
            attempt_number,
            outcome,
        }
    }
}

/// Run `op` until it succeeds, fails fatally, or runs out of attempts.
///
/// `op` receives the 1-based attempt number.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    operation: &str,
    mut op: F,
) -> IntegrationResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = IntegrationResult<T>>,
{
    let mut attempt_number = 1;
    loop {
        let result = op(attempt_number).await;
        let last_error = result.as_ref().err().cloned();
        let attempt = policy.evaluate(attempt_number, result);

        match attempt.outcome {
            AttemptOutcome::Success(value) => {
                if attempt.attempt_number > 1 {
                    tracing::info!(
                        operation,
                        attempt = attempt.attempt_number,
                        "Upstream call succeeded after retry"
                    );
                }
                return Ok(value);
            }
            AttemptOutcome::Retry(delay) => {
                tracing::warn!(
                    operation,
                    attempt = attempt.attempt_number,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error.map(|e| e.to_string()).unwrap_or_default(),
                    "Transient upstream failure, retrying"
                );
                metrics::record_retry(operation);
                clock.sleep(delay).await;
                attempt_number += 1;
            }
            AttemptOutcome::Fatal(error) => {
                if error.retry_class() == RetryClass::Transient {
                    tracing::warn!(
                        operation,
                        attempts = attempt.attempt_number,
                        error = %error,
                        "Retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(
                        operation,
                        attempt = attempt.attempt_number,
                        error = %error,
                        "Fatal upstream failure, not retrying"
                    );
                }
                return Err(error);
            }
        }
    }
}
