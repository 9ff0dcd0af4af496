//! Retry loop for a single fallible async operation.
//!
//! Each attempt races a timeout. Transient failures are retried after
//! `base_delay * 2^(attempt - 1)` plus random jitter; fatal failures and the
//! last attempt return immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use picrelay_core::PipelineSettings;

use crate::providers::ProviderError;

/// Error classification used by the retry loop.
pub trait RetryClassify {
    /// Whether another attempt may succeed.
    fn is_retryable(&self) -> bool;

    /// Error produced when an attempt exceeds its timeout.
    fn timed_out(after: Duration) -> Self;
}

impl RetryClassify for ProviderError {
    fn is_retryable(&self) -> bool {
        ProviderError::is_retryable(self)
    }

    fn timed_out(after: Duration) -> Self {
        ProviderError::Timeout(after)
    }
}

/// Attempt ceiling, delays and per-attempt timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: settings.base_delay(),
            max_jitter: settings.max_jitter(),
            attempt_timeout: settings.attempt_timeout(),
        }
    }

    /// Exponential part of the delay slept after a failed `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&PipelineSettings::default())
    }
}

/// Classified result of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    FatalFailure,
}

/// One pass through the retry loop. Only logged, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempt: u32,
    /// Delay slept before this attempt started
    pub delay: Duration,
    pub outcome: AttemptOutcome,
}

/// Final failure after the loop gave up.
#[derive(Debug, thiserror::Error)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct RetryError<E> {
    /// Attempts made, including the failing one
    pub attempts: u32,
    #[source]
    pub error: E,
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        self.error
    }
}

/// Runs operations under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct BackoffExecutor {
    policy: RetryPolicy,
}

impl BackoffExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `operation` receives the 1-based attempt number and is called at most
    /// `max_attempts` times.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryClassify + Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        let mut delay = Duration::ZERO;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.policy.attempt_timeout, operation(attempt))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(self.policy.attempt_timeout)),
            };

            let error = match result {
                Ok(value) => {
                    let record = RetryAttempt {
                        attempt,
                        delay,
                        outcome: AttemptOutcome::Success,
                    };
                    debug!(?record, "Attempt succeeded");
                    return Ok(value);
                }
                Err(error) => error,
            };

            let retryable = error.is_retryable();
            let record = RetryAttempt {
                attempt,
                delay,
                outcome: if retryable {
                    AttemptOutcome::RetryableFailure
                } else {
                    AttemptOutcome::FatalFailure
                },
            };

            if !retryable || attempt >= max_attempts {
                warn!(?record, error = %error, "Giving up");
                return Err(RetryError {
                    attempts: attempt,
                    error,
                });
            }

            delay = self.policy.backoff_delay(attempt) + self.policy.jitter();
            warn!(
                ?record,
                error = %error,
                next_delay_ms = delay.as_millis() as u64,
                "Attempt failed, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
