//! Exponential backoff with jitter.
//!
//! Attempt 1 runs immediately; attempt `n > 1` sleeps
//! `base^(n-1) + U(jitter_low, jitter_high)` seconds first. The caller decides
//! which errors are worth another attempt.

use std::future::Future;
use std::time::Duration;

use opentelemetry::KeyValue;
use thiserror::Error;

use crate::config::RetryConfig;
use crate::error::AppError;
use crate::telemetry::metrics::RETRY_COUNT;

/// Upper bound on a single backoff sleep.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted { attempts: u32, source: E },

    #[error("non-retryable failure on attempt {attempt}: {source}")]
    Fatal { attempt: u32, source: E },
}

impl<E> RetryError<E> {
    /// The underlying error of the final attempt.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::Fatal { source, .. } => source,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::Fatal { attempt, .. } => *attempt,
        }
    }
}

impl From<RetryError<AppError>> for AppError {
    fn from(err: RetryError<AppError>) -> Self {
        err.into_inner()
    }
}

#[derive(Debug, Clone)]
pub struct BackoffRetrier {
    config: RetryConfig,
    label: &'static str,
}

impl BackoffRetrier {
    pub fn new(config: RetryConfig, label: &'static str) -> Self {
        Self { config, label }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Delay before attempt `attempt` (1-based). Zero for the first attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponential = self.config.base.powi(attempt as i32 - 1);
        let jitter = if self.config.jitter_high > self.config.jitter_low {
            self.config.jitter_low
                + fastrand::f64() * (self.config.jitter_high - self.config.jitter_low)
        } else {
            self.config.jitter_low
        };
        // NaN collapses to zero through `max`, overflow to the cap through `min`
        let secs = (exponential + jitter)
            .max(0.0)
            .min(MAX_RETRY_DELAY.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_DELAY)
    }

    pub async fn execute<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        is_retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !is_retryable(&err) => {
                    return Err(RetryError::Fatal {
                        attempt,
                        source: err,
                    });
                }
                Err(err) if attempt >= max_attempts => {
                    tracing::error!(
                        operation = self.label,
                        attempts = attempt,
                        error = %err,
                        "retries exhausted"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(err) => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation = self.label,
                        attempt,
                        max_attempts,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "attempt failed, retrying"
                    );
                    RETRY_COUNT.add(1, &[KeyValue::new("operation", self.label)]);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
