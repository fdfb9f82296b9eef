//! The retry loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::strategy::BackoffConfig;
use crate::error_handling::{is_retryable_error, ArchiveError};

/// Decides whether a failed attempt should be retried.
pub type RetryPredicate = Arc<dyn Fn(&ArchiveError) -> bool + Send + Sync>;
/// Called before each retry sleep with `(attempt_number, delay, error)`.
pub type RetryCallback = Arc<dyn Fn(u32, Duration, &ArchiveError) + Send + Sync>;

/// One failed attempt that was followed by a retry.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// 1-based number of the retry this failure triggered.
    pub attempt_number: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    pub error: ArchiveError,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a full retry sequence.
#[derive(Debug)]
pub struct RetryResult<T> {
    pub result: Result<T, ArchiveError>,
    /// Number of times the operation was invoked.
    pub attempts: u32,
    pub total_time: Duration,
    pub retry_attempts: Vec<RetryAttempt>,
}

impl<T> RetryResult<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Retries async operations with the configured backoff.
///
/// Cheap to clone; share one per call site.
#[derive(Clone)]
pub struct BackoffEngine {
    config: BackoffConfig,
    is_retryable: RetryPredicate,
    on_retry: Option<RetryCallback>,
}

impl BackoffEngine {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            is_retryable: Arc::new(is_retryable_error),
            on_retry: None,
        }
    }

    pub fn with_retry_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.is_retryable = predicate;
        self
    }

    pub fn with_on_retry(mut self, callback: RetryCallback) -> Self {
        self.on_retry = Some(callback);
        self
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Runs `operation` until it succeeds, fails permanently, runs out of
    /// retries, or `cancel` fires.
    ///
    /// A circuit-open rejection ends the loop at once. Cancellation is checked
    /// before every attempt and interrupts a pending sleep; either way the
    /// result is an `OPERATION_CANCELLED` error.
    pub async fn execute<T, F, Fut>(
        &self,
        mut operation: F,
        cancel: Option<&CancellationToken>,
    ) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ArchiveError>>,
    {
        let start = Instant::now();
        let max_attempts = self.config.max_attempts;
        let mut retry_attempts = Vec::new();
        let mut attempt: u32 = 0;

        let finish = |result: Result<T, ArchiveError>, attempts: u32, log: Vec<RetryAttempt>| {
            RetryResult {
                result,
                attempts,
                total_time: start.elapsed(),
                retry_attempts: log,
            }
        };

        loop {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                return finish(Err(ArchiveError::cancelled()), attempt, retry_attempts);
            }

            let error = match operation().await {
                Ok(value) => return finish(Ok(value), attempt + 1, retry_attempts),
                Err(e) => e,
            };

            if error.is_circuit_open() {
                log::debug!("Not retrying: {}", error.message());
                return finish(Err(error), attempt + 1, retry_attempts);
            }
            if attempt >= max_attempts || !(self.is_retryable)(&error) {
                return finish(Err(error), attempt + 1, retry_attempts);
            }

            let retry_number = attempt + 1;
            let delay = self.config.calculate_delay(retry_number).total_delay;
            log::debug!(
                "Attempt {} failed with {}; retry {}/{} in {}ms",
                attempt + 1,
                error.code(),
                retry_number,
                max_attempts,
                delay.as_millis()
            );
            if let Some(callback) = &self.on_retry {
                callback(retry_number, delay, &error);
            }
            retry_attempts.push(RetryAttempt {
                attempt_number: retry_number,
                max_attempts,
                delay,
                error,
                timestamp: Utc::now(),
            });

            match cancel {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => {
                            return finish(Err(ArchiveError::cancelled()), attempt + 1, retry_attempts);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }

            attempt += 1;
        }
    }
}
