//! The error handler: the boundary every failure passes through.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::normalize::normalize;
use super::recovery::{RecoveryRegistry, RecoveryStrategy};
use super::retry::is_retryable_error;
use super::stats::{ErrorStats, ErrorStatsSnapshot};
use super::types::{ArchiveError, ErrorCode, ErrorContext, RecoverySuggestion, Severity};
use crate::config::ERROR_LOG_CAPACITY;
use crate::utils::sanitize::sanitize_error_message;
use crate::utils::RingBuffer;

/// Side-effect hook invoked for every handled error (notifications, metrics).
pub type ErrorCallback = Arc<dyn Fn(&ArchiveError) + Send + Sync>;

/// One entry in the bounded error log.
#[derive(Debug, Clone)]
pub struct ErrorLogEntry {
    pub sequence: u64,
    pub error: ArchiveError,
    pub recovered: bool,
    pub logged_at: DateTime<Utc>,
}

/// User-facing rendering of an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedError {
    pub title: String,
    pub message: String,
    pub suggestions: Vec<RecoverySuggestion>,
    pub severity: Severity,
}

/// Normalizes, counts, logs and (where allowed) recovers from errors.
///
/// `handle` always returns the normalized error. A successful recovery only
/// changes bookkeeping; callers still treat the operation as failed unless
/// they run it again.
pub struct ErrorHandler {
    stats: ErrorStats,
    log: Mutex<RingBuffer<ErrorLogEntry>>,
    recovery: RwLock<RecoveryRegistry>,
    on_error: Option<ErrorCallback>,
    sequence: AtomicU64,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorHandler {
    /// Handler with the default recovery strategies and log capacity.
    pub fn new() -> Self {
        Self::with_registry(RecoveryRegistry::with_defaults(), ERROR_LOG_CAPACITY)
    }

    pub fn with_registry(registry: RecoveryRegistry, max_log_entries: usize) -> Self {
        Self {
            stats: ErrorStats::new(),
            log: Mutex::new(RingBuffer::new(max_log_entries)),
            recovery: RwLock::new(registry),
            on_error: None,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn with_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    /// Registers (or replaces) a recovery strategy after construction.
    pub fn register_recovery_strategy(&self, code: ErrorCode, strategy: RecoveryStrategy) {
        match self.recovery.write() {
            Ok(mut registry) => registry.register(code, strategy),
            Err(poisoned) => poisoned.into_inner().register(code, strategy),
        }
    }

    /// Normalizes `error`, records it, and attempts in-process recovery.
    pub async fn handle(
        &self,
        error: impl Into<anyhow::Error>,
        context: Option<ErrorContext>,
    ) -> ArchiveError {
        let (error, sequence) = self.record_entry(error.into(), context);
        if self.attempt_recovery(&error, None).await == Some(true) {
            self.mark_recovered(sequence);
        }
        error
    }

    /// Like `handle`, but a pending recovery is abandoned as soon as `cancel`
    /// fires. The original error stays recorded; the caller gets
    /// `OPERATION_CANCELLED` back instead.
    pub async fn handle_cancellable(
        &self,
        error: impl Into<anyhow::Error>,
        context: Option<ErrorContext>,
        cancel: &CancellationToken,
    ) -> ArchiveError {
        let (error, sequence) = self.record_entry(error.into(), context);
        match self.attempt_recovery(&error, Some(cancel)).await {
            Some(true) => {
                self.mark_recovered(sequence);
                error
            }
            Some(false) => error,
            None => {
                log::debug!("Recovery for {} interrupted by cancellation", error.code());
                ArchiveError::cancelled()
            }
        }
    }

    /// Normalizes and records `error` without attempting recovery. Use this
    /// when nothing will run the operation again.
    pub fn record(
        &self,
        error: impl Into<anyhow::Error>,
        context: Option<ErrorContext>,
    ) -> ArchiveError {
        self.record_entry(error.into(), context).0
    }

    fn record_entry(
        &self,
        error: anyhow::Error,
        context: Option<ErrorContext>,
    ) -> (ArchiveError, u64) {
        let error = normalize(error, context);

        self.stats.record(error.code(), error.severity());
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.with_log(|log| {
            log.push(ErrorLogEntry {
                sequence,
                error: error.clone(),
                recovered: false,
                logged_at: Utc::now(),
            })
        });
        self.log_error(&error);

        if let Some(callback) = &self.on_error {
            callback(&error);
        }
        (error, sequence)
    }

    fn mark_recovered(&self, sequence: u64) {
        self.stats.record_recovered();
        self.with_log(|log| {
            if let Some(entry) = log.iter_mut().find(|e| e.sequence == sequence) {
                entry.recovered = true;
            }
        });
    }

    /// `None` when `cancel` fired before the strategy finished.
    async fn attempt_recovery(
        &self,
        error: &ArchiveError,
        cancel: Option<&CancellationToken>,
    ) -> Option<bool> {
        if !error.has_auto_recoverable_suggestion() {
            return Some(false);
        }
        let strategy = match self.recovery.read() {
            Ok(registry) => registry.get(error.code()),
            Err(poisoned) => poisoned.into_inner().get(error.code()),
        };
        let Some(strategy) = strategy else {
            return Some(false);
        };
        let recovered = match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return None,
                recovered = strategy(error.clone()) => recovered,
            },
            None => strategy(error.clone()).await,
        };
        log::debug!(
            "Recovery for {} {}",
            error.code(),
            if recovered { "succeeded" } else { "declined" }
        );
        Some(recovered)
    }

    fn log_error(&self, error: &ArchiveError) {
        let message = sanitize_error_message(error.message());
        let url = error.context().url.as_deref().unwrap_or("-");
        match error.severity() {
            Severity::High => log::error!("{} ({}): {}", error.code(), url, message),
            Severity::Medium => log::warn!("{} ({}): {}", error.code(), url, message),
            Severity::Low => log::info!("{} ({}): {}", error.code(), url, message),
        }
    }

    fn with_log<R>(&self, f: impl FnOnce(&mut RingBuffer<ErrorLogEntry>) -> R) -> R {
        match self.log.lock() {
            Ok(mut log) => f(&mut log),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub fn should_retry(&self, error: &ArchiveError) -> bool {
        is_retryable_error(error)
    }

    pub fn user_message(&self, error: &ArchiveError) -> String {
        error.user_message().to_string()
    }

    pub fn format_error(&self, error: &ArchiveError) -> FormattedError {
        FormattedError {
            title: error.code().title().to_string(),
            message: error.user_message().to_string(),
            suggestions: error.suggestions().to_vec(),
            severity: error.severity(),
        }
    }

    pub fn stats(&self) -> ErrorStatsSnapshot {
        self.stats.snapshot()
    }

    /// The most recent `limit` log entries, oldest first.
    pub fn recent_errors(&self, limit: usize) -> Vec<ErrorLogEntry> {
        self.with_log(|log| {
            let skip = log.len().saturating_sub(limit);
            log.iter().skip(skip).cloned().collect()
        })
    }

    pub fn clear_log(&self) {
        self.with_log(|log| log.clear());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_handle_normalizes_and_counts() {
        let handler = ErrorHandler::new();
        let err = handler
            .handle(anyhow::anyhow!("weird failure"), None)
            .await;
        assert_eq!(err.code(), ErrorCode::UnknownError);
        let stats = handler.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_code[&ErrorCode::UnknownError], 1);
        assert_eq!(stats.recovered, 0);
    }

    #[tokio::test]
    async fn test_callback_sees_every_error() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = seen.clone();
        let handler = ErrorHandler::new().with_callback(Arc::new(move |_: &ArchiveError| {
            seen_cb.fetch_add(1, Ordering::SeqCst);
        }));
        handler.handle(ArchiveError::validation("a"), None).await;
        handler.handle(ArchiveError::validation("b"), None).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_recovers_and_is_recorded() {
        let handler = ErrorHandler::new();
        let err = handler
            .handle(ArchiveError::rate_limit(Some(Duration::from_millis(10))), None)
            .await;
        assert_eq!(err.code(), ErrorCode::RateLimitExceeded);
        assert_eq!(handler.stats().recovered, 1);
        assert!(handler.recent_errors(1)[0].recovered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_rate_limit_wait() {
        let handler = ErrorHandler::new();
        let token = CancellationToken::new();
        let started = tokio::time::Instant::now();
        let (err, _) = tokio::join!(
            handler.handle_cancellable(
                ArchiveError::rate_limit(Some(Duration::from_secs(600))),
                None,
                &token,
            ),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel();
            }
        );
        assert!(err.is_cancellation());
        assert!(started.elapsed() < Duration::from_secs(1));
        let stats = handler.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_code[&ErrorCode::RateLimitExceeded], 1);
        assert_eq!(stats.recovered, 0);
        assert!(!handler.recent_errors(1)[0].recovered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_cancellable_recovers_when_not_cancelled() {
        let handler = ErrorHandler::new();
        let token = CancellationToken::new();
        let started = tokio::time::Instant::now();
        let err = handler
            .handle_cancellable(
                ArchiveError::rate_limit(Some(Duration::from_secs(5))),
                None,
                &token,
            )
            .await;
        assert_eq!(err.code(), ErrorCode::RateLimitExceeded);
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(handler.stats().recovered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_never_waits() {
        let handler = ErrorHandler::new();
        let started = tokio::time::Instant::now();
        let err = handler.record(ArchiveError::rate_limit(Some(Duration::from_secs(600))), None);
        assert_eq!(err.code(), ErrorCode::RateLimitExceeded);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(handler.stats().total, 1);
        assert_eq!(handler.stats().recovered, 0);
    }

    #[tokio::test]
    async fn test_strategy_skipped_without_auto_suggestion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let handler = ErrorHandler::new();
        handler.register_recovery_strategy(
            ErrorCode::AuthenticationFailed,
            Arc::new(move |_: ArchiveError| {
                calls_in.fetch_add(1, Ordering::SeqCst);
                async { true }.boxed()
            }),
        );
        handler
            .handle(ArchiveError::authentication("bad key"), None)
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(handler.stats().recovered, 0);
    }

    #[tokio::test]
    async fn test_network_error_is_not_recovered_here() {
        let handler = ErrorHandler::new();
        let err = handler.handle(ArchiveError::network("reset"), None).await;
        assert!(handler.should_retry(&err));
        assert_eq!(handler.stats().recovered, 0);
    }

    #[tokio::test]
    async fn test_log_is_bounded() {
        let handler = ErrorHandler::with_registry(RecoveryRegistry::new(), 3);
        for i in 0..5 {
            handler
                .handle(ArchiveError::validation(format!("e{i}")), None)
                .await;
        }
        let recent = handler.recent_errors(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].error.message(), "e2");
        assert_eq!(recent[2].error.message(), "e4");
        assert_eq!(handler.stats().total, 5);
    }

    #[test]
    fn test_format_error() {
        let handler = ErrorHandler::new();
        let formatted = handler.format_error(&ArchiveError::rate_limit(None));
        assert_eq!(formatted.title, "Rate Limited");
        assert_eq!(formatted.severity, Severity::Medium);
        assert!(formatted.suggestions[0].auto_recoverable);
        assert_eq!(
            handler.user_message(&ArchiveError::rate_limit(None)),
            formatted.message
        );
    }
}
