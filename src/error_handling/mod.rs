//! Error taxonomy, normalization and handling.
//!
//! This module provides:
//! - `ArchiveError`, the closed `ErrorCode` set and recovery suggestions
//! - HTTP status and rate-limit header mapping
//! - Normalization of arbitrary failures into `ArchiveError`
//! - The `ErrorHandler` with its bounded log, statistics and recovery registry
//! - The shared retryability predicate used by backoff and circuit breaker
//!
//! Errors are classified by severity:
//! - **High**: needs user action (credentials, storage, credits)
//! - **Medium**: transient or unexpected failures
//! - **Low**: bad input and cancellations

mod categorization;
mod handler;
mod http_status;
mod normalize;
mod recovery;
mod retry;
mod stats;
mod types;

pub use categorization::categorize_reqwest_error;
pub use handler::{ErrorCallback, ErrorHandler, ErrorLogEntry, FormattedError};
pub use http_status::{map_http_status_to_error, parse_retry_after};
pub use normalize::{normalize, normalize_value};
pub use recovery::{RecoveryRegistry, RecoveryStrategy};
pub use retry::is_retryable_error;
pub use stats::{ErrorStats, ErrorStatsSnapshot};
pub use types::{
    ArchiveError, ErrorCode, ErrorContext, InitializationError, RecoveryAction,
    RecoverySuggestion, Severity,
};
