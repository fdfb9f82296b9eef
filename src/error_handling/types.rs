//! Error type definitions.
//!
//! `ArchiveError` is the single error currency past the error-handler
//! boundary. Its `ErrorCode` is a closed set; severity, retryability and
//! recovery suggestions default per code and can be overridden at the
//! construction site.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use serde::Serialize;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

use crate::platform::Platform;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Closed set of failure kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, EnumIterMacro,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Network
    NetworkError,
    TimeoutError,
    RateLimitExceeded,
    PlatformRateLimited,
    // Access
    AuthenticationFailed,
    LoginRequired,
    PermissionDenied,
    // Content
    NotFound,
    ContentUnavailable,
    // Input
    ValidationError,
    InvalidUrl,
    UnsupportedPlatform,
    // Storage and media
    VaultError,
    FileNotFound,
    MediaError,
    MediaTooLarge,
    // Accounting
    InsufficientCredits,
    // Control flow
    OperationCancelled,
    OperationTimeout,
    CircuitOpen,
    // Upstream
    ServerError,
    ServiceUnavailable,
    HttpError,
    // Processing
    ParseError,
    ConversionError,
    ConfigurationError,
    InternalError,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::TimeoutError => "TIMEOUT_ERROR",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::PlatformRateLimited => "PLATFORM_RATE_LIMITED",
            ErrorCode::AuthenticationFailed => "AUTHENTICATION_FAILED",
            ErrorCode::LoginRequired => "LOGIN_REQUIRED",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ContentUnavailable => "CONTENT_UNAVAILABLE",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::InvalidUrl => "INVALID_URL",
            ErrorCode::UnsupportedPlatform => "UNSUPPORTED_PLATFORM",
            ErrorCode::VaultError => "VAULT_ERROR",
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::MediaError => "MEDIA_ERROR",
            ErrorCode::MediaTooLarge => "MEDIA_TOO_LARGE",
            ErrorCode::InsufficientCredits => "INSUFFICIENT_CREDITS",
            ErrorCode::OperationCancelled => "OPERATION_CANCELLED",
            ErrorCode::OperationTimeout => "OPERATION_TIMEOUT",
            ErrorCode::CircuitOpen => "CIRCUIT_OPEN",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::HttpError => "HTTP_ERROR",
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::ConversionError => "CONVERSION_ERROR",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Short heading used when presenting the error to a user.
    pub fn title(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "Network Error",
            ErrorCode::TimeoutError | ErrorCode::OperationTimeout => "Request Timed Out",
            ErrorCode::RateLimitExceeded | ErrorCode::PlatformRateLimited => "Rate Limited",
            ErrorCode::AuthenticationFailed => "Authentication Failed",
            ErrorCode::LoginRequired => "Login Required",
            ErrorCode::PermissionDenied => "Permission Denied",
            ErrorCode::NotFound => "Post Not Found",
            ErrorCode::ContentUnavailable => "Content Unavailable",
            ErrorCode::ValidationError => "Invalid Input",
            ErrorCode::InvalidUrl => "Invalid URL",
            ErrorCode::UnsupportedPlatform => "Unsupported Platform",
            ErrorCode::VaultError | ErrorCode::FileNotFound => "Storage Error",
            ErrorCode::MediaError | ErrorCode::MediaTooLarge => "Media Error",
            ErrorCode::InsufficientCredits => "Insufficient Credits",
            ErrorCode::OperationCancelled => "Cancelled",
            ErrorCode::CircuitOpen => "Service Temporarily Disabled",
            ErrorCode::ServerError | ErrorCode::ServiceUnavailable | ErrorCode::HttpError => {
                "Server Error"
            }
            ErrorCode::ParseError | ErrorCode::ConversionError => "Processing Error",
            ErrorCode::ConfigurationError => "Configuration Error",
            ErrorCode::InternalError | ErrorCode::UnknownError => "Unexpected Error",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            ErrorCode::AuthenticationFailed
            | ErrorCode::LoginRequired
            | ErrorCode::PermissionDenied
            | ErrorCode::VaultError
            | ErrorCode::FileNotFound
            | ErrorCode::InsufficientCredits
            | ErrorCode::ConfigurationError
            | ErrorCode::InternalError => Severity::High,
            ErrorCode::OperationCancelled
            | ErrorCode::ValidationError
            | ErrorCode::InvalidUrl
            | ErrorCode::UnsupportedPlatform
            | ErrorCode::MediaTooLarge => Severity::Low,
            _ => Severity::Medium,
        }
    }

    /// Whether failures of this kind are transient by default.
    pub fn is_retryable_by_default(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkError
                | ErrorCode::TimeoutError
                | ErrorCode::RateLimitExceeded
                | ErrorCode::PlatformRateLimited
                | ErrorCode::ServerError
                | ErrorCode::ServiceUnavailable
                | ErrorCode::OperationTimeout
        )
    }

    fn default_suggestions(&self) -> Vec<RecoverySuggestion> {
        use RecoveryAction::*;
        match self {
            ErrorCode::NetworkError => vec![
                RecoverySuggestion::manual(CheckConnection, "Check your internet connection"),
                RecoverySuggestion::auto(Retry, "Retry the request"),
            ],
            ErrorCode::TimeoutError | ErrorCode::OperationTimeout => {
                vec![RecoverySuggestion::auto(Retry, "Retry the request")]
            }
            ErrorCode::RateLimitExceeded | ErrorCode::PlatformRateLimited => vec![
                RecoverySuggestion::auto(Wait, "Wait for the rate limit to reset"),
            ],
            ErrorCode::ServerError | ErrorCode::ServiceUnavailable => vec![
                RecoverySuggestion::auto(Retry, "Retry in a moment"),
            ],
            ErrorCode::AuthenticationFailed => vec![RecoverySuggestion::manual(
                CheckCredentials,
                "Check your API key",
            )],
            ErrorCode::LoginRequired => vec![RecoverySuggestion::manual(
                Login,
                "This post requires a logged-in session",
            )],
            ErrorCode::PermissionDenied => vec![RecoverySuggestion::manual(
                CheckPermissions,
                "The post may be private or restricted",
            )],
            ErrorCode::NotFound | ErrorCode::ContentUnavailable => vec![
                RecoverySuggestion::manual(CheckUrl, "Check that the post still exists"),
            ],
            ErrorCode::ValidationError
            | ErrorCode::InvalidUrl
            | ErrorCode::UnsupportedPlatform => vec![RecoverySuggestion::manual(
                CheckUrl,
                "Check the URL and try again",
            )],
            ErrorCode::VaultError | ErrorCode::FileNotFound => vec![RecoverySuggestion::manual(
                CheckPermissions,
                "Check that the vault folder is writable",
            )],
            ErrorCode::MediaError | ErrorCode::MediaTooLarge => vec![RecoverySuggestion::auto(
                SkipMedia,
                "Archive the post without this media item",
            )],
            ErrorCode::InsufficientCredits => vec![RecoverySuggestion::manual(
                PurchaseCredits,
                "Top up credits or disable AI options",
            )],
            ErrorCode::CircuitOpen => vec![RecoverySuggestion::manual(
                Wait,
                "The service is failing repeatedly; try again later",
            )],
            ErrorCode::HttpError => vec![RecoverySuggestion::manual(Retry, "Try again later")],
            ErrorCode::ParseError
            | ErrorCode::ConversionError
            | ErrorCode::InternalError
            | ErrorCode::UnknownError => vec![RecoverySuggestion::manual(
                ReportBug,
                "Report this problem if it persists",
            )],
            ErrorCode::OperationCancelled | ErrorCode::ConfigurationError => Vec::new(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, EnumIterMacro)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Wait,
    Retry,
    CheckConnection,
    CheckCredentials,
    Login,
    CheckUrl,
    CheckPermissions,
    SkipMedia,
    PurchaseCredits,
    ReportBug,
}

/// A hint attached to an error. `auto_recoverable` suggestions may be acted on
/// without asking the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoverySuggestion {
    pub action: RecoveryAction,
    pub description: String,
    pub auto_recoverable: bool,
}

impl RecoverySuggestion {
    pub fn auto(action: RecoveryAction, description: impl Into<String>) -> Self {
        Self {
            action,
            description: description.into(),
            auto_recoverable: true,
        }
    }

    pub fn manual(action: RecoveryAction, description: impl Into<String>) -> Self {
        Self {
            action,
            description: description.into(),
            auto_recoverable: false,
        }
    }
}

/// Where and when an error happened.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    pub url: Option<String>,
    pub platform: Option<Platform>,
    pub operation: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Backtrace text, present only when backtraces are enabled (`RUST_BACKTRACE`).
    pub stack: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        let backtrace = Backtrace::capture();
        let stack = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };
        Self {
            url: None,
            platform: None,
            operation: None,
            timestamp: Utc::now(),
            stack,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Fills in fields from `other`. Fields set in `other` win; metadata is
    /// unioned. The original timestamp and stack are kept.
    pub fn merge(&mut self, other: ErrorContext) {
        if other.url.is_some() {
            self.url = other.url;
        }
        if other.platform.is_some() {
            self.platform = other.platform;
        }
        if other.operation.is_some() {
            self.operation = other.operation;
        }
        if self.stack.is_none() {
            self.stack = other.stack;
        }
        self.metadata.extend(other.metadata);
    }
}

/// The archiver's error type.
///
/// Immutable once built: the builder-style `with_*` methods consume and
/// return the error, and nothing mutates it after it leaves its
/// construction site.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct ArchiveError {
    code: ErrorCode,
    severity: Severity,
    message: String,
    user_message: String,
    retryable: bool,
    suggestions: Vec<RecoverySuggestion>,
    context: ErrorContext,
    retry_after: Option<Duration>,
    #[source]
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ArchiveError {
    /// Builds an error with the defaults registered for `code`.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code,
            severity: code.default_severity(),
            user_message: message.clone(),
            message,
            retryable: code.is_retryable_by_default(),
            suggestions: code.default_suggestions(),
            context: ErrorContext::new(),
            retry_after: None,
            cause: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
            .with_user_message("Could not reach the archive service. Check your connection.")
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TimeoutError, message)
            .with_user_message("The request took too long to complete.")
    }

    pub fn rate_limit(retry_after: Option<Duration>) -> Self {
        let message = match retry_after {
            Some(d) => format!("Rate limit exceeded, retry after {}ms", d.as_millis()),
            None => "Rate limit exceeded".to_string(),
        };
        let mut err = Self::new(ErrorCode::RateLimitExceeded, message)
            .with_user_message("Too many requests. Please wait a moment and try again.");
        err.retry_after = retry_after;
        err
    }

    pub fn platform_rate_limit(platform: Platform, retry_after: Option<Duration>) -> Self {
        let message = match retry_after {
            Some(d) => format!(
                "{} rate limit reached, retry after {}ms",
                platform.display_name(),
                d.as_millis()
            ),
            None => format!("{} rate limit reached", platform.display_name()),
        };
        let mut err = Self::new(ErrorCode::PlatformRateLimited, message).with_user_message(
            format!(
                "{} is limiting requests right now. Please try again shortly.",
                platform.display_name()
            ),
        );
        err.retry_after = retry_after;
        err.context.platform = Some(platform);
        err
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthenticationFailed, message)
            .with_user_message("Authentication failed. Check your API key.")
    }

    pub fn login_required(platform: Platform) -> Self {
        let mut err = Self::new(
            ErrorCode::LoginRequired,
            format!("{} requires login to view this post", platform.display_name()),
        );
        err.context.platform = Some(platform);
        err
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
            .with_user_message("The post could not be found. It may have been deleted.")
    }

    pub fn content_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ContentUnavailable, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn invalid_url(url: &str) -> Self {
        let shown: String = url.chars().take(100).collect();
        Self::new(ErrorCode::InvalidUrl, format!("Invalid URL: {shown}"))
            .with_user_message("The URL is not valid. Use a full http(s) link to a post.")
    }

    pub fn unsupported_platform(url: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedPlatform,
            format!("No supported platform matches {url}"),
        )
        .with_user_message("This site is not supported.")
    }

    pub fn vault(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::VaultError, message)
            .with_user_message("Could not write to the vault folder.")
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::FileNotFound,
            format!("File not found: {}", path.into()),
        )
    }

    pub fn media(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MediaError, message)
    }

    pub fn insufficient_credits(required: u32, available: Option<u32>) -> Self {
        let message = match available {
            Some(a) => format!("Insufficient credits: {required} required, {a} available"),
            None => format!("Insufficient credits: {required} required"),
        };
        Self::new(ErrorCode::InsufficientCredits, message)
            .with_metadata("required_credits", serde_json::json!(required))
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorCode::OperationCancelled, "Archive cancelled by user")
    }

    pub fn operation_timeout(operation: &str, limit: Duration) -> Self {
        Self::new(
            ErrorCode::OperationTimeout,
            format!("{operation} timed out after {}ms", limit.as_millis()),
        )
    }

    /// Rejection from an open circuit breaker. Never retried.
    pub fn circuit_open(name: &str, next_retry_at: DateTime<Utc>) -> Self {
        Self::new(
            ErrorCode::CircuitOpen,
            format!(
                "Circuit breaker '{name}' is open; next attempt allowed at {}",
                next_retry_at.to_rfc3339()
            ),
        )
        .with_user_message("The service is temporarily unavailable. Please try again later.")
        .with_metadata("breaker", serde_json::json!(name))
        .with_metadata("next_retry_at", serde_json::json!(next_retry_at.to_rfc3339()))
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServerError, message)
            .with_metadata("status", serde_json::json!(status))
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::HttpError, message).with_metadata("status", serde_json::json!(status))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnknownError, message)
    }

    // Builders

    pub fn with_user_message(mut self, user_message: impl Into<String>) -> Self {
        self.user_message = user_message.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn with_suggestion(mut self, suggestion: RecoverySuggestion) -> Self {
        self.suggestions.push(suggestion);
        self
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context.merge(context);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.metadata.insert(key.into(), value);
        self
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub(crate) fn with_shared_cause(
        mut self,
        cause: Arc<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        self.cause = Some(cause);
        self
    }

    // Accessors

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn suggestions(&self) -> &[RecoverySuggestion] {
        &self.suggestions
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn has_auto_recoverable_suggestion(&self) -> bool {
        self.suggestions.iter().any(|s| s.auto_recoverable)
    }

    pub fn is_cancellation(&self) -> bool {
        self.code == ErrorCode::OperationCancelled
    }

    pub fn is_circuit_open(&self) -> bool {
        self.code == ErrorCode::CircuitOpen
    }
}
