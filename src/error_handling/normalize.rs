//! Normalization of arbitrary failures into `ArchiveError`.

use std::sync::Arc;

use super::categorization::categorize_reqwest_error;
use super::types::{ArchiveError, ErrorCode, ErrorContext, Severity};

const UNKNOWN_MESSAGE: &str = "Unknown error";

/// Normalizes any error into an `ArchiveError`.
///
/// An `ArchiveError` anywhere in the chain is passed through with `context`
/// merged in. A top-level `reqwest::Error` is categorized by kind and status.
/// Anything else becomes `UNKNOWN_ERROR` (medium severity, not retryable)
/// with the full chain as its message and the original error as its cause.
pub fn normalize(error: anyhow::Error, context: Option<ErrorContext>) -> ArchiveError {
    let normalized = match error.downcast::<ArchiveError>() {
        Ok(archive) => archive,
        Err(error) => match error.downcast::<reqwest::Error>() {
            Ok(http) => categorize_reqwest_error(http, None),
            Err(error) => from_chain(error),
        },
    };

    match context {
        Some(ctx) => normalized.with_context(ctx),
        None => normalized,
    }
}

fn from_chain(error: anyhow::Error) -> ArchiveError {
    if let Some(inner) = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ArchiveError>())
    {
        return inner.clone();
    }

    if error
        .chain()
        .any(|cause| cause.downcast_ref::<serde_json::Error>().is_some())
    {
        return ArchiveError::new(ErrorCode::ParseError, non_empty(format!("{error:#}")))
            .with_shared_cause(Arc::from(Box::<dyn std::error::Error + Send + Sync>::from(
                error,
            )));
    }

    unknown(non_empty(format!("{error:#}")))
        .with_shared_cause(Arc::from(Box::<dyn std::error::Error + Send + Sync>::from(error)))
}

/// Normalizes a loosely-typed JSON error value (as some backends return).
///
/// Objects contribute their `message` (or `error`) field; strings are used
/// as-is; `null` and other values fall back to a generic message.
pub fn normalize_value(value: &serde_json::Value, context: Option<ErrorContext>) -> ArchiveError {
    let message = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };
    let err = unknown(non_empty(message));
    match context {
        Some(ctx) => err.with_context(ctx),
        None => err,
    }
}

fn unknown(message: String) -> ArchiveError {
    ArchiveError::new(ErrorCode::UnknownError, message)
        .with_severity(Severity::Medium)
        .with_retryable(false)
}

fn non_empty(message: String) -> String {
    if message.trim().is_empty() {
        UNKNOWN_MESSAGE.to_string()
    } else {
        message
    }
}
