//! HTTP status mapping and rate-limit header parsing.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::types::ArchiveError;
use crate::config::{MAX_RETRY_AFTER, MIN_RESET_WAIT};
use crate::platform::Platform;

/// Maps an HTTP status (plus optional platform and retry-after hint) to an
/// `ArchiveError`. Total: every status produces an error.
///
/// Platform overrides:
/// - 401 from Instagram means the post needs a logged-in session.
/// - 429 from X or Reddit is reported as a platform-specific rate limit.
pub fn map_http_status_to_error(
    status: u16,
    platform: Option<Platform>,
    retry_after: Option<Duration>,
    message: Option<&str>,
) -> ArchiveError {
    let detail = message
        .filter(|m| !m.trim().is_empty())
        .map(|m| format!("HTTP {status}: {m}"))
        .unwrap_or_else(|| format!("HTTP {status}"));

    let err = match status {
        400 | 422 => ArchiveError::validation(detail),
        401 => match platform {
            Some(p @ Platform::Instagram) => ArchiveError::login_required(p),
            _ => ArchiveError::authentication(detail),
        },
        402 => ArchiveError::insufficient_credits(1, None),
        403 => ArchiveError::permission_denied(detail),
        404 => ArchiveError::not_found(detail),
        408 | 504 => ArchiveError::timeout(detail),
        410 => ArchiveError::content_unavailable(detail),
        429 => match platform {
            Some(p @ (Platform::X | Platform::Reddit)) => {
                ArchiveError::platform_rate_limit(p, retry_after)
            }
            _ => ArchiveError::rate_limit(retry_after),
        },
        500 | 502 => ArchiveError::server(status, detail),
        503 => ArchiveError::service_unavailable(detail),
        s if (500..600).contains(&s) => ArchiveError::server(status, detail),
        _ => ArchiveError::http(status, detail),
    };

    let err = match retry_after {
        Some(d) if err.retry_after().is_none() && status == 503 => err.with_retry_after(d),
        _ => err,
    };
    err.with_metadata("status", serde_json::json!(status))
}

/// Derives a retry-after duration from response headers.
///
/// `retry_after` is the `Retry-After` header in seconds; `reset_at` is a
/// rate-limit reset unix timestamp (seconds). A reset time in the past is
/// clamped to `MIN_RESET_WAIT`. The result is capped at `MAX_RETRY_AFTER`.
pub fn parse_retry_after(
    retry_after: Option<&str>,
    reset_at: Option<&str>,
    now: DateTime<Utc>,
) -> Option<Duration> {
    let from_header = retry_after
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::from_millis((secs * 1000.0) as u64));

    let from_reset = || {
        let ts = reset_at?.trim().parse::<i64>().ok()?;
        let delta_ms = ts.saturating_mul(1000).saturating_sub(now.timestamp_millis());
        let wait = u64::try_from(delta_ms)
            .map(Duration::from_millis)
            .unwrap_or(MIN_RESET_WAIT);
        Some(wait.max(MIN_RESET_WAIT))
    };

    from_header
        .or_else(from_reset)
        .map(|d| d.min(MAX_RETRY_AFTER))
}
