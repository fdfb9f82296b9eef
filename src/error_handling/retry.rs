//! Shared retryability predicate.

use super::types::ArchiveError;

/// Decides whether a failure is transient and worth retrying.
///
/// Used by both the backoff engine and the circuit breaker, so the two never
/// disagree about which failures are transient. Circuit-open rejections and
/// cancellations are never retryable, whatever their flag says.
pub fn is_retryable_error(error: &ArchiveError) -> bool {
    if error.is_circuit_open() || error.is_cancellation() {
        return false;
    }
    error.is_retryable()
}
