//! Error statistics tracking.
//!
//! Thread-safe counters per `ErrorCode` and `Severity`, plus how many
//! handled errors were recovered in-process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use strum::IntoEnumIterator;

use super::types::{ErrorCode, Severity};

/// Atomic error counters, shared across tasks behind an `Arc`.
///
/// Every code and severity is initialized to zero on creation, so lookups
/// never miss.
pub struct ErrorStats {
    by_code: HashMap<ErrorCode, AtomicUsize>,
    by_severity: HashMap<Severity, AtomicUsize>,
    recovered: AtomicUsize,
}

/// Point-in-time copy of `ErrorStats`. Codes with zero count are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStatsSnapshot {
    pub total: usize,
    pub recovered: usize,
    /// `recovered / total`, or 0.0 before any error was handled.
    pub recovery_rate: f64,
    pub by_code: HashMap<ErrorCode, usize>,
    pub by_severity: HashMap<Severity, usize>,
}

impl Default for ErrorStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorStats {
    pub fn new() -> Self {
        let by_code = ErrorCode::iter()
            .map(|code| (code, AtomicUsize::new(0)))
            .collect();
        let by_severity = Severity::iter()
            .map(|severity| (severity, AtomicUsize::new(0)))
            .collect();
        ErrorStats {
            by_code,
            by_severity,
            recovered: AtomicUsize::new(0),
        }
    }

    pub fn record(&self, code: ErrorCode, severity: Severity) {
        if let Some(counter) = self.by_code.get(&code) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!("Error code {code:?} missing from ErrorStats map");
        }
        if let Some(counter) = self.by_severity.get(&severity) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_recovered(&self) {
        self.recovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self, code: ErrorCode) -> usize {
        self.by_code
            .get(&code)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn severity_count(&self, severity: Severity) -> usize {
        self.by_severity
            .get(&severity)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        ErrorCode::iter().map(|c| self.count(c)).sum()
    }

    pub fn recovered(&self) -> usize {
        self.recovered.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ErrorStatsSnapshot {
        let total = self.total();
        let recovered = self.recovered();
        ErrorStatsSnapshot {
            total,
            recovered,
            recovery_rate: if total == 0 {
                0.0
            } else {
                recovered as f64 / total as f64
            },
            by_code: ErrorCode::iter()
                .map(|c| (c, self.count(c)))
                .filter(|(_, n)| *n > 0)
                .collect(),
            by_severity: Severity::iter()
                .map(|s| (s, self.severity_count(s)))
                .filter(|(_, n)| *n > 0)
                .collect(),
        }
    }
}
