//! Circuit breaker state, configuration, metrics and events.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{CIRCUIT_FAILURE_THRESHOLD, CIRCUIT_SUCCESS_THRESHOLD, CIRCUIT_TIMEOUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls pass through; counted failures accumulate.
    Closed,
    /// Calls are rejected until the timeout elapses.
    Open,
    /// Trial calls pass; one failure reopens, enough successes close.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive counted failures that open the circuit.
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close it again.
    pub success_threshold: u32,
    /// How long the circuit stays open before allowing a trial call.
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: CIRCUIT_FAILURE_THRESHOLD,
            success_threshold: CIRCUIT_SUCCESS_THRESHOLD,
            timeout: CIRCUIT_TIMEOUT,
        }
    }
}

/// Read-only snapshot of a breaker's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rejected_requests: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_opened_at: Option<DateTime<Utc>>,
    pub last_closed_at: Option<DateTime<Utc>>,
    pub last_state_change_at: Option<DateTime<Utc>>,
    /// `successful_requests / total_requests`, 0.0 when idle.
    pub success_rate: f64,
    /// `failed_requests / total_requests`, 0.0 when idle.
    pub failure_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitEventKind {
    Open,
    HalfOpen,
    Close,
    Success,
    Failure,
    Reject,
}

/// Notification published on every transition and call outcome.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitEvent {
    pub breaker: String,
    pub kind: CircuitEventKind,
    /// State after the event.
    pub state: CircuitState,
    pub at: DateTime<Utc>,
}
