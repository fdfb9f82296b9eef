//! Three-state circuit breaker.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::types::{
    CircuitBreakerConfig, CircuitBreakerMetrics, CircuitEvent, CircuitEventKind, CircuitState,
};
use crate::backoff::RetryPredicate;
use crate::error_handling::{is_retryable_error, ArchiveError};

const EVENT_BUFFER: usize = 64;

struct BreakerState {
    state: CircuitState,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    rejected_requests: u64,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_opened_at: Option<DateTime<Utc>>,
    last_closed_at: Option<DateTime<Utc>>,
    last_state_change_at: Option<DateTime<Utc>>,
    /// When the open circuit next admits a trial call.
    next_attempt_at: Option<Instant>,
    next_attempt_wall: Option<DateTime<Utc>>,
    /// Bumped on every transition so a stale half-open timer does nothing.
    generation: u64,
    half_open_timer: Option<JoinHandle<()>>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            rejected_requests: 0,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_opened_at: None,
            last_closed_at: None,
            last_state_change_at: None,
            next_attempt_at: None,
            next_attempt_wall: None,
            generation: 0,
            half_open_timer: None,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.half_open_timer.take() {
            timer.abort();
        }
    }
}

struct Inner {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    events: broadcast::Sender<CircuitEvent>,
    is_retryable: RetryPredicate,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.cancel_timer();
    }
}

/// Guards calls to one external dependency.
///
/// Opens after `failure_threshold` consecutive counted failures, rejects calls
/// while open, and moves to half-open once `timeout` has passed (either
/// lazily on the next call or from a timer scheduled when it opened).
/// Failures the shared retry predicate considers permanent are not counted.
///
/// Clones share state; keep one breaker per dependency.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                config,
                state: Mutex::new(BreakerState::new()),
                events,
                is_retryable: Arc::new(is_retryable_error),
            }),
        }
    }

    /// Replaces the predicate deciding which failures count toward opening.
    pub fn with_failure_predicate(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        predicate: RetryPredicate,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                config,
                state: Mutex::new(BreakerState::new()),
                events,
                is_retryable: predicate,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CircuitEvent> {
        self.inner.events.subscribe()
    }

    /// Runs `operation` through the breaker.
    ///
    /// # Errors
    ///
    /// Returns a `CIRCUIT_OPEN` error without invoking `operation` while the
    /// circuit is open and not yet due for a trial. Otherwise returns the
    /// operation's own error.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, ArchiveError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ArchiveError>>,
    {
        self.before_call()?;
        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure(&error);
                Err(error)
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let s = self.lock();
        let rate = |n: u64| {
            if s.total_requests == 0 {
                0.0
            } else {
                n as f64 / s.total_requests as f64
            }
        };
        CircuitBreakerMetrics {
            state: s.state,
            total_requests: s.total_requests,
            successful_requests: s.successful_requests,
            failed_requests: s.failed_requests,
            rejected_requests: s.rejected_requests,
            consecutive_failures: s.consecutive_failures,
            consecutive_successes: s.consecutive_successes,
            last_opened_at: s.last_opened_at,
            last_closed_at: s.last_closed_at,
            last_state_change_at: s.last_state_change_at,
            success_rate: rate(s.successful_requests),
            failure_rate: rate(s.failed_requests),
        }
    }

    /// Forces the circuit closed and clears the consecutive counters.
    pub fn reset(&self) {
        let mut s = self.lock();
        if s.state != CircuitState::Closed {
            self.transition_closed(&mut s);
        }
        s.consecutive_failures = 0;
        s.consecutive_successes = 0;
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn before_call(&self) -> Result<(), ArchiveError> {
        let mut s = self.lock();
        if s.state == CircuitState::Open {
            let due = s.next_attempt_at.map_or(true, |at| Instant::now() >= at);
            if due {
                s.cancel_timer();
                self.transition_half_open(&mut s);
            } else {
                s.rejected_requests += 1;
                self.emit(CircuitEventKind::Reject, s.state);
                let next = s.next_attempt_wall.unwrap_or_else(Utc::now);
                log::debug!(
                    "Circuit '{}' open; rejecting call until {}",
                    self.inner.name,
                    next.to_rfc3339()
                );
                return Err(ArchiveError::circuit_open(&self.inner.name, next));
            }
        }
        s.total_requests += 1;
        Ok(())
    }

    fn record_success(&self) {
        let mut s = self.lock();
        s.successful_requests += 1;
        s.consecutive_failures = 0;
        if s.state == CircuitState::HalfOpen {
            s.consecutive_successes += 1;
            if s.consecutive_successes >= self.inner.config.success_threshold {
                self.transition_closed(&mut s);
            }
        }
        self.emit(CircuitEventKind::Success, s.state);
    }

    fn record_failure(&self, error: &ArchiveError) {
        if !(self.inner.is_retryable)(error) {
            log::debug!(
                "Circuit '{}' ignoring non-transient failure {}",
                self.inner.name,
                error.code()
            );
            return;
        }

        let mut s = self.lock();
        s.failed_requests += 1;
        s.consecutive_failures += 1;
        s.consecutive_successes = 0;
        self.emit(CircuitEventKind::Failure, s.state);

        match s.state {
            CircuitState::HalfOpen => self.transition_open(&mut s),
            CircuitState::Closed
                if s.consecutive_failures >= self.inner.config.failure_threshold =>
            {
                self.transition_open(&mut s)
            }
            _ => {}
        }
    }

    fn transition_open(&self, s: &mut BreakerState) {
        let now = Utc::now();
        let timeout = self.inner.config.timeout;
        s.state = CircuitState::Open;
        s.consecutive_successes = 0;
        s.last_opened_at = Some(now);
        s.last_state_change_at = Some(now);
        s.next_attempt_at = Some(Instant::now() + timeout);
        s.next_attempt_wall = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|d| now.checked_add_signed(d));
        s.generation += 1;
        s.cancel_timer();
        s.half_open_timer = self.schedule_half_open(s.generation);

        log::warn!(
            "Circuit '{}' opened after {} consecutive failures (retry in {}s)",
            self.inner.name,
            s.consecutive_failures,
            timeout.as_secs()
        );
        self.emit(CircuitEventKind::Open, s.state);
    }

    fn transition_half_open(&self, s: &mut BreakerState) {
        s.state = CircuitState::HalfOpen;
        s.consecutive_successes = 0;
        s.last_state_change_at = Some(Utc::now());
        s.next_attempt_at = None;
        s.next_attempt_wall = None;
        s.generation += 1;
        log::info!("Circuit '{}' half-open; allowing trial calls", self.inner.name);
        self.emit(CircuitEventKind::HalfOpen, s.state);
    }

    fn transition_closed(&self, s: &mut BreakerState) {
        let now = Utc::now();
        s.state = CircuitState::Closed;
        s.consecutive_failures = 0;
        s.consecutive_successes = 0;
        s.last_closed_at = Some(now);
        s.last_state_change_at = Some(now);
        s.next_attempt_at = None;
        s.next_attempt_wall = None;
        s.generation += 1;
        s.cancel_timer();
        log::info!("Circuit '{}' closed", self.inner.name);
        self.emit(CircuitEventKind::Close, s.state);
    }

    /// Spawns the half-open timer when a runtime is available. Without one
    /// the transition happens lazily in `before_call`.
    fn schedule_half_open(&self, generation: u64) -> Option<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let timeout = self.inner.config.timeout;
        Some(handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let breaker = CircuitBreaker { inner };
            let mut s = breaker.lock();
            if s.generation == generation && s.state == CircuitState::Open {
                // This task is the timer; drop its own handle rather than abort it.
                s.half_open_timer = None;
                breaker.transition_half_open(&mut s);
            }
        }))
    }

    fn emit(&self, kind: CircuitEventKind, state: CircuitState) {
        // No receivers is fine.
        let _ = self.inner.events.send(CircuitEvent {
            breaker: self.inner.name.clone(),
            kind,
            state,
            at: Utc::now(),
        });
    }
}
