//! Circuit breakers for external dependencies.
//!
//! One breaker guards each dependency (the scraping backend, media hosts).
//! A breaker opens after repeated transient failures, rejects calls with a
//! `CIRCUIT_OPEN` error while open, and admits trial calls after its timeout.

mod breaker;
mod types;

pub use breaker::CircuitBreaker;
pub use types::{
    CircuitBreakerConfig, CircuitBreakerMetrics, CircuitEvent, CircuitEventKind, CircuitState,
};
