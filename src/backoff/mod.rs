//! Exponential backoff with jitter.
//!
//! `BackoffConfig::calculate_delay` is the pure delay math;
//! `BackoffEngine::execute` is the retry loop that applies it, checking a
//! cancellation token before each attempt and during each sleep.

mod engine;
mod strategy;

pub use engine::{BackoffEngine, RetryAttempt, RetryCallback, RetryPredicate, RetryResult};
pub use strategy::{BackoffConfig, BackoffStrategy, DelayCalculation};
