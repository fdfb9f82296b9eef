//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (cache TTL, retry and breaker defaults, limits)
//! - CLI option types and parsing

mod constants;
mod types;

pub use constants::*;
pub use types::{Config, ConfigValidationError, LogFormat, LogLevel, RetryStrategyArg};
