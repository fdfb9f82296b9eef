//! Configuration constants.
//!
//! Defaults for the resilience layer, cache and URL handling. Most of these
//! can be overridden per run through `Config`.

use std::time::Duration;

// Archive cache
/// How long a successful archive stays in the dedup cache.
pub const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

// Retry strategy
/// Number of retries after the first attempt (4 attempts total).
pub const RETRY_MAX_ATTEMPTS: u32 = 3;
/// Base delay in milliseconds for the first retry.
pub const RETRY_BASE_DELAY_MS: u64 = 1000;
/// Cap applied to the deterministic part of the delay.
pub const RETRY_MAX_DELAY_MS: u64 = 32_000;
/// Upper bound of the random jitter added after capping.
/// The effective maximum wait is `RETRY_MAX_DELAY_MS + RETRY_JITTER_MS`.
pub const RETRY_JITTER_MS: u64 = 1000;

// Circuit breaker
/// Consecutive counted failures that open the circuit.
pub const CIRCUIT_FAILURE_THRESHOLD: u32 = 5;
/// Consecutive successes in half-open needed to close the circuit.
pub const CIRCUIT_SUCCESS_THRESHOLD: u32 = 3;
/// Time the circuit stays open before a trial call is allowed.
pub const CIRCUIT_TIMEOUT: Duration = Duration::from_secs(60);

// URL handling
/// Maximum URL length accepted before any parsing.
pub const MAX_URL_LENGTH: usize = 2048;
/// Maximum number of redirect hops followed when expanding short links.
pub const MAX_REDIRECT_HOPS: usize = 10;

// Rate limit headers
/// Upper bound on a server-supplied retry-after hint.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(15 * 60);
/// Floor used when a rate-limit reset timestamp is already in the past.
pub const MIN_RESET_WAIT: Duration = Duration::from_millis(1000);

// Error handler
/// Capacity of the in-memory error log ring buffer.
pub const ERROR_LOG_CAPACITY: usize = 100;

// Events
/// Capacity of the orchestrator's broadcast event channel.
/// Slow subscribers lag and skip events past this point.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// HTTP
/// Per-request timeout for backend and media requests.
pub const HTTP_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_USER_AGENT: &str = concat!("post_archiver/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
/// Header carrying a unix timestamp (seconds) at which a rate limit resets.
pub const HEADER_RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
