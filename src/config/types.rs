//! Configuration types and CLI options.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::backoff::{BackoffConfig, BackoffStrategy};
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::config::constants::{
    CACHE_TTL, CIRCUIT_FAILURE_THRESHOLD, CIRCUIT_SUCCESS_THRESHOLD, CIRCUIT_TIMEOUT,
    DEFAULT_BACKEND_URL, DEFAULT_USER_AGENT, HTTP_TIMEOUT_SECS, RETRY_BASE_DELAY_MS,
    RETRY_JITTER_MS, RETRY_MAX_ATTEMPTS, RETRY_MAX_DELAY_MS,
};

/// Logging level for the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: human-readable format with colors (default)
/// - `Json`: one JSON object per line for machine parsing
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Plain,
    Json,
}

/// Delay growth selectable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RetryStrategyArg {
    Exponential,
    Linear,
    Fixed,
}

impl From<RetryStrategyArg> for BackoffStrategy {
    fn from(s: RetryStrategyArg) -> Self {
        match s {
            RetryStrategyArg::Exponential => BackoffStrategy::Exponential,
            RetryStrategyArg::Linear => BackoffStrategy::Linear,
            RetryStrategyArg::Fixed => BackoffStrategy::Fixed,
        }
    }
}

/// A configuration value that failed validation.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value for {field}: {message}")]
pub struct ConfigValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ConfigValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Archiver configuration.
///
/// Parsed from the command line by the binary, or built programmatically
/// from `Default` by library users.
///
/// ```no_run
/// use post_archiver::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     vault_dir: PathBuf::from("/tmp/vault"),
///     download_media: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Parser)]
#[command(
    name = "post_archiver",
    version,
    about = "Archive social-media posts into markdown notes with local media"
)]
pub struct Config {
    /// Post URLs to archive
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,

    /// Directory notes and media are written into
    #[arg(long, default_value = "./vault")]
    pub vault_dir: PathBuf,

    /// Base URL of the scraping backend
    #[arg(long, env = "POST_ARCHIVER_BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    /// API key sent as a bearer token to the backend
    #[arg(long, env = "POST_ARCHIVER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Download images and videos next to the note
    #[arg(long)]
    pub download_media: bool,

    /// Request AI enrichment (costs 2 extra credits)
    #[arg(long)]
    pub enable_ai: bool,

    /// Request deep research (costs 4 extra credits)
    #[arg(long)]
    pub deep_research: bool,

    /// Resolve short links (t.co, bit.ly, ...) before archiving
    #[arg(long)]
    pub expand_short_urls: bool,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = HTTP_TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// HTTP User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Retries after the first failed fetch
    #[arg(long, default_value_t = RETRY_MAX_ATTEMPTS)]
    pub max_retries: u32,

    /// Base retry delay in milliseconds
    #[arg(long, default_value_t = RETRY_BASE_DELAY_MS)]
    pub retry_base_delay_ms: u64,

    /// Cap on the deterministic part of the retry delay in milliseconds
    #[arg(long, default_value_t = RETRY_MAX_DELAY_MS)]
    pub retry_max_delay_ms: u64,

    /// Random jitter added on top of each retry delay, in milliseconds
    #[arg(long, default_value_t = RETRY_JITTER_MS)]
    pub retry_jitter_ms: u64,

    /// How retry delays grow
    #[arg(long, value_enum, default_value_t = RetryStrategyArg::Exponential)]
    pub retry_strategy: RetryStrategyArg,

    /// Consecutive failures before the backend circuit opens
    #[arg(long, default_value_t = CIRCUIT_FAILURE_THRESHOLD)]
    pub breaker_failure_threshold: u32,

    /// Consecutive half-open successes before the circuit closes
    #[arg(long, default_value_t = CIRCUIT_SUCCESS_THRESHOLD)]
    pub breaker_success_threshold: u32,

    /// Seconds the circuit stays open before a trial request
    #[arg(long, default_value_t = CIRCUIT_TIMEOUT.as_secs())]
    pub breaker_timeout_secs: u64,

    /// Seconds a successful archive stays cached
    #[arg(long, default_value_t = CACHE_TTL.as_secs())]
    pub cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            vault_dir: PathBuf::from("./vault"),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            api_key: None,
            download_media: false,
            enable_ai: false,
            deep_research: false,
            expand_short_urls: false,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            timeout_seconds: HTTP_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_retries: RETRY_MAX_ATTEMPTS,
            retry_base_delay_ms: RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: RETRY_MAX_DELAY_MS,
            retry_jitter_ms: RETRY_JITTER_MS,
            retry_strategy: RetryStrategyArg::Exponential,
            breaker_failure_threshold: CIRCUIT_FAILURE_THRESHOLD,
            breaker_success_threshold: CIRCUIT_SUCCESS_THRESHOLD,
            breaker_timeout_secs: CIRCUIT_TIMEOUT.as_secs(),
            cache_ttl_secs: CACHE_TTL.as_secs(),
        }
    }
}

impl Config {
    /// Checks cross-field constraints clap cannot express.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if url::Url::parse(&self.backend_url).is_err() {
            return Err(ConfigValidationError::new(
                "backend_url",
                format!("'{}' is not a valid URL", self.backend_url),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigValidationError::new(
                "timeout_seconds",
                "must be greater than zero",
            ));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(ConfigValidationError::new(
                "retry_base_delay_ms",
                format!(
                    "base delay {}ms exceeds max delay {}ms",
                    self.retry_base_delay_ms, self.retry_max_delay_ms
                ),
            ));
        }
        if self.breaker_failure_threshold == 0 {
            return Err(ConfigValidationError::new(
                "breaker_failure_threshold",
                "must be at least 1",
            ));
        }
        if self.breaker_success_threshold == 0 {
            return Err(ConfigValidationError::new(
                "breaker_success_threshold",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            max_attempts: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            jitter_range: Duration::from_millis(self.retry_jitter_ms),
            strategy: self.retry_strategy.into(),
        }
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            success_threshold: self.breaker_success_threshold,
            timeout: Duration::from_secs(self.breaker_timeout_secs),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
