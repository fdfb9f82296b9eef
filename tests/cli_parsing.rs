//! Tests for command-line parsing into `Config`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use post_archiver::backoff::BackoffStrategy;
use post_archiver::config::RetryStrategyArg;
use post_archiver::{Config, LogFormat, LogLevel};

#[test]
fn test_defaults_with_single_url() {
    let config = Config::try_parse_from(["post_archiver", "https://x.com/user/status/123"]).unwrap();
    assert_eq!(config.urls, vec!["https://x.com/user/status/123"]);
    assert_eq!(config.vault_dir, PathBuf::from("./vault"));
    assert_eq!(config.log_level, LogLevel::Info);
    assert_eq!(config.log_format, LogFormat::Plain);
    assert!(!config.download_media);
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.breaker_failure_threshold, 5);
    assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
    assert!(config.validate().is_ok());
}

#[test]
fn test_urls_are_required() {
    assert!(Config::try_parse_from(["post_archiver"]).is_err());
}

#[test]
fn test_flags_and_knobs() {
    let config = Config::try_parse_from([
        "post_archiver",
        "https://x.com/a/status/1",
        "https://www.reddit.com/r/rust/comments/abc123/title/",
        "--vault-dir",
        "/tmp/notes",
        "--download-media",
        "--enable-ai",
        "--log-level",
        "debug",
        "--log-format",
        "json",
        "--retry-strategy",
        "linear",
        "--retry-base-delay-ms",
        "250",
        "--breaker-timeout-secs",
        "5",
    ])
    .unwrap();

    assert_eq!(config.urls.len(), 2);
    assert_eq!(config.vault_dir, PathBuf::from("/tmp/notes"));
    assert!(config.download_media);
    assert!(config.enable_ai);
    assert!(!config.deep_research);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(config.retry_strategy, RetryStrategyArg::Linear);

    let backoff = config.backoff_config();
    assert_eq!(backoff.strategy, BackoffStrategy::Linear);
    assert_eq!(backoff.base_delay, Duration::from_millis(250));
    assert_eq!(
        config.circuit_breaker_config().timeout,
        Duration::from_secs(5)
    );
}

#[test]
fn test_invalid_enum_value_is_rejected() {
    let parsed = Config::try_parse_from([
        "post_archiver",
        "https://x.com/a/status/1",
        "--log-format",
        "xml",
    ]);
    assert!(parsed.is_err());
}

#[test]
fn test_validation_catches_inverted_delays() {
    let config = Config::try_parse_from([
        "post_archiver",
        "https://x.com/a/status/1",
        "--retry-base-delay-ms",
        "5000",
        "--retry-max-delay-ms",
        "1000",
    ])
    .unwrap();
    let err = config.validate().unwrap_err();
    assert_eq!(err.field, "retry_base_delay_ms");
}
