//! Logger initialization.

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use colored::*;
use log::{Level, LevelFilter};

use crate::config::LogFormat;
use crate::error_handling::InitializationError;

/// Initializes `env_logger` with the given level and output format.
///
/// `RUST_LOG` is read first; `level` then overrides it for this crate and as
/// the global default. Chatty dependencies are capped regardless.
///
/// ```bash
/// RUST_LOG=debug post_archiver https://x.com/user/status/123
/// RUST_LOG=post_archiver=debug,reqwest=info post_archiver <url> --log-level info
/// ```
///
/// # Errors
///
/// Returns `InitializationError::LoggerError` if a logger is already set.
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> Result<(), InitializationError> {
    let mut builder = env_logger::Builder::from_default_env();

    builder.filter_level(level);
    builder.filter_module("html5ever", LevelFilter::Error);
    builder.filter_module("selectors", LevelFilter::Warn);
    builder.filter_module("reqwest", LevelFilter::Info);
    builder.filter_module("hyper", LevelFilter::Info);
    builder.filter_module("hyper_util", LevelFilter::Info);
    builder.filter_module("post_archiver", level);

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{}",
                    json_line(
                        Utc::now(),
                        record.level(),
                        record.target(),
                        &record.args().to_string()
                    )
                )
            });
        }
        LogFormat::Plain => {
            colored::control::set_override(true);
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{} {} [{}] {}",
                    Utc::now().format("%H:%M:%S%.3f").to_string().dimmed(),
                    record.target().cyan(),
                    colored_level(record.level()),
                    record.args()
                )
            });
        }
    }

    // try_init so tests that initialise more than once don't panic.
    builder.try_init().map_err(InitializationError::from)
}

fn colored_level(level: Level) -> ColoredString {
    let text = level.to_string();
    match level {
        Level::Error => text.red().bold(),
        Level::Warn => text.yellow(),
        Level::Info => text.green(),
        Level::Debug => text.blue(),
        Level::Trace => text.purple(),
    }
}

/// One structured log line.
fn json_line(ts: DateTime<Utc>, level: Level, target: &str, message: &str) -> String {
    serde_json::json!({
        "ts": ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        "level": level.as_str(),
        "target": target,
        "msg": message,
    })
    .to_string()
}
