//! Main application entry point (CLI binary).
//!
//! Thin wrapper around the `post_archiver` library: loads `.env`, parses
//! arguments, initialises logging and prints one line per URL.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::process;

use post_archiver::initialization::init_logger_with;
use post_archiver::{run_archive, ArchiveResult, Config};

fn summary_line(url: &str, result: &ArchiveResult) -> String {
    if result.success {
        let path = result
            .file_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let mut line = format!("{} {url} -> {path}", "ok".green());
        if result.from_cache {
            line.push_str(" (cached)");
        }
        if let Some(share) = &result.share_url {
            line.push_str(&format!(" [{share}]"));
        }
        let plural = if result.credits_used == 1 { "" } else { "s" };
        line.push_str(&format!(" ({} credit{plural})", result.credits_used));
        line
    } else {
        format!(
            "{} {url}: {}",
            "failed".red(),
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; anything set there only fills env-backed flags.
    let _ = dotenvy::dotenv();

    let config = Config::parse();
    init_logger_with(config.log_level.into(), config.log_format)
        .context("Failed to initialize logger")?;

    let report = match run_archive(config).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(2);
        }
    };

    for (url, result) in &report.results {
        println!("{}", summary_line(url, result));
    }
    println!(
        "Archived {} of {} URL{} into {} in {:.1}s",
        report.successful,
        report.results.len(),
        if report.results.len() == 1 { "" } else { "s" },
        report.vault_dir.display(),
        report.elapsed_seconds
    );

    if report.failed > 0 {
        process::exit(1);
    }
    Ok(())
}
