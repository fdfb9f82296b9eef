//! post_archiver library: archive social-media posts into markdown notes
//!
//! A post URL is validated, canonicalised and fetched from a scraping
//! backend, its media is optionally downloaded next to the note, and the note
//! is written into a vault directory. Every step that creates a file is
//! recorded so a failure later in the run removes what the run created.
//!
//! # Example
//!
//! ```no_run
//! use post_archiver::{run_archive, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     urls: vec!["https://x.com/user/status/123?s=20".to_string()],
//!     vault_dir: std::path::PathBuf::from("vault"),
//!     download_media: true,
//!     ..Default::default()
//! };
//!
//! let report = run_archive(config).await?;
//! println!("{} archived, {} failed", report.successful, report.failed);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. The circuit breaker's half-open
//! timer is spawned on the current runtime when one is available.

pub mod backoff;
pub mod circuit_breaker;
pub mod collaborators;
pub mod config;
pub mod error_handling;
pub mod initialization;
pub mod models;
pub mod orchestrator;
pub mod platform;
mod utils;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use error_handling::{ArchiveError, ErrorCode};
pub use orchestrator::{ArchiveOptions, ArchiveOrchestrator, ArchiveResult};
pub use run::{run_archive, ArchiveReport};

// Wires the default collaborators to the orchestrator for one CLI run.
mod run {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Instant;

    use anyhow::{Context, Result};
    use log::{info, warn};
    use tokio_util::sync::CancellationToken;

    use crate::collaborators::{
        Collaborators, FsContentStore, FsMediaStore, HttpFetchClient, MarkdownConverter,
    };
    use crate::config::Config;
    use crate::initialization::{init_client, init_redirect_client};
    use crate::orchestrator::{
        ArchiveOptions, ArchiveOrchestrator, ArchiveResult, OrchestratorSettings,
    };
    use crate::platform::ShortUrlExpander;

    /// Outcome of archiving every URL in a run.
    #[derive(Debug, Clone)]
    pub struct ArchiveReport {
        /// Each input URL with its result, in input order
        pub results: Vec<(String, ArchiveResult)>,
        /// Number of URLs archived (including cache hits)
        pub successful: usize,
        /// Number of URLs that failed or were cancelled
        pub failed: usize,
        /// Vault directory notes were written into
        pub vault_dir: PathBuf,
        /// Elapsed time in seconds
        pub elapsed_seconds: f64,
    }

    fn build_orchestrator(config: &Config) -> Result<ArchiveOrchestrator> {
        let client = init_client(config).context("Failed to build HTTP client")?;

        let collaborators = Collaborators {
            fetch: Arc::new(HttpFetchClient::new(
                client.clone(),
                config.backend_url.clone(),
                config.api_key.clone(),
            )),
            media: Arc::new(FsMediaStore::new(client, config.vault_dir.clone())),
            converter: Arc::new(MarkdownConverter::new()),
            store: Arc::new(FsContentStore::new(config.vault_dir.clone())),
            share: None,
        };

        let mut orchestrator =
            ArchiveOrchestrator::new(collaborators, OrchestratorSettings::from(config));
        if config.expand_short_urls {
            let redirect_client =
                init_redirect_client(config).context("Failed to build redirect client")?;
            orchestrator =
                orchestrator.with_short_url_expander(ShortUrlExpander::new(redirect_client));
        }
        Ok(orchestrator)
    }

    /// Archives every URL in `config.urls`, one after another.
    ///
    /// Ctrl-C cancels the archive in flight (its partial files are rolled
    /// back) and skips the rest, which are reported as cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP clients
    /// cannot be built. Per-URL failures are reported in the `ArchiveReport`.
    pub async fn run_archive(config: Config) -> Result<ArchiveReport> {
        config.validate().context("Invalid configuration")?;
        let start = Instant::now();

        let orchestrator = build_orchestrator(&config)?;
        let options = ArchiveOptions::from(&config);

        let cancel = CancellationToken::new();
        let signal_token = cancel.clone();
        let signal_task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling");
                signal_token.cancel();
            }
        });

        info!(
            "Archiving {} URL{} into {}",
            config.urls.len(),
            if config.urls.len() == 1 { "" } else { "s" },
            config.vault_dir.display()
        );

        let mut results = Vec::with_capacity(config.urls.len());
        for url in &config.urls {
            let result = orchestrator.orchestrate(url, &options, Some(&cancel)).await;
            results.push((url.clone(), result));
        }
        signal_task.abort();

        let stats = orchestrator.stats();
        info!(
            "Run finished: {} completed, {} failed, {} cancelled, {} cache hits, {} breaker rejections",
            stats.completed, stats.failed, stats.cancelled, stats.cache_hits, stats.breaker_rejections
        );

        let successful = results.iter().filter(|(_, r)| r.success).count();
        Ok(ArchiveReport {
            failed: results.len() - successful,
            successful,
            results,
            vault_dir: config.vault_dir,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        })
    }
}
