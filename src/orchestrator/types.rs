//! Orchestrator options, progress and results.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::backoff::BackoffConfig;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::collaborators::FetchOptions;
use crate::config::{Config, CACHE_TTL, ERROR_LOG_CAPACITY};
use crate::error_handling::{ArchiveError, ErrorCode};

/// Stages of one archive run, in order. `Error` and `Cancelled` end a run
/// from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveStage {
    Fetching,
    Downloading,
    Processing,
    Saving,
    Complete,
    Error,
    Cancelled,
}

impl ArchiveStage {
    /// Overall percent range covered by this stage.
    pub fn percent_range(&self) -> (u8, u8) {
        match self {
            ArchiveStage::Fetching => (0, 50),
            ArchiveStage::Downloading => (50, 70),
            ArchiveStage::Processing => (70, 80),
            ArchiveStage::Saving => (80, 100),
            ArchiveStage::Complete => (100, 100),
            ArchiveStage::Error | ArchiveStage::Cancelled => (0, 100),
        }
    }

    /// Maps progress within the stage (0..=100) onto the overall percent.
    pub fn scale(&self, within: u8) -> u8 {
        let (start, end) = self.percent_range();
        let within = u32::from(within.min(100));
        let span = u32::from(end - start);
        start + (span * within / 100) as u8
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ArchiveStage::Complete | ArchiveStage::Error | ArchiveStage::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveProgress {
    pub stage: ArchiveStage,
    /// Overall percent, 0..=100.
    pub percent: u8,
    pub message: String,
}

/// What to do for one archive run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub download_media: bool,
    pub enable_ai: bool,
    pub deep_research: bool,
    pub include_comments: bool,
    pub create_share_link: bool,
    /// Body template for the converter.
    pub template: Option<String>,
}

impl ArchiveOptions {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            enable_ai: self.enable_ai,
            deep_research: self.deep_research,
            include_comments: self.include_comments,
        }
    }
}

impl From<&Config> for ArchiveOptions {
    fn from(config: &Config) -> Self {
        Self {
            download_media: config.download_media,
            enable_ai: config.enable_ai,
            deep_research: config.deep_research,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveResult {
    pub success: bool,
    pub file_path: Option<PathBuf>,
    pub share_url: Option<String>,
    /// User-facing error message when `success` is false.
    pub error: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub credits_used: u32,
    /// Served from the dedup cache without fetching.
    pub from_cache: bool,
}

impl ArchiveResult {
    pub(crate) fn completed(file_path: PathBuf, share_url: Option<String>, credits_used: u32) -> Self {
        Self {
            success: true,
            file_path: Some(file_path),
            share_url,
            error: None,
            error_code: None,
            credits_used,
            from_cache: false,
        }
    }

    pub(crate) fn cached(file_path: PathBuf, share_url: Option<String>) -> Self {
        Self {
            from_cache: true,
            ..Self::completed(file_path, share_url, 0)
        }
    }

    pub(crate) fn failed(error: &ArchiveError) -> Self {
        Self {
            success: false,
            file_path: None,
            share_url: None,
            error: Some(error.user_message().to_string()),
            error_code: Some(error.code()),
            credits_used: 0,
            from_cache: false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.error_code == Some(ErrorCode::OperationCancelled)
    }
}

/// Tunables for an orchestrator instance.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub backoff: BackoffConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub cache_ttl: Duration,
    pub error_log_capacity: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            cache_ttl: CACHE_TTL,
            error_log_capacity: ERROR_LOG_CAPACITY,
        }
    }
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            backoff: config.backoff_config(),
            circuit_breaker: config.circuit_breaker_config(),
            cache_ttl: config.cache_ttl(),
            error_log_capacity: ERROR_LOG_CAPACITY,
        }
    }
}
