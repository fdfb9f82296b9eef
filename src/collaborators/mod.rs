//! Ports to the systems the orchestrator coordinates, plus default adapters.
//!
//! Collaborators return `anyhow::Result`; the orchestrator normalises their
//! failures into `ArchiveError` at its boundary. An adapter that already
//! knows the precise failure kind can return an `ArchiveError` inside the
//! `anyhow::Error` and it will be kept as is.

mod fs_content;
mod fs_media;
mod http_fetch;
mod markdown;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Document, MediaItem, MediaResult, PostData};
use crate::platform::{self, Platform};

pub use fs_content::FsContentStore;
pub use fs_media::FsMediaStore;
pub use http_fetch::HttpFetchClient;
pub use markdown::MarkdownConverter;

/// Progress callback: `(percent 0..=100, message)`.
pub type ProgressFn = Arc<dyn Fn(u8, &str) + Send + Sync>;

/// Options forwarded to the scraping backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchOptions {
    pub enable_ai: bool,
    pub deep_research: bool,
    /// Fetch comments/replies along with the post when the backend supports it.
    pub include_comments: bool,
}

/// Client for the scraping backend.
#[async_trait]
pub trait FetchClient: Send + Sync {
    async fn archive_post(
        &self,
        url: &str,
        options: &FetchOptions,
        on_progress: Option<ProgressFn>,
    ) -> anyhow::Result<PostData>;

    fn detect_platform(&self, url: &str) -> Option<Platform> {
        platform::detect_platform(url)
    }

    fn validate_url(&self, url: &str) -> bool {
        platform::validate_url(url)
    }
}

/// Downloads and removes local media.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn download_media(
        &self,
        items: &[MediaItem],
        platform: Platform,
        post_id: &str,
        author_handle: &str,
        on_progress: Option<ProgressFn>,
    ) -> anyhow::Result<Vec<MediaResult>>;

    async fn delete_media(&self, path: &Path) -> anyhow::Result<()>;
}

/// Renders posts into notes.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(
        &self,
        post: &PostData,
        template: Option<&str>,
        media: &[MediaResult],
    ) -> anyhow::Result<Document>;

    /// Re-renders `doc.content` after its front matter or body changed.
    fn update_full_document(&self, doc: &mut Document) -> anyhow::Result<()>;
}

/// A persisted note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Where notes are persisted.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn save_post(&self, post: &PostData, doc: &Document) -> anyhow::Result<PathBuf>;

    async fn get_file_by_path(&self, path: &Path) -> anyhow::Result<Option<StoredFile>>;

    async fn delete_file(&self, path: &Path) -> anyhow::Result<()>;
}

/// Publishes a saved note and returns a shareable URL.
#[async_trait]
pub trait ShareLinkPublisher: Send + Sync {
    async fn publish(&self, path: &Path, post: &PostData) -> anyhow::Result<String>;
}

/// The full set of collaborators an orchestrator works with.
#[derive(Clone)]
pub struct Collaborators {
    pub fetch: Arc<dyn FetchClient>,
    pub media: Arc<dyn MediaStore>,
    pub converter: Arc<dyn DocumentConverter>,
    pub store: Arc<dyn ContentStore>,
    pub share: Option<Arc<dyn ShareLinkPublisher>>,
}
