// Shared in-memory collaborators for orchestrator integration tests.
//
// Each fake records what it was asked to do so tests can assert on calls and
// on which artifacts still exist after a run.

#![allow(dead_code)] // Not every test file uses every helper

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use post_archiver::backoff::{BackoffConfig, BackoffStrategy};
use post_archiver::circuit_breaker::CircuitBreakerConfig;
use post_archiver::collaborators::{
    Collaborators, ContentStore, DocumentConverter, FetchClient, FetchOptions, MarkdownConverter,
    MediaStore, ProgressFn, ShareLinkPublisher, StoredFile,
};
use post_archiver::models::{Document, MediaItem, MediaResult, MediaType, PostData};
use post_archiver::orchestrator::OrchestratorSettings;
use post_archiver::platform::Platform;
use post_archiver::ArchiveError;

/// An X post with two images, as the backend would return it.
pub fn x_post_with_images() -> PostData {
    let mut post = PostData::new(Platform::X, "123", "https://x.com/user/status/123");
    post.author.name = "Some User".into();
    post.author.handle = "user".into();
    post.content.text = "two pictures".into();
    post.media = vec![
        MediaItem::new(MediaType::Image, "https://pbs.twimg.com/media/a.jpg"),
        MediaItem::new(MediaType::Image, "https://pbs.twimg.com/media/b.jpg"),
    ];
    post
}

/// Settings with short delays and no jitter.
pub fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        backoff: BackoffConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            jitter_range: Duration::ZERO,
            strategy: BackoffStrategy::Exponential,
        },
        circuit_breaker: CircuitBreakerConfig::default(),
        cache_ttl: Duration::from_secs(60 * 60),
        error_log_capacity: 100,
    }
}

/// Returns a fixed post, after queued failures and an optional delay.
pub struct FakeFetch {
    post: PostData,
    delay: Duration,
    failures: Mutex<VecDeque<ArchiveError>>,
    calls: AtomicUsize,
}

impl FakeFetch {
    pub fn new(post: PostData) -> Self {
        Self {
            post,
            delay: Duration::ZERO,
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fails the next calls with these errors, in order.
    pub fn failing_with(self, errors: impl IntoIterator<Item = ArchiveError>) -> Self {
        self.failures.lock().unwrap().extend(errors);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchClient for FakeFetch {
    async fn archive_post(
        &self,
        _url: &str,
        _options: &FetchOptions,
        on_progress: Option<ProgressFn>,
    ) -> anyhow::Result<PostData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error.into());
        }
        if let Some(report) = on_progress {
            report(100, "fetched");
        }
        Ok(self.post.clone())
    }
}

/// Pretends to download media; tracks which files currently exist.
#[derive(Default)]
pub struct MemoryMedia {
    live: Mutex<Vec<PathBuf>>,
    deleted: Mutex<Vec<PathBuf>>,
    delay: Duration,
    fail_urls: Vec<String>,
    fatal: bool,
}

impl MemoryMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Downloads of `url` fail with a media error (skippable).
    pub fn failing_on(mut self, url: &str) -> Self {
        self.fail_urls.push(url.to_string());
        self
    }

    /// Failures become vault errors, which abort the run.
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn live(&self) -> Vec<PathBuf> {
        self.live.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<PathBuf> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStore for MemoryMedia {
    async fn download_media(
        &self,
        items: &[MediaItem],
        platform: Platform,
        post_id: &str,
        author_handle: &str,
        _on_progress: Option<ProgressFn>,
    ) -> anyhow::Result<Vec<MediaResult>> {
        let mut out = Vec::new();
        for item in items {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_urls.contains(&item.url) {
                let error = if self.fatal {
                    ArchiveError::vault("media directory is read-only")
                } else {
                    ArchiveError::media(format!("could not download {}", item.url))
                };
                return Err(error.into());
            }
            let mut live = self.live.lock().unwrap();
            let path = PathBuf::from(format!(
                "media/{}/{post_id}/{author_handle}-{}.{}",
                platform.as_str(),
                live.len() + 1,
                item.media_type.default_extension()
            ));
            live.push(path.clone());
            out.push(MediaResult {
                original_url: item.url.clone(),
                local_path: path,
                media_type: item.media_type,
                size_bytes: 1024,
            });
        }
        Ok(out)
    }

    async fn delete_media(&self, path: &Path) -> anyhow::Result<()> {
        self.live.lock().unwrap().retain(|p| p != path);
        self.deleted.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// Keeps saved notes in a map keyed by path.
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<PathBuf, String>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> HashMap<PathBuf, String> {
        self.files.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Simulates the user deleting a note outside the archiver.
    pub fn remove(&self, path: &Path) {
        self.files.lock().unwrap().remove(path);
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn save_post(&self, post: &PostData, doc: &Document) -> anyhow::Result<PathBuf> {
        let n = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        let path = PathBuf::from(format!("{}/{}-{n}.md", post.platform.as_str(), post.id));
        self.files
            .lock()
            .unwrap()
            .insert(path.clone(), doc.content.clone());
        Ok(path)
    }

    async fn get_file_by_path(&self, path: &Path) -> anyhow::Result<Option<StoredFile>> {
        Ok(self.files.lock().unwrap().get(path).map(|content| StoredFile {
            path: path.to_path_buf(),
            size_bytes: content.len() as u64,
            modified: None,
        }))
    }

    async fn delete_file(&self, path: &Path) -> anyhow::Result<()> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }
}

/// A converter whose `convert` always fails.
pub struct BrokenConverter;

#[async_trait]
impl DocumentConverter for BrokenConverter {
    async fn convert(
        &self,
        _post: &PostData,
        _template: Option<&str>,
        _media: &[MediaResult],
    ) -> anyhow::Result<Document> {
        anyhow::bail!("renderer exploded")
    }

    fn update_full_document(&self, _doc: &mut Document) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A publisher that either returns a fixed link or fails.
pub struct FakePublisher {
    pub fail: bool,
}

#[async_trait]
impl ShareLinkPublisher for FakePublisher {
    async fn publish(&self, path: &Path, _post: &PostData) -> anyhow::Result<String> {
        if self.fail {
            anyhow::bail!("publisher rejected {}", path.display())
        }
        Ok(format!("https://share.example/{}", path.display()))
    }
}

/// Handles to the fakes behind a `Collaborators` set.
pub struct Harness {
    pub fetch: Arc<FakeFetch>,
    pub media: Arc<MemoryMedia>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new(fetch: FakeFetch, media: MemoryMedia) -> Self {
        Self {
            fetch: Arc::new(fetch),
            media: Arc::new(media),
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        self.collaborators_with(Arc::new(MarkdownConverter::new()), None)
    }

    pub fn collaborators_with(
        &self,
        converter: Arc<dyn DocumentConverter>,
        share: Option<Arc<dyn ShareLinkPublisher>>,
    ) -> Collaborators {
        Collaborators {
            fetch: self.fetch.clone(),
            media: self.media.clone(),
            converter,
            store: self.store.clone(),
            share,
        }
    }
}
