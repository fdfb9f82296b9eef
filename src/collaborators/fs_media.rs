//! Media downloads into the local vault.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{MediaStore, ProgressFn};
use crate::error_handling::{categorize_reqwest_error, ArchiveError};
use crate::models::{MediaItem, MediaResult, MediaType};
use crate::platform::Platform;
use crate::utils::sanitize::sanitize_path_segment;

/// Stores media under `<root>/media/<platform>/<post_id>/`.
pub struct FsMediaStore {
    client: reqwest::Client,
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(client: reqwest::Client, root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            root: root.into(),
        }
    }

    fn post_dir(&self, platform: Platform, post_id: &str) -> PathBuf {
        self.root
            .join("media")
            .join(platform.as_str())
            .join(sanitize_path_segment(post_id))
    }

    async fn download_one(&self, item: &MediaItem, target: &Path) -> Result<u64, ArchiveError> {
        let response = self
            .client
            .get(&item.url)
            .send()
            .await
            .map_err(|e| categorize_reqwest_error(e, None))?
            .error_for_status()
            .map_err(|e| {
                ArchiveError::media(format!("Failed to download {}: {e}", item.url)).with_cause(e)
            })?;
        let bytes = response.bytes().await.map_err(|e| {
            ArchiveError::media(format!("Failed to read {}: {e}", item.url)).with_cause(e)
        })?;
        tokio::fs::write(target, &bytes).await.map_err(|e| {
            ArchiveError::vault(format!("Failed to write {}: {e}", target.display())).with_cause(e)
        })?;
        Ok(bytes.len() as u64)
    }
}

/// Extension from the URL's last path segment, falling back to the media type.
fn extension_for(item: &MediaItem) -> String {
    url::Url::parse(&item.url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .and_then(|segment| {
            segment
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase())
        })
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| item.media_type.default_extension().to_string())
}

/// First `<handle>-<n>.<ext>` at or after `start` that doesn't exist yet, so
/// per-item calls for the same post never overwrite each other.
async fn free_target(dir: &Path, handle: &str, start: usize, ext: &str) -> PathBuf {
    let mut n = start;
    loop {
        let candidate = dir.join(format!("{handle}-{n}.{ext}"));
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn download_media(
        &self,
        items: &[MediaItem],
        platform: Platform,
        post_id: &str,
        author_handle: &str,
        on_progress: Option<ProgressFn>,
    ) -> anyhow::Result<Vec<MediaResult>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let dir = self.post_dir(platform, post_id);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            ArchiveError::vault(format!("Failed to create {}: {e}", dir.display())).with_cause(e)
        })?;

        let handle = sanitize_path_segment(author_handle);
        let mut results: Vec<MediaResult> = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let target = free_target(&dir, &handle, index + 1, &extension_for(item)).await;
            match self.download_one(item, &target).await {
                Ok(size_bytes) => results.push(MediaResult {
                    original_url: item.url.clone(),
                    local_path: target,
                    media_type: item.media_type,
                    size_bytes,
                }),
                Err(e) => {
                    // Leave nothing behind from a failed batch.
                    for done in &results {
                        let _ = tokio::fs::remove_file(&done.local_path).await;
                    }
                    let _ = tokio::fs::remove_file(&target).await;
                    return Err(e.into());
                }
            }
            if let Some(report) = &on_progress {
                let percent = ((index + 1) * 100 / items.len()) as u8;
                report(percent, &format!("Downloaded media {}/{}", index + 1, items.len()));
            }
        }
        Ok(results)
    }

    async fn delete_media(&self, path: &Path) -> anyhow::Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ArchiveError::vault(format!(
                    "Failed to delete {}: {e}",
                    path.display()
                ))
                .with_cause(e)
                .into())
            }
        }
        // Drop the post directory once it is empty; failure just means it isn't.
        let media_root = self.root.join("media");
        if let Some(parent) = path.parent().filter(|p| p.starts_with(&media_root) && *p != media_root) {
            let _ = tokio::fs::remove_dir(parent).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use tempfile::TempDir;

    #[test]
    fn test_extension_from_url_or_type() {
        let item = MediaItem::new(MediaType::Image, "https://cdn.example.com/a/photo.PNG?x=1");
        assert_eq!(extension_for(&item), "png");
        let bare = MediaItem::new(MediaType::Video, "https://cdn.example.com/v/12345");
        assert_eq!(extension_for(&bare), "mp4");
    }

    #[tokio::test]
    async fn test_downloads_into_post_directory() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/a.jpg"))
                .respond_with(status_code(200).body("aaaa")),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/b.png"))
                .respond_with(status_code(200).body("bb")),
        );
        let dir = TempDir::new().unwrap();
        let store = FsMediaStore::new(reqwest::Client::new(), dir.path());
        let items = vec![
            MediaItem::new(MediaType::Image, server.url_str("/a.jpg")),
            MediaItem::new(MediaType::Image, server.url_str("/b.png")),
        ];

        let results = store
            .download_media(&items, Platform::X, "123", "@User", None)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].local_path,
            dir.path().join("media/x/123/user-1.jpg")
        );
        assert_eq!(results[1].size_bytes, 2);
        assert!(results[1].local_path.exists());

        for r in &results {
            store.delete_media(&r.local_path).await.unwrap();
        }
        assert!(!dir.path().join("media/x/123").exists());
    }

    #[tokio::test]
    async fn test_failed_item_removes_earlier_downloads() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/ok.jpg"))
                .respond_with(status_code(200).body("ok")),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/missing.jpg"))
                .respond_with(status_code(404)),
        );
        let dir = TempDir::new().unwrap();
        let store = FsMediaStore::new(reqwest::Client::new(), dir.path());
        let items = vec![
            MediaItem::new(MediaType::Image, server.url_str("/ok.jpg")),
            MediaItem::new(MediaType::Image, server.url_str("/missing.jpg")),
        ];

        let err = store
            .download_media(&items, Platform::X, "9", "someone", None)
            .await
            .unwrap_err();
        let err = crate::error_handling::normalize(err, None);
        assert_eq!(err.code(), crate::error_handling::ErrorCode::MediaError);
        assert!(!dir.path().join("media/x/9/someone-1.jpg").exists());
    }

    #[tokio::test]
    async fn test_single_item_calls_do_not_overwrite() {
        let server = Server::run();
        server.expect(
            Expectation::matching(any())
                .times(2)
                .respond_with(status_code(200).body("x")),
        );
        let dir = TempDir::new().unwrap();
        let store = FsMediaStore::new(reqwest::Client::new(), dir.path());
        let a = MediaItem::new(MediaType::Image, server.url_str("/a.jpg"));
        let b = MediaItem::new(MediaType::Image, server.url_str("/b.jpg"));
        let first = store
            .download_media(&[a], Platform::X, "1", "u", None)
            .await
            .unwrap();
        let second = store
            .download_media(&[b], Platform::X, "1", "u", None)
            .await
            .unwrap();
        assert_ne!(first[0].local_path, second[0].local_path);
        assert!(second[0].local_path.ends_with("u-2.jpg"));
    }

    #[tokio::test]
    async fn test_deleting_missing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = FsMediaStore::new(reqwest::Client::new(), dir.path());
        store
            .delete_media(&dir.path().join("nope.jpg"))
            .await
            .unwrap();
    }
}
