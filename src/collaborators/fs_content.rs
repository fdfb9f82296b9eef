//! Notes persisted as markdown files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{ContentStore, StoredFile};
use crate::error_handling::ArchiveError;
use crate::models::{Document, PostData};
use crate::utils::sanitize::sanitize_path_segment;

const MAX_COLLISION_SUFFIX: u32 = 1000;

/// Writes notes to `<root>/<platform>/<date>-<author>-<post_id>.md`.
///
/// An existing file is never overwritten; a `-2`, `-3`, ... suffix is added.
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn base_name(post: &PostData) -> String {
        let date = post.metadata.timestamp.unwrap_or_else(Utc::now);
        let author = if post.author.handle.is_empty() {
            &post.author.name
        } else {
            &post.author.handle
        };
        format!(
            "{}-{}-{}",
            date.format("%Y-%m-%d"),
            sanitize_path_segment(author),
            sanitize_path_segment(&post.id)
        )
    }
}

fn vault_error(action: &str, path: &Path, e: std::io::Error) -> anyhow::Error {
    ArchiveError::vault(format!("Failed to {action} {}: {e}", path.display()))
        .with_cause(e)
        .into()
}

/// Writes and flushes a freshly created note. The file is removed if either
/// step fails.
async fn write_note<W>(writer: &mut W, path: &Path, content: &[u8]) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = match writer.write_all(content).await {
        Ok(()) => writer.flush().await.map_err(|e| ("flush", e)),
        Err(e) => Err(("write", e)),
    };
    if let Err((action, e)) = written {
        if let Err(remove) = tokio::fs::remove_file(path).await {
            log::warn!("Could not remove partial note {}: {remove}", path.display());
        }
        return Err(vault_error(action, path, e));
    }
    Ok(())
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn save_post(&self, post: &PostData, doc: &Document) -> anyhow::Result<PathBuf> {
        let dir = self.root.join(post.platform.as_str());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| vault_error("create", &dir, e))?;

        let base = Self::base_name(post);
        for n in 1..=MAX_COLLISION_SUFFIX {
            let name = if n == 1 {
                format!("{base}.md")
            } else {
                format!("{base}-{n}.md")
            };
            let path = dir.join(name);
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(vault_error("create", &path, e)),
            };
            write_note(&mut file, &path, doc.content.as_bytes()).await?;
            log::debug!("Saved note {}", path.display());
            return Ok(path);
        }
        Err(ArchiveError::vault(format!("Too many notes named {base} in {}", dir.display())).into())
    }

    async fn get_file_by_path(&self, path: &Path) -> anyhow::Result<Option<StoredFile>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(Some(StoredFile {
                path: path.to_path_buf(),
                size_bytes: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(vault_error("stat", path, e)),
        }
    }

    async fn delete_file(&self, path: &Path) -> anyhow::Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(vault_error("delete", path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn post() -> PostData {
        let mut post = PostData::new(Platform::Reddit, "abc123", "https://reddit.com/r/rust/comments/abc123");
        post.author.handle = "Ferris".into();
        post.metadata.timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single();
        post
    }

    fn doc() -> Document {
        Document {
            content: "---\n---\n\nbody\n".into(),
            ..Document::default()
        }
    }

    #[tokio::test]
    async fn test_save_uses_date_author_and_id() {
        let dir = TempDir::new().unwrap();
        let store = FsContentStore::new(dir.path());
        let path = store.save_post(&post(), &doc()).await.unwrap();
        assert_eq!(path, dir.path().join("reddit/2024-05-01-ferris-abc123.md"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "---\n---\n\nbody\n");
    }

    #[tokio::test]
    async fn test_collisions_get_suffixes() {
        let dir = TempDir::new().unwrap();
        let store = FsContentStore::new(dir.path());
        let first = store.save_post(&post(), &doc()).await.unwrap();
        let second = store.save_post(&post(), &doc()).await.unwrap();
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("abc123-2.md"));
    }

    /// Accepts every write, then fails to flush.
    struct FlushFails;

    impl AsyncWrite for FlushFails {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::Error::other("disk full")))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_flush_failure_removes_partial_note() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.md");
        std::fs::write(&path, "half a note").unwrap();

        let err = write_note(&mut FlushFails, &path, b"body").await.unwrap_err();

        let archive = err.downcast_ref::<ArchiveError>().unwrap();
        assert_eq!(archive.code(), crate::error_handling::ErrorCode::VaultError);
        assert!(archive.message().contains("flush"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = FsContentStore::new(dir.path());
        let path = store.save_post(&post(), &doc()).await.unwrap();

        let stored = store.get_file_by_path(&path).await.unwrap().unwrap();
        assert_eq!(stored.size_bytes, doc().content.len() as u64);

        store.delete_file(&path).await.unwrap();
        assert!(store.get_file_by_path(&path).await.unwrap().is_none());
        store.delete_file(&path).await.unwrap();
    }
}
