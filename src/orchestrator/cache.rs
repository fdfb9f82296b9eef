//! In-memory caches shared by concurrent runs.
//!
//! Both maps are last-write-wins with no versioning.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::models::PostData;
use crate::platform::Platform;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub post_data: PostData,
    pub file_path: PathBuf,
    pub share_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    stored_at: Instant,
}

impl CacheEntry {
    pub fn new(post_data: PostData, file_path: PathBuf, share_url: Option<String>) -> Self {
        Self {
            post_data,
            file_path,
            share_url,
            timestamp: Utc::now(),
            stored_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}

/// Successful archives keyed by canonical URL. Expired entries are treated as
/// absent and evicted when looked up.
pub struct ArchiveCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ArchiveCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(self.ttl) => return Some(entry.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut entries = self.entries.write().await;
        // Another task may have refreshed the slot in between.
        if entries.get(key).is_some_and(|e| e.is_expired(self.ttl)) {
            entries.remove(key);
            log::debug!("Evicted expired cache entry for {key}");
        }
        entries
            .get(key)
            .filter(|e| !e.is_expired(self.ttl))
            .cloned()
    }

    pub async fn insert(&self, key: impl Into<String>, entry: CacheEntry) {
        self.entries.write().await.insert(key.into(), entry);
    }

    pub async fn remove(&self, key: &str) -> Option<CacheEntry> {
        self.entries.write().await.remove(key)
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Entries currently stored, including any not yet evicted after expiry.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Resolved avatar URLs keyed by `platform:handle`.
#[derive(Default)]
pub struct AvatarCache {
    entries: RwLock<HashMap<String, String>>,
}

impl AvatarCache {
    fn key(platform: Platform, handle: &str) -> String {
        format!("{}:{}", platform.as_str(), handle.trim_start_matches('@').to_lowercase())
    }

    pub async fn get(&self, platform: Platform, handle: &str) -> Option<String> {
        self.entries
            .read()
            .await
            .get(&Self::key(platform, handle))
            .cloned()
    }

    pub async fn insert(&self, platform: Platform, handle: &str, avatar: impl Into<String>) {
        self.entries
            .write()
            .await
            .insert(Self::key(platform, handle), avatar.into());
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> CacheEntry {
        CacheEntry::new(
            PostData::new(Platform::X, "1", "https://x.com/a/status/1"),
            PathBuf::from("x/note.md"),
            None,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = ArchiveCache::new(Duration::from_secs(3600));
        cache.insert("k", entry()).await;
        assert!(cache.get("k").await.is_some());

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert!(cache.get("k").await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = ArchiveCache::new(Duration::from_secs(60));
        cache.insert("k", entry()).await;
        let mut newer = entry();
        newer.file_path = PathBuf::from("x/newer.md");
        cache.insert("k", newer).await;
        assert_eq!(cache.get("k").await.unwrap().file_path, PathBuf::from("x/newer.md"));
        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_avatar_keys_ignore_at_and_case() {
        let avatars = AvatarCache::default();
        avatars.insert(Platform::X, "@User", "https://img/u.png").await;
        assert_eq!(
            avatars.get(Platform::X, "user").await.as_deref(),
            Some("https://img/u.png")
        );
        assert!(avatars.get(Platform::Threads, "user").await.is_none());
    }
}
