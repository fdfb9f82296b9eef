//! Artifacts created during one run, and their rollback.

use std::path::{Path, PathBuf};

use crate::collaborators::{ContentStore, MediaStore};

/// Everything persisted so far in one orchestration run.
#[derive(Debug, Default)]
pub struct TransactionState {
    created_files: Vec<PathBuf>,
    created_media_files: Vec<PathBuf>,
}

/// What a rollback managed to remove.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub removed: usize,
    pub failed: usize,
}

impl TransactionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_file(&mut self, path: impl Into<PathBuf>) {
        self.created_files.push(path.into());
    }

    pub fn record_media(&mut self, path: impl Into<PathBuf>) {
        self.created_media_files.push(path.into());
    }

    pub fn created_files(&self) -> &[PathBuf] {
        &self.created_files
    }

    pub fn created_media_files(&self) -> &[PathBuf] {
        &self.created_media_files
    }

    pub fn is_empty(&self) -> bool {
        self.created_files.is_empty() && self.created_media_files.is_empty()
    }

    /// Deletes every recorded artifact, media first, then notes. Never fails;
    /// deletion errors are logged and counted.
    pub async fn rollback(self, media: &dyn MediaStore, store: &dyn ContentStore) -> RollbackReport {
        let mut report = RollbackReport::default();
        for path in &self.created_media_files {
            tally(&mut report, path, media.delete_media(path).await);
        }
        for path in &self.created_files {
            tally(&mut report, path, store.delete_file(path).await);
        }
        if report.removed + report.failed > 0 {
            log::info!(
                "Rolled back {} artifact(s), {} could not be removed",
                report.removed,
                report.failed
            );
        }
        report
    }
}

fn tally(report: &mut RollbackReport, path: &Path, outcome: anyhow::Result<()>) {
    match outcome {
        Ok(()) => report.removed += 1,
        Err(e) => {
            log::warn!("Rollback could not remove {}: {e:#}", path.display());
            report.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{FsContentStore, FsMediaStore};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_rollback_removes_everything_recorded() {
        let dir = TempDir::new().unwrap();
        let media_path = dir.path().join("media/x/1/u-1.jpg");
        let note_path = dir.path().join("x/note.md");
        std::fs::create_dir_all(media_path.parent().unwrap()).unwrap();
        std::fs::create_dir_all(note_path.parent().unwrap()).unwrap();
        std::fs::write(&media_path, b"img").unwrap();
        std::fs::write(&note_path, b"note").unwrap();

        let mut tx = TransactionState::new();
        tx.record_media(&media_path);
        tx.record_file(&note_path);
        assert!(!tx.is_empty());

        let media = FsMediaStore::new(reqwest::Client::new(), dir.path());
        let store = FsContentStore::new(dir.path());
        let report = tx.rollback(&media, &store).await;
        assert_eq!(report, RollbackReport { removed: 2, failed: 0 });
        assert!(!media_path.exists());
        assert!(!note_path.exists());
    }

    #[tokio::test]
    async fn test_empty_rollback_is_noop() {
        let dir = TempDir::new().unwrap();
        let media = FsMediaStore::new(reqwest::Client::new(), dir.path());
        let store = FsContentStore::new(dir.path());
        let report = TransactionState::new().rollback(&media, &store).await;
        assert_eq!(report, RollbackReport::default());
    }
}
