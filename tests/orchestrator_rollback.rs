//! Rollback of partially persisted archives.

mod helpers;

use std::sync::Arc;

use helpers::{
    fast_settings, x_post_with_images, BrokenConverter, FakeFetch, FakePublisher, Harness,
    MemoryMedia,
};
use post_archiver::collaborators::MarkdownConverter;
use post_archiver::orchestrator::ArchiveEvent;
use post_archiver::{ArchiveOptions, ArchiveOrchestrator, ErrorCode};

#[tokio::test(start_paused = true)]
async fn test_conversion_failure_removes_downloaded_media() {
    let h = Harness::new(FakeFetch::new(x_post_with_images()), MemoryMedia::new());
    let collaborators = h.collaborators_with(Arc::new(BrokenConverter), None);
    let orchestrator = ArchiveOrchestrator::new(collaborators, fast_settings());
    let options = ArchiveOptions {
        download_media: true,
        ..Default::default()
    };

    let result = orchestrator
        .orchestrate("https://x.com/user/status/123", &options, None)
        .await;

    assert!(!result.success);
    assert_eq!(result.error_code, Some(ErrorCode::ConversionError));
    assert_eq!(result.credits_used, 0);
    assert!(h.media.live().is_empty());
    assert_eq!(h.media.deleted().len(), 2);
    assert!(h.store.files().is_empty());
    assert_eq!(orchestrator.cache_len().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_share_failure_removes_saved_note_and_media() {
    let h = Harness::new(FakeFetch::new(x_post_with_images()), MemoryMedia::new());
    let collaborators = h.collaborators_with(
        Arc::new(MarkdownConverter::new()),
        Some(Arc::new(FakePublisher { fail: true })),
    );
    let orchestrator = ArchiveOrchestrator::new(collaborators, fast_settings());
    let mut events = orchestrator.subscribe();
    let options = ArchiveOptions {
        download_media: true,
        create_share_link: true,
        ..Default::default()
    };

    let result = orchestrator
        .orchestrate("https://x.com/user/status/123", &options, None)
        .await;

    assert!(!result.success);
    assert_eq!(h.store.saves(), 1);
    assert!(h.store.files().is_empty());
    assert!(h.media.live().is_empty());

    let mut saw_error = false;
    while let Ok(event) = events.try_recv() {
        if let ArchiveEvent::Error { url, .. } = event {
            assert_eq!(url, "https://x.com/user/status/123");
            saw_error = true;
        }
    }
    assert!(saw_error);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_media_error_rolls_back_earlier_downloads() {
    let media = MemoryMedia::new()
        .failing_on("https://pbs.twimg.com/media/b.jpg")
        .fatal();
    let h = Harness::new(FakeFetch::new(x_post_with_images()), media);
    let orchestrator = ArchiveOrchestrator::new(h.collaborators(), fast_settings());
    let options = ArchiveOptions {
        download_media: true,
        ..Default::default()
    };

    let result = orchestrator
        .orchestrate("https://x.com/user/status/123", &options, None)
        .await;

    assert_eq!(result.error_code, Some(ErrorCode::VaultError));
    assert!(h.media.live().is_empty());
    assert_eq!(h.media.deleted().len(), 1);
    assert!(h.store.files().is_empty());
}
