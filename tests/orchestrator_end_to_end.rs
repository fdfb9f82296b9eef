//! End-to-end archive runs against in-memory collaborators.

mod helpers;

use std::sync::Arc;

use helpers::{fast_settings, x_post_with_images, FakeFetch, FakePublisher, Harness, MemoryMedia};
use post_archiver::orchestrator::{ArchiveEvent, ArchiveStage};
use post_archiver::{ArchiveError, ArchiveOptions, ArchiveOrchestrator, ErrorCode};

fn with_media() -> ArchiveOptions {
    ArchiveOptions {
        download_media: true,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_archives_x_post_with_two_local_images() {
    let h = Harness::new(FakeFetch::new(x_post_with_images()), MemoryMedia::new());
    let orchestrator = ArchiveOrchestrator::new(h.collaborators(), fast_settings());

    let result = orchestrator
        .orchestrate("https://x.com/user/status/123?s=20", &with_media(), None)
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.credits_used, 1);
    assert!(!result.from_cache);
    assert_eq!(h.fetch.calls(), 1);
    assert_eq!(h.media.live().len(), 2);

    let path = result.file_path.expect("saved note path");
    let files = h.store.files();
    let note = files.get(&path).expect("note exists in the store");
    assert!(note.contains("![](media/x/123/user-1.jpg)"));
    assert!(note.contains("![](media/x/123/user-2.jpg)"));
    assert!(!note.contains("pbs.twimg.com"));
    assert!(note.contains("processing_time_ms: "));

    let stats = orchestrator.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_credits_follow_requested_features() {
    let h = Harness::new(FakeFetch::new(x_post_with_images()), MemoryMedia::new());
    let orchestrator = ArchiveOrchestrator::new(h.collaborators(), fast_settings());
    let options = ArchiveOptions {
        enable_ai: true,
        deep_research: true,
        ..Default::default()
    };

    let result = orchestrator
        .orchestrate("https://x.com/user/status/123", &options, None)
        .await;
    assert!(result.success);
    assert_eq!(result.credits_used, 7);
}

#[tokio::test(start_paused = true)]
async fn test_transient_fetch_failures_are_retried() {
    let fetch = FakeFetch::new(x_post_with_images()).failing_with([
        ArchiveError::network("connection reset"),
        ArchiveError::timeout("backend timed out"),
    ]);
    let h = Harness::new(fetch, MemoryMedia::new());
    let orchestrator = ArchiveOrchestrator::new(h.collaborators(), fast_settings());

    let result = orchestrator
        .orchestrate("https://x.com/user/status/123", &ArchiveOptions::default(), None)
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(h.fetch.calls(), 3);
    assert_eq!(orchestrator.error_handler().stats().total, 2);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_fetch_failure_is_not_retried() {
    let fetch = FakeFetch::new(x_post_with_images())
        .failing_with([ArchiveError::not_found("post deleted")]);
    let h = Harness::new(fetch, MemoryMedia::new());
    let orchestrator = ArchiveOrchestrator::new(h.collaborators(), fast_settings());

    let result = orchestrator
        .orchestrate("https://x.com/user/status/123", &ArchiveOptions::default(), None)
        .await;

    assert!(!result.success);
    assert_eq!(result.error_code, Some(ErrorCode::NotFound));
    assert_eq!(result.credits_used, 0);
    assert_eq!(h.fetch.calls(), 1);
    assert!(h.store.files().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_and_invalid_urls_fail_before_fetching() {
    let h = Harness::new(FakeFetch::new(x_post_with_images()), MemoryMedia::new());
    let orchestrator = ArchiveOrchestrator::new(h.collaborators(), fast_settings());
    let options = ArchiveOptions::default();

    let unsupported = orchestrator
        .orchestrate("https://example.com/some/page", &options, None)
        .await;
    assert_eq!(unsupported.error_code, Some(ErrorCode::UnsupportedPlatform));

    let invalid = orchestrator.orchestrate("not a url", &options, None).await;
    assert_eq!(invalid.error_code, Some(ErrorCode::InvalidUrl));

    assert_eq!(h.fetch.calls(), 0);
    assert_eq!(orchestrator.stats().failed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_media_is_skipped_and_keeps_remote_url() {
    let media = MemoryMedia::new().failing_on("https://pbs.twimg.com/media/b.jpg");
    let h = Harness::new(FakeFetch::new(x_post_with_images()), media);
    let orchestrator = ArchiveOrchestrator::new(h.collaborators(), fast_settings());

    let result = orchestrator
        .orchestrate("https://x.com/user/status/123", &with_media(), None)
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(h.media.live().len(), 1);
    let files = h.store.files();
    let note = &files[&result.file_path.unwrap()];
    assert!(note.contains("![](media/x/123/user-1.jpg)"));
    assert!(note.contains("![](https://pbs.twimg.com/media/b.jpg)"));
}

#[tokio::test(start_paused = true)]
async fn test_share_link_is_returned() {
    let h = Harness::new(FakeFetch::new(x_post_with_images()), MemoryMedia::new());
    let collaborators = h.collaborators_with(
        Arc::new(post_archiver::collaborators::MarkdownConverter::new()),
        Some(Arc::new(FakePublisher { fail: false })),
    );
    let orchestrator = ArchiveOrchestrator::new(collaborators, fast_settings());
    let options = ArchiveOptions {
        create_share_link: true,
        ..Default::default()
    };

    let result = orchestrator
        .orchestrate("https://x.com/user/status/123", &options, None)
        .await;
    assert!(result.success);
    assert_eq!(
        result.share_url.as_deref(),
        Some("https://share.example/x/123-1.md")
    );
}

#[tokio::test(start_paused = true)]
async fn test_progress_events_run_through_stages_in_order() {
    let h = Harness::new(FakeFetch::new(x_post_with_images()), MemoryMedia::new());
    let orchestrator = ArchiveOrchestrator::new(h.collaborators(), fast_settings());
    let mut events = orchestrator.subscribe();

    let result = orchestrator
        .orchestrate("https://x.com/user/status/123", &with_media(), None)
        .await;
    assert!(result.success);

    let mut percents = Vec::new();
    let mut completed = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            ArchiveEvent::Progress { progress, .. } => percents.push(progress.percent),
            ArchiveEvent::StageComplete { stage, .. } => completed.push(stage),
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.last(), Some(&100));
    assert_eq!(
        completed,
        vec![
            ArchiveStage::Fetching,
            ArchiveStage::Downloading,
            ArchiveStage::Processing,
            ArchiveStage::Saving,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_open_breaker_rejections_are_counted_apart_from_failures() {
    let fetch = FakeFetch::new(x_post_with_images())
        .failing_with((0..10).map(|_| ArchiveError::server(502, "bad gateway")));
    let h = Harness::new(fetch, MemoryMedia::new());
    let mut settings = fast_settings();
    settings.backoff.max_attempts = 0;
    let orchestrator = ArchiveOrchestrator::new(h.collaborators(), settings);
    let options = ArchiveOptions::default();

    for _ in 0..5 {
        let result = orchestrator
            .orchestrate("https://x.com/user/status/123", &options, None)
            .await;
        assert_eq!(result.error_code, Some(ErrorCode::ServerError));
    }
    let rejected = orchestrator
        .orchestrate("https://x.com/user/status/123", &options, None)
        .await;

    assert_eq!(rejected.error_code, Some(ErrorCode::CircuitOpen));
    assert_eq!(h.fetch.calls(), 5);
    let stats = orchestrator.stats();
    assert_eq!(stats.failed, 5);
    assert_eq!(stats.breaker_rejections, 1);

    let metrics = orchestrator.circuit_metrics();
    let (name, backend) = &metrics[0];
    assert_eq!(name, "scraping-backend");
    assert_eq!(backend.rejected_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_post_data_enriches_without_persisting() {
    let mut post = x_post_with_images();
    post.content.text = "read https://example.com/article.".into();
    post.raw = Some(serde_json::json!({
        "user": {"followers_count": 42, "profile_image_url": "https://img.example/u.png"}
    }));
    let h = Harness::new(FakeFetch::new(post), MemoryMedia::new());
    let orchestrator = ArchiveOrchestrator::new(h.collaborators(), fast_settings());

    let fetched = orchestrator
        .fetch_post_data("https://x.com/user/status/123", &with_media(), None)
        .await
        .unwrap();

    assert_eq!(fetched.links, vec!["https://example.com/article"]);
    assert_eq!(fetched.author.followers, Some(42));
    assert_eq!(fetched.author.avatar.as_deref(), Some("https://img.example/u.png"));
    assert_eq!(fetched.media[0].url, "https://pbs.twimg.com/media/a.jpg");
    assert!(h.media.live().is_empty());
    assert!(h.store.files().is_empty());
    assert_eq!(orchestrator.cache_len().await, 0);
}
