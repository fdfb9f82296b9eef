//! The archive saga: fetch, download, convert, save, with rollback.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::cache::{ArchiveCache, AvatarCache, CacheEntry};
use super::credits::credits_for;
use super::enrich::{enrich_author, extract_links, merge_links};
use super::events::{ArchiveEvent, EventBus};
use super::media::{collect_media, set_local_path};
use super::transaction::TransactionState;
use super::types::{ArchiveOptions, ArchiveResult, ArchiveStage, OrchestratorSettings};
use crate::backoff::{BackoffEngine, RetryCallback};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerMetrics};
use crate::collaborators::{Collaborators, ProgressFn};
use crate::error_handling::{
    normalize, ArchiveError, ErrorCode, ErrorContext, ErrorHandler, RecoveryRegistry,
};
use crate::models::{MediaResult, PostData};
use crate::platform::{
    canonicalize_url, detect_platform, extract_post_id, is_shortened_url, Platform,
    ShortUrlExpander,
};
use crate::utils::duration_to_ms;

const FETCH_BREAKER: &str = "scraping-backend";
const MEDIA_BREAKER: &str = "media-download";

#[derive(Debug, Default)]
struct OrchestratorStats {
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    cache_hits: AtomicU64,
    breaker_rejections: AtomicU64,
}

/// Run outcomes. Breaker rejections are counted apart from failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStatsSnapshot {
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub cache_hits: u64,
    pub breaker_rejections: u64,
}

/// A failed run step. `handled` marks errors that already went through the
/// error handler, so they aren't logged and counted twice.
struct RunError {
    error: ArchiveError,
    handled: bool,
}

impl From<ArchiveError> for RunError {
    fn from(error: ArchiveError) -> Self {
        Self {
            error,
            handled: false,
        }
    }
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<(), ArchiveError> {
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        Err(ArchiveError::cancelled())
    } else {
        Ok(())
    }
}

/// Normalises a collaborator failure, giving unrecognised failures the
/// stage's own code instead of `UNKNOWN_ERROR`.
fn collaborator_error(e: anyhow::Error, context: ErrorContext, fallback: ErrorCode) -> ArchiveError {
    let error = normalize(e, Some(context.clone()));
    if error.code() == ErrorCode::UnknownError {
        ArchiveError::new(fallback, error.message().to_string()).with_context(context)
    } else {
        error
    }
}

/// Dedup key by post id, for URL forms the canonical string can't unify
/// (an X status link without the author's handle, for one).
fn post_key(platform: Platform, id: &str) -> Option<String> {
    (!id.is_empty()).then(|| format!("{}:{id}", platform.as_str()))
}

/// Media failures that drop the item instead of failing the run.
fn skippable_media_error(error: &ArchiveError) -> bool {
    matches!(
        error.code(),
        ErrorCode::MediaError
            | ErrorCode::MediaTooLarge
            | ErrorCode::NotFound
            | ErrorCode::ContentUnavailable
            | ErrorCode::PermissionDenied
            | ErrorCode::NetworkError
            | ErrorCode::TimeoutError
            | ErrorCode::CircuitOpen
    )
}

/// Coordinates one archive run end to end.
///
/// Independent runs for different URLs may proceed concurrently on the same
/// instance; they share the dedup cache, the avatar cache, the breakers and
/// the error handler.
pub struct ArchiveOrchestrator {
    collaborators: Collaborators,
    backoff: BackoffEngine,
    fetch_breaker: CircuitBreaker,
    media_breaker: CircuitBreaker,
    errors: Arc<ErrorHandler>,
    expander: Option<ShortUrlExpander>,
    cache: ArchiveCache,
    avatars: AvatarCache,
    events: EventBus,
    stats: OrchestratorStats,
}

impl ArchiveOrchestrator {
    pub fn new(collaborators: Collaborators, settings: OrchestratorSettings) -> Self {
        Self {
            collaborators,
            backoff: BackoffEngine::new(settings.backoff),
            fetch_breaker: CircuitBreaker::new(FETCH_BREAKER, settings.circuit_breaker.clone()),
            media_breaker: CircuitBreaker::new(MEDIA_BREAKER, settings.circuit_breaker),
            errors: Arc::new(ErrorHandler::with_registry(
                RecoveryRegistry::with_defaults(),
                settings.error_log_capacity,
            )),
            expander: None,
            cache: ArchiveCache::new(settings.cache_ttl),
            avatars: AvatarCache::default(),
            events: EventBus::default(),
            stats: OrchestratorStats::default(),
        }
    }

    pub fn with_error_handler(mut self, errors: Arc<ErrorHandler>) -> Self {
        self.errors = errors;
        self
    }

    /// Expands short links before archiving.
    pub fn with_short_url_expander(mut self, expander: ShortUrlExpander) -> Self {
        self.expander = Some(expander);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArchiveEvent> {
        self.events.subscribe()
    }

    pub fn error_handler(&self) -> &Arc<ErrorHandler> {
        &self.errors
    }

    pub fn stats(&self) -> OrchestratorStatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        OrchestratorStatsSnapshot {
            completed: load(&self.stats.completed),
            failed: load(&self.stats.failed),
            cancelled: load(&self.stats.cancelled),
            cache_hits: load(&self.stats.cache_hits),
            breaker_rejections: load(&self.stats.breaker_rejections),
        }
    }

    pub fn circuit_metrics(&self) -> Vec<(String, CircuitBreakerMetrics)> {
        [&self.fetch_breaker, &self.media_breaker]
            .into_iter()
            .map(|b| (b.name().to_string(), b.metrics()))
            .collect()
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.len().await
    }

    /// Archives `url`.
    ///
    /// Never returns an error: failures, including cancellation, come back as
    /// an unsuccessful `ArchiveResult` after everything this run persisted
    /// has been rolled back.
    pub async fn orchestrate(
        &self,
        url: &str,
        options: &ArchiveOptions,
        cancel: Option<&CancellationToken>,
    ) -> ArchiveResult {
        let started = Instant::now();
        let mut tx = TransactionState::new();
        match self.run(url, options, cancel, started, &mut tx).await {
            Ok(result) => result,
            Err(RunError { error, handled }) => {
                if !tx.is_empty() {
                    tx.rollback(
                        self.collaborators.media.as_ref(),
                        self.collaborators.store.as_ref(),
                    )
                    .await;
                }
                self.fail(url, error, handled).await
            }
        }
    }

    /// Validates, detects the platform, fetches with retries and enriches,
    /// without converting or saving anything.
    ///
    /// # Errors
    ///
    /// Returns the normalised fetch failure, or `OPERATION_CANCELLED`.
    pub async fn fetch_post_data(
        &self,
        url: &str,
        options: &ArchiveOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<PostData, ArchiveError> {
        let outcome = match self.resolve_target(url).await {
            Ok(target) => self.fetch_post(&target, url, options, cancel).await,
            Err(e) => Err(e.into()),
        };
        match outcome {
            Ok(post) => Ok(post),
            Err(RunError { error, .. }) if error.is_cancellation() => Err(error),
            Err(RunError { error, handled: true }) => Err(error),
            Err(RunError { error, .. }) => {
                let context = ErrorContext::new().with_url(url).with_operation("fetch_post_data");
                Err(self.errors.record(error, Some(context)))
            }
        }
    }

    async fn run(
        &self,
        url: &str,
        options: &ArchiveOptions,
        cancel: Option<&CancellationToken>,
        started: Instant,
        tx: &mut TransactionState,
    ) -> Result<ArchiveResult, RunError> {
        check_cancelled(cancel)?;

        let lookup_key = canonicalize_url(url, None).ok();
        let id_key = detect_platform(url)
            .and_then(|p| extract_post_id(url, Some(p)).and_then(|id| post_key(p, &id)));
        for key in lookup_key.iter().chain(id_key.iter()) {
            if let Some(hit) = self.cached(key).await {
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                log::info!("{url} already archived at {}", hit.file_path.display());
                self.events
                    .progress(url, ArchiveStage::Complete, 100, "Already archived");
                return Ok(ArchiveResult::cached(hit.file_path, hit.share_url));
            }
        }

        let target = self.resolve_target(url).await?;
        let mut post = self.fetch_post(&target, url, options, cancel).await?;
        let canonical =
            canonicalize_url(&target, Some(post.platform)).unwrap_or_else(|_| target.clone());

        let media = if options.download_media {
            self.download_media(url, &mut post, cancel, tx).await?
        } else {
            Vec::new()
        };

        check_cancelled(cancel)?;
        let stage = ArchiveStage::Processing;
        self.events.progress(url, stage, stage.scale(0), "Converting to note");
        let context = ErrorContext::new()
            .with_url(url)
            .with_platform(post.platform)
            .with_operation("convert");
        let converter = &self.collaborators.converter;
        let mut doc = converter
            .convert(&post, options.template.as_deref(), &media)
            .await
            .map_err(|e| collaborator_error(e, context.clone(), ErrorCode::ConversionError))?;
        doc.front_matter.insert(
            "processing_time_ms".to_string(),
            json!(duration_to_ms(started.elapsed())),
        );
        converter
            .update_full_document(&mut doc)
            .map_err(|e| collaborator_error(e, context, ErrorCode::ConversionError))?;
        self.events.stage_complete(url, stage);

        check_cancelled(cancel)?;
        let stage = ArchiveStage::Saving;
        self.events.progress(url, stage, stage.scale(0), "Saving note");
        let context = ErrorContext::new()
            .with_url(url)
            .with_platform(post.platform)
            .with_operation("save");
        let path: PathBuf = self
            .collaborators
            .store
            .save_post(&post, &doc)
            .await
            .map_err(|e| collaborator_error(e, context.clone(), ErrorCode::VaultError))?;
        tx.record_file(&path);
        self.events.progress(url, stage, stage.scale(50), "Note saved");

        check_cancelled(cancel)?;
        let share_url = match (&self.collaborators.share, options.create_share_link) {
            (Some(publisher), true) => Some(
                publisher
                    .publish(&path, &post)
                    .await
                    .map_err(|e| collaborator_error(e, context, ErrorCode::InternalError))?,
            ),
            (None, true) => {
                log::warn!("Share link requested for {url} but no publisher is configured");
                None
            }
            _ => None,
        };

        let mut keys = vec![canonical];
        keys.extend(lookup_key);
        keys.extend(post_key(post.platform, &post.id));
        keys.dedup();
        let entry = CacheEntry::new(post, path.clone(), share_url.clone());
        for key in keys {
            self.cache.insert(key, entry.clone()).await;
        }

        self.events.stage_complete(url, stage);
        self.events
            .progress(url, ArchiveStage::Complete, 100, "Archive complete");
        self.stats.completed.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "Archived {url} to {} in {}ms",
            path.display(),
            duration_to_ms(started.elapsed())
        );
        Ok(ArchiveResult::completed(path, share_url, credits_for(options)))
    }

    /// A live cache entry whose note still exists.
    async fn cached(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.cache.get(key).await?;
        match self
            .collaborators
            .store
            .get_file_by_path(&entry.file_path)
            .await
        {
            Ok(Some(_)) => Some(entry),
            Ok(None) => {
                log::debug!(
                    "Cached note {} no longer exists; archiving again",
                    entry.file_path.display()
                );
                self.cache.remove(key).await;
                None
            }
            Err(e) => {
                log::warn!("Could not check cached note {}: {e:#}", entry.file_path.display());
                Some(entry)
            }
        }
    }

    async fn resolve_target(&self, url: &str) -> Result<String, ArchiveError> {
        match &self.expander {
            Some(expander) if is_shortened_url(url) => expander.expand(url).await.map_err(|e| {
                e.with_context(
                    ErrorContext::new()
                        .with_url(url)
                        .with_operation("expand_short_url"),
                )
            }),
            _ => Ok(url.trim().to_string()),
        }
    }

    /// Validation, platform detection, retried fetch and enrichment.
    /// Progress is reported against `report_url`, the URL the caller passed.
    async fn fetch_post(
        &self,
        url: &str,
        report_url: &str,
        options: &ArchiveOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<PostData, RunError> {
        let fetch = &self.collaborators.fetch;
        if !fetch.validate_url(url) {
            return Err(ArchiveError::invalid_url(url).into());
        }
        let platform = fetch
            .detect_platform(url)
            .ok_or_else(|| ArchiveError::unsupported_platform(url))?;

        check_cancelled(cancel)?;
        let stage = ArchiveStage::Fetching;
        self.events.progress(
            report_url,
            stage,
            stage.scale(0),
            format!("Fetching {} post", platform.display_name()),
        );

        let mut post = self
            .fetch_with_retry(url, report_url, platform, options, cancel)
            .await
            .map_err(|error| RunError {
                error,
                handled: true,
            })?;

        if let Err(e) = enrich_author(&mut post, &self.avatars).await {
            log::warn!("Author enrichment failed for {url}: {}", e.message());
        }
        match extract_links(&post) {
            Ok(links) => merge_links(&mut post, links),
            Err(e) => log::warn!("Link extraction failed for {url}: {}", e.message()),
        }

        self.events
            .progress(report_url, stage, stage.scale(100), "Post fetched");
        self.events.stage_complete(report_url, stage);
        Ok(post)
    }

    /// Every attempt runs through the backend breaker. A failure the backoff
    /// engine will retry goes through the error handler, which may wait out a
    /// rate limit (abandoned on cancel). The final failure is only recorded.
    async fn fetch_with_retry(
        &self,
        url: &str,
        report_url: &str,
        platform: Platform,
        options: &ArchiveOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<PostData, ArchiveError> {
        let context = ErrorContext::new()
            .with_url(url)
            .with_platform(platform)
            .with_operation("fetch_post");
        let fetch_options = options.fetch_options();
        let stage = ArchiveStage::Fetching;

        let events = self.events.clone();
        let key = report_url.to_string();
        let max_attempts = self.backoff.config().max_attempts;
        let on_retry: RetryCallback =
            Arc::new(move |attempt: u32, delay: Duration, error: &ArchiveError| {
                events.progress(
                    &key,
                    stage,
                    stage.scale(5),
                    format!(
                        "Retry {attempt}/{max_attempts} in {}ms: {}",
                        delay.as_millis(),
                        error.user_message()
                    ),
                );
            });

        let events = self.events.clone();
        let key = report_url.to_string();
        let on_progress: ProgressFn = Arc::new(move |percent: u8, message: &str| {
            events.progress(&key, stage, stage.scale(percent), message);
        });

        let mut attempts_made: u32 = 0;
        let outcome = self
            .backoff
            .clone()
            .with_on_retry(on_retry)
            .execute(
                || {
                    attempts_made += 1;
                    let retry_follows = attempts_made <= max_attempts;
                    let context = context.clone();
                    let on_progress = on_progress.clone();
                    let fetch_options = &fetch_options;
                    async move {
                        let attempt = self
                            .fetch_breaker
                            .execute(|| async {
                                let call = self.collaborators.fetch.archive_post(
                                    url,
                                    fetch_options,
                                    Some(on_progress),
                                );
                                let result = match cancel {
                                    Some(token) => tokio::select! {
                                        _ = token.cancelled() => return Err(ArchiveError::cancelled()),
                                        r = call => r,
                                    },
                                    None => call.await,
                                };
                                result.map_err(|e| normalize(e, Some(context.clone())))
                            })
                            .await;
                        match attempt {
                            Ok(post) => Ok(post),
                            Err(e) if e.is_cancellation() => Err(e),
                            Err(e) if retry_follows && self.errors.should_retry(&e) => {
                                Err(match cancel {
                                    Some(token) => {
                                        self.errors
                                            .handle_cancellable(e, Some(context), token)
                                            .await
                                    }
                                    None => self.errors.handle(e, Some(context)).await,
                                })
                            }
                            Err(e) => Err(self.errors.record(e, Some(context))),
                        }
                    }
                },
                cancel,
            )
            .await;

        if outcome.attempts > 1 {
            log::debug!(
                "Fetch of {url} took {} attempt(s) over {}ms",
                outcome.attempts,
                outcome.total_time.as_millis()
            );
        }
        outcome.result
    }

    /// Downloads every media item one at a time, recording each file in the
    /// transaction as soon as it exists.
    async fn download_media(
        &self,
        url: &str,
        post: &mut PostData,
        cancel: Option<&CancellationToken>,
        tx: &mut TransactionState,
    ) -> Result<Vec<MediaResult>, ArchiveError> {
        let items = collect_media(post);
        let stage = ArchiveStage::Downloading;
        let total = items.len();
        self.events.progress(
            url,
            stage,
            stage.scale(0),
            format!("Downloading {total} media item(s)"),
        );

        let platform = post.platform;
        let post_id = post.id.clone();
        let handle = post.author.handle.clone();
        let mut results = Vec::with_capacity(total);

        for (done, (slot, item)) in items.into_iter().enumerate() {
            check_cancelled(cancel)?;
            let context = ErrorContext::new()
                .with_url(url)
                .with_platform(platform)
                .with_operation("download_media")
                .with_metadata("media_url", json!(item.url));
            let attempt = self
                .media_breaker
                .execute(|| async {
                    self.collaborators
                        .media
                        .download_media(
                            std::slice::from_ref(&item),
                            platform,
                            &post_id,
                            &handle,
                            None,
                        )
                        .await
                        .map_err(|e| normalize(e, Some(context.clone())))
                })
                .await;

            match attempt {
                Ok(downloaded) => {
                    for result in downloaded {
                        tx.record_media(&result.local_path);
                        set_local_path(post, slot, &result.local_path.display().to_string());
                        results.push(result);
                    }
                }
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) if skippable_media_error(&e) => {
                    let e = self.errors.record(e, Some(context));
                    log::warn!("Skipping media {}: {}", item.url, e.message());
                }
                Err(e) => return Err(e),
            }

            let percent = ((done + 1) * 100 / total) as u8;
            self.events.progress(
                url,
                stage,
                stage.scale(percent),
                format!("Downloaded {}/{total}", done + 1),
            );
        }

        self.events.stage_complete(url, stage);
        Ok(results)
    }

    async fn fail(&self, url: &str, error: ArchiveError, handled: bool) -> ArchiveResult {
        if error.is_cancellation() {
            self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
            log::info!("Archive of {url} cancelled");
            self.events
                .progress(url, ArchiveStage::Cancelled, 0, error.user_message());
            self.events.emit(ArchiveEvent::Cancelled {
                url: url.to_string(),
            });
            return ArchiveResult::failed(&error);
        }

        let error = if handled {
            error
        } else {
            let context = ErrorContext::new().with_url(url).with_operation("archive");
            self.errors.record(error, Some(context))
        };
        if error.is_circuit_open() {
            self.stats.breaker_rejections.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.events
            .progress(url, ArchiveStage::Error, 0, error.user_message());
        self.events.emit(ArchiveEvent::Error {
            url: url.to_string(),
            error: error.clone(),
        });
        ArchiveResult::failed(&error)
    }
}
