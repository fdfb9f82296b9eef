//! Archive orchestration.
//!
//! `ArchiveOrchestrator::orchestrate` runs one archive as a saga:
//! cache lookup, validation and platform detection, a retried fetch behind a
//! circuit breaker, best-effort enrichment, media download, conversion,
//! saving and an optional share link. Anything persisted before a failure
//! or cancellation is rolled back. Progress is published as `ArchiveEvent`s.

mod cache;
mod credits;
mod enrich;
mod events;
mod media;
mod saga;
mod transaction;
mod types;

pub use cache::{ArchiveCache, AvatarCache, CacheEntry};
pub use credits::credits_for;
pub use enrich::{enrich_author, extract_links};
pub use events::{ArchiveEvent, EventBus, EventName};
pub use media::{collect_media, MediaSlot};
pub use saga::{ArchiveOrchestrator, OrchestratorStatsSnapshot};
pub use transaction::{RollbackReport, TransactionState};
pub use types::{ArchiveOptions, ArchiveProgress, ArchiveResult, ArchiveStage, OrchestratorSettings};
