//! Recovery strategy registry.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::types::{ArchiveError, ErrorCode};

/// An in-process recovery attempt. Resolves to `true` when the condition that
/// caused the error has been dealt with (for example, a rate-limit window
/// has passed).
pub type RecoveryStrategy = Arc<dyn Fn(ArchiveError) -> BoxFuture<'static, bool> + Send + Sync>;

/// Maps error codes to recovery strategies.
#[derive(Clone, Default)]
pub struct RecoveryRegistry {
    strategies: HashMap<ErrorCode, RecoveryStrategy>,
}

impl RecoveryRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry the error handler starts with:
    /// - rate limits sleep for the error's retry-after, then report recovered
    /// - network, timeout and media errors never auto-recover here
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        let wait_out_rate_limit: RecoveryStrategy = Arc::new(|error: ArchiveError| {
            async move {
                if let Some(wait) = error.retry_after() {
                    log::info!(
                        "Rate limited ({}); waiting {}ms before retrying",
                        error.code(),
                        wait.as_millis()
                    );
                    tokio::time::sleep(wait).await;
                }
                true
            }
            .boxed()
        });
        registry.register(ErrorCode::RateLimitExceeded, wait_out_rate_limit.clone());
        registry.register(ErrorCode::PlatformRateLimited, wait_out_rate_limit);

        let never: RecoveryStrategy = Arc::new(|_: ArchiveError| async { false }.boxed());
        for code in [
            ErrorCode::NetworkError,
            ErrorCode::TimeoutError,
            ErrorCode::MediaError,
            ErrorCode::MediaTooLarge,
        ] {
            registry.register(code, never.clone());
        }

        registry
    }

    /// Registers (or replaces) the strategy for `code`.
    pub fn register(&mut self, code: ErrorCode, strategy: RecoveryStrategy) {
        self.strategies.insert(code, strategy);
    }

    pub fn get(&self, code: ErrorCode) -> Option<RecoveryStrategy> {
        self.strategies.get(&code).cloned()
    }

    pub fn contains(&self, code: ErrorCode) -> bool {
        self.strategies.contains_key(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_strategy_waits_then_recovers() {
        let registry = RecoveryRegistry::with_defaults();
        let strategy = registry.get(ErrorCode::RateLimitExceeded).unwrap();
        let start = tokio::time::Instant::now();
        let recovered = strategy(ArchiveError::rate_limit(Some(Duration::from_secs(5)))).await;
        assert!(recovered);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_network_and_media_never_recover() {
        let registry = RecoveryRegistry::with_defaults();
        for code in [ErrorCode::NetworkError, ErrorCode::MediaError] {
            let strategy = registry.get(code).unwrap();
            assert!(!strategy(ArchiveError::new(code, "x")).await);
        }
        assert!(!registry.contains(ErrorCode::VaultError));
    }
}
