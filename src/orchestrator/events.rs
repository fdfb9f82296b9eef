//! Event fan-out to any number of listeners.

use serde::Serialize;
use tokio::sync::broadcast;

use super::types::{ArchiveProgress, ArchiveStage};
use crate::config::EVENT_CHANNEL_CAPACITY;
use crate::error_handling::ArchiveError;

#[derive(Debug, Clone)]
pub enum ArchiveEvent {
    Progress {
        url: String,
        progress: ArchiveProgress,
    },
    StageComplete {
        url: String,
        stage: ArchiveStage,
    },
    Error {
        url: String,
        error: ArchiveError,
    },
    Cancelled {
        url: String,
    },
}

impl ArchiveEvent {
    pub fn url(&self) -> &str {
        match self {
            ArchiveEvent::Progress { url, .. }
            | ArchiveEvent::StageComplete { url, .. }
            | ArchiveEvent::Error { url, .. }
            | ArchiveEvent::Cancelled { url } => url,
        }
    }

    pub fn name(&self) -> EventName {
        match self {
            ArchiveEvent::Progress { .. } => EventName::Progress,
            ArchiveEvent::StageComplete { .. } => EventName::StageComplete,
            ArchiveEvent::Error { .. } => EventName::Error,
            ArchiveEvent::Cancelled { .. } => EventName::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventName {
    Progress,
    StageComplete,
    Error,
    Cancelled,
}

/// Broadcast channel of `ArchiveEvent`s. Sending with no subscribers drops
/// the event; slow subscribers skip events once they lag past the capacity.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ArchiveEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArchiveEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ArchiveEvent) {
        let _ = self.sender.send(event);
    }

    pub fn progress(&self, url: &str, stage: ArchiveStage, percent: u8, message: impl Into<String>) {
        self.emit(ArchiveEvent::Progress {
            url: url.to_string(),
            progress: ArchiveProgress {
                stage,
                percent,
                message: message.into(),
            },
        });
    }

    pub fn stage_complete(&self, url: &str, stage: ArchiveStage) {
        self.emit(ArchiveEvent::StageComplete {
            url: url.to_string(),
            stage,
        });
    }
}
