//! Sync status events backed by a `tokio::sync::broadcast` channel.
//!
//! These feed the inline status indicator: queue progress, failures that
//! need a retry affordance, and connectivity transitions.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use fieldboard_core::mutation::ResourceKey;
use fieldboard_core::queue::SyncStatus;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Queued {
        entry_id: Uuid,
        resource: ResourceKey,
    },
    Synced {
        entry_id: Uuid,
        resource: ResourceKey,
    },
    Failed {
        entry_id: Uuid,
        resource: ResourceKey,
        error: String,
        /// No automatic retry will follow; the user must act.
        terminal: bool,
    },
    Discarded {
        entry_id: Uuid,
    },
    Connectivity {
        online: bool,
    },
    Status(SyncStatus),
    VersionPublished {
        version_id: Uuid,
        archived: Option<Uuid>,
    },
}

/// Fan-out bus for [`SyncEvent`]s, shared via `Arc<SyncEventBus>`.
#[derive(Debug)]
pub struct SyncEventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl SyncEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers; dropped silently if there are none.
    pub fn publish(&self, event: SyncEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

impl Default for SyncEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
