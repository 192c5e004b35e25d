//! Confirm-then-apply version publishing.
//!
//! The local history is only flipped after the server confirms. A failed
//! call leaves both the target and the currently published version as they
//! were, and is returned to the caller without any retry.
//!
//! Version ids are minted locally and the server publishes under the id it
//! is given. A confirmation for any other id is treated as a conflict.

use std::sync::Arc;

use uuid::Uuid;

use fieldboard_client::LayoutBackend;
use fieldboard_core::history::{LayoutHistory, PublishOutcome};
use fieldboard_core::CoreError;

use crate::error::SyncResult;
use crate::events::{SyncEvent, SyncEventBus};

#[derive(Clone)]
pub struct VersionPublisher {
    backend: Arc<dyn LayoutBackend>,
    events: Arc<SyncEventBus>,
}

impl VersionPublisher {
    pub fn new(backend: Arc<dyn LayoutBackend>, events: Arc<SyncEventBus>) -> Self {
        Self { backend, events }
    }

    /// Publish `version_id`. Publishing an already published version
    /// returns [`PublishOutcome::AlreadyPublished`] without a remote call.
    pub async fn publish(
        &self,
        history: &mut LayoutHistory,
        version_id: Uuid,
        notes: Option<String>,
    ) -> SyncResult<PublishOutcome> {
        if !history.publish_required(version_id)? {
            tracing::debug!(version_id = %version_id, "Version already published");
            return Ok(PublishOutcome::AlreadyPublished);
        }

        let confirmed = self
            .backend
            .publish_version(version_id, notes.as_deref())
            .await
            .map_err(|e| {
                tracing::error!(version_id = %version_id, error = %e, "Publish failed");
                e
            })?;

        if confirmed.id != version_id {
            tracing::error!(
                version_id = %version_id,
                confirmed_id = %confirmed.id,
                "Publish confirmed a different version"
            );
            return Err(CoreError::Conflict(format!(
                "publish of {version_id} was confirmed as {}",
                confirmed.id
            ))
            .into());
        }

        let outcome = history.apply_publish(version_id, notes.or(confirmed.notes))?;
        if let PublishOutcome::Published { archived } = outcome {
            self.events.publish(SyncEvent::VersionPublished {
                version_id,
                archived,
            });
        }
        Ok(outcome)
    }
}
