//! Offline sync manager: drives the [`OfflineQueue`] against a
//! [`LayoutBackend`].
//!
//! `enqueue` only touches the queue and the local store and never waits on
//! the network. [`SyncManager::run`] reacts to connectivity transitions:
//! going online drains the queue, going offline freezes it. Failed entries
//! are retried with exponential backoff until they run out of attempts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use fieldboard_client::LayoutBackend;
use fieldboard_core::mutation::LayoutMutation;
use fieldboard_core::queue::{backoff_delay, OfflineQueue, QueueEntry, SyncStatus};

use crate::config::SyncConfig;
use crate::connectivity::Connectivity;
use crate::error::{SyncError, SyncResult};
use crate::events::{SyncEvent, SyncEventBus};
use crate::store::JsonStore;

/// Exponential backoff parameters for automatic retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

/// Outcome counts of one drain or retry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
}

impl std::ops::AddAssign for SyncReport {
    fn add_assign(&mut self, rhs: SyncReport) {
        self.synced += rhs.synced;
        self.failed += rhs.failed;
    }
}

pub struct SyncManager {
    backend: Arc<dyn LayoutBackend>,
    store: JsonStore,
    connectivity: Connectivity,
    events: Arc<SyncEventBus>,
    queue: Mutex<OfflineQueue>,
    /// Serialises drain and retry passes.
    pass: Mutex<()>,
    retry: RetryPolicy,
    wake: Notify,
}

impl SyncManager {
    pub fn new(
        backend: Arc<dyn LayoutBackend>,
        store: JsonStore,
        connectivity: Connectivity,
        events: Arc<SyncEventBus>,
        max_attempts: u32,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            store,
            connectivity,
            events,
            queue: Mutex::new(OfflineQueue::new(max_attempts)),
            pass: Mutex::new(()),
            retry,
            wake: Notify::new(),
        }
    }

    pub fn from_config(
        backend: Arc<dyn LayoutBackend>,
        store: JsonStore,
        connectivity: Connectivity,
        events: Arc<SyncEventBus>,
        config: &SyncConfig,
    ) -> Self {
        let retry = RetryPolicy {
            base: config.retry_base,
            max: config.retry_max,
        };
        Self::new(backend, store, connectivity, events, config.max_attempts, retry)
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn events(&self) -> &Arc<SyncEventBus> {
        &self.events
    }

    /// Load the persisted queue, returning in-flight entries to pending.
    /// Returns the number of entries restored.
    pub async fn restore(&self) -> SyncResult<usize> {
        let entries = self.store.load_queue().await?;
        let mut queue = self.queue.lock().await;
        let restored = OfflineQueue::from_entries(entries, queue.max_attempts());
        let count = restored.len();
        *queue = restored;
        self.store.save_queue(&queue.to_vec()).await?;
        tracing::info!(entries = count, "Offline queue restored");
        Ok(count)
    }

    /// Durably append a mutation. Does not wait on the network.
    pub async fn enqueue(&self, mutation: LayoutMutation) -> SyncResult<Uuid> {
        let resource = mutation.resource();
        let id = {
            let mut queue = self.queue.lock().await;
            let id = queue.enqueue(mutation);
            self.store.save_queue(&queue.to_vec()).await?;
            id
        };
        self.events.publish(SyncEvent::Queued {
            entry_id: id,
            resource,
        });
        self.wake.notify_one();
        Ok(id)
    }

    pub async fn status(&self) -> SyncStatus {
        self.queue.lock().await.status()
    }

    pub async fn entries(&self) -> Vec<QueueEntry> {
        self.queue.lock().await.to_vec()
    }

    /// Drain pending entries in FIFO order, per resource.
    ///
    /// A failed entry holds back later entries for the same resource while
    /// independent resources continue. Fails with [`SyncError::Offline`]
    /// when the connectivity signal is offline.
    pub async fn sync_queue(&self) -> SyncResult<SyncReport> {
        self.ensure_online()?;
        let _pass = self.pass.lock().await;
        let mut report = SyncReport::default();

        loop {
            if !self.connectivity.is_online() {
                tracing::info!("Went offline mid-drain, freezing queue");
                break;
            }
            let next = {
                let queue = self.queue.lock().await;
                queue.next_eligible().map(|e| e.id)
            };
            let Some(id) = next else { break };
            if self.attempt(id).await? {
                report.synced += 1;
            } else {
                report.failed += 1;
            }
        }

        self.publish_status().await;
        Ok(report)
    }

    /// Re-attempt every retryable failed entry, oldest first.
    pub async fn retry_failed(&self) -> SyncResult<SyncReport> {
        self.ensure_online()?;
        let _pass = self.pass.lock().await;
        let mut report = SyncReport::default();

        let candidates = self.queue.lock().await.retry_candidates();
        for id in candidates {
            if !self.connectivity.is_online() {
                break;
            }
            if self.attempt(id).await? {
                report.synced += 1;
            } else {
                report.failed += 1;
            }
        }

        self.publish_status().await;
        Ok(report)
    }

    /// User retry of a terminal entry: fresh attempt budget, back to pending.
    pub async fn reset_entry(&self, id: Uuid) -> SyncResult<bool> {
        let reset = {
            let mut queue = self.queue.lock().await;
            let reset = queue.reset_entry(id);
            if reset {
                self.store.save_queue(&queue.to_vec()).await?;
            }
            reset
        };
        if reset {
            self.wake.notify_one();
            self.publish_status().await;
        }
        Ok(reset)
    }

    /// User acceptance of data loss for one entry.
    pub async fn discard_entry(&self, id: Uuid) -> SyncResult<Option<QueueEntry>> {
        let removed = {
            let mut queue = self.queue.lock().await;
            let removed = queue.discard_entry(id);
            if removed.is_some() {
                self.store.save_queue(&queue.to_vec()).await?;
            }
            removed
        };
        if removed.is_some() {
            self.events.publish(SyncEvent::Discarded { entry_id: id });
            self.wake.notify_one();
            self.publish_status().await;
        }
        Ok(removed)
    }

    /// Delay until the next automatic retry, if any entry is waiting for one.
    pub async fn next_retry_delay(&self) -> Option<Duration> {
        let queue = self.queue.lock().await;
        queue
            .retry_candidates()
            .into_iter()
            .filter_map(|id| queue.get(id))
            .map(|e| backoff_delay(self.retry.base, e.attempts.saturating_sub(1), self.retry.max))
            .min()
    }

    /// React to connectivity and retry timers until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut online_rx = self.connectivity.subscribe();
        tracing::info!(online = *online_rx.borrow(), "Sync manager started");

        loop {
            let online = *online_rx.borrow_and_update();
            if online {
                self.drain_logged().await;
            }
            let retry_in = if online {
                self.next_retry_delay().await
            } else {
                None
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Sync manager stopped");
                    return;
                }
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let online = *online_rx.borrow();
                    self.events.publish(SyncEvent::Connectivity { online });
                    if !online {
                        tracing::info!("Offline, sync frozen");
                    }
                }
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(retry_in.unwrap_or_default()), if retry_in.is_some() => {
                    match self.retry_failed().await {
                        Ok(report) => tracing::info!(
                            synced = report.synced,
                            failed = report.failed,
                            "Automatic retry pass finished"
                        ),
                        Err(e) => tracing::warn!(error = %e, "Automatic retry pass failed"),
                    }
                }
            }
        }
    }

    // ---- private helpers ----

    fn ensure_online(&self) -> SyncResult<()> {
        if self.connectivity.is_online() {
            Ok(())
        } else {
            Err(SyncError::Offline("sync is frozen until reconnection".to_string()))
        }
    }

    async fn drain_logged(&self) {
        match self.sync_queue().await {
            Ok(report) if report.synced + report.failed > 0 => tracing::info!(
                synced = report.synced,
                failed = report.failed,
                "Queue drain finished"
            ),
            Ok(_) => {}
            Err(SyncError::Offline(_)) => {}
            Err(e) => tracing::error!(error = %e, "Queue drain failed"),
        }
    }

    /// One attempt for entry `id`. Returns whether it synced. Only local
    /// storage errors propagate; remote failures are recorded on the entry.
    async fn attempt(&self, id: Uuid) -> SyncResult<bool> {
        let (payload, resource) = {
            let mut queue = self.queue.lock().await;
            if !queue.mark_syncing(id) {
                return Ok(false);
            }
            if let Err(e) = self.store.save_queue(&queue.to_vec()).await {
                queue.abort_attempt(id);
                tracing::warn!(entry_id = %id, error = %e, "Could not persist attempt, entry left pending");
                return Err(e.into());
            }
            match queue.get(id) {
                Some(entry) => (entry.payload.clone(), entry.resource.clone()),
                None => return Ok(false),
            }
        };

        let result = self.backend.apply(&payload).await;

        let mut queue = self.queue.lock().await;
        let synced = match result {
            Ok(()) => {
                queue.mark_completed(id);
                tracing::debug!(entry_id = %id, resource = %resource, "Queue entry synced");
                self.events.publish(SyncEvent::Synced {
                    entry_id: id,
                    resource,
                });
                true
            }
            Err(e) => {
                let message = e.to_string();
                queue.mark_failed(id, message.clone(), !e.is_transient());
                let terminal = queue
                    .get(id)
                    .is_some_and(|entry| entry.is_terminal(queue.max_attempts()));
                tracing::warn!(
                    entry_id = %id,
                    resource = %resource,
                    terminal,
                    error = %e,
                    "Queue entry failed"
                );
                self.events.publish(SyncEvent::Failed {
                    entry_id: id,
                    resource,
                    error: message,
                    terminal,
                });
                false
            }
        };
        self.store.save_queue(&queue.to_vec()).await?;
        Ok(synced)
    }

    async fn publish_status(&self) {
        let status = self.status().await;
        self.events.publish(SyncEvent::Status(status));
    }
}
