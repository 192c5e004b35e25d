//! Offline mutation queue: the state machine behind sync.
//!
//! Entries move `pending -> syncing -> completed | failed`. Completed entries
//! leave the queue. A failed entry blocks every later entry for the same
//! resource until it is retried successfully, reset or discarded; entries for
//! other resources keep flowing. Nothing in here performs I/O.

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mutation::{LayoutMutation, OperationKind, ResourceKey};
use crate::types::Timestamp;

/// Attempts before a failed entry stops being retried automatically.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Syncing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub resource: ResourceKey,
    pub payload: LayoutMutation,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    /// Set when the server rejected the entry permanently (non-transient 4xx).
    #[serde(default)]
    pub permanent: bool,
    pub enqueued_at: Timestamp,
}

impl QueueEntry {
    fn new(payload: LayoutMutation) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind: payload.kind(),
            resource: payload.resource(),
            payload,
            status: EntryStatus::Pending,
            error: None,
            attempts: 0,
            permanent: false,
            enqueued_at: chrono::Utc::now(),
        }
    }

    /// Failed and no longer eligible for automatic retry.
    pub fn is_terminal(&self, max_attempts: u32) -> bool {
        self.status == EntryStatus::Failed && (self.permanent || self.attempts >= max_attempts)
    }
}

/// Counts behind the inline sync status indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub pending: usize,
    pub syncing: usize,
    /// Failed entries that will still be retried.
    pub failed: usize,
    /// Failed entries that need user action.
    pub terminal: usize,
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.syncing == 0 && self.failed == 0 && self.terminal == 0
    }
}

/// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped.
pub fn backoff_delay(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(cap).min(cap)
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineQueue {
    entries: VecDeque<QueueEntry>,
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for OfflineQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl OfflineQueue {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            entries: VecDeque::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Rebuild a queue from persisted entries.
    pub fn from_entries(entries: Vec<QueueEntry>, max_attempts: u32) -> Self {
        let mut queue = Self::new(max_attempts);
        queue.entries = entries
            .into_iter()
            .filter(|e| e.status != EntryStatus::Completed)
            .collect();
        queue.recover_after_reload();
        queue
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn set_max_attempts(&mut self, max_attempts: u32) {
        self.max_attempts = max_attempts.max(1);
    }

    pub fn enqueue(&mut self, mutation: LayoutMutation) -> Uuid {
        let entry = QueueEntry::new(mutation);
        let id = entry.id;
        tracing::debug!(
            entry_id = %id,
            kind = entry.kind.as_str(),
            resource = %entry.resource,
            "Mutation queued"
        );
        self.entries.push_back(entry);
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<QueueEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn get(&self, id: Uuid) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Option<&mut QueueEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// The oldest pending entry whose resource is not held up by an older
    /// failed or in-flight entry.
    pub fn next_eligible(&self) -> Option<&QueueEntry> {
        let mut blocked: BTreeSet<&ResourceKey> = BTreeSet::new();
        for entry in &self.entries {
            match entry.status {
                EntryStatus::Pending if !blocked.contains(&entry.resource) => return Some(entry),
                EntryStatus::Pending | EntryStatus::Failed | EntryStatus::Syncing => {
                    blocked.insert(&entry.resource);
                }
                EntryStatus::Completed => {}
            }
        }
        None
    }

    /// Start an attempt. Accepts pending entries and retryable failed ones;
    /// bumps the attempt counter.
    pub fn mark_syncing(&mut self, id: Uuid) -> bool {
        let max = self.max_attempts;
        let Some(entry) = self.get_mut(id) else {
            return false;
        };
        let startable = match entry.status {
            EntryStatus::Pending => true,
            EntryStatus::Failed => !entry.is_terminal(max),
            EntryStatus::Syncing | EntryStatus::Completed => false,
        };
        if !startable {
            return false;
        }
        entry.status = EntryStatus::Syncing;
        entry.attempts += 1;
        true
    }

    /// Undo [`mark_syncing`](Self::mark_syncing) for an attempt that never
    /// reached the backend. The entry is pending again and the attempt is
    /// not counted.
    pub fn abort_attempt(&mut self, id: Uuid) -> bool {
        let Some(entry) = self.get_mut(id) else {
            return false;
        };
        if entry.status != EntryStatus::Syncing {
            return false;
        }
        entry.status = EntryStatus::Pending;
        entry.attempts = entry.attempts.saturating_sub(1);
        true
    }

    /// Success: the entry leaves the queue.
    pub fn mark_completed(&mut self, id: Uuid) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        let mut entry = self.entries.remove(index)?;
        entry.status = EntryStatus::Completed;
        entry.error = None;
        Some(entry)
    }

    /// Record a failed attempt. A `permanent` failure is terminal at once.
    pub fn mark_failed(&mut self, id: Uuid, error: impl Into<String>, permanent: bool) -> bool {
        let max = self.max_attempts;
        let Some(entry) = self.get_mut(id) else {
            return false;
        };
        entry.status = EntryStatus::Failed;
        entry.error = Some(error.into());
        entry.permanent |= permanent;
        if entry.is_terminal(max) {
            tracing::warn!(
                entry_id = %id,
                resource = %entry.resource,
                attempts = entry.attempts,
                error = entry.error.as_deref().unwrap_or_default(),
                "Queue entry failed permanently"
            );
        }
        true
    }

    /// Failed entries still eligible for automatic retry, oldest first.
    pub fn retry_candidates(&self) -> Vec<Uuid> {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Failed && !e.is_terminal(self.max_attempts))
            .map(|e| e.id)
            .collect()
    }

    /// Entries that need user action.
    pub fn terminal_entries(&self) -> Vec<&QueueEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_terminal(self.max_attempts))
            .collect()
    }

    /// Explicit user retry: a failed entry returns to pending with a fresh
    /// attempt budget.
    pub fn reset_entry(&mut self, id: Uuid) -> bool {
        let Some(entry) = self.get_mut(id) else {
            return false;
        };
        if entry.status != EntryStatus::Failed {
            return false;
        }
        entry.status = EntryStatus::Pending;
        entry.error = None;
        entry.attempts = 0;
        entry.permanent = false;
        true
    }

    /// Explicit user acceptance of data loss. In-flight entries cannot be
    /// discarded.
    pub fn discard_entry(&mut self, id: Uuid) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        if self.entries[index].status == EntryStatus::Syncing {
            return None;
        }
        let removed = self.entries.remove(index);
        if let Some(entry) = &removed {
            tracing::info!(entry_id = %id, resource = %entry.resource, "Queue entry discarded");
        }
        removed
    }

    /// Entries that were in flight when the process stopped go back to
    /// pending. Returns how many were recovered.
    pub fn recover_after_reload(&mut self) -> usize {
        let mut recovered = 0;
        for entry in self.entries.iter_mut() {
            if entry.status == EntryStatus::Syncing {
                entry.status = EntryStatus::Pending;
                recovered += 1;
            }
        }
        recovered
    }

    pub fn status(&self) -> SyncStatus {
        let mut status = SyncStatus::default();
        for entry in &self.entries {
            match entry.status {
                EntryStatus::Pending => status.pending += 1,
                EntryStatus::Syncing => status.syncing += 1,
                EntryStatus::Failed if entry.is_terminal(self.max_attempts) => status.terminal += 1,
                EntryStatus::Failed => status.failed += 1,
                EntryStatus::Completed => {}
            }
            if entry.error.is_some() {
                status.last_error = entry.error.clone();
            }
        }
        status
    }
}
