//! Shared helpers for sync integration tests.
//!
//! [`FakeBackend`] stands in for the layout API: it applies mutations to an
//! in-memory [`LayoutState`], records every call, and can be scripted to
//! fail specific resources.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use fieldboard_client::{AclBackend, ClientError, LayoutBackend, PublishedVersion};
use fieldboard_core::acl::{AclEntry, AclGrant};
use fieldboard_core::card::Card;
use fieldboard_core::history::VersionStatus;
use fieldboard_core::layout::{LayoutSnapshot, LayoutState};
use fieldboard_core::mutation::LayoutMutation;
use fieldboard_sync::connectivity::Connectivity;
use fieldboard_sync::events::SyncEventBus;
use fieldboard_sync::manager::{RetryPolicy, SyncManager};
use fieldboard_sync::publish::VersionPublisher;
use fieldboard_sync::store::JsonStore;
use fieldboard_sync::LayoutSession;

#[derive(Default)]
pub struct FakeBackend {
    pub remote: Mutex<LayoutState>,
    pub applied: Mutex<Vec<LayoutMutation>>,
    /// Resource key (`card:<id>` / `group:<id>`) -> queued failure statuses.
    failures: Mutex<HashMap<String, Vec<u16>>>,
    pub publish_calls: AtomicUsize,
    publish_failure: Mutex<Option<u16>>,
    /// Id the next publish confirmation reports instead of the requested one.
    confirmed_id: Mutex<Option<Uuid>>,
    pub acl: Mutex<Vec<AclEntry>>,
    pub acl_writes: AtomicUsize,
}

impl FakeBackend {
    pub fn with_cards(cards: &[Card]) -> Arc<Self> {
        let backend = Self::default();
        {
            let mut remote = backend.remote.lock().unwrap();
            for card in cards {
                remote.cards.insert(card.clone());
            }
        }
        Arc::new(backend)
    }

    /// Fail the next `times` calls touching `resource` with HTTP `status`.
    pub fn fail(&self, resource: &str, status: u16, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .entry(resource.to_string())
            .or_default()
            .extend(std::iter::repeat(status).take(times));
    }

    /// Seed an ACL entry without counting it as a write.
    pub fn put_seed(&self, region_id: &str, grant: AclGrant) {
        self.acl.lock().unwrap().push(AclEntry {
            id: Uuid::new_v4().to_string(),
            region_id: region_id.to_string(),
            principal_type: grant.principal_type,
            principal_id: grant.principal_id,
            permission_set: grant.permission_set,
        });
    }

    pub fn fail_publish(&self, status: Option<u16>) {
        *self.publish_failure.lock().unwrap() = status;
    }

    pub fn confirm_publish_as(&self, id: Uuid) {
        *self.confirmed_id.lock().unwrap() = Some(id);
    }

    pub fn applied(&self) -> Vec<LayoutMutation> {
        self.applied.lock().unwrap().clone()
    }

    pub fn remote_position(&self, card_id: &str) -> Option<(f64, f64)> {
        let remote = self.remote.lock().unwrap();
        remote.cards.get(card_id).map(|c| (c.x, c.y))
    }

    fn take_failure(&self, resource: &str) -> Option<u16> {
        let mut failures = self.failures.lock().unwrap();
        let queue = failures.get_mut(resource)?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }
}

fn api_error(status: u16) -> ClientError {
    ClientError::Api {
        status,
        message: format!("scripted failure {status}"),
    }
}

#[async_trait]
impl LayoutBackend for FakeBackend {
    async fn apply(&self, mutation: &LayoutMutation) -> Result<(), ClientError> {
        if let Some(status) = self.take_failure(&mutation.resource().to_string()) {
            return Err(api_error(status));
        }
        self.remote.lock().unwrap().apply(mutation);
        self.applied.lock().unwrap().push(mutation.clone());
        Ok(())
    }

    async fn publish_version(
        &self,
        version_id: Uuid,
        notes: Option<&str>,
    ) -> Result<PublishedVersion, ClientError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = *self.publish_failure.lock().unwrap() {
            return Err(api_error(status));
        }
        let id = self.confirmed_id.lock().unwrap().take().unwrap_or(version_id);
        Ok(PublishedVersion {
            id,
            version_number: 0,
            status: VersionStatus::Published,
            notes: notes.map(str::to_string),
            archived_version_id: None,
        })
    }

    async fn health(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

#[async_trait]
impl AclBackend for FakeBackend {
    async fn get_acl(&self, region_id: &str) -> Result<Vec<AclEntry>, ClientError> {
        Ok(self
            .acl
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.region_id == region_id)
            .cloned()
            .collect())
    }

    async fn put_acl(&self, region_id: &str, grant: &AclGrant) -> Result<AclEntry, ClientError> {
        self.acl_writes.fetch_add(1, Ordering::SeqCst);
        let mut acl = self.acl.lock().unwrap();
        acl.retain(|e| {
            !(e.region_id == region_id
                && e.principal_type == grant.principal_type
                && e.principal_id == grant.principal_id)
        });
        let entry = AclEntry {
            id: Uuid::new_v4().to_string(),
            region_id: region_id.to_string(),
            principal_type: grant.principal_type,
            principal_id: grant.principal_id.clone(),
            permission_set: grant.permission_set,
        };
        acl.push(entry.clone());
        Ok(entry)
    }

    async fn delete_acl(&self, region_id: &str, acl_id: &str) -> Result<(), ClientError> {
        self.acl_writes.fetch_add(1, Ordering::SeqCst);
        let mut acl = self.acl.lock().unwrap();
        let before = acl.len();
        acl.retain(|e| !(e.region_id == region_id && e.id == acl_id));
        if acl.len() == before {
            return Err(api_error(404));
        }
        Ok(())
    }
}

/// Everything a sync test needs, wired to one [`FakeBackend`].
pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub store: JsonStore,
    pub connectivity: Connectivity,
    pub events: Arc<SyncEventBus>,
    pub manager: Arc<SyncManager>,
    pub dir: tempfile::TempDir,
}

pub const FAST_RETRY: RetryPolicy = RetryPolicy {
    base: Duration::from_millis(10),
    max: Duration::from_millis(40),
};

pub async fn harness(backend: Arc<FakeBackend>, online: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    harness_in(backend, online, dir).await
}

pub async fn harness_in(backend: Arc<FakeBackend>, online: bool, dir: tempfile::TempDir) -> Harness {
    let store = JsonStore::open(dir.path()).await.unwrap();
    let connectivity = Connectivity::new(online);
    let events = Arc::new(SyncEventBus::default());
    let manager = Arc::new(SyncManager::new(
        backend.clone(),
        store.clone(),
        connectivity.clone(),
        events.clone(),
        3,
        FAST_RETRY,
    ));
    Harness {
        backend,
        store,
        connectivity,
        events,
        manager,
        dir,
    }
}

impl Harness {
    pub async fn session(&self, snapshot: &LayoutSnapshot) -> LayoutSession {
        let publisher = VersionPublisher::new(self.backend.clone(), self.events.clone());
        LayoutSession::open("ops-dashboard", snapshot, self.manager.clone(), self.store.clone(), publisher)
            .await
            .unwrap()
    }
}

pub fn sample_cards() -> Vec<Card> {
    vec![
        Card::new("revenue", 20.0, 20.0, 200.0, 120.0),
        Card::new("latency", 260.0, 20.0, 200.0, 120.0),
        Card::new("errors", 20.0, 200.0, 200.0, 120.0),
    ]
}

pub fn snapshot_of(cards: &[Card]) -> LayoutSnapshot {
    LayoutSnapshot {
        cards: cards.to_vec(),
        groups: Vec::new(),
    }
}
