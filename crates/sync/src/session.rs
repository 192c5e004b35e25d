//! One open dashboard: local layout state, its version history, and the
//! path from a user action to the offline queue.
//!
//! Every edit is applied optimistically to [`LayoutState`], committed to
//! [`LayoutHistory`], written to the local store when groups changed, and
//! turned into queue entries by diffing the before/after snapshots. Undo and
//! redo restore a snapshot and enqueue the diff without adding history.

use std::sync::Arc;

use uuid::Uuid;

use fieldboard_core::card::Card;
use fieldboard_core::grid::{GridMetrics, CARDS_PER_ROW};
use fieldboard_core::group::{GroupColor, GroupPatch};
use fieldboard_core::history::{LayoutHistory, PublishOutcome};
use fieldboard_core::layout::{diff_snapshots, LayoutSnapshot, LayoutState};
use fieldboard_core::mutation::LayoutMutation;
use fieldboard_core::packing::{pack_minimized_cards, CardRelocation};
use fieldboard_core::prefs::UserPreferences;
use fieldboard_core::types::{CardId, GroupId, Rect};

use crate::debounce::Debouncer;
use crate::error::SyncResult;
use crate::manager::SyncManager;
use crate::publish::VersionPublisher;
use crate::store::JsonStore;

pub struct LayoutSession {
    layout_id: String,
    state: LayoutState,
    history: LayoutHistory,
    sync: Arc<SyncManager>,
    store: JsonStore,
    publisher: VersionPublisher,
    metrics: GridMetrics,
    grid_initialized: bool,
    grid_trigger: Option<Debouncer>,
}

impl LayoutSession {
    /// Open a layout from the server snapshot. Locally stored groups replace
    /// the snapshot's groups so offline group edits survive a reload.
    pub async fn open(
        layout_id: impl Into<String>,
        snapshot: &LayoutSnapshot,
        sync: Arc<SyncManager>,
        store: JsonStore,
        publisher: VersionPublisher,
    ) -> SyncResult<Self> {
        let layout_id = layout_id.into();
        let mut state = LayoutState::from_snapshot(snapshot);
        if let Some(groups) = store.load_groups().await? {
            tracing::debug!(layout_id = %layout_id, groups = groups.len(), "Using locally stored groups");
            state.groups = groups;
        }
        let history = LayoutHistory::new(layout_id.clone(), state.snapshot());

        Ok(Self {
            layout_id,
            state,
            history,
            sync,
            store,
            publisher,
            metrics: GridMetrics::default(),
            grid_initialized: false,
            grid_trigger: None,
        })
    }

    pub fn with_grid_metrics(mut self, metrics: GridMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Debouncer fired by [`LayoutSession::register_card`].
    pub fn set_grid_trigger(&mut self, trigger: Debouncer) {
        self.grid_trigger = Some(trigger);
    }

    pub fn layout_id(&self) -> &str {
        &self.layout_id
    }

    pub fn state(&self) -> &LayoutState {
        &self.state
    }

    pub fn history(&self) -> &LayoutHistory {
        &self.history
    }

    pub fn sync(&self) -> &Arc<SyncManager> {
        &self.sync
    }

    /// Add a card rendered by the host. Restarts the grid packing window.
    pub fn register_card(&mut self, card: Card) -> bool {
        let inserted = self.state.cards.insert(card);
        if inserted {
            if let Some(trigger) = &self.grid_trigger {
                trigger.trigger();
            }
        }
        inserted
    }

    /// Pack minimised cards onto the grid. Runs once per session; later
    /// calls return an empty list.
    pub async fn initialize_grid(&mut self) -> SyncResult<Vec<CardRelocation>> {
        if self.grid_initialized {
            return Ok(Vec::new());
        }
        self.grid_initialized = true;

        let before = self.state.snapshot();
        let mut scratch = self.state.cards.clone();
        let relocations = pack_minimized_cards(&mut scratch, &self.metrics, CARDS_PER_ROW);
        for relocation in &relocations {
            self.state.move_card(&relocation.card_id, relocation.to.x, relocation.to.y);
        }
        if !relocations.is_empty() {
            tracing::info!(
                layout_id = %self.layout_id,
                moved = relocations.len(),
                "Minimised cards packed onto grid"
            );
            self.record(before, Some("Grid initialisation".to_string())).await?;
        }
        Ok(relocations)
    }

    // ---- card edits ----

    pub async fn move_card(&mut self, id: &str, x: f64, y: f64) -> SyncResult<bool> {
        let before = self.state.snapshot();
        if self.state.move_card(id, x, y).is_none() {
            return Ok(false);
        }
        self.record(before, None).await?;
        Ok(true)
    }

    pub async fn resize_card(&mut self, id: &str, width: f64, height: f64) -> SyncResult<bool> {
        let before = self.state.snapshot();
        if self.state.resize_card(id, width, height).is_none() {
            return Ok(false);
        }
        self.record(before, None).await?;
        Ok(true)
    }

    pub async fn set_card_minimized(&mut self, id: &str, minimized: bool) -> SyncResult<bool> {
        let before = self.state.snapshot();
        if !self.state.set_card_minimized(id, minimized) {
            return Ok(false);
        }
        self.record(before, None).await?;
        Ok(true)
    }

    // ---- interactions ----

    /// Snapshot taken when a drag or resize starts.
    pub fn begin_interaction(&self) -> LayoutSnapshot {
        self.state.snapshot()
    }

    /// Mutable state for the drag and resize controllers between
    /// [`begin_interaction`](Self::begin_interaction) and
    /// [`end_interaction`](Self::end_interaction).
    pub fn state_mut(&mut self) -> &mut LayoutState {
        &mut self.state
    }

    /// Commit everything the interaction changed as one history entry.
    /// Returns the number of queued mutations.
    pub async fn end_interaction(&mut self, before: LayoutSnapshot) -> SyncResult<usize> {
        self.record(before, None).await
    }

    // ---- groups ----

    pub async fn create_group(
        &mut self,
        name: &str,
        card_ids: &[CardId],
        color: Option<GroupColor>,
    ) -> SyncResult<GroupId> {
        let before = self.state.snapshot();
        let id = self.state.create_group(name, card_ids, color)?;
        self.record(before, None).await?;
        Ok(id)
    }

    pub async fn update_group(&mut self, id: &str, patch: &GroupPatch) -> SyncResult<()> {
        let before = self.state.snapshot();
        self.state.update_group(id, patch)?;
        self.record(before, None).await?;
        Ok(())
    }

    /// Delete the group and its member cards.
    pub async fn delete_group_cascading(&mut self, id: &str) -> SyncResult<Vec<CardId>> {
        let before = self.state.snapshot();
        let removed = self.state.delete_group_cascading(id)?;
        self.record(before, None).await?;
        Ok(removed)
    }

    /// Delete the group and keep its cards in place.
    pub async fn delete_group_only(&mut self, id: &str) -> SyncResult<()> {
        let before = self.state.snapshot();
        self.state.delete_group_only(id)?;
        self.record(before, None).await?;
        Ok(())
    }

    pub async fn add_cards_to_group(&mut self, id: &str, card_ids: &[CardId]) -> SyncResult<Rect> {
        let before = self.state.snapshot();
        let bounds = self.state.add_cards_to_group(id, card_ids)?;
        self.record(before, None).await?;
        Ok(bounds)
    }

    pub async fn remove_cards_from_group(&mut self, id: &str, card_ids: &[CardId]) -> SyncResult<Rect> {
        let before = self.state.snapshot();
        let bounds = self.state.remove_cards_from_group(id, card_ids)?;
        self.record(before, None).await?;
        Ok(bounds)
    }

    // ---- history ----

    pub async fn undo(&mut self) -> SyncResult<bool> {
        let current = self.state.snapshot();
        let Some(target) = self.history.undo().cloned() else {
            return Ok(false);
        };
        self.jump_to(&current, &target).await?;
        Ok(true)
    }

    pub async fn redo(&mut self) -> SyncResult<bool> {
        let current = self.state.snapshot();
        let Some(target) = self.history.redo().cloned() else {
            return Ok(false);
        };
        self.jump_to(&current, &target).await?;
        Ok(true)
    }

    pub async fn publish(&mut self, version_id: Uuid, notes: Option<String>) -> SyncResult<PublishOutcome> {
        self.publisher.publish(&mut self.history, version_id, notes).await
    }

    /// Publish the version the undo cursor points at.
    pub async fn publish_current(&mut self, notes: Option<String>) -> SyncResult<PublishOutcome> {
        let id = self.history.current().id;
        self.publish(id, notes).await
    }

    pub async fn save_preferences(&self, prefs: &UserPreferences) -> SyncResult<()> {
        prefs.validate()?;
        self.store.save_preferences(prefs).await?;
        Ok(())
    }

    // ---- private helpers ----

    async fn record(&mut self, before: LayoutSnapshot, notes: Option<String>) -> SyncResult<usize> {
        let after = self.state.snapshot();
        let mutations = diff_snapshots(&before, &after);
        self.commit(&before, after, mutations, notes).await
    }

    async fn commit(
        &mut self,
        before: &LayoutSnapshot,
        after: LayoutSnapshot,
        mutations: Vec<LayoutMutation>,
        notes: Option<String>,
    ) -> SyncResult<usize> {
        if mutations.is_empty() {
            return Ok(0);
        }
        if before.groups != after.groups {
            self.store.save_groups(&self.state.groups).await?;
        }
        let version = self.history.commit(after, notes);
        tracing::debug!(
            layout_id = %self.layout_id,
            version = version.version_number,
            mutations = mutations.len(),
            "Layout change committed"
        );
        self.enqueue_all(mutations).await
    }

    async fn jump_to(&mut self, current: &LayoutSnapshot, target: &LayoutSnapshot) -> SyncResult<usize> {
        let mutations = diff_snapshots(current, target);
        self.state.restore(target);
        if current.groups != target.groups {
            self.store.save_groups(&self.state.groups).await?;
        }
        self.enqueue_all(mutations).await
    }

    async fn enqueue_all(&self, mutations: Vec<LayoutMutation>) -> SyncResult<usize> {
        let count = mutations.len();
        for mutation in mutations {
            self.sync.enqueue(mutation).await?;
        }
        Ok(count)
    }
}
