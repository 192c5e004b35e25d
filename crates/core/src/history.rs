//! Layout version history with linear undo/redo and publish transitions.
//!
//! Version records are append-only: once committed a version is never
//! removed, and only its `status` (and publish notes) ever change. Undo and
//! redo move a cursor over a separate navigation timeline. A commit after an
//! undo truncates the timeline's redo tail, but the versions it pointed at
//! stay in the record list, so a published version is never lost.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::layout::LayoutSnapshot;
use crate::types::Timestamp;

/// Maximum number of undo steps kept on the timeline.
pub const MAX_HISTORY_DEPTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionStatus {
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutVersion {
    pub id: Uuid,
    pub layout_id: String,
    pub version_number: u64,
    pub status: VersionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub snapshot: LayoutSnapshot,
}

/// Result of a publish transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The version was already published; nothing changed.
    AlreadyPublished,
    /// The version is now published; `archived` is the previously
    /// published version, if there was one.
    Published { archived: Option<Uuid> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "HistoryRecord")]
pub struct LayoutHistory {
    layout_id: String,
    versions: Vec<LayoutVersion>,
    timeline: Vec<usize>,
    cursor: usize,
}

/// Unchecked wire form of [`LayoutHistory`].
#[derive(Deserialize)]
struct HistoryRecord {
    layout_id: String,
    versions: Vec<LayoutVersion>,
    timeline: Vec<usize>,
    cursor: usize,
}

impl TryFrom<HistoryRecord> for LayoutHistory {
    type Error = CoreError;

    /// The cursor must point into a non-empty timeline whose entries all
    /// index existing versions.
    fn try_from(record: HistoryRecord) -> Result<Self, CoreError> {
        if record.cursor >= record.timeline.len() {
            return Err(CoreError::Validation(format!(
                "History cursor {} is outside a timeline of {} entries",
                record.cursor,
                record.timeline.len()
            )));
        }
        if let Some(bad) = record.timeline.iter().find(|&&i| i >= record.versions.len()) {
            return Err(CoreError::Validation(format!(
                "History timeline references missing version index {bad}"
            )));
        }
        Ok(Self {
            layout_id: record.layout_id,
            versions: record.versions,
            timeline: record.timeline,
            cursor: record.cursor,
        })
    }
}

impl LayoutHistory {
    /// Start a history whose first draft version is `baseline`.
    pub fn new(layout_id: impl Into<String>, baseline: LayoutSnapshot) -> Self {
        let mut history = Self {
            layout_id: layout_id.into(),
            versions: Vec::new(),
            timeline: Vec::new(),
            cursor: 0,
        };
        history.push_version(baseline, None);
        history.timeline.push(0);
        history
    }

    pub fn layout_id(&self) -> &str {
        &self.layout_id
    }

    fn push_version(&mut self, snapshot: LayoutSnapshot, notes: Option<String>) -> usize {
        let version_number = self.versions.last().map_or(1, |v| v.version_number + 1);
        self.versions.push(LayoutVersion {
            id: Uuid::now_v7(),
            layout_id: self.layout_id.clone(),
            version_number,
            status: VersionStatus::Draft,
            notes,
            created_at: chrono::Utc::now(),
            snapshot,
        });
        self.versions.len() - 1
    }

    /// Record a new draft version and make it current. Any redo tail is
    /// discarded from the timeline.
    pub fn commit(&mut self, snapshot: LayoutSnapshot, notes: Option<String>) -> &LayoutVersion {
        self.timeline.truncate(self.cursor + 1);
        let index = self.push_version(snapshot, notes);
        self.timeline.push(index);

        if self.timeline.len() > MAX_HISTORY_DEPTH + 1 {
            let excess = self.timeline.len() - (MAX_HISTORY_DEPTH + 1);
            self.timeline.drain(..excess);
        }
        self.cursor = self.timeline.len() - 1;

        let version = &self.versions[index];
        tracing::debug!(
            layout_id = %self.layout_id,
            version_number = version.version_number,
            "Layout version committed"
        );
        version
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.timeline.len()
    }

    /// Step back one version. Returns the snapshot that is now current.
    pub fn undo(&mut self) -> Option<&LayoutSnapshot> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(&self.current().snapshot)
    }

    /// Step forward one version. Returns the snapshot that is now current.
    pub fn redo(&mut self) -> Option<&LayoutSnapshot> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(&self.current().snapshot)
    }

    pub fn current(&self) -> &LayoutVersion {
        &self.versions[self.timeline[self.cursor]]
    }

    /// Every version ever committed, oldest first.
    pub fn versions(&self) -> &[LayoutVersion] {
        &self.versions
    }

    pub fn get(&self, id: Uuid) -> Option<&LayoutVersion> {
        self.versions.iter().find(|v| v.id == id)
    }

    pub fn published(&self) -> Option<&LayoutVersion> {
        self.versions
            .iter()
            .find(|v| v.status == VersionStatus::Published)
    }

    /// Whether publishing `id` would change anything. Used before the
    /// remote call so a repeat publish never reaches the server.
    pub fn publish_required(&self, id: Uuid) -> Result<bool, CoreError> {
        let version = self
            .get(id)
            .ok_or_else(|| CoreError::not_found("LayoutVersion", id.to_string()))?;
        Ok(version.status != VersionStatus::Published)
    }

    /// Publish `id`, archiving the previously published version in the same
    /// step. Publishing an already published version is a no-op.
    pub fn apply_publish(&mut self, id: Uuid, notes: Option<String>) -> Result<PublishOutcome, CoreError> {
        let target = self
            .versions
            .iter()
            .position(|v| v.id == id)
            .ok_or_else(|| CoreError::not_found("LayoutVersion", id.to_string()))?;

        if self.versions[target].status == VersionStatus::Published {
            return Ok(PublishOutcome::AlreadyPublished);
        }

        let previous = self
            .versions
            .iter()
            .position(|v| v.status == VersionStatus::Published);
        let archived = previous.map(|i| {
            self.versions[i].status = VersionStatus::Archived;
            self.versions[i].id
        });

        let version = &mut self.versions[target];
        version.status = VersionStatus::Published;
        if notes.is_some() {
            version.notes = notes;
        }

        tracing::info!(
            layout_id = %self.layout_id,
            version_number = version.version_number,
            archived = ?archived,
            "Layout version published"
        );
        Ok(PublishOutcome::Published { archived })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Card;
    use assert_matches::assert_matches;

    fn snap(x: f64) -> LayoutSnapshot {
        LayoutSnapshot {
            cards: vec![Card::new("c", x, 0.0, 10.0, 10.0)],
            groups: Vec::new(),
        }
    }

    fn x_of(s: &LayoutSnapshot) -> f64 {
        s.cards[0].x
    }

    #[test]
    fn undo_twice_returns_to_first_op() {
        let mut h = LayoutHistory::new("dash", snap(0.0));
        h.commit(snap(1.0), None); // A
        h.commit(snap(2.0), None); // B
        h.commit(snap(3.0), None); // C

        h.undo();
        let after = h.undo().map(x_of);
        assert_eq!(after, Some(1.0));
        assert_eq!(x_of(&h.current().snapshot), 1.0);
    }

    #[test]
    fn new_commit_truncates_redo() {
        let mut h = LayoutHistory::new("dash", snap(0.0));
        h.commit(snap(1.0), None);
        h.commit(snap(2.0), None);
        h.undo();
        assert!(h.can_redo());

        h.commit(snap(9.0), None); // D
        assert!(!h.can_redo());
        assert!(h.redo().is_none());
        assert_eq!(x_of(&h.current().snapshot), 9.0);
        // The undone version is still on record.
        assert_eq!(h.versions().len(), 4);
    }

    #[test]
    fn version_numbers_increase() {
        let mut h = LayoutHistory::new("dash", snap(0.0));
        let n1 = h.commit(snap(1.0), None).version_number;
        h.undo();
        let n2 = h.commit(snap(2.0), None).version_number;
        assert!(n2 > n1);
    }

    #[test]
    fn timeline_is_capped_but_records_are_kept() {
        let mut h = LayoutHistory::new("dash", snap(0.0));
        for i in 1..=(MAX_HISTORY_DEPTH + 20) {
            h.commit(snap(i as f64), None);
        }
        let mut steps = 0;
        while h.undo().is_some() {
            steps += 1;
        }
        assert_eq!(steps, MAX_HISTORY_DEPTH);
        assert_eq!(h.versions().len(), MAX_HISTORY_DEPTH + 21);
    }

    #[test]
    fn publish_archives_previous() {
        let mut h = LayoutHistory::new("dash", snap(0.0));
        let v1 = h.current().id;
        let v2 = h.commit(snap(1.0), None).id;

        assert_eq!(
            h.apply_publish(v1, None).unwrap(),
            PublishOutcome::Published { archived: None }
        );
        assert_eq!(
            h.apply_publish(v2, Some("go live".into())).unwrap(),
            PublishOutcome::Published { archived: Some(v1) }
        );
        assert_eq!(h.get(v1).unwrap().status, VersionStatus::Archived);
        assert_eq!(h.published().unwrap().id, v2);
        assert_eq!(h.get(v2).unwrap().notes.as_deref(), Some("go live"));
    }

    #[test]
    fn publish_twice_is_a_no_op() {
        let mut h = LayoutHistory::new("dash", snap(0.0));
        let v1 = h.current().id;
        let v2 = h.commit(snap(1.0), None).id;
        h.apply_publish(v1, None).unwrap();
        h.apply_publish(v2, None).unwrap();
        let once: Vec<_> = h.versions().iter().map(|v| v.status).collect();

        assert_eq!(h.apply_publish(v2, None).unwrap(), PublishOutcome::AlreadyPublished);
        let twice: Vec<_> = h.versions().iter().map(|v| v.status).collect();
        assert_eq!(once, twice);
        assert!(!h.publish_required(v2).unwrap());
    }

    #[test]
    fn publish_unknown_version_is_not_found() {
        let mut h = LayoutHistory::new("dash", snap(0.0));
        assert_matches!(
            h.apply_publish(Uuid::new_v4(), None),
            Err(CoreError::NotFound { entity: "LayoutVersion", .. })
        );
    }

    #[test]
    fn at_most_one_published() {
        let mut h = LayoutHistory::new("dash", snap(0.0));
        let ids: Vec<Uuid> = (1..5).map(|i| h.commit(snap(i as f64), None).id).collect();
        for id in &ids {
            h.apply_publish(*id, None).unwrap();
        }
        let published = h
            .versions()
            .iter()
            .filter(|v| v.status == VersionStatus::Published)
            .count();
        assert_eq!(published, 1);
    }

    #[test]
    fn stored_history_reloads_at_the_same_cursor() {
        let mut h = LayoutHistory::new("dash", snap(0.0));
        h.commit(snap(1.0), None);
        h.commit(snap(2.0), None);
        h.undo();

        let json = serde_json::to_string(&h).unwrap();
        let reloaded: LayoutHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(x_of(&reloaded.current().snapshot), 1.0);
        assert!(reloaded.can_redo());
    }

    #[test]
    fn inconsistent_stored_history_is_rejected() {
        let h = LayoutHistory::new("dash", snap(0.0));
        let mut value = serde_json::to_value(&h).unwrap();

        value["cursor"] = serde_json::json!(3);
        assert!(serde_json::from_value::<LayoutHistory>(value.clone()).is_err());

        value["cursor"] = serde_json::json!(0);
        value["timeline"] = serde_json::json!([]);
        assert!(serde_json::from_value::<LayoutHistory>(value.clone()).is_err());

        value["timeline"] = serde_json::json!([7]);
        assert!(serde_json::from_value::<LayoutHistory>(value).is_err());
    }
}
