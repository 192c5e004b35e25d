//! The layout state container: cards plus groups, and the validated
//! operations that touch both.
//!
//! A [`LayoutState`] is an ordinary value. Nothing here is global, so each
//! test (or each open dashboard) owns its own instance.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::card::{Card, CardStore};
use crate::error::CoreError;
use crate::group::{validate_group_name, Group, GroupColor, GroupPatch, GroupStore};
use crate::mutation::LayoutMutation;
use crate::types::{CardId, GroupId, Rect};

/// Full card + group arrangement, as stored in a layout version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub cards: Vec<Card>,
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, Default)]
pub struct LayoutState {
    pub cards: CardStore,
    pub groups: GroupStore,
}

impl LayoutState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &LayoutSnapshot) -> Self {
        let mut state = Self::new();
        state.restore(snapshot);
        state
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        LayoutSnapshot {
            cards: self.cards.iter().collect(),
            groups: self.groups.iter().cloned().collect(),
        }
    }

    /// Replace the whole arrangement with `snapshot`.
    ///
    /// Cards that survive keep their local versions, so a confirmation
    /// issued before the restore cannot overwrite the restored geometry.
    pub fn restore(&mut self, snapshot: &LayoutSnapshot) {
        let keep: BTreeSet<&str> = snapshot.cards.iter().map(|c| c.id.as_str()).collect();
        self.cards.retain_ids(&keep);
        for card in &snapshot.cards {
            self.cards.insert(card.clone());
        }
        self.groups = GroupStore::from(snapshot.groups.clone());
    }

    // ---- cards ----

    /// Move a card and refresh the bounds of the group that owns it.
    pub fn move_card(&mut self, id: &str, x: f64, y: f64) -> Option<u64> {
        let version = self.cards.update_card_position(id, x, y)?;
        self.refresh_owner_bounds(id);
        Some(version)
    }

    /// Resize a card and refresh the bounds of the group that owns it.
    pub fn resize_card(&mut self, id: &str, width: f64, height: f64) -> Option<u64> {
        let version = self.cards.update_card_size(id, width, height)?;
        self.refresh_owner_bounds(id);
        Some(version)
    }

    pub fn set_card_minimized(&mut self, id: &str, minimized: bool) -> bool {
        let changed = self.cards.set_minimized(id, minimized);
        if changed {
            self.refresh_owner_bounds(id);
        }
        changed
    }

    /// Remove a card, dropping it from its group.
    pub fn remove_card(&mut self, id: &str) -> Option<Card> {
        let card = self.cards.remove(id)?;
        let owner = self.groups.group_of(id).map(|g| g.id.clone());
        if let Some(group_id) = owner {
            self.groups.forget_cards([&card.id]);
            self.groups.recompute_bounds(&group_id, &self.cards);
        }
        Some(card)
    }

    fn refresh_owner_bounds(&mut self, card_id: &str) {
        if let Some(group_id) = self.groups.group_of(card_id).map(|g| g.id.clone()) {
            self.groups.recompute_bounds(&group_id, &self.cards);
        }
    }

    // ---- groups ----

    /// Create a group from existing, ungrouped cards.
    ///
    /// Rejects an empty (after trim) name, an empty selection, unknown
    /// card ids, and cards that already belong to another group.
    pub fn create_group(
        &mut self,
        name: &str,
        card_ids: &[CardId],
        color: Option<GroupColor>,
    ) -> Result<GroupId, CoreError> {
        let name = validate_group_name(name)?;
        if card_ids.is_empty() {
            return Err(CoreError::Validation(
                "A group needs at least one card".to_string(),
            ));
        }
        self.check_groupable(card_ids, None)?;

        let id = self
            .groups
            .create_group(&name, card_ids.iter().cloned(), &self.cards, color);
        tracing::info!(group_id = %id, name = %name, members = card_ids.len(), "Group created");
        Ok(id)
    }

    /// Rename, recolour, lock or hide a group.
    pub fn update_group(&mut self, id: &str, patch: &GroupPatch) -> Result<(), CoreError> {
        if !self.groups.contains(id) {
            return Err(CoreError::not_found("Group", id));
        }
        let mut patch = patch.clone();
        if let Some(name) = &patch.name {
            patch.name = Some(validate_group_name(name)?);
        }
        self.groups.update_group(id, &patch);
        Ok(())
    }

    /// Delete a group together with all of its member cards.
    /// Returns the ids of the cards that were removed.
    pub fn delete_group_cascading(&mut self, id: &str) -> Result<Vec<CardId>, CoreError> {
        let group = self
            .groups
            .ungroup_cards(id)
            .ok_or_else(|| CoreError::not_found("Group", id))?;
        let removed: Vec<CardId> = group
            .card_ids
            .iter()
            .filter(|card_id| self.cards.remove(card_id.as_str()).is_some())
            .cloned()
            .collect();
        tracing::info!(group_id = %id, removed_cards = removed.len(), "Group deleted with cards");
        Ok(removed)
    }

    /// Delete only the group record; member cards stay on the canvas.
    pub fn delete_group_only(&mut self, id: &str) -> Result<Group, CoreError> {
        let group = self
            .groups
            .ungroup_cards(id)
            .ok_or_else(|| CoreError::not_found("Group", id))?;
        tracing::info!(group_id = %id, "Group dissolved");
        Ok(group)
    }

    /// Add cards to a group and recompute its bounds.
    pub fn add_cards_to_group(&mut self, id: &str, card_ids: &[CardId]) -> Result<Rect, CoreError> {
        if !self.groups.contains(id) {
            return Err(CoreError::not_found("Group", id));
        }
        self.check_groupable(card_ids, Some(id))?;
        self.groups.add_cards_to_group(id, card_ids.iter().cloned());
        self.groups
            .recompute_bounds(id, &self.cards)
            .ok_or_else(|| CoreError::not_found("Group", id))
    }

    /// Remove cards from a group and recompute its bounds.
    pub fn remove_cards_from_group(
        &mut self,
        id: &str,
        card_ids: &[CardId],
    ) -> Result<Rect, CoreError> {
        if !self.groups.remove_cards_from_group(id, card_ids) {
            return Err(CoreError::not_found("Group", id));
        }
        self.groups
            .recompute_bounds(id, &self.cards)
            .ok_or_else(|| CoreError::not_found("Group", id))
    }

    /// Every id must name an existing card that is not in a group other
    /// than `target`.
    fn check_groupable(&self, card_ids: &[CardId], target: Option<&str>) -> Result<(), CoreError> {
        for card_id in card_ids {
            if !self.cards.contains(card_id) {
                return Err(CoreError::not_found("Card", card_id.as_str()));
            }
            if let Some(owner) = self.groups.group_of(card_id) {
                if Some(owner.id.as_str()) != target {
                    return Err(CoreError::Validation(format!(
                        "Card '{card_id}' already belongs to group '{}'",
                        owner.name
                    )));
                }
            }
        }
        Ok(())
    }

    // ---- replay ----

    /// Apply a mutation locally. Safe to call repeatedly with the same
    /// mutation. Returns `false` when it referenced unknown entities.
    pub fn apply(&mut self, mutation: &LayoutMutation) -> bool {
        match mutation {
            LayoutMutation::SetCardPosition { card_id, x, y } => {
                self.move_card(card_id, *x, *y).is_some()
            }
            LayoutMutation::SetCardSize {
                card_id,
                width,
                height,
            } => self.resize_card(card_id, *width, *height).is_some(),
            LayoutMutation::SetCardMinimized { card_id, minimized } => {
                self.set_card_minimized(card_id, *minimized);
                self.cards.contains(card_id)
            }
            LayoutMutation::PutCard { card } => {
                let ok = self.cards.insert(card.clone());
                self.refresh_owner_bounds(&card.id);
                ok
            }
            LayoutMutation::CreateGroup { group } => {
                self.groups.insert(group.clone());
                true
            }
            LayoutMutation::UpdateGroup { group_id, patch } => {
                self.groups.update_group(group_id, patch)
            }
            LayoutMutation::DeleteGroup { group_id, cascade } => {
                let Some(group) = self.groups.ungroup_cards(group_id) else {
                    return false;
                };
                if *cascade {
                    self.cards.remove_many(&group.card_ids);
                }
                true
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot diff
// ---------------------------------------------------------------------------

/// Mutations that take the persisted layout from `from` to `to`.
///
/// Cards that only exist in `to` are re-created with
/// [`LayoutMutation::PutCard`] ahead of any group that references them.
/// A group that disappears together with all of its cards becomes a
/// cascading delete. Groups whose membership or bounds changed are
/// re-sent whole via [`LayoutMutation::CreateGroup`].
pub fn diff_snapshots(from: &LayoutSnapshot, to: &LayoutSnapshot) -> Vec<LayoutMutation> {
    let mut out = Vec::new();

    let before: BTreeMap<&str, &Card> = from.cards.iter().map(|c| (c.id.as_str(), c)).collect();
    for card in &to.cards {
        let Some(prev) = before.get(card.id.as_str()) else {
            out.push(LayoutMutation::PutCard { card: card.clone() });
            continue;
        };
        if prev.minimized != card.minimized {
            out.push(LayoutMutation::SetCardMinimized {
                card_id: card.id.clone(),
                minimized: card.minimized,
            });
        }
        if prev.position() != card.position() {
            out.push(LayoutMutation::SetCardPosition {
                card_id: card.id.clone(),
                x: card.x,
                y: card.y,
            });
        }
        if prev.size() != card.size() && !card.minimized {
            out.push(LayoutMutation::SetCardSize {
                card_id: card.id.clone(),
                width: card.width,
                height: card.height,
            });
        }
    }

    let old_groups: BTreeMap<&str, &Group> =
        from.groups.iter().map(|g| (g.id.as_str(), g)).collect();
    let new_ids: BTreeSet<&str> = to.groups.iter().map(|g| g.id.as_str()).collect();

    for group in &to.groups {
        match old_groups.get(group.id.as_str()) {
            None => out.push(LayoutMutation::CreateGroup {
                group: group.clone(),
            }),
            Some(prev) if prev.card_ids != group.card_ids || prev.bounds() != group.bounds() => {
                out.push(LayoutMutation::CreateGroup {
                    group: group.clone(),
                })
            }
            Some(prev) => {
                let patch = GroupPatch {
                    name: (prev.name != group.name).then(|| group.name.clone()),
                    color: (prev.color != group.color).then_some(group.color),
                    visible: (prev.visible != group.visible).then_some(group.visible),
                    locked: (prev.locked != group.locked).then_some(group.locked),
                };
                if !patch.is_empty() {
                    out.push(LayoutMutation::UpdateGroup {
                        group_id: group.id.clone(),
                        patch,
                    });
                }
            }
        }
    }

    let surviving: BTreeSet<&str> = to.cards.iter().map(|c| c.id.as_str()).collect();
    for group in &from.groups {
        if !new_ids.contains(group.id.as_str()) {
            let cascade = !group.card_ids.is_empty()
                && group.card_ids.iter().all(|id| !surviving.contains(id.as_str()));
            out.push(LayoutMutation::DeleteGroup {
                group_id: group.id.clone(),
                cascade,
            });
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;
    use assert_matches::assert_matches;

    fn state() -> LayoutState {
        let mut s = LayoutState::new();
        s.cards.insert(Card::new("X", 100.0, 100.0, 100.0, 100.0));
        s.cards.insert(Card::new("Y", 300.0, 100.0, 100.0, 100.0));
        s.cards.insert(Card::new("Z", 600.0, 600.0, 100.0, 100.0));
        s
    }

    fn ids(list: &[&str]) -> Vec<CardId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cascade_delete_removes_member_cards() {
        let mut s = state();
        let gid = s.create_group("Crew", &ids(&["X", "Y"]), None).unwrap();

        let removed = s.delete_group_cascading(&gid).unwrap();

        assert_eq!(removed, ids(&["X", "Y"]));
        assert!(!s.cards.contains("X"));
        assert!(!s.cards.contains("Y"));
        assert!(s.cards.contains("Z"));
        assert!(s.groups.get(&gid).is_none());
    }

    #[test]
    fn delete_group_only_keeps_cards() {
        let mut s = state();
        let gid = s.create_group("Crew", &ids(&["X", "Y"]), None).unwrap();

        s.delete_group_only(&gid).unwrap();

        assert!(s.cards.contains("X"));
        assert!(s.cards.contains("Y"));
        assert!(s.groups.is_empty());
    }

    #[test]
    fn create_group_rejects_bad_input_without_mutating() {
        let mut s = state();
        assert_matches!(s.create_group("  ", &ids(&["X"]), None), Err(CoreError::Validation(_)));
        assert_matches!(s.create_group("Crew", &[], None), Err(CoreError::Validation(_)));
        assert_matches!(
            s.create_group("Crew", &ids(&["X", "ghost"]), None),
            Err(CoreError::NotFound { entity: "Card", .. })
        );
        assert!(s.groups.is_empty());
    }

    #[test]
    fn card_cannot_join_two_groups() {
        let mut s = state();
        s.create_group("A", &ids(&["X"]), None).unwrap();
        assert_matches!(s.create_group("B", &ids(&["X", "Y"]), None), Err(CoreError::Validation(_)));

        let b = s.create_group("B", &ids(&["Y"]), None).unwrap();
        assert_matches!(s.add_cards_to_group(&b, &ids(&["X"])), Err(CoreError::Validation(_)));
        // Re-adding an existing member is fine.
        assert!(s.add_cards_to_group(&b, &ids(&["Y"])).is_ok());
    }

    #[test]
    fn moving_a_member_refreshes_group_bounds() {
        let mut s = state();
        let gid = s.create_group("Crew", &ids(&["X", "Y"]), None).unwrap();

        s.move_card("Y", 800.0, 100.0).unwrap();

        let bounds = s.groups.get(&gid).unwrap().bounds();
        assert!(bounds.contains_rect(&s.cards.rect("Y").unwrap()));
        assert!(bounds.contains_rect(&s.cards.rect("X").unwrap()));
    }

    #[test]
    fn add_then_remove_recomputes_bounds() {
        let mut s = state();
        let gid = s.create_group("Crew", &ids(&["X"]), None).unwrap();

        let grown = s.add_cards_to_group(&gid, &ids(&["Z"])).unwrap();
        assert!(grown.contains_rect(&s.cards.rect("Z").unwrap()));

        let shrunk = s.remove_cards_from_group(&gid, &ids(&["Z"])).unwrap();
        assert!(!shrunk.contains_rect(&s.cards.rect("Z").unwrap()));
    }

    #[test]
    fn update_group_validates_name() {
        let mut s = state();
        let gid = s.create_group("Crew", &ids(&["X"]), None).unwrap();
        let bad = GroupPatch {
            name: Some("   ".into()),
            ..Default::default()
        };
        assert_matches!(s.update_group(&gid, &bad), Err(CoreError::Validation(_)));
        assert_eq!(s.groups.get(&gid).unwrap().name, "Crew");
        assert_matches!(s.update_group("nope", &GroupPatch::default()), Err(CoreError::NotFound { .. }));
    }

    #[test]
    fn removing_a_card_drops_membership() {
        let mut s = state();
        let gid = s.create_group("Crew", &ids(&["X", "Y"]), None).unwrap();
        s.remove_card("X").unwrap();
        assert_eq!(s.groups.get(&gid).unwrap().card_ids.len(), 1);
    }

    #[test]
    fn apply_is_idempotent() {
        let mut s = state();
        let gid = s.create_group("Crew", &ids(&["X", "Y"]), None).unwrap();
        let mutations = vec![
            LayoutMutation::SetCardPosition {
                card_id: "Z".into(),
                x: 10.0,
                y: 20.0,
            },
            LayoutMutation::UpdateGroup {
                group_id: gid.clone(),
                patch: GroupPatch {
                    locked: Some(true),
                    ..Default::default()
                },
            },
            LayoutMutation::DeleteGroup {
                group_id: gid,
                cascade: true,
            },
        ];

        for m in &mutations {
            s.apply(m);
        }
        let once = s.snapshot();
        for m in &mutations {
            s.apply(m);
        }
        assert_eq!(s.snapshot(), once);
        assert_eq!(s.cards.get("Z").unwrap().position(), Point::new(10.0, 20.0));
        assert_eq!(s.cards.len(), 1);
    }

    #[test]
    fn diff_replays_to_target() {
        let mut s = state();
        let before = s.snapshot();

        let gid = s.create_group("Crew", &ids(&["X", "Y"]), Some(GroupColor::Red)).unwrap();
        s.move_card("Z", 5.0, 5.0);
        s.set_card_minimized("Y", true);
        let after = s.snapshot();

        let mutations = diff_snapshots(&before, &after);
        assert!(mutations
            .iter()
            .any(|m| matches!(m, LayoutMutation::CreateGroup { group } if group.id == gid)));

        let mut replica = LayoutState::from_snapshot(&before);
        for m in &mutations {
            replica.apply(m);
        }
        assert_eq!(replica.snapshot(), after);
    }

    #[test]
    fn diff_of_flag_change_is_a_patch() {
        let mut s = state();
        let gid = s.create_group("Crew", &ids(&["X"]), None).unwrap();
        let before = s.snapshot();
        s.update_group(&gid, &GroupPatch { visible: Some(false), ..Default::default() }).unwrap();

        let mutations = diff_snapshots(&before, &s.snapshot());
        assert_eq!(
            mutations,
            vec![LayoutMutation::UpdateGroup {
                group_id: gid,
                patch: GroupPatch { visible: Some(false), ..Default::default() },
            }]
        );
    }

    #[test]
    fn diff_of_removed_group_is_non_cascading_delete() {
        let mut s = state();
        let gid = s.create_group("Crew", &ids(&["X"]), None).unwrap();
        let before = s.snapshot();
        s.delete_group_only(&gid).unwrap();

        assert_eq!(
            diff_snapshots(&before, &s.snapshot()),
            vec![LayoutMutation::DeleteGroup { group_id: gid, cascade: false }]
        );
    }

    #[test]
    fn diff_across_cascading_delete_recreates_cards() {
        let mut s = state();
        let gid = s.create_group("Crew", &ids(&["X", "Y"]), None).unwrap();
        let grouped = s.snapshot();
        s.delete_group_cascading(&gid).unwrap();
        let deleted = s.snapshot();

        let forward = diff_snapshots(&grouped, &deleted);
        assert_eq!(
            forward,
            vec![LayoutMutation::DeleteGroup { group_id: gid.clone(), cascade: true }]
        );

        let back = diff_snapshots(&deleted, &grouped);
        let puts: Vec<_> = back
            .iter()
            .filter_map(|m| match m {
                LayoutMutation::PutCard { card } => Some(card.id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(puts, vec!["X", "Y"]);
        assert_matches!(back.last(), Some(LayoutMutation::CreateGroup { group }) if group.id == gid);

        let mut replica = LayoutState::from_snapshot(&deleted);
        for m in &back {
            assert!(replica.apply(m));
        }
        assert_eq!(replica.snapshot(), grouped);
    }

    #[test]
    fn restore_keeps_card_versions_monotonic() {
        let mut s = state();
        let before = s.snapshot();
        let v1 = s.move_card("Z", 500.0, 500.0).unwrap();

        s.restore(&before);
        assert!(s.cards.position_version("Z").unwrap() > v1);
        assert!(!s.cards.confirm_card_position("Z", Point::new(500.0, 500.0), v1));
        assert_eq!(s.cards.get("Z").unwrap().position(), before.cards[2].position());
    }
}
