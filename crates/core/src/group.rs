//! Card groups: named, coloured collections moved and locked as a unit.
//!
//! The group store does not know about card deletion or validation; those
//! live on [`LayoutState`](crate::layout::LayoutState). Membership changes
//! here do not recompute bounds: callers batch their membership edits and
//! then call [`GroupStore::recompute_bounds`] once.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::card::CardStore;
use crate::error::CoreError;
use crate::types::{CardId, GroupId, Point, Rect};

/// Space between the outermost member cards and the group border.
pub const GROUP_PADDING: f64 = 15.0;

/// Height of the group header band. Pointer-downs inside it are reserved
/// for header controls and never start a drag.
pub const GROUP_HEADER_HEIGHT: f64 = 40.0;

/// Maximum allowed length of a group name (after trimming).
pub const MAX_GROUP_NAME_LENGTH: usize = 80;

// ---------------------------------------------------------------------------
// Colour palette
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupColor {
    #[default]
    Blue,
    Green,
    Purple,
    Orange,
    Red,
    Teal,
    Pink,
    Gray,
}

impl GroupColor {
    pub const ALL: [GroupColor; 8] = [
        GroupColor::Blue,
        GroupColor::Green,
        GroupColor::Purple,
        GroupColor::Orange,
        GroupColor::Red,
        GroupColor::Teal,
        GroupColor::Pink,
        GroupColor::Gray,
    ];
}

// ---------------------------------------------------------------------------
// Membership serialization boundary
// ---------------------------------------------------------------------------

/// Set <-> array conversion for group membership.
///
/// Sets serialize as sorted arrays. An array containing the same id twice
/// is malformed and rejected rather than silently collapsed.
pub mod membership {
    use std::collections::BTreeSet;

    use serde::{Deserialize, Deserializer, Serializer};

    use crate::error::CoreError;
    use crate::types::CardId;

    pub fn to_array(set: &BTreeSet<CardId>) -> Vec<CardId> {
        set.iter().cloned().collect()
    }

    pub fn from_array(ids: Vec<CardId>) -> Result<BTreeSet<CardId>, CoreError> {
        let mut set = BTreeSet::new();
        for id in ids {
            if set.contains(&id) {
                return Err(CoreError::Validation(format!(
                    "Duplicate card id '{id}' in group membership"
                )));
            }
            set.insert(id);
        }
        Ok(set)
    }

    pub fn serialize<S: Serializer>(set: &BTreeSet<CardId>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(set.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<CardId>, D::Error> {
        let ids = Vec::<CardId>::deserialize(d)?;
        from_array(ids).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub color: GroupColor,
    #[serde(with = "membership")]
    pub card_ids: BTreeSet<CardId>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
}

fn default_true() -> bool {
    true
}

impl Group {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    fn set_bounds(&mut self, r: Rect) {
        self.x = r.x;
        self.y = r.y;
        self.width = r.width;
        self.height = r.height;
    }

    /// Whether `p` lies inside the header band at the top of the group.
    pub fn header_contains(&self, p: Point) -> bool {
        p.x >= self.x
            && p.x <= self.x + self.width
            && p.y >= self.y
            && p.y < self.y + GROUP_HEADER_HEIGHT
    }
}

/// Shallow partial update for a group. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<GroupColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
}

impl GroupPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none() && self.visible.is_none() && self.locked.is_none()
    }
}

/// Bounding box of the given card rectangles before padding.
pub fn member_extent<I: IntoIterator<Item = Rect>>(rects: I) -> Option<Rect> {
    Rect::union_all(rects)
}

/// Group bounds for the given member rectangles: their extent grown by
/// [`GROUP_PADDING`] on every side.
pub fn compute_group_bounds<I: IntoIterator<Item = Rect>>(rects: I) -> Option<Rect> {
    member_extent(rects).map(|r| r.expand(GROUP_PADDING))
}

/// Validate a group name, returning the trimmed form.
pub fn validate_group_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Group name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_GROUP_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Group name must not exceed {MAX_GROUP_NAME_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Map of group id to group. Serializes as an array of groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Group>", into = "Vec<Group>")]
pub struct GroupStore {
    groups: BTreeMap<GroupId, Group>,
}

impl From<Vec<Group>> for GroupStore {
    fn from(groups: Vec<Group>) -> Self {
        Self {
            groups: groups.into_iter().map(|g| (g.id.clone(), g)).collect(),
        }
    }
}

impl From<GroupStore> for Vec<Group> {
    fn from(store: GroupStore) -> Self {
        store.groups.into_values().collect()
    }
}

impl GroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a group from `card_ids` and return its generated id.
    ///
    /// Bounds are derived from whichever of the ids exist in `cards`.
    /// The name is trimmed but not otherwise validated here.
    pub fn create_group<I>(
        &mut self,
        name: &str,
        card_ids: I,
        cards: &CardStore,
        color: Option<GroupColor>,
    ) -> GroupId
    where
        I: IntoIterator<Item = CardId>,
    {
        let card_ids: BTreeSet<CardId> = card_ids.into_iter().collect();
        let bounds = compute_group_bounds(card_ids.iter().filter_map(|id| cards.rect(id)))
            .unwrap_or_default();

        let id = uuid::Uuid::new_v4().to_string();
        let group = Group {
            id: id.clone(),
            name: name.trim().to_string(),
            color: color.unwrap_or_default(),
            card_ids,
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            visible: true,
            locked: false,
        };
        tracing::debug!(group_id = %id, members = group.card_ids.len(), "Group created");
        self.groups.insert(id.clone(), group);
        id
    }

    /// Insert a fully-formed group (replay, restore). Replaces any group
    /// with the same id.
    pub fn insert(&mut self, group: Group) {
        self.groups.insert(group.id.clone(), group);
    }

    pub fn get(&self, id: &str) -> Option<&Group> {
        self.groups.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.groups.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// The group containing `card_id`, if any.
    pub fn group_of(&self, card_id: &str) -> Option<&Group> {
        self.groups.values().find(|g| g.card_ids.contains(card_id))
    }

    /// Shallow-merge `patch` into the group. Returns `false` if unknown.
    pub fn update_group(&mut self, id: &str, patch: &GroupPatch) -> bool {
        let Some(group) = self.groups.get_mut(id) else {
            tracing::warn!(group_id = %id, "Update requested for unknown group");
            return false;
        };
        if let Some(name) = &patch.name {
            group.name = name.trim().to_string();
        }
        if let Some(color) = patch.color {
            group.color = color;
        }
        if let Some(visible) = patch.visible {
            group.visible = visible;
        }
        if let Some(locked) = patch.locked {
            group.locked = locked;
        }
        true
    }

    /// Remove the group record only; member cards are untouched.
    pub fn ungroup_cards(&mut self, id: &str) -> Option<Group> {
        let removed = self.groups.remove(id);
        if removed.is_none() {
            tracing::warn!(group_id = %id, "Ungroup requested for unknown group");
        }
        removed
    }

    /// Set-union the given ids into the group's membership.
    pub fn add_cards_to_group<I>(&mut self, id: &str, card_ids: I) -> bool
    where
        I: IntoIterator<Item = CardId>,
    {
        let Some(group) = self.groups.get_mut(id) else {
            tracing::warn!(group_id = %id, "Add-cards requested for unknown group");
            return false;
        };
        group.card_ids.extend(card_ids);
        true
    }

    /// Set-difference the given ids out of the group's membership.
    pub fn remove_cards_from_group<'a, I>(&mut self, id: &str, card_ids: I) -> bool
    where
        I: IntoIterator<Item = &'a CardId>,
    {
        let Some(group) = self.groups.get_mut(id) else {
            tracing::warn!(group_id = %id, "Remove-cards requested for unknown group");
            return false;
        };
        for card_id in card_ids {
            group.card_ids.remove(card_id);
        }
        true
    }

    /// Drop the given card ids from every group (after the cards are deleted).
    pub fn forget_cards<'a, I>(&mut self, card_ids: I)
    where
        I: IntoIterator<Item = &'a CardId>,
    {
        let ids: Vec<&CardId> = card_ids.into_iter().collect();
        for group in self.groups.values_mut() {
            for id in &ids {
                group.card_ids.remove(*id);
            }
        }
    }

    /// Recompute a group's bounds from its members' current rectangles.
    ///
    /// A group whose members are all gone keeps its previous bounds.
    pub fn recompute_bounds(&mut self, id: &str, cards: &CardStore) -> Option<Rect> {
        let Some(group) = self.groups.get_mut(id) else {
            tracing::warn!(group_id = %id, "Bounds recompute for unknown group");
            return None;
        };
        if let Some(bounds) = compute_group_bounds(group.card_ids.iter().filter_map(|c| cards.rect(c))) {
            group.set_bounds(bounds);
        }
        Some(group.bounds())
    }

    /// Move a group's box without touching its members.
    pub fn set_origin(&mut self, id: &str, origin: Point) -> bool {
        let Some(group) = self.groups.get_mut(id) else {
            tracing::warn!(group_id = %id, "Move requested for unknown group");
            return false;
        };
        group.x = origin.x;
        group.y = origin.y;
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
