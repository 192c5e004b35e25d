//! Replay-safe layout mutations.
//!
//! Every payload carries absolute values (never deltas), so applying the
//! same mutation twice leaves the layout in the same state. This is what
//! lets the offline queue re-send an entry after a crash or a retry.

use serde::{Deserialize, Serialize};

use crate::card::Card;
use crate::group::{Group, GroupPatch};
use crate::types::{CardId, GroupId};

/// Operation kinds, as stored in the `type` column of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    PutCard,
    SetCardPosition,
    SetCardSize,
    SetCardMinimized,
    CreateGroup,
    UpdateGroup,
    DeleteGroup,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PutCard => "put_card",
            Self::SetCardPosition => "set_card_position",
            Self::SetCardSize => "set_card_size",
            Self::SetCardMinimized => "set_card_minimized",
            Self::CreateGroup => "create_group",
            Self::UpdateGroup => "update_group",
            Self::DeleteGroup => "delete_group",
        }
    }
}

/// The entity a mutation targets; ordering is guaranteed per resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ResourceKey {
    Card(CardId),
    Group(GroupId),
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Card(id) => write!(f, "card:{id}"),
            Self::Group(id) => write!(f, "group:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LayoutMutation {
    /// Create the card, or replace it wholesale if the id already exists.
    PutCard {
        card: Card,
    },
    SetCardPosition {
        card_id: CardId,
        x: f64,
        y: f64,
    },
    SetCardSize {
        card_id: CardId,
        width: f64,
        height: f64,
    },
    SetCardMinimized {
        card_id: CardId,
        minimized: bool,
    },
    /// Create the group, or replace it wholesale if the id already exists.
    CreateGroup {
        group: Group,
    },
    UpdateGroup {
        group_id: GroupId,
        patch: GroupPatch,
    },
    DeleteGroup {
        group_id: GroupId,
        cascade: bool,
    },
}

impl LayoutMutation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::PutCard { .. } => OperationKind::PutCard,
            Self::SetCardPosition { .. } => OperationKind::SetCardPosition,
            Self::SetCardSize { .. } => OperationKind::SetCardSize,
            Self::SetCardMinimized { .. } => OperationKind::SetCardMinimized,
            Self::CreateGroup { .. } => OperationKind::CreateGroup,
            Self::UpdateGroup { .. } => OperationKind::UpdateGroup,
            Self::DeleteGroup { .. } => OperationKind::DeleteGroup,
        }
    }

    pub fn resource(&self) -> ResourceKey {
        match self {
            Self::PutCard { card } => ResourceKey::Card(card.id.clone()),
            Self::SetCardPosition { card_id, .. }
            | Self::SetCardSize { card_id, .. }
            | Self::SetCardMinimized { card_id, .. } => ResourceKey::Card(card_id.clone()),
            Self::CreateGroup { group } => ResourceKey::Group(group.id.clone()),
            Self::UpdateGroup { group_id, .. } | Self::DeleteGroup { group_id, .. } => {
                ResourceKey::Group(group_id.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_keys_render_with_prefix() {
        let m = LayoutMutation::SetCardPosition {
            card_id: "card-1".into(),
            x: 0.0,
            y: 0.0,
        };
        assert_eq!(m.resource().to_string(), "card:card-1");
        assert_eq!(m.kind().as_str(), "set_card_position");

        let d = LayoutMutation::DeleteGroup {
            group_id: "g".into(),
            cascade: true,
        };
        assert_eq!(d.resource(), ResourceKey::Group("g".into()));

        let p = LayoutMutation::PutCard {
            card: Card::new("kpi", 1.0, 2.0, 3.0, 4.0),
        };
        assert_eq!(p.resource().to_string(), "card:kpi");
        assert_eq!(p.kind().as_str(), "put_card");
    }

    #[test]
    fn mutation_json_is_tagged_by_op() {
        let m = LayoutMutation::SetCardSize {
            card_id: "c".into(),
            width: 10.0,
            height: 20.0,
        };
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["op"], "set_card_size");
        assert_eq!(v["width"], 10.0);
    }
}
