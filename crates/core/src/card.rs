//! Card records and the authoritative in-memory card store.
//!
//! Mutators never fail loudly: an unknown id or a malformed value logs a
//! warning and leaves the store untouched. The return value tells the
//! caller whether anything was applied.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::grid::{MINIMIZED_HEIGHT, MINIMIZED_WIDTH};
use crate::types::{CardId, Point, Rect, Size};
use crate::versioned::Versioned;

/// Size every minimised card is forced to.
pub const MINIMIZED_SIZE: Size = Size::new(MINIMIZED_WIDTH, MINIMIZED_HEIGHT);

// ---------------------------------------------------------------------------
// Card
// ---------------------------------------------------------------------------

/// A positioned rectangular dashboard card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub minimized: bool,
    #[serde(default)]
    pub z_index: i32,
    /// Size to restore when a minimised card is expanded again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_size: Option<Size>,
}

impl Card {
    pub fn new(id: impl Into<CardId>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            width,
            height,
            minimized: false,
            z_index: 0,
            expanded_size: None,
        }
    }

    /// Builder: mark the card minimised, remembering its current size.
    pub fn minimized(mut self) -> Self {
        if !self.minimized {
            self.expanded_size = Some(self.size());
            self.width = MINIMIZED_WIDTH;
            self.height = MINIMIZED_HEIGHT;
            self.minimized = true;
        }
        self
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CardSlot {
    position: Versioned<Point>,
    size: Versioned<Size>,
    minimized: bool,
    z_index: i32,
    expanded_size: Option<Size>,
}

impl CardSlot {
    fn to_card(&self, id: &CardId) -> Card {
        Card {
            id: id.clone(),
            x: self.position.value.x,
            y: self.position.value.y,
            width: self.size.value.width,
            height: self.size.value.height,
            minimized: self.minimized,
            z_index: self.z_index,
            expanded_size: self.expanded_size,
        }
    }
}

/// Authoritative map of card id to card state, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct CardStore {
    cards: BTreeMap<CardId, CardSlot>,
}

impl CardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) a card. Returns `false` if the card's size
    /// or position is malformed.
    ///
    /// A card flagged `minimized` is normalised to [`MINIMIZED_SIZE`].
    pub fn insert(&mut self, card: Card) -> bool {
        if !card.position().is_finite() || !card.size().is_valid() {
            tracing::warn!(card_id = %card.id, "Rejecting card with malformed geometry");
            return false;
        }

        let mut size = card.size();
        let mut expanded_size = card.expanded_size;
        if card.minimized && size != MINIMIZED_SIZE {
            expanded_size.get_or_insert(size);
            size = MINIMIZED_SIZE;
        }

        if let Some(slot) = self.cards.get_mut(&card.id) {
            // Re-registration is a local write: versions only move forward.
            if slot.position.value != card.position() {
                slot.position.set_local(card.position());
            }
            if slot.size.value != size {
                slot.size.set_local(size);
            }
            slot.minimized = card.minimized;
            slot.z_index = card.z_index;
            slot.expanded_size = expanded_size;
            return true;
        }

        let slot = CardSlot {
            position: Versioned::new(card.position()),
            size: Versioned::new(size),
            minimized: card.minimized,
            z_index: card.z_index,
            expanded_size,
        };
        self.cards.insert(card.id, slot);
        true
    }

    /// Drop every card whose id is not in `keep`.
    pub fn retain_ids(&mut self, keep: &BTreeSet<&str>) {
        self.cards.retain(|id, _| keep.contains(id.as_str()));
    }

    pub fn remove(&mut self, id: &str) -> Option<Card> {
        let card = self.cards.remove(id).map(|slot| slot.to_card(&id.to_string()));
        if card.is_none() {
            tracing::warn!(card_id = %id, "Remove requested for unknown card");
        }
        card
    }

    /// Remove every listed card; returns how many existed.
    pub fn remove_many<'a, I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'a CardId>,
    {
        ids.into_iter()
            .filter(|id| self.remove(id.as_str()).is_some())
            .count()
    }

    pub fn get(&self, id: &str) -> Option<Card> {
        self.cards.get_key_value(id).map(|(k, slot)| slot.to_card(k))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cards.contains_key(id)
    }

    pub fn rect(&self, id: &str) -> Option<Rect> {
        self.cards.get(id).map(|slot| {
            let p = slot.position.value;
            let s = slot.size.value;
            Rect::new(p.x, p.y, s.width, s.height)
        })
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// All cards in id order.
    pub fn iter(&self) -> impl Iterator<Item = Card> + '_ {
        self.cards.iter().map(|(id, slot)| slot.to_card(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &CardId> {
        self.cards.keys()
    }

    // ---- mutators ----

    /// Optimistically set a card's position. Returns the new local version,
    /// or `None` if nothing was applied.
    pub fn update_card_position(&mut self, id: &str, x: f64, y: f64) -> Option<u64> {
        let target = Point::new(x, y);
        if !target.is_finite() {
            tracing::warn!(card_id = %id, x, y, "Ignoring non-finite card position");
            return None;
        }
        let Some(slot) = self.cards.get_mut(id) else {
            tracing::warn!(card_id = %id, "Position update for unknown card");
            return None;
        };
        Some(slot.position.set_local(target))
    }

    /// Optimistically set a card's size. Minimised cards keep their fixed
    /// size and reject resizes.
    pub fn update_card_size(&mut self, id: &str, width: f64, height: f64) -> Option<u64> {
        let target = Size::new(width, height);
        if !target.is_valid() {
            tracing::warn!(card_id = %id, width, height, "Ignoring invalid card size");
            return None;
        }
        let Some(slot) = self.cards.get_mut(id) else {
            tracing::warn!(card_id = %id, "Size update for unknown card");
            return None;
        };
        if slot.minimized {
            tracing::warn!(card_id = %id, "Ignoring resize of minimised card");
            return None;
        }
        Some(slot.size.set_local(target))
    }

    /// Apply a server-confirmed position unless a newer local write exists.
    pub fn confirm_card_position(&mut self, id: &str, position: Point, based_on: u64) -> bool {
        let Some(slot) = self.cards.get_mut(id) else {
            tracing::warn!(card_id = %id, "Position confirmation for unknown card");
            return false;
        };
        let applied = slot.position.confirm(position, based_on);
        if !applied {
            tracing::debug!(
                card_id = %id,
                based_on,
                local_version = slot.position.local_version,
                "Dropping stale position confirmation",
            );
        }
        applied
    }

    /// Apply a server-confirmed size unless a newer local write exists.
    pub fn confirm_card_size(&mut self, id: &str, size: Size, based_on: u64) -> bool {
        let Some(slot) = self.cards.get_mut(id) else {
            tracing::warn!(card_id = %id, "Size confirmation for unknown card");
            return false;
        };
        if !size.is_valid() {
            tracing::warn!(card_id = %id, "Ignoring invalid confirmed size");
            return false;
        }
        let applied = slot.size.confirm(size, based_on);
        if !applied {
            tracing::debug!(card_id = %id, based_on, "Dropping stale size confirmation");
        }
        applied
    }

    /// Current local version of a card's position.
    pub fn position_version(&self, id: &str) -> Option<u64> {
        self.cards.get(id).map(|slot| slot.position.local_version)
    }

    /// Minimise or restore a card. Returns `true` if the flag changed.
    pub fn set_minimized(&mut self, id: &str, minimized: bool) -> bool {
        let Some(slot) = self.cards.get_mut(id) else {
            tracing::warn!(card_id = %id, "Minimise toggle for unknown card");
            return false;
        };
        if slot.minimized == minimized {
            return false;
        }

        if minimized {
            slot.expanded_size = Some(slot.size.value);
            slot.size.set_local(MINIMIZED_SIZE);
        } else {
            let restored = slot.expanded_size.take().unwrap_or(slot.size.value);
            slot.size.set_local(restored);
        }
        slot.minimized = minimized;
        true
    }

    /// Raise a card above every other card. Returns its new z-index.
    pub fn bring_to_front(&mut self, id: &str) -> Option<i32> {
        let top = self.cards.values().map(|s| s.z_index).max().unwrap_or(0);
        let Some(slot) = self.cards.get_mut(id) else {
            tracing::warn!(card_id = %id, "Bring-to-front for unknown card");
            return None;
        };
        slot.z_index = top.saturating_add(1);
        Some(slot.z_index)
    }

    /// Ids of all minimised cards, sorted.
    pub fn minimized_ids(&self) -> Vec<CardId> {
        self.cards
            .iter()
            .filter(|(_, slot)| slot.minimized)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
