//! Grid packing and auto-arrangement of cards.
//!
//! [`pack_minimized_cards`] runs once per layout load and re-packs
//! minimised cards into a dense non-overlapping grid, preferring to leave
//! cards that already sit on a free cell where they are.
//! [`auto_arrange`] reflows every card into rows.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::card::CardStore;
use crate::grid::{GridCell, GridMetrics};
use crate::types::{CardId, Point};

/// Gap between cards when auto-arranging.
pub const AUTO_ARRANGE_GUTTER: f64 = 20.0;

/// A card moved by a packing pass. Callers persist these remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRelocation {
    pub card_id: CardId,
    pub from: Point,
    pub to: Point,
}

/// Re-pack minimised cards into row-major grid cells.
///
/// Cards are visited in id order. A pass first claims the cells of cards
/// already sitting on a valid, unclaimed cell (column below
/// `cards_per_row`); the remaining cards are then assigned the next
/// free slot in row-major order.
pub fn pack_minimized_cards(
    store: &mut CardStore,
    metrics: &GridMetrics,
    cards_per_row: usize,
) -> Vec<CardRelocation> {
    let per_row = cards_per_row.max(1);
    let mut ids = store.minimized_ids();
    ids.sort();

    let mut claimed: HashSet<GridCell> = HashSet::new();
    let mut settled: HashSet<CardId> = HashSet::new();

    for id in &ids {
        let Some(card) = store.get(id) else { continue };
        if let Some(cell) = metrics.cell_at(card.x, card.y) {
            if (cell.col as usize) < per_row && claimed.insert(cell) {
                settled.insert(id.clone());
            }
        }
    }

    let mut relocations = Vec::new();
    let mut slot = 0usize;
    for id in ids.iter().filter(|id| !settled.contains(*id)) {
        let cell = loop {
            let candidate = GridCell::from_slot(slot, per_row);
            slot += 1;
            if !claimed.contains(&candidate) {
                break candidate;
            }
        };
        claimed.insert(cell);

        let Some(card) = store.get(id) else { continue };
        let target = metrics.cell_to_pixels(cell);
        if store.update_card_position(id, target.x, target.y).is_some() {
            relocations.push(CardRelocation {
                card_id: id.clone(),
                from: card.position(),
                to: target,
            });
        }
    }

    tracing::debug!(
        minimized = ids.len(),
        kept = settled.len(),
        moved = relocations.len(),
        "Packed minimised cards",
    );
    relocations
}

/// Reflow every card (minimised or not) into rows of `cards_per_row`,
/// ordered by id. Each row is as tall as its tallest card.
///
/// Only cards whose position actually changes are reported.
pub fn auto_arrange(
    store: &mut CardStore,
    metrics: &GridMetrics,
    cards_per_row: usize,
) -> Vec<CardRelocation> {
    let per_row = cards_per_row.max(1);
    let cards: Vec<_> = store.iter().collect();

    let mut relocations = Vec::new();
    let mut y = metrics.start_y;
    for row in cards.chunks(per_row) {
        let mut x = metrics.start_x;
        let mut row_height: f64 = 0.0;
        for card in row {
            let target = Point::new(x, y);
            if card.position() != target && store.update_card_position(&card.id, x, y).is_some() {
                relocations.push(CardRelocation {
                    card_id: card.id.clone(),
                    from: card.position(),
                    to: target,
                });
            }
            x += card.width + AUTO_ARRANGE_GUTTER;
            row_height = row_height.max(card.height);
        }
        y += row_height + AUTO_ARRANGE_GUTTER;
    }
    relocations
}

/// Every pair of cards whose rectangles overlap, as `(lower_id, higher_id)`.
pub fn find_overlaps(store: &CardStore) -> Vec<(CardId, CardId)> {
    let cards: Vec<_> = store.iter().collect();
    let mut pairs = Vec::new();
    for (i, a) in cards.iter().enumerate() {
        for b in &cards[i + 1..] {
            if a.rect().intersects(&b.rect()) {
                pairs.push((a.id.clone(), b.id.clone()));
            }
        }
    }
    pairs
}
