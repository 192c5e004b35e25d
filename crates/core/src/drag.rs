//! Drag and resize controllers for single cards and whole groups.
//!
//! Each controller is a two-state machine (idle / dragging). While
//! dragging, pointer moves are only recorded; the store is written from
//! [`on_frame`](CardDragController::on_frame), at most once per tick,
//! with the candidate position clamped to the visible canvas.
//! After [`end`](CardDragController::end) no further writes happen.

use crate::coalesce::FrameCoalescer;
use crate::group::GROUP_PADDING;
use crate::layout::LayoutState;
use crate::types::{CardId, GroupId, Point, Rect, Size};

/// Smallest width or height a resize may produce.
pub const MIN_CARD_DIMENSION: f64 = 1.0;

// ---------------------------------------------------------------------------
// Canvas bounds
// ---------------------------------------------------------------------------

/// Visible canvas in screen pixels plus the current zoom factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasBounds {
    pub width: f64,
    pub height: f64,
    pub zoom: f64,
}

impl CanvasBounds {
    pub fn new(width: f64, height: f64, zoom: f64) -> Self {
        Self {
            width,
            height,
            zoom,
        }
    }

    /// Canvas size in logical (unzoomed) coordinates.
    ///
    /// A non-positive or non-finite zoom is treated as `1.0`.
    pub fn logical_size(&self) -> Size {
        let zoom = if self.zoom.is_finite() && self.zoom > 0.0 {
            self.zoom
        } else {
            1.0
        };
        Size::new(self.width / zoom, self.height / zoom)
    }
}

fn clamp_axis(value: f64, min: f64, max: f64) -> f64 {
    if max < min {
        min
    } else {
        value.clamp(min, max)
    }
}

/// Clamp a rectangle's origin so the rectangle stays on the canvas.
/// Items larger than the canvas are pinned to the top-left edge.
pub fn clamp_to_canvas(origin: Point, size: Size, canvas: &CanvasBounds) -> Point {
    let logical = canvas.logical_size();
    Point::new(
        clamp_axis(origin.x, 0.0, logical.width - size.width),
        clamp_axis(origin.y, 0.0, logical.height - size.height),
    )
}

// ---------------------------------------------------------------------------
// Single card drag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CardDragSession {
    card_id: CardId,
    start_pointer: Point,
    initial: Point,
    size: Size,
}

#[derive(Debug, Default)]
pub struct CardDragController {
    session: Option<CardDragSession>,
    frames: FrameCoalescer<Point>,
}

impl CardDragController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer-down on a card body. Returns `false` (staying idle) for an
    /// unknown card or a card whose group is locked.
    pub fn begin(&mut self, state: &LayoutState, card_id: &str, pointer: Point) -> bool {
        let Some(card) = state.cards.get(card_id) else {
            tracing::warn!(card_id = %card_id, "Drag started on unknown card");
            return false;
        };
        if state.groups.group_of(card_id).is_some_and(|g| g.locked) {
            tracing::debug!(card_id = %card_id, "Card is in a locked group, not dragging");
            return false;
        }
        if !pointer.is_finite() {
            return false;
        }

        self.frames.clear();
        self.session = Some(CardDragSession {
            card_id: card.id.clone(),
            start_pointer: pointer,
            initial: card.position(),
            size: card.size(),
        });
        true
    }

    pub fn pointer_move(&mut self, pointer: Point) {
        if self.session.is_some() && pointer.is_finite() {
            self.frames.push(pointer);
        }
    }

    /// Apply the latest pointer position. Returns the position written,
    /// or `None` when idle, nothing is pending, or the card would not move.
    pub fn on_frame(&mut self, state: &mut LayoutState, canvas: &CanvasBounds) -> Option<Point> {
        let session = self.session.as_ref()?;
        let pointer = self.frames.take()?;

        let candidate = session.initial + (pointer - session.start_pointer);
        let target = clamp_to_canvas(candidate, session.size, canvas);

        let current = state.cards.get(&session.card_id)?.position();
        if current == target {
            return None;
        }
        state.move_card(&session.card_id, target.x, target.y)?;
        Some(target)
    }

    /// Pointer-up. Returns the card that was being dragged.
    pub fn end(&mut self) -> Option<CardId> {
        self.frames.clear();
        self.session.take().map(|s| s.card_id)
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }
}

// ---------------------------------------------------------------------------
// Single card resize
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ResizeSession {
    card_id: CardId,
    start_pointer: Point,
    origin: Point,
    initial: Size,
}

/// Resize from the bottom-right handle.
#[derive(Debug, Default)]
pub struct CardResizeController {
    session: Option<ResizeSession>,
    frames: FrameCoalescer<Point>,
}

impl CardResizeController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimised cards and cards in locked groups cannot be resized.
    pub fn begin(&mut self, state: &LayoutState, card_id: &str, pointer: Point) -> bool {
        let Some(card) = state.cards.get(card_id) else {
            tracing::warn!(card_id = %card_id, "Resize started on unknown card");
            return false;
        };
        if card.minimized || state.groups.group_of(card_id).is_some_and(|g| g.locked) {
            return false;
        }
        if !pointer.is_finite() {
            return false;
        }

        self.frames.clear();
        self.session = Some(ResizeSession {
            card_id: card.id.clone(),
            start_pointer: pointer,
            origin: card.position(),
            initial: card.size(),
        });
        true
    }

    pub fn pointer_move(&mut self, pointer: Point) {
        if self.session.is_some() && pointer.is_finite() {
            self.frames.push(pointer);
        }
    }

    /// Apply the latest pointer position as a new size, clamped to
    /// [`MIN_CARD_DIMENSION`] and to the canvas edge.
    pub fn on_frame(&mut self, state: &mut LayoutState, canvas: &CanvasBounds) -> Option<Size> {
        let session = self.session.as_ref()?;
        let pointer = self.frames.take()?;

        let delta = pointer - session.start_pointer;
        let logical = canvas.logical_size();
        let target = Size::new(
            clamp_axis(
                session.initial.width + delta.x,
                MIN_CARD_DIMENSION,
                logical.width - session.origin.x,
            ),
            clamp_axis(
                session.initial.height + delta.y,
                MIN_CARD_DIMENSION,
                logical.height - session.origin.y,
            ),
        );

        let current = state.cards.get(&session.card_id)?.size();
        if current == target {
            return None;
        }
        state.resize_card(&session.card_id, target.width, target.height)?;
        Some(target)
    }

    pub fn end(&mut self) -> Option<CardId> {
        self.frames.clear();
        self.session.take().map(|s| s.card_id)
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }
}

// ---------------------------------------------------------------------------
// Group drag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct GroupDragSession {
    group_id: GroupId,
    start_pointer: Point,
    initial_bounds: Rect,
    members: Vec<(CardId, Rect)>,
}

#[derive(Debug, Default)]
pub struct GroupDragController {
    session: Option<GroupDragSession>,
    frames: FrameCoalescer<Point>,
}

impl GroupDragController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer-down on a group. Only the border area below the header
    /// starts a drag; locked groups never do.
    pub fn begin(&mut self, state: &LayoutState, group_id: &str, pointer: Point) -> bool {
        let Some(group) = state.groups.get(group_id) else {
            tracing::warn!(group_id = %group_id, "Drag started on unknown group");
            return false;
        };
        if group.locked {
            tracing::debug!(group_id = %group_id, "Group is locked, not dragging");
            return false;
        }
        if !pointer.is_finite() || !group.bounds().contains_point(pointer) {
            return false;
        }
        if group.header_contains(pointer) {
            return false;
        }

        let members = group
            .card_ids
            .iter()
            .filter_map(|id| state.cards.rect(id).map(|r| (id.clone(), r)))
            .collect();

        self.frames.clear();
        self.session = Some(GroupDragSession {
            group_id: group.id.clone(),
            start_pointer: pointer,
            initial_bounds: group.bounds(),
            members,
        });
        true
    }

    pub fn pointer_move(&mut self, pointer: Point) {
        if self.session.is_some() && pointer.is_finite() {
            self.frames.push(pointer);
        }
    }

    /// Move the group box and every member by the same clamped delta.
    /// Returns the new group origin, or `None` if nothing moved.
    pub fn on_frame(&mut self, state: &mut LayoutState, canvas: &CanvasBounds) -> Option<Point> {
        let session = self.session.as_ref()?;
        let pointer = self.frames.take()?;

        let initial = session.initial_bounds;
        let size = Size::new(initial.width, initial.height);
        let candidate = initial.origin() + (pointer - session.start_pointer);
        let origin = clamp_to_canvas(candidate, size, canvas);

        let current = state.groups.get(&session.group_id)?.bounds().origin();
        if current == origin {
            return None;
        }

        let applied = origin - initial.origin();
        let new_box = Rect::new(origin.x, origin.y, initial.width, initial.height);
        let logical = canvas.logical_size();

        for (card_id, rect) in &session.members {
            let target = Point::new(rect.x + applied.x, rect.y + applied.y);
            let min_x = (new_box.x + GROUP_PADDING).max(0.0);
            let max_x = (new_box.right() - GROUP_PADDING - rect.width).min(logical.width - rect.width);
            let min_y = (new_box.y + GROUP_PADDING).max(0.0);
            let max_y =
                (new_box.bottom() - GROUP_PADDING - rect.height).min(logical.height - rect.height);
            let clamped = Point::new(
                clamp_axis(target.x, min_x, max_x),
                clamp_axis(target.y, min_y, max_y),
            );
            state.cards.update_card_position(card_id, clamped.x, clamped.y);
        }
        state.groups.set_origin(&session.group_id, origin);
        Some(origin)
    }

    /// Pointer-up. Returns the group id and the member ids that moved with it.
    pub fn end(&mut self) -> Option<(GroupId, Vec<CardId>)> {
        self.frames.clear();
        self.session
            .take()
            .map(|s| (s.group_id, s.members.into_iter().map(|(id, _)| id).collect()))
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
