//! Grid geometry for packing minimised cards (canonical cell <-> pixel mapping).
//!
//! Pure and total: every function accepts any `f64` (including NaN and
//! infinities) and never panics. Positions that do not land within
//! [`TOLERANCE`] of a canonical cell are "freeform" and map to `None`.

use serde::{Deserialize, Serialize};

use crate::types::Point;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// X coordinate of the grid origin (column 0).
pub const START_X: f64 = 20.0;

/// Y coordinate of the grid origin (row 0).
pub const START_Y: f64 = 20.0;

/// Horizontal distance between adjacent columns (minimised width + gutter).
pub const HORIZONTAL_SPACING: f64 = 220.0;

/// Vertical distance between adjacent rows (minimised height + gutter).
pub const VERTICAL_SPACING: f64 = 70.0;

/// Maximum per-axis distance (inclusive) from a canonical cell that still
/// counts as sitting on that cell. Absorbs drag jitter and float error.
pub const TOLERANCE: f64 = 5.0;

/// Columns per row when packing minimised cards.
pub const CARDS_PER_ROW: usize = 4;

/// Width of a minimised card.
pub const MINIMIZED_WIDTH: f64 = 200.0;

/// Height of a minimised card.
pub const MINIMIZED_HEIGHT: f64 = 50.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A canonical `(row, col)` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub row: u32,
    pub col: u32,
}

impl GridCell {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Cell for the `index`-th slot in row-major order.
    ///
    /// `cards_per_row` of zero is treated as one.
    pub fn from_slot(index: usize, cards_per_row: usize) -> Self {
        let per_row = cards_per_row.max(1);
        Self {
            row: u32::try_from(index / per_row).unwrap_or(u32::MAX),
            col: u32::try_from(index % per_row).unwrap_or(u32::MAX),
        }
    }
}

/// Grid origin, spacing, and tolerance bundled so tests and callers can
/// use a non-default grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMetrics {
    pub start_x: f64,
    pub start_y: f64,
    pub horizontal_spacing: f64,
    pub vertical_spacing: f64,
    pub tolerance: f64,
}

impl Default for GridMetrics {
    fn default() -> Self {
        Self {
            start_x: START_X,
            start_y: START_Y,
            horizontal_spacing: HORIZONTAL_SPACING,
            vertical_spacing: VERTICAL_SPACING,
            tolerance: TOLERANCE,
        }
    }
}

impl GridMetrics {
    /// Nearest canonical cell for `(x, y)`, if the position is grid-aligned.
    ///
    /// Returns `None` for non-finite input, negative rows/columns, or when
    /// either axis is more than `tolerance` away from the nearest cell.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<GridCell> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        if self.horizontal_spacing <= 0.0 || self.vertical_spacing <= 0.0 {
            return None;
        }

        let col = ((x - self.start_x) / self.horizontal_spacing).round();
        let row = ((y - self.start_y) / self.vertical_spacing).round();
        if col < 0.0 || row < 0.0 || col > f64::from(u32::MAX) || row > f64::from(u32::MAX) {
            return None;
        }

        let cell = GridCell::new(row as u32, col as u32);
        let canonical = self.cell_to_pixels(cell);
        let within = (x - canonical.x).abs() <= self.tolerance
            && (y - canonical.y).abs() <= self.tolerance;
        within.then_some(cell)
    }

    /// Canonical top-left pixel position of a cell.
    pub fn cell_to_pixels(&self, cell: GridCell) -> Point {
        Point::new(
            self.start_x + f64::from(cell.col) * self.horizontal_spacing,
            self.start_y + f64::from(cell.row) * self.vertical_spacing,
        )
    }
}

// ---------------------------------------------------------------------------
// Default-grid helpers
// ---------------------------------------------------------------------------

/// [`GridMetrics::cell_at`] on the default grid.
pub fn is_valid_grid_position(x: f64, y: f64) -> Option<GridCell> {
    GridMetrics::default().cell_at(x, y)
}

/// [`GridMetrics::cell_to_pixels`] on the default grid.
pub fn grid_cell_to_pixels(row: u32, col: u32) -> Point {
    GridMetrics::default().cell_to_pixels(GridCell::new(row, col))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
