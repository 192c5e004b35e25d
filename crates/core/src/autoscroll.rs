//! Edge auto-scroll while a drag is active.
//!
//! The controller produces a per-frame scroll step. It runs only while the
//! pointer sits inside an edge zone and the container can still move in that
//! direction; the frame loop stops as soon as either condition fails.

use serde::{Deserialize, Serialize};

/// Distance from a container edge (px) inside which scrolling starts.
pub const AUTO_SCROLL_THRESHOLD: f64 = 60.0;

/// Scroll step per frame at the outer edge of the zone.
pub const AUTO_SCROLL_BASE_SPEED: f64 = 8.0;

/// Speed multiplier reached with the pointer on the container edge.
pub const AUTO_SCROLL_MAX_MULTIPLIER: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Auto,
    Scroll,
}

/// Scroll-relevant measurements of one container in the containment chain.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollNode {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
    pub overflow_y: Overflow,
}

impl ScrollNode {
    pub fn max_scroll(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }

    /// Content overflows and the overflow style allows scrolling.
    pub fn is_scrollable(&self) -> bool {
        matches!(self.overflow_y, Overflow::Auto | Overflow::Scroll)
            && self.scroll_height > self.client_height
    }
}

/// Index of the first scrollable node walking outward from `chain[0]`
/// (the immediate container). Falls back to `0`; `None` only when empty.
pub fn resolve_scroll_container(chain: &[ScrollNode]) -> Option<usize> {
    if chain.is_empty() {
        return None;
    }
    Some(chain.iter().position(ScrollNode::is_scrollable).unwrap_or(0))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoScrollConfig {
    pub threshold: f64,
    pub base_speed: f64,
    pub max_multiplier: f64,
}

impl Default for AutoScrollConfig {
    fn default() -> Self {
        Self {
            threshold: AUTO_SCROLL_THRESHOLD,
            base_speed: AUTO_SCROLL_BASE_SPEED,
            max_multiplier: AUTO_SCROLL_MAX_MULTIPLIER,
        }
    }
}

impl AutoScrollConfig {
    fn speed_at(&self, distance: f64) -> f64 {
        let closeness = 1.0 - distance.clamp(0.0, self.threshold) / self.threshold;
        self.base_speed * (1.0 + (self.max_multiplier - 1.0) * closeness)
    }

    /// Signed scroll step for a pointer at `pointer_y` inside a container
    /// spanning `top..bottom`. Negative scrolls up. `None` outside both zones.
    pub fn velocity(&self, pointer_y: f64, top: f64, bottom: f64) -> Option<f64> {
        if !pointer_y.is_finite() || self.threshold <= 0.0 {
            return None;
        }
        let from_top = pointer_y - top;
        let from_bottom = bottom - pointer_y;
        if from_top < self.threshold {
            Some(-self.speed_at(from_top))
        } else if from_bottom < self.threshold {
            Some(self.speed_at(from_bottom))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutoScrollController {
    config: AutoScrollConfig,
    velocity: Option<f64>,
}

impl AutoScrollController {
    pub fn new(config: AutoScrollConfig) -> Self {
        Self {
            config,
            velocity: None,
        }
    }

    /// Called on every pointer move during a drag. Starts, retunes or stops
    /// the loop and returns the active velocity.
    pub fn handle_auto_scroll(
        &mut self,
        pointer_y: f64,
        top: f64,
        bottom: f64,
        node: &ScrollNode,
    ) -> Option<f64> {
        let velocity = self
            .config
            .velocity(pointer_y, top, bottom)
            .filter(|v| !at_limit(node, *v));
        self.velocity = velocity;
        velocity
    }

    /// Advance one frame. Returns the distance scrolled; the loop stops
    /// itself once a scroll limit is reached.
    pub fn tick(&mut self, node: &mut ScrollNode) -> f64 {
        let Some(v) = self.velocity else {
            return 0.0;
        };
        let before = node.scroll_top;
        node.scroll_top = (before + v).clamp(0.0, node.max_scroll());
        if at_limit(node, v) {
            tracing::trace!(scroll_top = node.scroll_top, "Auto-scroll reached limit");
            self.velocity = None;
        }
        node.scroll_top - before
    }

    /// Cancel the frame loop (drag ended).
    pub fn stop(&mut self) {
        self.velocity = None;
    }

    pub fn is_active(&self) -> bool {
        self.velocity.is_some()
    }

    pub fn velocity(&self) -> Option<f64> {
        self.velocity
    }
}

fn at_limit(node: &ScrollNode, velocity: f64) -> bool {
    (velocity < 0.0 && node.scroll_top <= 0.0)
        || (velocity > 0.0 && node.scroll_top >= node.max_scroll())
}
