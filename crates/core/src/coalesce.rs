//! Latest-value-wins slot for frame-coalesced updates.
//!
//! Pointer events can arrive many times per rendered frame. Producers
//! [`push`](FrameCoalescer::push) every event; the frame tick
//! [`take`](FrameCoalescer::take)s at most one value, so at most one store
//! write happens per tick no matter how many events arrived.

#[derive(Debug, Clone)]
pub struct FrameCoalescer<T> {
    pending: Option<T>,
}

impl<T> Default for FrameCoalescer<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> FrameCoalescer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending value.
    pub fn push(&mut self, value: T) {
        self.pending = Some(value);
    }

    /// Take the pending value for this tick, if any.
    pub fn take(&mut self) -> Option<T> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Discard anything pending.
    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn many_pushes_one_take() {
        let mut c = FrameCoalescer::new();
        c.push(1);
        c.push(2);
        c.push(3);

        assert_eq!(c.take(), Some(3));
        assert_eq!(c.take(), None);
    }

    #[test]
    fn clear_discards_pending() {
        let mut c = FrameCoalescer::new();
        c.push("x");
        c.clear();
        assert!(!c.is_pending());
        assert_eq!(c.take(), None);
    }
}
