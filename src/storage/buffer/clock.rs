use super::replacer::{FrameId, Replacer};

/// Second-chance clock replacement policy.
///
/// Evictable frames sit on a ring, each with a reference bit. `evict`
/// sweeps from the hand position: an entry with a cleared bit is the
/// victim; an entry with a set bit has it cleared and gets a second
/// chance. If the sweep comes all the way around (every bit was set when
/// the sweep began), the entry under the hand is evicted anyway, so a call
/// finishes within two revolutions.
#[derive(Debug)]
pub struct ClockReplacer {
    /// Ring of (frame, reference bit) entries in arrival order.
    ring: Vec<(FrameId, bool)>,
    /// Position of the clock hand within `ring`.
    hand: usize,
    /// Maximum number of tracked frames.
    capacity: usize,
}

impl ClockReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Vec::with_capacity(capacity),
            hand: 0,
            capacity,
        }
    }

    /// Remove the entry at `idx`, keeping the hand inside the ring.
    fn remove_entry(&mut self, idx: usize) -> FrameId {
        let (frame_id, _) = self.ring.remove(idx);
        if self.hand >= self.ring.len() {
            self.hand = 0;
        }
        frame_id
    }
}

impl Replacer for ClockReplacer {
    fn evict(&mut self) -> Option<FrameId> {
        if self.ring.is_empty() {
            return None;
        }

        let start = self.hand;
        loop {
            if !self.ring[self.hand].1 {
                return Some(self.remove_entry(self.hand));
            }
            self.ring[self.hand].1 = false;
            self.hand = (self.hand + 1) % self.ring.len();

            if self.hand == start {
                // Came all the way around: every bit was set and has now
                // been cleared, take the entry under the hand.
                return Some(self.remove_entry(self.hand));
            }
        }
    }

    fn pin(&mut self, frame_id: FrameId) {
        if let Some(idx) = self.ring.iter().position(|&(f, _)| f == frame_id) {
            // Hand resting on the last entry while that entry goes away:
            // step it back so it stays in range.
            if idx == self.hand && self.hand == self.ring.len() - 1 && self.hand > 0 {
                self.hand -= 1;
            }
            self.remove_entry(idx);
        }
    }

    fn unpin(&mut self, frame_id: FrameId) {
        if let Some(entry) = self.ring.iter_mut().find(|(f, _)| *f == frame_id) {
            entry.1 = true;
        } else if self.ring.len() < self.capacity {
            // ignore unpins once the ring is at capacity
            self.ring.push((frame_id, true));
        }
    }

    fn size(&self) -> usize {
        self.ring.len()
    }
}
