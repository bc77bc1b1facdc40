use std::fmt::Debug;

/// Index of a frame in the buffer pool's frame array.
pub type FrameId = usize;

/// Victim-selection policy for the buffer pool.
///
/// The pool reports pin transitions through `pin`/`unpin` and asks for a
/// victim with `evict`. All calls happen under the pool's metadata latch,
/// so implementations need no locking of their own.
pub trait Replacer: Send + Sync + Debug {
    /// Select a frame to evict and drop it from the replacer's tracking.
    /// Returns None if no frame is evictable.
    fn evict(&mut self) -> Option<FrameId>;

    /// Mark a frame as pinned (not evictable).
    fn pin(&mut self, frame_id: FrameId);

    /// Mark a frame as unpinned (evictable).
    fn unpin(&mut self, frame_id: FrameId);

    /// Get the number of evictable frames.
    fn size(&self) -> usize;
}
