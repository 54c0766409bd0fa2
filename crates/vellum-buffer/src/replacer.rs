//! LRU-K page replacement policy for the buffer pool.
//!
//! Frames are partitioned by whether they have been accessed at least `k`
//! times. Frames still below `k` accesses live on the history list, ordered
//! by their first access; frames at or above `k` live on the cache list,
//! ordered by their most recent access. Eviction drains the history list
//! first, so a frame has to prove `k` recurrences before it is allowed to
//! displace the working set. A plain LRU admits scan pollution; LRU-K does
//! not.

use crate::frame::FrameId;
use parking_lot::Mutex;
use std::collections::VecDeque;
use vellum_common::{Result, VellumError};

/// LRU-K replacement policy over a fixed universe of frames.
///
/// A single mutex serializes all methods.
pub struct LruKReplacer {
    /// Number of frames under management.
    num_frames: usize,
    /// The `k` threshold.
    k: usize,
    /// Internal state protected by the mutex.
    inner: Mutex<ReplacerInner>,
}

struct ReplacerInner {
    /// Frames with fewer than `k` recorded accesses, most recent first.
    /// Order is fixed at first access; later sub-`k` accesses do not
    /// reorder, so the back of the list is the least recently inserted.
    history: VecDeque<FrameId>,
    /// Frames with at least `k` recorded accesses, most recent first.
    cache: VecDeque<FrameId>,
    /// Per-frame access counts.
    access_count: Vec<usize>,
    /// Per-frame evictable flags.
    evictable: Vec<bool>,
    /// Number of currently evictable frames.
    curr_size: usize,
}

impl ReplacerInner {
    fn remove_from(list: &mut VecDeque<FrameId>, frame_id: FrameId) {
        if let Some(pos) = list.iter().position(|&f| f == frame_id) {
            list.remove(pos);
        }
    }
}

impl LruKReplacer {
    /// Creates a new replacer for `num_frames` frames with threshold `k`.
    pub fn new(num_frames: usize, k: usize) -> Self {
        Self {
            num_frames,
            k: k.max(1),
            inner: Mutex::new(ReplacerInner {
                history: VecDeque::new(),
                cache: VecDeque::new(),
                access_count: vec![0; num_frames],
                evictable: vec![false; num_frames],
                curr_size: 0,
            }),
        }
    }

    /// Returns the total capacity.
    pub fn capacity(&self) -> usize {
        self.num_frames
    }

    fn check_frame(&self, frame_id: FrameId) -> Result<usize> {
        let idx = frame_id.0 as usize;
        if idx >= self.num_frames {
            return Err(VellumError::InvalidFrame { frame_id: frame_id.0 });
        }
        Ok(idx)
    }

    /// Records an access to the given frame.
    ///
    /// The first access puts the frame at the front of the history list.
    /// Crossing the `k` threshold moves it to the front of the cache list;
    /// accesses past `k` refresh its cache-list position.
    pub fn record_access(&self, frame_id: FrameId) -> Result<()> {
        let idx = self.check_frame(frame_id)?;
        let mut inner = self.inner.lock();

        inner.access_count[idx] += 1;
        let count = inner.access_count[idx];

        if count == self.k {
            ReplacerInner::remove_from(&mut inner.history, frame_id);
            inner.cache.push_front(frame_id);
        } else if count > self.k {
            ReplacerInner::remove_from(&mut inner.cache, frame_id);
            inner.cache.push_front(frame_id);
        } else if count == 1 {
            inner.history.push_front(frame_id);
        }
        // 1 < count < k: position in the history list is unchanged

        Ok(())
    }

    /// Sets whether the given frame may be evicted.
    ///
    /// A no-op for frames that have never been accessed.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<()> {
        let idx = self.check_frame(frame_id)?;
        let mut inner = self.inner.lock();

        if inner.access_count[idx] == 0 {
            return Ok(());
        }
        if !inner.evictable[idx] && evictable {
            inner.curr_size += 1;
        }
        if inner.evictable[idx] && !evictable {
            inner.curr_size -= 1;
        }
        inner.evictable[idx] = evictable;

        Ok(())
    }

    /// Selects a victim frame for eviction.
    ///
    /// Prefers the least recently inserted evictable frame on the history
    /// list; falls back to the least recently touched evictable frame on
    /// the cache list. The victim's tracking state is reset. Returns None
    /// when no frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock();

        if inner.curr_size == 0 {
            return None;
        }

        let victim = inner
            .history
            .iter()
            .rev()
            .copied()
            .find(|f| inner.evictable[f.0 as usize])
            .or_else(|| {
                inner
                    .cache
                    .iter()
                    .rev()
                    .copied()
                    .find(|f| inner.evictable[f.0 as usize])
            })?;

        let idx = victim.0 as usize;
        ReplacerInner::remove_from(&mut inner.history, victim);
        ReplacerInner::remove_from(&mut inner.cache, victim);
        inner.access_count[idx] = 0;
        inner.evictable[idx] = false;
        inner.curr_size -= 1;

        Some(victim)
    }

    /// Forcibly drops a frame from the replacer.
    ///
    /// A no-op for frames that have never been accessed; fails with
    /// `FrameNotEvictable` if the frame is tracked but pinned.
    pub fn remove(&self, frame_id: FrameId) -> Result<()> {
        let idx = self.check_frame(frame_id)?;
        let mut inner = self.inner.lock();

        if inner.access_count[idx] == 0 {
            return Ok(());
        }
        if !inner.evictable[idx] {
            return Err(VellumError::FrameNotEvictable { frame_id: frame_id.0 });
        }

        if inner.access_count[idx] < self.k {
            ReplacerInner::remove_from(&mut inner.history, frame_id);
        } else {
            ReplacerInner::remove_from(&mut inner.cache, frame_id);
        }
        inner.access_count[idx] = 0;
        inner.evictable[idx] = false;
        inner.curr_size -= 1;

        Ok(())
    }

    /// Returns the number of currently evictable frames.
    pub fn size(&self) -> usize {
        self.inner.lock().curr_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacer_new() {
        let replacer = LruKReplacer::new(10, 2);
        assert_eq!(replacer.capacity(), 10);
        assert_eq!(replacer.size(), 0);
        assert!(replacer.evict().is_none());
    }

    #[test]
    fn test_replacer_invalid_frame() {
        let replacer = LruKReplacer::new(5, 2);

        assert!(matches!(
            replacer.record_access(FrameId(5)),
            Err(VellumError::InvalidFrame { frame_id: 5 })
        ));
        assert!(matches!(
            replacer.set_evictable(FrameId(100), true),
            Err(VellumError::InvalidFrame { .. })
        ));
        assert!(matches!(
            replacer.remove(FrameId(100)),
            Err(VellumError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn test_replacer_set_evictable_untracked_is_noop() {
        let replacer = LruKReplacer::new(5, 2);

        replacer.set_evictable(FrameId(0), true).unwrap();
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_replacer_history_eviction_order() {
        let replacer = LruKReplacer::new(5, 2);

        // First access fixes the history-list order
        for i in 0..4 {
            replacer.record_access(FrameId(i)).unwrap();
            replacer.set_evictable(FrameId(i), true).unwrap();
        }
        assert_eq!(replacer.size(), 4);

        // Oldest arrival evicts first
        assert_eq!(replacer.evict(), Some(FrameId(0)));
        assert_eq!(replacer.evict(), Some(FrameId(1)));
        assert_eq!(replacer.size(), 2);
    }

    #[test]
    fn test_replacer_sub_k_access_does_not_reorder() {
        let replacer = LruKReplacer::new(5, 3);

        replacer.record_access(FrameId(0)).unwrap();
        replacer.record_access(FrameId(1)).unwrap();
        // A second sub-k access to frame 0 leaves it oldest
        replacer.record_access(FrameId(0)).unwrap();

        replacer.set_evictable(FrameId(0), true).unwrap();
        replacer.set_evictable(FrameId(1), true).unwrap();

        assert_eq!(replacer.evict(), Some(FrameId(0)));
    }

    #[test]
    fn test_replacer_history_before_cache() {
        let replacer = LruKReplacer::new(5, 2);

        // Frame 0 reaches k accesses, frame 1 stays in history
        replacer.record_access(FrameId(0)).unwrap();
        replacer.record_access(FrameId(0)).unwrap();
        replacer.record_access(FrameId(1)).unwrap();

        replacer.set_evictable(FrameId(0), true).unwrap();
        replacer.set_evictable(FrameId(1), true).unwrap();

        // History frame goes first even though frame 0 is colder by arrival
        assert_eq!(replacer.evict(), Some(FrameId(1)));
        assert_eq!(replacer.evict(), Some(FrameId(0)));
    }

    #[test]
    fn test_replacer_cache_lru_order() {
        let replacer = LruKReplacer::new(5, 2);

        for i in 0..3 {
            replacer.record_access(FrameId(i)).unwrap();
            replacer.record_access(FrameId(i)).unwrap();
            replacer.set_evictable(FrameId(i), true).unwrap();
        }
        // Touch frame 0 again so frame 1 becomes the coldest cached frame
        replacer.record_access(FrameId(0)).unwrap();

        assert_eq!(replacer.evict(), Some(FrameId(1)));
        assert_eq!(replacer.evict(), Some(FrameId(2)));
        assert_eq!(replacer.evict(), Some(FrameId(0)));
    }

    #[test]
    fn test_replacer_skips_pinned_frames() {
        let replacer = LruKReplacer::new(5, 2);

        replacer.record_access(FrameId(0)).unwrap();
        replacer.record_access(FrameId(1)).unwrap();
        replacer.record_access(FrameId(2)).unwrap();
        replacer.record_access(FrameId(3)).unwrap();
        replacer.set_evictable(FrameId(1), true).unwrap();
        replacer.set_evictable(FrameId(2), true).unwrap();
        replacer.set_evictable(FrameId(3), true).unwrap();

        // Frame 0 is oldest but pinned
        assert_eq!(replacer.evict(), Some(FrameId(1)));

        // Frame 0 crosses k and becomes cached, frames 2 and 3 stay older
        // in the history list and win
        replacer.record_access(FrameId(0)).unwrap();
        replacer.record_access(FrameId(0)).unwrap();
        replacer.set_evictable(FrameId(0), true).unwrap();

        assert_eq!(replacer.evict(), Some(FrameId(2)));
    }

    #[test]
    fn test_replacer_eviction_resets_tracking() {
        let replacer = LruKReplacer::new(5, 2);

        replacer.record_access(FrameId(0)).unwrap();
        replacer.set_evictable(FrameId(0), true).unwrap();
        assert_eq!(replacer.evict(), Some(FrameId(0)));

        // The frame starts over: set_evictable is a no-op until a fresh
        // access arrives
        replacer.set_evictable(FrameId(0), true).unwrap();
        assert_eq!(replacer.size(), 0);

        replacer.record_access(FrameId(0)).unwrap();
        replacer.set_evictable(FrameId(0), true).unwrap();
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_replacer_remove() {
        let replacer = LruKReplacer::new(5, 2);

        replacer.record_access(FrameId(0)).unwrap();
        replacer.record_access(FrameId(1)).unwrap();
        replacer.set_evictable(FrameId(0), true).unwrap();
        replacer.set_evictable(FrameId(1), true).unwrap();
        assert_eq!(replacer.size(), 2);

        replacer.remove(FrameId(0)).unwrap();
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId(1)));
    }

    #[test]
    fn test_replacer_remove_non_evictable_fails() {
        let replacer = LruKReplacer::new(5, 2);

        replacer.record_access(FrameId(0)).unwrap();
        assert!(matches!(
            replacer.remove(FrameId(0)),
            Err(VellumError::FrameNotEvictable { frame_id: 0 })
        ));

        // Untracked frames are a silent no-op
        replacer.remove(FrameId(1)).unwrap();
    }

    #[test]
    fn test_replacer_pin_unpin_cycle() {
        let replacer = LruKReplacer::new(3, 2);

        for i in 0..3 {
            replacer.record_access(FrameId(i)).unwrap();
            replacer.set_evictable(FrameId(i), true).unwrap();
        }
        assert_eq!(replacer.size(), 3);

        replacer.set_evictable(FrameId(1), false).unwrap();
        assert_eq!(replacer.size(), 2);

        let victim = replacer.evict().unwrap();
        assert_ne!(victim, FrameId(1));

        replacer.set_evictable(FrameId(1), true).unwrap();
        assert_eq!(replacer.size(), 2);
    }
}
