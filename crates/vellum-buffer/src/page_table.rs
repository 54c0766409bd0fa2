//! Page table mapping resident page IDs to frame IDs.

use crate::frame::FrameId;
use std::collections::HashMap;
use vellum_common::page::PageId;

/// Direct array size. Covers the first 16384 pages (~64 MB at 4 KB pages).
const DIRECT_PATH_SIZE: usize = 16384;

/// Maps PageId to the FrameId currently holding it.
///
/// Two-tier lookup: a direct array for low page numbers (the common case
/// for index files) and a spill map above it. The table carries no locking
/// of its own; the page store mutates it under its mapping lock.
pub(crate) struct PageTable {
    /// Direct slots for page numbers below DIRECT_PATH_SIZE.
    direct: Vec<FrameId>,
    /// Spill map for page numbers at or above DIRECT_PATH_SIZE.
    spill: HashMap<PageId, FrameId>,
    /// Number of entries in the direct array.
    direct_len: usize,
}

impl PageTable {
    /// Creates an empty page table.
    pub(crate) fn new() -> Self {
        Self {
            direct: vec![FrameId::INVALID; DIRECT_PATH_SIZE],
            spill: HashMap::new(),
            direct_len: 0,
        }
    }

    /// Looks up a page ID and returns its frame ID if resident.
    #[inline]
    pub(crate) fn get(&self, page_id: PageId) -> Option<FrameId> {
        if (page_id.0 as usize) < DIRECT_PATH_SIZE {
            let slot = self.direct[page_id.0 as usize];
            if slot.is_valid() {
                return Some(slot);
            }
            return None;
        }
        self.spill.get(&page_id).copied()
    }

    /// Inserts a page ID to frame ID mapping, replacing any prior entry.
    pub(crate) fn insert(&mut self, page_id: PageId, frame_id: FrameId) {
        if (page_id.0 as usize) < DIRECT_PATH_SIZE {
            let slot = &mut self.direct[page_id.0 as usize];
            if !slot.is_valid() {
                self.direct_len += 1;
            }
            *slot = frame_id;
        } else {
            self.spill.insert(page_id, frame_id);
        }
    }

    /// Removes a page ID mapping. Returns the frame ID if it was present.
    pub(crate) fn remove(&mut self, page_id: PageId) -> Option<FrameId> {
        if (page_id.0 as usize) < DIRECT_PATH_SIZE {
            let slot = &mut self.direct[page_id.0 as usize];
            if slot.is_valid() {
                let old = *slot;
                *slot = FrameId::INVALID;
                self.direct_len -= 1;
                return Some(old);
            }
            return None;
        }
        self.spill.remove(&page_id)
    }

    /// Returns true if the page ID is in the table.
    pub(crate) fn contains(&self, page_id: PageId) -> bool {
        self.get(page_id).is_some()
    }

    /// Returns the number of resident pages.
    pub(crate) fn len(&self) -> usize {
        self.direct_len + self.spill.len()
    }

    /// Iterates over all entries, calling the provided function for each.
    pub(crate) fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(PageId, FrameId),
    {
        for (page_num, slot) in self.direct.iter().enumerate() {
            if slot.is_valid() {
                f(PageId(page_num as u32), *slot);
            }
        }
        for (page_id, frame_id) in &self.spill {
            f(*page_id, *frame_id);
        }
    }
}
