//! Forward iteration over the leaf chain.

use crate::key::IndexKey;
use crate::node::LeafRef;
use std::marker::PhantomData;
use vellum_buffer::{BufferFrame, PageStore};
use vellum_common::page::PageId;
use vellum_common::types::RecordId;

/// An ascending iterator over the tree's key-value pairs.
///
/// The iterator holds a pin (never a latch) on at most one leaf at a
/// time; each step read-latches that leaf just long enough to copy the
/// current pair and the forward pointer. Iteration is not restartable
/// across structural changes made by other threads: the cursor stays
/// valid on its pinned leaf, but pairs past the starting leaf's original
/// last key may or may not reflect concurrent inserts.
pub struct TreeIter<'a, K: IndexKey> {
    store: &'a PageStore,
    /// Pinned frame of the current leaf; None once exhausted.
    frame: Option<&'a BufferFrame>,
    page_id: PageId,
    index: usize,
    _marker: PhantomData<K>,
}

impl<'a, K: IndexKey> TreeIter<'a, K> {
    pub(crate) fn new(store: &'a PageStore, start: Option<(PageId, &'a BufferFrame, usize)>) -> Self {
        match start {
            Some((page_id, frame, index)) => Self {
                store,
                frame: Some(frame),
                page_id,
                index,
                _marker: PhantomData,
            },
            None => Self {
                store,
                frame: None,
                page_id: PageId::INVALID,
                index: 0,
                _marker: PhantomData,
            },
        }
    }

    fn finish_at_current_leaf(&mut self) {
        self.store.unpin_page(self.page_id, false);
        self.frame = None;
        self.page_id = PageId::INVALID;
    }
}

impl<'a, K: IndexKey> Iterator for TreeIter<'a, K> {
    type Item = (K, RecordId);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.frame?;

            let (item, next_id) = {
                let guard = frame.read_data();
                let leaf = LeafRef::<K>::new(&guard[..]);
                if self.index < leaf.size() {
                    (
                        Some((leaf.key_at(self.index), leaf.record_at(self.index))),
                        PageId::INVALID,
                    )
                } else {
                    (None, leaf.next_page_id())
                }
            };

            if let Some(item) = item {
                self.index += 1;
                return Some(item);
            }

            if !next_id.is_valid() {
                self.finish_at_current_leaf();
                return None;
            }

            // Hop to the next leaf: pin it, then drop the old pin
            match self.store.fetch_page(next_id) {
                Ok(next_frame) => {
                    self.store.unpin_page(self.page_id, false);
                    self.frame = Some(next_frame);
                    self.page_id = next_id;
                    self.index = 0;
                }
                Err(_) => {
                    // Cannot pin the next leaf; end the scan
                    self.finish_at_current_leaf();
                    return None;
                }
            }
        }
    }
}

impl<K: IndexKey> Drop for TreeIter<'_, K> {
    fn drop(&mut self) {
        if self.frame.is_some() {
            self.store.unpin_page(self.page_id, false);
        }
    }
}
