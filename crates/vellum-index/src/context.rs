//! Per-operation latch queue and deleted-page set.

use parking_lot::RwLockWriteGuard;
use vellum_buffer::PageStore;
use vellum_common::page::{PageId, PAGE_SIZE};
use vellum_common::Result;

/// A page whose write latch is held by the current operation.
///
/// The guard doubles as exclusive access to the page bytes; `dirty`
/// records whether the page must be written back when unpinned.
pub(crate) struct LatchedPage<'a> {
    pub(crate) page_id: PageId,
    pub(crate) guard: RwLockWriteGuard<'a, Box<[u8; PAGE_SIZE]>>,
    pub(crate) dirty: bool,
}

/// State carried through one tree write operation.
///
/// `queue` is the FIFO chain of still-latched ancestors, root-most first;
/// descent pushes to the back and releases from the front. Pages emptied
/// by a merge go into `deleted` and are dropped from the store only after
/// every latch is released.
///
/// Dropping the context releases and unpins whatever it still holds, so
/// error paths leave no page pinned or latched.
pub(crate) struct OpContext<'a> {
    store: &'a PageStore,
    pub(crate) queue: Vec<LatchedPage<'a>>,
    pub(crate) deleted: Vec<PageId>,
}

impl<'a> OpContext<'a> {
    pub(crate) fn new(store: &'a PageStore) -> Self {
        Self {
            store,
            queue: Vec::new(),
            deleted: Vec::new(),
        }
    }

    /// Appends a newly latched page to the back of the queue.
    pub(crate) fn push(&mut self, page_id: PageId, guard: RwLockWriteGuard<'a, Box<[u8; PAGE_SIZE]>>) {
        self.queue.push(LatchedPage {
            page_id,
            guard,
            dirty: false,
        });
    }

    /// Unlatches and unpins every queued page, front to back.
    pub(crate) fn release_all(&mut self) {
        let store = self.store;
        for page in self.queue.drain(..) {
            let LatchedPage {
                page_id,
                guard,
                dirty,
            } = page;
            drop(guard);
            store.unpin_page(page_id, dirty);
        }
    }

    /// Releases everything, then performs the queued page deletions.
    pub(crate) fn finish(mut self) -> Result<()> {
        self.release_all();
        let store = self.store;
        for page_id in std::mem::take(&mut self.deleted) {
            store.delete_page(page_id)?;
        }
        Ok(())
    }
}

impl Drop for OpContext<'_> {
    fn drop(&mut self) {
        self.release_all();
    }
}
