//! The page store: a buffer pool with transparent disk fault-in.

use crate::disk::{DiskManager, DiskManagerConfig};
use crate::frame::{BufferFrame, FrameId};
use crate::page_table::PageTable;
use crate::replacer::LruKReplacer;
use parking_lot::Mutex;
use tracing::debug;
use vellum_common::config::StorageConfig;
use vellum_common::page::PageId;
use vellum_common::{Result, VellumError};

/// Configuration for the page store.
#[derive(Debug, Clone)]
pub struct PageStoreConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
    /// The `k` parameter of the LRU-K replacer.
    pub replacer_k: usize,
}

impl Default for PageStoreConfig {
    fn default() -> Self {
        Self {
            num_frames: 1024,
            replacer_k: 2,
        }
    }
}

/// A bounded in-memory cache of disk pages.
///
/// Callers address pages by [`PageId`]; the store pins the backing frame,
/// faulting the page in from disk when it is not resident. Unpinned frames
/// are reclaimed by the LRU-K replacer, with dirty victims written back
/// before reuse.
///
/// Every `fetch_page`/`new_page` must be paired with an `unpin_page` on
/// every control-flow exit; a page may only be deleted once unpinned.
pub struct PageStore {
    /// Configuration.
    config: PageStoreConfig,
    /// Backing data file.
    disk: DiskManager,
    /// Array of buffer frames.
    frames: Vec<BufferFrame>,
    /// Page replacement policy.
    replacer: LruKReplacer,
    /// Page table and free list, guarded by the mapping lock. All
    /// resident-set transitions happen under this lock.
    mapping: Mutex<Mapping>,
}

struct Mapping {
    /// Page ID to frame ID mapping.
    page_table: PageTable,
    /// Frames not holding any page.
    free_list: Vec<FrameId>,
}

impl PageStore {
    /// Creates a new page store over the given disk manager.
    pub fn new(disk: DiskManager, config: PageStoreConfig) -> Self {
        let num_frames = config.num_frames;

        let frames: Vec<_> = (0..num_frames)
            .map(|i| BufferFrame::new(FrameId(i as u32)))
            .collect();

        // All frames start free; popping from the back keeps low ids first
        let free_list: Vec<_> = (0..num_frames).rev().map(|i| FrameId(i as u32)).collect();

        Self {
            replacer: LruKReplacer::new(num_frames, config.replacer_k),
            config,
            disk,
            frames,
            mapping: Mutex::new(Mapping {
                page_table: PageTable::new(),
                free_list,
            }),
        }
    }

    /// Opens a page store from a [`StorageConfig`].
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let disk = DiskManager::new(DiskManagerConfig {
            path: config.data_path.clone(),
            fsync_enabled: config.fsync_enabled,
        })?;
        Ok(Self::new(
            disk,
            PageStoreConfig {
                num_frames: config.buffer_pool_frames,
                replacer_k: config.replacer_k,
            },
        ))
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.mapping.lock().free_list.len()
    }

    /// Returns the number of pages currently resident.
    pub fn page_count(&self) -> usize {
        self.mapping.lock().page_table.len()
    }

    /// Returns the number of pages allocated in the data file.
    pub fn num_disk_pages(&self) -> u32 {
        self.disk.num_pages()
    }

    /// Checks if a page is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.mapping.lock().page_table.contains(page_id)
    }

    /// Fetches a page, pinning its frame.
    ///
    /// Faults the page in from disk when it is not resident, evicting a
    /// victim frame if the free list is empty. Fails with `BufferPoolFull`
    /// when every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<&BufferFrame> {
        let mut map = self.mapping.lock();

        if let Some(frame_id) = map.page_table.get(page_id) {
            let frame = &self.frames[frame_id.0 as usize];
            frame.pin();
            self.replacer.record_access(frame_id)?;
            self.replacer.set_evictable(frame_id, false)?;
            return Ok(frame);
        }

        // Fault in from disk
        let frame_id = self.allocate_frame(&mut map)?;
        let frame = &self.frames[frame_id.0 as usize];

        let data = match self.disk.read_page(page_id) {
            Ok(data) => data,
            Err(e) => {
                map.free_list.push(frame_id);
                return Err(e);
            }
        };
        frame.copy_from(&data);
        frame.set_page_id(Some(page_id));
        frame.pin();

        map.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id)?;
        self.replacer.set_evictable(frame_id, false)?;

        Ok(frame)
    }

    /// Allocates a fresh zeroed page and pins its frame.
    pub fn new_page(&self) -> Result<(PageId, &BufferFrame)> {
        let mut map = self.mapping.lock();

        let frame_id = self.allocate_frame(&mut map)?;
        let frame = &self.frames[frame_id.0 as usize];

        let page_id = match self.disk.allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                map.free_list.push(frame_id);
                return Err(e);
            }
        };
        frame.set_page_id(Some(page_id));
        frame.pin();

        map.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id)?;
        self.replacer.set_evictable(frame_id, false)?;

        Ok((page_id, frame))
    }

    /// Picks a frame for a new resident page: free list first, then the
    /// replacer. Dirty victims are written back before reuse.
    fn allocate_frame(&self, map: &mut Mapping) -> Result<FrameId> {
        if let Some(frame_id) = map.free_list.pop() {
            self.frames[frame_id.0 as usize].reset();
            return Ok(frame_id);
        }

        let victim_id = self.replacer.evict().ok_or(VellumError::BufferPoolFull)?;
        let frame = &self.frames[victim_id.0 as usize];

        if let Some(old_page_id) = frame.page_id() {
            if frame.is_dirty() {
                let data = frame.read_data();
                if let Err(e) = self.disk.write_page(old_page_id, &data) {
                    drop(data);
                    // Put the victim back under replacement tracking
                    self.replacer.record_access(victim_id)?;
                    self.replacer.set_evictable(victim_id, true)?;
                    return Err(e);
                }
            }
            map.page_table.remove(old_page_id);
            debug!(page = %old_page_id, frame = %victim_id, "evicted page");
        }

        frame.reset();
        Ok(victim_id)
    }

    /// Unpins a page, optionally marking it dirty.
    ///
    /// When the pin count drops to zero the frame becomes evictable.
    /// Returns false if the page is not resident.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let map = self.mapping.lock();

        if let Some(frame_id) = map.page_table.get(page_id) {
            let frame = &self.frames[frame_id.0 as usize];

            if is_dirty {
                frame.set_dirty(true);
            }
            if frame.unpin() == 0 {
                let _ = self.replacer.set_evictable(frame_id, true);
            }
            return true;
        }
        false
    }

    /// Drops a page from the store, freeing its frame.
    ///
    /// Returns `Ok(false)` if the page is still pinned. A page that is not
    /// resident has nothing to drop and reports success; its disk space is
    /// not reclaimed.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut map = self.mapping.lock();

        let Some(frame_id) = map.page_table.get(page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.0 as usize];

        if frame.is_pinned() {
            return Ok(false);
        }

        map.page_table.remove(page_id);
        self.replacer.remove(frame_id)?;
        frame.reset();
        map.free_list.push(frame_id);

        Ok(true)
    }

    /// Writes a page back to disk if it is resident and dirty.
    ///
    /// Returns true if the page was written.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let map = self.mapping.lock();

        if let Some(frame_id) = map.page_table.get(page_id) {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.is_dirty() {
                let data = frame.read_data();
                self.disk.write_page(page_id, &data)?;
                frame.set_dirty(false);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Writes every dirty resident page back to disk.
    ///
    /// Returns the number of pages written.
    pub fn flush_all(&self) -> Result<usize> {
        let map = self.mapping.lock();

        let mut dirty = Vec::new();
        map.page_table.for_each(|page_id, frame_id| {
            if self.frames[frame_id.0 as usize].is_dirty() {
                dirty.push((page_id, frame_id));
            }
        });

        let mut flushed = 0;
        for (page_id, frame_id) in dirty {
            let frame = &self.frames[frame_id.0 as usize];
            let data = frame.read_data();
            self.disk.write_page(page_id, &data)?;
            frame.set_dirty(false);
            flushed += 1;
        }
        Ok(flushed)
    }

    /// Returns statistics about the pool.
    pub fn stats(&self) -> PageStoreStats {
        let map = self.mapping.lock();

        let mut pinned_frames = 0;
        let mut dirty_frames = 0;
        map.page_table.for_each(|_, frame_id| {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.is_pinned() {
                pinned_frames += 1;
            }
            if frame.is_dirty() {
                dirty_frames += 1;
            }
        });

        PageStoreStats {
            total_frames: self.config.num_frames,
            free_frames: map.free_list.len(),
            resident_pages: map.page_table.len(),
            pinned_frames,
            dirty_frames,
        }
    }
}

/// Statistics about the page store.
#[derive(Debug, Clone)]
pub struct PageStoreStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of free frames.
    pub free_frames: usize,
    /// Number of resident pages.
    pub resident_pages: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}
