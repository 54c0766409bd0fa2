//! Disk manager for page-level file I/O.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use vellum_common::page::{PageId, PAGE_SIZE};
use vellum_common::{Result, VellumError};

/// Configuration for the disk manager.
#[derive(Debug, Clone)]
pub struct DiskManagerConfig {
    /// Path of the data file.
    pub path: PathBuf,
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
}

impl Default for DiskManagerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/vellum.dat"),
            fsync_enabled: true,
        }
    }
}

/// Manages reading and writing pages of a single data file.
///
/// Pages are allocated sequentially; page N lives at byte offset
/// `N * PAGE_SIZE`. Deleted pages are not reclaimed on disk.
pub struct DiskManager {
    /// Configuration.
    config: DiskManagerConfig,
    /// Open file handle and page count.
    inner: Mutex<DiskInner>,
}

struct DiskInner {
    /// The data file.
    file: File,
    /// Number of pages in the file.
    num_pages: u32,
}

impl DiskManager {
    /// Opens or creates the data file.
    pub fn new(config: DiskManagerConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&config.path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self {
            config,
            inner: Mutex::new(DiskInner { file, num_pages }),
        })
    }

    /// Returns the data file path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Returns the number of allocated pages.
    pub fn num_pages(&self) -> u32 {
        self.inner.lock().num_pages
    }

    /// Reads a page from disk.
    pub fn read_page(&self, page_id: PageId) -> Result<[u8; PAGE_SIZE]> {
        let mut inner = self.inner.lock();

        if page_id.0 >= inner.num_pages {
            return Err(VellumError::PageNotFound { page_id: page_id.0 });
        }

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        inner.file.seek(SeekFrom::Start(offset))?;

        let mut buffer = [0u8; PAGE_SIZE];
        inner.file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    /// Writes a page to disk.
    pub fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(data)?;

        if self.config.fsync_enabled {
            inner.file.sync_all()?;
        }

        if page_id.0 >= inner.num_pages {
            inner.num_pages = page_id.0 + 1;
        }

        Ok(())
    }

    /// Allocates a fresh page at the end of the file and zeroes it.
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut inner = self.inner.lock();

        let page_id = PageId(inner.num_pages);
        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        let zeroes = [0u8; PAGE_SIZE];

        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(&zeroes)?;
        if self.config.fsync_enabled {
            inner.file.sync_all()?;
        }
        inner.num_pages += 1;

        Ok(page_id)
    }

    /// Flushes the data file to stable storage.
    pub fn flush(&self) -> Result<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_disk_manager() -> (DiskManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = DiskManagerConfig {
            path: dir.path().join("test.dat"),
            fsync_enabled: false,
        };
        (DiskManager::new(config).unwrap(), dir)
    }

    #[test]
    fn test_disk_manager_new() {
        let (disk, _dir) = create_test_disk_manager();
        assert_eq!(disk.num_pages(), 0);
    }

    #[test]
    fn test_disk_manager_allocate_page() {
        let (disk, _dir) = create_test_disk_manager();

        assert_eq!(disk.allocate_page().unwrap(), PageId(0));
        assert_eq!(disk.allocate_page().unwrap(), PageId(1));
        assert_eq!(disk.allocate_page().unwrap(), PageId(2));
        assert_eq!(disk.num_pages(), 3);
    }

    #[test]
    fn test_disk_manager_allocated_page_is_zeroed() {
        let (disk, _dir) = create_test_disk_manager();

        let page_id = disk.allocate_page().unwrap();
        let data = disk.read_page(page_id).unwrap();
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_disk_manager_write_read() {
        let (disk, _dir) = create_test_disk_manager();

        let page_id = disk.allocate_page().unwrap();
        let mut data = [0u8; PAGE_SIZE];
        data[0] = 0xAB;
        data[PAGE_SIZE - 1] = 0xCD;

        disk.write_page(page_id, &data).unwrap();

        let read_back = disk.read_page(page_id).unwrap();
        assert_eq!(read_back[0], 0xAB);
        assert_eq!(read_back[PAGE_SIZE - 1], 0xCD);
    }

    #[test]
    fn test_disk_manager_read_nonexistent_page() {
        let (disk, _dir) = create_test_disk_manager();

        let result = disk.read_page(PageId(10));
        assert!(matches!(
            result,
            Err(VellumError::PageNotFound { page_id: 10 })
        ));
    }

    #[test]
    fn test_disk_manager_overwrite_page() {
        let (disk, _dir) = create_test_disk_manager();

        let page_id = disk.allocate_page().unwrap();
        let mut data = [0x11u8; PAGE_SIZE];
        disk.write_page(page_id, &data).unwrap();

        data = [0x22u8; PAGE_SIZE];
        disk.write_page(page_id, &data).unwrap();

        let read_back = disk.read_page(page_id).unwrap();
        assert_eq!(read_back[0], 0x22);
        assert_eq!(disk.num_pages(), 1);
    }

    #[test]
    fn test_disk_manager_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiskManagerConfig {
            path: dir.path().join("persist.dat"),
            fsync_enabled: false,
        };

        {
            let disk = DiskManager::new(config.clone()).unwrap();
            let page_id = disk.allocate_page().unwrap();
            let data = [0x42u8; PAGE_SIZE];
            disk.write_page(page_id, &data).unwrap();
            disk.flush().unwrap();
        }

        // Reopen and read the page back
        let disk = DiskManager::new(config).unwrap();
        assert_eq!(disk.num_pages(), 1);
        let data = disk.read_page(PageId(0)).unwrap();
        assert_eq!(data[0], 0x42);
    }
}
