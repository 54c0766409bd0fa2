//! Buffer pool management for Vellum.
//!
//! This crate provides the page store backing the on-disk index:
//! - Fixed-size buffer pool with configurable frame count
//! - LRU-K eviction policy for cache management
//! - Pin counting for concurrent access
//! - Dirty page tracking with write-back on eviction
//! - Transparent fault-in from the data file

mod disk;
mod frame;
mod page_table;
mod replacer;
mod store;

pub use disk::{DiskManager, DiskManagerConfig};
pub use frame::{BufferFrame, FrameId};
pub use replacer::LruKReplacer;
pub use store::{PageStore, PageStoreConfig, PageStoreStats};
