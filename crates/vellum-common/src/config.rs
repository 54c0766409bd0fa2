//! Configuration structures for Vellum.

use crate::page::PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage configuration for the index engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the data file.
    pub data_path: PathBuf,
    /// Number of frames in the buffer pool.
    pub buffer_pool_frames: usize,
    /// The `k` parameter of the LRU-K replacement policy.
    pub replacer_k: usize,
    /// Enable fsync after page writes.
    pub fsync_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("./data/vellum.dat"),
            buffer_pool_frames: 1024, // 4 MB with 4 KB pages
            replacer_k: 2,
            fsync_enabled: true,
        }
    }
}

impl StorageConfig {
    /// Returns the total buffer pool size in bytes.
    pub fn buffer_pool_size_bytes(&self) -> usize {
        self.buffer_pool_frames * PAGE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.data_path, PathBuf::from("./data/vellum.dat"));
        assert_eq!(config.buffer_pool_frames, 1024);
        assert_eq!(config.replacer_k, 2);
        assert!(config.fsync_enabled);
    }

    #[test]
    fn test_storage_config_custom() {
        let config = StorageConfig {
            data_path: PathBuf::from("/var/lib/vellum/main.dat"),
            buffer_pool_frames: 4096,
            replacer_k: 3,
            fsync_enabled: false,
        };

        assert_eq!(config.data_path, PathBuf::from("/var/lib/vellum/main.dat"));
        assert_eq!(config.buffer_pool_frames, 4096);
        assert_eq!(config.replacer_k, 3);
        assert!(!config.fsync_enabled);
    }

    #[test]
    fn test_buffer_pool_size_bytes() {
        let config = StorageConfig::default();
        assert_eq!(config.buffer_pool_size_bytes(), 1024 * 4096);
        assert_eq!(config.buffer_pool_size_bytes(), 4_194_304); // 4 MB
    }

    #[test]
    fn test_storage_config_clone() {
        let config1 = StorageConfig::default();
        let config2 = config1.clone();
        assert_eq!(config1.buffer_pool_frames, config2.buffer_pool_frames);
        assert_eq!(config1.data_path, config2.data_path);
    }

    #[test]
    fn test_storage_config_serde_roundtrip() {
        let original = StorageConfig::default();
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: StorageConfig = serde_json::from_str(&serialized).unwrap();

        assert_eq!(original.data_path, deserialized.data_path);
        assert_eq!(original.buffer_pool_frames, deserialized.buffer_pool_frames);
        assert_eq!(original.replacer_k, deserialized.replacer_k);
        assert_eq!(original.fsync_enabled, deserialized.fsync_enabled);
    }
}
