//! Error types for Vellum.

use thiserror::Error;

/// Result type alias using VellumError.
pub type Result<T> = std::result::Result<T, VellumError>;

/// Errors that can occur in Vellum operations.
#[derive(Debug, Error)]
pub enum VellumError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Page store errors
    #[error("Page not found: {page_id}")]
    PageNotFound { page_id: u32 },

    #[error("Page corrupted: {page_id}, reason: {reason}")]
    PageCorrupted { page_id: u32, reason: String },

    #[error("Buffer pool full, unable to allocate frame")]
    BufferPoolFull,

    // Replacer errors
    #[error("Invalid frame id: {frame_id}")]
    InvalidFrame { frame_id: u32 },

    #[error("Frame {frame_id} is not evictable")]
    FrameNotEvictable { frame_id: u32 },

    // Index errors
    #[error("Header page full, unable to register index {0}")]
    HeaderFull(String),

    // Configuration errors
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_conversion() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: VellumError = io_err.into();
        assert!(matches!(err, VellumError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_page_not_found_display() {
        let err = VellumError::PageNotFound { page_id: 42 };
        assert_eq!(err.to_string(), "Page not found: 42");
    }

    #[test]
    fn test_page_corrupted_display() {
        let err = VellumError::PageCorrupted {
            page_id: 100,
            reason: "unknown node tag".to_string(),
        };
        assert_eq!(err.to_string(), "Page corrupted: 100, reason: unknown node tag");
    }

    #[test]
    fn test_buffer_pool_full_display() {
        let err = VellumError::BufferPoolFull;
        assert_eq!(err.to_string(), "Buffer pool full, unable to allocate frame");
    }

    #[test]
    fn test_replacer_errors_display() {
        let err = VellumError::InvalidFrame { frame_id: 99 };
        assert_eq!(err.to_string(), "Invalid frame id: 99");

        let err = VellumError::FrameNotEvictable { frame_id: 3 };
        assert_eq!(err.to_string(), "Frame 3 is not evictable");
    }

    #[test]
    fn test_header_full_display() {
        let err = VellumError::HeaderFull("orders_pk".to_string());
        assert_eq!(
            err.to_string(),
            "Header page full, unable to register index orders_pk"
        );
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = VellumError::InvalidParameter {
            name: "leaf_max_size".to_string(),
            value: "0".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid parameter: leaf_max_size = 0");
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(VellumError::BufferPoolFull)
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VellumError>();
    }
}
