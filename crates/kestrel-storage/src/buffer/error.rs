//! Buffer pool errors.

use kestrel_common::types::PageId;
use thiserror::Error;

use crate::disk::DiskError;

/// Result type for buffer pool operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer pool operations.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum BufferError {
    /// No free or evictable frame is available; every page is pinned.
    #[error("no free or evictable frame available, all pages are pinned")]
    PoolExhausted,

    /// Invalid page ID.
    #[error("invalid page ID: {page_id}")]
    InvalidPageId { page_id: PageId },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Disk I/O error, propagated from the disk manager.
    #[error("disk I/O error: {0}")]
    Disk(#[from] DiskError),
}

impl BufferError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a transient error that can be retried once a
    /// page has been unpinned.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(BufferError::PoolExhausted.is_retryable());
        assert!(!BufferError::config("bad").is_retryable());
        assert!(!BufferError::InvalidPageId {
            page_id: PageId::INVALID
        }
        .is_retryable());
    }

    #[test]
    fn test_display() {
        let err = BufferError::InvalidPageId {
            page_id: PageId::INVALID,
        };
        assert_eq!(err.to_string(), "invalid page ID: -1");
    }
}
