//! I/O error types for the disk module.

use std::io;
use std::path::PathBuf;

use kestrel_common::types::PageId;
use thiserror::Error;

/// Result type for disk operations.
pub type DiskResult<T> = Result<T, DiskError>;

/// Errors that can occur during disk I/O operations.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum DiskError {
    /// Standard I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Failed to open the database file.
    #[error("failed to open database file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    /// Invalid page ID.
    #[error("invalid page ID: {page_id}")]
    InvalidPageId { page_id: PageId },

    /// Caller-supplied buffer does not match the page size.
    #[error("buffer size {actual} does not match page size {expected}")]
    BufferSize { expected: usize, actual: usize },
}

impl DiskError {
    /// Creates an invalid page ID error.
    pub fn invalid_page(page_id: PageId) -> Self {
        Self::InvalidPageId { page_id }
    }
}
