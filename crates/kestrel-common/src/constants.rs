//! System-wide constants for KestrelDB.

// =============================================================================
// Page Constants
// =============================================================================

/// Size of a page in bytes (4 KB).
///
/// Every frame in the buffer pool holds exactly one page of this size, and
/// the disk manager addresses the database file in units of this size.
pub const PAGE_SIZE: usize = 4 * 1024;

// =============================================================================
// Buffer Pool Constants
// =============================================================================

/// Default number of frames in the buffer pool.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Default K for the LRU-K replacement policy.
///
/// A frame with fewer than K recorded accesses is considered cold and is
/// preferred for eviction over any frame with a full access history.
pub const DEFAULT_REPLACER_K: usize = 5;

/// Default number of entries per bucket in the page table's extendible hash.
pub const DEFAULT_BUCKET_SIZE: usize = 4;
