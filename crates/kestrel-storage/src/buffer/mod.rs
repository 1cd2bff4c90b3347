//! Buffer pool manager for KestrelDB.
//!
//! The buffer pool manages a fixed-size pool of in-memory page frames,
//! mediating every page access between callers and the disk manager:
//!
//! - **Page caching**: at most one in-memory copy per page ID
//! - **Pin/unpin**: reference counting keeps resident pages stable while
//!   borrowed; pinned frames are never evicted
//! - **Dirty tracking**: modified pages are written back before their frame
//!   is reused, never silently discarded
//! - **LRU-K eviction**: cold frames (fewer than K accesses) are reclaimed
//!   before hot ones
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        BufferPool                          │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │                     Page Table                       │  │
//! │  │        ExtendibleHashTable<PageId, FrameId>          │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                            │                               │
//! │                            ▼                               │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │                    Frame Array                       │  │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐    ┌─────────┐  │  │
//! │  │  │ Frame 0 │ │ Frame 1 │ │ Frame 2 │ .. │ Frame N │  │  │
//! │  │  │ page_id │ │ page_id │ │ page_id │    │ page_id │  │  │
//! │  │  │ data[]  │ │ data[]  │ │ data[]  │    │ data[]  │  │  │
//! │  │  │ dirty   │ │ dirty   │ │ dirty   │    │ dirty   │  │  │
//! │  │  │ pin_cnt │ │ pin_cnt │ │ pin_cnt │    │ pin_cnt │  │  │
//! │  │  └─────────┘ └─────────┘ └─────────┘    └─────────┘  │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                            │                               │
//! │                            ▼                               │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │                    LruKReplacer                      │  │
//! │  │             (tracks eviction candidates)             │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kestrel_storage::buffer::{BufferPool, BufferPoolConfig};
//! use kestrel_storage::disk::DiskManager;
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let disk = Arc::new(DiskManager::open("data.db")?);
//!     let pool = BufferPool::new(BufferPoolConfig::new(64), disk)?;
//!
//!     let mut page = pool.new_page()?;
//!     page.data_mut()[..5].copy_from_slice(b"hello");
//!     let page_id = page.page_id();
//!     drop(page); // unpins
//!
//!     let page = pool.fetch_page(page_id)?;
//!     assert_eq!(&page.data()[..5], b"hello");
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod eviction;
mod frame;
mod latch;
mod pool;

pub use config::BufferPoolConfig;
pub use error::{BufferError, BufferResult};
pub use eviction::LruKReplacer;
pub use frame::BufferFrame;
pub use latch::PageGuard;
pub use pool::BufferPool;

/// Statistics for buffer pool monitoring.
#[derive(Debug, Clone, Default)]
pub struct BufferPoolStats {
    /// Total number of page fetches.
    pub fetches: u64,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (required disk read).
    pub misses: u64,
    /// Number of pages evicted.
    pub evictions: u64,
    /// Number of pages written back to disk.
    pub flushes: u64,
    /// Current number of pinned frames.
    pub pinned_frames: usize,
    /// Current number of dirty frames.
    pub dirty_frames: usize,
    /// Current number of frames on the free list.
    pub free_frames: usize,
}

impl BufferPoolStats {
    /// Returns the cache hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        if self.fetches == 0 {
            0.0
        } else {
            self.hits as f64 / self.fetches as f64
        }
    }
}
