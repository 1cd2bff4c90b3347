//! Buffer pool implementation.
//!
//! The pool owns the frame array, the free list, the page table, and the
//! replacer, and orchestrates them to service page requests. Every public
//! operation holds the pool latch for its whole duration; disk I/O happens
//! inside the critical section, trading throughput for a simple correctness
//! argument. The page table and replacer carry their own latches, acquired
//! in that order and only from within an operation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kestrel_common::types::{FrameId, PageId};
use parking_lot::Mutex;
use tracing::debug;

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::eviction::LruKReplacer;
use super::frame::BufferFrame;
use super::latch::PageGuard;
use super::BufferPoolStats;
use crate::disk::DiskManager;
use crate::hash::ExtendibleHashTable;

/// The buffer pool manages page caching for the database.
///
/// At most one in-memory copy exists per page ID, and at most `pool_size`
/// pages are resident. Callers receive [`PageGuard`]s: pinned borrows that
/// keep a frame stable until released.
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// Array of buffer frames, indexed by [`FrameId`].
    frames: Vec<Arc<BufferFrame>>,
    /// Page table: maps resident page IDs to frames.
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// LRU-K replacer for eviction.
    replacer: LruKReplacer,
    /// Disk manager for I/O.
    disk: Arc<DiskManager>,
    /// Pool latch: serializes all public operations.
    latch: Mutex<PoolState>,
    /// Fetch counter for statistics.
    fetch_count: AtomicU64,
    /// Hit counter for statistics.
    hit_count: AtomicU64,
    /// Miss counter for statistics.
    miss_count: AtomicU64,
    /// Eviction counter for statistics.
    eviction_count: AtomicU64,
    /// Write-back counter for statistics.
    flush_count: AtomicU64,
}

/// State mutated only while the pool latch is held.
struct PoolState {
    /// Frames not currently holding any page.
    free_list: VecDeque<FrameId>,
    /// Next page ID to hand out.
    next_page_id: i32,
}

impl BufferPool {
    /// Creates a new buffer pool over the given disk manager.
    pub fn new(config: BufferPoolConfig, disk: Arc<DiskManager>) -> BufferResult<Self> {
        config.validate().map_err(BufferError::config)?;

        let frames: Vec<Arc<BufferFrame>> = (0..config.pool_size)
            .map(|i| Arc::new(BufferFrame::new(FrameId::new(i as u32))))
            .collect();
        let free_list: VecDeque<FrameId> = frames.iter().map(|f| f.frame_id()).collect();

        Ok(Self {
            page_table: ExtendibleHashTable::new(config.bucket_size),
            replacer: LruKReplacer::new(config.pool_size, config.replacer_k),
            config,
            frames,
            disk,
            latch: Mutex::new(PoolState {
                free_list,
                next_page_id: 0,
            }),
            fetch_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Creates a new page and returns it pinned.
    ///
    /// The page starts zeroed and clean, with a freshly allocated ID.
    /// Returns [`BufferError::PoolExhausted`] when no frame is free and no
    /// resident page is evictable.
    pub fn new_page(&self) -> BufferResult<PageGuard<'_>> {
        let mut state = self.latch.lock();

        let frame = self.acquire_frame(&mut state)?;
        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += 1;

        frame.set_page_id(page_id);
        frame.pin();
        self.page_table.insert(page_id, frame.frame_id());
        self.replacer.record_access(frame.frame_id());
        self.replacer.set_evictable(frame.frame_id(), false);

        Ok(PageGuard::new(self, frame, page_id))
    }

    /// Fetches the page with the given ID and returns it pinned.
    ///
    /// A resident page is returned directly; otherwise a frame is obtained
    /// (evicting if necessary) and the page is read from disk. Returns
    /// [`BufferError::PoolExhausted`] on a miss when no frame can be freed.
    pub fn fetch_page(&self, page_id: PageId) -> BufferResult<PageGuard<'_>> {
        if !page_id.is_valid() {
            return Err(BufferError::InvalidPageId { page_id });
        }

        let mut state = self.latch.lock();
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        if let Some(frame_id) = self.page_table.find(&page_id) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            let frame = Arc::clone(&self.frames[frame_id.index()]);
            frame.pin();
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);
            return Ok(PageGuard::new(self, frame, page_id));
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let frame = self.acquire_frame(&mut state)?;
        {
            let mut data = frame.write_data();
            if let Err(e) = self.disk.read_page(page_id, &mut data) {
                // The frame was already detached from the replacer and the
                // free list; park it back on the free list so it is not lost.
                drop(data);
                state.free_list.push_back(frame.frame_id());
                return Err(e.into());
            }
        }
        frame.set_page_id(page_id);
        frame.pin();
        self.page_table.insert(page_id, frame.frame_id());
        self.replacer.record_access(frame.frame_id());
        self.replacer.set_evictable(frame.frame_id(), false);

        Ok(PageGuard::new(self, frame, page_id))
    }

    /// Releases one pin on the page, optionally declaring it dirty.
    ///
    /// Returns `false` if the page is not resident or its pin count is
    /// already zero. The dirty flag is monotonic: a `false` hint never
    /// clears a previously set flag. When the pin count reaches zero the
    /// frame becomes an eviction candidate.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let _guard = self.latch.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() == 0 {
            return false;
        }

        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes the page's bytes to disk, regardless of the dirty flag.
    ///
    /// Returns `Ok(false)` if the page is not resident. Residency and pin
    /// state are unchanged; the dirty flag is cleared since disk and memory
    /// now agree.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<bool> {
        let _guard = self.latch.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id.index()];
        self.disk.write_page(page_id, &frame.read_data())?;
        frame.set_dirty(false);
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Writes every resident page to disk and returns how many were written.
    pub fn flush_all_pages(&self) -> BufferResult<usize> {
        let _guard = self.latch.lock();

        let mut flushed = 0;
        for frame in &self.frames {
            let page_id = frame.page_id();
            if !page_id.is_valid() {
                continue;
            }
            self.disk.write_page(page_id, &frame.read_data())?;
            frame.set_dirty(false);
            flushed += 1;
        }
        self.flush_count.fetch_add(flushed as u64, Ordering::Relaxed);
        Ok(flushed)
    }

    /// Deletes the page from the pool and releases its ID.
    ///
    /// A page that is not resident is treated as already deleted: the ID is
    /// deallocated and the call returns `Ok(true)`. A pinned page cannot be
    /// deleted (`Ok(false)`). Otherwise the page is written back if dirty,
    /// unmapped, its frame reset onto the free list, and the ID deallocated.
    pub fn delete_page(&self, page_id: PageId) -> BufferResult<bool> {
        let mut state = self.latch.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            self.disk.deallocate_page(page_id);
            return Ok(true);
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        if frame.is_dirty() {
            self.disk.write_page(page_id, &frame.read_data())?;
            self.flush_count.fetch_add(1, Ordering::Relaxed);
        }

        self.page_table.remove(&page_id);
        self.replacer.remove(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);
        self.disk.deallocate_page(page_id);
        debug!(%page_id, %frame_id, "page deleted");
        Ok(true)
    }

    /// Returns true if the page is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.page_table.find(&page_id).is_some()
    }

    /// Returns the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned = 0;
        let mut dirty = 0;
        for frame in &self.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }

        BufferPoolStats {
            fetches: self.fetch_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
            free_frames: self.latch.lock().free_list.len(),
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Obtains a frame for a new resident page: the free list first, then an
    /// eviction victim. An evicted page is written back if dirty and unmapped
    /// from the page table. The returned frame is reset.
    fn acquire_frame(&self, state: &mut PoolState) -> BufferResult<Arc<BufferFrame>> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(Arc::clone(&self.frames[frame_id.index()]));
        }

        let frame_id = self.replacer.evict().ok_or(BufferError::PoolExhausted)?;
        let frame = Arc::clone(&self.frames[frame_id.index()]);
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            debug!(page_id = %old_page_id, %frame_id, "writing back dirty page before reuse");
            self.disk.write_page(old_page_id, &frame.read_data())?;
            self.flush_count.fetch_add(1, Ordering::Relaxed);
        }
        self.page_table.remove(&old_page_id);
        self.eviction_count.fetch_add(1, Ordering::Relaxed);
        frame.reset();
        Ok(frame)
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("pool_size", &self.config.pool_size)
            .field("replacer_k", &self.config.replacer_k)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool(pool_size: usize) -> (tempfile::TempDir, Arc<DiskManager>, BufferPool) {
        let dir = tempfile::tempdir().unwrap();
        let disk = Arc::new(DiskManager::open(dir.path().join("test.db")).unwrap());
        let pool = BufferPool::new(BufferPoolConfig::new(pool_size), Arc::clone(&disk)).unwrap();
        (dir, disk, pool)
    }

    #[test]
    fn test_pool_creation() {
        let (_dir, _disk, pool) = test_pool(16);
        assert_eq!(pool.pool_size(), 16);
        let stats = pool.stats();
        assert_eq!(stats.free_frames, 16);
        assert_eq!(stats.pinned_frames, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let disk = Arc::new(DiskManager::open(dir.path().join("test.db")).unwrap());
        let result = BufferPool::new(BufferPoolConfig::new(0), disk);
        assert!(matches!(result, Err(BufferError::Config { .. })));
    }

    #[test]
    fn test_new_page_ids_are_monotonic() {
        let (_dir, _disk, pool) = test_pool(4);
        for expected in 0..4 {
            let page = pool.new_page().unwrap();
            assert_eq!(page.page_id(), PageId::new(expected));
            assert_eq!(page.pin_count(), 1);
        }
    }

    #[test]
    fn test_new_page_starts_zeroed() {
        let (_dir, _disk, pool) = test_pool(2);

        // Dirty a page, release it, and force its frame to be reused.
        {
            let mut page = pool.new_page().unwrap();
            page.data_mut().fill(0xab);
        }
        {
            let _hold = pool.new_page().unwrap();
            let page = pool.new_page().unwrap();
            assert!(page.data().iter().all(|&b| b == 0));
            assert!(!page.is_dirty());
        }
    }

    #[test]
    fn test_fetch_invalid_page_id() {
        let (_dir, _disk, pool) = test_pool(4);
        assert!(matches!(
            pool.fetch_page(PageId::INVALID),
            Err(BufferError::InvalidPageId { .. })
        ));
    }

    #[test]
    fn test_fetch_hit_and_miss_stats() {
        let (_dir, _disk, pool) = test_pool(4);

        let page_id = {
            let page = pool.new_page().unwrap();
            page.page_id()
        };

        // Resident: hit.
        drop(pool.fetch_page(page_id).unwrap());
        // Evict it, then fetch again: miss.
        {
            let _a = pool.new_page().unwrap();
            let _b = pool.new_page().unwrap();
            let _c = pool.new_page().unwrap();
            let _d = pool.new_page().unwrap();
        }
        assert!(!pool.contains(page_id));
        drop(pool.fetch_page(page_id).unwrap());

        let stats = pool.stats();
        assert_eq!(stats.fetches, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unpin_not_resident() {
        let (_dir, _disk, pool) = test_pool(4);
        assert!(!pool.unpin_page(PageId::new(42), false));
    }

    #[test]
    fn test_over_unpin_returns_false() {
        let (_dir, _disk, pool) = test_pool(4);
        let page = pool.new_page().unwrap();
        let page_id = page.page_id();
        page.unpin(false);
        assert!(!pool.unpin_page(page_id, false));
    }

    #[test]
    fn test_dirty_flag_is_monotonic() {
        let (_dir, _disk, pool) = test_pool(4);

        let page = pool.new_page().unwrap();
        let page_id = page.page_id();
        page.unpin(true);

        // A clean unpin must not clear the flag.
        let page = pool.fetch_page(page_id).unwrap();
        page.unpin(false);
        assert_eq!(pool.stats().dirty_frames, 1);
    }

    #[test]
    fn test_flush_page_clears_dirty() {
        let (_dir, disk, pool) = test_pool(4);

        let mut page = pool.new_page().unwrap();
        let page_id = page.page_id();
        page.data_mut()[..4].copy_from_slice(b"data");
        drop(page);

        assert_eq!(pool.stats().dirty_frames, 1);
        assert!(pool.flush_page(page_id).unwrap());
        assert_eq!(pool.stats().dirty_frames, 0);

        let mut on_disk = vec![0u8; kestrel_common::constants::PAGE_SIZE];
        disk.read_page(page_id, &mut on_disk).unwrap();
        assert_eq!(&on_disk[..4], b"data");
    }

    #[test]
    fn test_flush_not_resident() {
        let (_dir, _disk, pool) = test_pool(4);
        assert!(!pool.flush_page(PageId::new(42)).unwrap());
    }

    #[test]
    fn test_flush_all_pages() {
        let (_dir, _disk, pool) = test_pool(8);

        for _ in 0..5 {
            let mut page = pool.new_page().unwrap();
            page.data_mut()[0] = 1;
        }
        assert_eq!(pool.flush_all_pages().unwrap(), 5);
        assert_eq!(pool.stats().dirty_frames, 0);
    }

    #[test]
    fn test_delete_page_frees_frame() {
        let (_dir, disk, pool) = test_pool(4);

        let page = pool.new_page().unwrap();
        let page_id = page.page_id();
        drop(page);

        assert!(pool.delete_page(page_id).unwrap());
        assert!(!pool.contains(page_id));
        assert_eq!(pool.stats().free_frames, 4);
        assert_eq!(disk.num_deallocations(), 1);
    }

    #[test]
    fn test_delete_not_resident_deallocates() {
        let (_dir, disk, pool) = test_pool(4);
        assert!(pool.delete_page(PageId::new(99)).unwrap());
        assert_eq!(disk.num_deallocations(), 1);
    }

    #[test]
    fn test_eviction_writes_back_dirty_page() {
        let (_dir, disk, pool) = test_pool(1);

        let mut page = pool.new_page().unwrap();
        let page_id = page.page_id();
        page.data_mut()[..5].copy_from_slice(b"saved");
        drop(page);

        // The only frame is reused, forcing a write-back.
        let _other = pool.new_page().unwrap();
        assert!(!pool.contains(page_id));

        let mut on_disk = vec![0u8; kestrel_common::constants::PAGE_SIZE];
        disk.read_page(page_id, &mut on_disk).unwrap();
        assert_eq!(&on_disk[..5], b"saved");
        assert_eq!(pool.stats().evictions, 1);
    }
}
