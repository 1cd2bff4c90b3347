//! Pinned page handles.
//!
//! This module provides the RAII guard returned by the buffer pool's
//! [`new_page`] and [`fetch_page`] operations. The guard keeps its frame
//! pinned and unpins through the pool when dropped, so the frame cannot be
//! repurposed while the borrow is live.
//!
//! [`new_page`]: super::BufferPool::new_page
//! [`fetch_page`]: super::BufferPool::fetch_page

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use kestrel_common::types::{FrameId, PageId};

use super::frame::BufferFrame;
use super::pool::BufferPool;

/// A pinned page in the buffer pool.
///
/// While a guard is live its frame's page ID does not change. Concurrent
/// guards over the same page may read the bytes in parallel; coordinating
/// concurrent writers to the same page is the caller's responsibility - the
/// pool does not arbitrate page-content access.
///
/// Dropping the guard unpins the page, reporting it dirty if the guard
/// handed out mutable access. Use [`unpin`](Self::unpin) to release with an
/// explicit dirty hint.
pub struct PageGuard<'a> {
    pool: &'a BufferPool,
    frame: Arc<BufferFrame>,
    page_id: PageId,
    /// Whether this guard handed out mutable access to the page bytes.
    modified: bool,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPool, frame: Arc<BufferFrame>, page_id: PageId) -> Self {
        Self {
            pool,
            frame,
            page_id,
            modified: false,
        }
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the ID of the frame holding the page.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Returns a read-only view of the page bytes.
    #[inline]
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame.read_data(),
        }
    }

    /// Returns a mutable view of the page bytes and marks the page dirty.
    #[inline]
    pub fn data_mut(&mut self) -> impl DerefMut<Target = [u8]> + '_ {
        self.modified = true;
        self.frame.set_dirty(true);
        PageDataMut {
            guard: self.frame.write_data(),
        }
    }

    /// Marks the page dirty without taking a mutable reference.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.modified = true;
        self.frame.set_dirty(true);
    }

    /// Returns true if the page is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.frame.is_dirty()
    }

    /// Returns the frame's current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.frame.pin_count()
    }

    /// Releases the guard with an explicit dirty hint.
    ///
    /// Equivalent to dropping the guard, except a `true` hint marks the page
    /// dirty even if no mutable access was taken through this guard.
    pub fn unpin(mut self, is_dirty: bool) {
        self.modified |= is_dirty;
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        let _ = self.pool.unpin_page(self.page_id, self.modified);
    }
}

impl std::fmt::Debug for PageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame.frame_id())
            .field("pin_count", &self.frame.pin_count())
            .field("modified", &self.modified)
            .finish()
    }
}

/// Helper struct to provide Deref for page data.
struct PageDataRef<'a> {
    guard: parking_lot::RwLockReadGuard<'a, Vec<u8>>,
}

impl Deref for PageDataRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Helper struct to provide DerefMut for page data.
struct PageDataMut<'a> {
    guard: parking_lot::RwLockWriteGuard<'a, Vec<u8>>,
}

impl Deref for PageDataMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for PageDataMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::{BufferPool, BufferPoolConfig};
    use crate::disk::DiskManager;

    fn test_pool(pool_size: usize) -> (tempfile::TempDir, BufferPool) {
        let dir = tempfile::tempdir().unwrap();
        let disk = Arc::new(DiskManager::open(dir.path().join("test.db")).unwrap());
        let pool = BufferPool::new(BufferPoolConfig::new(pool_size), disk).unwrap();
        (dir, pool)
    }

    #[test]
    fn test_guard_unpins_on_drop() {
        let (_dir, pool) = test_pool(4);

        let page = pool.new_page().unwrap();
        let page_id = page.page_id();
        assert_eq!(page.pin_count(), 1);
        drop(page);

        let page = pool.fetch_page(page_id).unwrap();
        assert_eq!(page.pin_count(), 1);
    }

    #[test]
    fn test_data_mut_marks_dirty() {
        let (_dir, pool) = test_pool(4);

        let mut page = pool.new_page().unwrap();
        assert!(!page.is_dirty());
        page.data_mut()[0] = 1;
        assert!(page.is_dirty());
    }

    #[test]
    fn test_unpin_with_dirty_hint() {
        let (_dir, pool) = test_pool(4);

        let page = pool.new_page().unwrap();
        let page_id = page.page_id();
        page.unpin(true);

        let page = pool.fetch_page(page_id).unwrap();
        assert!(page.is_dirty());
    }

    #[test]
    fn test_nested_pins() {
        let (_dir, pool) = test_pool(4);

        let first = pool.new_page().unwrap();
        let page_id = first.page_id();
        let second = pool.fetch_page(page_id).unwrap();
        assert_eq!(second.pin_count(), 2);

        drop(first);
        assert_eq!(second.pin_count(), 1);
    }
}
