//! End-to-end buffer pool scenarios.

use std::sync::Arc;

use kestrel_common::constants::PAGE_SIZE;
use kestrel_common::types::PageId;
use kestrel_storage::buffer::{BufferError, BufferPool, BufferPoolConfig};
use kestrel_storage::disk::DiskManager;
use rand::Rng;

fn test_pool(pool_size: usize) -> (tempfile::TempDir, Arc<DiskManager>, BufferPool) {
    test_pool_with(pool_size, 5)
}

fn test_pool_with(
    pool_size: usize,
    replacer_k: usize,
) -> (tempfile::TempDir, Arc<DiskManager>, BufferPool) {
    let dir = tempfile::tempdir().unwrap();
    let disk = Arc::new(DiskManager::open(dir.path().join("test.db")).unwrap());
    let config = BufferPoolConfig::new(pool_size).with_replacer_k(replacer_k);
    let pool = BufferPool::new(config, Arc::clone(&disk)).unwrap();
    (dir, disk, pool)
}

#[test]
fn fill_pool_then_block_until_unpin() {
    let (_dir, _disk, pool) = test_pool(10);

    let mut guards = Vec::new();
    for i in 0..10 {
        let guard = pool.new_page().unwrap();
        assert_eq!(guard.page_id(), PageId::new(i));
        guards.push(guard);
    }

    // Every frame is pinned; no new page can be created.
    for _ in 0..10 {
        assert!(matches!(pool.new_page(), Err(BufferError::PoolExhausted)));
    }

    // One unpin frees exactly one slot, and the new page gets a fresh ID.
    guards.remove(0).unpin(true);
    let guard = pool.new_page().unwrap();
    assert_eq!(guard.page_id(), PageId::new(10));
}

#[test]
fn evicted_page_is_written_back_and_refetched() {
    let (_dir, _disk, pool) = test_pool(10);

    let mut page0 = pool.new_page().unwrap();
    assert_eq!(page0.page_id(), PageId::new(0));
    page0.data_mut()[..5].copy_from_slice(b"Hello");

    let mut guards = Vec::new();
    for _ in 1..10 {
        guards.push(pool.new_page().unwrap());
    }
    assert!(pool.new_page().is_err());

    // Unpin pages 0..=4; page 0 carries the dirty flag from the write above.
    drop(page0);
    for guard in guards.drain(..4) {
        guard.unpin(true);
    }

    // Pin four new pages; they reuse the frames of pages 0..=3.
    let mut new_guards = Vec::new();
    for _ in 0..4 {
        new_guards.push(pool.new_page().unwrap());
    }

    // Page 0 was evicted with a write-back; exactly one evictable frame is
    // left for re-reading it.
    let page0 = pool.fetch_page(PageId::new(0)).unwrap();
    assert_eq!(&page0.data()[..5], b"Hello");

    // Unpinning page 0 and pinning one more page leaves every frame pinned.
    page0.unpin(true);
    let _last = pool.new_page().unwrap();
    assert!(matches!(
        pool.fetch_page(PageId::new(0)),
        Err(BufferError::PoolExhausted)
    ));
}

#[test]
fn binary_page_images_survive_eviction() {
    let (_dir, _disk, pool) = test_pool(10);

    let mut rng = rand::thread_rng();
    let mut image = vec![0u8; PAGE_SIZE];
    rng.fill(&mut image[..]);
    // Interior and trailing NULs must round-trip like any other byte.
    image[PAGE_SIZE / 2] = 0;
    image[PAGE_SIZE - 1] = 0;

    let mut page0 = pool.new_page().unwrap();
    page0.data_mut().copy_from_slice(&image);
    assert_eq!(&*page0.data(), &image[..]);

    let mut guards = Vec::new();
    for _ in 1..10 {
        guards.push(pool.new_page().unwrap());
    }
    assert!(pool.new_page().is_err());

    drop(page0);
    for guard in guards.drain(..4) {
        guard.unpin(true);
    }
    for i in 0..5 {
        assert!(pool.flush_page(PageId::new(i)).unwrap());
    }

    for _ in 0..5 {
        let guard = pool.new_page().unwrap();
        guard.unpin(false);
    }

    let page0 = pool.fetch_page(PageId::new(0)).unwrap();
    assert_eq!(&*page0.data(), &image[..]);
}

#[test]
fn delete_requires_unpin() {
    let (_dir, disk, pool) = test_pool(10);

    let guard = pool.new_page().unwrap();
    let page_id = guard.page_id();
    assert!(!pool.delete_page(page_id).unwrap());

    guard.unpin(false);
    assert!(pool.delete_page(page_id).unwrap());
    assert!(!pool.contains(page_id));
    assert_eq!(disk.num_deallocations(), 1);

    // The deleted ID is surrendered for good; new pages get fresh IDs.
    let next = pool.new_page().unwrap();
    assert_eq!(next.page_id(), PageId::new(1));
}

#[test]
fn lru_k_evicts_cold_pages_before_hot() {
    let (_dir, _disk, pool) = test_pool_with(4, 2);

    let ids: Vec<PageId> = (0..4)
        .map(|_| {
            let guard = pool.new_page().unwrap();
            let id = guard.page_id();
            guard.unpin(false);
            id
        })
        .collect();

    // A second access makes the last page hot (K = 2); the rest stay cold.
    drop(pool.fetch_page(ids[3]).unwrap());

    // Each new page claims the oldest cold frame; the hot page survives
    // until no cold frame is left, despite its older first access.
    let _a = pool.new_page().unwrap();
    assert!(!pool.contains(ids[0]));
    assert!(pool.contains(ids[3]));

    let _b = pool.new_page().unwrap();
    let _c = pool.new_page().unwrap();
    assert!(!pool.contains(ids[1]));
    assert!(!pool.contains(ids[2]));
    assert!(pool.contains(ids[3]));

    let _d = pool.new_page().unwrap();
    assert!(!pool.contains(ids[3]));
}

#[test]
fn many_pages_round_trip_through_small_pool() {
    let (_dir, _disk, pool) = test_pool(5);

    for i in 0..20u32 {
        let mut guard = pool.new_page().unwrap();
        guard.data_mut()[..4].copy_from_slice(&i.to_be_bytes());
        guard.unpin(true);
    }

    for i in 0..20u32 {
        let guard = pool.fetch_page(PageId::new(i as i32)).unwrap();
        assert_eq!(&guard.data()[..4], &i.to_be_bytes());
        guard.unpin(false);
    }
}

#[test]
fn flush_is_idempotent() {
    let (_dir, disk, pool) = test_pool(4);

    let mut guard = pool.new_page().unwrap();
    let page_id = guard.page_id();
    guard.data_mut()[..7].copy_from_slice(b"flushme");
    drop(guard);

    assert!(pool.flush_page(page_id).unwrap());
    let mut first = vec![0u8; PAGE_SIZE];
    disk.read_page(page_id, &mut first).unwrap();

    assert!(pool.flush_page(page_id).unwrap());
    let mut second = vec![0u8; PAGE_SIZE];
    disk.read_page(page_id, &mut second).unwrap();

    assert_eq!(first, second);
    assert_eq!(&first[..7], b"flushme");
}

#[test]
fn clean_unpin_never_clears_dirty_flag() {
    let (_dir, disk, pool) = test_pool(2);

    let mut guard = pool.new_page().unwrap();
    let page_id = guard.page_id();
    guard.data_mut()[..5].copy_from_slice(b"dirty");
    guard.unpin(true);

    // Re-pin and release clean; the earlier dirty declaration must stick,
    // so eviction still writes the page back.
    let guard = pool.fetch_page(page_id).unwrap();
    guard.unpin(false);

    let _a = pool.new_page().unwrap();
    let _b = pool.new_page().unwrap();
    assert!(!pool.contains(page_id));

    let mut on_disk = vec![0u8; PAGE_SIZE];
    disk.read_page(page_id, &mut on_disk).unwrap();
    assert_eq!(&on_disk[..5], b"dirty");
}

#[test]
fn flush_all_writes_every_resident_page() {
    let (_dir, disk, pool) = test_pool(8);

    let mut ids = Vec::new();
    for i in 0..6u32 {
        let mut guard = pool.new_page().unwrap();
        guard.data_mut()[..4].copy_from_slice(&i.to_be_bytes());
        ids.push(guard.page_id());
        guard.unpin(true);
    }

    assert_eq!(pool.flush_all_pages().unwrap(), 6);

    let mut buf = vec![0u8; PAGE_SIZE];
    for (i, page_id) in ids.iter().enumerate() {
        disk.read_page(*page_id, &mut buf).unwrap();
        assert_eq!(&buf[..4], &(i as u32).to_be_bytes());
    }
}
