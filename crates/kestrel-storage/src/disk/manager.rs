//! Page-granular file I/O.
//!
//! [`DiskManager`] owns the database file and serializes access to it with a
//! single latch. Reads and writes operate on whole pages; the buffer pool is
//! the only intended caller.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use kestrel_common::constants::PAGE_SIZE;
use kestrel_common::types::PageId;
use parking_lot::Mutex;
use tracing::debug;

use super::error::{DiskError, DiskResult};

/// Synchronous disk manager for a single database file.
///
/// Pages live at offset `page_id * PAGE_SIZE`. The manager does not assign
/// page IDs - the buffer pool allocates them from its own counter and only
/// reports deallocations back here.
pub struct DiskManager {
    /// The database file, behind a latch so reads and writes are atomic
    /// seek-then-transfer pairs.
    file: Mutex<File>,
    /// Path of the database file.
    path: PathBuf,
    /// Number of completed page reads.
    read_count: AtomicU64,
    /// Number of completed page writes.
    write_count: AtomicU64,
    /// Page IDs the buffer pool has released. Bookkeeping only; the file is
    /// never shrunk.
    deallocated: Mutex<Vec<PageId>>,
}

impl DiskManager {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DiskResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| DiskError::Open {
                path: path.clone(),
                source: e,
            })?;

        Ok(Self {
            file: Mutex::new(file),
            path,
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
            deallocated: Mutex::new(Vec::new()),
        })
    }

    /// Reads the page into `buf`.
    ///
    /// A page that was allocated but never written lies beyond the end of
    /// the file; the unread remainder of `buf` is zero-filled rather than
    /// treated as an error.
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        self.check_request(page_id, buf.len())?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(Self::page_offset(page_id)))?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < buf.len() {
            debug!(%page_id, bytes = filled, "short page read, zero-filling remainder");
            buf[filled..].fill(0);
        }

        self.read_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes the page from `buf` and flushes it to the file.
    pub fn write_page(&self, page_id: PageId, buf: &[u8]) -> DiskResult<()> {
        self.check_request(page_id, buf.len())?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(Self::page_offset(page_id)))?;
        file.write_all(buf)?;
        file.flush()?;

        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Records that the buffer pool has released `page_id`.
    ///
    /// The ID space is owned by the buffer pool; this is bookkeeping so the
    /// file layer knows which slots no longer hold live data.
    pub fn deallocate_page(&self, page_id: PageId) {
        debug!(%page_id, "page deallocated");
        self.deallocated.lock().push(page_id);
    }

    /// Syncs all buffered file data to durable storage.
    pub fn sync(&self) -> DiskResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of page reads served so far.
    pub fn num_reads(&self) -> u64 {
        self.read_count.load(Ordering::Relaxed)
    }

    /// Number of page writes served so far.
    pub fn num_writes(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Number of page deallocations recorded so far.
    pub fn num_deallocations(&self) -> usize {
        self.deallocated.lock().len()
    }

    fn page_offset(page_id: PageId) -> u64 {
        page_id.as_i32() as u64 * PAGE_SIZE as u64
    }

    fn check_request(&self, page_id: PageId, buf_len: usize) -> DiskResult<()> {
        if !page_id.is_valid() {
            return Err(DiskError::invalid_page(page_id));
        }
        if buf_len != PAGE_SIZE {
            return Err(DiskError::BufferSize {
                expected: PAGE_SIZE,
                actual: buf_len,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for DiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskManager")
            .field("path", &self.path)
            .field("reads", &self.num_reads())
            .field("writes", &self.num_writes())
            .finish()
    }
}
