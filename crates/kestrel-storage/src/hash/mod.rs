//! Extendible hashing.
//!
//! The buffer pool's page table is an [`ExtendibleHashTable`] mapping page
//! IDs to frame IDs. The table is generic so it can be tested independently
//! of the pool.

mod extendible;

pub use extendible::ExtendibleHashTable;
