//! # kestrel-storage
//!
//! The KestrelDB buffer pool subsystem: the in-memory caching layer that
//! sits between the rest of the engine and the on-disk database file.
//!
//! This crate provides:
//!
//! - **Buffer pool**: a fixed-capacity page cache with pinned RAII handles,
//!   LRU-K replacement, and dirty-page write-back
//! - **Page table**: an extendible hash directory mapping page IDs to frames
//! - **Disk manager**: synchronous page-granular file I/O

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Buffer pool manager, frames, and the replacement policy
pub mod buffer;

/// Synchronous disk I/O
pub mod disk;

/// Extendible hashing
pub mod hash;
