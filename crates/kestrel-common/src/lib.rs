//! # kestrel-common
//!
//! Common types and constants for KestrelDB.
//!
//! This crate provides the foundational types shared by the KestrelDB
//! storage components. It includes:
//!
//! - **Types**: Core identifiers (`PageId`, `FrameId`)
//! - **Constants**: Page geometry and buffer pool defaults
//!
//! ## Example
//!
//! ```rust
//! use kestrel_common::types::{FrameId, PageId};
//!
//! let page_id = PageId::new(42);
//! assert!(page_id.is_valid());
//!
//! let frame_id = FrameId::new(0);
//! assert_eq!(frame_id.index(), 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use types::{FrameId, PageId};
