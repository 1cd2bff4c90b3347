//! Type definitions for KestrelDB.
//!
//! This module contains the core identifier types used across the storage
//! layer.

mod ids;

pub use ids::{FrameId, PageId};
