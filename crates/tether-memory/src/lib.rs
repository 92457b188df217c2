// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Sessions and bounds-checked memory segments.
//!
//! This crate owns the memory side of Tether:
//! - [`Session`]: lifetime of native allocations, with confined, shared,
//!   implicit and global variants and a lock-free close handshake
//! - [`Segment`]: a bounded view of native or heap memory whose every access
//!   is checked against its session, its bounds and the layout's alignment
//! - [`SegmentAllocator`]: sessions and slicing/prefix allocators
//! - [`Accessor`]: values nested in composite layouts, addressed by path
//!
//! # Modules
//!
//! - [`session`]: session kinds, close actions, forking
//! - [`segment`]: segments, typed access, element views
//! - [`allocator`]: the allocator trait and its implementations
//! - [`accessor`]: path-based accessors
//! - [`error`]: the shared error taxonomy

pub mod accessor;
pub mod allocator;
pub mod error;
pub mod scalar;
pub mod segment;
pub mod session;


// Re-export commonly used types at crate root
pub use accessor::Accessor;
pub use allocator::{PrefixAllocator, SegmentAllocator, SlicingAllocator};
pub use error::{Error, ErrorKind, Result, StateError};
pub use scalar::Scalar;
pub use segment::{ElementView, Segment};
pub use session::{Session, SessionGuard, SessionKind};
