// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Segment allocators.
//!
//! [`SegmentAllocator`] is implemented by [`Session`] (fresh zeroed native
//! memory), by [`SlicingAllocator`] (consecutive slices of one segment,
//! advancing a watermark) and by [`PrefixAllocator`] (always the start of
//! one segment, reused on every call).

use parking_lot::Mutex;
use tether_layout::{Carrier, Layout};
use tracing::trace;

use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::session::Session;

/// Source of segments.
pub trait SegmentAllocator {
    /// A segment of `size` bytes aligned to `align`.
    ///
    /// # Errors
    ///
    /// Implementation specific; see the implementors.
    fn allocate(&self, size: u64, align: u64) -> Result<Segment>;

    /// A segment with the size and alignment of `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] for layouts without a size, and
    /// fails as [`SegmentAllocator::allocate`] does otherwise.
    fn allocate_layout(&self, layout: &Layout) -> Result<Segment> {
        self.allocate(layout.byte_size()?, layout.byte_alignment())
    }

    /// A segment for `count` consecutive `element`s.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] if the total size overflows, and
    /// fails as [`SegmentAllocator::allocate`] does otherwise.
    fn allocate_array(&self, element: &Layout, count: u64) -> Result<Segment> {
        let size = element
            .byte_size()?
            .checked_mul(count)
            .ok_or_else(|| Error::illegal_argument(format!("{count} x {element} overflows")))?;
        self.allocate(size, element.byte_alignment())
    }

    /// A segment holding `text` as NUL-terminated UTF-8.
    ///
    /// # Errors
    ///
    /// Fails as [`SegmentAllocator::allocate`] does.
    fn allocate_utf8(&self, text: &str) -> Result<Segment> {
        let segment = self.allocate(text.len() as u64 + 1, 1)?;
        segment.set_utf8(0, text)?;
        Ok(segment)
    }

    /// A segment holding a copy of `values` in native byte order.
    ///
    /// # Errors
    ///
    /// Fails as [`SegmentAllocator::allocate_array`] does.
    fn allocate_from<T: Carrier>(&self, values: &[T]) -> Result<Segment>
    where
        Self: Sized,
    {
        let segment = self.allocate_array(&Layout::of::<T>(), values.len() as u64)?;
        segment.copy_from(&Segment::of_array(values))?;
        Ok(segment)
    }
}

impl SegmentAllocator for Session {
    fn allocate(&self, size: u64, align: u64) -> Result<Segment> {
        Self::allocate(self, size, align)
    }
}

fn check_align(align: u64) -> Result<()> {
    if align.is_power_of_two() {
        Ok(())
    } else {
        Err(Error::illegal_argument(format!(
            "alignment {align} is not a power of two"
        )))
    }
}

/// Hands out consecutive slices of a backing segment.
///
/// Each slice starts at the first suitably aligned address after the
/// previous one. Exhaustion fails with [`Error::IndexOutOfBounds`].
#[derive(Debug)]
pub struct SlicingAllocator {
    segment: Segment,
    watermark: Mutex<u64>,
}

impl SlicingAllocator {
    /// Allocator over `segment`, starting at its first byte.
    #[must_use]
    pub const fn new(segment: Segment) -> Self {
        Self {
            segment,
            watermark: Mutex::new(0),
        }
    }

    /// Bytes not yet handed out, ignoring alignment.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.segment.len().saturating_sub(*self.watermark.lock())
    }

    /// Start handing out slices from the beginning again.
    pub fn reset(&self) {
        *self.watermark.lock() = 0;
    }
}

impl SegmentAllocator for SlicingAllocator {
    fn allocate(&self, size: u64, align: u64) -> Result<Segment> {
        check_align(align)?;
        let mut watermark = self.watermark.lock();
        let base = self.segment.address();
        let start = base
            .checked_add(*watermark)
            .and_then(|at| at.checked_add(align - 1))
            .map(|at| (at & !(align - 1)) - base)
            .ok_or_else(|| Error::out_of_bounds(*watermark, size, self.segment.len()))?;

        let slice = self.segment.as_slice_len(start, size)?;
        *watermark = start + size;
        trace!(offset = start, size, align, "slice allocated");
        Ok(slice)
    }
}

/// Returns the start of a backing segment on every call.
///
/// Earlier results alias later ones; the allocator suits scratch space that
/// is consumed before the next allocation.
#[derive(Debug, Clone)]
pub struct PrefixAllocator {
    segment: Segment,
}

impl PrefixAllocator {
    /// Allocator over `segment`.
    #[must_use]
    pub const fn new(segment: Segment) -> Self {
        Self { segment }
    }
}

impl SegmentAllocator for PrefixAllocator {
    fn allocate(&self, size: u64, align: u64) -> Result<Segment> {
        check_align(align)?;
        self.segment.check_bounds(0, size)?;
        self.segment.check_alignment(0, align)?;
        self.segment.as_slice_len(0, size)
    }
}
