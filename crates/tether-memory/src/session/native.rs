// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Zero-initialised native memory blocks owned by a session.

use std::alloc::{self, Layout as AllocLayout};
use std::ptr::NonNull;

use crate::error::{Error, Result};

/// A block from the global allocator, freed by [`NativeBlock::free`].
#[derive(Debug)]
pub(super) struct NativeBlock {
    addr: usize,
    layout: AllocLayout,
}

impl NativeBlock {
    /// Allocate `size` zeroed bytes aligned to `align`.
    ///
    /// `size` must be positive and `align` a power of two; requests the
    /// platform cannot satisfy fail with [`Error::OutOfMemory`].
    pub(super) fn allocate(size: u64, align: u64) -> Result<Self> {
        if size == 0 {
            return Err(Error::illegal_argument("allocation size must be positive"));
        }
        if !align.is_power_of_two() {
            return Err(Error::illegal_argument(format!(
                "alignment {align} is not a power of two"
            )));
        }
        let oom = Error::OutOfMemory { size };
        let size_usize = usize::try_from(size).map_err(|_| oom.clone())?;
        let align_usize = usize::try_from(align).map_err(|_| oom.clone())?;
        let layout = AllocLayout::from_size_align(size_usize, align_usize).map_err(|_| oom.clone())?;

        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(oom)?;
        Ok(Self {
            addr: ptr.as_ptr() as usize,
            layout,
        })
    }

    pub(super) const fn addr(&self) -> usize {
        self.addr
    }

    /// Return the block to the global allocator.
    pub(super) fn free(self) {
        // SAFETY: `addr` was returned by `alloc_zeroed` with this exact
        // layout, and `self` is consumed so the block is freed once.
        unsafe { alloc::dealloc(self.addr as *mut u8, self.layout) };
    }
}
