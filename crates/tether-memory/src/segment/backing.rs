// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Storage behind a segment.

use std::cell::UnsafeCell;
use std::sync::Arc;

/// Where a segment's bytes live.
#[derive(Clone)]
pub(super) enum Backing {
    /// Native memory starting at this address.
    Native(usize),
    /// A heap array kept alive by reference counting.
    Heap(Arc<HeapStore>),
}

impl Backing {
    /// Address of the first byte of the backing storage.
    pub(super) fn base(&self) -> *mut u8 {
        match self {
            Self::Native(addr) => *addr as *mut u8,
            Self::Heap(store) => store.base(),
        }
    }
}

/// Word-aligned heap array.
///
/// The storage is a boxed `u64` slice so that every element type up to
/// eight bytes sits at an aligned address, but the store reports the
/// element size it was created from as its maximum alignment.
pub(super) struct HeapStore {
    words: Box<[UnsafeCell<u64>]>,
    len: u64,
    element_size: u64,
}

// SAFETY: once the store is shared, its bytes are only read and written by
// the relaxed `AtomicU8` transfers in `access`, so concurrent use from
// several threads is free of data races.
unsafe impl Sync for HeapStore {}
// SAFETY: the store owns plain integers and no thread-bound state.
unsafe impl Send for HeapStore {}

impl HeapStore {
    /// Zeroed store of `len` bytes holding elements of `element_size` bytes.
    pub(super) fn zeroed(len: usize, element_size: u64) -> Self {
        Self {
            words: (0..len.div_ceil(8)).map(|_| UnsafeCell::new(0)).collect(),
            len: len as u64,
            element_size,
        }
    }

    /// Store holding a copy of `bytes`.
    pub(super) fn from_bytes(bytes: &[u8], element_size: u64) -> Self {
        let store = Self::zeroed(bytes.len(), element_size);
        // SAFETY: the store has room for `bytes.len()` bytes and is not yet
        // shared.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), store.base(), bytes.len());
        }
        store
    }

    pub(super) fn base(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.words.as_ptr()).cast::<u8>()
    }

    pub(super) const fn len(&self) -> u64 {
        self.len
    }

    pub(super) const fn element_size(&self) -> u64 {
        self.element_size
    }
}
