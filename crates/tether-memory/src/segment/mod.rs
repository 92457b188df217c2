// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Memory segments.
//!
//! A [`Segment`] is a bounded view of native or heap memory, governed by a
//! [`Session`]. Every access checks, in order:
//!
//! 1. the calling thread and the session's liveness,
//! 2. for writes, that the segment is not read-only,
//! 3. that the accessed range lies inside the segment,
//! 4. that the address is aligned for the accessed layout.
//!
//! Slices, clones and read-only views share storage and session with the
//! segment they were derived from; validity is never cached.
//!
//! # Concurrent access
//!
//! Segments of shared sessions may be read and written from several threads
//! at once. Every byte is transferred with a relaxed atomic operation, so
//! racing accesses are defined but unordered: a multi-byte value read while
//! another thread writes it may mix bytes of the old and new value, and no
//! access orders any other. Callers that need a consistent view synchronize
//! outside the segment.

mod access;
mod backing;
mod view;


pub use view::ElementView;

use std::fmt;
use std::sync::Arc;

use tether_layout::{ByteOrder, Carrier, Layout};

use crate::error::{Error, Result};
use crate::session::Session;
use backing::{Backing, HeapStore};

/// Bounded, session-checked view of memory.
///
/// Accesses through `&self` may race; see the [module docs](self) for what
/// a racing reader observes.
#[derive(Clone)]
pub struct Segment {
    backing: Backing,
    /// Start of this segment relative to the backing storage.
    offset: u64,
    len: u64,
    read_only: bool,
    session: Session,
}

impl Segment {
    pub(crate) fn native(addr: usize, len: u64, session: Session) -> Self {
        Self {
            backing: Backing::Native(addr),
            offset: 0,
            len,
            read_only: false,
            session,
        }
    }

    /// Zero-length native segment at `addr` in the global session.
    ///
    /// Use [`Segment::reinterpret`] to give it a size.
    #[must_use]
    pub fn of_address(addr: u64) -> Self {
        Self::native(addr as usize, 0, Session::global())
    }

    /// The zero-length segment at address zero.
    #[must_use]
    pub fn null() -> Self {
        Self::of_address(0)
    }

    /// Heap segment holding a copy of `values` in native byte order.
    ///
    /// Writes through the segment never reach `values`. The segment belongs
    /// to the global session; its maximum alignment is the element size.
    #[must_use]
    pub fn of_array<T: Carrier>(values: &[T]) -> Self {
        let size = T::BITS / 8;
        let bytes: Vec<u8> = values
            .iter()
            .flat_map(|v| {
                access::encode(v.to_bits(), size, ByteOrder::NATIVE)
                    .into_iter()
                    .take(size as usize)
            })
            .collect();
        Self::heap(HeapStore::from_bytes(&bytes, size))
    }

    /// Heap segment holding a copy of `bytes`.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self::heap(HeapStore::from_bytes(bytes, 1))
    }

    fn heap(store: HeapStore) -> Self {
        Self {
            len: store.len(),
            backing: Backing::Heap(Arc::new(store)),
            offset: 0,
            read_only: false,
            session: Session::global(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Size in bytes.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether the segment has no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether writes are rejected.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether the segment views native memory.
    #[must_use]
    pub const fn is_native(&self) -> bool {
        matches!(self.backing, Backing::Native(_))
    }

    /// Session governing this segment.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Native address of the first byte; for heap segments, the offset into
    /// the heap array.
    #[must_use]
    pub fn address(&self) -> u64 {
        match self.backing {
            Backing::Native(base) => base as u64 + self.offset,
            Backing::Heap(_) => self.offset,
        }
    }

    /// Largest power of two (up to 2^62) that divides the address, bounded
    /// by the element size for heap segments.
    #[must_use]
    pub fn max_byte_alignment(&self) -> u64 {
        let address = self.address();
        let natural = if address == 0 {
            1 << 62
        } else {
            1 << address.trailing_zeros().min(62)
        };
        match &self.backing {
            Backing::Native(_) => natural,
            Backing::Heap(store) => natural.min(store.element_size()),
        }
    }

    // =========================================================================
    // Derived segments
    // =========================================================================

    /// The bytes from `offset` to the end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfBounds`] if `offset` exceeds the length.
    pub fn as_slice(&self, offset: u64) -> Result<Self> {
        let len = self
            .len
            .checked_sub(offset)
            .ok_or_else(|| Error::out_of_bounds(offset, 0, self.len))?;
        self.as_slice_len(offset, len)
    }

    /// `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfBounds`] if the range leaves the segment.
    pub fn as_slice_len(&self, offset: u64, len: u64) -> Result<Self> {
        self.check_bounds(offset, len)?;
        Ok(Self {
            offset: self.offset + offset,
            len,
            ..self.clone()
        })
    }

    /// The bytes of `layout` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfBounds`] if the range leaves the segment,
    /// [`Error::Misaligned`] if `offset` is not aligned for `layout`, or
    /// [`Error::IllegalArgument`] if `layout` has no size.
    pub fn as_slice_layout(&self, offset: u64, layout: &Layout) -> Result<Self> {
        let len = layout.byte_size()?;
        self.check_bounds(offset, len)?;
        self.check_alignment(offset, layout.byte_alignment())?;
        self.as_slice_len(offset, len)
    }

    /// Read-only view of the same bytes.
    #[must_use]
    pub fn as_read_only(&self) -> Self {
        Self {
            read_only: true,
            ..self.clone()
        }
    }

    /// Same native memory with a different length.
    ///
    /// # Safety
    ///
    /// The caller guarantees that `len` bytes starting at this segment's
    /// address are valid for as long as the session is alive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] for heap segments.
    pub unsafe fn reinterpret(&self, len: u64) -> Result<Self> {
        if !self.is_native() {
            return Err(Error::illegal_argument(
                "heap segments cannot be reinterpreted",
            ));
        }
        Ok(Self {
            len,
            ..self.clone()
        })
    }

    /// Same native memory with a different length and session.
    ///
    /// # Safety
    ///
    /// As for [`Segment::reinterpret`], with `session` bounding the lifetime
    /// of the memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] for heap segments.
    pub unsafe fn reinterpret_in(&self, len: u64, session: &Session) -> Result<Self> {
        // SAFETY: forwarded to the caller.
        let resized = unsafe { self.reinterpret(len)? };
        Ok(Self {
            session: session.clone(),
            ..resized
        })
    }

    /// Whether both segments view some common byte.
    #[must_use]
    pub fn is_overlapping(&self, other: &Self) -> bool {
        self.overlap(other).is_some()
    }

    /// The part of this segment that overlaps `other`.
    #[must_use]
    pub fn as_overlapping_slice(&self, other: &Self) -> Option<Self> {
        let (start, end) = self.overlap(other)?;
        self.as_slice_len(start - self.offset, end - start).ok()
    }

    /// Overlapping range in backing coordinates.
    fn overlap(&self, other: &Self) -> Option<(u64, u64)> {
        let same_storage = match (&self.backing, &other.backing) {
            (Backing::Native(a), Backing::Native(b)) => a == b,
            (Backing::Heap(a), Backing::Heap(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        let (start, end, other_start, other_end) = if same_storage {
            (
                self.offset,
                self.offset + self.len,
                other.offset,
                other.offset + other.len,
            )
        } else if self.is_native() && other.is_native() {
            let a = self.address();
            let b = other.address();
            (a, a + self.len, b, b + other.len)
        } else {
            return None;
        };

        let lo = start.max(other_start);
        let hi = end.min(other_end);
        if lo >= hi {
            return None;
        }
        if same_storage {
            Some((lo, hi))
        } else {
            let base = self.address() - self.offset;
            Some((lo - base, hi - base))
        }
    }

    /// Typed view of the segment as consecutive `T` elements.
    #[must_use]
    pub fn elements<T: Carrier>(&self) -> ElementView<T> {
        ElementView::new(self.clone())
    }

    // =========================================================================
    // Checks
    // =========================================================================

    pub(crate) fn check_bounds(&self, offset: u64, length: u64) -> Result<()> {
        if offset.checked_add(length).is_some_and(|end| end <= self.len) {
            Ok(())
        } else {
            Err(Error::out_of_bounds(offset, length, self.len))
        }
    }

    pub(crate) fn check_alignment(&self, offset: u64, alignment: u64) -> Result<()> {
        let aligned = match &self.backing {
            Backing::Native(base) => (*base as u64 + self.offset + offset) % alignment == 0,
            Backing::Heap(store) => {
                alignment <= store.element_size() && (self.offset + offset) % alignment == 0
            }
        };
        if aligned {
            Ok(())
        } else {
            Err(Error::Misaligned {
                address: self.address() + offset,
                alignment,
            })
        }
    }

    /// Pointer to byte `offset`. The caller has checked the bounds.
    fn ptr_at(&self, offset: u64) -> *mut u8 {
        self.backing
            .base()
            .wrapping_add((self.offset + offset) as usize)
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("native", &self.is_native())
            .field("address", &format_args!("{:#x}", self.address()))
            .field("len", &self.len)
            .field("read_only", &self.read_only)
            .field("session", &self.session.id())
            .finish()
    }
}
