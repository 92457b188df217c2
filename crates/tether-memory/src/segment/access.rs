// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Typed reads, writes and bulk operations on segments.

use std::sync::atomic::{AtomicU8, Ordering};

use tether_layout::{ByteOrder, Carrier, Layout, ValueKind};

use super::Segment;
use crate::error::{Error, Result};
use crate::scalar::Scalar;
use crate::session::Session;

// Segment bytes may be touched by several threads at once, so every transfer
// below is a sequence of relaxed single-byte atomic operations.

/// Load `out.len()` bytes starting at `src`.
///
/// # Safety
///
/// `out.len()` bytes at `src` must be valid for reads.
unsafe fn load_bytes(src: *const u8, out: &mut [u8]) {
    for (i, byte) in out.iter_mut().enumerate() {
        // SAFETY: in range per the caller; bytes have no alignment needs.
        let cell = unsafe { AtomicU8::from_ptr(src.add(i).cast_mut()) };
        *byte = cell.load(Ordering::Relaxed);
    }
}

/// Store `bytes` starting at `dst`.
///
/// # Safety
///
/// `bytes.len()` bytes at `dst` must be valid for writes.
unsafe fn store_bytes(dst: *mut u8, bytes: &[u8]) {
    for (i, byte) in bytes.iter().enumerate() {
        // SAFETY: as in `load_bytes`.
        let cell = unsafe { AtomicU8::from_ptr(dst.add(i)) };
        cell.store(*byte, Ordering::Relaxed);
    }
}

/// Load the single byte at `src`.
///
/// # Safety
///
/// `src` must be valid for reads.
unsafe fn load_byte(src: *const u8) -> u8 {
    // SAFETY: valid per the caller.
    unsafe { AtomicU8::from_ptr(src.cast_mut()) }.load(Ordering::Relaxed)
}

/// Store `len` copies of `value` starting at `dst`.
///
/// # Safety
///
/// `len` bytes at `dst` must be valid for writes.
unsafe fn fill_bytes(dst: *mut u8, len: usize, value: u8) {
    for i in 0..len {
        // SAFETY: as in `load_bytes`.
        unsafe { AtomicU8::from_ptr(dst.add(i)) }.store(value, Ordering::Relaxed);
    }
}

/// Store the low `size` bytes of `raw` in `order`, in the first `size`
/// bytes of the result.
pub(super) fn encode(raw: u64, size: u64, order: ByteOrder) -> [u8; 8] {
    let size = size as usize;
    let mut out = [0u8; 8];
    let little = raw.to_le_bytes();
    for (i, byte) in little.iter().take(size).enumerate() {
        let at = match order {
            ByteOrder::Little => i,
            ByteOrder::Big => size - 1 - i,
        };
        out[at] = *byte;
    }
    out
}

/// Inverse of [`encode`]; `bytes` holds exactly the stored bytes.
fn decode(bytes: &[u8], order: ByteOrder) -> u64 {
    let mut little = [0u8; 8];
    for (i, byte) in bytes.iter().enumerate() {
        let at = match order {
            ByteOrder::Little => i,
            ByteOrder::Big => bytes.len() - 1 - i,
        };
        little[at] = *byte;
    }
    u64::from_le_bytes(little)
}

/// Kind, width and byte order of a value layout.
fn value_parts(layout: &Layout) -> Result<(ValueKind, u64, ByteOrder)> {
    match (layout.value_kind(), layout.order()) {
        (Some(kind), Some(order)) => Ok((kind, layout.bit_size()?, order)),
        _ => Err(Error::illegal_argument(format!(
            "not a value layout: {layout}"
        ))),
    }
}

/// Reject carriers that do not match the layout's kind and width.
fn check_carrier<T: Carrier>(layout: &Layout) -> Result<()> {
    let (kind, bits, _) = value_parts(layout)?;
    let kind_matches =
        kind == T::KIND || (kind == ValueKind::Address && T::KIND == ValueKind::UnsignedInt);
    if kind_matches && bits == T::BITS {
        Ok(())
    } else {
        Err(Error::illegal_argument(format!(
            "carrier {} does not match layout {layout}",
            std::any::type_name::<T>()
        )))
    }
}

impl Segment {
    /// Read the raw bits of a value layout at `offset`.
    fn read_raw(&self, layout: &Layout, offset: u64) -> Result<u64> {
        let (_, bits, order) = value_parts(layout)?;
        let size = bits / 8;
        let _access = self.session.enter()?;
        self.check_bounds(offset, size)?;
        self.check_alignment(offset, layout.byte_alignment())?;

        let mut bytes = [0u8; 8];
        let bytes = &mut bytes[..size as usize];
        // SAFETY: the range is inside the segment and the session is held
        // alive by the access guard until the copy completes.
        unsafe { load_bytes(self.ptr_at(offset), bytes) };
        Ok(decode(bytes, order))
    }

    /// Write the low bits of `raw` as a value layout at `offset`.
    fn write_raw(&self, layout: &Layout, offset: u64, raw: u64) -> Result<()> {
        let (_, bits, order) = value_parts(layout)?;
        let size = bits / 8;
        let _access = self.session.enter()?;
        self.check_writable()?;
        self.check_bounds(offset, size)?;
        self.check_alignment(offset, layout.byte_alignment())?;

        let bytes = encode(raw, size, order);
        // SAFETY: as in `read_raw`.
        unsafe { store_bytes(self.ptr_at(offset), &bytes[..size as usize]) };
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            Err(Error::ReadOnly)
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Scalar access
    // =========================================================================

    /// Read the value described by `layout` at `offset`.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalArgument`] if `layout` is not a value layout
    /// - [`Error::WrongThread`] / [`Error::IllegalState`] if the session
    ///   cannot be used
    /// - [`Error::IndexOutOfBounds`] if the value leaves the segment
    /// - [`Error::Misaligned`] if the address is not aligned for `layout`
    pub fn get_value(&self, layout: &Layout, offset: u64) -> Result<Scalar> {
        let (kind, bits, _) = value_parts(layout)?;
        let raw = self.read_raw(layout, offset)?;
        Ok(Scalar::from_bits(kind, bits, raw))
    }

    /// Write `value` as described by `layout` at `offset`.
    ///
    /// # Errors
    ///
    /// As for [`Segment::get_value`], plus [`Error::ReadOnly`] for read-only
    /// segments and [`Error::IllegalArgument`] if `value` does not fit
    /// `layout`.
    pub fn set_value(&self, layout: &Layout, offset: u64, value: Scalar) -> Result<()> {
        let raw = value.bits_for(layout)?;
        self.write_raw(layout, offset, raw)
    }

    /// Read a `T` described by `layout` at `offset`.
    ///
    /// # Errors
    ///
    /// As for [`Segment::get_value`]; `T` must match the layout's kind and
    /// width.
    pub fn get<T: Carrier>(&self, layout: &Layout, offset: u64) -> Result<T> {
        check_carrier::<T>(layout)?;
        self.read_raw(layout, offset).map(T::from_bits)
    }

    /// Write a `T` described by `layout` at `offset`.
    ///
    /// # Errors
    ///
    /// As for [`Segment::set_value`].
    pub fn set<T: Carrier>(&self, layout: &Layout, offset: u64, value: T) -> Result<()> {
        check_carrier::<T>(layout)?;
        self.write_raw(layout, offset, value.to_bits())
    }

    /// Read element `index` of an array of `layout`.
    ///
    /// # Errors
    ///
    /// As for [`Segment::get`]; an index whose offset overflows is out of
    /// bounds.
    pub fn get_at_index<T: Carrier>(&self, layout: &Layout, index: u64) -> Result<T> {
        let offset = self.index_offset(layout, index)?;
        self.get(layout, offset)
    }

    /// Write element `index` of an array of `layout`.
    ///
    /// # Errors
    ///
    /// As for [`Segment::set`].
    pub fn set_at_index<T: Carrier>(&self, layout: &Layout, index: u64, value: T) -> Result<()> {
        let offset = self.index_offset(layout, index)?;
        self.set(layout, offset, value)
    }

    fn index_offset(&self, layout: &Layout, index: u64) -> Result<u64> {
        let size = layout.byte_size()?;
        index
            .checked_mul(size)
            .ok_or_else(|| Error::out_of_bounds(u64::MAX, size, self.len))
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// Read an address at `offset` as a zero-length native segment in the
    /// global session.
    ///
    /// The pointee target of `layout` does not size the result; only
    /// [`Segment::reinterpret`] can make the pointee accessible.
    ///
    /// # Errors
    ///
    /// As for [`Segment::get_value`]; `layout` must be an address layout.
    pub fn get_address(&self, layout: &Layout, offset: u64) -> Result<Self> {
        if layout.value_kind() != Some(ValueKind::Address) {
            return Err(Error::illegal_argument(format!(
                "not an address layout: {layout}"
            )));
        }
        let addr = self.read_raw(layout, offset)?;
        Ok(Self::native(addr as usize, 0, Session::global()))
    }

    /// Write the address of `target` at `offset`.
    ///
    /// # Errors
    ///
    /// As for [`Segment::set_value`]; `target` must be a native segment.
    pub fn set_address(&self, layout: &Layout, offset: u64, target: &Self) -> Result<()> {
        if !target.is_native() {
            return Err(Error::illegal_argument(
                "heap segments have no native address",
            ));
        }
        self.set_value(layout, offset, Scalar::Address(target.address()))
    }

    // =========================================================================
    // Bulk operations
    // =========================================================================

    /// Copy all of `src` to the start of this segment.
    ///
    /// # Errors
    ///
    /// As for [`Segment::copy_from_range`].
    pub fn copy_from(&self, src: &Self) -> Result<()> {
        self.copy_from_range(src, 0, 0, src.len)
    }

    /// Copy `len` bytes from `src` at `src_offset` to `dst_offset` in this
    /// segment. The bytes pass through a temporary buffer, so overlapping
    /// ranges copy correctly.
    ///
    /// # Errors
    ///
    /// Fails if either session cannot be used, if this segment is read-only,
    /// or if either range leaves its segment.
    pub fn copy_from_range(
        &self,
        src: &Self,
        src_offset: u64,
        dst_offset: u64,
        len: u64,
    ) -> Result<()> {
        let _src_access = src.session.enter()?;
        let _dst_access = self.session.enter()?;
        self.check_writable()?;
        src.check_bounds(src_offset, len)?;
        self.check_bounds(dst_offset, len)?;
        if len == 0 {
            return Ok(());
        }

        let mut buffer = vec![0u8; len as usize];
        // SAFETY: both ranges are in bounds and both sessions are held by
        // the access guards.
        unsafe {
            load_bytes(src.ptr_at(src_offset), &mut buffer);
            store_bytes(self.ptr_at(dst_offset), &buffer);
        }
        Ok(())
    }

    /// Offset of the first byte that differs from `other`.
    ///
    /// If one segment is a proper prefix of the other, the shorter length is
    /// returned; equal segments give `-1`.
    ///
    /// # Errors
    ///
    /// Fails if either session cannot be used.
    pub fn mismatch(&self, other: &Self) -> Result<i64> {
        let _access = self.session.enter()?;
        let _other_access = other.session.enter()?;
        let common = self.len.min(other.len);

        for offset in 0..common {
            // SAFETY: `offset` is below both lengths and both sessions are
            // held.
            let (a, b) = unsafe {
                (
                    load_byte(self.ptr_at(offset)),
                    load_byte(other.ptr_at(offset)),
                )
            };
            if a != b {
                return Ok(offset as i64);
            }
        }
        if self.len == other.len {
            Ok(-1)
        } else {
            Ok(common as i64)
        }
    }

    /// Set every byte to `value`.
    ///
    /// # Errors
    ///
    /// Fails if the session cannot be used or the segment is read-only.
    pub fn fill(&self, value: u8) -> Result<()> {
        let _access = self.session.enter()?;
        self.check_writable()?;
        if self.len == 0 {
            return Ok(());
        }
        // SAFETY: the whole segment is in bounds and the session is held.
        unsafe { fill_bytes(self.ptr_at(0), self.len as usize, value) };
        Ok(())
    }

    /// Copy of the whole segment.
    ///
    /// # Errors
    ///
    /// Fails if the session cannot be used.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let _access = self.session.enter()?;
        let mut out = vec![0u8; self.len as usize];
        if out.is_empty() {
            return Ok(out);
        }
        // SAFETY: the whole segment is in bounds and the session is held.
        unsafe { load_bytes(self.ptr_at(0), &mut out) };
        Ok(out)
    }

    /// The segment decoded as native-order `T` elements.
    ///
    /// # Errors
    ///
    /// Fails if the session cannot be used, or with
    /// [`Error::IllegalArgument`] if the length is not a multiple of the
    /// element size.
    pub fn to_vec<T: Carrier>(&self) -> Result<Vec<T>> {
        let size = T::BITS / 8;
        if self.len % size != 0 {
            return Err(Error::illegal_argument(format!(
                "segment size {} is not a multiple of {size}",
                self.len
            )));
        }
        let bytes = self.to_bytes()?;
        Ok(bytes
            .chunks_exact(size as usize)
            .map(|chunk| T::from_bits(decode(chunk, ByteOrder::NATIVE)))
            .collect())
    }

    /// Read a NUL-terminated UTF-8 string starting at `offset`.
    ///
    /// Invalid UTF-8 is replaced with `U+FFFD`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfBounds`] if no terminator is found before
    /// the end of the segment.
    pub fn get_utf8(&self, offset: u64) -> Result<String> {
        let _access = self.session.enter()?;
        self.check_bounds(offset, 0)?;
        let mut bytes = Vec::new();
        for at in offset..self.len {
            // SAFETY: `at` is below the length and the session is held.
            let byte = unsafe { load_byte(self.ptr_at(at)) };
            if byte == 0 {
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
            bytes.push(byte);
        }
        Err(Error::out_of_bounds(offset, self.len - offset + 1, self.len))
    }

    /// Write `text` followed by a NUL terminator at `offset`.
    ///
    /// # Errors
    ///
    /// Fails if the session cannot be used, the segment is read-only, or the
    /// string and terminator do not fit.
    pub fn set_utf8(&self, offset: u64, text: &str) -> Result<()> {
        let _access = self.session.enter()?;
        self.check_writable()?;
        let len = text.len() as u64;
        self.check_bounds(offset, len + 1)?;
        // SAFETY: `len + 1` bytes at `offset` are in bounds and the session
        // is held.
        unsafe {
            let dst = self.ptr_at(offset);
            store_bytes(dst, text.as_bytes());
            store_bytes(dst.add(text.len()), &[0]);
        }
        Ok(())
    }
}
