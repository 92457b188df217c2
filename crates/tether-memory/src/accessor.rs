// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Accessors for values nested inside composite layouts.
//!
//! An [`Accessor`] is resolved once from a root layout and a path, and then
//! reads or writes the selected value in any segment laid out by that root.
//! Each open sequence step in the path becomes a dimension whose index is
//! supplied per access:
//!
//! ```text
//! root  = [4 [i32(x) i32(y)]](points)
//! path  = [open, field("y")]
//! value = base + 4 + index * 8
//! ```

use tether_layout::{Carrier, Layout, LayoutPath, PathElement};

use crate::error::{Error, Result};
use crate::scalar::Scalar;
use crate::segment::Segment;

/// Reads and writes one value selected by a layout path.
#[derive(Debug, Clone)]
pub struct Accessor {
    root: Layout,
    resolved: LayoutPath,
}

impl Accessor {
    /// Resolve `path` against `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] if the path is invalid or does not
    /// select a value layout.
    pub fn new(root: &Layout, path: &[PathElement]) -> Result<Self> {
        let resolved = root.path(path)?;
        if !resolved.layout.is_value() {
            return Err(Error::illegal_argument(format!(
                "path selects {}, not a value",
                resolved.layout
            )));
        }
        Ok(Self {
            root: root.clone(),
            resolved,
        })
    }

    /// Root layout the accessor was resolved against.
    #[must_use]
    pub const fn root(&self) -> &Layout {
        &self.root
    }

    /// Selected value layout.
    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.resolved.layout
    }

    /// Number of indices each access takes.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.resolved.dimensions()
    }

    /// Byte offset of the value for `indices`, relative to `base`.
    fn offset(&self, base: u64, indices: &[u64]) -> Result<u64> {
        if indices.len() != self.dimensions() {
            return Err(Error::illegal_argument(format!(
                "expected {} indices, got {}",
                self.dimensions(),
                indices.len()
            )));
        }

        let overflow = || Error::out_of_bounds(base, u64::MAX, u64::MAX);
        let mut offset = base
            .checked_add(self.resolved.offset)
            .ok_or_else(overflow)?;
        let dims = self.resolved.strides.iter().zip(&self.resolved.bounds);
        for (&index, (&stride, &bound)) in indices.iter().zip(dims) {
            match bound {
                Some(bound) if index >= bound => {
                    return Err(Error::out_of_bounds(index, 1, bound));
                }
                _ => {}
            }
            offset = index
                .checked_mul(stride)
                .and_then(|delta| offset.checked_add(delta))
                .ok_or_else(overflow)?;
        }
        Ok(offset)
    }

    /// Read the value in `segment` for the root starting at `base`.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalArgument`] for the wrong number of indices
    /// - [`Error::IndexOutOfBounds`] for an index beyond its dimension
    /// - any error of [`Segment::get_value`]
    pub fn get(&self, segment: &Segment, base: u64, indices: &[u64]) -> Result<Scalar> {
        let offset = self.offset(base, indices)?;
        segment.get_value(self.layout(), offset)
    }

    /// Write the value in `segment` for the root starting at `base`.
    ///
    /// # Errors
    ///
    /// As for [`Accessor::get`] and [`Segment::set_value`].
    pub fn set(&self, segment: &Segment, base: u64, indices: &[u64], value: Scalar) -> Result<()> {
        let offset = self.offset(base, indices)?;
        segment.set_value(self.layout(), offset, value)
    }

    /// Typed [`Accessor::get`].
    ///
    /// # Errors
    ///
    /// As for [`Accessor::get`] and [`Segment::get`].
    pub fn get_as<T: Carrier>(&self, segment: &Segment, base: u64, indices: &[u64]) -> Result<T> {
        let offset = self.offset(base, indices)?;
        segment.get(self.layout(), offset)
    }

    /// Typed [`Accessor::set`].
    ///
    /// # Errors
    ///
    /// As for [`Accessor::set`] and [`Segment::set`].
    pub fn set_as<T: Carrier>(
        &self,
        segment: &Segment,
        base: u64,
        indices: &[u64],
        value: T,
    ) -> Result<()> {
        let offset = self.offset(base, indices)?;
        segment.set(self.layout(), offset, value)
    }
}
