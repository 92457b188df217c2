// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Segments viewed as arrays of a carrier type.

use std::fmt;
use std::marker::PhantomData;

use tether_layout::{Carrier, Layout};

use super::Segment;
use crate::error::{Error, Result};

/// A segment read as consecutive native-order `T` elements.
///
/// The element count is `len / size_of::<T>()`; trailing bytes are kept in
/// the underlying segment until [`ElementView::with_limit`] drops them.
pub struct ElementView<T: Carrier> {
    segment: Segment,
    layout: Layout,
    _carrier: PhantomData<T>,
}

impl<T: Carrier> ElementView<T> {
    const SIZE: u64 = T::BITS / 8;

    pub(super) fn new(segment: Segment) -> Self {
        Self {
            segment,
            layout: Layout::of::<T>(),
            _carrier: PhantomData,
        }
    }

    /// Number of whole elements.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.segment.len() / Self::SIZE
    }

    /// Whether the view has no whole element.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The underlying segment, with its original byte length.
    #[must_use]
    pub const fn segment(&self) -> &Segment {
        &self.segment
    }

    /// The same view over a segment truncated to whole elements.
    #[must_use]
    pub fn with_limit(&self) -> Self {
        let whole = self.len() * Self::SIZE;
        let segment = Segment {
            len: whole,
            ..self.segment.clone()
        };
        Self::new(segment)
    }

    fn offset(&self, index: u64) -> Result<u64> {
        if index < self.len() {
            Ok(index * Self::SIZE)
        } else {
            Err(Error::out_of_bounds(
                index.saturating_mul(Self::SIZE),
                Self::SIZE,
                self.segment.len(),
            ))
        }
    }

    /// Element `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfBounds`] for `index >= len()`, and fails
    /// as [`Segment::get`] does otherwise.
    pub fn get(&self, index: u64) -> Result<T> {
        let offset = self.offset(index)?;
        self.segment.get(&self.layout, offset)
    }

    /// Overwrite element `index`.
    ///
    /// # Errors
    ///
    /// As for [`ElementView::get`] and [`Segment::set`].
    pub fn set(&self, index: u64, value: T) -> Result<()> {
        let offset = self.offset(index)?;
        self.segment.set(&self.layout, offset, value)
    }

    /// Iterate over the elements; each item fails as [`ElementView::get`] does.
    pub fn iter(&self) -> impl Iterator<Item = Result<T>> + '_ {
        (0..self.len()).map(|index| self.get(index))
    }
}

impl<T: Carrier> Clone for ElementView<T> {
    fn clone(&self) -> Self {
        Self::new(self.segment.clone())
    }
}

impl<T: Carrier> fmt::Debug for ElementView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementView")
            .field("carrier", &std::any::type_name::<T>())
            .field("len", &self.len())
            .field("segment", &self.segment)
            .finish()
    }
}
