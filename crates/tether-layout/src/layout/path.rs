// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Navigating into composite layouts.
//!
//! A path is a list of steps from a root layout down to a nested one. Each
//! step either picks a struct/union member (by name or index) or steps into a
//! sequence element. An element step without an index leaves that dimension
//! *open*: the resulting [`LayoutPath`] records its stride and bound so that
//! an accessor can supply the index later.

use super::{Layout, LayoutError, Shape};

/// One step of a layout path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElement {
    /// Struct or union member with this name.
    Field(String),
    /// Struct or union member at this index.
    Member(usize),
    /// Sequence element at a fixed index, or an open dimension.
    Element(Option<u64>),
}

impl PathElement {
    /// Member step by name.
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Fixed sequence element.
    #[must_use]
    pub const fn index(index: u64) -> Self {
        Self::Element(Some(index))
    }

    /// Open sequence dimension.
    #[must_use]
    pub const fn open() -> Self {
        Self::Element(None)
    }
}

/// Result of resolving a path against a root layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPath {
    /// Byte offset of the selected layout when every open index is zero.
    pub offset: u64,
    /// Byte stride of each open dimension, outermost first.
    pub strides: Vec<u64>,
    /// Element count of each open dimension, `None` when unbounded.
    pub bounds: Vec<Option<u64>>,
    /// Selected layout.
    pub layout: Layout,
}

impl LayoutPath {
    /// Number of open dimensions.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.strides.len()
    }
}

impl Layout {
    /// Resolve `path` against this layout.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::BadPath`] if a step names an unknown field, an
    /// out-of-range member or element, or steps into the wrong kind of layout.
    pub fn path(&self, path: &[PathElement]) -> Result<LayoutPath, LayoutError> {
        let mut offset: u64 = 0;
        let mut strides = Vec::new();
        let mut bounds = Vec::new();
        let mut current = self.clone();

        for step in path {
            let next = match (step, current.shape()) {
                (PathElement::Field(name), Shape::Struct(_) | Shape::Union(_)) => {
                    let index = current
                        .members()
                        .iter()
                        .position(|m| m.name() == Some(name.as_str()))
                        .ok_or_else(|| LayoutError::BadPath(format!("no member named `{name}`")))?;
                    member_at(&current, index, &mut offset)?
                }
                (PathElement::Member(index), Shape::Struct(_) | Shape::Union(_)) => {
                    member_at(&current, *index, &mut offset)?
                }
                (PathElement::Element(index), Shape::Sequence { count, element }) => {
                    let stride = element.byte_size()?;
                    match index {
                        Some(i) => {
                            if count.is_some_and(|c| *i >= c) {
                                return Err(LayoutError::BadPath(format!(
                                    "element {i} out of bounds for {current}"
                                )));
                            }
                            let delta = stride.checked_mul(*i).ok_or(LayoutError::Overflow)?;
                            offset = offset.checked_add(delta).ok_or(LayoutError::Overflow)?;
                        }
                        None => {
                            strides.push(stride);
                            bounds.push(*count);
                        }
                    }
                    element.clone()
                }
                (step, _) => {
                    return Err(LayoutError::BadPath(format!(
                        "cannot apply {step:?} to {current}"
                    )));
                }
            };
            current = next;
        }

        Ok(LayoutPath {
            offset,
            strides,
            bounds,
            layout: current,
        })
    }

    /// Layout selected by `path`.
    ///
    /// # Errors
    ///
    /// See [`Layout::path`].
    pub fn select(&self, path: &[PathElement]) -> Result<Self, LayoutError> {
        Ok(self.path(path)?.layout)
    }

    /// Byte offset of the layout selected by `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::BadPath`] if the path is invalid or contains an
    /// open element step.
    pub fn offset_of(&self, path: &[PathElement]) -> Result<u64, LayoutError> {
        let resolved = self.path(path)?;
        if resolved.dimensions() > 0 {
            return Err(LayoutError::BadPath(
                "offset of a path with open elements".to_owned(),
            ));
        }
        Ok(resolved.offset)
    }
}

fn member_at(group: &Layout, index: usize, offset: &mut u64) -> Result<Layout, LayoutError> {
    let member = group.members().get(index).ok_or_else(|| {
        LayoutError::BadPath(format!("member {index} out of range for {group}"))
    })?;
    let member_offset = group.member_offsets().get(index).copied().unwrap_or(0);
    *offset = offset
        .checked_add(member_offset)
        .ok_or(LayoutError::Overflow)?;
    Ok(member.clone())
}
