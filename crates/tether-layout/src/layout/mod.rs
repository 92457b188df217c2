// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Memory layouts.
//!
//! A [`Layout`] describes the shape of a region of memory: its size, its
//! alignment and, for composite layouts, how it decomposes into members.
//!
//! ```text
//! Layout
//!   ├── Value     i32, u8, f64, u64:[i32(x)i32(y)]   (scalar or address)
//!   ├── Padding   x32                                (unused bytes)
//!   ├── Sequence  [10i32], [0u8]                     (count × element)
//!   ├── Struct    [i32(x)i32(y)]                     (members in order, each aligned)
//!   └── Union     [i32|f32]                          (members overlapping)
//! ```
//!
//! Layouts are immutable. Every `with_*` method returns a new layout that
//! shares the unchanged structure with the original through reference
//! counting, so cloning a layout is cheap.

mod display;
mod path;

#[cfg(test)]
mod path_test;

pub use path::{LayoutPath, PathElement};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::carrier::Carrier;
use crate::function::FunctionDescriptor;

/// Smallest legal alignment, in bits.
pub const MIN_BIT_ALIGNMENT: u64 = 8;

/// Width of an address on the host, in bits.
pub const ADDRESS_BITS: u64 = usize::BITS as u64;

/// Byte order of a value layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

impl ByteOrder {
    /// Byte order of the host.
    #[cfg(target_endian = "little")]
    pub const NATIVE: Self = Self::Little;
    /// Byte order of the host.
    #[cfg(target_endian = "big")]
    pub const NATIVE: Self = Self::Big;

    /// Whether this is the host byte order.
    #[must_use]
    pub const fn is_native(self) -> bool {
        matches!(
            (self, Self::NATIVE),
            (Self::Little, Self::Little) | (Self::Big, Self::Big)
        )
    }
}

/// What a value layout holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Two's complement signed integer.
    SignedInt,
    /// Unsigned integer.
    UnsignedInt,
    /// IEEE 754 floating point number.
    Float,
    /// Native address.
    Address,
}

impl ValueKind {
    /// Whether `bits` is a legal width for this kind.
    #[must_use]
    pub const fn accepts_width(self, bits: u64) -> bool {
        match self {
            Self::SignedInt | Self::UnsignedInt => matches!(bits, 8 | 16 | 32 | 64),
            Self::Float | Self::Address => matches!(bits, 32 | 64),
        }
    }

    /// Whether values of this kind live in integer registers.
    #[must_use]
    pub const fn is_integral(self) -> bool {
        !matches!(self, Self::Float)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignedInt => write!(f, "signed integer"),
            Self::UnsignedInt => write!(f, "unsigned integer"),
            Self::Float => write!(f, "float"),
            Self::Address => write!(f, "address"),
        }
    }
}

/// What an address layout points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Untyped memory (`void *`).
    Void,
    /// Memory described by a layout.
    Layout(Layout),
    /// A native function.
    Function(FunctionDescriptor),
}

/// Typed value of a layout attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Integer attribute.
    Int(i64),
    /// Free-form text attribute.
    Text(String),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Structural variant of a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// A scalar or an address.
    Value {
        /// What the value holds.
        kind: ValueKind,
        /// Width in bits.
        bits: u64,
        /// Byte order in memory.
        order: ByteOrder,
        /// Pointee, present exactly when `kind` is [`ValueKind::Address`].
        target: Option<Target>,
    },
    /// Unused bytes.
    Padding {
        /// Width in bits.
        bits: u64,
    },
    /// Repeated element. `count` is `None` for an incomplete sequence.
    Sequence {
        /// Number of elements, `None` when unbounded.
        count: Option<u64>,
        /// Element layout.
        element: Layout,
    },
    /// Members laid out in order, each at a multiple of its alignment.
    Struct(Vec<Layout>),
    /// Members sharing offset zero.
    Union(Vec<Layout>),
}

/// Error constructing or navigating a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Width not supported for the value kind.
    InvalidWidth {
        /// Requested kind.
        kind: ValueKind,
        /// Requested width in bits.
        bits: u64,
    },
    /// Padding width is zero or not a whole number of bytes.
    InvalidPadding(u64),
    /// Alignment (in bits) is not a power of two or below 8.
    InvalidAlignment(u64),
    /// Incomplete sequence where a size is required.
    Incomplete,
    /// Sequence element size is not a multiple of its alignment.
    MisalignedElement {
        /// Element size in bytes.
        size: u64,
        /// Element alignment in bytes.
        alignment: u64,
    },
    /// Size does not fit in 64 bits.
    Overflow,
    /// Operation requires a value layout.
    NotAValue,
    /// Operation requires an address layout.
    NotAnAddress,
    /// Layout path does not select anything.
    BadPath(String),
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidWidth { kind, bits } => write!(f, "invalid {kind} width: {bits} bits"),
            Self::InvalidPadding(bits) => write!(f, "invalid padding width: {bits} bits"),
            Self::InvalidAlignment(bits) => write!(f, "invalid alignment: {bits} bits"),
            Self::Incomplete => write!(f, "layout has no size"),
            Self::MisalignedElement { size, alignment } => write!(
                f,
                "element size {size} is not a multiple of its alignment {alignment}"
            ),
            Self::Overflow => write!(f, "layout size overflows"),
            Self::NotAValue => write!(f, "not a value layout"),
            Self::NotAnAddress => write!(f, "not an address layout"),
            Self::BadPath(reason) => write!(f, "bad layout path: {reason}"),
        }
    }
}

impl std::error::Error for LayoutError {}

/// Shared, immutable layout data.
#[derive(Debug, PartialEq, Eq)]
struct Node {
    shape: Shape,
    /// Size in bits, `None` for incomplete sequences.
    bits: Option<u64>,
    /// Natural alignment in bits.
    natural_alignment: u64,
    /// Declared alignment in bits.
    bit_alignment: u64,
    /// Some member (transitively) is packed.
    members_packed: bool,
    /// Byte offsets of struct or union members.
    offsets: Vec<u64>,
    name: Option<String>,
    attributes: BTreeMap<String, AttrValue>,
}

/// Immutable description of a region of memory.
#[derive(Clone)]
pub struct Layout(Arc<Node>);

impl PartialEq for Layout {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for Layout {}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Layout({self})")
    }
}

impl Layout {
    fn from_shape(shape: Shape, bits: Option<u64>, alignment: u64, members_packed: bool) -> Self {
        Self::group(shape, bits, alignment, members_packed, Vec::new())
    }

    fn group(
        shape: Shape,
        bits: Option<u64>,
        alignment: u64,
        members_packed: bool,
        offsets: Vec<u64>,
    ) -> Self {
        Self(Arc::new(Node {
            shape,
            bits,
            natural_alignment: alignment,
            bit_alignment: alignment,
            members_packed,
            offsets,
            name: None,
            attributes: BTreeMap::new(),
        }))
    }

    /// Copy-on-write access to the node for the `with_*` builders.
    fn derive(&self, update: impl FnOnce(&mut Node)) -> Self {
        let mut node = Node {
            shape: self.0.shape.clone(),
            bits: self.0.bits,
            natural_alignment: self.0.natural_alignment,
            bit_alignment: self.0.bit_alignment,
            members_packed: self.0.members_packed,
            offsets: self.0.offsets.clone(),
            name: self.0.name.clone(),
            attributes: self.0.attributes.clone(),
        };
        update(&mut node);
        Self(Arc::new(node))
    }

    // =========================================================================
    // Value layouts
    // =========================================================================

    /// Native-order value layout of the given kind and width.
    ///
    /// Address layouts created here point to [`Target::Void`].
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidWidth`] if the kind does not support `bits`.
    pub fn value(kind: ValueKind, bits: u64) -> Result<Self, LayoutError> {
        if !kind.accepts_width(bits) {
            return Err(LayoutError::InvalidWidth { kind, bits });
        }
        Ok(Self::scalar(kind, bits))
    }

    fn scalar(kind: ValueKind, bits: u64) -> Self {
        let target = matches!(kind, ValueKind::Address).then_some(Target::Void);
        Self::from_shape(
            Shape::Value {
                kind,
                bits,
                order: ByteOrder::NATIVE,
                target,
            },
            Some(bits),
            bits,
            false,
        )
    }

    /// Layout for the carrier type `T` in native byte order.
    #[must_use]
    pub fn of<T: Carrier>() -> Self {
        Self::scalar(T::KIND, T::BITS)
    }

    /// `i8` layout.
    #[must_use]
    pub fn i8() -> Self {
        Self::of::<i8>()
    }

    /// `u8` layout.
    #[must_use]
    pub fn u8() -> Self {
        Self::of::<u8>()
    }

    /// `i16` layout.
    #[must_use]
    pub fn i16() -> Self {
        Self::of::<i16>()
    }

    /// `u16` layout.
    #[must_use]
    pub fn u16() -> Self {
        Self::of::<u16>()
    }

    /// `i32` layout.
    #[must_use]
    pub fn i32() -> Self {
        Self::of::<i32>()
    }

    /// `u32` layout.
    #[must_use]
    pub fn u32() -> Self {
        Self::of::<u32>()
    }

    /// `i64` layout.
    #[must_use]
    pub fn i64() -> Self {
        Self::of::<i64>()
    }

    /// `u64` layout.
    #[must_use]
    pub fn u64() -> Self {
        Self::of::<u64>()
    }

    /// `f32` layout.
    #[must_use]
    pub fn f32() -> Self {
        Self::of::<f32>()
    }

    /// `f64` layout.
    #[must_use]
    pub fn f64() -> Self {
        Self::of::<f64>()
    }

    /// Host-width address layout pointing to untyped memory.
    #[must_use]
    pub fn address() -> Self {
        Self::scalar(ValueKind::Address, ADDRESS_BITS)
    }

    // =========================================================================
    // Padding, sequences and groups
    // =========================================================================

    /// Padding of `bits` bits.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidPadding`] unless `bits` is a positive
    /// multiple of 8.
    pub fn padding(bits: u64) -> Result<Self, LayoutError> {
        if bits == 0 || bits % 8 != 0 {
            return Err(LayoutError::InvalidPadding(bits));
        }
        Ok(Self::from_shape(
            Shape::Padding { bits },
            Some(bits),
            MIN_BIT_ALIGNMENT,
            false,
        ))
    }

    /// Padding of `bytes` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidPadding`] if `bytes` is zero, or
    /// [`LayoutError::Overflow`] if the width does not fit in 64 bits.
    pub fn padding_bytes(bytes: u64) -> Result<Self, LayoutError> {
        Self::padding(bytes.checked_mul(8).ok_or(LayoutError::Overflow)?)
    }

    /// Sequence of `count` elements. A count of zero makes the sequence
    /// incomplete (unbounded).
    ///
    /// # Errors
    ///
    /// Returns an error if the element has no size, if its size is not a
    /// multiple of its alignment, or if the total size overflows.
    pub fn sequence(count: u64, element: Self) -> Result<Self, LayoutError> {
        let element_bits = element.bit_size()?;
        if element_bits % element.bit_alignment() != 0 {
            return Err(LayoutError::MisalignedElement {
                size: element_bits / 8,
                alignment: element.byte_alignment(),
            });
        }
        let (count, bits) = if count == 0 {
            (None, None)
        } else {
            let bits = element_bits
                .checked_mul(count)
                .ok_or(LayoutError::Overflow)?;
            (Some(count), Some(bits))
        };
        let alignment = element.bit_alignment();
        let packed = element.is_packed();
        Ok(Self::from_shape(
            Shape::Sequence { count, element },
            bits,
            alignment,
            packed,
        ))
    }

    /// Struct with C placement: each member at the next multiple of its
    /// alignment, and the size rounded up to the struct alignment.
    ///
    /// The gaps are implicit; [`Layout::c_struct`] spells them out as
    /// padding members. Members with a lowered alignment (`i32%1`) are
    /// placed without a gap, which makes the struct packed.
    ///
    /// # Errors
    ///
    /// Returns an error if a member has no size or the total size overflows.
    pub fn structure(members: impl IntoIterator<Item = Self>) -> Result<Self, LayoutError> {
        let members: Vec<Self> = members.into_iter().collect();
        let mut bits: u64 = 0;
        let mut alignment = MIN_BIT_ALIGNMENT;
        let mut packed = false;
        let mut offsets = Vec::with_capacity(members.len());
        for member in &members {
            let member_bits = member.bit_size()?;
            let at = align_up(bits, member.bit_alignment()).ok_or(LayoutError::Overflow)?;
            offsets.push(at / 8);
            packed |= member.is_packed();
            alignment = alignment.max(member.bit_alignment());
            bits = at.checked_add(member_bits).ok_or(LayoutError::Overflow)?;
        }
        let bits = align_up(bits, alignment).ok_or(LayoutError::Overflow)?;
        Ok(Self::group(
            Shape::Struct(members),
            Some(bits),
            alignment,
            packed,
            offsets,
        ))
    }

    /// Same placement as [`Layout::structure`], with every gap and the
    /// trailing padding present as explicit padding members.
    ///
    /// # Errors
    ///
    /// Returns an error if a member has no size or the total size overflows.
    pub fn c_struct(members: impl IntoIterator<Item = Self>) -> Result<Self, LayoutError> {
        let implicit = Self::structure(members)?;
        let mut placed = Vec::with_capacity(implicit.members().len());
        let mut end: u64 = 0;
        for (member, offset) in implicit.members().iter().zip(implicit.member_offsets()) {
            if offset > end {
                placed.push(Self::padding_bytes(offset - end)?);
            }
            end = offset + member.byte_size()?;
            placed.push(member.clone());
        }
        let total = implicit.byte_size()?;
        if total > end {
            placed.push(Self::padding_bytes(total - end)?);
        }
        Self::structure(placed)
    }

    /// Union of overlapping members, sized to the largest member rounded up
    /// to the union alignment.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Incomplete`] if a member has no size.
    pub fn union(members: impl IntoIterator<Item = Self>) -> Result<Self, LayoutError> {
        let members: Vec<Self> = members.into_iter().collect();
        let mut bits: u64 = 0;
        let mut alignment = MIN_BIT_ALIGNMENT;
        let mut packed = false;
        for member in &members {
            bits = bits.max(member.bit_size()?);
            alignment = alignment.max(member.bit_alignment());
            packed |= member.is_packed();
        }
        let bits = align_up(bits, alignment).ok_or(LayoutError::Overflow)?;
        let offsets = vec![0; members.len()];
        Ok(Self::group(
            Shape::Union(members),
            Some(bits),
            alignment,
            packed,
            offsets,
        ))
    }

    // =========================================================================
    // Derived layouts
    // =========================================================================

    /// Same layout with a name.
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.derive(|node| node.name = Some(name))
    }

    /// Same layout without a name.
    #[must_use]
    pub fn without_name(&self) -> Self {
        self.derive(|node| node.name = None)
    }

    /// Same layout with a different alignment, in bits.
    ///
    /// An alignment below the natural alignment produces a packed layout.
    /// A struct or union aligned above its natural alignment grows to a
    /// multiple of the new alignment.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidAlignment`] unless `bits` is a power of
    /// two and at least 8, or [`LayoutError::Overflow`] if the grown size
    /// does not fit.
    pub fn with_bit_alignment(&self, bits: u64) -> Result<Self, LayoutError> {
        if !bits.is_power_of_two() || bits < MIN_BIT_ALIGNMENT {
            return Err(LayoutError::InvalidAlignment(bits));
        }
        let natural = match &self.0.shape {
            Shape::Struct(members) => Some(Self::structure(members.iter().cloned())?),
            Shape::Union(members) => Some(Self::union(members.iter().cloned())?),
            _ => None,
        };
        let size = match natural {
            Some(group) => {
                let rounded = bits.max(group.0.natural_alignment);
                Some(align_up(group.bit_size()?, rounded).ok_or(LayoutError::Overflow)?)
            }
            None => self.0.bits,
        };
        Ok(self.derive(|node| {
            node.bit_alignment = bits;
            node.bits = size;
        }))
    }

    /// Same layout with a different alignment, in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidAlignment`] unless `bytes` is a power of two.
    pub fn with_byte_alignment(&self, bytes: u64) -> Result<Self, LayoutError> {
        let bits = bytes
            .checked_mul(8)
            .ok_or(LayoutError::InvalidAlignment(bytes))?;
        self.with_bit_alignment(bits)
    }

    /// Same value layout with a different byte order.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::NotAValue`] for non-value layouts.
    pub fn with_order(&self, order: ByteOrder) -> Result<Self, LayoutError> {
        if !matches!(self.0.shape, Shape::Value { .. }) {
            return Err(LayoutError::NotAValue);
        }
        Ok(self.derive(|node| {
            if let Shape::Value { order: o, .. } = &mut node.shape {
                *o = order;
            }
        }))
    }

    /// Same address layout pointing to a different target.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::NotAnAddress`] for non-address layouts.
    pub fn with_target(&self, target: Target) -> Result<Self, LayoutError> {
        if self.value_kind() != Some(ValueKind::Address) {
            return Err(LayoutError::NotAnAddress);
        }
        Ok(self.derive(|node| {
            if let Shape::Value { target: t, .. } = &mut node.shape {
                *t = Some(target);
            }
        }))
    }

    /// Same value layout reinterpreted as an address of the same width.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidWidth`] if the width is not 32 or 64, or
    /// [`LayoutError::NotAValue`] for non-value layouts.
    pub fn as_address(&self, target: Target) -> Result<Self, LayoutError> {
        let Shape::Value { bits, order, .. } = self.0.shape else {
            return Err(LayoutError::NotAValue);
        };
        Self::value(ValueKind::Address, bits)?
            .with_order(order)?
            .with_target(target)
    }

    /// Same layout with an additional attribute. An existing value under
    /// `key` is replaced.
    #[must_use]
    pub fn with_attribute(&self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        let key = key.into();
        let value = value.into();
        self.derive(|node| {
            node.attributes.insert(key, value);
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Structural variant.
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.0.shape
    }

    /// Name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// All attributes, ordered by key.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, AttrValue> {
        &self.0.attributes
    }

    /// Attribute stored under `key`.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.0.attributes.get(key)
    }

    /// Whether the layout has a size (it is not an incomplete sequence).
    #[must_use]
    pub fn has_size(&self) -> bool {
        self.0.bits.is_some()
    }

    /// Size in bits.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Incomplete`] for incomplete sequences.
    pub fn bit_size(&self) -> Result<u64, LayoutError> {
        self.0.bits.ok_or(LayoutError::Incomplete)
    }

    /// Size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Incomplete`] for incomplete sequences.
    pub fn byte_size(&self) -> Result<u64, LayoutError> {
        Ok(self.bit_size()? / 8)
    }

    /// Declared alignment in bits.
    #[must_use]
    pub fn bit_alignment(&self) -> u64 {
        self.0.bit_alignment
    }

    /// Declared alignment in bytes.
    #[must_use]
    pub fn byte_alignment(&self) -> u64 {
        self.0.bit_alignment / 8
    }

    /// Alignment the layout would have without an explicit override, in bytes.
    #[must_use]
    pub fn natural_byte_alignment(&self) -> u64 {
        self.0.natural_alignment / 8
    }

    /// Whether some part of this layout may sit at an address that is not a
    /// multiple of its natural alignment.
    #[must_use]
    pub fn is_packed(&self) -> bool {
        self.0.members_packed || self.0.bit_alignment < self.0.natural_alignment
    }

    /// Value kind, for value layouts.
    #[must_use]
    pub fn value_kind(&self) -> Option<ValueKind> {
        match self.0.shape {
            Shape::Value { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// Byte order, for value layouts.
    #[must_use]
    pub fn order(&self) -> Option<ByteOrder> {
        match self.0.shape {
            Shape::Value { order, .. } => Some(order),
            _ => None,
        }
    }

    /// Pointee, for address layouts.
    #[must_use]
    pub fn target(&self) -> Option<&Target> {
        match &self.0.shape {
            Shape::Value { target, .. } => target.as_ref(),
            _ => None,
        }
    }

    /// Whether this is a value layout.
    #[must_use]
    pub fn is_value(&self) -> bool {
        matches!(self.0.shape, Shape::Value { .. })
    }

    /// Whether this is a padding layout.
    #[must_use]
    pub fn is_padding(&self) -> bool {
        matches!(self.0.shape, Shape::Padding { .. })
    }

    /// Whether this is a struct or union.
    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self.0.shape, Shape::Struct(_) | Shape::Union(_))
    }

    /// Members of a struct or union, empty for other layouts.
    #[must_use]
    pub fn members(&self) -> &[Self] {
        match &self.0.shape {
            Shape::Struct(members) | Shape::Union(members) => members,
            _ => &[],
        }
    }

    /// Byte offsets of the members of a struct or union, in member order.
    #[must_use]
    pub fn member_offsets(&self) -> Vec<u64> {
        self.0.offsets.clone()
    }

    /// Element layout of a sequence.
    #[must_use]
    pub fn element(&self) -> Option<&Self> {
        match &self.0.shape {
            Shape::Sequence { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Whether two handles share the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Round `value` up to a multiple of `alignment` (a power of two).
const fn align_up(value: u64, alignment: u64) -> Option<u64> {
    let mask = alignment - 1;
    match value.checked_add(mask) {
        Some(v) => Some(v & !mask),
        None => None,
    }
}
