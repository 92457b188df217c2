// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Dynamically typed scalar values.

use tether_layout::{Carrier, Layout, ValueKind};

use crate::error::{Error, Result};

/// A value read from or written to a value layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Native address, zero-extended.
    Address(u64),
}

impl Scalar {
    /// Kind of layout this scalar is stored in.
    #[must_use]
    pub const fn kind(self) -> ValueKind {
        match self {
            Self::I8(_) | Self::I16(_) | Self::I32(_) | Self::I64(_) => ValueKind::SignedInt,
            Self::U8(_) | Self::U16(_) | Self::U32(_) | Self::U64(_) => ValueKind::UnsignedInt,
            Self::F32(_) | Self::F64(_) => ValueKind::Float,
            Self::Address(_) => ValueKind::Address,
        }
    }

    /// Width in bits; addresses report 64.
    #[must_use]
    pub const fn bits(self) -> u64 {
        match self {
            Self::I8(_) | Self::U8(_) => 8,
            Self::I16(_) | Self::U16(_) => 16,
            Self::I32(_) | Self::U32(_) | Self::F32(_) => 32,
            Self::I64(_) | Self::U64(_) | Self::F64(_) | Self::Address(_) => 64,
        }
    }

    /// Raw bit pattern, zero-extended to 64 bits.
    #[must_use]
    pub fn to_bits(self) -> u64 {
        match self {
            Self::I8(v) => v.to_bits(),
            Self::U8(v) => v.to_bits(),
            Self::I16(v) => v.to_bits(),
            Self::U16(v) => v.to_bits(),
            Self::I32(v) => v.to_bits(),
            Self::U32(v) => v.to_bits(),
            Self::I64(v) => v.to_bits(),
            Self::U64(v) | Self::Address(v) => v,
            Self::F32(v) => Carrier::to_bits(v),
            Self::F64(v) => Carrier::to_bits(v),
        }
    }

    /// Rebuild the scalar stored in a `kind` layout of `bits` bits.
    #[must_use]
    pub fn from_bits(kind: ValueKind, bits: u64, raw: u64) -> Self {
        match (kind, bits) {
            (ValueKind::SignedInt, 8) => Self::I8(Carrier::from_bits(raw)),
            (ValueKind::SignedInt, 16) => Self::I16(Carrier::from_bits(raw)),
            (ValueKind::SignedInt, 32) => Self::I32(Carrier::from_bits(raw)),
            (ValueKind::SignedInt, _) => Self::I64(Carrier::from_bits(raw)),
            (ValueKind::UnsignedInt, 8) => Self::U8(Carrier::from_bits(raw)),
            (ValueKind::UnsignedInt, 16) => Self::U16(Carrier::from_bits(raw)),
            (ValueKind::UnsignedInt, 32) => Self::U32(Carrier::from_bits(raw)),
            (ValueKind::UnsignedInt, _) => Self::U64(raw),
            (ValueKind::Float, 32) => Self::F32(Carrier::from_bits(raw)),
            (ValueKind::Float, _) => Self::F64(Carrier::from_bits(raw)),
            (ValueKind::Address, 32) => Self::Address(raw & u64::from(u32::MAX)),
            (ValueKind::Address, _) => Self::Address(raw),
        }
    }

    /// Raw bits to store this scalar in `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] if `layout` is not a value layout
    /// of the scalar's kind and width, or if an address does not fit.
    pub fn bits_for(self, layout: &Layout) -> Result<u64> {
        let kind = layout
            .value_kind()
            .ok_or_else(|| Error::illegal_argument(format!("not a value layout: {layout}")))?;
        let bits = layout.bit_size()?;
        let mismatch = || Error::illegal_argument(format!("{self:?} does not fit layout {layout}"));
        match self {
            Self::Address(addr) => {
                if kind != ValueKind::Address || (bits == 32 && addr > u64::from(u32::MAX)) {
                    return Err(mismatch());
                }
                Ok(addr)
            }
            _ if self.kind() == kind && self.bits() == bits => Ok(self.to_bits()),
            _ => Err(mismatch()),
        }
    }

    /// Value as a signed integer, if it is an integer or address.
    #[must_use]
    pub const fn as_i64(self) -> Option<i64> {
        match self {
            Self::I8(v) => Some(v as i64),
            Self::U8(v) => Some(v as i64),
            Self::I16(v) => Some(v as i64),
            Self::U16(v) => Some(v as i64),
            Self::I32(v) => Some(v as i64),
            Self::U32(v) => Some(v as i64),
            Self::I64(v) => Some(v),
            Self::U64(v) | Self::Address(v) => Some(v as i64),
            Self::F32(_) | Self::F64(_) => None,
        }
    }

    /// Value as a double, if it is a float.
    #[must_use]
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Self::F32(v) => Some(f64::from(v)),
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Value as the carrier type `T`, if kind and width match exactly.
    #[must_use]
    pub fn get<T: Carrier>(self) -> Option<T> {
        let kind_matches = self.kind() == T::KIND
            || (matches!(self, Self::Address(_)) && T::KIND == ValueKind::UnsignedInt);
        (kind_matches && self.bits() == T::BITS).then(|| T::from_bits(self.to_bits()))
    }

    /// Scalar holding a carrier value.
    #[must_use]
    pub fn of<T: Carrier>(value: T) -> Self {
        Self::from_bits(T::KIND, T::BITS, value.to_bits())
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

scalar_from! {
    i8 => I8, u8 => U8, i16 => I16, u16 => U16, i32 => I32,
    u32 => U32, i64 => I64, u64 => U64, f32 => F32, f64 => F64,
}
