// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Rust types that can be carried by a value layout.
//!
//! A carrier maps a primitive Rust type to a [`ValueKind`] and a bit width,
//! and converts the value to and from its raw bit pattern. The bit pattern is
//! always zero-extended into a `u64`; sign extension is the caller's concern.

use crate::layout::ValueKind;

mod sealed {
    pub trait Sealed {}
}

/// A primitive type that can be read from or written to a value layout.
///
/// This trait is sealed: the set of carriers matches the set of value
/// layouts the descriptor grammar can express.
pub trait Carrier: Copy + Send + Sync + 'static + sealed::Sealed {
    /// Value kind of layouts carrying this type.
    const KIND: ValueKind;
    /// Width in bits.
    const BITS: u64;

    /// Raw bit pattern, zero-extended.
    fn to_bits(self) -> u64;

    /// Rebuild a value from the low `BITS` bits of `bits`.
    fn from_bits(bits: u64) -> Self;
}

macro_rules! int_carrier {
    ($ty:ty, $unsigned:ty, $kind:ident, $bits:literal) => {
        impl sealed::Sealed for $ty {}

        impl Carrier for $ty {
            const KIND: ValueKind = ValueKind::$kind;
            const BITS: u64 = $bits;

            #[inline]
            fn to_bits(self) -> u64 {
                u64::from(self as $unsigned)
            }

            #[inline]
            fn from_bits(bits: u64) -> Self {
                bits as $unsigned as $ty
            }
        }
    };
}

int_carrier!(i8, u8, SignedInt, 8);
int_carrier!(u8, u8, UnsignedInt, 8);
int_carrier!(i16, u16, SignedInt, 16);
int_carrier!(u16, u16, UnsignedInt, 16);
int_carrier!(i32, u32, SignedInt, 32);
int_carrier!(u32, u32, UnsignedInt, 32);
int_carrier!(i64, u64, SignedInt, 64);
int_carrier!(u64, u64, UnsignedInt, 64);

impl sealed::Sealed for f32 {}

impl Carrier for f32 {
    const KIND: ValueKind = ValueKind::Float;
    const BITS: u64 = 32;

    #[inline]
    fn to_bits(self) -> u64 {
        u64::from(f32::to_bits(self))
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl sealed::Sealed for f64 {}

impl Carrier for f64 {
    const KIND: ValueKind = ValueKind::Float;
    const BITS: u64 = 64;

    #[inline]
    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}
