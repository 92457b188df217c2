// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Dynamic values crossing the native boundary.

use tether_layout::Carrier;
use tether_memory::{Scalar, Segment};

/// An argument or result of a foreign call.
///
/// Scalars carry value layouts; segments carry by-value structs (their
/// bytes are copied) and addresses (their native address is passed).
#[derive(Debug, Clone)]
pub enum Value {
    /// No value, the result of a `v` function.
    Void,
    /// A value of a value layout.
    Scalar(Scalar),
    /// A struct by value, or an address.
    Segment(Segment),
}

impl Value {
    /// Value wrapping a Rust carrier.
    #[must_use]
    pub fn of<T: Carrier>(value: T) -> Self {
        Self::Scalar(Scalar::of(value))
    }

    /// Whether this is [`Value::Void`].
    #[must_use]
    pub const fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// The scalar, if this is one.
    #[must_use]
    pub const fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Self::Scalar(scalar) => Some(*scalar),
            _ => None,
        }
    }

    /// The segment, if this is one.
    #[must_use]
    pub const fn as_segment(&self) -> Option<&Segment> {
        match self {
            Self::Segment(segment) => Some(segment),
            _ => None,
        }
    }

    /// The scalar as `T`, if it is a scalar of exactly that type.
    #[must_use]
    pub fn get<T: Carrier>(&self) -> Option<T> {
        self.as_scalar().and_then(Scalar::get::<T>)
    }

    /// Native address carried by this value.
    ///
    /// Address scalars give their value, native segments their base
    /// address.
    #[must_use]
    pub fn address(&self) -> Option<u64> {
        match self {
            Self::Scalar(Scalar::Address(addr)) => Some(*addr),
            Self::Segment(segment) if segment.is_native() => Some(segment.address()),
            _ => None,
        }
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Self::Scalar(scalar)
    }
}

impl From<Segment> for Value {
    fn from(segment: Segment) -> Self {
        Self::Segment(segment)
    }
}

impl From<&Segment> for Value {
    fn from(segment: &Segment) -> Self {
        Self::Segment(segment.clone())
    }
}
