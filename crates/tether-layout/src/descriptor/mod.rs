// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Compact textual descriptors for layouts and functions.
//!
//! | Text                  | Meaning                                         |
//! |-----------------------|-------------------------------------------------|
//! | `i32`, `u8`, `f64`    | signed, unsigned, float value of that bit width |
//! | `i32>`, `u16<`        | big / little endian value                       |
//! | `u64:v`, `u64:i32`    | address to untyped memory / to an `i32`         |
//! | `x32`                 | 32 bits of padding                              |
//! | `[i32(x)i32(y)]`      | struct with named members                       |
//! | `[i32\|f32]`          | union                                           |
//! | `[10i32]`, `[0u8]`    | sequence of ten `i32` / unbounded `u8` sequence |
//! | `i64%4`               | `i64` aligned to four bytes                     |
//! | `i32(unit=ms)`        | attribute                                       |
//! | `(i32 i32)i64`        | function of two `i32` returning `i64`           |
//! | `(u64:i8...)i32`      | variadic function (`printf`)                    |
//! | `()v`                 | function without arguments or result            |
//!
//! Whitespace may separate tokens but never splits a tag from its width, a
//! number or an identifier. Every malformed input is rejected with a
//! [`DescriptorError`]; there is no recovery and no partial result.

mod error;
mod header;
mod parser;

#[cfg(test)]
mod fuzz_test;

pub use error::{DescriptorError, Reason};
pub use header::{Declaration, parse_header};

use std::str::FromStr;

use crate::function::FunctionDescriptor;
use crate::layout::Layout;
use parser::Parser;

/// Result of parsing a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// A memory layout.
    Layout(Layout),
    /// A function signature.
    Function(FunctionDescriptor),
}

impl Descriptor {
    /// The layout, if this describes one.
    #[must_use]
    pub const fn as_layout(&self) -> Option<&Layout> {
        match self {
            Self::Layout(layout) => Some(layout),
            Self::Function(_) => None,
        }
    }

    /// The function, if this describes one.
    #[must_use]
    pub const fn as_function(&self) -> Option<&FunctionDescriptor> {
        match self {
            Self::Function(function) => Some(function),
            Self::Layout(_) => None,
        }
    }
}

/// Parse a layout or function descriptor.
///
/// # Errors
///
/// Returns a [`DescriptorError`] if `text` is not a well-formed descriptor
/// or describes an invalid layout.
pub fn parse(text: &str) -> Result<Descriptor, DescriptorError> {
    Parser::new(text).descriptor()
}

/// Parse a layout descriptor.
///
/// # Errors
///
/// Returns a [`DescriptorError`] if `text` is not a layout descriptor.
pub fn parse_layout(text: &str) -> Result<Layout, DescriptorError> {
    Parser::new(text).whole_layout()
}

/// Parse a function descriptor.
///
/// # Errors
///
/// Returns a [`DescriptorError`] if `text` is not a function descriptor.
pub fn parse_function(text: &str) -> Result<FunctionDescriptor, DescriptorError> {
    Parser::new(text).whole_function()
}

impl FromStr for Layout {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_layout(s)
    }
}

impl FromStr for FunctionDescriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_function(s)
    }
}
