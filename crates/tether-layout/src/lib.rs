// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Memory layouts and function descriptors shared by the Tether crates.
//!
//! This crate describes the *shape* of foreign memory and foreign functions:
//! - [`Layout`]: value, padding, sequence, struct and union layouts with
//!   size, alignment, byte order, names and attributes
//! - [`FunctionDescriptor`]: argument and return layouts of a native function
//! - [`descriptor`]: the compact textual grammar (`"[i32(x)i32(y)]"`,
//!   `"(i32 i32)v"`) and its parser
//!
//! # Design Principles
//!
//! - **No dependencies**: Pure data types, 100% host-testable
//! - **Immutable**: Every derived layout is a new value sharing structure
//! - **Fail fast**: Invalid layouts and descriptors never produce partial values

pub mod carrier;
pub mod descriptor;
pub mod function;
pub mod layout;


// Re-export commonly used types at crate root
pub use carrier::Carrier;
pub use descriptor::{
    Declaration, Descriptor, DescriptorError, parse, parse_function, parse_header, parse_layout,
};
pub use function::FunctionDescriptor;
pub use layout::{
    AttrValue, ByteOrder, Layout, LayoutError, LayoutPath, PathElement, Shape, Target, ValueKind,
};
