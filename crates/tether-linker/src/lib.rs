// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Calls between Rust and native code described by layouts.
//!
//! - [`Linker`]: creates [`Downcall`] handles for native functions and
//!   upcall stubs that native code can call back into
//! - [`abi`]: per-ABI classification of a [`FunctionDescriptor`] into a
//!   [`CallPlan`] of register and stack transfers
//! - [`SymbolLookup`]: finding native functions by name
//!
//! ```no_run
//! use tether_layout::parse_function;
//! use tether_linker::{Linker, SymbolLookup, Value};
//! use tether_memory::{SegmentAllocator, Session};
//!
//! # fn main() -> tether_memory::Result<()> {
//! let linker = Linker::native()?;
//! let strlen = linker.lookup("strlen").expect("libc is loaded");
//! // SAFETY: `strlen` takes a C string and returns its length.
//! let strlen = unsafe { linker.downcall(&strlen, &parse_function("(u64:u8)u64")?)? };
//!
//! let session = Session::confined();
//! let text = session.allocate_utf8("tether")?;
//! assert_eq!(strlen.call(&[Value::Segment(text)])?.get::<u64>(), Some(6));
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`abi`]: calling conventions and call plans
//! - [`downcall`]: argument checking and marshalling of native calls
//! - [`upcall`]: the stub registry and its limits
//! - [`lookup`]: symbol lookup
//!
//! Errors are the [`tether_memory::Error`] taxonomy.

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("tether-linker calls native code on x86_64 and aarch64 hosts only");

pub mod abi;
pub mod downcall;
mod invoke;
pub mod linker;
pub mod lookup;
pub mod upcall;
pub mod value;


// Re-export commonly used types at crate root
pub use abi::{Abi, ArgPass, CallPlan, CallingConvention, Piece, ReturnPass, Slot, promote};
pub use downcall::Downcall;
pub use linker::{Linker, LinkerConfig};
#[cfg(feature = "libloading")]
pub use lookup::LibraryLookup;
pub use lookup::SymbolLookup;
pub use tether_layout::FunctionDescriptor;
pub use tether_memory::{Error, ErrorKind, Result};
pub use upcall::{UNCAUGHT_UPCALL_EXIT_CODE, UPCALL_SLOTS};
pub use value::Value;
