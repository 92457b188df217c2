// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Calling conventions.
//!
//! A [`CallingConvention`] turns a [`FunctionDescriptor`] into a
//! [`CallPlan`]: for every argument, which bytes go to which register or
//! stack offset, and where the return value comes back. Plans are pure
//! data, so every convention can be classified on every host; only the
//! host's own convention can be executed.
//!
//! | ABI            | Integer regs | Float regs | Aggregates > 16 bytes | Variadic tail        |
//! |----------------|--------------|------------|-----------------------|----------------------|
//! | `SysV`         | 6            | 8          | copied to the stack   | as fixed arguments   |
//! | `Aapcs64`      | 8            | 8          | by reference          | as fixed arguments   |
//! | `Aapcs64Apple` | 8            | 8          | by reference          | stack, 8-byte slots  |
//! | `Win64`        | 4 positional | 4 positional | by reference (unless 1/2/4/8 bytes) | floats also in GPRs |

mod aapcs64;
mod sysv;
mod win64;

#[cfg(test)]
mod aapcs64_test;
#[cfg(test)]
mod sysv_test;
#[cfg(test)]
mod win64_test;

pub use aapcs64::{Aapcs64, Aapcs64Apple};
pub use sysv::SysV;
pub use win64::Win64;

use std::fmt;

use tether_layout::{FunctionDescriptor, Layout, Shape, ValueKind};
use tether_memory::{Error, Result};

/// Bytes of stack argument space the invoker can fill.
pub const MAX_STACK_BYTES: u64 = 128;

/// Largest aggregate returned through caller-provided memory.
pub const MAX_INDIRECT_RETURN: u64 = 256;

/// Host calling convention family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Abi {
    /// System V AMD64 (Linux, macOS and BSD on x86-64).
    SysV,
    /// Procedure Call Standard for AArch64 (Linux).
    Aapcs64,
    /// Apple's AArch64 variant: packed stack, variadic tail on the stack.
    Aapcs64Apple,
    /// Microsoft x64.
    Win64,
}

impl Abi {
    /// Convention of the host, if it is supported.
    #[must_use]
    pub const fn host() -> Option<Self> {
        if cfg!(all(target_arch = "x86_64", windows)) {
            Some(Self::Win64)
        } else if cfg!(target_arch = "x86_64") {
            Some(Self::SysV)
        } else if cfg!(all(target_arch = "aarch64", target_vendor = "apple")) {
            Some(Self::Aapcs64Apple)
        } else if cfg!(target_arch = "aarch64") {
            Some(Self::Aapcs64)
        } else {
            None
        }
    }

    /// Whether this is the host's convention.
    #[must_use]
    pub fn is_host(self) -> bool {
        Self::host() == Some(self)
    }

    /// Classification rules of this ABI.
    #[must_use]
    pub fn convention(self) -> &'static dyn CallingConvention {
        match self {
            Self::SysV => &SysV,
            Self::Aapcs64 => &Aapcs64,
            Self::Aapcs64Apple => &Aapcs64Apple,
            Self::Win64 => &Win64,
        }
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SysV => "sysv-x86_64",
            Self::Aapcs64 => "aapcs64",
            Self::Aapcs64Apple => "aapcs64-apple",
            Self::Win64 => "win64",
        };
        f.write_str(name)
    }
}

/// Classifies function descriptors for one ABI.
pub trait CallingConvention: Send + Sync {
    /// ABI implemented by this convention.
    fn abi(&self) -> Abi;

    /// Plan the argument and return transfer for `function`.
    ///
    /// Variadic arguments must already be promoted (see [`promote`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] for layouts that cannot be passed
    /// (padding, incomplete sequences), for calls needing more stack space
    /// than [`MAX_STACK_BYTES`], and for indirect returns larger than
    /// [`MAX_INDIRECT_RETURN`].
    fn classify(&self, function: &FunctionDescriptor) -> Result<CallPlan>;
}

// =============================================================================
// Plans
// =============================================================================

/// A register or stack location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// General purpose register, by argument-register index.
    Gpr(usize),
    /// Floating point register, by argument-register index.
    Fpr(usize),
    /// Stack argument area, at this byte offset.
    Stack(u64),
}

/// `size` bytes at `offset` in a value, moved to or from `slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    /// Byte offset in the value.
    pub offset: u64,
    /// Number of bytes, at most eight.
    pub size: u64,
    /// Register or stack location.
    pub slot: Slot,
}

impl Piece {
    /// Piece covering `size` bytes at `offset`.
    #[must_use]
    pub const fn new(offset: u64, size: u64, slot: Slot) -> Self {
        Self { offset, size, slot }
    }
}

/// How one argument is passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgPass {
    /// The value's bytes are moved piece by piece.
    Pieces(Vec<Piece>),
    /// The value is copied to caller memory whose address goes to the slot.
    Reference(Slot),
}

/// How the return value comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnPass {
    /// Nothing is returned.
    Void,
    /// Pieces are read from the return registers `Gpr(0..2)`/`Fpr(0..4)`.
    Registers(Vec<Piece>),
    /// The callee writes to caller memory. Its address is passed in the
    /// slot, or in the indirect result register when `None`.
    Indirect(Option<Slot>),
}

/// Data-driven description of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPlan {
    /// ABI the plan was made for.
    pub abi: Abi,
    /// One entry per argument.
    pub args: Vec<ArgPass>,
    /// Return transfer.
    pub ret: ReturnPass,
    /// Integer argument registers used.
    pub gprs: usize,
    /// Float argument registers used.
    pub fprs: usize,
    /// Bytes of stack argument area used.
    pub stack_bytes: u64,
}

impl CallPlan {
    /// Whether any argument is placed on the stack or passed by reference.
    #[must_use]
    pub fn uses_memory(&self) -> bool {
        self.stack_bytes > 0
            || self
                .args
                .iter()
                .any(|arg| matches!(arg, ArgPass::Reference(_)))
    }
}

// =============================================================================
// Shared classification helpers
// =============================================================================

/// Register class of a value layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Class {
    Integer,
    Float,
}

/// What a layout is for the purpose of passing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    /// A value of the given class and byte size.
    Scalar(Class, u64),
    /// A struct, union or sequence of the given byte size.
    Aggregate(u64),
}

pub(crate) fn kind_of(layout: &Layout) -> Result<Kind> {
    let size = layout
        .byte_size()
        .map_err(|_| Error::illegal_argument(format!("{layout} has no size")))?;
    match layout.shape() {
        Shape::Value { kind, .. } => {
            let class = if *kind == ValueKind::Float {
                Class::Float
            } else {
                Class::Integer
            };
            Ok(Kind::Scalar(class, size))
        }
        Shape::Padding { .. } => Err(Error::illegal_argument(format!(
            "padding {layout} cannot be passed"
        ))),
        Shape::Struct(_) | Shape::Union(_) | Shape::Sequence { .. } if size == 0 => Err(
            Error::illegal_argument(format!("empty aggregate {layout} cannot be passed")),
        ),
        Shape::Struct(_) | Shape::Union(_) | Shape::Sequence { .. } => Ok(Kind::Aggregate(size)),
    }
}

/// A value field inside an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Leaf {
    pub offset: u64,
    pub size: u64,
    pub class: Class,
}

/// Every value field of `layout`, with offsets relative to `base`.
///
/// Only used for small aggregates, so sequences are expanded in full.
pub(crate) fn flatten(layout: &Layout, base: u64, out: &mut Vec<Leaf>) {
    match layout.shape() {
        Shape::Value { kind, bits, .. } => out.push(Leaf {
            offset: base,
            size: bits / 8,
            class: if *kind == ValueKind::Float {
                Class::Float
            } else {
                Class::Integer
            },
        }),
        Shape::Padding { .. } => {}
        Shape::Struct(members) => {
            for (member, offset) in members.iter().zip(layout.member_offsets()) {
                flatten(member, base + offset, out);
            }
        }
        Shape::Union(members) => {
            for member in members {
                flatten(member, base, out);
            }
        }
        Shape::Sequence {
            count: Some(count),
            element,
        } => {
            let stride = element.byte_size().unwrap_or(0);
            for i in 0..*count {
                flatten(element, base + i * stride, out);
            }
        }
        Shape::Sequence { count: None, .. } => {}
    }
}

/// Round `value` up to a multiple of `alignment` (a power of two).
pub(crate) const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Stack area that rejects overflowing the invoker's capacity.
#[derive(Debug, Default)]
pub(crate) struct StackArea {
    used: u64,
}

impl StackArea {
    /// Reserve `size` bytes aligned to `alignment`, returning the offset.
    pub(crate) fn reserve(&mut self, size: u64, alignment: u64) -> Result<u64> {
        let offset = align_up(self.used, alignment.max(1));
        let end = offset + size;
        if end > MAX_STACK_BYTES {
            return Err(Error::illegal_argument(format!(
                "call needs more than {MAX_STACK_BYTES} bytes of stack arguments"
            )));
        }
        self.used = end;
        Ok(offset)
    }

    pub(crate) const fn used(&self) -> u64 {
        self.used
    }
}

/// Eight-byte stack words covering `size` bytes of a value placed at
/// stack offset `base`.
pub(crate) fn stack_words(base: u64, size: u64) -> Vec<Piece> {
    (0..size.div_ceil(8))
        .map(|i| {
            let offset = i * 8;
            Piece::new(offset, (size - offset).min(8), Slot::Stack(base + offset))
        })
        .collect()
}

/// Reject indirect returns the invoker cannot hold.
pub(crate) fn check_indirect_return(size: u64) -> Result<()> {
    if size > MAX_INDIRECT_RETURN {
        Err(Error::illegal_argument(format!(
            "returning {size} bytes exceeds the {MAX_INDIRECT_RETURN}-byte limit"
        )))
    } else {
        Ok(())
    }
}

/// Apply C default argument promotions to the variadic tail.
///
/// `f32` becomes `f64`; integers narrower than 32 bits become 32-bit
/// integers of the same signedness. Fixed arguments are left alone.
#[must_use]
pub fn promote(function: &FunctionDescriptor) -> FunctionDescriptor {
    let Some(first) = function.variadic() else {
        return function.clone();
    };
    let args: Vec<Layout> = function
        .args()
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            if i < first {
                return arg.clone();
            }
            match arg.shape() {
                Shape::Value {
                    kind: ValueKind::Float,
                    bits: 32,
                    ..
                } => Layout::f64(),
                Shape::Value {
                    kind: ValueKind::SignedInt,
                    bits: 8 | 16,
                    ..
                } => Layout::i32(),
                Shape::Value {
                    kind: ValueKind::UnsignedInt,
                    bits: 8 | 16,
                    ..
                } => Layout::u32(),
                _ => arg.clone(),
            }
        })
        .collect();
    FunctionDescriptor::void(args)
        .returning(function.ret().cloned())
        .with_variadic(first)
}
