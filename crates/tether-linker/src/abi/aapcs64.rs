// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! AArch64 procedure call standard, generic and Apple flavours.
//!
//! Homogeneous floating-point aggregates (one to four floats of the same
//! width) travel in consecutive vector registers. Other composites larger
//! than 16 bytes are copied to caller memory and passed by address; smaller
//! ones occupy one general register per eight bytes. Apple packs stack
//! arguments at their natural size and passes the whole variadic tail on the
//! stack in eight-byte slots.

use tether_layout::{FunctionDescriptor, Layout, Shape};
use tether_memory::Result;

use super::{
    Abi, ArgPass, CallPlan, CallingConvention, Class, Kind, Leaf, Piece, ReturnPass, Slot,
    StackArea, align_up, check_indirect_return, flatten, kind_of, stack_words,
};

const GPRS: usize = 8;
const FPRS: usize = 8;

/// AAPCS64 as used on Linux and other ELF platforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aapcs64;

/// AAPCS64 with Apple's stack packing and variadic rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aapcs64Apple;

impl CallingConvention for Aapcs64 {
    fn abi(&self) -> Abi {
        Abi::Aapcs64
    }

    fn classify(&self, function: &FunctionDescriptor) -> Result<CallPlan> {
        classify(function, Abi::Aapcs64)
    }
}

impl CallingConvention for Aapcs64Apple {
    fn abi(&self) -> Abi {
        Abi::Aapcs64Apple
    }

    fn classify(&self, function: &FunctionDescriptor) -> Result<CallPlan> {
        classify(function, Abi::Aapcs64Apple)
    }
}

fn contains_union(layout: &Layout) -> bool {
    match layout.shape() {
        Shape::Union(_) => true,
        Shape::Struct(members) => members.iter().any(contains_union),
        Shape::Sequence { element, .. } => contains_union(element),
        Shape::Value { .. } | Shape::Padding { .. } => false,
    }
}

/// Member width and count of a homogeneous floating-point aggregate.
fn hfa(layout: &Layout, size: u64) -> Option<(u64, usize)> {
    if contains_union(layout) {
        return None;
    }
    let mut leaves: Vec<Leaf> = Vec::new();
    flatten(layout, 0, &mut leaves);
    let first = leaves.first()?;
    let width = first.size;
    let homogeneous = leaves.len() <= 4
        && leaves.iter().enumerate().all(|(i, leaf)| {
            leaf.class == Class::Float && leaf.size == width && leaf.offset == i as u64 * width
        });
    (homogeneous && width * leaves.len() as u64 == size).then_some((width, leaves.len()))
}

fn hfa_pieces(width: u64, count: usize, first: usize) -> Vec<Piece> {
    (0..count)
        .map(|i| Piece::new(i as u64 * width, width, Slot::Fpr(first + i)))
        .collect()
}

fn gpr_pieces(size: u64, first: usize) -> Vec<Piece> {
    (0..size.div_ceil(8))
        .map(|i| {
            let offset = i * 8;
            Piece::new(offset, (size - offset).min(8), Slot::Gpr(first + i as usize))
        })
        .collect()
}

struct Cursor {
    apple: bool,
    ngrn: usize,
    nsrn: usize,
    stack: StackArea,
}

impl Cursor {
    /// A scalar word on the stack.
    fn stack_scalar(&mut self, size: u64, packed: bool) -> Result<Vec<Piece>> {
        if packed {
            let at = self.stack.reserve(size, size)?;
            Ok(vec![Piece::new(0, size, Slot::Stack(at))])
        } else {
            Ok(stack_words(self.stack.reserve(8, 8)?, 8))
        }
    }

    /// A composite copied to the stack in eight-byte units.
    fn stack_composite(&mut self, layout: &Layout, size: u64) -> Result<Vec<Piece>> {
        let at = self
            .stack
            .reserve(align_up(size, 8), layout.byte_alignment().max(8))?;
        Ok(stack_words(at, size))
    }

    fn address_slot(&mut self, on_stack: bool) -> Result<Slot> {
        if !on_stack && self.ngrn < GPRS {
            self.ngrn += 1;
            Ok(Slot::Gpr(self.ngrn - 1))
        } else {
            Ok(Slot::Stack(self.stack.reserve(8, 8)?))
        }
    }

    fn arg(&mut self, layout: &Layout, variadic: bool) -> Result<ArgPass> {
        // Apple passes every variadic argument in memory.
        let on_stack = self.apple && variadic;
        let pass = match kind_of(layout)? {
            Kind::Scalar(class, size) => {
                let (next, limit) = match class {
                    Class::Integer => (&mut self.ngrn, GPRS),
                    Class::Float => (&mut self.nsrn, FPRS),
                };
                if !on_stack && *next < limit {
                    let slot = match class {
                        Class::Integer => Slot::Gpr(*next),
                        Class::Float => Slot::Fpr(*next),
                    };
                    *next += 1;
                    ArgPass::Pieces(vec![Piece::new(0, 8, slot)])
                } else {
                    ArgPass::Pieces(self.stack_scalar(size, self.apple && !variadic)?)
                }
            }
            Kind::Aggregate(size) => {
                if let Some((width, count)) = hfa(layout, size) {
                    if !on_stack && self.nsrn + count <= FPRS {
                        let pieces = hfa_pieces(width, count, self.nsrn);
                        self.nsrn += count;
                        ArgPass::Pieces(pieces)
                    } else {
                        if !on_stack {
                            self.nsrn = FPRS;
                        }
                        ArgPass::Pieces(self.stack_composite(layout, size)?)
                    }
                } else if size > 16 {
                    ArgPass::Reference(self.address_slot(on_stack)?)
                } else {
                    let words = size.div_ceil(8) as usize;
                    if !on_stack && layout.byte_alignment() == 16 {
                        self.ngrn = self.ngrn.next_multiple_of(2);
                    }
                    if !on_stack && self.ngrn + words <= GPRS {
                        let pieces = gpr_pieces(size, self.ngrn);
                        self.ngrn += words;
                        ArgPass::Pieces(pieces)
                    } else {
                        if !on_stack {
                            self.ngrn = GPRS;
                        }
                        ArgPass::Pieces(self.stack_composite(layout, size)?)
                    }
                }
            }
        };
        Ok(pass)
    }
}

fn classify_return(layout: Option<&Layout>) -> Result<ReturnPass> {
    let Some(layout) = layout else {
        return Ok(ReturnPass::Void);
    };
    let pass = match kind_of(layout)? {
        Kind::Scalar(Class::Integer, size) => {
            ReturnPass::Registers(vec![Piece::new(0, size, Slot::Gpr(0))])
        }
        Kind::Scalar(Class::Float, size) => {
            ReturnPass::Registers(vec![Piece::new(0, size, Slot::Fpr(0))])
        }
        Kind::Aggregate(size) => match hfa(layout, size) {
            Some((width, count)) => ReturnPass::Registers(hfa_pieces(width, count, 0)),
            None if size <= 16 => ReturnPass::Registers(gpr_pieces(size, 0)),
            None => {
                check_indirect_return(size)?;
                ReturnPass::Indirect(None)
            }
        },
    };
    Ok(pass)
}

fn classify(function: &FunctionDescriptor, abi: Abi) -> Result<CallPlan> {
    let ret = classify_return(function.ret())?;
    let mut cursor = Cursor {
        apple: abi == Abi::Aapcs64Apple,
        ngrn: 0,
        nsrn: 0,
        stack: StackArea::default(),
    };
    let args = function
        .args()
        .iter()
        .enumerate()
        .map(|(i, layout)| cursor.arg(layout, function.is_variadic_arg(i)))
        .collect::<Result<Vec<_>>>()?;

    Ok(CallPlan {
        abi,
        args,
        ret,
        gprs: cursor.ngrn,
        fprs: cursor.nsrn,
        stack_bytes: cursor.stack.used(),
    })
}
