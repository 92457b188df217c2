// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! System V AMD64 classification.
//!
//! Aggregates of up to 16 bytes are split into eightbytes; an eightbyte
//! holding any integer field is INTEGER, otherwise SSE. Larger or packed
//! aggregates are MEMORY: copied onto the stack as arguments, written to a
//! caller buffer whose address is passed in `%rdi` as returns. An aggregate
//! that does not fit the remaining registers goes entirely to the stack.

use tether_layout::{FunctionDescriptor, Layout};
use tether_memory::Result;

use super::{
    Abi, ArgPass, CallPlan, CallingConvention, Class, Kind, Leaf, Piece, ReturnPass, Slot,
    StackArea, check_indirect_return, flatten, kind_of, stack_words,
};

const GPRS: usize = 6;
const FPRS: usize = 8;

/// System V AMD64 calling convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysV;

/// Classes of the eightbytes of a register-passable aggregate, or `None`
/// for MEMORY.
fn eightbytes(layout: &Layout, size: u64) -> Option<Vec<Class>> {
    if size > 16 || layout.is_packed() {
        return None;
    }
    let mut leaves: Vec<Leaf> = Vec::new();
    flatten(layout, 0, &mut leaves);

    let mut classes = vec![None; size.div_ceil(8) as usize];
    for leaf in leaves {
        let slot = &mut classes[(leaf.offset / 8) as usize];
        *slot = match (*slot, leaf.class) {
            (Some(Class::Integer), _) | (_, Class::Integer) => Some(Class::Integer),
            _ => Some(Class::Float),
        };
    }
    Some(
        classes
            .into_iter()
            .map(|class| class.unwrap_or(Class::Integer))
            .collect(),
    )
}

/// Register cursor shared by arguments.
struct Registers {
    gpr: usize,
    fpr: usize,
}

impl Registers {
    /// Assign registers to `classes` if all of them fit.
    fn take(&mut self, classes: &[Class], size: u64) -> Option<Vec<Piece>> {
        let ints = classes.iter().filter(|&&c| c == Class::Integer).count();
        let floats = classes.len() - ints;
        if self.gpr + ints > GPRS || self.fpr + floats > FPRS {
            return None;
        }
        let pieces = classes
            .iter()
            .enumerate()
            .map(|(i, class)| {
                let offset = i as u64 * 8;
                let slot = match class {
                    Class::Integer => {
                        self.gpr += 1;
                        Slot::Gpr(self.gpr - 1)
                    }
                    Class::Float => {
                        self.fpr += 1;
                        Slot::Fpr(self.fpr - 1)
                    }
                };
                Piece::new(offset, (size - offset).min(8), slot)
            })
            .collect();
        Some(pieces)
    }
}

impl CallingConvention for SysV {
    fn abi(&self) -> Abi {
        Abi::SysV
    }

    fn classify(&self, function: &FunctionDescriptor) -> Result<CallPlan> {
        let mut regs = Registers { gpr: 0, fpr: 0 };
        let mut stack = StackArea::default();

        let ret = match function.ret() {
            None => ReturnPass::Void,
            Some(layout) => match kind_of(layout)? {
                Kind::Scalar(Class::Integer, size) => {
                    ReturnPass::Registers(vec![Piece::new(0, size, Slot::Gpr(0))])
                }
                Kind::Scalar(Class::Float, size) => {
                    ReturnPass::Registers(vec![Piece::new(0, size, Slot::Fpr(0))])
                }
                Kind::Aggregate(size) => match eightbytes(layout, size) {
                    Some(classes) => {
                        // Return registers are numbered independently.
                        let mut ret_regs = Registers { gpr: 0, fpr: 0 };
                        let pieces = ret_regs.take(&classes, size).unwrap_or_default();
                        ReturnPass::Registers(pieces)
                    }
                    None => {
                        check_indirect_return(size)?;
                        regs.gpr = 1;
                        ReturnPass::Indirect(Some(Slot::Gpr(0)))
                    }
                },
            },
        };

        let mut args = Vec::with_capacity(function.args().len());
        for layout in function.args() {
            let pass = match kind_of(layout)? {
                Kind::Scalar(class, _) => {
                    let pieces = match regs.take(&[class], 8) {
                        Some(pieces) => pieces,
                        None => stack_words(stack.reserve(8, 8)?, 8),
                    };
                    ArgPass::Pieces(pieces)
                }
                Kind::Aggregate(size) => {
                    let in_regs = eightbytes(layout, size).and_then(|c| regs.take(&c, size));
                    let pieces = match in_regs {
                        Some(pieces) => pieces,
                        None => {
                            let at = stack.reserve(size, layout.byte_alignment().max(8))?;
                            stack_words(at, size)
                        }
                    };
                    ArgPass::Pieces(pieces)
                }
            };
            args.push(pass);
        }

        Ok(CallPlan {
            abi: Abi::SysV,
            args,
            ret,
            gprs: regs.gpr,
            fprs: regs.fpr,
            stack_bytes: stack.used(),
        })
    }
}
