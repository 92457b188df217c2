// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Microsoft x64 classification.
//!
//! Every argument occupies one position. The first four positions map to
//! `rcx, rdx, r8, r9` or `xmm0..xmm3` by class; the rest take eight-byte
//! stack slots. Aggregates of 1, 2, 4 or 8 bytes travel as integers, all
//! others by reference. Variadic floats are passed in both register files.

use tether_layout::FunctionDescriptor;
use tether_memory::Result;

use super::{
    Abi, ArgPass, CallPlan, CallingConvention, Class, Kind, Piece, ReturnPass, Slot, StackArea,
    check_indirect_return, kind_of,
};

const REGISTER_POSITIONS: usize = 4;

/// Microsoft x64 calling convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win64;

const fn fits_integer(size: u64) -> bool {
    matches!(size, 1 | 2 | 4 | 8)
}

impl CallingConvention for Win64 {
    fn abi(&self) -> Abi {
        Abi::Win64
    }

    fn classify(&self, function: &FunctionDescriptor) -> Result<CallPlan> {
        let mut position = 0;
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
                Kind::Aggregate(size) if fits_integer(size) => {
                    ReturnPass::Registers(vec![Piece::new(0, size, Slot::Gpr(0))])
                }
                Kind::Aggregate(size) => {
                    check_indirect_return(size)?;
                    position = 1;
                    ReturnPass::Indirect(Some(Slot::Gpr(0)))
                }
            },
        };

        let mut args = Vec::with_capacity(function.args().len());
        for (i, layout) in function.args().iter().enumerate() {
            let kind = kind_of(layout)?;
            let in_register = position < REGISTER_POSITIONS;
            let integer_slot = if in_register {
                Slot::Gpr(position)
            } else {
                Slot::Stack(stack.reserve(8, 8)?)
            };
            let pass = match kind {
                Kind::Scalar(Class::Float, _) if in_register => {
                    let mut pieces = vec![Piece::new(0, 8, Slot::Fpr(position))];
                    if function.is_variadic_arg(i) {
                        pieces.push(Piece::new(0, 8, integer_slot));
                    }
                    ArgPass::Pieces(pieces)
                }
                Kind::Scalar(..) => ArgPass::Pieces(vec![Piece::new(0, 8, integer_slot)]),
                Kind::Aggregate(size) if fits_integer(size) => {
                    ArgPass::Pieces(vec![Piece::new(0, size, integer_slot)])
                }
                Kind::Aggregate(_) => ArgPass::Reference(integer_slot),
            };
            args.push(pass);
            position += 1;
        }

        let registers = position.min(REGISTER_POSITIONS);
        Ok(CallPlan {
            abi: Abi::Win64,
            args,
            ret,
            gprs: registers,
            fprs: registers,
            stack_bytes: stack.used(),
        })
    }
}
