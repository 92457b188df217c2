// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Tests for Microsoft x64 classification.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use tether_layout::parse_function;

use super::{ArgPass, CallPlan, CallingConvention, Piece, ReturnPass, Slot, Win64};

fn plan(text: &str) -> CallPlan {
    Win64.classify(&parse_function(text).unwrap()).unwrap()
}

#[test]
fn positions_select_the_register() {
    let plan = plan("(i32 f64 i64 f32 i32)f64");
    assert_eq!(
        plan.args,
        vec![
            ArgPass::Pieces(vec![Piece::new(0, 8, Slot::Gpr(0))]),
            ArgPass::Pieces(vec![Piece::new(0, 8, Slot::Fpr(1))]),
            ArgPass::Pieces(vec![Piece::new(0, 8, Slot::Gpr(2))]),
            ArgPass::Pieces(vec![Piece::new(0, 8, Slot::Fpr(3))]),
            ArgPass::Pieces(vec![Piece::new(0, 8, Slot::Stack(0))]),
        ]
    );
    assert_eq!(
        plan.ret,
        ReturnPass::Registers(vec![Piece::new(0, 8, Slot::Fpr(0))])
    );
    assert_eq!(plan.stack_bytes, 8);
}

#[test]
fn power_of_two_aggregates_travel_as_integers() {
    let plan = plan("([i16 i16] [f32 f32] [3 i8])[i32 i32]");
    assert_eq!(
        plan.args[0],
        ArgPass::Pieces(vec![Piece::new(0, 4, Slot::Gpr(0))])
    );
    assert_eq!(
        plan.args[1],
        ArgPass::Pieces(vec![Piece::new(0, 8, Slot::Gpr(1))])
    );
    assert_eq!(plan.args[2], ArgPass::Reference(Slot::Gpr(2)));
    assert_eq!(
        plan.ret,
        ReturnPass::Registers(vec![Piece::new(0, 8, Slot::Gpr(0))])
    );
}

#[test]
fn indirect_return_shifts_positions() {
    let plan = plan("(i32 i32 i32 i32)[i64 i64]");
    assert_eq!(plan.ret, ReturnPass::Indirect(Some(Slot::Gpr(0))));
    assert_eq!(
        plan.args[0],
        ArgPass::Pieces(vec![Piece::new(0, 8, Slot::Gpr(1))])
    );
    assert_eq!(
        plan.args[3],
        ArgPass::Pieces(vec![Piece::new(0, 8, Slot::Stack(0))])
    );
}

#[test]
fn variadic_floats_use_both_register_files() {
    let plan = plan("(u64:i8...f64 f64 f64 f64)i32");
    assert_eq!(
        plan.args[1],
        ArgPass::Pieces(vec![
            Piece::new(0, 8, Slot::Fpr(1)),
            Piece::new(0, 8, Slot::Gpr(1)),
        ])
    );
    // Stack positions carry a single copy.
    assert_eq!(
        plan.args[4],
        ArgPass::Pieces(vec![Piece::new(0, 8, Slot::Stack(0))])
    );
}
