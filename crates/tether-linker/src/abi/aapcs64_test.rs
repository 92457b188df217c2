// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Tests for AArch64 classification.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use tether_layout::parse_function;
use tether_memory::ErrorKind;

use super::{
    Aapcs64, Aapcs64Apple, ArgPass, CallPlan, CallingConvention, Piece, ReturnPass, Slot,
};

fn linux(text: &str) -> CallPlan {
    Aapcs64.classify(&parse_function(text).unwrap()).unwrap()
}

fn apple(text: &str) -> CallPlan {
    Aapcs64Apple.classify(&parse_function(text).unwrap()).unwrap()
}

fn pieces(pass: &ArgPass) -> &[Piece] {
    match pass {
        ArgPass::Pieces(pieces) => pieces,
        ArgPass::Reference(slot) => panic!("passed by reference in {slot:?}"),
    }
}

// ============================================================================
// Homogeneous float aggregates
// ============================================================================

#[test]
fn hfa_members_take_one_register_each() {
    let plan = linux("([f32 f32 f32])[2 f64]");
    assert_eq!(
        pieces(&plan.args[0]),
        &[
            Piece::new(0, 4, Slot::Fpr(0)),
            Piece::new(4, 4, Slot::Fpr(1)),
            Piece::new(8, 4, Slot::Fpr(2)),
        ]
    );
    assert_eq!(
        plan.ret,
        ReturnPass::Registers(vec![
            Piece::new(0, 8, Slot::Fpr(0)),
            Piece::new(8, 8, Slot::Fpr(1)),
        ])
    );
}

#[test]
fn mixed_widths_are_not_hfas() {
    let plan = linux("([f32 f32 f64])v");
    assert_eq!(
        pieces(&plan.args[0]),
        &[Piece::new(0, 8, Slot::Gpr(0)), Piece::new(8, 8, Slot::Gpr(1))]
    );
}

#[test]
fn unions_are_not_hfas() {
    let plan = linux("([f64|f64])v");
    assert_eq!(pieces(&plan.args[0]), &[Piece::new(0, 8, Slot::Gpr(0))]);
}

#[test]
fn hfa_that_does_not_fit_goes_to_the_stack() {
    let plan = linux("(f64 f64 f64 f64 f64 f64 [4 f32] [2 f32] f64)v");
    assert_eq!(
        pieces(&plan.args[6]),
        &[Piece::new(0, 8, Slot::Stack(0)), Piece::new(8, 8, Slot::Stack(8))]
    );
    // Once an HFA spills, later floats no longer use registers.
    assert_eq!(pieces(&plan.args[7])[0].slot, Slot::Stack(16));
    assert_eq!(pieces(&plan.args[8])[0].slot, Slot::Stack(24));
}

// ============================================================================
// Composites
// ============================================================================

#[test]
fn large_composites_are_passed_by_reference() {
    let plan = linux("(i32 [3 i64])[3 i64]");
    assert_eq!(plan.args[1], ArgPass::Reference(Slot::Gpr(1)));
    assert_eq!(plan.ret, ReturnPass::Indirect(None));
    assert!(plan.uses_memory());
}

#[test]
fn small_composites_use_general_registers() {
    let plan = linux("([i32 f32 i64] i32)[i16 i16]");
    assert_eq!(
        pieces(&plan.args[0]),
        &[Piece::new(0, 8, Slot::Gpr(0)), Piece::new(8, 8, Slot::Gpr(1))]
    );
    assert_eq!(pieces(&plan.args[1])[0].slot, Slot::Gpr(2));
    assert_eq!(
        plan.ret,
        ReturnPass::Registers(vec![Piece::new(0, 4, Slot::Gpr(0))])
    );
}

#[test]
fn composite_spill_closes_the_integer_registers() {
    let plan = linux("(i64 i64 i64 i64 i64 i64 i64 [i64 i64] i32)v");
    assert_eq!(
        pieces(&plan.args[7]),
        &[Piece::new(0, 8, Slot::Stack(0)), Piece::new(8, 8, Slot::Stack(8))]
    );
    assert_eq!(pieces(&plan.args[8]), &[Piece::new(0, 8, Slot::Stack(16))]);
}

// ============================================================================
// Stack packing and variadic calls
// ============================================================================

#[test]
fn linux_stack_slots_are_eight_bytes() {
    let plan = linux("(i64 i64 i64 i64 i64 i64 i64 i64 i8 i16 i32)v");
    let slots: Vec<Slot> = plan.args[8..].iter().map(|a| pieces(a)[0].slot).collect();
    assert_eq!(slots, vec![Slot::Stack(0), Slot::Stack(8), Slot::Stack(16)]);
    assert_eq!(plan.stack_bytes, 24);
}

#[test]
fn apple_packs_the_stack() {
    let plan = apple("(i64 i64 i64 i64 i64 i64 i64 i64 i8 i16 i32)v");
    assert_eq!(
        plan.args[8..]
            .iter()
            .map(|a| pieces(a)[0])
            .collect::<Vec<_>>(),
        vec![
            Piece::new(0, 1, Slot::Stack(0)),
            Piece::new(0, 2, Slot::Stack(2)),
            Piece::new(0, 4, Slot::Stack(4)),
        ]
    );
    assert_eq!(plan.stack_bytes, 8);
}

#[test]
fn variadic_tail() {
    let text = "(u64:i8...f64 i32)i32";
    let generic = linux(text);
    assert_eq!(pieces(&generic.args[1])[0].slot, Slot::Fpr(0));
    assert_eq!(pieces(&generic.args[2])[0].slot, Slot::Gpr(1));

    let darwin = apple(text);
    assert_eq!(pieces(&darwin.args[0])[0].slot, Slot::Gpr(0));
    assert_eq!(pieces(&darwin.args[1]), &[Piece::new(0, 8, Slot::Stack(0))]);
    assert_eq!(pieces(&darwin.args[2]), &[Piece::new(0, 8, Slot::Stack(8))]);
    assert_eq!((darwin.gprs, darwin.fprs), (1, 0));
}

#[test]
fn oversized_indirect_return() {
    assert_eq!(
        Aapcs64
            .classify(&parse_function("()[40 i64]").unwrap())
            .unwrap_err()
            .kind(),
        ErrorKind::IllegalArgument
    );
}
