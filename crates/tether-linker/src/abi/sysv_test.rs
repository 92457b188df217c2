// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Tests for System V AMD64 classification.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use tether_layout::{FunctionDescriptor, Layout, parse_function};
use tether_memory::ErrorKind;

use super::{ArgPass, CallPlan, CallingConvention, MAX_STACK_BYTES, Piece, ReturnPass, Slot, SysV};

fn plan(text: &str) -> CallPlan {
    SysV.classify(&parse_function(text).unwrap()).unwrap()
}

fn pieces(pass: &ArgPass) -> &[Piece] {
    match pass {
        ArgPass::Pieces(pieces) => pieces,
        ArgPass::Reference(slot) => panic!("passed by reference in {slot:?}"),
    }
}

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn scalars_use_separate_register_files() {
    let plan = plan("(i32 f64 i64 f32)i32");
    let slots: Vec<Slot> = plan.args.iter().map(|a| pieces(a)[0].slot).collect();
    assert_eq!(
        slots,
        vec![Slot::Gpr(0), Slot::Fpr(0), Slot::Gpr(1), Slot::Fpr(1)]
    );
    assert_eq!(
        plan.ret,
        ReturnPass::Registers(vec![Piece::new(0, 4, Slot::Gpr(0))])
    );
    assert_eq!((plan.gprs, plan.fprs, plan.stack_bytes), (2, 2, 0));
    assert!(!plan.uses_memory());
}

#[test]
fn seventh_integer_goes_to_the_stack() {
    let plan = plan("(i64 i64 i64 i64 i64 i64 i8 i64)v");
    assert_eq!(pieces(&plan.args[5])[0].slot, Slot::Gpr(5));
    assert_eq!(pieces(&plan.args[6]), &[Piece::new(0, 8, Slot::Stack(0))]);
    assert_eq!(pieces(&plan.args[7]), &[Piece::new(0, 8, Slot::Stack(8))]);
    assert_eq!(plan.stack_bytes, 16);
    assert_eq!(plan.ret, ReturnPass::Void);
}

#[test]
fn float_return() {
    assert_eq!(
        plan("()f32").ret,
        ReturnPass::Registers(vec![Piece::new(0, 4, Slot::Fpr(0))])
    );
}

// ============================================================================
// Aggregates
// ============================================================================

#[test]
fn mixed_eightbytes() {
    let plan = plan("([f32 f32 i32])v");
    assert_eq!(
        pieces(&plan.args[0]),
        &[Piece::new(0, 8, Slot::Fpr(0)), Piece::new(8, 4, Slot::Gpr(0))]
    );
}

#[test]
fn integer_wins_within_an_eightbyte() {
    let plan = plan("([f32 i32 f64])v");
    assert_eq!(
        pieces(&plan.args[0]),
        &[Piece::new(0, 8, Slot::Gpr(0)), Piece::new(8, 8, Slot::Fpr(0))]
    );
}

#[test]
fn large_aggregates_are_copied_to_the_stack() {
    let plan = plan("(i32 [3 i64] i32)v");
    assert_eq!(
        pieces(&plan.args[1]),
        &[
            Piece::new(0, 8, Slot::Stack(0)),
            Piece::new(8, 8, Slot::Stack(8)),
            Piece::new(16, 8, Slot::Stack(16)),
        ]
    );
    assert_eq!(pieces(&plan.args[2])[0].slot, Slot::Gpr(1));
    assert!(plan.uses_memory());
}

#[test]
fn aggregate_does_not_split_between_registers_and_stack() {
    let plan = plan("(i64 i64 i64 i64 i64 [i64 i64] i64)v");
    assert_eq!(
        pieces(&plan.args[5]),
        &[Piece::new(0, 8, Slot::Stack(0)), Piece::new(8, 8, Slot::Stack(8))]
    );
    // The remaining register is still available to later arguments.
    assert_eq!(pieces(&plan.args[6])[0].slot, Slot::Gpr(5));
}

#[test]
fn padded_aggregate_fills_one_eightbyte() {
    let plan = plan("([i8 i32])v");
    assert_eq!(pieces(&plan.args[0]), &[Piece::new(0, 8, Slot::Gpr(0))]);
}

#[test]
fn packed_aggregates_are_memory() {
    let unaligned = Layout::i32().with_byte_alignment(1).unwrap();
    let packed = Layout::structure([Layout::i8(), unaligned]).unwrap();
    assert!(packed.is_packed());
    let plan = SysV
        .classify(&FunctionDescriptor::void([packed]))
        .unwrap();
    assert_eq!(pieces(&plan.args[0]), &[Piece::new(0, 5, Slot::Stack(0))]);
}

#[test]
fn small_aggregate_returns() {
    assert_eq!(
        plan("()[i64 i64]").ret,
        ReturnPass::Registers(vec![
            Piece::new(0, 8, Slot::Gpr(0)),
            Piece::new(8, 8, Slot::Gpr(1)),
        ])
    );
    assert_eq!(
        plan("()[f64 i32]").ret,
        ReturnPass::Registers(vec![
            Piece::new(0, 8, Slot::Fpr(0)),
            Piece::new(8, 4, Slot::Gpr(0)),
        ])
    );
}

#[test]
fn large_returns_are_indirect_through_the_first_register() {
    let plan = plan("(i32)[4 i64]");
    assert_eq!(plan.ret, ReturnPass::Indirect(Some(Slot::Gpr(0))));
    assert_eq!(pieces(&plan.args[0])[0].slot, Slot::Gpr(1));
}

// ============================================================================
// Variadic calls
// ============================================================================

#[test]
fn variadic_arguments_are_placed_like_fixed_ones() {
    let plan = plan("(u64:i8...f64 i32)i32");
    assert_eq!(pieces(&plan.args[1])[0].slot, Slot::Fpr(0));
    assert_eq!(pieces(&plan.args[2])[0].slot, Slot::Gpr(1));
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn unpassable_layouts() {
    let padding = FunctionDescriptor::void([Layout::padding(32).unwrap()]);
    assert_eq!(
        SysV.classify(&padding).unwrap_err().kind(),
        ErrorKind::IllegalArgument
    );
    let open = parse_function("([0 i32])v").unwrap();
    assert_eq!(
        SysV.classify(&open).unwrap_err().kind(),
        ErrorKind::IllegalArgument
    );
}

#[test]
fn stack_capacity_is_bounded() {
    let words = (MAX_STACK_BYTES / 8) as usize;
    let fits = FunctionDescriptor::void(vec![Layout::i64(); 6 + words]);
    assert_eq!(SysV.classify(&fits).unwrap().stack_bytes, MAX_STACK_BYTES);

    let overflows = fits.append_arg(Layout::i64());
    assert_eq!(
        SysV.classify(&overflows).unwrap_err().kind(),
        ErrorKind::IllegalArgument
    );
}

#[test]
fn indirect_return_size_is_bounded() {
    assert!(SysV.classify(&parse_function("()[32 i64]").unwrap()).is_ok());
    assert_eq!(
        SysV.classify(&parse_function("()[33 i64]").unwrap())
            .unwrap_err()
            .kind(),
        ErrorKind::IllegalArgument
    );
}
