// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Monomorphized upcall entry points.
//!
//! Each trampoline takes every integer and float argument register of the
//! host, so whatever registers a native caller fills are visible to the
//! dispatcher. One instance exists per slot and return class.

use super::{ReturnClass, UPCALL_SLOTS, dispatch};
use crate::abi::Slot;

/// Argument registers as received by a trampoline.
pub(super) struct Incoming {
    gpr: [u64; INT_REGS],
    fpr: [u64; FLOAT_REGS],
}

impl Incoming {
    /// Raw contents of an argument register, zero for stack slots.
    pub(super) fn word(&self, slot: Slot) -> u64 {
        match slot {
            Slot::Gpr(n) => self.gpr.get(n).copied().unwrap_or(0),
            Slot::Fpr(n) => self.fpr.get(n).copied().unwrap_or(0),
            Slot::Stack(_) => 0,
        }
    }
}

macro_rules! trampolines {
    ($ints:literal [$($g:ident),*] $floats:literal [$($f:ident),*]) => {
        /// Integer argument registers seen by a trampoline.
        pub(super) const INT_REGS: usize = $ints;
        /// Float argument registers seen by a trampoline.
        pub(super) const FLOAT_REGS: usize = $floats;

        type IntEntry = extern "C" fn($($g: u64,)* $($f: f64,)*) -> u64;
        type FloatEntry = extern "C" fn($($g: u64,)* $($f: f64,)*) -> f64;

        extern "C" fn int_trampoline<const SLOT: usize>($($g: u64,)* $($f: f64,)*) -> u64 {
            let incoming = Incoming {
                gpr: [$($g),*],
                fpr: [$($f.to_bits()),*],
            };
            dispatch(ReturnClass::Int, SLOT, &incoming)
        }

        extern "C" fn float_trampoline<const SLOT: usize>($($g: u64,)* $($f: f64,)*) -> f64 {
            let incoming = Incoming {
                gpr: [$($g),*],
                fpr: [$($f.to_bits()),*],
            };
            f64::from_bits(dispatch(ReturnClass::Float, SLOT, &incoming))
        }
    };
}

#[cfg(all(target_arch = "x86_64", not(windows)))]
trampolines!(6 [g0, g1, g2, g3, g4, g5] 8 [f0, f1, f2, f3, f4, f5, f6, f7]);

#[cfg(target_arch = "aarch64")]
trampolines!(8 [g0, g1, g2, g3, g4, g5, g6, g7] 8 [f0, f1, f2, f3, f4, f5, f6, f7]);

// Positional registers: floats would land in xmm registers the integer
// positions cannot see, so Win64 upcalls take integer-class arguments only.
#[cfg(all(target_arch = "x86_64", windows))]
trampolines!(4 [g0, g1, g2, g3] 0 []);

macro_rules! table {
    ($f:ident) => {
        [
            $f::<0>, $f::<1>, $f::<2>, $f::<3>, $f::<4>, $f::<5>, $f::<6>, $f::<7>,
            $f::<8>, $f::<9>, $f::<10>, $f::<11>, $f::<12>, $f::<13>, $f::<14>, $f::<15>,
            $f::<16>, $f::<17>, $f::<18>, $f::<19>, $f::<20>, $f::<21>, $f::<22>, $f::<23>,
            $f::<24>, $f::<25>, $f::<26>, $f::<27>, $f::<28>, $f::<29>, $f::<30>, $f::<31>,
            $f::<32>, $f::<33>, $f::<34>, $f::<35>, $f::<36>, $f::<37>, $f::<38>, $f::<39>,
            $f::<40>, $f::<41>, $f::<42>, $f::<43>, $f::<44>, $f::<45>, $f::<46>, $f::<47>,
            $f::<48>, $f::<49>, $f::<50>, $f::<51>, $f::<52>, $f::<53>, $f::<54>, $f::<55>,
            $f::<56>, $f::<57>, $f::<58>, $f::<59>, $f::<60>, $f::<61>, $f::<62>, $f::<63>,
        ]
    };
}

static INT_TABLE: [IntEntry; UPCALL_SLOTS] = table!(int_trampoline);
static FLOAT_TABLE: [FloatEntry; UPCALL_SLOTS] = table!(float_trampoline);

/// Native address of the trampoline bound to `slot`.
pub(super) fn entry_point(class: ReturnClass, slot: usize) -> usize {
    match class {
        ReturnClass::Int => INT_TABLE.get(slot).map_or(0, |f| *f as usize),
        ReturnClass::Float => FLOAT_TABLE.get(slot).map_or(0, |f| *f as usize),
    }
}
