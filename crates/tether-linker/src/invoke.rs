// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Executes a [`CallPlan`] on the host.
//!
//! Every downcall goes through one fixed native signature per host: all
//! integer argument registers, all float argument registers, then
//! [`STACK_WORDS`] stack words. A callee reads the registers and stack
//! words its own signature names and ignores the rest, so a register file
//! filled from the plan is enough to call any supported function. The
//! return type is chosen among a few `#[repr(C)]` shapes that cover every
//! register combination the conventions produce.

use std::mem;

use tether_memory::{Error, Result};

use crate::abi::{MAX_INDIRECT_RETURN, MAX_STACK_BYTES, Piece, ReturnPass, Slot};

/// Stack words passed on every call.
pub(crate) const STACK_WORDS: usize = (MAX_STACK_BYTES / 8) as usize;

const BIG_WORDS: usize = (MAX_INDIRECT_RETURN / 8) as usize;

// =============================================================================
// Register file
// =============================================================================

/// Argument registers and stack area of one call.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    gpr: [u64; 8],
    fpr: [u64; 8],
    stack: [u8; MAX_STACK_BYTES as usize],
    /// Positions whose value lives only in a float register.
    #[cfg(all(target_arch = "x86_64", windows))]
    float_mask: u8,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            gpr: [0; 8],
            fpr: [0; 8],
            stack: [0; MAX_STACK_BYTES as usize],
            #[cfg(all(target_arch = "x86_64", windows))]
            float_mask: 0,
        }
    }
}

impl Frame {
    /// Store `bytes` (at most eight) in `slot`, zero-extended for registers.
    pub(crate) fn put(&mut self, slot: Slot, bytes: &[u8]) {
        match slot {
            Slot::Gpr(n) => {
                if let Some(reg) = self.gpr.get_mut(n) {
                    *reg = widen(bytes);
                }
                #[cfg(all(target_arch = "x86_64", windows))]
                {
                    self.float_mask &= !(1 << n);
                }
            }
            Slot::Fpr(n) => {
                if let Some(reg) = self.fpr.get_mut(n) {
                    *reg = widen(bytes);
                }
                #[cfg(all(target_arch = "x86_64", windows))]
                {
                    self.float_mask |= 1 << n;
                }
            }
            Slot::Stack(offset) => {
                let start = offset as usize;
                if let Some(dst) = self.stack.get_mut(start..start + bytes.len()) {
                    dst.copy_from_slice(bytes);
                }
            }
        }
    }

    /// Store a piece of `value`.
    pub(crate) fn put_piece(&mut self, piece: Piece, value: &[u8]) {
        let start = piece.offset as usize;
        if let Some(bytes) = value.get(start..start + piece.size as usize) {
            self.put(piece.slot, bytes);
        }
    }

    fn stack_words(&self) -> [u64; STACK_WORDS] {
        let mut words = [0u64; STACK_WORDS];
        for (word, chunk) in words.iter_mut().zip(self.stack.chunks_exact(8)) {
            *word = widen(chunk);
        }
        words
    }
}

pub(crate) fn widen(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    let len = bytes.len().min(8);
    word[..len].copy_from_slice(&bytes[..len]);
    u64::from_ne_bytes(word)
}

/// Registers read back after a call.
#[derive(Debug, Clone, Default)]
pub(crate) struct Returned {
    gpr: [u64; 2],
    fpr: [u64; 4],
    /// Bytes written through the indirect result register.
    memory: Vec<u8>,
}

impl Returned {
    /// Copy `piece` of the result into `value`.
    pub(crate) fn take_piece(&self, piece: Piece, value: &mut [u8]) {
        let word = match piece.slot {
            Slot::Gpr(n) => self.gpr.get(n).copied(),
            Slot::Fpr(n) => self.fpr.get(n).copied(),
            Slot::Stack(_) => None,
        };
        let start = piece.offset as usize;
        if let (Some(word), Some(dst)) = (word, value.get_mut(start..start + piece.size as usize))
        {
            dst.copy_from_slice(&word.to_ne_bytes()[..dst.len()]);
        }
    }

    /// Bytes returned through the indirect result register.
    pub(crate) fn memory(&self) -> &[u8] {
        &self.memory
    }
}

// =============================================================================
// Return shapes
// =============================================================================

/// Native return type the invoker declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReturnShape {
    /// One integer register (also used for `void` and pointer returns).
    Int,
    /// One float register.
    Float,
    IntInt,
    FloatFloat,
    IntFloat,
    FloatInt,
    /// Up to four float registers.
    Hfa,
    /// `size` bytes through the indirect result register.
    Memory(u64),
}

impl ReturnShape {
    /// Shape that receives `ret`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] for register combinations no
    /// convention produces.
    pub(crate) fn of(ret: &ReturnPass, size: u64) -> Result<Self> {
        let pieces = match ret {
            ReturnPass::Void | ReturnPass::Indirect(Some(_)) => return Ok(Self::Int),
            ReturnPass::Indirect(None) => return Ok(Self::Memory(size)),
            ReturnPass::Registers(pieces) => pieces,
        };
        let slots: Vec<Slot> = pieces.iter().map(|piece| piece.slot).collect();
        let shape = match slots.as_slice() {
            [Slot::Gpr(0)] => Self::Int,
            [Slot::Fpr(0)] => Self::Float,
            [Slot::Gpr(0), Slot::Gpr(1)] => Self::IntInt,
            [Slot::Fpr(0), Slot::Fpr(1)] => Self::FloatFloat,
            [Slot::Gpr(0), Slot::Fpr(0)] => Self::IntFloat,
            [Slot::Fpr(0), Slot::Gpr(0)] => Self::FloatInt,
            [Slot::Fpr(0), Slot::Fpr(1), Slot::Fpr(2)]
            | [Slot::Fpr(0), Slot::Fpr(1), Slot::Fpr(2), Slot::Fpr(3)] => Self::Hfa,
            _ => {
                return Err(Error::illegal_argument(format!(
                    "unsupported return registers {slots:?}"
                )));
            }
        };
        Ok(shape)
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
struct RetII(u64, u64);

#[repr(C)]
#[derive(Clone, Copy)]
struct RetFF(f64, f64);

#[repr(C)]
#[derive(Clone, Copy)]
struct RetIF(u64, f64);

#[repr(C)]
#[derive(Clone, Copy)]
struct RetFI(f64, u64);

#[repr(C)]
#[derive(Clone, Copy)]
struct Hfa4(f64, f64, f64, f64);

/// Larger than any register return, so the callee writes it through the
/// indirect result register.
#[repr(C)]
#[derive(Clone, Copy)]
struct Big([u64; BIG_WORDS]);

// =============================================================================
// Host signatures
// =============================================================================

// System V: a variadic prototype makes the caller set `%al`, which variadic
// callees need and fixed ones ignore. The six integer registers come first so
// the stack words land in the stack area in order.
#[cfg(all(target_arch = "x86_64", not(windows)))]
macro_rules! native_call {
    ($target:expr, $frame:expr, $ret:ty) => {{
        type Native = unsafe extern "C" fn(u64, ...) -> $ret;
        // SAFETY: the caller guarantees `$target` is a function address.
        let f = unsafe { mem::transmute::<usize, Native>($target) };
        let g = $frame.gpr;
        let d = $frame.fpr.map(f64::from_bits);
        let s = $frame.stack_words();
        // SAFETY: the caller guarantees the plan matches the callee.
        unsafe {
            f(
                g[0], g[1], g[2], g[3], g[4], g[5], d[0], d[1], d[2], d[3], d[4], d[5], d[6],
                d[7], s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7], s[8], s[9], s[10], s[11],
                s[12], s[13], s[14], s[15],
            )
        }
    }};
}

// AArch64: eight integer and eight float registers, then stack words. Apple's
// variadic callees read their tail from the same stack words.
#[cfg(target_arch = "aarch64")]
macro_rules! native_call {
    ($target:expr, $frame:expr, $ret:ty) => {{
        type Native = unsafe extern "C" fn(
            u64, u64, u64, u64, u64, u64, u64, u64,
            f64, f64, f64, f64, f64, f64, f64, f64,
            u64, u64, u64, u64, u64, u64, u64, u64,
            u64, u64, u64, u64, u64, u64, u64, u64,
        ) -> $ret;
        // SAFETY: the caller guarantees `$target` is a function address.
        let f = unsafe { mem::transmute::<usize, Native>($target) };
        let g = $frame.gpr;
        let d = $frame.fpr.map(f64::from_bits);
        let s = $frame.stack_words();
        // SAFETY: the caller guarantees the plan matches the callee.
        unsafe {
            f(
                g[0], g[1], g[2], g[3], g[4], g[5], g[6], g[7], d[0], d[1], d[2], d[3], d[4],
                d[5], d[6], d[7], s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7], s[8], s[9],
                s[10], s[11], s[12], s[13], s[14], s[15],
            )
        }
    }};
}

// Microsoft x64: each of the first four positions is either an integer or a
// float register, so the signature is picked by a mask of float positions.
#[cfg(all(target_arch = "x86_64", windows))]
macro_rules! positional {
    (@ty i) => { u64 };
    (@ty f) => { f64 };
    (@arg i, $frame:expr, $n:literal) => { $frame.gpr[$n] };
    (@arg f, $frame:expr, $n:literal) => { f64::from_bits($frame.fpr[$n]) };
    ($target:expr, $frame:expr, $ret:ty; $a:ident $b:ident $c:ident $d:ident) => {{
        type Native = unsafe extern "C" fn(
            positional!(@ty $a), positional!(@ty $b), positional!(@ty $c), positional!(@ty $d),
            u64, u64, u64, u64, u64, u64, u64, u64,
            u64, u64, u64, u64, u64, u64, u64, u64,
        ) -> $ret;
        // SAFETY: the caller guarantees `$target` is a function address.
        let f = unsafe { mem::transmute::<usize, Native>($target) };
        let s = $frame.stack_words();
        // SAFETY: the caller guarantees the plan matches the callee.
        unsafe {
            f(
                positional!(@arg $a, $frame, 0),
                positional!(@arg $b, $frame, 1),
                positional!(@arg $c, $frame, 2),
                positional!(@arg $d, $frame, 3),
                s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7],
                s[8], s[9], s[10], s[11], s[12], s[13], s[14], s[15],
            )
        }
    }};
}

#[cfg(all(target_arch = "x86_64", windows))]
macro_rules! native_call {
    ($target:expr, $frame:expr, $ret:ty) => {{
        let frame: &Frame = $frame;
        match frame.float_mask & 0b1111 {
            0b0000 => positional!($target, frame, $ret; i i i i),
            0b0001 => positional!($target, frame, $ret; f i i i),
            0b0010 => positional!($target, frame, $ret; i f i i),
            0b0011 => positional!($target, frame, $ret; f f i i),
            0b0100 => positional!($target, frame, $ret; i i f i),
            0b0101 => positional!($target, frame, $ret; f i f i),
            0b0110 => positional!($target, frame, $ret; i f f i),
            0b0111 => positional!($target, frame, $ret; f f f i),
            0b1000 => positional!($target, frame, $ret; i i i f),
            0b1001 => positional!($target, frame, $ret; f i i f),
            0b1010 => positional!($target, frame, $ret; i f i f),
            0b1011 => positional!($target, frame, $ret; f f i f),
            0b1100 => positional!($target, frame, $ret; i i f f),
            0b1101 => positional!($target, frame, $ret; f i f f),
            0b1110 => positional!($target, frame, $ret; i f f f),
            _ => positional!($target, frame, $ret; f f f f),
        }
    }};
}

/// Call `target` with `frame`, reading the result as `shape`.
///
/// # Safety
///
/// `target` must be the address of a native function whose signature
/// matches the plan `frame` was filled from, and every address in `frame`
/// must stay valid for the duration of the call.
pub(crate) unsafe fn invoke(target: usize, frame: &Frame, shape: ReturnShape) -> Returned {
    let mut out = Returned::default();
    match shape {
        ReturnShape::Int => {
            out.gpr[0] = native_call!(target, frame, u64);
        }
        ReturnShape::Float => {
            out.fpr[0] = native_call!(target, frame, f64).to_bits();
        }
        ReturnShape::IntInt => {
            let RetII(a, b) = native_call!(target, frame, RetII);
            out.gpr = [a, b];
        }
        ReturnShape::FloatFloat => {
            let RetFF(a, b) = native_call!(target, frame, RetFF);
            out.fpr[..2].copy_from_slice(&[a.to_bits(), b.to_bits()]);
        }
        ReturnShape::IntFloat => {
            let RetIF(a, b) = native_call!(target, frame, RetIF);
            out.gpr[0] = a;
            out.fpr[0] = b.to_bits();
        }
        ReturnShape::FloatInt => {
            let RetFI(a, b) = native_call!(target, frame, RetFI);
            out.fpr[0] = a.to_bits();
            out.gpr[0] = b;
        }
        ReturnShape::Hfa => {
            let Hfa4(a, b, c, d) = native_call!(target, frame, Hfa4);
            out.fpr = [a.to_bits(), b.to_bits(), c.to_bits(), d.to_bits()];
        }
        ReturnShape::Memory(size) => {
            let Big(words) = native_call!(target, frame, Big);
            out.memory = words
                .iter()
                .flat_map(|word| word.to_ne_bytes())
                .take(size as usize)
                .collect();
        }
    }
    out
}
