// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Calls from Rust into native functions.

use tether_layout::{FunctionDescriptor, Layout, Shape, Target, ValueKind};
use tether_memory::{Error, Result, Scalar, Segment, SegmentAllocator, Session, SessionGuard};
use tracing::{debug, trace};

use crate::abi::{ArgPass, CallPlan, CallingConvention, ReturnPass, promote};
use crate::invoke::{Frame, ReturnShape, invoke, widen};
use crate::value::Value;

/// A native function bound to a descriptor.
///
/// Created by [`Linker::downcall`](crate::Linker::downcall). Every call
/// checks its arguments against the descriptor and keeps the sessions of
/// the target and of every segment argument alive until native code
/// returns.
#[derive(Debug, Clone)]
pub struct Downcall {
    target: Segment,
    function: FunctionDescriptor,
    promoted: FunctionDescriptor,
    plan: CallPlan,
    shape: ReturnShape,
}

impl Downcall {
    pub(crate) fn new(
        target: &Segment,
        function: &FunctionDescriptor,
        convention: &dyn CallingConvention,
    ) -> Result<Self> {
        if !target.is_native() || target.address() == 0 {
            return Err(Error::illegal_argument(format!(
                "not a native function address: {target:?}"
            )));
        }
        let promoted = promote(function);
        let plan = convention.classify(&promoted)?;
        let ret_size = match function.ret() {
            Some(layout) => layout.byte_size()?,
            None => 0,
        };
        let shape = ReturnShape::of(&plan.ret, ret_size)?;
        debug!(
            target = format_args!("{:#x}", target.address()),
            abi = %plan.abi,
            descriptor = %function,
            "downcall handle created"
        );
        Ok(Self {
            target: target.clone(),
            function: function.clone(),
            promoted,
            plan,
            shape,
        })
    }

    /// Descriptor the handle was created with.
    #[must_use]
    pub const fn descriptor(&self) -> &FunctionDescriptor {
        &self.function
    }

    /// Address of the native function.
    #[must_use]
    pub const fn target(&self) -> &Segment {
        &self.target
    }

    /// How arguments and result are transferred.
    #[must_use]
    pub const fn plan(&self) -> &CallPlan {
        &self.plan
    }

    /// Call with `args`, allocating a by-value struct result in a fresh
    /// implicit session.
    ///
    /// # Errors
    ///
    /// As for [`Downcall::call_with`].
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        self.call_with(&Session::implicit(), args)
    }

    /// Call with `args`, allocating a by-value struct result from
    /// `allocator`.
    ///
    /// Scalar results come back as [`Value::Scalar`], address results as a
    /// global-session [`Value::Segment`] sized by the pointee, struct
    /// results as the allocated segment and `v` results as [`Value::Void`].
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalArgument`] if the argument count differs from the
    ///   descriptor or an argument does not match its layout
    /// - [`Error::IllegalState`] or [`Error::WrongThread`] if a session
    ///   involved in the call cannot be acquired
    /// - any error of `allocator` for struct results
    pub fn call_with(&self, allocator: &dyn SegmentAllocator, args: &[Value]) -> Result<Value> {
        let declared = self.function.args();
        if args.len() != declared.len() {
            return Err(Error::illegal_argument(format!(
                "{} expects {} arguments, got {}",
                self.function,
                declared.len(),
                args.len()
            )));
        }

        let mut guards = vec![self.target.session().acquire()?];
        let mut frame = Frame::default();
        let mut spilled: Vec<Vec<u64>> = Vec::new();

        let layouts = declared.iter().zip(self.promoted.args());
        for ((value, (layout, promoted)), pass) in args.iter().zip(layouts).zip(&self.plan.args) {
            let bytes = argument_bytes(value, layout, promoted, &mut guards)?;
            match pass {
                ArgPass::Pieces(pieces) => {
                    for piece in pieces {
                        frame.put_piece(*piece, &bytes);
                    }
                }
                ArgPass::Reference(slot) => {
                    let copy: Vec<u64> = bytes.chunks(8).map(widen).collect();
                    frame.put(*slot, &(copy.as_ptr() as u64).to_ne_bytes());
                    spilled.push(copy);
                }
            }
        }

        let destination = match self.function.ret() {
            Some(layout) if !layout.is_value() => Some(allocator.allocate_layout(layout)?),
            _ => None,
        };
        if let (ReturnPass::Indirect(Some(slot)), Some(dest)) = (&self.plan.ret, &destination) {
            if !dest.is_native() {
                return Err(Error::illegal_argument(
                    "indirect results need a native segment",
                ));
            }
            guards.push(dest.session().acquire()?);
            frame.put(*slot, &dest.address().to_ne_bytes());
        }

        trace!(
            target = format_args!("{:#x}", self.target.address()),
            args = args.len(),
            "downcall"
        );
        // SAFETY: `Linker::downcall` requires the target to implement the
        // descriptor the plan was classified from. Segment arguments and
        // the result buffer are kept alive by `guards`, by-reference copies
        // by `spilled`.
        let returned = unsafe { invoke(self.target.address() as usize, &frame, self.shape) };
        drop(spilled);
        drop(guards);

        let Some(layout) = self.function.ret() else {
            return Ok(Value::Void);
        };
        match destination {
            Some(dest) => {
                match &self.plan.ret {
                    ReturnPass::Registers(pieces) => {
                        let mut bytes = vec![0u8; dest.len() as usize];
                        for piece in pieces {
                            returned.take_piece(*piece, &mut bytes);
                        }
                        dest.copy_from(&Segment::of_bytes(&bytes))?;
                    }
                    ReturnPass::Indirect(None) => {
                        dest.copy_from(&Segment::of_bytes(returned.memory()))?;
                    }
                    ReturnPass::Indirect(Some(_)) | ReturnPass::Void => {}
                }
                Ok(Value::Segment(dest))
            }
            None => {
                let mut word = [0u8; 8];
                if let ReturnPass::Registers(pieces) = &self.plan.ret {
                    for piece in pieces {
                        returned.take_piece(*piece, &mut word);
                    }
                }
                scalar_result(layout, u64::from_ne_bytes(word))
            }
        }
    }
}

/// Bytes of one argument: an eight-byte word for values, the struct's
/// bytes for aggregates.
fn argument_bytes(
    value: &Value,
    layout: &Layout,
    promoted: &Layout,
    guards: &mut Vec<SessionGuard>,
) -> Result<Vec<u8>> {
    let mismatch = || Error::illegal_argument(format!("{value:?} does not match layout {layout}"));
    if let Shape::Value { kind, bits, .. } = layout.shape() {
        let raw = match value {
            Value::Scalar(scalar) => scalar.bits_for(layout)?,
            Value::Segment(segment) if *kind == ValueKind::Address => {
                if !segment.is_native() {
                    return Err(Error::illegal_argument(
                        "heap segments have no native address",
                    ));
                }
                guards.push(segment.session().acquire()?);
                segment.address()
            }
            _ => return Err(mismatch()),
        };
        return Ok(word(*kind, *bits, raw, promoted).to_ne_bytes().to_vec());
    }

    let Value::Segment(segment) = value else {
        return Err(mismatch());
    };
    let size = layout.byte_size()?;
    if segment.len() < size {
        return Err(Error::illegal_argument(format!(
            "{size}-byte struct argument from a {}-byte segment",
            segment.len()
        )));
    }
    guards.push(segment.session().acquire()?);
    segment.as_slice_len(0, size)?.to_bytes()
}

/// Register word of a value: integers extended by signedness, `f32`
/// widened when the variadic promotion made it `f64`.
fn word(kind: ValueKind, bits: u64, raw: u64, promoted: &Layout) -> u64 {
    match Scalar::from_bits(kind, bits, raw) {
        Scalar::I8(v) => v as u64,
        Scalar::I16(v) => v as u64,
        Scalar::I32(v) => v as u64,
        Scalar::I64(v) => v as u64,
        Scalar::U8(v) => u64::from(v),
        Scalar::U16(v) => u64::from(v),
        Scalar::U32(v) => u64::from(v),
        Scalar::U64(v) | Scalar::Address(v) => v,
        Scalar::F32(v) if matches!(promoted.bit_size(), Ok(64)) => f64::from(v).to_bits(),
        Scalar::F32(v) => u64::from(v.to_bits()),
        Scalar::F64(v) => v.to_bits(),
    }
}

fn scalar_result(layout: &Layout, raw: u64) -> Result<Value> {
    let (kind, bits) = match layout.shape() {
        Shape::Value { kind, bits, .. } => (*kind, *bits),
        _ => return Err(Error::illegal_argument(format!("not a value layout: {layout}"))),
    };
    if kind != ValueKind::Address {
        return Ok(Value::Scalar(Scalar::from_bits(kind, bits, raw)));
    }
    let addr = if bits == 32 {
        raw & u64::from(u32::MAX)
    } else {
        raw
    };
    let len = match layout.target() {
        Some(Target::Layout(pointee)) if pointee.has_size() => pointee.byte_size()?,
        _ => 0,
    };
    // SAFETY: native code returned this address for memory of the pointee
    // layout; the global session never frees it.
    let segment = unsafe { Segment::of_address(addr).reinterpret(len)? };
    Ok(Value::Segment(segment))
}
