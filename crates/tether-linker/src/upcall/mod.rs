// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Native entry points that call back into Rust.
//!
//! An upcall stub is one of a fixed set of monomorphized trampolines, each
//! bound to a registry slot. A native caller enters the trampoline with its
//! arguments in registers; the trampoline looks up the slot's callback,
//! decodes the arguments per the descriptor and calls it.
//!
//! ## Slot lifecycle
//!
//! ```text
//! Free ──upcall()──▶ Live ──session close / free_upcall──▶ Dead
//! ```
//!
//! `Dead` is final: a retired address is never bound to another callback,
//! so a native caller holding a stale stub always hits the tombstone and
//! terminates the process, as does a callback that panics or returns a
//! value of the wrong layout. Each return class therefore offers
//! [`UPCALL_SLOTS`] stubs over the lifetime of the process.

mod trampoline;


use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tether_layout::{FunctionDescriptor, Layout, Shape, Target, ValueKind};
use tether_memory::{Error, Result, Scalar, Segment, Session};
use tracing::{debug, error};

use crate::abi::{Abi, ArgPass, CallingConvention, Slot};
use crate::value::Value;
use trampoline::{FLOAT_REGS, INT_REGS, Incoming, entry_point};

/// Stubs per return class over the lifetime of the process.
pub const UPCALL_SLOTS: usize = 64;

/// Exit code used when an upcall fails and no configuration applies.
pub const UNCAUGHT_UPCALL_EXIT_CODE: i32 = 3;

/// Callback invoked by an upcall stub.
pub(crate) type Callback = Box<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Register file that carries the return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReturnClass {
    Int,
    Float,
}

struct Param {
    slot: Slot,
    layout: Layout,
}

struct Entry {
    id: u64,
    callback: Callback,
    params: Vec<Param>,
    ret: Option<Layout>,
    exit_code: i32,
}

enum SlotState {
    Free,
    Live(Arc<Entry>),
    Dead { exit_code: i32 },
}

struct Registry {
    int: [SlotState; UPCALL_SLOTS],
    float: [SlotState; UPCALL_SLOTS],
}

impl Registry {
    const fn new() -> Self {
        Self {
            int: [const { SlotState::Free }; UPCALL_SLOTS],
            float: [const { SlotState::Free }; UPCALL_SLOTS],
        }
    }

    fn slots(&mut self, class: ReturnClass) -> &mut [SlotState; UPCALL_SLOTS] {
        match class {
            ReturnClass::Int => &mut self.int,
            ReturnClass::Float => &mut self.float,
        }
    }

    /// Bind `entry` to a slot that was never used.
    fn claim(&mut self, class: ReturnClass, entry: Entry) -> Result<usize> {
        let slots = self.slots(class);
        let index = slots
            .iter()
            .position(|state| matches!(state, SlotState::Free))
            .ok_or_else(|| {
                Error::illegal_argument(format!(
                    "all {UPCALL_SLOTS} upcall slots of this return class are in use or retired"
                ))
            })?;
        slots[index] = SlotState::Live(Arc::new(entry));
        Ok(index)
    }

    /// Retire `slot` if it still holds the entry `id`.
    fn retire(&mut self, class: ReturnClass, slot: usize, id: Option<u64>) -> bool {
        let Some(state) = self.slots(class).get_mut(slot) else {
            return false;
        };
        let exit_code = match state {
            SlotState::Live(entry) if id.is_none_or(|id| id == entry.id) => entry.exit_code,
            _ => return false,
        };
        *state = SlotState::Dead { exit_code };
        true
    }
}

static REGISTRY: Mutex<Registry> = Mutex::new(Registry::new());

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Creation and release
// =============================================================================

/// Register `callback` and return its stub as a zero-length segment owned
/// by `session`.
pub(crate) fn create(
    convention: &dyn CallingConvention,
    function: &FunctionDescriptor,
    callback: Callback,
    session: &Session,
    exit_code: i32,
) -> Result<Segment> {
    if function.variadic().is_some() {
        return Err(Error::illegal_argument("upcalls cannot be variadic"));
    }
    let plan = convention.classify(function)?;
    let mut params = Vec::with_capacity(function.args().len());
    for (layout, pass) in function.args().iter().zip(&plan.args) {
        let slot = match pass {
            ArgPass::Pieces(pieces) if layout.is_value() && pieces.len() == 1 => pieces[0].slot,
            _ => {
                return Err(Error::illegal_argument(format!(
                    "upcall argument {layout} is not a scalar"
                )));
            }
        };
        let supported = match slot {
            Slot::Gpr(n) => n < INT_REGS,
            Slot::Fpr(n) => n < FLOAT_REGS && plan.abi != Abi::Win64,
            Slot::Stack(_) => false,
        };
        if !supported {
            return Err(Error::illegal_argument(format!(
                "upcall argument {layout} is not passed in a supported register"
            )));
        }
        params.push(Param {
            slot,
            layout: layout.clone(),
        });
    }
    let class = match function.ret().map(Layout::shape) {
        None => ReturnClass::Int,
        Some(Shape::Value {
            kind: ValueKind::Float,
            ..
        }) => ReturnClass::Float,
        Some(Shape::Value { .. }) => ReturnClass::Int,
        Some(_) => {
            return Err(Error::illegal_argument(format!(
                "upcalls must return a scalar: {function}"
            )));
        }
    };

    session.check_valid()?;
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let slot = REGISTRY.lock().claim(
        class,
        Entry {
            id,
            callback,
            params,
            ret: function.ret().cloned(),
            exit_code,
        },
    )?;
    if let Err(err) = session.add_close_action(move || {
        REGISTRY.lock().retire(class, slot, Some(id));
    }) {
        REGISTRY.lock().retire(class, slot, Some(id));
        return Err(err);
    }

    let address = entry_point(class, slot) as u64;
    debug!(
        slot,
        class = ?class,
        address = format_args!("{address:#x}"),
        descriptor = %function,
        "upcall stub created"
    );
    // SAFETY: a zero-length view of a code address is never dereferenced.
    unsafe { Segment::of_address(address).reinterpret_in(0, session) }
}

/// Retire the live stub at `address`.
pub(crate) fn free(address: u64) -> Result<()> {
    let mut registry = REGISTRY.lock();
    for class in [ReturnClass::Int, ReturnClass::Float] {
        let found = (0..UPCALL_SLOTS).find(|&slot| entry_point(class, slot) as u64 == address);
        if let Some(slot) = found {
            if registry.retire(class, slot, None) {
                debug!(slot, class = ?class, "upcall stub freed");
                return Ok(());
            }
        }
    }
    Err(Error::illegal_argument(format!(
        "{address:#x} is not a live upcall stub"
    )))
}

// =============================================================================
// Dispatch
// =============================================================================

/// Terminate the process after an upcall failure.
fn fatal(exit_code: i32, message: &str) -> ! {
    error!(exit_code, "uncaught upcall failure: {message}");
    eprintln!("tether: uncaught upcall failure: {message}");
    std::process::exit(exit_code)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "callback panicked".to_owned()
    }
}

/// Entry of every trampoline: run the callback bound to `slot` and return
/// the raw result word.
fn dispatch(class: ReturnClass, slot: usize, incoming: &Incoming) -> u64 {
    let state = {
        let mut registry = REGISTRY.lock();
        match registry.slots(class).get(slot) {
            Some(SlotState::Live(entry)) => Ok(Arc::clone(entry)),
            Some(SlotState::Dead { exit_code }) => Err(*exit_code),
            Some(SlotState::Free) | None => Err(UNCAUGHT_UPCALL_EXIT_CODE),
        }
    };
    let entry = match state {
        Ok(entry) => entry,
        Err(exit_code) => fatal(exit_code, "stub called after it was freed"),
    };

    let args: Vec<Value> = entry
        .params
        .iter()
        .map(|param| decode(param, incoming.word(param.slot)))
        .collect();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| (entry.callback)(&args)));
    match outcome {
        Ok(value) => encode(entry.ret.as_ref(), &value)
            .unwrap_or_else(|err| fatal(entry.exit_code, &err.to_string())),
        Err(payload) => fatal(entry.exit_code, &panic_message(payload.as_ref())),
    }
}

fn decode(param: &Param, raw: u64) -> Value {
    let Shape::Value { kind, bits, .. } = param.layout.shape() else {
        return Value::Void;
    };
    if *kind != ValueKind::Address {
        return Value::Scalar(Scalar::from_bits(*kind, *bits, raw));
    }
    let len = match param.layout.target() {
        Some(Target::Layout(pointee)) => pointee.byte_size().unwrap_or(0),
        _ => 0,
    };
    let base = Segment::of_address(raw);
    // SAFETY: the native caller passed this address for memory of the
    // pointee layout.
    Value::Segment(unsafe { base.reinterpret(len) }.unwrap_or(base))
}

fn encode(ret: Option<&Layout>, value: &Value) -> Result<u64> {
    let Some(layout) = ret else {
        return Ok(0);
    };
    let raw = match value {
        Value::Scalar(scalar) => scalar.bits_for(layout)?,
        Value::Segment(segment) if layout.value_kind() == Some(ValueKind::Address) => {
            value.address().ok_or_else(|| {
                Error::illegal_argument(format!("upcall returned heap segment {segment:?}"))
            })?
        }
        Value::Segment(_) | Value::Void => {
            return Err(Error::illegal_argument(format!(
                "upcall returned {value:?} for {layout}"
            )));
        }
    };
    let word = match Scalar::from_bits(
        layout.value_kind().unwrap_or(ValueKind::UnsignedInt),
        layout.bit_size()?,
        raw,
    ) {
        Scalar::I8(v) => v as u64,
        Scalar::I16(v) => v as u64,
        Scalar::I32(v) => v as u64,
        Scalar::I64(v) => v as u64,
        Scalar::F32(v) => u64::from(v.to_bits()),
        other => other.to_bits(),
    };
    Ok(word)
}
