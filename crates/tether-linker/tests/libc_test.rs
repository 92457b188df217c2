// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Calls into the C library of the running process.

#![cfg(all(unix, feature = "libloading"))]
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use tether_layout::{Layout, parse_function};
use tether_linker::{Downcall, ErrorKind, LibraryLookup, Linker, SymbolLookup, Value};
use tether_memory::{Segment, SegmentAllocator, Session};

fn libc(linker: &Linker, name: &str, descriptor: &str) -> Downcall {
    let symbol = linker.lookup(name).expect(name);
    // SAFETY: every caller names the C prototype of the libc symbol.
    unsafe { linker.downcall(&symbol, &parse_function(descriptor).unwrap()) }.unwrap()
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn process_symbols() {
    common::init_tracing();
    let process = LibraryLookup::this_process().unwrap();
    let strlen = process.find("strlen").unwrap();
    assert!(strlen.is_native());
    assert_eq!(strlen.len(), 0);
    assert!(process.find("tether_no_such_symbol").is_none());
}

#[test]
fn chained_lookup() {
    common::init_tracing();
    let fixed = |name: &str| (name == "answer").then(|| Segment::of_address(42));
    let lookup = fixed.or(LibraryLookup::this_process().unwrap());
    assert_eq!(lookup.find("answer").unwrap().address(), 42);
    assert!(lookup.find("strlen").is_some());
    assert!(lookup.find("tether_no_such_symbol").is_none());
}

#[test]
fn missing_library() {
    common::init_tracing();
    let session = Session::confined();
    // SAFETY: the load fails before any code runs.
    let err = unsafe { LibraryLookup::open("/nonexistent/libtether.so", &session) }.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
}

// ============================================================================
// Downcalls
// ============================================================================

#[test]
fn strlen() {
    common::init_tracing();
    let linker = Linker::native().unwrap();
    let strlen = libc(&linker, "strlen", "(u64:u8)u64");
    let session = Session::confined();
    let text = session.allocate_utf8("Hello, native world").unwrap();
    let result = strlen.call(&[Value::Segment(text)]).unwrap();
    assert_eq!(result.get::<u64>(), Some(19));
}

#[test]
fn variadic_snprintf() {
    common::init_tracing();
    let linker = Linker::native().unwrap();
    let snprintf = libc(&linker, "snprintf", "(u64:v u64 u64:u8...f32 i8 i64)i32");
    let session = Session::confined();
    let buffer = session.allocate(64, 1).unwrap();
    let format = session.allocate_utf8("%.2f|%d|%lld").unwrap();
    let written = snprintf
        .call(&[
            Value::Segment(buffer.clone()),
            Value::of(64u64),
            Value::Segment(format),
            Value::of(2.5f32),
            Value::of(-7i8),
            Value::of(1i64 << 40),
        ])
        .unwrap();
    let expected = "2.50|-7|1099511627776";
    assert_eq!(written.get::<i32>(), Some(expected.len() as i32));
    assert_eq!(buffer.get_utf8(0).unwrap(), expected);
}

#[test]
fn closing_concurrently_fails_before_the_call() {
    common::init_tracing();
    let linker = Linker::native().unwrap();
    let memset = libc(&linker, "memset", "(u64:v i32 u64)u64:v");
    let session = Session::shared();
    let target = session.allocate(256, 8).unwrap();
    let calls = Arc::new(AtomicU64::new(0));

    let caller = {
        let calls = Arc::clone(&calls);
        thread::spawn(move || {
            loop {
                let result = memset.call(&[
                    Value::Segment(target.clone()),
                    Value::of(0x5Ai32),
                    Value::of(256u64),
                ]);
                match result {
                    Ok(_) => {
                        calls.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => return err,
                }
            }
        })
    };

    while calls.load(Ordering::Relaxed) == 0 {
        thread::yield_now();
    }
    // Close is refused while a call holds the session.
    while session.close().is_err() {
        thread::yield_now();
    }
    let err = caller.join().unwrap();
    assert_eq!(err.kind(), ErrorKind::IllegalState);
}

// ============================================================================
// Upcalls
// ============================================================================

#[test]
fn qsort_with_an_upcall_comparator() {
    common::init_tracing();
    let linker = Linker::native().unwrap();
    let comparator = parse_function("(u64:i32 u64:i32)i32").unwrap();
    let qsort = libc(
        &linker,
        "qsort",
        "(u64:v u64 u64 u64:(u64:i32 u64:i32)i32)v",
    );

    let session = Session::confined();
    let compare = linker
        .upcall(
            |args| {
                let read = |v: &Value| {
                    v.as_segment()
                        .unwrap()
                        .get::<i32>(&Layout::i32(), 0)
                        .unwrap()
                };
                Value::of(read(&args[0]).cmp(&read(&args[1])) as i32)
            },
            &comparator,
            &session,
        )
        .unwrap();

    let values = session.allocate_from(&[5i32, -3, 9, 0, 12, -8, 1]).unwrap();
    qsort
        .call(&[
            Value::Segment(values.clone()),
            Value::of(7u64),
            Value::of(4u64),
            Value::Segment(compare),
        ])
        .unwrap();
    assert_eq!(values.to_vec::<i32>().unwrap(), vec![-8, -3, 0, 1, 5, 9, 12]);
}

#[test]
fn stub_closure_keeps_its_captures() {
    common::init_tracing();
    let linker = Linker::native().unwrap();
    let comparator = parse_function("(u64:i32 u64:i32)i32").unwrap();
    let qsort = libc(
        &linker,
        "qsort",
        "(u64:v u64 u64 u64:(u64:i32 u64:i32)i32)v",
    );

    let session = Session::confined();
    let comparisons = Arc::new(AtomicU64::new(0));
    let counted = Arc::clone(&comparisons);
    let compare = linker
        .upcall(
            move |args| {
                counted.fetch_add(1, Ordering::Relaxed);
                let a = args[0].as_segment().unwrap().get::<i32>(&Layout::i32(), 0).unwrap();
                let b = args[1].as_segment().unwrap().get::<i32>(&Layout::i32(), 0).unwrap();
                Value::of(b.cmp(&a) as i32)
            },
            &comparator,
            &session,
        )
        .unwrap();

    let values = session.allocate_from(&[1i32, 2, 3, 4]).unwrap();
    qsort
        .call(&[
            Value::Segment(values.clone()),
            Value::of(4u64),
            Value::of(4u64),
            Value::Segment(compare),
        ])
        .unwrap();
    assert_eq!(values.to_vec::<i32>().unwrap(), vec![4, 3, 2, 1]);
    assert!(comparisons.load(Ordering::Relaxed) > 0);
}
