// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Upcall slot limits. The slot table is process-wide, so the scenario
//! runs in a child process that owns the whole table: the test binary
//! re-executes itself with `CHILD_ENV` set and the parent checks the exit
//! status.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::collections::HashSet;
use std::env;
use std::process::Command;

use tether_layout::parse_function;
use tether_linker::{Abi, ErrorKind, Linker, LinkerConfig, UPCALL_SLOTS, Value};
use tether_memory::Session;

const CHILD_ENV: &str = "TETHER_SLOTS_CHILD";
const EXIT_CODE: i32 = 45;

#[test]
fn retired_stubs_are_never_rebound() {
    if env::var_os(CHILD_ENV).is_none() {
        let status = Command::new(env::current_exe().unwrap())
            .args(["--exact", "retired_stubs_are_never_rebound", "--nocapture"])
            .env(CHILD_ENV, "1")
            .status()
            .unwrap();
        assert_eq!(status.code(), Some(EXIT_CODE));
        return;
    }

    common::init_tracing();
    let linker = Linker::with_config(LinkerConfig {
        abi: Abi::host().unwrap(),
        uncaught_exit_code: EXIT_CODE,
    })
    .unwrap();
    let function = parse_function("(i64)i64").unwrap();
    let session = Session::shared();

    let stubs: Vec<_> = (0..UPCALL_SLOTS)
        .map(|_| {
            linker
                .upcall(|_| Value::of(1i64), &function, &session)
                .unwrap()
        })
        .collect();
    let distinct: HashSet<u64> = stubs.iter().map(|s| s.address()).collect();
    assert_eq!(distinct.len(), UPCALL_SLOTS);

    let exhausted = |session: &Session| {
        let err = linker
            .upcall(|_| Value::of(999i64), &function, session)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
    };
    exhausted(&session);

    // Neither freeing nor closing gives a retired address to a new callback.
    let other = Session::confined();
    linker.free_upcall(&stubs[5]).unwrap();
    exhausted(&other);
    session.close().unwrap();
    exhausted(&other);

    // Float results use their own table.
    let float = linker
        .upcall(|_| Value::of(0.0f64), &parse_function("()f64").unwrap(), &other)
        .unwrap();
    assert!(!distinct.contains(&float.address()));

    // A native caller holding the freed stub reaches its tombstone.
    let stale = tether_memory::Segment::of_address(stubs[5].address());
    // SAFETY: the address was a stub for `function`.
    let call = unsafe { linker.downcall(&stale, &function) }.unwrap();
    let result = call.call(&[Value::of(7i64)]);
    panic!("stale stub returned {result:?}");
}
