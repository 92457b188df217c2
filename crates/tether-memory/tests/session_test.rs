// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Integration tests for concurrent session use.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use parking_lot::Mutex;
use tether_layout::{Layout, PathElement, parse_layout};
use tether_memory::{Accessor, ErrorKind, SegmentAllocator, Session, StateError};

// ============================================================================
// Close handshake
// ============================================================================

#[test]
fn no_access_succeeds_after_close_returns() {
    common::init_tracing();
    const READERS: usize = 4;

    let session = Session::shared();
    let segment = session.allocate(64, 8).unwrap();
    for i in 0..8 {
        segment.set_at_index::<u64>(&Layout::u64(), i, 0xC0FFEE).unwrap();
    }

    let closed = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicU64::new(0));
    let start = Arc::new(Barrier::new(READERS + 1));

    let readers: Vec<_> = (0..READERS)
        .map(|r| {
            let segment = segment.clone();
            let closed = Arc::clone(&closed);
            let reads = Arc::clone(&reads);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut index = r as u64;
                loop {
                    let after_close = closed.load(Ordering::SeqCst);
                    match segment.get_at_index::<u64>(&Layout::u64(), index % 8) {
                        Ok(value) => {
                            assert!(!after_close, "read succeeded after close returned");
                            assert_eq!(value, 0xC0FFEE);
                            reads.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            assert_eq!(err.kind(), ErrorKind::IllegalState);
                            break;
                        }
                    }
                    index += 1;
                }
            })
        })
        .collect();

    start.wait();
    while reads.load(Ordering::Relaxed) < 1000 {
        thread::yield_now();
    }
    session.close().unwrap();
    closed.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.join().unwrap();
    }
    assert!(!session.is_alive());
}

#[test]
fn racing_acquire_never_resurrects() {
    common::init_tracing();
    for _ in 0..50 {
        let session = Session::shared();
        let remote = session.clone();
        let acquirer = thread::spawn(move || {
            let mut held = 0;
            for _ in 0..100 {
                match remote.acquire() {
                    Ok(guard) => {
                        held += 1;
                        drop(guard);
                    }
                    Err(err) => {
                        assert_eq!(err, tether_memory::Error::IllegalState(StateError::AlreadyClosed));
                        break;
                    }
                }
            }
            held
        });

        while session.close().is_err() {
            thread::yield_now();
        }
        acquirer.join().unwrap();
        assert!(!session.is_alive());
        assert!(session.acquire().is_err());
    }
}

#[test]
fn only_one_concurrent_close_wins() {
    common::init_tracing();
    let session = Session::shared();
    let start = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let session = session.clone();
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                session.close().is_ok()
            })
        })
        .collect();
    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|&won| won)
        .count();
    assert_eq!(wins, 1);
}

// ============================================================================
// Fork ordering
// ============================================================================

#[test]
fn forks_close_before_their_parent() {
    common::init_tracing();
    let log = Arc::new(Mutex::new(Vec::new()));
    let record = |name: &'static str| {
        let log = Arc::clone(&log);
        move || log.lock().push(name)
    };

    let root = Session::shared();
    root.add_close_action(record("root")).unwrap();
    let child = root.fork_shared().unwrap();
    child.add_close_action(record("child")).unwrap();
    let grandchild = child.fork_confined().unwrap();
    grandchild.add_close_action(record("grandchild")).unwrap();

    assert_eq!(root.close().unwrap_err().kind(), ErrorKind::IllegalState);
    assert_eq!(child.close().unwrap_err().kind(), ErrorKind::IllegalState);

    grandchild.close().unwrap();
    child.close().unwrap();
    root.close().unwrap();
    assert_eq!(*log.lock(), vec!["grandchild", "child", "root"]);
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn point_through_accessors() {
    common::init_tracing();
    let point = parse_layout("[i32(x)i32(y)]").unwrap();
    let x = Accessor::new(&point, &[PathElement::field("x")]).unwrap();
    let y = Accessor::new(&point, &[PathElement::field("y")]).unwrap();

    let session = Session::confined();
    let segment = session.allocate_layout(&point).unwrap();
    x.set_as::<i32>(&segment, 0, &[], 1).unwrap();
    y.set_as::<i32>(&segment, 0, &[], 2).unwrap();
    assert_eq!(x.get_as::<i32>(&segment, 0, &[]).unwrap(), 1);
    assert_eq!(y.get_as::<i32>(&segment, 0, &[]).unwrap(), 2);

    let empty = segment.as_slice_len(0, 0).unwrap();
    let err = empty
        .get_at_index::<i32>(&Layout::i32(), 0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexOutOfBounds);

    session.close().unwrap();
    assert_eq!(
        x.get_as::<i32>(&segment, 0, &[]).unwrap_err().kind(),
        ErrorKind::IllegalState
    );
}
