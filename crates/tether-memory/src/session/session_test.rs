// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Tests for session lifecycles, close actions and forking.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::*;
use crate::error::ErrorKind;

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn new_sessions_are_alive() {
    for session in [Session::confined(), Session::shared(), Session::implicit()] {
        assert!(session.is_alive());
        assert_eq!(session.acquire_count(), 0);
    }
    assert!(Session::global().is_alive());
}

#[test]
fn close_makes_session_dead() {
    let session = Session::shared();
    session.close().unwrap();
    assert!(!session.is_alive());
}

#[test]
fn second_close_is_illegal_state() {
    let session = Session::confined();
    session.close().unwrap();
    assert_eq!(
        session.close(),
        Err(Error::IllegalState(StateError::AlreadyClosed))
    );
}

#[test]
fn implicit_and_global_cannot_be_closed() {
    let implicit = Session::implicit();
    let err = implicit.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    assert!(implicit.is_alive());

    let err = Session::global().close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    assert!(Session::global().is_alive());
}

#[test]
fn closeability_by_kind() {
    assert!(Session::confined().is_closeable());
    assert!(Session::shared().is_closeable());
    assert!(!Session::implicit().is_closeable());
    assert!(!Session::global().is_closeable());
}

#[test]
fn global_is_a_singleton() {
    assert!(Session::global().same_as(&Session::global()));
    assert_eq!(Session::global().kind(), SessionKind::Global);
}

#[test]
fn confined_owner_is_current_thread() {
    let session = Session::confined();
    assert_eq!(session.owner(), Some(thread::current().id()));
    assert_eq!(Session::shared().owner(), None);
}

// ============================================================================
// Confinement
// ============================================================================

#[test]
fn confined_rejects_other_threads() {
    let session = Session::confined();
    let remote = session.clone();
    let results = thread::spawn(move || {
        (
            remote.close().map_err(|e| e.kind()),
            remote.acquire().map(|_| ()).map_err(|e| e.kind()),
            remote.allocate(8, 8).map(|_| ()).map_err(|e| e.kind()),
            remote.add_close_action(|| {}).map_err(|e| e.kind()),
        )
    })
    .join()
    .unwrap();

    assert_eq!(results.0, Err(ErrorKind::WrongThread));
    assert_eq!(results.1, Err(ErrorKind::WrongThread));
    assert_eq!(results.2, Err(ErrorKind::WrongThread));
    assert_eq!(results.3, Err(ErrorKind::WrongThread));
    assert!(session.is_alive());
}

#[test]
fn shared_closes_from_any_thread() {
    let session = Session::shared();
    let remote = session.clone();
    thread::spawn(move || remote.close()).join().unwrap().unwrap();
    assert!(!session.is_alive());
}

// ============================================================================
// Acquire
// ============================================================================

#[test]
fn acquired_session_cannot_close() {
    let session = Session::shared();
    let guard = session.acquire().unwrap();
    assert_eq!(session.acquire_count(), 1);
    assert_eq!(
        session.close(),
        Err(Error::IllegalState(StateError::StillAcquired))
    );
    assert!(
        session
            .close()
            .unwrap_err()
            .to_string()
            .ends_with("session is still acquired")
    );
    assert!(session.is_alive());

    guard.release();
    assert_eq!(session.acquire_count(), 0);
    session.close().unwrap();
}

#[test]
fn guard_releases_on_drop() {
    let session = Session::shared();
    {
        let _a = session.acquire().unwrap();
        let _b = session.acquire().unwrap();
        assert_eq!(session.acquire_count(), 2);
    }
    assert_eq!(session.acquire_count(), 0);
}

#[test]
fn acquire_after_close_fails() {
    let session = Session::shared();
    session.close().unwrap();
    assert_eq!(
        session.acquire().unwrap_err(),
        Error::IllegalState(StateError::AlreadyClosed)
    );
    assert!(!session.is_alive());
}

#[test]
fn guard_reports_its_session() {
    let session = Session::shared();
    let guard = session.acquire().unwrap();
    assert!(guard.session().unwrap().same_as(&session));
}

// ============================================================================
// Close actions
// ============================================================================

#[test]
fn close_actions_run_in_reverse_order() {
    let session = Session::confined();
    let log = Arc::new(Mutex::new(Vec::new()));
    for i in 0..3 {
        let log = Arc::clone(&log);
        session.add_close_action(move || log.lock().push(i)).unwrap();
    }
    assert!(log.lock().is_empty());

    session.close().unwrap();
    assert_eq!(*log.lock(), vec![2, 1, 0]);
}

#[test]
fn close_action_runs_once() {
    let session = Session::shared();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    session
        .add_close_action(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    session.close().unwrap();
    let _ = session.close();
    drop(session);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn close_action_on_dead_session_fails() {
    let session = Session::shared();
    session.close().unwrap();
    assert_eq!(
        session.add_close_action(|| {}),
        Err(Error::IllegalState(StateError::AlreadyClosed))
    );
}

#[test]
fn implicit_session_runs_actions_when_dropped() {
    let count = Arc::new(AtomicUsize::new(0));
    let session = Session::implicit();
    let counter = Arc::clone(&count);
    session
        .add_close_action(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let clone = session.clone();
    drop(session);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    drop(clone);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn implicit_session_lives_while_a_segment_does() {
    let count = Arc::new(AtomicUsize::new(0));
    let segment = {
        let session = Session::implicit();
        let counter = Arc::clone(&count);
        session
            .add_close_action(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        session.allocate(4, 4).unwrap()
    };
    assert_eq!(count.load(Ordering::SeqCst), 0);
    segment
        .set::<i32>(&tether_layout::Layout::i32(), 0, 7)
        .unwrap();
    drop(segment);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn allocation_is_zeroed_and_aligned() {
    let session = Session::confined();
    let segment = session.allocate(64, 32).unwrap();
    assert_eq!(segment.len(), 64);
    assert_eq!(segment.address() % 32, 0);
    assert!(segment.to_bytes().unwrap().iter().all(|&b| b == 0));
    assert!(segment.session().same_as(&session));
}

#[test]
fn allocation_rejects_bad_arguments() {
    let session = Session::confined();
    assert_eq!(
        session.allocate(0, 1).unwrap_err().kind(),
        ErrorKind::IllegalArgument
    );
    assert_eq!(
        session.allocate(8, 3).unwrap_err().kind(),
        ErrorKind::IllegalArgument
    );
    assert_eq!(
        session.allocate(i64::MAX as u64, 1).unwrap_err().kind(),
        ErrorKind::OutOfMemory
    );
}

#[test]
fn allocation_after_close_fails() {
    let session = Session::confined();
    session.close().unwrap();
    assert_eq!(
        session.allocate(8, 8).unwrap_err(),
        Error::IllegalState(StateError::AlreadyClosed)
    );
}

// ============================================================================
// Fork
// ============================================================================

#[test]
fn fork_holds_parent_until_child_closes() {
    let parent = Session::shared();
    let child = parent.fork_confined().unwrap();
    assert_eq!(parent.acquire_count(), 1);
    assert_eq!(
        parent.close(),
        Err(Error::IllegalState(StateError::StillAcquired))
    );

    child.close().unwrap();
    assert_eq!(parent.acquire_count(), 0);
    parent.close().unwrap();
}

#[test]
fn dropping_a_fork_releases_parent() {
    let parent = Session::shared();
    let child = parent.fork_shared().unwrap();
    assert_eq!(child.kind(), SessionKind::Shared);
    drop(child);
    assert_eq!(parent.acquire_count(), 0);
}

#[test]
fn fork_of_closed_session_fails() {
    let parent = Session::shared();
    parent.close().unwrap();
    assert!(parent.fork_shared().is_err());
}

#[test]
fn check_valid_reports_state() {
    let session = Session::shared();
    assert_eq!(session.check_valid(), Ok(()));
    session.close().unwrap();
    assert_eq!(
        session.check_valid(),
        Err(Error::IllegalState(StateError::AlreadyClosed))
    );
}
