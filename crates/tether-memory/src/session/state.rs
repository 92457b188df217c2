// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Session state word and the close handshake.
//!
//! ```text
//!  63       62        61 ..................... 0
//! ┌────────┬─────────┬──────────────────────────┐
//! │ CLOSED │ CLOSING │      acquire count       │
//! └────────┴─────────┴──────────────────────────┘
//! ```
//!
//! Every transition is a compare-and-swap on this word, so acquiring and
//! closing are linearizable against each other. A second counter tracks
//! accesses in flight: an accessor increments it and then re-reads the
//! state, while `close` first publishes `CLOSING` and then waits for the
//! counter to drain. With sequentially consistent ordering on both sides,
//! either the accessor sees `CLOSING` or `close` sees the accessor.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;

use crate::error::{Error, Result, StateError};

pub(super) const CLOSED: u64 = 1 << 63;
pub(super) const CLOSING: u64 = 1 << 62;
pub(super) const COUNT_MASK: u64 = CLOSING - 1;

/// Acquire count and liveness flags.
#[derive(Debug, Default)]
pub(super) struct StateWord {
    word: AtomicU64,
    in_flight: AtomicUsize,
}

impl StateWord {
    pub(super) fn load(&self) -> u64 {
        self.word.load(Ordering::SeqCst)
    }

    pub(super) fn is_alive(&self) -> bool {
        self.load() & (CLOSING | CLOSED) == 0
    }

    pub(super) fn is_closed(&self) -> bool {
        self.load() & CLOSED != 0
    }

    pub(super) fn count(&self) -> u64 {
        self.load() & COUNT_MASK
    }

    /// Increment the acquire count unless the session is closing or closed.
    pub(super) fn acquire(&self) -> Result<()> {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            if current & (CLOSING | CLOSED) != 0 {
                return Err(Error::IllegalState(StateError::AlreadyClosed));
            }
            if current & COUNT_MASK == COUNT_MASK {
                return Err(Error::illegal_argument("session acquire count overflow"));
            }
            match self.word.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    pub(super) fn release(&self) {
        self.word.fetch_sub(1, Ordering::AcqRel);
    }

    /// Move from alive and unacquired to `CLOSING`.
    pub(super) fn begin_close(&self) -> Result<()> {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            if current & (CLOSING | CLOSED) != 0 {
                return Err(Error::IllegalState(StateError::AlreadyClosed));
            }
            if current & COUNT_MASK != 0 {
                return Err(Error::IllegalState(StateError::StillAcquired));
            }
            match self
                .word
                .compare_exchange_weak(current, CLOSING, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Wait until no access that started before `CLOSING` is still running.
    pub(super) fn drain(&self) {
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            thread::yield_now();
        }
    }

    pub(super) fn finish_close(&self) {
        self.word.store(CLOSED, Ordering::SeqCst);
    }

    /// Mark the word closed without the handshake; the owner is exclusive.
    pub(super) fn mark_closed(&mut self) {
        *self.word.get_mut() = CLOSED;
    }

    /// Register an access; fails if the session is no longer alive.
    pub(super) fn enter(&self) -> Result<AccessGuard<'_>> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = AccessGuard { state: self };
        if !self.is_alive() {
            return Err(Error::IllegalState(StateError::AlreadyClosed));
        }
        Ok(guard)
    }
}

/// An access in flight. Close waits for every guard to drop.
#[must_use]
pub(crate) struct AccessGuard<'a> {
    state: &'a StateWord,
}

impl Drop for AccessGuard<'_> {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
