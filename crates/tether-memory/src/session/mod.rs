// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Sessions: lifetimes for native memory.
//!
//! A [`Session`] owns native allocations and cleanup actions, and every
//! [`Segment`](crate::Segment) carries the session that governs it. Once a
//! session is closed, every access through its segments fails, and the
//! memory it owned is returned to the allocator.
//!
//! ```text
//!  ALIVE ──close()──► CLOSING ──handshake──► CLOSED
//!    │                                          ▲
//!    └────────── last handle dropped ───────────┘
//! ```
//!
//! | Kind     | Closed by           | Accessible from  |
//! |----------|---------------------|------------------|
//! | Confined | `close()` on owner  | the owner thread |
//! | Shared   | `close()` anywhere  | any thread       |
//! | Implicit | last handle dropped | any thread       |
//! | Global   | never               | any thread       |

mod native;
mod state;

#[cfg(test)]
mod session_test;

pub(crate) use state::AccessGuard;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result, StateError};
use crate::segment::Segment;
use native::NativeBlock;
use state::StateWord;

/// How a session is closed and which threads may use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Closed explicitly, usable only on the thread that opened it.
    Confined,
    /// Closed explicitly, usable from any thread.
    Shared,
    /// Released when the last handle is dropped.
    Implicit,
    /// Never closed.
    Global,
}

impl SessionKind {
    const fn name(self) -> &'static str {
        match self {
            Self::Confined => "confined",
            Self::Shared => "shared",
            Self::Implicit => "implicit",
            Self::Global => "global",
        }
    }
}

type CloseAction = Box<dyn FnOnce() + Send>;

/// Everything released when the session closes.
#[derive(Default)]
struct Resources {
    blocks: Vec<NativeBlock>,
    actions: Vec<CloseAction>,
    parent: Option<SessionGuard>,
}

struct Inner {
    id: u64,
    kind: SessionKind,
    owner: Option<ThreadId>,
    state: StateWord,
    resources: Mutex<Resources>,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl Inner {
    fn check_thread(&self) -> Result<()> {
        match self.owner {
            Some(owner) if owner != thread::current().id() => Err(Error::WrongThread),
            _ => Ok(()),
        }
    }

    /// Run close actions newest first, free native memory, then release the
    /// parent.
    fn release_resources(&self) {
        let Resources {
            blocks,
            actions,
            parent,
        } = std::mem::take(&mut *self.resources.lock());

        for action in actions.into_iter().rev() {
            action();
        }
        let freed = blocks.len();
        for block in blocks {
            block.free();
        }
        drop(parent);
        trace!(session = self.id, blocks = freed, "session resources released");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if !self.state.is_closed() {
            self.release_resources();
            self.state.mark_closed();
            debug!(session = self.id, kind = self.kind.name(), "session released on drop");
        }
    }
}

/// Handle to a session. Clones refer to the same session.
#[derive(Clone)]
pub struct Session(Arc<Inner>);

impl Session {
    fn open(kind: SessionKind) -> Self {
        let owner = (kind == SessionKind::Confined).then(|| thread::current().id());
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!(session = id, kind = kind.name(), "session opened");
        Self(Arc::new(Inner {
            id,
            kind,
            owner,
            state: StateWord::default(),
            resources: Mutex::new(Resources::default()),
        }))
    }

    /// Session confined to the calling thread.
    #[must_use]
    pub fn confined() -> Self {
        Self::open(SessionKind::Confined)
    }

    /// Session usable and closeable from any thread.
    #[must_use]
    pub fn shared() -> Self {
        Self::open(SessionKind::Shared)
    }

    /// Session released when its last handle (including segment handles)
    /// is dropped.
    #[must_use]
    pub fn implicit() -> Self {
        Self::open(SessionKind::Implicit)
    }

    /// The global session, alive for the whole process.
    #[must_use]
    pub fn global() -> Self {
        static GLOBAL: OnceLock<Session> = OnceLock::new();
        GLOBAL.get_or_init(|| Self::open(SessionKind::Global)).clone()
    }

    /// Process-unique identifier, used in log output.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Kind of this session.
    #[must_use]
    pub fn kind(&self) -> SessionKind {
        self.0.kind
    }

    /// Owner thread of a confined session.
    #[must_use]
    pub fn owner(&self) -> Option<ThreadId> {
        self.0.owner
    }

    /// Whether the session is neither closing nor closed.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.state.is_alive()
    }

    /// Number of outstanding [`SessionGuard`]s.
    #[must_use]
    pub fn acquire_count(&self) -> u64 {
        self.0.state.count()
    }

    /// Whether [`Session::close`] is supported for this kind.
    #[must_use]
    pub fn is_closeable(&self) -> bool {
        matches!(self.0.kind, SessionKind::Confined | SessionKind::Shared)
    }

    /// Whether both handles refer to the same session.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Close the session.
    ///
    /// Waits for accesses already in flight on other threads to finish,
    /// runs close actions in reverse registration order, frees native
    /// memory and releases the parent of a forked session.
    ///
    /// # Errors
    ///
    /// - [`Error::NotCloseable`] for implicit and global sessions
    /// - [`Error::WrongThread`] for a confined session off its owner thread
    /// - [`Error::IllegalState`] if already closed or still acquired
    pub fn close(&self) -> Result<()> {
        let inner = &*self.0;
        if !self.is_closeable() {
            warn!(session = inner.id, kind = inner.kind.name(), "close rejected");
            return Err(Error::NotCloseable(inner.kind.name()));
        }
        inner.check_thread()?;
        if let Err(err) = inner.state.begin_close() {
            warn!(session = inner.id, %err, "close rejected");
            return Err(err);
        }

        inner.state.drain();
        inner.release_resources();
        inner.state.finish_close();
        debug!(session = inner.id, kind = inner.kind.name(), "session closed");
        Ok(())
    }

    /// Keep the session open until the returned guard is released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongThread`] off the owner thread of a confined
    /// session, or [`Error::IllegalState`] if the session is not alive.
    pub fn acquire(&self) -> Result<SessionGuard> {
        self.0.check_thread()?;
        self.0.state.acquire()?;
        Ok(SessionGuard {
            session: Some(self.clone()),
        })
    }

    /// Register `action` to run once when the session closes or is
    /// released on drop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongThread`] off the owner thread of a confined
    /// session, or [`Error::IllegalState`] if the session is not alive.
    pub fn add_close_action(&self, action: impl FnOnce() + Send + 'static) -> Result<()> {
        self.0.check_thread()?;
        let mut resources = self.0.resources.lock();
        self.check_alive()?;
        resources.actions.push(Box::new(action));
        Ok(())
    }

    /// Allocate `size` zeroed bytes aligned to `align`, owned by this session.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalArgument`] if `size` is zero or `align` is not a
    ///   power of two
    /// - [`Error::OutOfMemory`] if the platform allocator refuses
    /// - [`Error::WrongThread`] / [`Error::IllegalState`] as for [`Session::acquire`]
    pub fn allocate(&self, size: u64, align: u64) -> Result<Segment> {
        self.0.check_thread()?;
        self.check_alive()?;
        let block = NativeBlock::allocate(size, align)?;
        let addr = block.addr();

        let mut resources = self.0.resources.lock();
        if let Err(err) = self.check_alive() {
            drop(resources);
            block.free();
            return Err(err);
        }
        resources.blocks.push(block);
        drop(resources);

        trace!(session = self.0.id, size, align, addr, "allocated");
        Ok(Segment::native(addr, size, self.clone()))
    }

    /// Open a confined session that keeps this one acquired until it closes.
    ///
    /// # Errors
    ///
    /// Fails as [`Session::acquire`] does.
    pub fn fork_confined(&self) -> Result<Self> {
        self.fork(SessionKind::Confined)
    }

    /// Open a shared session that keeps this one acquired until it closes.
    ///
    /// # Errors
    ///
    /// Fails as [`Session::acquire`] does.
    pub fn fork_shared(&self) -> Result<Self> {
        self.fork(SessionKind::Shared)
    }

    fn fork(&self, kind: SessionKind) -> Result<Self> {
        let guard = self.acquire()?;
        let child = Self::open(kind);
        child.0.resources.lock().parent = Some(guard);
        debug!(session = child.0.id, parent = self.0.id, "session forked");
        Ok(child)
    }

    /// Fail unless the calling thread may use the session and it is alive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongThread`] or [`Error::IllegalState`].
    pub fn check_valid(&self) -> Result<()> {
        self.0.check_thread()?;
        self.check_alive()
    }

    fn check_alive(&self) -> Result<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(Error::IllegalState(StateError::AlreadyClosed))
        }
    }

    /// Begin an access through a segment of this session. Close waits for
    /// the returned guard to drop.
    pub(crate) fn enter(&self) -> Result<AccessGuard<'_>> {
        self.0.check_thread()?;
        self.0.state.enter()
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Session {}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

/// Keeps a session from closing. Released on drop or by
/// [`SessionGuard::release`].
#[must_use = "the session is released as soon as the guard is dropped"]
pub struct SessionGuard {
    session: Option<Session>,
}

impl SessionGuard {
    /// Session held by this guard.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Release the session now.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(session) = self.session.take() {
            session.0.state.release();
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("session", &self.session.as_ref().map(Session::id))
            .finish()
    }
}
