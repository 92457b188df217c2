// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Symbol resolution.

use tether_memory::Segment;

/// Finds native symbols by name.
pub trait SymbolLookup: Send + Sync {
    /// Address of `name` as a zero-length segment, if it is defined.
    fn find(&self, name: &str) -> Option<Segment>;

    /// This lookup, falling back to `other` for names it does not define.
    fn or<L: SymbolLookup>(self, other: L) -> Chain<Self, L>
    where
        Self: Sized,
    {
        Chain {
            first: self,
            second: other,
        }
    }
}

impl<F> SymbolLookup for F
where
    F: Fn(&str) -> Option<Segment> + Send + Sync,
{
    fn find(&self, name: &str) -> Option<Segment> {
        self(name)
    }
}

/// Two lookups tried in order. Built by [`SymbolLookup::or`].
#[derive(Debug, Clone)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A: SymbolLookup, B: SymbolLookup> SymbolLookup for Chain<A, B> {
    fn find(&self, name: &str) -> Option<Segment> {
        self.first.find(name).or_else(|| self.second.find(name))
    }
}

#[cfg(feature = "libloading")]
pub use library::LibraryLookup;

#[cfg(feature = "libloading")]
mod library {
    use std::ffi::c_void;
    use std::fmt;
    use std::path::Path;
    use std::sync::Arc;

    use libloading::Library;
    use parking_lot::RwLock;
    use tether_memory::{Error, Result, Segment, Session};
    use tracing::debug;

    use super::SymbolLookup;

    /// Symbols of a dynamic library, valid while its session is alive.
    ///
    /// Closing the session unloads the library; lookups fail from then on.
    #[derive(Clone)]
    pub struct LibraryLookup {
        library: Arc<RwLock<Option<Library>>>,
        session: Session,
        name: String,
    }

    impl LibraryLookup {
        /// Load the library at `path` for the lifetime of `session`.
        ///
        /// # Safety
        ///
        /// Loading a library runs its initialisation code, which must be
        /// sound to run in this process.
        ///
        /// # Errors
        ///
        /// Returns [`Error::IllegalArgument`] if the library cannot be
        /// loaded, and the session's error if it is not alive or not
        /// accessible from this thread.
        pub unsafe fn open(path: impl AsRef<Path>, session: &Session) -> Result<Self> {
            let path = path.as_ref();
            session.check_valid()?;
            // SAFETY: forwarded to the caller.
            let library = unsafe { Library::new(path) }.map_err(|err| {
                Error::illegal_argument(format!("cannot load {}: {err}", path.display()))
            })?;
            let library = Arc::new(RwLock::new(Some(library)));
            let held = Arc::clone(&library);
            session.add_close_action(move || {
                held.write().take();
            })?;
            debug!(library = %path.display(), session = session.id(), "library loaded");
            Ok(Self {
                library,
                session: session.clone(),
                name: path.display().to_string(),
            })
        }

        /// Symbols already loaded into this process, in the global session.
        ///
        /// # Errors
        ///
        /// Returns [`Error::IllegalArgument`] if the platform refuses a
        /// handle to the running program.
        pub fn this_process() -> Result<Self> {
            #[cfg(unix)]
            let library: Library = libloading::os::unix::Library::this().into();
            #[cfg(windows)]
            let library: Library = libloading::os::windows::Library::this()
                .map_err(|err| Error::illegal_argument(format!("no process handle: {err}")))?
                .into();
            Ok(Self {
                library: Arc::new(RwLock::new(Some(library))),
                session: Session::global(),
                name: "<process>".to_owned(),
            })
        }

        /// Session bounding the library.
        #[must_use]
        pub const fn session(&self) -> &Session {
            &self.session
        }
    }

    impl SymbolLookup for LibraryLookup {
        fn find(&self, name: &str) -> Option<Segment> {
            if !self.session.is_alive() {
                return None;
            }
            let guard = self.library.read();
            let library = guard.as_ref()?;
            // SAFETY: the symbol is only used as an address, never called
            // or dereferenced here.
            let symbol = unsafe { library.get::<*const c_void>(name.as_bytes()) }.ok()?;
            let address = *symbol as u64;
            if address == 0 {
                return None;
            }
            // SAFETY: a zero-length segment cannot be dereferenced; it keeps
            // the library's session as its lifetime.
            unsafe { Segment::of_address(address).reinterpret_in(0, &self.session) }.ok()
        }
    }

    impl fmt::Debug for LibraryLookup {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("LibraryLookup")
                .field("name", &self.name)
                .field("session", &self.session)
                .field("loaded", &self.library.read().is_some())
                .finish()
        }
    }
}
