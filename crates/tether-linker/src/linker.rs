// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Entry point tying conventions, downcalls and upcalls together.

use tether_layout::FunctionDescriptor;
use tether_memory::{Error, Result, Segment, Session};
use tracing::debug;

use crate::abi::{Abi, CallPlan, CallingConvention, promote};
use crate::downcall::Downcall;
use crate::upcall::{self, UNCAUGHT_UPCALL_EXIT_CODE};
use crate::value::Value;

/// Runtime settings of a [`Linker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkerConfig {
    /// Calling convention used for every call. Must be the host's.
    pub abi: Abi,
    /// Process exit code after a panic escapes an upcall.
    pub uncaught_exit_code: i32,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            abi: Abi::host().unwrap_or(Abi::SysV),
            uncaught_exit_code: UNCAUGHT_UPCALL_EXIT_CODE,
        }
    }
}

/// Creates downcall handles and upcall stubs for one calling convention.
#[derive(Debug, Clone)]
pub struct Linker {
    config: LinkerConfig,
}

impl Linker {
    /// Linker for the host convention with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] on hosts without a supported
    /// convention.
    pub fn native() -> Result<Self> {
        Self::with_config(LinkerConfig::default())
    }

    /// Linker with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] if `config.abi` is not the host's
    /// convention. Its plans remain available through
    /// [`Abi::convention`].
    pub fn with_config(config: LinkerConfig) -> Result<Self> {
        if !config.abi.is_host() {
            return Err(Error::illegal_argument(format!(
                "{} is not the host calling convention",
                config.abi
            )));
        }
        debug!(abi = %config.abi, exit_code = config.uncaught_exit_code, "linker created");
        Ok(Self { config })
    }

    /// Settings of this linker.
    #[must_use]
    pub const fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Convention of this linker.
    #[must_use]
    pub const fn abi(&self) -> Abi {
        self.config.abi
    }

    fn convention(&self) -> &'static dyn CallingConvention {
        self.config.abi.convention()
    }

    /// Plan for calling `function`, after variadic promotion.
    ///
    /// # Errors
    ///
    /// As for [`CallingConvention::classify`].
    pub fn classify(&self, function: &FunctionDescriptor) -> Result<CallPlan> {
        self.convention().classify(&promote(function))
    }

    /// Bind the native function at `target` to `function`.
    ///
    /// # Safety
    ///
    /// `target` must be the address of a native function whose C signature
    /// matches `function`. Calling the handle runs that function with
    /// whatever addresses the arguments carry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] for null or heap targets and for
    /// descriptors the convention cannot pass.
    pub unsafe fn downcall(
        &self,
        target: &Segment,
        function: &FunctionDescriptor,
    ) -> Result<Downcall> {
        Downcall::new(target, function, self.convention())
    }

    /// Native entry point that calls `callback`, owned by `session`.
    ///
    /// The stub is a zero-length segment; it stays callable until the
    /// session closes or [`Linker::free_upcall`] is called. Arguments must
    /// be values passed in registers and the result a value or `v`.
    ///
    /// A panic escaping `callback`, or a result that does not match the
    /// descriptor, terminates the process with
    /// [`LinkerConfig::uncaught_exit_code`].
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalArgument`] for unsupported descriptors and when all
    ///   [`UPCALL_SLOTS`](crate::UPCALL_SLOTS) of the return class are in
    ///   use or retired; freed stubs are never handed out again
    /// - the session's error if it is not alive or not accessible from this
    ///   thread
    pub fn upcall<F>(
        &self,
        callback: F,
        function: &FunctionDescriptor,
        session: &Session,
    ) -> Result<Segment>
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        upcall::create(
            self.convention(),
            function,
            Box::new(callback),
            session,
            self.config.uncaught_exit_code,
        )
    }

    /// Retire an upcall stub before its session closes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] if `stub` is not a live upcall
    /// stub, including a second free of the same stub.
    pub fn free_upcall(&self, stub: &Segment) -> Result<()> {
        upcall::free(stub.address())
    }

    /// Address of `name` among the symbols loaded into this process.
    #[cfg(feature = "libloading")]
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Segment> {
        use crate::lookup::{LibraryLookup, SymbolLookup};

        LibraryLookup::this_process().ok()?.find(name)
    }
}
