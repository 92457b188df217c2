// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Error taxonomy shared by sessions, segments and the linker.

use std::fmt;

use tether_layout::{DescriptorError, LayoutError};

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed descriptor text.
    InvalidDescriptor,
    /// Argument outside the accepted domain.
    IllegalArgument,
    /// Access outside a segment's bounds.
    IndexOutOfBounds,
    /// Operation not valid in the session's current state.
    IllegalState,
    /// Confined session used off its owner thread.
    WrongThread,
    /// Native allocation failed.
    OutOfMemory,
    /// Operation not supported by this segment or session.
    UnsupportedOperation,
    /// Panic escaping an upcall. Never returned as a value: the process
    /// exits instead.
    UncaughtUpcallException,
}

/// Why a session rejected an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// The session is closing or closed.
    AlreadyClosed,
    /// The session is still acquired and cannot be closed.
    StillAcquired,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyClosed => write!(f, "already closed"),
            Self::StillAcquired => write!(f, "session is still acquired"),
        }
    }
}

/// Error returned by memory and linker operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Malformed descriptor text.
    #[error(transparent)]
    InvalidDescriptor(#[from] DescriptorError),

    /// Argument outside the accepted domain.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// Access of `length` bytes at `offset` in a segment of `size` bytes.
    #[error("out of bounds access: offset {offset}, length {length}, segment size {size}")]
    IndexOutOfBounds {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        length: u64,
        /// Size of the segment.
        size: u64,
    },

    /// Session in the wrong state.
    #[error("illegal state: {0}")]
    IllegalState(StateError),

    /// Confined session used from another thread.
    #[error("attempted access outside owning thread")]
    WrongThread,

    /// Native allocation of `size` bytes failed.
    #[error("cannot allocate {size} bytes")]
    OutOfMemory {
        /// Requested size.
        size: u64,
    },

    /// Address not aligned for the accessed layout.
    #[error("misaligned access at address {address:#x}, expected alignment {alignment}")]
    Misaligned {
        /// Address of the access.
        address: u64,
        /// Required alignment in bytes.
        alignment: u64,
    },

    /// Write through a read-only segment.
    #[error("attempt to write a read-only segment")]
    ReadOnly,

    /// Explicit close of a session that cannot be closed.
    #[error("{0} session cannot be closed")]
    NotCloseable(&'static str),
}

impl Error {
    /// Taxonomy class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDescriptor(_) => ErrorKind::InvalidDescriptor,
            Self::IllegalArgument(_) | Self::Misaligned { .. } => ErrorKind::IllegalArgument,
            Self::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            Self::IllegalState(_) => ErrorKind::IllegalState,
            Self::WrongThread => ErrorKind::WrongThread,
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::ReadOnly | Self::NotCloseable(_) => ErrorKind::UnsupportedOperation,
        }
    }

    /// Shorthand for [`Error::IllegalArgument`].
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument(message.into())
    }

    pub(crate) const fn out_of_bounds(offset: u64, length: u64, size: u64) -> Self {
        Self::IndexOutOfBounds {
            offset,
            length,
            size,
        }
    }
}

impl From<LayoutError> for Error {
    fn from(err: LayoutError) -> Self {
        Self::IllegalArgument(err.to_string())
    }
}

/// Result alias for memory and linker operations.
pub type Result<T> = std::result::Result<T, Error>;
