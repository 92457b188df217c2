// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Descriptor parse errors.

use std::fmt;

use crate::layout::LayoutError;

/// Why a descriptor was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Input ended where more was required.
    UnexpectedEnd,
    /// Character not allowed here.
    UnexpectedChar(char),
    /// Complete descriptor followed by more input.
    TrailingInput,
    /// Tag without a width, or a width with a leading zero.
    MalformedWidth,
    /// Number too large or with a leading zero.
    MalformedNumber,
    /// `[` without a matching `]`.
    UnclosedBracket,
    /// `]` without a matching `[`.
    UnbalancedBracket,
    /// `(` without a matching `)`.
    UnclosedParen,
    /// `)` without a matching `(`.
    UnbalancedParen,
    /// Struct members and union alternatives mixed in one bracket.
    MixedGroup,
    /// Union alternative with no layout.
    EmptyAlternative,
    /// `:` with no pointee.
    DanglingPointer,
    /// `:` after a value that cannot be an address.
    InvalidPointer,
    /// Sequence count with no element layout.
    DanglingCount,
    /// Function parameter list with no return layout.
    MissingReturn,
    /// Variadic marker other than exactly `...`.
    MalformedVariadic,
    /// More than one variadic marker.
    DuplicateVariadic,
    /// Name missing before `=` or inside `()`.
    EmptyName,
    /// Value missing after `=`.
    EmptyValue,
    /// Name that is not an identifier.
    InvalidIdentifier,
    /// Whitespace inside or before an identifier.
    EmbeddedWhitespace,
    /// More than one `=` in an annotation or declaration.
    DuplicateEquals,
    /// Header declaration without `=`.
    MissingEquals,
    /// Attribute value with characters outside `[A-Za-z0-9_.+-]`.
    InvalidValue,
    /// Well-formed text describing an invalid layout.
    Layout(LayoutError),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd => write!(f, "unexpected end of input"),
            Self::UnexpectedChar(c) => write!(f, "unexpected character {c:?}"),
            Self::TrailingInput => write!(f, "trailing input"),
            Self::MalformedWidth => write!(f, "malformed width"),
            Self::MalformedNumber => write!(f, "malformed number"),
            Self::UnclosedBracket => write!(f, "unclosed '['"),
            Self::UnbalancedBracket => write!(f, "unbalanced ']'"),
            Self::UnclosedParen => write!(f, "unclosed '('"),
            Self::UnbalancedParen => write!(f, "unbalanced ')'"),
            Self::MixedGroup => write!(f, "struct members mixed with union alternatives"),
            Self::EmptyAlternative => write!(f, "empty union alternative"),
            Self::DanglingPointer => write!(f, "pointer without a pointee"),
            Self::InvalidPointer => write!(f, "only 32 and 64 bit integers can be pointers"),
            Self::DanglingCount => write!(f, "sequence count without an element"),
            Self::MissingReturn => write!(f, "missing return layout"),
            Self::MalformedVariadic => write!(f, "malformed variadic marker"),
            Self::DuplicateVariadic => write!(f, "duplicate variadic marker"),
            Self::EmptyName => write!(f, "empty name"),
            Self::EmptyValue => write!(f, "empty value"),
            Self::InvalidIdentifier => write!(f, "invalid identifier"),
            Self::EmbeddedWhitespace => write!(f, "whitespace in identifier"),
            Self::DuplicateEquals => write!(f, "duplicate '='"),
            Self::MissingEquals => write!(f, "missing '='"),
            Self::InvalidValue => write!(f, "invalid attribute value"),
            Self::Layout(err) => write!(f, "{err}"),
        }
    }
}

/// Error parsing a descriptor or header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorError {
    /// Byte offset into the input where the problem was detected.
    pub position: usize,
    /// What went wrong.
    pub reason: Reason,
}

impl DescriptorError {
    pub(crate) const fn new(position: usize, reason: Reason) -> Self {
        Self { position, reason }
    }

    /// Same error shifted by `base` bytes.
    pub(crate) fn offset(self, base: usize) -> Self {
        Self {
            position: self.position + base,
            reason: self.reason,
        }
    }
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid descriptor at {}: {}", self.position, self.reason)
    }
}

impl std::error::Error for DescriptorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.reason {
            Reason::Layout(err) => Some(err),
            _ => None,
        }
    }
}
