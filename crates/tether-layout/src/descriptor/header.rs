// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Header files: named descriptors.
//!
//! ```text
//! # comment
//! point = [i32(x)i32(y)]
//! strlen = (u64:i8)u64; abs = (i32)i32
//! ```

use super::error::{DescriptorError, Reason};
use super::parser::{Parser, identifier};
use super::Descriptor;

/// One `name = descriptor` declaration of a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Declared name.
    pub name: String,
    /// Parsed descriptor.
    pub descriptor: Descriptor,
}

/// Parse a header of declarations separated by `;` or newlines.
///
/// Lines whose first non-blank character is `#` are comments. Empty
/// declarations are skipped.
///
/// # Errors
///
/// Returns the first [`DescriptorError`], positioned in `text`.
pub fn parse_header(text: &str) -> Result<Vec<Declaration>, DescriptorError> {
    let mut declarations = Vec::new();
    let mut line_start = 0;
    for line in text.split('\n') {
        let base = line_start;
        line_start += line.len() + 1;
        if line.trim_start().starts_with('#') {
            continue;
        }

        let mut decl_start = base;
        for decl in line.split(';') {
            let start = decl_start;
            decl_start += decl.len() + 1;
            if decl.trim().is_empty() {
                continue;
            }
            declarations.push(declaration(decl).map_err(|err| err.offset(start))?);
        }
    }
    Ok(declarations)
}

/// `decl := ws ident ws '=' ws descriptor ws`
fn declaration(text: &str) -> Result<Declaration, DescriptorError> {
    let Some(eq) = text.find('=') else {
        return Err(DescriptorError::new(text.trim_end().len(), Reason::MissingEquals));
    };

    let lead = text.len() - text.trim_start().len();
    let name = identifier(&text[lead..eq])
        .map_err(|(offset, reason)| DescriptorError::new(lead + offset, reason))?;

    let rest = &text[eq + 1..];
    let value_lead = rest.len() - rest.trim_start().len();
    if rest.trim().is_empty() {
        return Err(DescriptorError::new(eq + 1, Reason::EmptyValue));
    }
    if rest[value_lead..].starts_with('=') {
        return Err(DescriptorError::new(eq + 1 + value_lead, Reason::DuplicateEquals));
    }

    let descriptor = Parser::new(rest)
        .descriptor()
        .map_err(|err| err.offset(eq + 1))?;
    Ok(Declaration {
        name: name.to_owned(),
        descriptor,
    })
}
