// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Recursive descent parser for the descriptor grammar.
//!
//! The parser walks the input once, left to right, and never backtracks:
//! the first character of every construct decides which production applies.
//! That makes the outcome of parsing an embedded construct independent of
//! what surrounds it.

use super::Descriptor;
use super::error::{DescriptorError, Reason};
use crate::function::FunctionDescriptor;
use crate::layout::{AttrValue, ByteOrder, Layout, LayoutError, Target, ValueKind};

/// Cursor over descriptor text.
pub(super) struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(super) const fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// `descriptor := ws (function | layout) ws EOF`
    pub(super) fn descriptor(&mut self) -> Result<Descriptor, DescriptorError> {
        self.skip_ws();
        let descriptor = if self.peek() == Some(b'(') {
            Descriptor::Function(self.function()?)
        } else {
            Descriptor::Layout(self.layout()?)
        };
        self.finish()?;
        Ok(descriptor)
    }

    /// Layout that spans the whole input.
    pub(super) fn whole_layout(&mut self) -> Result<Layout, DescriptorError> {
        self.skip_ws();
        let layout = self.layout()?;
        self.finish()?;
        Ok(layout)
    }

    /// Function descriptor that spans the whole input.
    pub(super) fn whole_function(&mut self) -> Result<FunctionDescriptor, DescriptorError> {
        self.skip_ws();
        if self.peek() != Some(b'(') {
            return Err(self.unexpected());
        }
        let function = self.function()?;
        self.finish()?;
        Ok(function)
    }

    fn finish(&mut self) -> Result<(), DescriptorError> {
        self.skip_ws();
        match self.peek() {
            None => Ok(()),
            Some(b']' | b')') => Err(self.unexpected()),
            Some(_) => Err(self.error(Reason::TrailingInput)),
        }
    }

    // =========================================================================
    // Cursor helpers
    // =========================================================================

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.bump();
        }
    }

    const fn error(&self, reason: Reason) -> DescriptorError {
        DescriptorError::new(self.pos, reason)
    }

    /// Error for whatever sits at the cursor when it cannot start the
    /// expected construct.
    fn unexpected(&self) -> DescriptorError {
        let reason = match self.src[self.pos..].chars().next() {
            None => Reason::UnexpectedEnd,
            Some(']') => Reason::UnbalancedBracket,
            Some(')') => Reason::UnbalancedParen,
            Some(c) => Reason::UnexpectedChar(c),
        };
        self.error(reason)
    }

    fn at_layout_start(&self) -> bool {
        matches!(self.peek(), Some(b'i' | b'u' | b'f' | b'x' | b'['))
    }

    /// Run of ASCII digits at the cursor, without leading zeros.
    fn digits(&mut self, malformed: Reason) -> Result<u64, DescriptorError> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.bump();
        }
        let text = &self.src[start..self.pos];
        if text.is_empty() || (text.len() > 1 && text.starts_with('0')) {
            return Err(DescriptorError::new(start, malformed));
        }
        text.parse()
            .map_err(|_| DescriptorError::new(start, malformed))
    }

    // =========================================================================
    // Productions
    // =========================================================================

    /// `function := '(' ws (layout ws)* ('...' ws (layout ws)*)? ')' ws (layout | 'v')`
    fn function(&mut self) -> Result<FunctionDescriptor, DescriptorError> {
        let open = self.pos;
        self.bump();

        let mut args = Vec::new();
        let mut variadic = None;
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(DescriptorError::new(open, Reason::UnclosedParen)),
                Some(b')') => {
                    self.bump();
                    break;
                }
                Some(b'.') => {
                    let marker = self.pos;
                    while self.peek() == Some(b'.') {
                        self.bump();
                    }
                    if self.pos - marker != 3 {
                        return Err(DescriptorError::new(marker, Reason::MalformedVariadic));
                    }
                    if variadic.is_some() {
                        return Err(DescriptorError::new(marker, Reason::DuplicateVariadic));
                    }
                    variadic = Some(args.len());
                }
                Some(_) => args.push(self.layout()?),
            }
        }

        self.skip_ws();
        let ret = match self.peek() {
            Some(b'v') => {
                self.bump();
                None
            }
            _ if self.at_layout_start() => Some(self.layout()?),
            _ => return Err(self.error(Reason::MissingReturn)),
        };

        let function = match ret {
            Some(ret) => FunctionDescriptor::of(ret, args),
            None => FunctionDescriptor::void(args),
        };
        Ok(match variadic {
            Some(index) => function.with_variadic(index),
            None => function,
        })
    }

    /// `layout := core suffix*`
    fn layout(&mut self) -> Result<Layout, DescriptorError> {
        let start = self.pos;
        let mut layout = self.core()?;
        loop {
            match self.peek() {
                Some(b'(') => layout = self.annotation(layout)?,
                Some(b'%') => {
                    self.bump();
                    let bytes = self.digits(Reason::MalformedNumber)?;
                    layout = layout
                        .with_byte_alignment(bytes)
                        .map_err(|err| layout_error(start, err))?;
                }
                _ => return Ok(layout),
            }
        }
    }

    /// `core := value | padding | bracket`
    fn core(&mut self) -> Result<Layout, DescriptorError> {
        match self.peek() {
            Some(b'i' | b'u' | b'f') => self.value(),
            Some(b'x') => {
                let start = self.pos;
                self.bump();
                let bits = self.digits(Reason::MalformedWidth)?;
                Layout::padding(bits).map_err(|err| layout_error(start, err))
            }
            Some(b'[') => self.bracket(),
            _ => Err(self.unexpected()),
        }
    }

    /// `value := tag width order? (':' pointee)?`
    fn value(&mut self) -> Result<Layout, DescriptorError> {
        let start = self.pos;
        let tag = self.peek();
        self.bump();
        let bits = self.digits(Reason::MalformedWidth)?;

        let order = match self.peek() {
            Some(b'<') => {
                self.bump();
                ByteOrder::Little
            }
            Some(b'>') => {
                self.bump();
                ByteOrder::Big
            }
            _ => ByteOrder::NATIVE,
        };

        if self.peek() == Some(b':') {
            if tag == Some(b'f') || !matches!(bits, 32 | 64) {
                return Err(self.error(Reason::InvalidPointer));
            }
            self.bump();
            let target = self.pointee()?;
            return Layout::value(ValueKind::Address, bits)
                .and_then(|l| l.with_order(order))
                .and_then(|l| l.with_target(target))
                .map_err(|err| layout_error(start, err));
        }

        let kind = match tag {
            Some(b'i') => ValueKind::SignedInt,
            Some(b'u') => ValueKind::UnsignedInt,
            _ => ValueKind::Float,
        };
        Layout::value(kind, bits)
            .and_then(|l| l.with_order(order))
            .map_err(|err| layout_error(start, err))
    }

    /// `pointee := 'v' | function | core`
    fn pointee(&mut self) -> Result<Target, DescriptorError> {
        match self.peek() {
            Some(b'v') => {
                self.bump();
                Ok(Target::Void)
            }
            Some(b'(') => Ok(Target::Function(self.function()?)),
            _ if self.at_layout_start() => Ok(Target::Layout(self.core()?)),
            _ => Err(self.error(Reason::DanglingPointer)),
        }
    }

    /// `bracket := '[' ws body ws ']'`
    fn bracket(&mut self) -> Result<Layout, DescriptorError> {
        let open = self.pos;
        self.bump();
        self.skip_ws();

        if self.peek().is_some_and(|b| b.is_ascii_digit()) {
            let count = self.digits(Reason::MalformedNumber)?;
            self.skip_ws();
            if matches!(self.peek(), None | Some(b']')) {
                return Err(self.error(Reason::DanglingCount));
            }
            let element = self.layout()?;
            self.close_bracket(open)?;
            return Layout::sequence(count, element).map_err(|err| layout_error(open, err));
        }

        let mut members = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(DescriptorError::new(open, Reason::UnclosedBracket)),
                Some(b']') => {
                    self.bump();
                    return Layout::structure(members).map_err(|err| layout_error(open, err));
                }
                Some(b'|') => {
                    return match members.len() {
                        0 => Err(self.error(Reason::EmptyAlternative)),
                        1 => self.union_tail(open, members),
                        _ => Err(self.error(Reason::MixedGroup)),
                    };
                }
                Some(_) => members.push(self.layout()?),
            }
        }
    }

    /// Remaining alternatives of a union, cursor on the first `|`.
    fn union_tail(&mut self, open: usize, mut alternatives: Vec<Layout>) -> Result<Layout, DescriptorError> {
        loop {
            // On '|'.
            self.bump();
            self.skip_ws();
            if matches!(self.peek(), None | Some(b'|' | b']')) {
                return Err(self.error(Reason::EmptyAlternative));
            }
            alternatives.push(self.layout()?);
            self.skip_ws();
            match self.peek() {
                Some(b'|') => {}
                Some(b']') => {
                    self.bump();
                    return Layout::union(alternatives).map_err(|err| layout_error(open, err));
                }
                None => return Err(DescriptorError::new(open, Reason::UnclosedBracket)),
                Some(_) => return Err(self.error(Reason::MixedGroup)),
            }
        }
    }

    fn close_bracket(&mut self, open: usize) -> Result<(), DescriptorError> {
        self.skip_ws();
        match self.peek() {
            Some(b']') => {
                self.bump();
                Ok(())
            }
            None => Err(DescriptorError::new(open, Reason::UnclosedBracket)),
            Some(_) => Err(self.unexpected()),
        }
    }

    /// `'(' annotation ')'`, applied to `layout`.
    fn annotation(&mut self, layout: Layout) -> Result<Layout, DescriptorError> {
        let open = self.pos;
        let body_start = open + 1;
        let Some(len) = self.src[body_start..].find(|c| matches!(c, ')' | '(' | '[' | ']')) else {
            return Err(DescriptorError::new(open, Reason::UnclosedParen));
        };
        let close = body_start + len;
        if self.src.as_bytes()[close] != b')' {
            return Err(DescriptorError::new(open, Reason::UnclosedParen));
        }
        let body = &self.src[body_start..close];
        self.pos = close + 1;

        let at = |(offset, reason): (usize, Reason)| DescriptorError::new(body_start + offset, reason);
        match body.find('=') {
            None => {
                let name = identifier(body).map_err(at)?;
                Ok(layout.with_name(name))
            }
            Some(eq) => {
                let key = identifier(&body[..eq]).map_err(at)?;
                let value = attribute_value(&body[eq + 1..])
                    .map_err(|(offset, reason)| at((eq + 1 + offset, reason)))?;
                Ok(layout.with_attribute(key, value))
            }
        }
    }
}

fn layout_error(position: usize, err: LayoutError) -> DescriptorError {
    DescriptorError::new(position, Reason::Layout(err))
}

/// Validate an identifier, trimming trailing whitespace.
///
/// Errors carry an offset relative to `text`.
pub(super) fn identifier(text: &str) -> Result<&str, (usize, Reason)> {
    let name = text.trim_end();
    if name.is_empty() {
        return Err((0, Reason::EmptyName));
    }
    if let Some(ws) = name.find(|c: char| c.is_ascii_whitespace()) {
        return Err((ws, Reason::EmbeddedWhitespace));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err((0, Reason::InvalidIdentifier));
    }
    if let Some((offset, _)) = name
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err((offset, Reason::InvalidIdentifier));
    }
    Ok(name)
}

/// `value := [A-Za-z0-9_.+-]+`, followed by optional whitespace.
fn attribute_value(text: &str) -> Result<AttrValue, (usize, Reason)> {
    if let Some(eq) = text.find('=') {
        return Err((eq, Reason::DuplicateEquals));
    }
    let value = text.trim_end();
    if value.is_empty() {
        return Err((0, Reason::EmptyValue));
    }
    if let Some(bad) =
        value.find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-')))
    {
        return Err((bad, Reason::InvalidValue));
    }
    Ok(value
        .parse::<i64>()
        .map_or_else(|_| AttrValue::Text(value.to_owned()), AttrValue::Int))
}
