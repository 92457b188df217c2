// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Rendering layouts in descriptor syntax.

use std::fmt;

use super::{ByteOrder, Layout, Shape, Target, ValueKind};

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_core(self, f)?;

        if self.0.bit_alignment != self.0.natural_alignment {
            write!(f, "%{}", self.byte_alignment())?;
        }
        if let Some(name) = &self.0.name {
            write!(f, "({name})")?;
        }
        for (key, value) in &self.0.attributes {
            write!(f, "({key}={value})")?;
        }
        Ok(())
    }
}

fn write_core(layout: &Layout, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match layout.shape() {
        Shape::Value {
            kind,
            bits,
            order,
            target,
        } => {
            let tag = match kind {
                ValueKind::SignedInt => 'i',
                ValueKind::UnsignedInt | ValueKind::Address => 'u',
                ValueKind::Float => 'f',
            };
            write!(f, "{tag}{bits}")?;
            if !order.is_native() {
                let marker = match order {
                    ByteOrder::Little => '<',
                    ByteOrder::Big => '>',
                };
                write!(f, "{marker}")?;
            }
            if let Some(target) = target {
                write!(f, ":{target}")?;
            }
            Ok(())
        }
        Shape::Padding { bits } => write!(f, "x{bits}"),
        Shape::Sequence { count, element } => {
            write!(f, "[{}{element}]", count.unwrap_or(0))
        }
        Shape::Struct(members) => {
            write!(f, "[")?;
            for member in members {
                write!(f, "{member}")?;
            }
            write!(f, "]")
        }
        Shape::Union(members) => {
            write!(f, "[")?;
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    write!(f, "|")?;
                }
                write!(f, "{member}")?;
            }
            write!(f, "]")
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "v"),
            Self::Layout(layout) => write!(f, "{layout}"),
            Self::Function(function) => write!(f, "{function}"),
        }
    }
}
