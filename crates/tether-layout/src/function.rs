// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tether contributors

//! Function descriptors.

use std::fmt;
use std::sync::Arc;

use crate::layout::Layout;

/// Argument and return layouts of a native function.
///
/// `variadic` is the index of the first variadic argument: arguments before
/// it are fixed, the rest are passed as the variadic tail of a C `...`
/// parameter list.
#[derive(Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    args: Arc<[Layout]>,
    ret: Option<Layout>,
    variadic: Option<usize>,
}

impl FunctionDescriptor {
    /// Descriptor returning `ret`.
    #[must_use]
    pub fn of(ret: Layout, args: impl IntoIterator<Item = Layout>) -> Self {
        Self {
            args: args.into_iter().collect(),
            ret: Some(ret),
            variadic: None,
        }
    }

    /// Descriptor with no return value.
    #[must_use]
    pub fn void(args: impl IntoIterator<Item = Layout>) -> Self {
        Self {
            args: args.into_iter().collect(),
            ret: None,
            variadic: None,
        }
    }

    /// Same descriptor, with arguments from `index` on passed as variadic.
    ///
    /// An index equal to the argument count describes a variadic function
    /// called with an empty tail.
    /// An out-of-range index is clamped to the argument count.
    #[must_use]
    pub fn with_variadic(&self, index: usize) -> Self {
        Self {
            variadic: Some(index.min(self.args.len())),
            ..self.clone()
        }
    }

    /// Same arguments with a different return layout.
    #[must_use]
    pub fn returning(&self, ret: Option<Layout>) -> Self {
        Self {
            ret,
            ..self.clone()
        }
    }

    /// Same descriptor with `layout` appended to the arguments.
    #[must_use]
    pub fn append_arg(&self, layout: Layout) -> Self {
        let args: Vec<Layout> = self.args.iter().cloned().chain([layout]).collect();
        Self {
            args: args.into(),
            ..self.clone()
        }
    }

    /// Argument layouts.
    #[must_use]
    pub fn args(&self) -> &[Layout] {
        &self.args
    }

    /// Return layout, `None` for void functions.
    #[must_use]
    pub fn ret(&self) -> Option<&Layout> {
        self.ret.as_ref()
    }

    /// Index of the first variadic argument.
    #[must_use]
    pub fn variadic(&self) -> Option<usize> {
        self.variadic
    }

    /// Whether argument `index` belongs to the variadic tail.
    #[must_use]
    pub fn is_variadic_arg(&self, index: usize) -> bool {
        self.variadic.is_some_and(|first| index >= first)
    }
}

impl fmt::Display for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, arg) in self.args.iter().enumerate() {
            if self.variadic == Some(i) {
                write!(f, "...")?;
            } else if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{arg}")?;
        }
        if self.variadic == Some(self.args.len()) {
            write!(f, "...")?;
        }
        write!(f, ")")?;
        match &self.ret {
            Some(ret) => write!(f, "{ret}"),
            None => write!(f, "v"),
        }
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionDescriptor({self})")
    }
}
