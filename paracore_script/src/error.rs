// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors raised by script objects and hooks.

use paracore_property::PropertyError;
use thiserror::Error;

/// An error raised while accessing or calling a script object.
///
/// Hook callers decide what an error means: `execute` turns it into a
/// recoverable execution failure, every other hook logs it and falls back to
/// native behavior.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// The script raised.
    #[error("{0}")]
    Raised(String),

    /// The object has no callable attribute of that name.
    #[error("object has no method '{0}'")]
    NoMethod(String),

    /// No class is registered under this module and name.
    #[error("module '{module}' has no class '{class}'")]
    UnknownClass {
        /// The module name.
        module: String,
        /// The class name.
        class: String,
    },

    /// A call argument is missing or has the wrong type.
    #[error("argument {0} is missing or has the wrong type")]
    BadArgument(usize),

    /// The call has no native object to operate on.
    #[error("call has no target object")]
    NoTarget,

    /// The hook may only read its native object.
    #[error("target object is read-only in this hook")]
    ReadOnlyTarget,

    /// Reading another object is only possible while executing.
    #[error("object '{0}' is not reachable from this call")]
    Unreachable(String),

    /// A property access on the native object failed.
    #[error(transparent)]
    Property(#[from] PropertyError),
}

impl ScriptError {
    /// Shorthand for a [`Raised`](Self::Raised) error.
    pub fn raise(message: impl Into<String>) -> Self {
        Self::Raised(message.into())
    }
}
