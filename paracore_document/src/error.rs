// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for execution and document operations.

use paracore_property::{PersistError, PropertyError};
use thiserror::Error;

use crate::id::ObjectId;

/// Errors an object reports from [`execute`](crate::DocumentObject::execute).
///
/// These are always recoverable: the document records the failure on the
/// object and continues with the rest of the recompute.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// The object's own computation failed.
    #[error("{0}")]
    Domain(String),

    /// A script hook raised.
    #[error("script error: {0}")]
    Script(String),

    /// An object this one depends on failed in the same pass.
    #[error("dependency '{0}' failed")]
    Dependency(String),

    /// The object is part of a dependency cycle.
    #[error("'{0}' is part of a dependency cycle")]
    Cycle(String),

    /// A property access failed during execution.
    #[error(transparent)]
    Property(#[from] PropertyError),
}

impl ExecError {
    /// Shorthand for a [`Domain`](Self::Domain) error.
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }
}

/// Errors raised by [`Document`](crate::Document) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The id does not refer to a live object.
    #[error("object {0:?} is not in the document")]
    NotFound(ObjectId),

    /// No object has this name.
    #[error("no object named '{0}'")]
    UnknownName(String),

    /// Two objects would share a name.
    #[error("object name '{0}' is already in use")]
    DuplicateName(String),

    /// No constructor is registered for the object type.
    #[error("unknown object type '{0}'")]
    UnknownType(String),

    /// The object is not a group.
    #[error("'{0}' is not a group")]
    NotAGroup(String),

    /// A transaction operation was requested with none open.
    #[error("no transaction is open")]
    NoTransaction,

    /// A transaction is already open.
    #[error("transaction '{0}' is already open")]
    TransactionOpen(String),

    /// A property operation failed.
    #[error(transparent)]
    Property(#[from] PropertyError),

    /// Reading or writing the document failed.
    #[error(transparent)]
    Persist(#[from] PersistError),
}
