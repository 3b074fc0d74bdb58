// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for property access and persistence.

use thiserror::Error;

/// Errors raised by property access and mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// No property with this name exists in the container.
    #[error("no property named '{0}'")]
    NotFound(String),

    /// A property with this name already exists in the container.
    #[error("property '{0}' already exists")]
    Duplicate(String),

    /// The property exists but has a different concrete type.
    #[error("property '{name}' is a {actual}, expected {expected}")]
    TypeMismatch {
        /// The property name.
        name: String,
        /// The requested type.
        expected: &'static str,
        /// The stored type.
        actual: &'static str,
    },

    /// A list index outside `-1..=len`.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds {
        /// The rejected index.
        index: isize,
        /// The list length at the time of the check.
        len: usize,
    },

    /// A path that does not address anything inside the property.
    #[error("invalid path '{0}'")]
    InvalidPath(String),

    /// A value that cannot be converted to the property's value type.
    #[error("cannot convert {value} to {expected}")]
    InvalidValue {
        /// Rendering of the rejected value.
        value: String,
        /// The expected value type.
        expected: &'static str,
    },

    /// Static properties are owned by the container declaration.
    #[error("property '{0}' is not dynamic and cannot be removed")]
    NotDynamic(String),

    /// No factory is registered for the property type.
    #[error("unknown property type '{0}'")]
    UnknownType(String),
}

/// Errors raised while saving or restoring properties.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// The element stream is not well formed.
    #[error("malformed document stream near '{0}'")]
    Syntax(String),

    /// The reader expected a different element.
    #[error("expected element <{expected}>, found {found}")]
    UnexpectedElement {
        /// The element the caller asked for.
        expected: String,
        /// What was actually found.
        found: String,
    },

    /// A required attribute is absent.
    #[error("element <{element}> has no attribute '{attribute}'")]
    MissingAttribute {
        /// The element name.
        element: String,
        /// The attribute name.
        attribute: String,
    },

    /// An attribute or stream token could not be parsed as a number.
    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    /// A side-file stream ended before the declared data.
    #[error("stream truncated while reading {0}")]
    Truncated(&'static str),

    /// Side-file data is not valid UTF-8 text.
    #[error("side file is not valid text")]
    InvalidText,

    /// Persistence settings could not be parsed.
    #[error("invalid settings: {0}")]
    Settings(String),

    /// A property-level error surfaced during restore.
    #[error(transparent)]
    Property(#[from] PropertyError),
}
