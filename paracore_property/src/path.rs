// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Addressable paths into property values.
//!
//! An expression layer addresses structured values with paths such as
//! `Values[2]` or `Placement.Base`. A [`PropertyPath`] names the property and
//! the components below it. Properties decide what the components mean; the
//! default treats the whole property as a single leaf.

use std::fmt;

use smallvec::SmallVec;

use crate::error::PropertyError;

/// The dynamic value type used by path access.
pub type PathValue = serde_json::Value;

/// One step below the property in a [`PropertyPath`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathComponent {
    /// A sequence index. `-1` addresses the element after the last one.
    Index(isize),
    /// A named attribute of a structured value.
    Attribute(String),
}

/// A path addressing a property or a value inside it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    property: String,
    components: SmallVec<[PathComponent; 2]>,
}

impl PropertyPath {
    /// Creates a path addressing the whole property.
    #[must_use]
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            components: SmallVec::new(),
        }
    }

    /// Appends an index component.
    #[must_use]
    pub fn index(mut self, index: isize) -> Self {
        self.components.push(PathComponent::Index(index));
        self
    }

    /// Appends an attribute component.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.components.push(PathComponent::Attribute(name.into()));
        self
    }

    /// Parses `Name`, `Name[3]`, `Name.Attr` and combinations thereof.
    pub fn parse(text: &str) -> Result<Self, PropertyError> {
        let invalid = || PropertyError::InvalidPath(text.to_string());
        let end = text.find(['.', '[']).unwrap_or(text.len());
        let (name, mut rest) = text.split_at(end);
        if name.is_empty() {
            return Err(invalid());
        }
        let mut path = Self::new(name);
        while !rest.is_empty() {
            if let Some(tail) = rest.strip_prefix('[') {
                let close = tail.find(']').ok_or_else(invalid)?;
                let index = tail[..close].trim().parse::<isize>().map_err(|_| invalid())?;
                path.components.push(PathComponent::Index(index));
                rest = &tail[close + 1..];
            } else if let Some(tail) = rest.strip_prefix('.') {
                let end = tail.find(['.', '[']).unwrap_or(tail.len());
                if end == 0 {
                    return Err(invalid());
                }
                path.components
                    .push(PathComponent::Attribute(tail[..end].to_string()));
                rest = &tail[end..];
            } else {
                return Err(invalid());
            }
        }
        Ok(path)
    }

    /// Returns the property name.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Returns the components below the property.
    #[must_use]
    pub fn components(&self) -> &[PathComponent] {
        &self.components
    }

    /// Returns `true` if the path addresses the whole property.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns an error describing this path as invalid.
    #[must_use]
    pub fn invalid(&self) -> PropertyError {
        PropertyError::InvalidPath(self.to_string())
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.property)?;
        for component in &self.components {
            match component {
                PathComponent::Index(i) => write!(f, "[{i}]")?,
                PathComponent::Attribute(a) => write!(f, ".{a}")?,
            }
        }
        Ok(())
    }
}

/// Describes a value for error messages without dumping large payloads.
pub(crate) fn describe(value: &PathValue) -> String {
    let text = value.to_string();
    if text.chars().count() > 32 {
        let head: String = text.chars().take(32).collect();
        format!("{head}...")
    } else {
        text
    }
}
