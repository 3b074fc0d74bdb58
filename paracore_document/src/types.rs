// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Factories that create objects by type name when a document is restored.

use hashbrown::HashMap;

use crate::error::DocumentError;
use crate::feature::{Feature, GeoFeatureGroup};
use crate::object::DocumentObject;

/// Creates an object in its default state.
pub type ObjectConstructor = fn() -> Box<dyn DocumentObject>;

/// Registry of object constructors keyed by
/// [`DocumentObject::type_name`].
///
/// # Example
///
/// ```rust
/// use paracore_document::ObjectTypes;
///
/// let types = ObjectTypes::with_builtin();
/// let object = types.create("Feature").unwrap();
/// assert_eq!(object.type_name(), "Feature");
/// assert!(types.create("Sketch").is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ObjectTypes {
    constructors: HashMap<&'static str, ObjectConstructor>,
}

impl ObjectTypes {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in object types.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut types = Self::new();
        types.register::<Feature>();
        types.register::<GeoFeatureGroup>();
        types
    }

    /// Registers `O` under the type name its default instance reports.
    pub fn register<O: DocumentObject + Default>(&mut self) {
        let name = O::default().type_name();
        self.register_with(name, || -> Box<dyn DocumentObject> { Box::new(O::default()) });
    }

    /// Registers a constructor under `name`, replacing any previous one.
    pub fn register_with(&mut self, name: &'static str, constructor: ObjectConstructor) {
        self.constructors.insert(name, constructor);
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Creates a default object of type `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn DocumentObject>, DocumentError> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| DocumentError::UnknownType(name.to_string()))
    }
}
