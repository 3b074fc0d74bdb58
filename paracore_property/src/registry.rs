// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property type factory.
//!
//! Restoring a dynamic property needs a fresh instance of the saved type.
//! [`PropertyTypes`] maps registered type names to constructors.

use hashbrown::HashMap;

use crate::error::PropertyError;
use crate::list::{
    PropertyBoolList, PropertyFloatList, PropertyIntegerList, PropertyLinkList,
    PropertyStringList,
};
use crate::property::Property;
use crate::value::{
    PropertyBool, PropertyFloat, PropertyInteger, PropertyLink, PropertyPlacement, PropertyString,
};

/// Creates a default-valued property.
pub type PropertyConstructor = fn() -> Box<dyn Property>;

/// A registry of property types by name.
///
/// # Example
///
/// ```rust
/// use paracore_property::PropertyTypes;
///
/// let types = PropertyTypes::with_builtin();
/// let prop = types.create("PropertyFloatList").unwrap();
/// assert_eq!(prop.xml_name(), "FloatList");
/// assert!(types.create("PropertyShape").is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct PropertyTypes {
    constructors: HashMap<&'static str, PropertyConstructor>,
}

impl PropertyTypes {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every property type of this crate.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut types = Self::new();
        types.register::<PropertyInteger>();
        types.register::<PropertyFloat>();
        types.register::<PropertyBool>();
        types.register::<PropertyString>();
        types.register::<PropertyLink>();
        types.register::<PropertyPlacement>();
        types.register::<PropertyIntegerList>();
        types.register::<PropertyFloatList>();
        types.register::<PropertyBoolList>();
        types.register::<PropertyStringList>();
        types.register::<PropertyLinkList>();
        types
    }

    /// Registers `P` under its type name.
    pub fn register<P: Property + Default>(&mut self) {
        let name = P::default().type_name();
        self.register_with(name, || -> Box<dyn Property> { Box::new(P::default()) });
    }

    /// Registers a constructor under `name`, replacing any previous one.
    pub fn register_with(&mut self, name: &'static str, constructor: PropertyConstructor) {
        self.constructors.insert(name, constructor);
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Creates a default-valued property of the named type.
    pub fn create(&self, name: &str) -> Result<Box<dyn Property>, PropertyError> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| PropertyError::UnknownType(name.to_string()))
    }
}
