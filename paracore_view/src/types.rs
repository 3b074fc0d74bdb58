// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Factories that create view providers by the name objects report.

use hashbrown::HashMap;

use crate::provider::ViewProvider;
use crate::providers::{ViewProviderDocumentObject, ViewProviderFeature, ViewProviderGeoFeatureGroup};

/// Creates a detached view provider.
pub type ViewProviderConstructor = fn() -> Box<dyn ViewProvider>;

/// Registry of view provider constructors keyed by
/// [`ViewProvider::type_name`].
///
/// Objects name the provider they want through
/// [`DocumentObject::view_provider_name`](paracore_document::DocumentObject::view_provider_name).
#[derive(Clone, Debug, Default)]
pub struct ViewProviderTypes {
    constructors: HashMap<&'static str, ViewProviderConstructor>,
}

impl ViewProviderTypes {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in providers.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut types = Self::new();
        types.register::<ViewProviderDocumentObject>();
        types.register::<ViewProviderFeature>();
        types.register::<ViewProviderGeoFeatureGroup>();
        types
    }

    /// Registers `P` under the type name its default instance reports.
    pub fn register<P: ViewProvider + Default>(&mut self) {
        let name = P::default().type_name();
        self.constructors
            .insert(name, || -> Box<dyn ViewProvider> { Box::new(P::default()) });
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Creates a provider of type `name`.
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Box<dyn ViewProvider>> {
        self.constructors.get(name).map(|constructor| constructor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_providers_are_registered() {
        let types = ViewProviderTypes::with_builtin();
        let provider = types.create("ViewProviderFeature").unwrap();
        assert_eq!(provider.type_name(), "ViewProviderFeature");
        assert!(provider.downcast_ref::<ViewProviderFeature>().is_some());
        assert!(types.contains("ViewProviderGeoFeatureGroup"));
        assert!(types.create("ViewProviderSketch").is_none());
    }
}
