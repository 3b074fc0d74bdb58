// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Built-in view providers.

use paracore_document::Feature;
use paracore_property::PropertyContainerExt;

use crate::context::ViewContext;
use crate::extension::GeoFeatureGroupViewExtension;
use crate::provider::{ViewProvider, ViewProviderCore};

/// Shows any object without children of its own.
///
/// Also the fallback for objects whose view provider type is unknown.
#[derive(Debug, Default)]
pub struct ViewProviderDocumentObject {
    core: ViewProviderCore,
}

impl ViewProviderDocumentObject {
    /// Creates a detached provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewProvider for ViewProviderDocumentObject {
    fn core(&self) -> &ViewProviderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewProviderCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "ViewProviderDocumentObject"
    }
}

/// Shows a [`Feature`], with its base feature as its child.
#[derive(Debug, Default)]
pub struct ViewProviderFeature {
    core: ViewProviderCore,
}

impl ViewProviderFeature {
    /// The shading modes a feature offers.
    pub const DISPLAY_MODES: [&'static str; 4] = ["Flat Lines", "Shaded", "Wireframe", "Points"];

    /// Creates a detached provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewProvider for ViewProviderFeature {
    fn core(&self) -> &ViewProviderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewProviderCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "ViewProviderFeature"
    }

    fn claim_children(&self, ctx: &ViewContext<'_>) -> Vec<String> {
        let base = self
            .core
            .state()
            .object_name()
            .and_then(|name| ctx.object(name))
            .and_then(|object| object.value::<Option<String>>(Feature::BASE_FEATURE).ok())
            .and_then(Option::as_deref)
            .filter(|base| ctx.object(base).is_some());
        let mut children: Vec<String> = base.into_iter().map(str::to_string).collect();
        children.extend(self.core.claim_children(ctx));
        children
    }

    fn display_modes(&self) -> Vec<String> {
        let mut modes: Vec<String> = Self::DISPLAY_MODES.iter().map(|m| m.to_string()).collect();
        modes.extend(self.core.display_modes());
        modes
    }
}

/// Shows a geo-feature group through [`GeoFeatureGroupViewExtension`].
#[derive(Debug)]
pub struct ViewProviderGeoFeatureGroup {
    core: ViewProviderCore,
}

impl Default for ViewProviderGeoFeatureGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewProviderGeoFeatureGroup {
    /// Creates a detached provider.
    #[must_use]
    pub fn new() -> Self {
        let mut core = ViewProviderCore::new();
        core.add_extension(GeoFeatureGroupViewExtension::new());
        Self { core }
    }
}

impl ViewProvider for ViewProviderGeoFeatureGroup {
    fn core(&self) -> &ViewProviderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewProviderCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "ViewProviderGeoFeatureGroup"
    }
}

#[cfg(test)]
mod tests {
    use paracore_document::{Document, GeoFeatureGroup};

    use super::*;

    #[test]
    fn feature_modes_include_extension_modes() {
        let feature = ViewProviderFeature::new();
        assert_eq!(feature.display_modes().len(), 4);
        let group = ViewProviderGeoFeatureGroup::new();
        assert_eq!(group.display_modes(), ["Group"]);
        assert!(group.core().has_extension::<GeoFeatureGroupViewExtension>());
        assert!(ViewProviderDocumentObject::new().display_modes().is_empty());
    }

    #[test]
    fn unknown_display_modes_are_refused() {
        let mut group = ViewProviderGeoFeatureGroup::new();
        assert!(!group.set_display_mode("Shaded"));
        assert_eq!(group.core().state().display_mode(), None);
        let mut doc = Document::new("Doc");
        let id = doc.add_object("Body", Box::new(GeoFeatureGroup::new()));
        group.core_mut().attach(id, "Body");
        assert!(group.set_display_mode("Group"));
        assert_eq!(group.core().state().display_mode(), Some("Group"));
        assert_eq!(group.core().state().mask_mode(), Some("Group"));
    }
}
