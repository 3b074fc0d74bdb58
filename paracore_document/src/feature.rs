// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Built-in object types.

use paracore_property::{
    PropertyContainer, PropertyContainerExt, PropertyData, PropertyError, PropertyFloat,
    PropertyFloatList, PropertyInfo, PropertyLink, PropertyPlacement, PropertyStatus, PropertyType,
};

use crate::error::ExecError;
use crate::extension::GeoFeatureGroupExtension;
use crate::object::{DocumentObject, ObjectCore};
use crate::store::ExecContext;

/// A feature that extends the shape of its base feature.
///
/// The shape is modeled as a list of section lengths. Executing copies the
/// base feature's shape, appends `Profile`, then appends `Length` if it is
/// positive. Without a base feature the profile alone must be non-empty.
#[derive(Debug)]
pub struct Feature {
    core: ObjectCore,
}

impl Default for Feature {
    fn default() -> Self {
        Self::new()
    }
}

impl Feature {
    /// Link to the feature this one builds on.
    pub const BASE_FEATURE: &'static str = "BaseFeature";
    /// The feature's placement.
    pub const PLACEMENT: &'static str = "Placement";
    /// Section lengths added by this feature.
    pub const PROFILE: &'static str = "Profile";
    /// Extrusion length.
    pub const LENGTH: &'static str = "Length";
    /// The computed shape.
    pub const SHAPE: &'static str = "Shape";

    /// Creates a feature with no base and a length of 10.
    #[must_use]
    pub fn new() -> Self {
        let mut core = ObjectCore::new();
        let declared = Self::declare(core.properties_mut());
        debug_assert!(declared.is_ok(), "feature properties have distinct names");
        Self { core }
    }

    fn declare(data: &mut PropertyData) -> Result<(), PropertyError> {
        data.add_static(
            Self::BASE_FEATURE,
            PropertyLink::default(),
            PropertyInfo::new("Base").doc("Feature this one is built on"),
        )?;
        data.add_static(
            Self::PLACEMENT,
            PropertyPlacement::default(),
            PropertyInfo::new("Base").doc("Placement of the feature"),
        )?;
        for name in [Self::BASE_FEATURE, Self::PLACEMENT] {
            if let Some(property) = data.get_mut(name) {
                property.base_mut().set_status(PropertyStatus::HIDDEN, true);
            }
        }
        data.add_static(
            Self::PROFILE,
            PropertyFloatList::default(),
            PropertyInfo::new("Feature").doc("Section lengths added by this feature"),
        )?;
        data.add_static(
            Self::LENGTH,
            PropertyFloat::new(10.0),
            PropertyInfo::new("Feature").doc("Extrusion length"),
        )?;
        data.add_static(
            Self::SHAPE,
            PropertyFloatList::default(),
            PropertyInfo::new("Feature")
                .doc("The computed shape")
                .ty(PropertyType::OUTPUT),
        )
    }

    /// Returns the computed shape.
    #[must_use]
    pub fn shape(&self) -> &[f64] {
        self.values::<f64>(Self::SHAPE).unwrap_or_default()
    }

    fn base_shape(ctx: &ExecContext<'_>, name: &str) -> Result<Vec<f64>, ExecError> {
        let base = ctx
            .object(name)
            .ok_or_else(|| ExecError::domain("No base feature linked"))?;
        let shape = base
            .values::<f64>(Self::SHAPE)
            .map_err(|_| ExecError::domain("No base feature linked"))?;
        if shape.is_empty() {
            return Err(ExecError::domain("Shape is null"));
        }
        Ok(shape.to_vec())
    }
}

impl PropertyContainer for Feature {
    fn property_data(&self) -> &PropertyData {
        self.core.properties()
    }

    fn property_data_mut(&mut self) -> &mut PropertyData {
        self.core.properties_mut()
    }

    fn container_name(&self) -> &str {
        self.core.name()
    }

    fn full_name(&self) -> String {
        self.core.full_name()
    }

    fn on_before_change(&mut self, name: &str) {
        self.core.before_change(name);
    }

    fn on_changed(&mut self, name: &str) {
        self.core.changed(name);
    }
}

impl DocumentObject for Feature {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "Feature"
    }

    fn must_execute(&self) -> bool {
        let base_touched = self
            .property(Self::BASE_FEATURE)
            .is_ok_and(|base| base.base().is_touched());
        base_touched || self.core.must_execute()
    }

    fn execute(&mut self, ctx: &ExecContext<'_>) -> Result<(), ExecError> {
        let length = *self.value::<f64>(Self::LENGTH)?;
        if length.is_nan() || length < 0.0 {
            return Err(ExecError::domain("Length must not be negative"));
        }
        let profile = self.values::<f64>(Self::PROFILE)?.to_vec();
        let mut shape = match self.value::<Option<String>>(Self::BASE_FEATURE)? {
            Some(base) => Self::base_shape(ctx, base)?,
            None if profile.is_empty() => return Err(ExecError::domain("Base property not set")),
            None => Vec::new(),
        };
        shape.extend(profile);
        if length > 0.0 {
            shape.push(length);
        }
        self.set_values(Self::SHAPE, shape)?;
        Ok(())
    }

    fn view_provider_name(&self) -> String {
        "ViewProviderFeature".to_string()
    }
}

/// A group whose placement positions its members.
#[derive(Debug)]
pub struct GeoFeatureGroup {
    core: ObjectCore,
}

impl Default for GeoFeatureGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoFeatureGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        let mut core = ObjectCore::new();
        let added = core.add_extension(GeoFeatureGroupExtension::new());
        debug_assert!(added.is_ok(), "group properties have distinct names");
        Self { core }
    }
}

impl PropertyContainer for GeoFeatureGroup {
    fn property_data(&self) -> &PropertyData {
        self.core.properties()
    }

    fn property_data_mut(&mut self) -> &mut PropertyData {
        self.core.properties_mut()
    }

    fn container_name(&self) -> &str {
        self.core.name()
    }

    fn full_name(&self) -> String {
        self.core.full_name()
    }

    fn on_before_change(&mut self, name: &str) {
        self.core.before_change(name);
    }

    fn on_changed(&mut self, name: &str) {
        self.core.changed(name);
    }
}

impl DocumentObject for GeoFeatureGroup {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "GeoFeatureGroup"
    }

    fn view_provider_name(&self) -> String {
        "ViewProviderGeoFeatureGroup".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_base_properties() {
        let feature = Feature::new();
        assert!(feature.property("BaseFeature").unwrap().base().is_hidden());
        assert!(feature.property("Placement").unwrap().base().is_hidden());
        assert!(feature.property("Shape").unwrap().base().is_output());
        assert!(feature.shape().is_empty());
    }

    #[test]
    fn touched_base_link_forces_execution() {
        let mut feature = Feature::new();
        feature.core_mut().purge_touched();
        assert!(!feature.must_execute());
        feature
            .property_data_mut()
            .get_mut("BaseFeature")
            .unwrap()
            .base_mut()
            .touch();
        assert!(feature.must_execute());
    }

    #[test]
    fn group_has_group_placement_and_cache() {
        let group = GeoFeatureGroup::new();
        assert!(group.core().has_extension::<GeoFeatureGroupExtension>());
        assert!(group.property("ClaimedChildren").is_ok());
        assert!(!group.has_child_element());
        assert_eq!(group.view_provider_name(), "ViewProviderGeoFeatureGroup");
    }
}
