// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Behavior attached to objects at construction.
//!
//! An extension adds its properties to the host object's storage in
//! [`ObjectExtension::init`] and then receives the host's recompute and change
//! hooks. Hooks get the host's [`PropertyData`] rather than the host itself,
//! so an extension never reaches outside the object it is attached to.

use core::fmt;

use paracore_property::{
    AsAny, Placement, PropertyContainer, PropertyContainerExt, PropertyData, PropertyError,
    PropertyInfo, PropertyLinkList, PropertyPlacement, PropertyType,
};

use crate::error::ExecError;
use crate::store::ExecContext;

/// A unit of behavior attached to a document object.
///
/// Every hook has a no-op default. Hooks that answer a query return `None`
/// when the extension has no opinion.
pub trait ObjectExtension: AsAny + fmt::Debug {
    /// Returns the extension's type name.
    fn name(&self) -> &'static str;

    /// Adds the extension's properties to the host.
    fn init(&mut self, properties: &mut PropertyData) -> Result<(), PropertyError>;

    /// Returns `true` if the extension needs the host to execute.
    fn must_execute(&self, _properties: &PropertyData) -> bool {
        false
    }

    /// Runs during the host's execution.
    fn execute(
        &mut self,
        _properties: &mut PropertyData,
        _ctx: &ExecContext<'_>,
    ) -> Result<(), ExecError> {
        Ok(())
    }

    /// Called after a host property changed.
    fn on_changed(&mut self, _properties: &mut PropertyData, _name: &str) {}

    /// Returns the names of the host's sub-objects.
    fn sub_objects(&self, _properties: &PropertyData) -> Option<Vec<String>> {
        None
    }

    /// Returns whether the host has child elements.
    fn has_child_element(&self, _properties: &PropertyData) -> Option<bool> {
        None
    }
}

impl<'a> dyn ObjectExtension + 'a {
    /// Returns the extension as `E` if it has that concrete type.
    #[must_use]
    pub fn downcast_ref<E: ObjectExtension>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }

    /// Returns the extension as `E`, mutably.
    #[must_use]
    pub fn downcast_mut<E: ObjectExtension>(&mut self) -> Option<&mut E> {
        self.as_any_mut().downcast_mut::<E>()
    }
}

/// Makes the host a container of other objects through its `Group` list.
#[derive(Clone, Copy, Debug, Default)]
pub struct GroupExtension;

impl GroupExtension {
    /// The member list property.
    pub const GROUP: &'static str = "Group";

    /// Creates the extension.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the member names in list order. Empty links are skipped.
    #[must_use]
    pub fn members(properties: &PropertyData) -> Vec<&str> {
        properties
            .get(Self::GROUP)
            .map(|group| group.link_targets())
            .unwrap_or_default()
    }

    /// Returns `true` if `name` is a member.
    #[must_use]
    pub fn has_member(properties: &PropertyData, name: &str) -> bool {
        Self::members(properties).contains(&name)
    }

    /// Appends `member` to the host's group.
    ///
    /// Returns `false` without notifying if it was already a member.
    pub fn add_member<C: PropertyContainer + ?Sized>(
        host: &mut C,
        member: &str,
    ) -> Result<bool, PropertyError> {
        if Self::has_member(host.property_data(), member) {
            return Ok(false);
        }
        host.patch_values(Self::GROUP, [(-1, Some(member.to_string()))])?;
        Ok(true)
    }

    /// Removes every occurrence of `member` from the host's group.
    ///
    /// Returns `false` without notifying if it was not a member.
    pub fn remove_member<C: PropertyContainer + ?Sized>(
        host: &mut C,
        member: &str,
    ) -> Result<bool, PropertyError> {
        let current = host.values::<Option<String>>(Self::GROUP)?;
        if !current.iter().any(|m| m.as_deref() == Some(member)) {
            return Ok(false);
        }
        let kept = current
            .iter()
            .filter(|m| m.as_deref() != Some(member))
            .cloned()
            .collect();
        host.set_values(Self::GROUP, kept)?;
        Ok(true)
    }
}

impl ObjectExtension for GroupExtension {
    fn name(&self) -> &'static str {
        "GroupExtension"
    }

    fn init(&mut self, properties: &mut PropertyData) -> Result<(), PropertyError> {
        if properties.contains(Self::GROUP) {
            return Ok(());
        }
        properties.add_static(
            Self::GROUP,
            PropertyLinkList::default(),
            PropertyInfo::new("Base").doc("List of referenced objects"),
        )
    }

    fn sub_objects(&self, properties: &PropertyData) -> Option<Vec<String>> {
        Some(
            Self::members(properties)
                .into_iter()
                .map(str::to_string)
                .collect(),
        )
    }

    fn has_child_element(&self, properties: &PropertyData) -> Option<bool> {
        Some(!Self::members(properties).is_empty())
    }
}

/// A group that positions its members with its own placement.
///
/// Besides the `Group` list this adds `Placement` and the hidden, transient
/// `ClaimedChildren` cache that the view layer fills with the members not
/// claimed by another member.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeoFeatureGroupExtension {
    group: GroupExtension,
}

impl GeoFeatureGroupExtension {
    /// The placement property.
    pub const PLACEMENT: &'static str = "Placement";
    /// The claimed-children cache property.
    pub const CLAIMED_CHILDREN: &'static str = "ClaimedChildren";

    /// Creates the extension.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached claimed children.
    #[must_use]
    pub fn claimed_children(properties: &PropertyData) -> Vec<&str> {
        properties
            .get(Self::CLAIMED_CHILDREN)
            .map(|claimed| claimed.link_targets())
            .unwrap_or_default()
    }

    /// Returns the group placement, or the identity if it is missing.
    #[must_use]
    pub fn placement(properties: &PropertyData) -> Placement {
        properties
            .get_as::<PropertyPlacement>(Self::PLACEMENT)
            .map(|p| *p.value())
            .unwrap_or_default()
    }
}

impl ObjectExtension for GeoFeatureGroupExtension {
    fn name(&self) -> &'static str {
        "GeoFeatureGroupExtension"
    }

    fn init(&mut self, properties: &mut PropertyData) -> Result<(), PropertyError> {
        self.group.init(properties)?;
        if !properties.contains(Self::PLACEMENT) {
            properties.add_static(
                Self::PLACEMENT,
                PropertyPlacement::default(),
                PropertyInfo::new("Base").doc("Placement of the group and its members"),
            )?;
        }
        properties.add_static(
            Self::CLAIMED_CHILDREN,
            PropertyLinkList::default(),
            PropertyInfo::new("Base").ty(
                PropertyType::HIDDEN
                    | PropertyType::TRANSIENT
                    | PropertyType::OUTPUT
                    | PropertyType::NO_RECOMPUTE,
            ),
        )
    }

    fn sub_objects(&self, properties: &PropertyData) -> Option<Vec<String>> {
        self.group.sub_objects(properties)
    }

    fn has_child_element(&self, properties: &PropertyData) -> Option<bool> {
        self.group.has_child_element(properties)
    }
}
