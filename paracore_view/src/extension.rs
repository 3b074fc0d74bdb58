// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Behavior attached to view providers.

use core::fmt;

use hashbrown::HashSet;
use paracore_document::{DocumentObject, GeoFeatureGroupExtension, GroupExtension};
use paracore_property::AsAny;

use crate::context::ViewContext;
use crate::provider::ViewState;
use crate::transform::Transform;

/// A unit of view behavior attached to a view provider.
///
/// Every hook has a no-op default. Hooks get the host's [`ViewState`] rather
/// than the provider, the same way object extensions get the host's
/// property storage.
pub trait ViewProviderExtension: AsAny + fmt::Debug {
    /// Returns the extension's type name.
    fn name(&self) -> &'static str;

    /// Called when the host is bound to its object.
    fn attach(&mut self, _state: &mut ViewState) {}

    /// Appends the tree children the extension claims for the host.
    fn claim_children(
        &self,
        _ctx: &ViewContext<'_>,
        _state: &ViewState,
        _children: &mut Vec<String>,
    ) {
    }

    /// Appends the 3D children the extension claims for the host.
    fn claim_children_3d(
        &self,
        _ctx: &ViewContext<'_>,
        _state: &ViewState,
        _children: &mut Vec<String>,
    ) {
    }

    /// Called after a property of the host's object changed.
    fn update_data(&mut self, _object: &dyn DocumentObject, _property: &str, _state: &mut ViewState) {
    }

    /// Appends the display modes the extension adds.
    fn display_modes(&self, _modes: &mut Vec<String>) {}

    /// Called before the host switches to `mode`.
    fn set_display_mode(&mut self, _mode: &str, _state: &mut ViewState) {}
}

impl<'a> dyn ViewProviderExtension + 'a {
    /// Returns the extension as `E` if it has that concrete type.
    #[must_use]
    pub fn downcast_ref<E: ViewProviderExtension>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }
}

/// The view side of a geo-feature group.
///
/// In the tree, the group shows the members no other member already shows:
/// a feature that claims its base feature keeps the base out of the group's
/// own list. In 3D every member sits under the group node, whose transform
/// follows the group placement.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeoFeatureGroupViewExtension;

impl GeoFeatureGroupViewExtension {
    /// The mask mode the extension registers.
    pub const GROUP_MODE: &'static str = "Group";

    /// Creates the extension.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Computes the claimed children of the group shown by `state`.
    ///
    /// Members keep their group order. A member is dropped if it no longer
    /// resolves or if another member's view provider claims it. Members
    /// that are geo-feature groups themselves are not asked for their
    /// children.
    #[must_use]
    pub fn build_claimed_children(&self, ctx: &ViewContext<'_>, state: &ViewState) -> Vec<String> {
        let Some(host) = state.object_name() else {
            return Vec::new();
        };
        let Some(group) = ctx.object(host) else {
            return Vec::new();
        };
        let members = GroupExtension::members(group.property_data());

        let mut claimed_elsewhere = HashSet::new();
        for &member in &members {
            if member == host {
                continue;
            }
            let Some(object) = ctx.object(member) else {
                continue;
            };
            if object.core().has_extension::<GeoFeatureGroupExtension>() {
                continue;
            }
            let Some(provider) = ctx.view_provider(member) else {
                continue;
            };
            claimed_elsewhere.extend(provider.claim_children(ctx));
        }

        members
            .into_iter()
            .filter(|member| ctx.object(member).is_some() && !claimed_elsewhere.contains(*member))
            .map(str::to_string)
            .collect()
    }
}

impl ViewProviderExtension for GeoFeatureGroupViewExtension {
    fn name(&self) -> &'static str {
        "GeoFeatureGroupViewExtension"
    }

    fn attach(&mut self, state: &mut ViewState) {
        state.add_display_mask_mode(Self::GROUP_MODE);
        state.invalidate_claims();
    }

    fn claim_children(
        &self,
        ctx: &ViewContext<'_>,
        state: &ViewState,
        children: &mut Vec<String>,
    ) {
        children.extend(self.build_claimed_children(ctx, state));
    }

    fn claim_children_3d(
        &self,
        ctx: &ViewContext<'_>,
        state: &ViewState,
        children: &mut Vec<String>,
    ) {
        let Some(group) = state.object_name().and_then(|host| ctx.object(host)) else {
            return;
        };
        children.extend(
            GroupExtension::members(group.property_data())
                .into_iter()
                .map(str::to_string),
        );
    }

    fn update_data(&mut self, object: &dyn DocumentObject, property: &str, state: &mut ViewState) {
        if property == GroupExtension::GROUP {
            state.invalidate_claims();
        } else if property == GeoFeatureGroupExtension::PLACEMENT {
            let placement = GeoFeatureGroupExtension::placement(object.property_data());
            state.set_transform(Transform::from_placement(&placement));
            state.invalidate_claims();
        }
    }

    fn display_modes(&self, modes: &mut Vec<String>) {
        modes.push(Self::GROUP_MODE.to_string());
    }

    fn set_display_mode(&mut self, mode: &str, state: &mut ViewState) {
        if mode == Self::GROUP_MODE {
            state.set_display_mask_mode(Self::GROUP_MODE);
        }
    }
}

#[cfg(test)]
mod tests {
    use paracore_document::GeoFeatureGroup;
    use paracore_property::{Placement, PropertyContainerExt};

    use super::*;

    #[test]
    fn attach_registers_the_group_mode() {
        let mut state = ViewState::default();
        let mut ext = GeoFeatureGroupViewExtension::new();
        ext.attach(&mut state);
        assert_eq!(state.mask_modes(), ["Group".to_string()]);
        assert!(state.take_claims_dirty());

        ext.set_display_mode("Shaded", &mut state);
        assert_eq!(state.mask_mode(), None);
        ext.set_display_mode("Group", &mut state);
        assert_eq!(state.mask_mode(), Some("Group"));

        let mut modes = Vec::new();
        ext.display_modes(&mut modes);
        assert_eq!(modes, ["Group"]);
    }

    #[test]
    fn placement_changes_move_the_node() {
        let mut group = GeoFeatureGroup::new();
        group
            .set_value("Placement", Placement::from_translation(0.0, 0.0, 4.0))
            .unwrap();
        let mut state = ViewState::default();
        let mut ext = GeoFeatureGroupViewExtension::new();

        ext.update_data(&group, "Label", &mut state);
        assert!(state.transform().is_identity());
        assert!(!state.take_claims_dirty());

        ext.update_data(&group, "Placement", &mut state);
        assert_eq!(state.transform().apply([0.0; 3]), [0.0, 0.0, 4.0]);
        assert!(state.take_claims_dirty());

        ext.update_data(&group, "Group", &mut state);
        assert!(state.take_claims_dirty());
    }
}
