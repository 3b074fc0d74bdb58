// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The view provider contract and the state every provider shares.

use core::fmt;

use paracore_document::{DocumentObject, ObjectId};
use paracore_property::AsAny;

use crate::context::ViewContext;
use crate::extension::ViewProviderExtension;
use crate::transform::Transform;

/// Per-provider view state that extensions may change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewState {
    object: Option<(ObjectId, String)>,
    transform: Transform,
    mask_modes: Vec<String>,
    mask_mode: Option<String>,
    display_mode: Option<String>,
    claims_dirty: bool,
}

impl ViewState {
    /// Returns the id of the shown object, once attached.
    #[must_use]
    pub fn object_id(&self) -> Option<ObjectId> {
        self.object.as_ref().map(|(id, _)| *id)
    }

    /// Returns the name of the shown object, once attached.
    #[must_use]
    pub fn object_name(&self) -> Option<&str> {
        self.object.as_ref().map(|(_, name)| name.as_str())
    }

    /// Returns the transform applied to the node and its children.
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Replaces the node transform.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// Registers a mask mode: a named child arrangement the display can
    /// switch to.
    pub fn add_display_mask_mode(&mut self, mode: &str) {
        if !self.mask_modes.iter().any(|m| m == mode) {
            self.mask_modes.push(mode.to_string());
        }
    }

    /// Returns the registered mask modes.
    #[must_use]
    pub fn mask_modes(&self) -> &[String] {
        &self.mask_modes
    }

    /// Selects a registered mask mode. Returns `false` for unknown modes.
    pub fn set_display_mask_mode(&mut self, mode: &str) -> bool {
        if !self.mask_modes.iter().any(|m| m == mode) {
            return false;
        }
        self.mask_mode = Some(mode.to_string());
        true
    }

    /// Returns the selected mask mode.
    #[must_use]
    pub fn mask_mode(&self) -> Option<&str> {
        self.mask_mode.as_deref()
    }

    /// Returns the selected display mode.
    #[must_use]
    pub fn display_mode(&self) -> Option<&str> {
        self.display_mode.as_deref()
    }

    /// Marks the provider's claimed children as out of date.
    pub fn invalidate_claims(&mut self) {
        self.claims_dirty = true;
    }

    /// Returns and clears the out-of-date mark.
    pub fn take_claims_dirty(&mut self) -> bool {
        core::mem::take(&mut self.claims_dirty)
    }
}

/// The state and extensions shared by every view provider.
///
/// Providers embed one and forward [`ViewProvider::core`] to it.
#[derive(Debug, Default)]
pub struct ViewProviderCore {
    state: ViewState,
    extensions: Vec<Box<dyn ViewProviderExtension>>,
}

impl ViewProviderCore {
    /// Creates a detached core with no extensions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the view state.
    #[must_use]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Returns the view state mutably.
    pub fn state_mut(&mut self) -> &mut ViewState {
        &mut self.state
    }

    /// Attaches an extension. Extensions see every hook in attach order.
    pub fn add_extension<E: ViewProviderExtension>(&mut self, extension: E) {
        self.extensions.push(Box::new(extension));
    }

    /// Returns the extension of type `E`.
    #[must_use]
    pub fn extension<E: ViewProviderExtension>(&self) -> Option<&E> {
        self.extensions.iter().find_map(|ext| ext.downcast_ref::<E>())
    }

    /// Returns `true` if an extension of type `E` is attached.
    #[must_use]
    pub fn has_extension<E: ViewProviderExtension>(&self) -> bool {
        self.extension::<E>().is_some()
    }

    /// Binds the core to an object and lets the extensions set up.
    pub fn attach(&mut self, id: ObjectId, name: &str) {
        self.state.object = Some((id, name.to_string()));
        for ext in &mut self.extensions {
            ext.attach(&mut self.state);
        }
    }

    /// Children claimed by the extensions, in extension order.
    #[must_use]
    pub fn claim_children(&self, ctx: &ViewContext<'_>) -> Vec<String> {
        let mut children = Vec::new();
        for ext in &self.extensions {
            ext.claim_children(ctx, &self.state, &mut children);
        }
        children
    }

    /// Children claimed in the 3D view by the extensions.
    #[must_use]
    pub fn claim_children_3d(&self, ctx: &ViewContext<'_>) -> Vec<String> {
        let mut children = Vec::new();
        for ext in &self.extensions {
            ext.claim_children_3d(ctx, &self.state, &mut children);
        }
        children
    }

    /// Forwards a property change of the shown object to the extensions.
    pub fn update_data(&mut self, object: &dyn DocumentObject, property: &str) {
        for ext in &mut self.extensions {
            ext.update_data(object, property, &mut self.state);
        }
    }

    /// Display modes added by the extensions.
    #[must_use]
    pub fn display_modes(&self) -> Vec<String> {
        let mut modes = Vec::new();
        for ext in &self.extensions {
            ext.display_modes(&mut modes);
        }
        modes
    }

    /// Selects a display mode after the extensions have reacted to it.
    pub fn set_display_mode(&mut self, mode: &str) {
        for ext in &mut self.extensions {
            ext.set_display_mode(mode, &mut self.state);
        }
        self.state.display_mode = Some(mode.to_string());
    }
}

/// Shows one document object.
///
/// Everything past the three required methods defaults to the extension
/// behavior collected by [`ViewProviderCore`].
pub trait ViewProvider: AsAny + fmt::Debug {
    /// Returns the shared core.
    fn core(&self) -> &ViewProviderCore;

    /// Returns the shared core mutably.
    fn core_mut(&mut self) -> &mut ViewProviderCore;

    /// Returns the registered type name.
    fn type_name(&self) -> &'static str;

    /// Returns the shown object, or `None` while detached or after removal.
    fn object<'a>(&self, ctx: &ViewContext<'a>) -> Option<&'a dyn DocumentObject> {
        ctx.document().object(self.core().state().object_id()?)
    }

    /// Returns the names of the objects shown as this object's children in
    /// the tree.
    fn claim_children(&self, ctx: &ViewContext<'_>) -> Vec<String> {
        self.core().claim_children(ctx)
    }

    /// Returns the names of the objects placed under this object's node in
    /// the 3D view.
    fn claim_children_3d(&self, ctx: &ViewContext<'_>) -> Vec<String> {
        self.core().claim_children_3d(ctx)
    }

    /// Reacts to a change of the shown object's property.
    fn update_data(&mut self, object: &dyn DocumentObject, property: &str) {
        self.core_mut().update_data(object, property);
    }

    /// Returns the display modes the provider offers.
    fn display_modes(&self) -> Vec<String> {
        self.core().display_modes()
    }

    /// Selects a display mode. Returns `false` for modes the provider does
    /// not offer.
    fn set_display_mode(&mut self, mode: &str) -> bool {
        if !self.display_modes().iter().any(|m| m == mode) {
            return false;
        }
        self.core_mut().set_display_mode(mode);
        true
    }
}

impl<'a> dyn ViewProvider + 'a {
    /// Returns the provider as `P` if it has that concrete type.
    #[must_use]
    pub fn downcast_ref<P: ViewProvider>(&self) -> Option<&P> {
        self.as_any().downcast_ref::<P>()
    }

    /// Returns the provider as `P`, mutably.
    #[must_use]
    pub fn downcast_mut<P: ViewProvider>(&mut self) -> Option<&mut P> {
        self.as_any_mut().downcast_mut::<P>()
    }
}
