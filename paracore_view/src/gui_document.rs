// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The view side of a document.

use hashbrown::HashMap;
use paracore_document::{Document, GeoFeatureGroupExtension, ObjectId};
use paracore_property::PropertyContainerExt;
use tracing::{debug, warn};

use crate::context::ViewContext;
use crate::error::ViewError;
use crate::extension::GeoFeatureGroupViewExtension;
use crate::provider::ViewProvider;
use crate::providers::ViewProviderDocumentObject;
use crate::types::ViewProviderTypes;

/// The view providers of one document, one per live object.
///
/// The document does not know its views. Call [`sync`](Self::sync) after
/// changing the document: it attaches providers to new objects, drops those
/// of removed objects, and forwards the recorded property changes.
#[derive(Debug)]
pub struct GuiDocument {
    types: ViewProviderTypes,
    providers: HashMap<ObjectId, Box<dyn ViewProvider>>,
}

impl Default for GuiDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl GuiDocument {
    /// Creates an empty view document with the built-in provider types.
    #[must_use]
    pub fn new() -> Self {
        Self::with_types(ViewProviderTypes::with_builtin())
    }

    /// Creates an empty view document with the given provider types.
    #[must_use]
    pub fn with_types(types: ViewProviderTypes) -> Self {
        Self {
            types,
            providers: HashMap::new(),
        }
    }

    /// Returns the provider types, for registering more.
    pub fn types_mut(&mut self) -> &mut ViewProviderTypes {
        &mut self.types
    }

    /// Returns the number of attached providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if no provider is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Returns the provider showing `id`.
    #[must_use]
    pub fn view_provider(&self, id: ObjectId) -> Option<&dyn ViewProvider> {
        self.providers.get(&id).map(|provider| &**provider)
    }

    /// Returns the provider showing `id`, mutably.
    pub fn view_provider_mut(&mut self, id: ObjectId) -> Option<&mut (dyn ViewProvider + 'static)> {
        self.providers.get_mut(&id).map(|provider| &mut **provider)
    }

    /// Returns the provider showing `id` as `P`.
    #[must_use]
    pub fn get<P: ViewProvider>(&self, id: ObjectId) -> Option<&P> {
        self.view_provider(id)?.downcast_ref::<P>()
    }

    /// Returns a lookup context over `document` and these views.
    #[must_use]
    pub fn context<'a>(&'a self, document: &'a Document) -> ViewContext<'a> {
        ViewContext::new(document, self)
    }

    /// Brings the views up to date with `document`.
    ///
    /// Returns the number of claimed-children caches that were rewritten.
    pub fn sync(&mut self, document: &mut Document) -> Result<usize, ViewError> {
        self.providers.retain(|&id, _| document.is_alive(id));
        for &id in document.ids() {
            if !self.providers.contains_key(&id) {
                self.attach(document, id);
            }
        }

        for (id, property) in document.take_changes() {
            let (Some(provider), Some(object)) = (self.providers.get_mut(&id), document.object(id))
            else {
                continue;
            };
            provider.update_data(object, &property);
        }

        let stale: Vec<ObjectId> = document
            .ids()
            .iter()
            .copied()
            .filter(|id| {
                self.providers
                    .get_mut(id)
                    .is_some_and(|provider| provider.core_mut().state_mut().take_claims_dirty())
            })
            .collect();
        let mut rewritten = 0;
        for id in stale {
            if self.refresh_claimed_children(document, id)? {
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    fn attach(&mut self, document: &Document, id: ObjectId) {
        let Some(object) = document.object(id) else {
            return;
        };
        let name = object.core().name();
        let wanted = object.view_provider_name();
        let mut provider = self.types.create(&wanted).unwrap_or_else(|| {
            warn!(object = %name, provider = %wanted, "unknown view provider type, using the default");
            Box::new(ViewProviderDocumentObject::new())
        });
        provider.core_mut().attach(id, name);
        for property in object.property_data().names() {
            provider.update_data(object, property);
        }
        debug!(object = %name, provider = provider.type_name(), "attached view provider");
        self.providers.insert(id, provider);
    }

    /// Returns the tree children of `id`.
    #[must_use]
    pub fn claim_children(&self, document: &Document, id: ObjectId) -> Vec<String> {
        self.view_provider(id)
            .map(|provider| provider.claim_children(&self.context(document)))
            .unwrap_or_default()
    }

    /// Returns the 3D children of `id`.
    #[must_use]
    pub fn claim_children_3d(&self, document: &Document, id: ObjectId) -> Vec<String> {
        self.view_provider(id)
            .map(|provider| provider.claim_children_3d(&self.context(document)))
            .unwrap_or_default()
    }

    /// Recomputes the claimed children of the geo-feature group `id` and
    /// writes them to its cache property if they changed.
    ///
    /// Returns `false` when nothing was written, including for objects that
    /// are not shown as geo-feature groups.
    pub fn refresh_claimed_children(
        &self,
        document: &mut Document,
        id: ObjectId,
    ) -> Result<bool, ViewError> {
        let provider = self.view_provider(id).ok_or(ViewError::NotFound(id))?;
        let Some(extension) = provider.core().extension::<GeoFeatureGroupViewExtension>() else {
            return Ok(false);
        };
        let claimed = extension.build_claimed_children(&self.context(document), provider.core().state());

        let object = document.object_mut(id).ok_or(ViewError::NotFound(id))?;
        if GeoFeatureGroupExtension::claimed_children(object.property_data()) == claimed {
            return Ok(false);
        }
        debug!(object = %object.core().name(), claimed = claimed.len(), "claimed children changed");
        object.set_values(
            GeoFeatureGroupExtension::CLAIMED_CHILDREN,
            claimed.into_iter().map(Some).collect(),
        )?;
        Ok(true)
    }
}
