// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paracore View: how document objects are shown.
//!
//! A [`GuiDocument`] keeps one [`ViewProvider`] per object of a
//! [`Document`](paracore_document::Document). Objects pick their provider by
//! name through `view_provider_name`; unknown names fall back to
//! [`ViewProviderDocumentObject`].
//!
//! ## Claimed children
//!
//! A provider claims the objects shown under it: in the tree with
//! [`ViewProvider::claim_children`], in 3D with
//! [`ViewProvider::claim_children_3d`]. A feature claims its base feature.
//! A geo-feature group claims its members in 3D, and in the tree only the
//! members no other member claims, in group order. The group keeps that list
//! in its `ClaimedChildren` property, rewritten only when it changes.
//!
//! ## Extensions
//!
//! Providers gain behavior from [`ViewProviderExtension`]s, which see the
//! provider's [`ViewState`]: transform, display and mask modes, and the mark
//! that the claimed children are out of date.
//!
//! ## Quick Start
//!
//! ```rust
//! use paracore_document::{Document, Feature, GeoFeatureGroup};
//! use paracore_property::PropertyContainerExt;
//! use paracore_view::GuiDocument;
//!
//! let mut doc = Document::new("Part");
//! let body = doc.add_object("Body", Box::new(GeoFeatureGroup::new()));
//! let pad = doc.add_object("Pad", Box::new(Feature::new()));
//! let pocket = doc.add_object("Pocket", Box::new(Feature::new()));
//! doc.object_mut(pocket)
//!     .unwrap()
//!     .set_value("BaseFeature", Some("Pad".to_string()))
//!     .unwrap();
//! doc.add_to_group(body, pad).unwrap();
//! doc.add_to_group(body, pocket).unwrap();
//!
//! let mut gui = GuiDocument::new();
//! gui.sync(&mut doc).unwrap();
//!
//! // The pocket shows the pad, so the body lists only the pocket.
//! assert_eq!(gui.claim_children(&doc, body), ["Pocket"]);
//! assert_eq!(gui.claim_children(&doc, pocket), ["Pad"]);
//! assert_eq!(gui.claim_children_3d(&doc, body), ["Pad", "Pocket"]);
//! ```

mod context;
mod error;
mod extension;
mod gui_document;
mod provider;
mod providers;
mod transform;
mod types;

pub use context::ViewContext;
pub use error::ViewError;
pub use extension::{GeoFeatureGroupViewExtension, ViewProviderExtension};
pub use gui_document::GuiDocument;
pub use provider::{ViewProvider, ViewProviderCore, ViewState};
pub use providers::{ViewProviderDocumentObject, ViewProviderFeature, ViewProviderGeoFeatureGroup};
pub use transform::Transform;
pub use types::{ViewProviderConstructor, ViewProviderTypes};
