// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paracore Document: parametric objects and their recompute.
//!
//! A [`Document`] owns [`DocumentObject`]s. Each object is a property
//! container built on an [`ObjectCore`]; link properties between objects form
//! the dependency graph that [`Document::recompute`] walks.
//!
//! ## Recompute
//!
//! - Changing an input property touches the object.
//! - [`DocumentObject::must_execute`] asks whether the object needs to run.
//! - [`DocumentObject::execute`] recomputes the object's outputs and reports
//!   failure as an [`ExecError`]. Failures are per object; the pass goes on
//!   with everything that does not depend on the failed object.
//!
//! ## Extensions
//!
//! Objects gain behavior by attaching [`ObjectExtension`]s at construction.
//! [`GroupExtension`] lists member objects; [`GeoFeatureGroupExtension`]
//! adds a placement and the claimed-children cache used by the view layer.
//!
//! ## Persistence
//!
//! [`Document::save`] writes a [`SavedDocument`] with the settings from
//! `paracore_property`; [`Document::restore`] reads one back, creating
//! objects through the document's [`ObjectTypes`].
//!
//! ## Quick Start
//!
//! ```rust
//! use paracore_document::{Document, ExecError, Feature};
//! use paracore_property::PropertyContainerExt;
//!
//! let mut doc = Document::new("Part");
//! let pad = doc.add_object("Pad", Box::new(Feature::new()));
//! let pocket = doc.add_object("Pocket", Box::new(Feature::new()));
//! doc.object_mut(pocket)
//!     .unwrap()
//!     .set_value("BaseFeature", Some("Pad".to_string()))
//!     .unwrap();
//!
//! // The pad has neither a base nor a profile.
//! let report = doc.recompute();
//! assert_eq!(report.error(pad), Some(&ExecError::domain("Base property not set")));
//! assert_eq!(report.error(pocket), Some(&ExecError::Dependency("Pad".into())));
//!
//! doc.object_mut(pad)
//!     .unwrap()
//!     .set_values("Profile", vec![5.0])
//!     .unwrap();
//! assert!(doc.recompute().is_success());
//! assert_eq!(doc.get::<Feature>(pocket).unwrap().shape(), &[5.0, 10.0, 10.0]);
//! ```

mod document;
mod error;
mod extension;
mod feature;
mod graph;
mod id;
mod object;
mod store;
mod types;

pub use document::{Document, RecomputeReport, SavedDocument};
pub use error::{DocumentError, ExecError};
pub use extension::{GeoFeatureGroupExtension, GroupExtension, ObjectExtension};
pub use feature::{Feature, GeoFeatureGroup};
pub use id::ObjectId;
pub use object::{DocumentObject, ObjectCore, ObjectState, ObjectStatus};
pub use store::ExecContext;
pub use types::{ObjectConstructor, ObjectTypes};
