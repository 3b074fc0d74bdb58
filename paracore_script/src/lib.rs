// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paracore Script: script proxies for parametric objects.
//!
//! A script proxy is a [`ScriptObject`] stored in an object's `Proxy`
//! property. [`FeaturePython`] wraps a native object and lets the proxy
//! override any of a fixed set of [`Hook`]s: recompute, change notifications,
//! sub-object resolution, label and visibility queries. A hook the proxy
//! does not implement behaves exactly like the native object.
//!
//! ## Hooks
//!
//! Hooks are resolved by name when the proxy is assigned. While a hook runs
//! on an object it cannot be entered again on that object, unless the proxy
//! sets `__allow_recursive_<hook>`. Errors raised by a hook are logged and
//! treated as "no decision", except for `execute`, whose errors fail the
//! object's recompute.
//!
//! ## Runtime
//!
//! Script objects are shared with a process-wide runtime. Every access takes
//! the reentrant lock in [`interpreter`], which also holds the class registry
//! used to recreate proxies when a document is restored.
//!
//! ## Quick Start
//!
//! ```rust
//! use paracore_document::{Document, Feature};
//! use paracore_property::PropertyContainerExt;
//! use paracore_script::{FeaturePython, ScriptObject, ScriptValue};
//!
//! let proxy = ScriptObject::new("demo", "Stamp").with_method("execute", |call| {
//!     let shape = ScriptValue::from(vec![1.0, 2.0]);
//!     call.target_mut()?.write("Shape", &shape)?;
//!     Ok(ScriptValue::Null)
//! });
//!
//! let mut stamp = FeaturePython::<Feature>::default();
//! stamp.set_proxy(Some(proxy)).unwrap();
//!
//! let mut doc = Document::new("Part");
//! paracore_script::register_types(&mut doc);
//! let id = doc.add_object("Stamp", Box::new(stamp));
//!
//! // The native feature has no profile and would fail; the proxy runs instead.
//! assert!(doc.recompute().is_success());
//! let stamp = doc.get::<FeaturePython<Feature>>(id).unwrap();
//! assert_eq!(stamp.values::<f64>("Shape").unwrap(), &[1.0, 2.0]);
//! ```

mod bridge;
mod error;
mod feature_python;
pub mod interpreter;
mod object;
mod proxy;

pub use bridge::{Hook, HookCall, HookGuard, HookSet, ProxyBridge};
pub use error::ScriptError;
pub use feature_python::{FeaturePython, ScriptedType, register_types};
pub use object::{HookTarget, ScriptAttr, ScriptCall, ScriptFn, ScriptObject, ScriptValue, truthy};
pub use proxy::PropertyProxy;
