// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Document objects: the shared core and the recompute contract.

use core::fmt;

use paracore_property::{
    AsAny, Property, PropertyContainer, PropertyData, PropertyError, PropertyInfo, PropertyString,
    PropertyType,
};

use crate::error::ExecError;
use crate::extension::ObjectExtension;
use crate::store::ExecContext;

bitflags::bitflags! {
    /// Object-level status bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ObjectStatus: u8 {
        /// An input changed since the last successful execution.
        const TOUCHED = 1 << 0;
        /// The last execution failed.
        const ERROR = 1 << 1;
        /// The object is executing.
        const RECOMPUTING = 1 << 2;
        /// The object is being read from a saved document.
        const RESTORING = 1 << 3;
        /// The object has not executed since it was added.
        const NEW = 1 << 4;
    }
}

/// Recompute state derived from [`ObjectStatus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectState {
    /// Up to date.
    Clean,
    /// Needs to execute.
    Touched,
    /// Executing now.
    Executing,
    /// The last execution failed.
    Error,
}

/// State every document object carries.
///
/// The core owns the object's properties, starting with `Label`, and the
/// extensions attached to it. Concrete objects embed one and forward their
/// [`PropertyContainer`] hooks to [`before_change`](Self::before_change) and
/// [`changed`](Self::changed).
#[derive(Debug)]
pub struct ObjectCore {
    name: String,
    document: String,
    status: ObjectStatus,
    properties: PropertyData,
    extensions: Vec<Box<dyn ObjectExtension>>,
    changes: Vec<String>,
    snapshot: Option<Vec<(String, Box<dyn Property>)>>,
    error: Option<String>,
}

impl Default for ObjectCore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectCore {
    /// The user-visible name property.
    pub const LABEL: &'static str = "Label";

    /// Creates a touched core holding only the `Label` property.
    #[must_use]
    pub fn new() -> Self {
        let mut properties = PropertyData::new();
        let added = properties.add_static(
            Self::LABEL,
            PropertyString::default(),
            PropertyInfo::new("Base")
                .doc("User name of the object")
                .ty(PropertyType::OUTPUT),
        );
        debug_assert!(added.is_ok(), "fresh storage holds no label");
        Self {
            name: String::new(),
            document: String::new(),
            status: ObjectStatus::NEW | ObjectStatus::TOUCHED,
            properties,
            extensions: Vec::new(),
            changes: Vec::new(),
            snapshot: None,
            error: None,
        }
    }

    /// Returns the object name, unique within its document.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the owning document.
    #[must_use]
    pub fn document_name(&self) -> &str {
        &self.document
    }

    /// Returns `Document#Name`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}#{}", self.document, self.name)
    }

    /// Returns the label, falling back to the name.
    #[must_use]
    pub fn label(&self) -> &str {
        match self.properties.get_as::<PropertyString>(Self::LABEL) {
            Ok(label) if !label.value().is_empty() => label.value(),
            _ => &self.name,
        }
    }

    pub(crate) fn attach(&mut self, document: &str, name: &str) {
        document.clone_into(&mut self.document);
        name.clone_into(&mut self.name);
        if let Ok(label) = self.properties.get_as_mut::<PropertyString>(Self::LABEL) {
            if label.value().is_empty() {
                label.set_value(name.to_string());
            }
        }
    }

    /// Returns the status bits.
    #[must_use]
    pub fn status(&self) -> ObjectStatus {
        self.status
    }

    /// Returns `true` if all of `bits` are set.
    #[must_use]
    pub fn test_status(&self, bits: ObjectStatus) -> bool {
        self.status.contains(bits)
    }

    /// Sets or clears status bits.
    pub fn set_status(&mut self, bits: ObjectStatus, on: bool) {
        self.status.set(bits, on);
    }

    /// Returns the derived recompute state.
    #[must_use]
    pub fn state(&self) -> ObjectState {
        if self.status.contains(ObjectStatus::RECOMPUTING) {
            ObjectState::Executing
        } else if self.status.contains(ObjectStatus::ERROR) {
            ObjectState::Error
        } else if self.status.contains(ObjectStatus::TOUCHED) {
            ObjectState::Touched
        } else {
            ObjectState::Clean
        }
    }

    /// Returns `true` if the object needs to execute.
    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.status.contains(ObjectStatus::TOUCHED)
    }

    /// Marks the object as needing to execute.
    pub fn touch(&mut self) {
        self.status.insert(ObjectStatus::TOUCHED);
    }

    /// Clears the object's touched, error and new bits and the touched bit
    /// of every property.
    pub fn purge_touched(&mut self) {
        self.status
            .remove(ObjectStatus::TOUCHED | ObjectStatus::ERROR | ObjectStatus::NEW);
        self.error = None;
        self.properties.purge_touched();
    }

    /// Returns the message of the last failed execution.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.status.insert(ObjectStatus::ERROR);
        self.error = Some(message);
    }

    /// Returns the property storage.
    #[must_use]
    pub fn properties(&self) -> &PropertyData {
        &self.properties
    }

    /// Returns the property storage mutably.
    pub fn properties_mut(&mut self) -> &mut PropertyData {
        &mut self.properties
    }

    /// Attaches an extension and lets it add its properties.
    pub fn add_extension<E: ObjectExtension>(&mut self, mut extension: E) -> Result<(), PropertyError> {
        extension.init(&mut self.properties)?;
        self.extensions.push(Box::new(extension));
        Ok(())
    }

    /// Returns the attached extension of type `E`.
    #[must_use]
    pub fn extension<E: ObjectExtension>(&self) -> Option<&E> {
        self.extensions.iter().find_map(|ext| ext.downcast_ref::<E>())
    }

    /// Returns the attached extension of type `E`, mutably.
    pub fn extension_mut<E: ObjectExtension>(&mut self) -> Option<&mut E> {
        self.extensions
            .iter_mut()
            .find_map(|ext| ext.downcast_mut::<E>())
    }

    /// Returns `true` if an extension of type `E` is attached.
    #[must_use]
    pub fn has_extension<E: ObjectExtension>(&self) -> bool {
        self.extension::<E>().is_some()
    }

    /// Iterates over the attached extensions in attachment order.
    pub fn extensions(&self) -> impl Iterator<Item = &dyn ObjectExtension> {
        self.extensions.iter().map(|ext| &**ext)
    }

    /// The default recompute query: the object is touched or an extension
    /// asks for execution.
    #[must_use]
    pub fn must_execute(&self) -> bool {
        self.is_touched()
            || self
                .extensions
                .iter()
                .any(|ext| ext.must_execute(&self.properties))
    }

    /// Runs every extension's execute hook, stopping at the first failure.
    pub fn execute_extensions(&mut self, ctx: &ExecContext<'_>) -> Result<(), ExecError> {
        for ext in &mut self.extensions {
            ext.execute(&mut self.properties, ctx)?;
        }
        Ok(())
    }

    /// Returns the sub-object names reported by the extensions.
    #[must_use]
    pub fn sub_objects(&self) -> Vec<String> {
        self.extensions
            .iter()
            .find_map(|ext| ext.sub_objects(&self.properties))
            .unwrap_or_default()
    }

    /// Resolves the first segment of a dotted sub-name.
    ///
    /// An empty sub-name resolves to the object itself.
    #[must_use]
    pub fn sub_object(&self, sub_name: &str) -> Option<String> {
        let first = sub_name.split('.').next().unwrap_or_default();
        if first.is_empty() {
            return Some(self.name.clone());
        }
        self.sub_objects().into_iter().find(|name| name == first)
    }

    /// Returns whether the extensions report child elements.
    #[must_use]
    pub fn has_child_element(&self) -> bool {
        self.extensions
            .iter()
            .find_map(|ext| ext.has_child_element(&self.properties))
            .unwrap_or(false)
    }

    /// Before-change hook: records the old value while a transaction is open.
    pub fn before_change(&mut self, name: &str) {
        let Some(snapshot) = self.snapshot.as_mut() else {
            return;
        };
        if snapshot.iter().any(|(recorded, _)| recorded == name) {
            return;
        }
        if let Some(property) = self.properties.get(name) {
            snapshot.push((name.to_string(), property.copy_property()));
        }
    }

    /// Changed hook: touches the object for input properties, records the
    /// change, and forwards it to the extensions.
    ///
    /// Output and no-recompute properties never touch the object, and nothing
    /// touches it while it is restoring.
    pub fn changed(&mut self, name: &str) {
        let input = self.properties.get(name).is_some_and(|property| {
            let base = property.base();
            !base.is_output() && !base.is_no_recompute()
        });
        if input && !self.status.contains(ObjectStatus::RESTORING) {
            self.status.insert(ObjectStatus::TOUCHED);
        }
        if !self.changes.iter().any(|change| change == name) {
            self.changes.push(name.to_string());
        }
        for ext in &mut self.extensions {
            ext.on_changed(&mut self.properties, name);
        }
    }

    /// Takes the names of the properties changed since the last call, in
    /// order of first change.
    pub fn take_changes(&mut self) -> Vec<String> {
        core::mem::take(&mut self.changes)
    }

    pub(crate) fn begin_transaction(&mut self) {
        self.snapshot = Some(Vec::new());
    }

    pub(crate) fn end_transaction(&mut self) -> Vec<(String, Box<dyn Property>)> {
        self.snapshot.take().unwrap_or_default()
    }
}

/// An object in a [`Document`](crate::Document).
///
/// Implementors embed an [`ObjectCore`] and implement [`PropertyContainer`]
/// by forwarding to it. Everything past the three required methods has a
/// native default that a script proxy may override.
///
/// # Example
///
/// ```rust
/// use paracore_document::{DocumentObject, ExecContext, ExecError, ObjectCore};
/// use paracore_property::{PropertyContainer, PropertyData};
///
/// #[derive(Debug, Default)]
/// struct Marker {
///     core: ObjectCore,
/// }
///
/// impl PropertyContainer for Marker {
///     fn property_data(&self) -> &PropertyData {
///         self.core.properties()
///     }
///
///     fn property_data_mut(&mut self) -> &mut PropertyData {
///         self.core.properties_mut()
///     }
///
///     fn container_name(&self) -> &str {
///         self.core.name()
///     }
///
///     fn full_name(&self) -> String {
///         self.core.full_name()
///     }
///
///     fn on_before_change(&mut self, name: &str) {
///         self.core.before_change(name);
///     }
///
///     fn on_changed(&mut self, name: &str) {
///         self.core.changed(name);
///     }
/// }
///
/// impl DocumentObject for Marker {
///     fn core(&self) -> &ObjectCore {
///         &self.core
///     }
///
///     fn core_mut(&mut self) -> &mut ObjectCore {
///         &mut self.core
///     }
///
///     fn type_name(&self) -> &'static str {
///         "Marker"
///     }
/// }
///
/// let marker = Marker::default();
/// assert!(marker.must_execute());
/// assert_eq!(marker.linked_object(false), Some(String::new()));
/// ```
pub trait DocumentObject: PropertyContainer + AsAny + fmt::Debug {
    /// Returns the shared core.
    fn core(&self) -> &ObjectCore;

    /// Returns the shared core mutably.
    fn core_mut(&mut self) -> &mut ObjectCore;

    /// Returns the registered type name, written to saved documents.
    fn type_name(&self) -> &'static str;

    /// Returns `true` if the object must execute in the next recompute.
    ///
    /// This is a pure query.
    fn must_execute(&self) -> bool {
        self.core().must_execute()
    }

    /// Recomputes the object's outputs from its inputs.
    fn execute(&mut self, ctx: &ExecContext<'_>) -> Result<(), ExecError> {
        self.core_mut().execute_extensions(ctx)
    }

    /// Returns the name of the view provider type that shows this object.
    fn view_provider_name(&self) -> String {
        "ViewProviderDocumentObject".to_string()
    }

    /// Resolves a dotted sub-name to an object name.
    fn sub_object(&self, sub_name: &str) -> Option<String> {
        self.core().sub_object(sub_name)
    }

    /// Returns the names of the object's sub-objects.
    fn sub_objects(&self) -> Vec<String> {
        self.core().sub_objects()
    }

    /// Returns the object a link resolves to. Plain objects resolve to
    /// themselves.
    fn linked_object(&self, _recursive: bool) -> Option<String> {
        Some(self.core().name().to_string())
    }

    /// Returns whether link objects may expose this object's properties.
    fn can_link_properties(&self) -> bool {
        true
    }

    /// Returns whether another object may carry the same label.
    fn allow_duplicate_label(&self) -> bool {
        false
    }

    /// Returns a replacement sub-name when selecting through `top`.
    fn redirect_sub_name(&self, _sub_name: &str, _top: &str) -> Option<String> {
        None
    }

    /// Returns whether the object can be loaded without its dependencies.
    fn can_load_partial(&self) -> i32 {
        0
    }

    /// Returns whether the object has child elements.
    fn has_child_element(&self) -> bool {
        self.core().has_child_element()
    }

    /// Returns the visibility of a child element, or `-1` if unsupported.
    fn is_element_visible(&self, _element: &str) -> i32 {
        -1
    }

    /// Sets the visibility of a child element, or returns `-1` if
    /// unsupported.
    fn set_element_visible(&mut self, _element: &str, _visible: bool) -> i32 {
        -1
    }

    /// Called before the label changes; may rewrite the new label.
    fn on_before_change_label(&mut self, _label: &mut String) {}

    /// Called once the whole document has been restored.
    fn on_document_restored(&mut self) {}
}

impl<'a> dyn DocumentObject + 'a {
    /// Returns the object as `T` if it has that concrete type.
    #[must_use]
    pub fn downcast_ref<T: DocumentObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Returns the object as `T`, mutably.
    #[must_use]
    pub fn downcast_mut<T: DocumentObject>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}
