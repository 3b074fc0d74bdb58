// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The property contract.
//!
//! A property is a named, typed value cell owned by a container. The value
//! itself lives in the concrete type; [`PropertyBase`] carries what every
//! property shares: the name assigned by the container, whether it is
//! attached, and the status bits.
//!
//! Properties never hold a pointer to their container. Every notifying
//! operation goes through [`PropertyContainerExt`](crate::PropertyContainerExt),
//! which has the container at hand and brackets the raw write with the
//! before/after notifications.

use core::any::Any;
use core::fmt;

use crate::error::{PersistError, PropertyError};
use crate::path::{PathValue, PropertyPath};
use crate::persist::{InputStream, OutputStream, Reader, Writer};
use crate::status::{PropertyStatus, PropertyType};

/// State shared by every property.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyBase {
    name: Option<String>,
    status: PropertyStatus,
    attached: bool,
}

impl PropertyBase {
    /// Creates an unnamed, detached base with no status bits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the name assigned by the container.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Assigns the name and marks the property attached.
    ///
    /// Called by [`PropertyData`](crate::PropertyData) when the property is
    /// added. The name is assigned exactly once.
    pub fn set_container(&mut self, name: &str) {
        debug_assert!(
            self.name.as_deref().is_none_or(|n| n == name),
            "property name is assigned once"
        );
        self.name = Some(name.to_string());
        self.attached = true;
    }

    /// Marks the property detached. The name is kept.
    pub fn detach(&mut self) {
        self.attached = false;
    }

    /// Returns `true` while a container owns the property.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Returns all status bits.
    #[must_use]
    pub fn status(&self) -> PropertyStatus {
        self.status
    }

    /// Returns `true` if all of `bits` are set.
    #[must_use]
    pub fn test_status(&self, bits: PropertyStatus) -> bool {
        self.status.contains(bits)
    }

    /// Sets the touched bit. Idempotent.
    pub fn touch(&mut self) {
        self.status.insert(PropertyStatus::TOUCHED);
    }

    /// Clears the touched bit.
    pub fn purge_touched(&mut self) {
        self.status.remove(PropertyStatus::TOUCHED);
    }

    /// Returns `true` if the value changed since the last recompute.
    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.status.contains(PropertyStatus::TOUCHED)
    }

    /// Replaces the runtime status bits with `status`.
    ///
    /// Bits in [`PropertyStatus::PROTECTED`] keep their current value.
    /// Returns `true` if a bit in [`PropertyStatus::SIGNALED`] flipped.
    pub fn set_status_value(&mut self, status: PropertyStatus) -> bool {
        let old = self.status;
        self.status = (status - PropertyStatus::PROTECTED) | (old & PropertyStatus::PROTECTED);
        !((old ^ self.status) & PropertyStatus::SIGNALED).is_empty()
    }

    /// Sets or clears runtime status bits.
    ///
    /// Returns `true` if a bit in [`PropertyStatus::SIGNALED`] flipped.
    pub fn set_status(&mut self, bits: PropertyStatus, on: bool) -> bool {
        let mut status = self.status;
        status.set(bits, on);
        self.set_status_value(status)
    }

    /// Replaces the structural type bits (except the dynamic bit).
    pub fn sync_type(&mut self, ty: PropertyType) {
        let keep = self.status - (PropertyStatus::PROTECTED | PropertyStatus::PROP_NO_PERSIST);
        let dynamic = self.status & PropertyStatus::PROP_DYNAMIC;
        self.status = keep | dynamic | ty.status_bits();
    }

    /// Sets or clears the dynamic bit.
    pub fn set_dynamic(&mut self, dynamic: bool) {
        self.status.set(PropertyStatus::PROP_DYNAMIC, dynamic);
    }

    /// Returns the structural type mask.
    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        self.status.property_type()
    }

    /// Returns `true` if the property was added at runtime.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.status.contains(PropertyStatus::PROP_DYNAMIC)
    }

    /// Returns `true` if either the runtime or structural read-only bit is set.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.status
            .intersects(PropertyStatus::READ_ONLY | PropertyStatus::PROP_READ_ONLY)
    }

    /// Returns `true` if either the runtime or structural hidden bit is set.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.status
            .intersects(PropertyStatus::HIDDEN | PropertyStatus::PROP_HIDDEN)
    }

    /// Returns `true` if the value is not written to the main stream.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.status
            .intersects(PropertyStatus::TRANSIENT | PropertyStatus::PROP_TRANSIENT)
    }

    /// Returns `true` if neither the value nor the declaration is written.
    #[must_use]
    pub fn is_no_persist(&self) -> bool {
        self.status.contains(PropertyStatus::PROP_NO_PERSIST)
    }

    /// Returns `true` if a change does not touch the owner.
    #[must_use]
    pub fn is_output(&self) -> bool {
        self.status
            .intersects(PropertyStatus::OUTPUT | PropertyStatus::PROP_OUTPUT)
    }

    /// Returns `true` if a change does not require a recompute.
    #[must_use]
    pub fn is_no_recompute(&self) -> bool {
        self.status
            .intersects(PropertyStatus::NO_RECOMPUTE | PropertyStatus::PROP_NO_RECOMPUTE)
    }

    /// Returns the dotted name `<owner>.<prefix><name>`.
    ///
    /// `owner` is the full name of the container, `None` when the property is
    /// not attached. An unnamed property yields `"None"` in script form and
    /// `"?"` otherwise; a named but detached property yields `"None"` in script
    /// form and its bare name otherwise.
    #[must_use]
    pub fn full_name(&self, owner: Option<&str>, prefix: &str, python: bool) -> String {
        let Some(name) = &self.name else {
            return if python { "None" } else { "?" }.to_string();
        };
        match owner.filter(|_| self.attached) {
            Some(owner) => format!("{owner}.{prefix}{name}"),
            None if python => "None".to_string(),
            None => name.clone(),
        }
    }

    /// Returns a side-file name derived from the full name.
    ///
    /// Everything up to and including a `#` (the document qualifier) is
    /// dropped.
    #[must_use]
    pub fn file_name(&self, owner: Option<&str>, postfix: &str, prefix: &str) -> String {
        let mut out = String::from(prefix);
        if self.name.is_none() {
            out.push_str("Property");
        } else {
            let full = self.full_name(owner, "", false);
            match full.split_once('#') {
                Some((_, rest)) => out.push_str(rest),
                None => out.push_str(&full),
            }
        }
        out.push_str(postfix);
        out
    }
}

/// Access to the concrete type behind a trait object.
///
/// Implemented for every `'static` type; property implementations get it for
/// free.
pub trait AsAny: Any {
    /// Returns `self` as [`Any`].
    fn as_any(&self) -> &dyn Any;

    /// Returns `self` as mutable [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A typed value cell owned by a container.
///
/// Every mutator on an implementation is raw: it changes the value and
/// nothing else. Use [`PropertyContainerExt`](crate::PropertyContainerExt)
/// to mutate an attached property so the container is notified.
pub trait Property: AsAny + fmt::Debug {
    /// Returns the shared state.
    fn base(&self) -> &PropertyBase;

    /// Returns the shared state mutably.
    fn base_mut(&mut self) -> &mut PropertyBase;

    /// Returns the registered type name, such as `PropertyIntegerList`.
    fn type_name(&self) -> &'static str;

    /// Returns the element name used in the main stream.
    ///
    /// This is the type name with a leading `Property` removed.
    fn xml_name(&self) -> &'static str {
        let name = self.type_name();
        name.strip_prefix("Property").unwrap_or(name)
    }

    /// Returns a detached copy holding the same value.
    fn copy_property(&self) -> Box<dyn Property>;

    /// Replaces the value with the value of `other`.
    ///
    /// Fails with [`PropertyError::TypeMismatch`] if `other` is a different
    /// type. Status bits are not copied.
    fn paste_from(&mut self, other: &dyn Property) -> Result<(), PropertyError>;

    /// Returns the value in dynamic form.
    fn to_path_value(&self) -> PathValue;

    /// Replaces the value from its dynamic form.
    fn set_from_path_value(&mut self, value: &PathValue) -> Result<(), PropertyError>;

    /// Returns the value addressed by `path`.
    ///
    /// The default treats the property as a single leaf.
    fn path_value(&self, path: &PropertyPath) -> Result<PathValue, PropertyError> {
        if path.is_root() {
            Ok(self.to_path_value())
        } else {
            Err(path.invalid())
        }
    }

    /// Replaces the value addressed by `path`.
    ///
    /// Either the whole write succeeds or the value is left unchanged.
    fn set_path_value(
        &mut self,
        path: &PropertyPath,
        value: &PathValue,
    ) -> Result<(), PropertyError> {
        if path.is_root() {
            self.set_from_path_value(value)
        } else {
            Err(path.invalid())
        }
    }

    /// Returns every path this property exposes.
    fn paths(&self) -> Vec<PropertyPath> {
        vec![PropertyPath::new(self.base().name().unwrap_or_default())]
    }

    /// Normalizes `path` to the form used as an expression binding key.
    fn canonical_path(&self, path: &PropertyPath) -> Result<PropertyPath, PropertyError> {
        Ok(path.clone())
    }

    /// Returns the names of the objects this property links to.
    fn link_targets(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Returns `true` if `other` has the same type and value.
    fn is_same(&self, other: &dyn Property) -> bool {
        self.type_name() == other.type_name() && self.to_path_value() == other.to_path_value()
    }

    /// Writes the property element to the main stream.
    fn save(&self, writer: &mut Writer);

    /// Reads the property element from the main stream.
    ///
    /// Returns `true` if the value changed.
    fn restore(&mut self, reader: &mut Reader) -> Result<bool, PersistError>;

    /// Writes the side file scheduled during [`save`](Self::save).
    fn save_doc_file(&self, _out: &mut OutputStream<'_>) {}

    /// Reads the side file requested during [`restore`](Self::restore).
    ///
    /// Returns `true` if the value changed.
    fn restore_doc_file(&mut self, _input: &mut InputStream<'_>) -> Result<bool, PersistError> {
        Ok(false)
    }
}

impl<'a> dyn Property + 'a {
    /// Returns the property as `P` if it has that concrete type.
    #[must_use]
    pub fn downcast_ref<P: Property>(&self) -> Option<&P> {
        self.as_any().downcast_ref()
    }

    /// Returns the property as `P` mutably if it has that concrete type.
    #[must_use]
    pub fn downcast_mut<P: Property>(&mut self) -> Option<&mut P> {
        self.as_any_mut().downcast_mut()
    }

    /// Returns `true` if the property has the concrete type `P`.
    #[must_use]
    pub fn is<P: Property>(&self) -> bool {
        self.as_any().is::<P>()
    }
}

/// Builds the error for a paste or downcast across property types.
pub(crate) fn mismatch(
    expected: &'static str,
    other: &dyn Property,
) -> PropertyError {
    PropertyError::TypeMismatch {
        name: other.base().name().unwrap_or_default().to_string(),
        expected,
        actual: other.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_assigned_once_and_attaches() {
        let mut base = PropertyBase::new();
        assert!(!base.is_attached());
        base.set_container("Length");
        assert_eq!(base.name(), Some("Length"));
        assert!(base.is_attached());
    }

    #[test]
    fn full_name_sentinels() {
        let mut base = PropertyBase::new();
        assert_eq!(base.full_name(None, "", true), "None");
        assert_eq!(base.full_name(None, "", false), "?");
        base.set_container("Length");
        assert_eq!(base.full_name(Some("Doc#Box"), "", false), "Doc#Box.Length");
        assert_eq!(base.full_name(Some("Doc#Box"), "Ext_", true), "Doc#Box.Ext_Length");
        base.detach();
        assert_eq!(base.full_name(Some("Doc#Box"), "", true), "None");
        assert_eq!(base.full_name(None, "", false), "Length");
        assert_eq!(base.full_name(Some("Doc#Box"), "Ext_", false), "Length");
    }

    #[test]
    fn file_name_drops_document_qualifier() {
        let mut base = PropertyBase::new();
        assert_eq!(base.file_name(None, ".bin", ""), "Property.bin");
        base.set_container("Values");
        assert_eq!(base.file_name(Some("Doc#Box"), ".bin", ""), "Box.Values.bin");
        assert_eq!(base.file_name(Some("Box"), ".txt", "x_"), "x_Box.Values.txt");
        base.detach();
        assert_eq!(base.file_name(None, ".bin", ""), "Values.bin");
    }

    #[test]
    fn raw_status_write_keeps_protected_bits() {
        let mut base = PropertyBase::new();
        base.set_dynamic(true);
        base.sync_type(PropertyType::HIDDEN);
        let flipped = base.set_status_value(PropertyStatus::READ_ONLY);
        assert!(flipped);
        assert!(base.is_dynamic());
        assert!(base.test_status(PropertyStatus::PROP_HIDDEN));
        assert!(base.test_status(PropertyStatus::READ_ONLY));
    }

    #[test]
    fn only_signaled_bits_report_a_flip() {
        let mut base = PropertyBase::new();
        assert!(!base.set_status(PropertyStatus::TRANSIENT, true));
        assert!(!base.set_status(PropertyStatus::OUTPUT, true));
        assert!(base.set_status(PropertyStatus::HIDDEN, true));
        assert!(!base.set_status(PropertyStatus::HIDDEN, true));
        assert!(base.set_status(PropertyStatus::HIDDEN, false));
    }

    #[test]
    fn touch_is_idempotent() {
        let mut base = PropertyBase::new();
        base.touch();
        let once = base.status();
        base.touch();
        assert_eq!(base.status(), once);
        base.purge_touched();
        assert!(!base.is_touched());
    }

    #[test]
    fn sync_type_replaces_type_bits_but_keeps_dynamic() {
        let mut base = PropertyBase::new();
        base.set_dynamic(true);
        base.sync_type(PropertyType::READ_ONLY | PropertyType::NO_PERSIST);
        base.sync_type(PropertyType::OUTPUT);
        assert!(base.is_dynamic());
        assert!(!base.is_no_persist());
        assert_eq!(base.property_type(), PropertyType::OUTPUT);
    }
}
