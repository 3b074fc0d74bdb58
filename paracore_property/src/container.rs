// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property containers and the change notification contract.
//!
//! This module provides [`PropertyData`], the name-indexed storage a container
//! owns, the [`PropertyContainer`] trait with its notification hooks, and
//! [`PropertyContainerExt`], which implements every notifying mutation on top
//! of the raw property API.
//!
//! ## Notification order
//!
//! Every mutation of an attached property runs:
//!
//! 1. validation (type, index, path); failure returns an error and emits
//!    nothing,
//! 2. [`PropertyContainer::on_before_change`],
//! 3. the raw write,
//! 4. [`PropertyContainer::on_changed`], then the touched bit is set.

use hashbrown::HashMap;

use crate::error::{PersistError, PropertyError};
use crate::list::{ListElement, PropertyList};
use crate::path::{PathValue, PropertyPath};
use crate::persist::{InputStream, Reader};
use crate::property::Property;
use crate::status::{PropertyStatus, PropertyType};
use crate::value::{PropertyValue, ScalarValue};

/// Declaration metadata for a property.
///
/// # Example
///
/// ```rust
/// use paracore_property::{PropertyInfo, PropertyType};
///
/// let info = PropertyInfo::new("Base")
///     .doc("The feature this one is built on")
///     .ty(PropertyType::HIDDEN);
/// assert_eq!(info.group, "Base");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyInfo {
    /// The editor group the property is listed under.
    pub group: String,
    /// Documentation shown in editors.
    pub doc: String,
    /// The structural type mask.
    pub ty: PropertyType,
}

impl PropertyInfo {
    /// Creates metadata in `group` with no documentation and no type bits.
    #[must_use]
    pub fn new(group: &str) -> Self {
        Self {
            group: group.to_string(),
            ..Self::default()
        }
    }

    /// Sets the documentation.
    #[must_use]
    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = doc.to_string();
        self
    }

    /// Sets the structural type mask.
    #[must_use]
    pub fn ty(mut self, ty: PropertyType) -> Self {
        self.ty = ty;
        self
    }
}

#[derive(Debug)]
struct Entry {
    name: String,
    property: Box<dyn Property>,
    info: PropertyInfo,
}

/// Name-indexed property storage, in declaration order.
#[derive(Debug, Default)]
pub struct PropertyData {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl PropertyData {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a statically declared property.
    pub fn add_static<P: Property>(
        &mut self,
        name: &str,
        property: P,
        info: PropertyInfo,
    ) -> Result<(), PropertyError> {
        self.insert(name, Box::new(property), info, false)
    }

    /// Adds a property at runtime.
    pub fn add_dynamic<P: Property>(
        &mut self,
        name: &str,
        property: P,
        info: PropertyInfo,
    ) -> Result<(), PropertyError> {
        self.insert(name, Box::new(property), info, true)
    }

    /// Adds a boxed property at runtime, typically one made by a
    /// [`PropertyTypes`](crate::PropertyTypes) factory.
    pub fn add_dynamic_boxed(
        &mut self,
        name: &str,
        property: Box<dyn Property>,
        info: PropertyInfo,
    ) -> Result<(), PropertyError> {
        self.insert(name, property, info, true)
    }

    fn insert(
        &mut self,
        name: &str,
        mut property: Box<dyn Property>,
        info: PropertyInfo,
        dynamic: bool,
    ) -> Result<(), PropertyError> {
        if self.index.contains_key(name) {
            return Err(PropertyError::Duplicate(name.to_string()));
        }
        let base = property.base_mut();
        base.set_container(name);
        base.sync_type(info.ty);
        base.set_dynamic(dynamic);
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push(Entry {
            name: name.to_string(),
            property,
            info,
        });
        Ok(())
    }

    /// Removes a dynamic property and returns it detached.
    pub fn remove_dynamic(&mut self, name: &str) -> Result<Box<dyn Property>, PropertyError> {
        let &slot = self
            .index
            .get(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?;
        if !self.entries[slot].property.base().is_dynamic() {
            return Err(PropertyError::NotDynamic(name.to_string()));
        }
        let mut entry = self.entries.remove(slot);
        self.index.remove(name);
        for i in self.index.values_mut() {
            if *i > slot {
                *i -= 1;
            }
        }
        entry.property.base_mut().detach();
        Ok(entry.property)
    }

    /// Returns `true` if a property with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the property with this name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Property> {
        let &slot = self.index.get(name)?;
        Some(&*self.entries[slot].property)
    }

    /// Returns the property with this name mutably.
    #[must_use]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut dyn Property> {
        let &slot = self.index.get(name)?;
        Some(&mut *self.entries[slot].property)
    }

    /// Returns the property with this name as `P`.
    pub fn get_as<P: Property>(&self, name: &str) -> Result<&P, PropertyError> {
        let property = self
            .get(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?;
        let actual = property.type_name();
        property
            .downcast_ref::<P>()
            .ok_or_else(|| Self::mismatch::<P>(name, actual))
    }

    /// Returns the property with this name as `P`, mutably.
    pub fn get_as_mut<P: Property>(&mut self, name: &str) -> Result<&mut P, PropertyError> {
        let property = self
            .get_mut(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?;
        let actual = property.type_name();
        property
            .downcast_mut::<P>()
            .ok_or_else(|| Self::mismatch::<P>(name, actual))
    }

    fn mismatch<P: Property>(name: &str, actual: &'static str) -> PropertyError {
        PropertyError::TypeMismatch {
            name: name.to_string(),
            expected: core::any::type_name::<P>(),
            actual,
        }
    }

    /// Iterates over `(name, property)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Property)> {
        self.entries
            .iter()
            .map(|entry| (entry.name.as_str(), &*entry.property))
    }

    /// Returns `true` if any property is touched.
    #[must_use]
    pub fn any_touched(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.property.base().is_touched())
    }

    /// Clears the touched bit of every property.
    pub fn purge_touched(&mut self) {
        for entry in &mut self.entries {
            entry.property.base_mut().purge_touched();
        }
    }

    /// Iterates over the names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Returns the declaration metadata of a property.
    #[must_use]
    pub fn info(&self, name: &str) -> Option<&PropertyInfo> {
        let &slot = self.index.get(name)?;
        Some(&self.entries[slot].info)
    }

    /// Returns the editor group of a property.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&str> {
        self.info(name).map(|info| info.group.as_str())
    }

    /// Returns the documentation of a property.
    #[must_use]
    pub fn documentation(&self, name: &str) -> Option<&str> {
        self.info(name).map(|info| info.doc.as_str())
    }
}

/// An object that owns properties and reacts to their changes.
///
/// # Example
///
/// ```rust
/// use paracore_property::{
///     PropertyContainer, PropertyContainerExt, PropertyData, PropertyInfo, PropertyInteger,
/// };
///
/// struct Counter {
///     data: PropertyData,
///     changes: usize,
/// }
///
/// impl PropertyContainer for Counter {
///     fn property_data(&self) -> &PropertyData {
///         &self.data
///     }
///
///     fn property_data_mut(&mut self) -> &mut PropertyData {
///         &mut self.data
///     }
///
///     fn container_name(&self) -> &str {
///         "Counter"
///     }
///
///     fn on_changed(&mut self, _name: &str) {
///         self.changes += 1;
///     }
/// }
///
/// let mut counter = Counter { data: PropertyData::new(), changes: 0 };
/// counter
///     .property_data_mut()
///     .add_static("Count", PropertyInteger::new(0), PropertyInfo::new("Base"))
///     .unwrap();
///
/// counter.set_value("Count", 2_i64).unwrap();
/// assert_eq!(counter.value::<i64>("Count").unwrap(), &2);
/// assert_eq!(counter.changes, 1);
/// ```
pub trait PropertyContainer {
    /// Returns the property storage.
    fn property_data(&self) -> &PropertyData;

    /// Returns the property storage mutably.
    fn property_data_mut(&mut self) -> &mut PropertyData;

    /// Returns the container's own name.
    fn container_name(&self) -> &str;

    /// Returns the qualified name used as the prefix of property full names.
    fn full_name(&self) -> String {
        self.container_name().to_string()
    }

    /// Returns the prefix placed before property names in full names.
    fn property_prefix(&self) -> &str {
        ""
    }

    /// Called before the named property changes.
    fn on_before_change(&mut self, _name: &str) {}

    /// Called after the named property changed.
    fn on_changed(&mut self, _name: &str) {}

    /// Called once per status write that flipped a read-only or hidden bit.
    fn on_property_status_changed(&mut self, _name: &str, _old: PropertyStatus) {}
}

/// Notifying operations on a [`PropertyContainer`].
pub trait PropertyContainerExt: PropertyContainer {
    /// Returns the named property.
    fn property(&self, name: &str) -> Result<&dyn Property, PropertyError> {
        self.property_data()
            .get(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))
    }

    /// Returns the named property as `P`.
    fn property_as<P: Property>(&self, name: &str) -> Result<&P, PropertyError> {
        self.property_data().get_as(name)
    }

    /// Returns the value of a single-valued property.
    fn value<T: ScalarValue>(&self, name: &str) -> Result<&T, PropertyError> {
        self.property_as::<PropertyValue<T>>(name)
            .map(PropertyValue::<T>::value)
    }

    /// Returns the elements of a list property.
    fn values<T: ListElement>(&self, name: &str) -> Result<&[T], PropertyError> {
        self.property_as::<PropertyList<T>>(name)
            .map(PropertyList::<T>::values)
    }

    /// Runs the before-change notification for the named property.
    fn about_to_set_value(&mut self, name: &str) {
        if self.property_data().contains(name) {
            self.on_before_change(name);
        }
    }

    /// Runs the changed notification, then sets the touched bit.
    fn has_set_value(&mut self, name: &str) {
        if let Some(property) = self.property_data_mut().get_mut(name) {
            property.base_mut().set_status(PropertyStatus::BUSY, true);
        }
        self.on_changed(name);
        if let Some(property) = self.property_data_mut().get_mut(name) {
            let base = property.base_mut();
            base.set_status(PropertyStatus::BUSY, false);
            base.touch();
        }
    }

    /// Changes the named property with `f`, bracketed by notifications.
    ///
    /// Once the before-change notification ran, the changed notification
    /// runs too, even if the property is gone by the time of the write.
    fn set_property<P: Property, R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut P) -> R,
    ) -> Result<R, PropertyError> {
        self.property_data().get_as::<P>(name)?;
        self.about_to_set_value(name);
        let result = self.property_data_mut().get_as_mut::<P>(name).map(f);
        self.has_set_value(name);
        result
    }

    /// Changes the named property with a fallible `f`.
    ///
    /// `f` runs on a copy first. If it fails, nothing is notified and the
    /// property is unchanged.
    fn try_set_property<P: Property + Clone, R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut P) -> Result<R, PropertyError>,
    ) -> Result<R, PropertyError> {
        let mut staged = self.property_data().get_as::<P>(name)?.clone();
        let result = f(&mut staged)?;
        self.about_to_set_value(name);
        let pasted = self
            .property_data_mut()
            .get_as_mut::<P>(name)
            .and_then(|property| property.paste_from(&staged));
        self.has_set_value(name);
        pasted.map(|()| result)
    }

    /// Replaces the value of a single-valued property.
    fn set_value<T: ScalarValue>(&mut self, name: &str, value: T) -> Result<(), PropertyError> {
        self.set_property::<PropertyValue<T>, _>(name, |p| p.set_value(value))
    }

    /// Replaces the elements of a list property.
    fn set_values<T: ListElement>(
        &mut self,
        name: &str,
        values: Vec<T>,
    ) -> Result<(), PropertyError> {
        self.set_property::<PropertyList<T>, _>(name, |p| p.set_values(values))
    }

    /// Applies a sparse patch to a list property.
    ///
    /// See [`PropertyList::apply_patch`]. A rejected patch emits nothing.
    fn patch_values<T: ListElement>(
        &mut self,
        name: &str,
        patch: impl IntoIterator<Item = (isize, T)>,
    ) -> Result<(), PropertyError> {
        self.try_set_property::<PropertyList<T>, _>(name, |p| p.apply_patch(patch))
    }

    /// Marks the property touched and notifies the container, without a
    /// value change.
    fn touch_property(&mut self, name: &str) -> Result<(), PropertyError> {
        self.property(name)?;
        self.has_set_value(name);
        Ok(())
    }

    /// Sets or clears runtime status bits on the named property.
    fn set_property_status(
        &mut self,
        name: &str,
        bits: PropertyStatus,
        on: bool,
    ) -> Result<(), PropertyError> {
        let mut status = self.property(name)?.base().status();
        status.set(bits, on);
        self.set_property_status_value(name, status)
    }

    /// Replaces the runtime status bits of the named property.
    ///
    /// Protected bits are kept. [`PropertyContainer::on_property_status_changed`]
    /// fires once if the read-only or hidden bit flipped.
    fn set_property_status_value(
        &mut self,
        name: &str,
        status: PropertyStatus,
    ) -> Result<(), PropertyError> {
        let property = self
            .property_data_mut()
            .get_mut(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?;
        let old = property.base().status();
        let flipped = property.base_mut().set_status_value(status);
        if flipped {
            self.on_property_status_changed(name, old);
        }
        Ok(())
    }

    /// Replaces the value of the named property with that of `source`.
    fn paste_property(&mut self, name: &str, source: &dyn Property) -> Result<(), PropertyError> {
        let target = self.property(name)?;
        if target.type_name() != source.type_name() {
            return Err(PropertyError::TypeMismatch {
                name: name.to_string(),
                expected: target.type_name(),
                actual: source.type_name(),
            });
        }
        self.about_to_set_value(name);
        if let Some(target) = self.property_data_mut().get_mut(name) {
            target.paste_from(source)?;
        }
        self.has_set_value(name);
        Ok(())
    }

    /// Returns the value addressed by `path`.
    fn path_value(&self, path: &PropertyPath) -> Result<PathValue, PropertyError> {
        self.property(path.property())?.path_value(path)
    }

    /// Writes the value addressed by `path`.
    ///
    /// The write is tried on a copy first; a rejected path or value emits
    /// nothing.
    fn set_path_value(&mut self, path: &PropertyPath, value: &PathValue) -> Result<(), PropertyError> {
        let name = path.property();
        let mut staged = self.property(name)?.copy_property();
        staged.set_path_value(path, value)?;
        self.paste_property(name, &*staged)
    }

    /// Restores the named property from the main stream.
    ///
    /// The document is loading, so no before-change notification is sent.
    /// The changed notification runs only if the value changed.
    fn restore_property(&mut self, name: &str, reader: &mut Reader) -> Result<(), PersistError> {
        let owner = self.full_name();
        reader.set_context(&owner, name);
        let changed = self
            .property_data_mut()
            .get_mut(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?
            .restore(reader)?;
        if changed {
            self.has_set_value(name);
        }
        Ok(())
    }

    /// Restores the named property from its side file.
    fn restore_property_doc_file(
        &mut self,
        name: &str,
        input: &mut InputStream<'_>,
    ) -> Result<(), PersistError> {
        let changed = self
            .property_data_mut()
            .get_mut(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?
            .restore_doc_file(input)?;
        if changed {
            self.has_set_value(name);
        }
        Ok(())
    }

    /// Returns the dotted full name of the named property.
    fn property_full_name(&self, name: &str, python: bool) -> Result<String, PropertyError> {
        let owner = self.full_name();
        Ok(self
            .property(name)?
            .base()
            .full_name(Some(&owner), self.property_prefix(), python))
    }

    /// Adds a dynamic property.
    fn add_dynamic_property(
        &mut self,
        name: &str,
        property: Box<dyn Property>,
        info: PropertyInfo,
    ) -> Result<(), PropertyError> {
        self.property_data_mut()
            .add_dynamic_boxed(name, property, info)
    }

    /// Removes a dynamic property.
    fn remove_dynamic_property(&mut self, name: &str) -> Result<Box<dyn Property>, PropertyError> {
        self.property_data_mut().remove_dynamic(name)
    }
}

impl<C: PropertyContainer + ?Sized> PropertyContainerExt for C {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::PropertyIntegerList;
    use crate::value::{PropertyFloat, PropertyInteger};

    #[derive(Default)]
    struct Recorder {
        data: PropertyData,
        events: Vec<String>,
    }

    impl PropertyContainer for Recorder {
        fn property_data(&self) -> &PropertyData {
            &self.data
        }

        fn property_data_mut(&mut self) -> &mut PropertyData {
            &mut self.data
        }

        fn container_name(&self) -> &str {
            "Recorder"
        }

        fn on_before_change(&mut self, name: &str) {
            self.events.push(format!("before {name}"));
            if name == "Scratch" {
                let _ = self.data.remove_dynamic(name);
            }
        }

        fn on_changed(&mut self, name: &str) {
            let touched = self.data.get(name).is_some_and(|p| p.base().is_touched());
            self.events.push(format!("changed {name} touched={touched}"));
        }

        fn on_property_status_changed(&mut self, name: &str, _old: PropertyStatus) {
            self.events.push(format!("status {name}"));
        }
    }

    fn recorder() -> Recorder {
        let mut r = Recorder::default();
        r.data
            .add_static("Count", PropertyInteger::new(0), PropertyInfo::new("Base"))
            .unwrap();
        r.data
            .add_static("Values", PropertyIntegerList::default(), PropertyInfo::new("Base"))
            .unwrap();
        r
    }

    #[test]
    fn set_value_brackets_the_write() {
        let mut r = recorder();
        r.set_value("Count", 5_i64).unwrap();
        assert_eq!(r.events, ["before Count", "changed Count touched=false"]);
        assert!(r.property("Count").unwrap().base().is_touched());
        assert!(!r
            .property("Count")
            .unwrap()
            .base()
            .test_status(PropertyStatus::BUSY));
    }

    #[test]
    fn type_mismatch_emits_nothing() {
        let mut r = recorder();
        assert!(matches!(
            r.set_value("Count", 1.0_f64),
            Err(PropertyError::TypeMismatch { .. })
        ));
        assert!(r.set_value("Missing", 1_i64).is_err());
        assert!(r.events.is_empty());
    }

    #[test]
    fn interrupted_writes_still_notify_the_change() {
        let mut r = recorder();
        r.data
            .add_dynamic("Scratch", PropertyInteger::new(0), PropertyInfo::new("Base"))
            .unwrap();
        assert!(r.set_value("Scratch", 1_i64).is_err());
        assert_eq!(r.events, ["before Scratch", "changed Scratch touched=false"]);

        r.events.clear();
        r.data
            .add_dynamic("Scratch", PropertyIntegerList::default(), PropertyInfo::new("Base"))
            .unwrap();
        assert!(r.patch_values("Scratch", [(0, 1_i64)]).is_err());
        assert_eq!(r.events, ["before Scratch", "changed Scratch touched=false"]);
        assert!(!r.data.contains("Scratch"));
    }

    #[test]
    fn rejected_patch_emits_nothing() {
        let mut r = recorder();
        assert!(r.patch_values("Values", [(1, 3_i64)]).is_err());
        assert!(r.events.is_empty());
        r.patch_values("Values", [(0, 3_i64), (-1, 4)]).unwrap();
        assert_eq!(r.values::<i64>("Values").unwrap(), &[3, 4]);
        assert_eq!(r.events.len(), 2);
    }

    #[test]
    fn status_callback_fires_once_per_write() {
        let mut r = recorder();
        r.set_property_status_value("Count", PropertyStatus::READ_ONLY | PropertyStatus::HIDDEN)
            .unwrap();
        assert_eq!(r.events, ["status Count"]);
        r.set_property_status("Count", PropertyStatus::TRANSIENT, true)
            .unwrap();
        r.set_property_status("Count", PropertyStatus::OUTPUT, true)
            .unwrap();
        assert_eq!(r.events.len(), 1);
    }

    #[test]
    fn touch_is_idempotent_and_notifies() {
        let mut r = recorder();
        r.touch_property("Count").unwrap();
        let status = r.property("Count").unwrap().base().status();
        r.touch_property("Count").unwrap();
        assert_eq!(r.property("Count").unwrap().base().status(), status);
        assert_eq!(r.events.len(), 2);
        assert!(r.events.iter().all(|e| e.starts_with("changed")));
    }

    #[test]
    fn paste_checks_type_before_notifying() {
        let mut r = recorder();
        assert!(r.paste_property("Count", &PropertyFloat::new(1.0)).is_err());
        assert!(r.events.is_empty());
        r.paste_property("Count", &PropertyInteger::new(9)).unwrap();
        assert_eq!(r.value::<i64>("Count").unwrap(), &9);
    }

    #[test]
    fn set_path_value_validates_first() {
        let mut r = recorder();
        let path = PropertyPath::parse("Values[4]").unwrap();
        assert!(r.set_path_value(&path, &serde_json::json!(1)).is_err());
        assert!(r.events.is_empty());
        let append = PropertyPath::parse("Values[-1]").unwrap();
        r.set_path_value(&append, &serde_json::json!(1)).unwrap();
        assert_eq!(r.values::<i64>("Values").unwrap(), &[1]);
    }

    #[test]
    fn dynamic_properties_can_be_removed() {
        let mut r = recorder();
        r.add_dynamic_property(
            "Extra",
            Box::new(PropertyInteger::new(1)),
            PropertyInfo::new("User").doc("extra"),
        )
        .unwrap();
        assert!(r.property("Extra").unwrap().base().is_dynamic());
        assert_eq!(r.property_data().documentation("Extra"), Some("extra"));
        assert!(matches!(
            r.remove_dynamic_property("Count"),
            Err(PropertyError::NotDynamic(_))
        ));
        let removed = r.remove_dynamic_property("Extra").unwrap();
        assert!(!removed.base().is_attached());
        assert_eq!(r.property_data().names().collect::<Vec<_>>(), ["Count", "Values"]);
    }

    #[test]
    fn full_names_use_the_container() {
        let r = recorder();
        assert_eq!(r.property_full_name("Count", false).unwrap(), "Recorder.Count");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut r = recorder();
        assert_eq!(
            r.data
                .add_static("Count", PropertyInteger::new(0), PropertyInfo::default()),
            Err(PropertyError::Duplicate("Count".into()))
        );
    }
}
