// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The document: object ownership, naming, transactions, and change routing.

mod persist;
mod recompute;

pub use persist::SavedDocument;
pub use recompute::RecomputeReport;

use paracore_property::{PropertyContainerExt, PropertyString, PropertyTypes};
use tracing::{debug, warn};

use crate::error::DocumentError;
use crate::extension::{GeoFeatureGroupExtension, GroupExtension};
use crate::id::ObjectId;
use crate::object::{DocumentObject, ObjectCore};
use crate::store::ObjectStore;
use crate::types::ObjectTypes;

#[derive(Debug)]
struct Transaction {
    name: String,
    added: Vec<ObjectId>,
    removed: Vec<Box<dyn DocumentObject>>,
}

/// A named collection of objects that recompute together.
///
/// Objects are addressed by [`ObjectId`] for fast access and by name for
/// links and persistence. Names are unique and never change; labels are the
/// user-facing names and are kept unique unless the object allows
/// duplicates.
///
/// # Example
///
/// ```rust
/// use paracore_document::{Document, Feature};
/// use paracore_property::PropertyContainerExt;
///
/// let mut doc = Document::new("Part");
/// let base = doc.add_object("Pad", Box::new(Feature::new()));
/// doc.object_mut(base)
///     .unwrap()
///     .set_values("Profile", vec![1.0, 2.0])
///     .unwrap();
///
/// let report = doc.recompute();
/// assert!(report.is_success());
/// assert_eq!(
///     doc.object(base).unwrap().values::<f64>("Shape").unwrap(),
///     &[1.0, 2.0, 10.0]
/// );
/// ```
#[derive(Debug)]
pub struct Document {
    name: String,
    store: ObjectStore,
    types: ObjectTypes,
    property_types: PropertyTypes,
    transaction: Option<Transaction>,
}

impl Document {
    /// Creates an empty document that knows the built-in object and property
    /// types.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self::with_types(name, ObjectTypes::with_builtin())
    }

    /// Creates an empty document with its own object type registry.
    #[must_use]
    pub fn with_types(name: &str, types: ObjectTypes) -> Self {
        Self {
            name: name.to_string(),
            store: ObjectStore::default(),
            types,
            property_types: PropertyTypes::with_builtin(),
            transaction: None,
        }
    }

    /// Returns the document name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the object type registry.
    #[must_use]
    pub fn types(&self) -> &ObjectTypes {
        &self.types
    }

    /// Returns the object type registry mutably.
    pub fn types_mut(&mut self) -> &mut ObjectTypes {
        &mut self.types
    }

    /// Returns the property type registry used for dynamic properties.
    pub fn property_types_mut(&mut self) -> &mut PropertyTypes {
        &mut self.property_types
    }

    /// Adds an object under a unique name derived from `name`.
    ///
    /// The name is reduced to identifier characters; if it is taken, a
    /// three-digit counter replaces any trailing digits.
    pub fn add_object(&mut self, name: &str, mut object: Box<dyn DocumentObject>) -> ObjectId {
        let name = unique_name(&sanitize(name), |candidate| {
            self.store.contains_name(candidate)
        });
        object.core_mut().attach(&self.name, &name);
        if !object.allow_duplicate_label() {
            let label = object.core().label().to_string();
            let unique = unique_name(&label, |candidate| self.label_taken(None, candidate));
            if unique != label {
                if let Ok(property) = object
                    .core_mut()
                    .properties_mut()
                    .get_as_mut::<PropertyString>(ObjectCore::LABEL)
                {
                    property.set_value(unique);
                }
            }
        }
        let id = self.store.insert(object);
        if let Some(transaction) = &mut self.transaction {
            transaction.added.push(id);
        }
        debug!(document = %self.name, object = %name, "added object");
        id
    }

    /// Creates an object of a registered type and adds it.
    pub fn add_new(&mut self, type_name: &str, name: &str) -> Result<ObjectId, DocumentError> {
        let object = self.types.create(type_name)?;
        Ok(self.add_object(name, object))
    }

    /// Removes an object and drops it from every group that lists it.
    ///
    /// Inside a transaction the object is kept so that an abort can bring it
    /// back.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<(), DocumentError> {
        let object = self.store.remove(id).ok_or(DocumentError::NotFound(id))?;
        let name = object.core().name().to_string();
        for other in self.store.ids().to_vec() {
            let Some(group) = self.store.get_mut(other) else {
                continue;
            };
            if !GroupExtension::has_member(group.property_data(), &name) {
                continue;
            }
            GroupExtension::remove_member(group, &name)?;
        }
        debug!(document = %self.name, object = %name, "removed object");
        if let Some(transaction) = &mut self.transaction {
            transaction.removed.push(object);
        }
        Ok(())
    }

    /// Returns `true` if `id` refers to a live object.
    #[must_use]
    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.store.is_alive(id)
    }

    /// Returns the number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if the document has no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Returns the object ids in insertion order.
    #[must_use]
    pub fn ids(&self) -> &[ObjectId] {
        self.store.ids()
    }

    /// Iterates over the objects in insertion order.
    pub fn objects(&self) -> impl Iterator<Item = &dyn DocumentObject> {
        self.store.ids().iter().filter_map(|&id| self.store.get(id))
    }

    /// Returns the object with this id.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&dyn DocumentObject> {
        self.store.get(id)
    }

    /// Returns the object with this id mutably.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut (dyn DocumentObject + 'static)> {
        self.store.get_mut(id)
    }

    /// Returns the object with this id as `T`.
    #[must_use]
    pub fn get<T: DocumentObject>(&self, id: ObjectId) -> Option<&T> {
        self.store.get(id)?.downcast_ref::<T>()
    }

    /// Returns the object with this id as `T`, mutably.
    pub fn get_mut<T: DocumentObject>(&mut self, id: ObjectId) -> Option<&mut T> {
        self.store.get_mut(id)?.downcast_mut::<T>()
    }

    /// Returns the id of the named object.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<ObjectId> {
        self.store.id_of(name)
    }

    /// Returns the named object.
    #[must_use]
    pub fn object_by_name(&self, name: &str) -> Option<&dyn DocumentObject> {
        self.store.by_name(name)
    }

    /// Returns the objects that `id` links to, in property order.
    #[must_use]
    pub fn out_list(&self, id: ObjectId) -> Vec<ObjectId> {
        let Some(object) = self.store.get(id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (_, property) in object.property_data().iter() {
            for target in property.link_targets() {
                if let Some(target) = self.store.id_of(target) {
                    if target != id && !out.contains(&target) {
                        out.push(target);
                    }
                }
            }
        }
        out
    }

    /// Returns the objects that link to `id`, in insertion order.
    #[must_use]
    pub fn in_list(&self, id: ObjectId) -> Vec<ObjectId> {
        self.store
            .ids()
            .iter()
            .copied()
            .filter(|&other| other != id && self.out_list(other).contains(&id))
            .collect()
    }

    /// Adds `member` to the group `group`.
    ///
    /// An object belongs to at most one geo-feature group: adding it to one
    /// removes it from any other. Returns `false` if it was already a member.
    pub fn add_to_group(&mut self, group: ObjectId, member: ObjectId) -> Result<bool, DocumentError> {
        let member_name = self
            .store
            .get(member)
            .ok_or(DocumentError::NotFound(member))?
            .core()
            .name()
            .to_string();
        let target = self.store.get(group).ok_or(DocumentError::NotFound(group))?;
        if !target.property_data().contains(GroupExtension::GROUP) {
            return Err(DocumentError::NotAGroup(target.core().name().to_string()));
        }
        if target.core().has_extension::<GeoFeatureGroupExtension>() {
            for other in self.store.ids().to_vec() {
                if other == group {
                    continue;
                }
                let Some(object) = self.store.get_mut(other) else {
                    continue;
                };
                if object.core().has_extension::<GeoFeatureGroupExtension>() {
                    GroupExtension::remove_member(object, &member_name)?;
                }
            }
        }
        let target = self
            .store
            .get_mut(group)
            .ok_or(DocumentError::NotFound(group))?;
        Ok(GroupExtension::add_member(target, &member_name)?)
    }

    /// Returns the geo-feature group that lists the named object.
    #[must_use]
    pub fn geo_feature_group_of(&self, name: &str) -> Option<ObjectId> {
        self.store.ids().iter().copied().find(|&id| {
            self.store.get(id).is_some_and(|object| {
                object.core().has_extension::<GeoFeatureGroupExtension>()
                    && GroupExtension::has_member(object.property_data(), name)
            })
        })
    }

    /// Changes an object's label.
    ///
    /// The object may rewrite the label first. Unless it allows duplicates,
    /// a label used by another object gets a numeric suffix. Returns the
    /// label that was set.
    pub fn set_label(&mut self, id: ObjectId, label: &str) -> Result<String, DocumentError> {
        let mut label = label.to_string();
        let object = self.store.get_mut(id).ok_or(DocumentError::NotFound(id))?;
        object.on_before_change_label(&mut label);
        if !object.allow_duplicate_label() {
            label = unique_name(&label, |candidate| self.label_taken(Some(id), candidate));
        }
        let object = self.store.get_mut(id).ok_or(DocumentError::NotFound(id))?;
        object.set_value(ObjectCore::LABEL, label.clone())?;
        Ok(label)
    }

    fn label_taken(&self, except: Option<ObjectId>, label: &str) -> bool {
        self.store.ids().iter().any(|&other| {
            Some(other) != except
                && self
                    .store
                    .get(other)
                    .is_some_and(|object| object.core().label() == label)
        })
    }

    /// Drains the property changes recorded since the last call, object by
    /// object in insertion order.
    pub fn take_changes(&mut self) -> Vec<(ObjectId, String)> {
        let mut changes = Vec::new();
        for id in self.store.ids().to_vec() {
            if let Some(object) = self.store.get_mut(id) {
                changes.extend(
                    object
                        .core_mut()
                        .take_changes()
                        .into_iter()
                        .map(|name| (id, name)),
                );
            }
        }
        changes
    }

    /// Opens a transaction. Property changes from here on can be undone with
    /// [`abort_transaction`](Self::abort_transaction).
    pub fn open_transaction(&mut self, name: &str) -> Result<(), DocumentError> {
        if let Some(transaction) = &self.transaction {
            return Err(DocumentError::TransactionOpen(transaction.name.clone()));
        }
        for id in self.store.ids().to_vec() {
            if let Some(object) = self.store.get_mut(id) {
                object.core_mut().begin_transaction();
            }
        }
        self.transaction = Some(Transaction {
            name: name.to_string(),
            added: Vec::new(),
            removed: Vec::new(),
        });
        debug!(document = %self.name, transaction = name, "opened transaction");
        Ok(())
    }

    /// Returns the name of the open transaction.
    #[must_use]
    pub fn transaction_name(&self) -> Option<&str> {
        self.transaction.as_ref().map(|t| t.name.as_str())
    }

    /// Keeps every change made in the open transaction and returns its name.
    pub fn commit_transaction(&mut self) -> Result<String, DocumentError> {
        let transaction = self.transaction.take().ok_or(DocumentError::NoTransaction)?;
        for id in self.store.ids().to_vec() {
            if let Some(object) = self.store.get_mut(id) {
                object.core_mut().end_transaction();
            }
        }
        debug!(document = %self.name, transaction = %transaction.name, "committed transaction");
        Ok(transaction.name)
    }

    /// Undoes the open transaction and returns its name.
    ///
    /// Objects added in the transaction are removed, removed objects come
    /// back (with new ids, at the end of the insertion order), and changed
    /// properties get their old values back through the normal change
    /// notifications.
    pub fn abort_transaction(&mut self) -> Result<String, DocumentError> {
        let transaction = self.transaction.take().ok_or(DocumentError::NoTransaction)?;
        for &id in transaction.added.iter().rev() {
            self.store.remove(id);
        }
        for object in transaction.removed.into_iter().rev() {
            self.store.insert(object);
        }
        for id in self.store.ids().to_vec() {
            let Some(object) = self.store.get_mut(id) else {
                continue;
            };
            let snapshot = object.core_mut().end_transaction();
            for (name, old) in snapshot.into_iter().rev() {
                if let Err(err) = object.paste_property(&name, &*old) {
                    warn!(object = %object.core().name(), property = %name, %err, "cannot undo change");
                }
            }
        }
        debug!(document = %self.name, transaction = %transaction.name, "aborted transaction");
        Ok(transaction.name)
    }
}

/// Reduces `name` to identifier characters.
fn sanitize(name: &str) -> String {
    let mut clean: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if clean.is_empty() {
        clean.push_str("Unnamed");
    } else if clean.starts_with(|c: char| c.is_ascii_digit()) {
        clean.insert(0, '_');
    }
    clean
}

/// Returns `base`, or `base` with its trailing digits replaced by the first
/// free three-digit counter.
fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let stem = base.trim_end_matches(|c: char| c.is_ascii_digit());
    (1_u32..)
        .map(|n| format!("{stem}{n:03}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Feature, GeoFeatureGroup};

    #[test]
    fn names_are_sanitized_and_unique() {
        assert_eq!(sanitize("My Pad"), "My_Pad");
        assert_eq!(sanitize("2D"), "_2D");
        assert_eq!(sanitize(""), "Unnamed");
        let taken = ["Pad", "Pad001"];
        assert_eq!(unique_name("Pad", |c| taken.contains(&c)), "Pad002");
        assert_eq!(unique_name("Pad7", |c| taken.contains(&c)), "Pad7");
    }

    #[test]
    fn stale_ids_do_not_alias() {
        let mut doc = Document::new("Doc");
        let a = doc.add_object("A", Box::new(Feature::new()));
        doc.remove_object(a).unwrap();
        let b = doc.add_object("B", Box::new(Feature::new()));
        assert!(!doc.is_alive(a));
        assert!(doc.is_alive(b));
        assert!(doc.object(a).is_none());
        assert_eq!(doc.remove_object(a), Err(DocumentError::NotFound(a)));
    }

    #[test]
    fn duplicate_labels_get_a_suffix() {
        let mut doc = Document::new("Doc");
        let a = doc.add_object("Pad", Box::new(Feature::new()));
        let b = doc.add_object("Pad", Box::new(Feature::new()));
        let c = doc.add_object("Pocket", Box::new(Feature::new()));
        assert_eq!(doc.object(b).unwrap().core().name(), "Pad001");
        assert_eq!(doc.object(b).unwrap().core().label(), "Pad001");
        assert_eq!(doc.set_label(c, "Pad").unwrap(), "Pad002");
        assert_eq!(doc.set_label(a, "Base").unwrap(), "Base");
        assert_eq!(doc.set_label(c, "Pad").unwrap(), "Pad");
    }

    #[test]
    fn links_build_in_and_out_lists() {
        let mut doc = Document::new("Doc");
        let a = doc.add_object("A", Box::new(Feature::new()));
        let b = doc.add_object("B", Box::new(Feature::new()));
        doc.object_mut(b)
            .unwrap()
            .set_value("BaseFeature", Some("A".to_string()))
            .unwrap();
        assert_eq!(doc.out_list(b), [a]);
        assert_eq!(doc.in_list(a), [b]);
    }

    #[test]
    fn objects_live_in_one_geo_group() {
        let mut doc = Document::new("Doc");
        let g1 = doc.add_object("Part", Box::new(GeoFeatureGroup::new()));
        let g2 = doc.add_object("Part", Box::new(GeoFeatureGroup::new()));
        let pad = doc.add_object("Pad", Box::new(Feature::new()));
        assert!(doc.add_to_group(g1, pad).unwrap());
        assert!(!doc.add_to_group(g1, pad).unwrap());
        assert!(doc.add_to_group(g2, pad).unwrap());
        assert_eq!(doc.geo_feature_group_of("Pad"), Some(g2));
        assert!(matches!(
            doc.add_to_group(pad, g1),
            Err(DocumentError::NotAGroup(_))
        ));

        doc.remove_object(pad).unwrap();
        assert_eq!(doc.geo_feature_group_of("Pad"), None);
    }

    #[test]
    fn changes_are_drained_once() {
        let mut doc = Document::new("Doc");
        let a = doc.add_object("A", Box::new(Feature::new()));
        doc.object_mut(a)
            .unwrap()
            .set_value("Length", 2.0_f64)
            .unwrap();
        assert_eq!(doc.take_changes(), [(a, "Length".to_string())]);
        assert!(doc.take_changes().is_empty());
    }
}
