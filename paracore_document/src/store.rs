// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Slot storage for document objects and the read-only view handed to
//! executing objects.

use hashbrown::HashMap;
use paracore_property::{PropertyContainerExt, ScalarValue};

use crate::error::ExecError;
use crate::id::ObjectId;
use crate::object::DocumentObject;

#[derive(Debug)]
struct Slot {
    generation: u32,
    live: bool,
    // `None` while the object is checked out for execution.
    object: Option<Box<dyn DocumentObject>>,
}

/// Generational slots plus a name index and the insertion order.
#[derive(Debug, Default)]
pub(crate) struct ObjectStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    names: HashMap<String, ObjectId>,
    order: Vec<ObjectId>,
}

impl ObjectStore {
    pub(crate) fn insert(&mut self, object: Box<dyn DocumentObject>) -> ObjectId {
        let name = object.core().name().to_string();
        let id = if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation += 1;
            slot.live = true;
            slot.object = Some(object);
            ObjectId::new(idx, slot.generation)
        } else {
            let idx = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot {
                generation: 1,
                live: true,
                object: Some(object),
            });
            ObjectId::new(idx, 1)
        };
        self.names.insert(name, id);
        self.order.push(id);
        id
    }

    pub(crate) fn remove(&mut self, id: ObjectId) -> Option<Box<dyn DocumentObject>> {
        if !self.is_alive(id) {
            return None;
        }
        let slot = &mut self.slots[id.idx()];
        slot.live = false;
        let object = slot.object.take()?;
        self.names.remove(object.core().name());
        self.order.retain(|&other| other != id);
        self.free.push(id.0);
        Some(object)
    }

    pub(crate) fn is_alive(&self, id: ObjectId) -> bool {
        self.slots
            .get(id.idx())
            .is_some_and(|slot| slot.live && slot.generation == id.generation())
    }

    pub(crate) fn get(&self, id: ObjectId) -> Option<&dyn DocumentObject> {
        if !self.is_alive(id) {
            return None;
        }
        self.slots[id.idx()].object.as_deref()
    }

    pub(crate) fn get_mut(&mut self, id: ObjectId) -> Option<&mut (dyn DocumentObject + 'static)> {
        if !self.is_alive(id) {
            return None;
        }
        self.slots[id.idx()].object.as_deref_mut()
    }

    /// Checks an object out of its slot. The id stays alive.
    pub(crate) fn take(&mut self, id: ObjectId) -> Option<Box<dyn DocumentObject>> {
        if !self.is_alive(id) {
            return None;
        }
        self.slots[id.idx()].object.take()
    }

    pub(crate) fn put_back(&mut self, id: ObjectId, object: Box<dyn DocumentObject>) {
        if self.is_alive(id) {
            self.slots[id.idx()].object = Some(object);
        }
    }

    pub(crate) fn id_of(&self, name: &str) -> Option<ObjectId> {
        self.names.get(name).copied()
    }

    pub(crate) fn by_name(&self, name: &str) -> Option<&dyn DocumentObject> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    pub(crate) fn contains_name(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub(crate) fn ids(&self) -> &[ObjectId] {
        &self.order
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

/// Read access to the rest of the document during
/// [`DocumentObject::execute`].
///
/// The executing object itself is checked out of the document while it runs,
/// so looking it up by name returns `None`.
#[derive(Debug, Clone, Copy)]
pub struct ExecContext<'a> {
    document: &'a str,
    store: &'a ObjectStore,
}

impl<'a> ExecContext<'a> {
    pub(crate) fn new(document: &'a str, store: &'a ObjectStore) -> Self {
        Self { document, store }
    }

    /// Returns the name of the document being recomputed.
    #[must_use]
    pub fn document_name(&self) -> &'a str {
        self.document
    }

    /// Returns the named object, unless it is the one executing.
    #[must_use]
    pub fn object(&self, name: &str) -> Option<&'a dyn DocumentObject> {
        self.store.by_name(name)
    }

    /// Returns a single-valued property of another object.
    pub fn value<T: ScalarValue>(&self, object: &str, property: &str) -> Result<&'a T, ExecError> {
        let object = self
            .object(object)
            .ok_or_else(|| ExecError::domain(format!("no object named '{object}'")))?;
        Ok(object.value::<T>(property)?)
    }
}
