// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Saving and restoring a whole document.
//!
//! The main stream has this shape:
//!
//! ```xml
//! <Document SchemaVersion="4" FileVersion="4">
//!     <Objects Count="1">
//!         <Object type="Feature" name="Pad"/>
//!     </Objects>
//!     <ObjectData Count="1">
//!         <Object name="Pad">
//!             <Properties Count="1">
//!                 <Property name="Length" type="PropertyFloat">
//!                     <Float value="10.0"/>
//!                 </Property>
//!             </Properties>
//!         </Object>
//!     </ObjectData>
//! </Document>
//! ```
//!
//! All objects are created before any property is read, so links can be
//! restored in any order. Side files are read after the main stream.

use std::collections::BTreeMap;

use paracore_property::{
    InputStream, OutputStream, PersistSettings, Property, PropertyContainerExt, PropertyInfo,
    PropertyStatus, PropertyType, PropertyTypes, Reader, Writer,
};
use tracing::{info, warn};

use super::Document;
use crate::error::DocumentError;
use crate::object::{DocumentObject, ObjectStatus};
use crate::store::ObjectStore;

const SCHEMA_VERSION: &str = "4";

/// Runtime status bits written with each property.
const PERSISTED_STATUS: PropertyStatus = PropertyStatus::IMMUTABLE
    .union(PropertyStatus::READ_ONLY)
    .union(PropertyStatus::HIDDEN)
    .union(PropertyStatus::TRANSIENT)
    .union(PropertyStatus::OUTPUT)
    .union(PropertyStatus::NO_RECOMPUTE);

/// A saved document: the main stream and its side files by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SavedDocument {
    /// The main stream.
    pub xml: String,
    /// Side files, keyed by the name the main stream references.
    pub files: BTreeMap<String, Vec<u8>>,
}

fn is_binary(file_name: &str) -> bool {
    !file_name.ends_with(".txt")
}

/// Strips the document qualifier from `Document#Object`.
fn object_name(full_name: &str) -> &str {
    full_name
        .rsplit_once('#')
        .map_or(full_name, |(_, name)| name)
}

impl Document {
    /// Writes the document.
    pub fn save(&self, settings: &PersistSettings) -> SavedDocument {
        let mut writer = Writer::new(settings.clone());
        let version = settings.file_version.to_string();
        writer.start_element(
            "Document",
            &[("SchemaVersion", SCHEMA_VERSION), ("FileVersion", version.as_str())],
        );
        let count = self.len().to_string();
        writer.start_element("Objects", &[("Count", count.as_str())]);
        for object in self.objects() {
            writer.empty_element(
                "Object",
                &[("type", object.type_name()), ("name", object.core().name())],
            );
        }
        writer.end_element("Objects");
        writer.start_element("ObjectData", &[("Count", count.as_str())]);
        for object in self.objects() {
            save_object(&mut writer, object);
        }
        writer.end_element("ObjectData");
        writer.end_element("Document");

        let (xml, scheduled) = writer.finish();
        let mut files = BTreeMap::new();
        for file in scheduled {
            let property = self
                .store
                .by_name(object_name(&file.owner))
                .and_then(|object| object.property_data().get(&file.property));
            let Some(property) = property else {
                warn!(file = %file.file_name, "no property for scheduled side file");
                continue;
            };
            let mut data = Vec::new();
            property.save_doc_file(&mut OutputStream::new(&mut data, is_binary(&file.file_name)));
            files.insert(file.file_name, data);
        }
        info!(
            document = %self.name,
            objects = self.len(),
            files = files.len(),
            "saved document"
        );
        SavedDocument { xml, files }
    }

    /// Replaces the document's content with a saved document.
    ///
    /// Objects of unknown types and properties the object does not declare
    /// are skipped with a warning. Restored objects are clean: nothing is
    /// touched and nothing needs to execute.
    pub fn restore(&mut self, saved: &SavedDocument) -> Result<(), DocumentError> {
        self.store = ObjectStore::default();
        self.transaction = None;

        let mut reader = Reader::new(&saved.xml)?;
        reader.read_element("Document")?;
        let version = reader
            .attribute("FileVersion")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        reader.set_file_version(version);

        reader.read_element("Objects")?;
        let count = reader.attribute_as_u64("Count")?;
        let mut restored = Vec::new();
        for _ in 0..count {
            reader.read_element("Object")?;
            let type_name = reader.require_attribute("type")?.to_string();
            let name = reader.require_attribute("name")?.to_string();
            if self.store.contains_name(&name) {
                return Err(DocumentError::DuplicateName(name));
            }
            match self.types.create(&type_name) {
                Ok(mut object) => {
                    let core = object.core_mut();
                    core.attach(&self.name, &name);
                    core.set_status(ObjectStatus::RESTORING, true);
                    restored.push(self.store.insert(object));
                }
                Err(err) => warn!(object = %name, %err, "skipping object"),
            }
        }
        reader.read_end_element("Objects")?;

        reader.read_element("ObjectData")?;
        let count = reader.attribute_as_u64("Count")?;
        for _ in 0..count {
            reader.read_element("Object")?;
            let name = reader.require_attribute("name")?.to_string();
            let Some(object) = self
                .store
                .id_of(&name)
                .and_then(|id| self.store.get_mut(id))
            else {
                reader.skip_element()?;
                continue;
            };
            restore_properties(object, &mut reader, &self.property_types)?;
            reader.read_end_element("Object")?;
        }
        reader.read_end_element("ObjectData")?;

        for request in reader.take_requested_files() {
            let Some(data) = saved.files.get(&request.file_name) else {
                warn!(file = %request.file_name, "missing side file");
                continue;
            };
            let Some(object) = self
                .store
                .id_of(object_name(&request.owner))
                .and_then(|id| self.store.get_mut(id))
            else {
                continue;
            };
            let mut input = InputStream::new(data, is_binary(&request.file_name));
            if let Err(err) = object.restore_property_doc_file(&request.property, &mut input) {
                warn!(file = %request.file_name, %err, "cannot read side file");
            }
        }

        for &id in &restored {
            if let Some(object) = self.store.get_mut(id) {
                object.on_document_restored();
                let core = object.core_mut();
                core.set_status(ObjectStatus::RESTORING, false);
                core.purge_touched();
            }
        }
        info!(
            document = %self.name,
            objects = restored.len(),
            version,
            "restored document"
        );
        Ok(())
    }
}

fn save_object(writer: &mut Writer, object: &dyn DocumentObject) {
    let owner = object.full_name();
    let data = object.property_data();
    let persisted: Vec<(&str, &dyn Property)> = data
        .iter()
        .filter(|(_, property)| !property.base().is_no_persist())
        .collect();
    writer.start_element("Object", &[("name", object.core().name())]);
    let count = persisted.len().to_string();
    writer.start_element("Properties", &[("Count", count.as_str())]);
    for (name, property) in persisted {
        let base = property.base();
        let mut attributes = vec![
            ("name", name.to_string()),
            ("type", property.type_name().to_string()),
        ];
        let status = base.status() & PERSISTED_STATUS;
        if !status.is_empty() {
            attributes.push(("status", status.bits().to_string()));
        }
        if base.is_dynamic() {
            attributes.push(("dynamic", "1".to_string()));
            if let Some(info) = data.info(name) {
                attributes.push(("group", info.group.clone()));
                attributes.push(("doc", info.doc.clone()));
                attributes.push(("attr", info.ty.bits().to_string()));
            }
        }
        let transient = base.is_transient();
        if transient {
            attributes.push(("transient", "1".to_string()));
        }
        let attributes: Vec<(&str, &str)> = attributes
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect();
        if transient {
            writer.empty_element("Property", &attributes);
            continue;
        }
        writer.start_element("Property", &attributes);
        writer.set_context(&owner, name);
        property.save(writer);
        writer.end_element("Property");
    }
    writer.end_element("Properties");
    writer.end_element("Object");
}

fn restore_properties(
    object: &mut dyn DocumentObject,
    reader: &mut Reader,
    types: &PropertyTypes,
) -> Result<(), DocumentError> {
    reader.read_element("Properties")?;
    let count = reader.attribute_as_u64("Count")?;
    for _ in 0..count {
        reader.read_element("Property")?;
        let name = reader.require_attribute("name")?.to_string();
        let type_name = reader.require_attribute("type")?.to_string();
        let status = reader
            .attribute("status")
            .and_then(|s| s.parse::<u32>().ok())
            .map(PropertyStatus::from_bits_truncate);
        let transient = reader.has_attribute("transient");

        if reader.has_attribute("dynamic") && !object.property_data().contains(&name) {
            let ty = reader
                .attribute("attr")
                .and_then(|a| a.parse::<u16>().ok())
                .map_or(PropertyType::empty(), PropertyType::from_bits_truncate);
            let info = PropertyInfo::new(reader.attribute("group").unwrap_or_default())
                .doc(reader.attribute("doc").unwrap_or_default())
                .ty(ty);
            match types.create(&type_name) {
                Ok(property) => object.add_dynamic_property(&name, property, info)?,
                Err(err) => warn!(property = %name, %err, "cannot create dynamic property"),
            }
        }

        let declared = object
            .property(&name)
            .is_ok_and(|property| property.type_name() == type_name);
        if !declared {
            warn!(
                object = %object.core().name(),
                property = %name,
                type_name = %type_name,
                "skipping undeclared property"
            );
            reader.skip_element()?;
            continue;
        }
        if let Some(status) = status {
            object.set_property_status_value(&name, status)?;
        }
        if !transient {
            if let Err(err) = object.restore_property(&name, reader) {
                warn!(object = %object.core().name(), property = %name, %err, "cannot restore property");
            }
        }
        reader.read_end_element("Property")?;
    }
    reader.read_end_element("Properties")?;
    Ok(())
}
