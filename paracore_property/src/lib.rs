// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paracore Property: named, typed, change-notifying value cells.
//!
//! This crate is the bottom layer of a parametric object model. It provides
//! the property contract, the storage a container owns, and the persistence
//! format properties are written in.
//!
//! ## Core Concepts
//!
//! ### Properties
//!
//! A [`Property`] is a value cell with a [`PropertyBase`]: the name assigned by
//! its container and a set of [`PropertyStatus`] bits. Concrete properties are
//! [`PropertyValue<T>`] for single values and [`PropertyList<T>`] for ordered
//! lists. The methods on the concrete types are raw; they change the value and
//! nothing else.
//!
//! ### Containers
//!
//! A [`PropertyContainer`] owns a [`PropertyData`] and receives
//! notifications. [`PropertyContainerExt`] is implemented for every container
//! and performs each mutation in a fixed order:
//!
//! - validate, emitting nothing on failure
//! - [`PropertyContainer::on_before_change`]
//! - write
//! - [`PropertyContainer::on_changed`], then set the touched bit
//!
//! Status writes through [`PropertyContainerExt::set_property_status_value`]
//! call [`PropertyContainer::on_property_status_changed`] once when the
//! read-only or hidden bit flips, and never for other bits.
//!
//! ### Persistence
//!
//! Properties write one element each to the main stream through [`Writer`]
//! and read it back through [`Reader`]. Lists may move their data into a side
//! file encoded with [`OutputStream`]. [`PersistSettings`] selects the format.
//!
//! ## Quick Start
//!
//! ```rust
//! use paracore_property::{
//!     PropertyContainer, PropertyContainerExt, PropertyData, PropertyInfo,
//!     PropertyIntegerList, PropertyStatus,
//! };
//!
//! struct Sheet {
//!     data: PropertyData,
//!     log: Vec<String>,
//! }
//!
//! impl PropertyContainer for Sheet {
//!     fn property_data(&self) -> &PropertyData {
//!         &self.data
//!     }
//!
//!     fn property_data_mut(&mut self) -> &mut PropertyData {
//!         &mut self.data
//!     }
//!
//!     fn container_name(&self) -> &str {
//!         "Sheet"
//!     }
//!
//!     fn on_before_change(&mut self, name: &str) {
//!         self.log.push(format!("before {name}"));
//!     }
//!
//!     fn on_changed(&mut self, name: &str) {
//!         self.log.push(format!("after {name}"));
//!     }
//! }
//!
//! let mut sheet = Sheet { data: PropertyData::new(), log: Vec::new() };
//! sheet
//!     .property_data_mut()
//!     .add_static("Rows", PropertyIntegerList::default(), PropertyInfo::new("Data"))
//!     .unwrap();
//!
//! sheet.patch_values("Rows", [(-1, 10_i64), (1, 20)]).unwrap();
//! assert_eq!(sheet.values::<i64>("Rows").unwrap(), &[10, 20]);
//! assert_eq!(sheet.log, ["before Rows", "after Rows"]);
//!
//! // Index 5 is neither an element nor the append position.
//! assert!(sheet.patch_values("Rows", [(5, 0_i64)]).is_err());
//! assert_eq!(sheet.log.len(), 2);
//!
//! let rows = sheet.property("Rows").unwrap();
//! assert!(rows.base().test_status(PropertyStatus::TOUCHED));
//! ```

mod container;
mod error;
mod list;
mod path;
mod persist;
mod property;
mod registry;
mod status;
mod value;

pub use container::{PropertyContainer, PropertyContainerExt, PropertyData, PropertyInfo};
pub use error::{PersistError, PropertyError};
pub use list::{
    ListElement, PropertyBoolList, PropertyFloatList, PropertyIntegerList, PropertyLinkList,
    PropertyList, PropertyStringList,
};
pub use path::{PathComponent, PathValue, PropertyPath};
pub use persist::{
    CURRENT_FILE_VERSION, InputStream, OutputStream, PersistSettings, Reader, RequestedFile,
    ScheduledFile, Writer, XmlElement, XmlEvent, scan,
};
pub use property::{AsAny, Property, PropertyBase};
pub use registry::{PropertyConstructor, PropertyTypes};
pub use status::{PropertyStatus, PropertyType};
pub use value::{
    Placement, PropertyBool, PropertyFloat, PropertyInteger, PropertyLink, PropertyPlacement,
    PropertyString, PropertyValue, ScalarValue,
};
