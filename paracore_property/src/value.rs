// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-valued properties.
//!
//! [`PropertyValue<T>`] is generic over the stored value; each supported value
//! type implements [`ScalarValue`] to name the property type and describe how
//! the value is written to the main stream.

use serde_json::json;

use crate::error::{PersistError, PropertyError};
use crate::path::{PathComponent, PathValue, PropertyPath, describe};
use crate::persist::{Reader, Writer, XmlElement};
use crate::property::{Property, PropertyBase, mismatch};

/// A value type storable in a [`PropertyValue`].
pub trait ScalarValue: Clone + PartialEq + core::fmt::Debug + Default + 'static {
    /// The registered property type name.
    const TYPE_NAME: &'static str;

    /// Converts the value to its dynamic form.
    fn to_path_value(&self) -> PathValue;

    /// Converts from the dynamic form, `None` if the value does not fit.
    fn from_path_value(value: &PathValue) -> Option<Self>;

    /// Returns the attributes written on the property element.
    fn write_attributes(&self) -> Vec<(&'static str, String)>;

    /// Reads the value from the property element.
    fn read_attributes(element: &XmlElement) -> Result<Self, PersistError>;

    /// Returns the linked object name, for link values.
    fn link_target(&self) -> Option<&str> {
        None
    }
}

fn required<'a>(element: &'a XmlElement, name: &str) -> Result<&'a str, PersistError> {
    element
        .attribute(name)
        .ok_or_else(|| PersistError::MissingAttribute {
            element: element.name.clone(),
            attribute: name.to_string(),
        })
}

fn number<T: core::str::FromStr>(element: &XmlElement, name: &str) -> Result<T, PersistError> {
    let raw = required(element, name)?;
    raw.trim()
        .parse()
        .map_err(|_| PersistError::InvalidNumber(raw.to_string()))
}

impl ScalarValue for i64 {
    const TYPE_NAME: &'static str = "PropertyInteger";

    fn to_path_value(&self) -> PathValue {
        json!(*self)
    }

    fn from_path_value(value: &PathValue) -> Option<Self> {
        value.as_i64()
    }

    fn write_attributes(&self) -> Vec<(&'static str, String)> {
        vec![("value", self.to_string())]
    }

    fn read_attributes(element: &XmlElement) -> Result<Self, PersistError> {
        number(element, "value")
    }
}

impl ScalarValue for f64 {
    const TYPE_NAME: &'static str = "PropertyFloat";

    fn to_path_value(&self) -> PathValue {
        json!(*self)
    }

    fn from_path_value(value: &PathValue) -> Option<Self> {
        value.as_f64()
    }

    fn write_attributes(&self) -> Vec<(&'static str, String)> {
        vec![("value", format!("{self:?}"))]
    }

    fn read_attributes(element: &XmlElement) -> Result<Self, PersistError> {
        number(element, "value")
    }
}

impl ScalarValue for bool {
    const TYPE_NAME: &'static str = "PropertyBool";

    fn to_path_value(&self) -> PathValue {
        json!(*self)
    }

    fn from_path_value(value: &PathValue) -> Option<Self> {
        value.as_bool().or_else(|| value.as_i64().map(|i| i != 0))
    }

    fn write_attributes(&self) -> Vec<(&'static str, String)> {
        vec![("value", if *self { "true" } else { "false" }.to_string())]
    }

    fn read_attributes(element: &XmlElement) -> Result<Self, PersistError> {
        Ok(required(element, "value")? == "true")
    }
}

impl ScalarValue for String {
    const TYPE_NAME: &'static str = "PropertyString";

    fn to_path_value(&self) -> PathValue {
        json!(self)
    }

    fn from_path_value(value: &PathValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }

    fn write_attributes(&self) -> Vec<(&'static str, String)> {
        vec![("value", self.clone())]
    }

    fn read_attributes(element: &XmlElement) -> Result<Self, PersistError> {
        Ok(required(element, "value")?.to_string())
    }
}

/// A link to another object by name. `None` is an unset link.
impl ScalarValue for Option<String> {
    const TYPE_NAME: &'static str = "PropertyLink";

    fn to_path_value(&self) -> PathValue {
        match self {
            Some(name) => json!(name),
            None => PathValue::Null,
        }
    }

    fn from_path_value(value: &PathValue) -> Option<Self> {
        match value {
            PathValue::Null => Some(None),
            PathValue::String(name) => Some(Some(name.clone())),
            _ => None,
        }
    }

    fn write_attributes(&self) -> Vec<(&'static str, String)> {
        vec![("value", self.clone().unwrap_or_default())]
    }

    fn read_attributes(element: &XmlElement) -> Result<Self, PersistError> {
        let name = required(element, "value")?;
        Ok((!name.is_empty()).then(|| name.to_string()))
    }

    fn link_target(&self) -> Option<&str> {
        self.as_deref()
    }
}

/// A position and orientation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Translation.
    pub base: [f64; 3],
    /// Rotation quaternion `(x, y, z, w)`.
    pub rotation: [f64; 4],
}

impl Default for Placement {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Placement {
    /// No translation, no rotation.
    pub const IDENTITY: Self = Self {
        base: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };

    /// Creates a pure translation.
    #[must_use]
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            base: [x, y, z],
            ..Self::IDENTITY
        }
    }
}

impl ScalarValue for Placement {
    const TYPE_NAME: &'static str = "PropertyPlacement";

    fn to_path_value(&self) -> PathValue {
        json!({ "Base": self.base, "Rotation": self.rotation })
    }

    fn from_path_value(value: &PathValue) -> Option<Self> {
        fn floats<const N: usize>(value: Option<&PathValue>) -> Option<[f64; N]> {
            let items = value?.as_array()?;
            if items.len() != N {
                return None;
            }
            let mut out = [0.0; N];
            for (slot, item) in out.iter_mut().zip(items) {
                *slot = item.as_f64()?;
            }
            Some(out)
        }
        Some(Self {
            base: floats(value.get("Base"))?,
            rotation: floats(value.get("Rotation"))?,
        })
    }

    fn write_attributes(&self) -> Vec<(&'static str, String)> {
        let [px, py, pz] = self.base;
        let [q0, q1, q2, q3] = self.rotation;
        vec![
            ("Px", format!("{px:?}")),
            ("Py", format!("{py:?}")),
            ("Pz", format!("{pz:?}")),
            ("Q0", format!("{q0:?}")),
            ("Q1", format!("{q1:?}")),
            ("Q2", format!("{q2:?}")),
            ("Q3", format!("{q3:?}")),
        ]
    }

    fn read_attributes(element: &XmlElement) -> Result<Self, PersistError> {
        Ok(Self {
            base: [
                number(element, "Px")?,
                number(element, "Py")?,
                number(element, "Pz")?,
            ],
            rotation: [
                number(element, "Q0")?,
                number(element, "Q1")?,
                number(element, "Q2")?,
                number(element, "Q3")?,
            ],
        })
    }
}

/// A property holding a single value.
///
/// # Example
///
/// ```rust
/// use paracore_property::{Property, PropertyInteger};
///
/// let mut prop = PropertyInteger::new(3);
/// prop.set_value(4);
/// assert_eq!(*prop.value(), 4);
/// assert_eq!(prop.xml_name(), "Integer");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyValue<T: ScalarValue> {
    base: PropertyBase,
    value: T,
}

/// An integer property.
pub type PropertyInteger = PropertyValue<i64>;
/// A floating-point property.
pub type PropertyFloat = PropertyValue<f64>;
/// A boolean property.
pub type PropertyBool = PropertyValue<bool>;
/// A string property.
pub type PropertyString = PropertyValue<String>;
/// A link to another object.
pub type PropertyLink = PropertyValue<Option<String>>;
/// A placement property.
pub type PropertyPlacement = PropertyValue<Placement>;

impl<T: ScalarValue> PropertyValue<T> {
    /// Creates a detached property holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            base: PropertyBase::new(),
            value,
        }
    }

    /// Returns the value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Replaces the value without notifying anyone.
    pub fn set_value(&mut self, value: T) {
        self.value = value;
    }
}

impl<T: ScalarValue> Property for PropertyValue<T> {
    fn base(&self) -> &PropertyBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PropertyBase {
        &mut self.base
    }

    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn copy_property(&self) -> Box<dyn Property> {
        Box::new(Self::new(self.value.clone()))
    }

    fn paste_from(&mut self, other: &dyn Property) -> Result<(), PropertyError> {
        let other = other
            .downcast_ref::<Self>()
            .ok_or_else(|| mismatch(T::TYPE_NAME, other))?;
        self.value = other.value.clone();
        Ok(())
    }

    fn to_path_value(&self) -> PathValue {
        self.value.to_path_value()
    }

    fn set_from_path_value(&mut self, value: &PathValue) -> Result<(), PropertyError> {
        self.value = T::from_path_value(value).ok_or_else(|| PropertyError::InvalidValue {
            value: describe(value),
            expected: T::TYPE_NAME,
        })?;
        Ok(())
    }

    fn path_value(&self, path: &PropertyPath) -> Result<PathValue, PropertyError> {
        let mut current = self.value.to_path_value();
        for component in path.components() {
            let next = match component {
                PathComponent::Attribute(name) => current.get(name.as_str()),
                PathComponent::Index(i) => usize::try_from(*i).ok().and_then(|i| current.get(i)),
            };
            current = next.cloned().ok_or_else(|| path.invalid())?;
        }
        Ok(current)
    }

    fn set_path_value(
        &mut self,
        path: &PropertyPath,
        value: &PathValue,
    ) -> Result<(), PropertyError> {
        let mut root = self.value.to_path_value();
        let slot = path
            .components()
            .iter()
            .try_fold(&mut root, |current, component| match component {
                PathComponent::Attribute(name) => current.get_mut(name.as_str()),
                PathComponent::Index(i) => {
                    usize::try_from(*i).ok().and_then(|i| current.get_mut(i))
                }
            })
            .ok_or_else(|| path.invalid())?;
        *slot = value.clone();
        self.set_from_path_value(&root)
    }

    fn link_targets(&self) -> Vec<&str> {
        self.value.link_target().into_iter().collect()
    }

    fn save(&self, writer: &mut Writer) {
        let attributes = self.value.write_attributes();
        let borrowed: Vec<(&str, &str)> = attributes
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect();
        writer.empty_element(self.xml_name(), &borrowed);
    }

    fn restore(&mut self, reader: &mut Reader) -> Result<bool, PersistError> {
        let tag = self.xml_name();
        reader.read_element(tag)?;
        let value = T::read_attributes(reader.current_element()?)?;
        reader.read_end_element(tag)?;
        let changed = value != self.value;
        self.value = value;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::PersistSettings;

    fn save_restore<T: ScalarValue>(prop: &PropertyValue<T>) -> PropertyValue<T> {
        let mut writer = Writer::new(PersistSettings::default());
        prop.save(&mut writer);
        let mut reader = Reader::new(writer.as_str()).unwrap();
        let mut restored = PropertyValue::<T>::default();
        restored.restore(&mut reader).unwrap();
        restored
    }

    #[test]
    fn xml_names_strip_prefix() {
        assert_eq!(PropertyFloat::default().xml_name(), "Float");
        assert_eq!(PropertyLink::default().xml_name(), "Link");
        assert_eq!(PropertyPlacement::default().xml_name(), "Placement");
    }

    #[test]
    fn scalar_values_survive_the_main_stream() {
        assert_eq!(save_restore(&PropertyFloat::new(0.1)).value(), &0.1);
        assert_eq!(
            save_restore(&PropertyString::new("a \"b\"\n".into())).value(),
            "a \"b\"\n"
        );
        assert_eq!(save_restore(&PropertyLink::new(None)).value(), &None);
        let placement = Placement::from_translation(1.0, 2.0, 3.0);
        assert_eq!(save_restore(&PropertyPlacement::new(placement)).value(), &placement);
    }

    #[test]
    fn restore_reports_change() {
        let mut reader = Reader::new("<Integer value=\"5\"/><Integer value=\"5\"/>").unwrap();
        let mut prop = PropertyInteger::new(0);
        assert!(prop.restore(&mut reader).unwrap());
        assert!(!prop.restore(&mut reader).unwrap());
    }

    #[test]
    fn paste_rejects_other_types() {
        let mut prop = PropertyInteger::new(1);
        let err = prop.paste_from(&PropertyFloat::new(2.0)).unwrap_err();
        assert!(matches!(err, PropertyError::TypeMismatch { .. }));
        prop.paste_from(&PropertyInteger::new(7)).unwrap();
        assert_eq!(*prop.value(), 7);
    }

    #[test]
    fn placement_paths_address_components() {
        let mut prop = PropertyPlacement::default();
        let path = PropertyPath::parse("Placement.Base[2]").unwrap();
        prop.set_path_value(&path, &json!(5.0)).unwrap();
        assert_eq!(prop.value().base, [0.0, 0.0, 5.0]);
        assert_eq!(prop.path_value(&path).unwrap(), json!(5.0));
        let bad = PropertyPath::parse("Placement.Base[3]").unwrap();
        assert!(prop.set_path_value(&bad, &json!(1.0)).is_err());
    }

    #[test]
    fn invalid_dynamic_value_leaves_value_unchanged() {
        let mut prop = PropertyInteger::new(3);
        let path = PropertyPath::new("Value");
        assert!(prop.set_path_value(&path, &json!("x")).is_err());
        assert_eq!(*prop.value(), 3);
    }

    #[test]
    fn link_exposes_its_target() {
        let prop = PropertyLink::new(Some("Pad".into()));
        assert_eq!(prop.link_targets(), vec!["Pad"]);
        assert!(PropertyLink::default().link_targets().is_empty());
    }
}
