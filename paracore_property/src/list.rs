// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Array-valued properties.
//!
//! A list writes its elements either inline in the main stream or to a side
//! file. The choice depends only on the writer settings and on whether the
//! list is empty:
//!
//! | Condition | Element |
//! |-----------|---------|
//! | empty, side files available | `<IntegerList file=""/>` |
//! | forced inline, or no side files | `<IntegerList count="N">` with one child per element |
//! | otherwise | `<IntegerList file="Box.Values.bin"/>` plus a side file |
//!
//! A side file holds a `u32` element count followed by the elements, in the
//! binary or text encoding of [`OutputStream`].

use serde_json::json;
use tracing::warn;

use crate::error::{PersistError, PropertyError};
use crate::path::{PathComponent, PathValue, PropertyPath, describe};
use crate::persist::{InputStream, OutputStream, Reader, Writer};
use crate::property::{Property, PropertyBase, mismatch};

/// An element type storable in a [`PropertyList`].
pub trait ListElement: Clone + PartialEq + core::fmt::Debug + 'static {
    /// The registered property type name.
    const TYPE_NAME: &'static str;
    /// The tag of each inline element.
    const ELEMENT_TAG: &'static str;
    /// The attribute carrying the inline value.
    const ELEMENT_ATTR: &'static str;
    /// Lists of this element are always written inline.
    const INLINE_ONLY: bool = false;

    /// Converts the element to its dynamic form.
    fn to_path_value(&self) -> PathValue;

    /// Converts from the dynamic form, `None` if the value does not fit.
    fn from_path_value(value: &PathValue) -> Option<Self>;

    /// Renders the inline attribute value.
    fn to_attribute(&self) -> String;

    /// Parses the inline attribute value.
    fn from_attribute(raw: &str) -> Result<Self, PersistError>;

    /// Writes the element to a side file.
    fn write_stream(&self, out: &mut OutputStream<'_>);

    /// Reads the element from a side file.
    fn read_stream(input: &mut InputStream<'_>) -> Result<Self, PersistError>;

    /// Returns the linked object name, for link elements.
    fn link_target(&self) -> Option<&str> {
        None
    }
}

fn parse_number<T: core::str::FromStr>(raw: &str) -> Result<T, PersistError> {
    raw.trim()
        .parse()
        .map_err(|_| PersistError::InvalidNumber(raw.to_string()))
}

impl ListElement for i64 {
    const TYPE_NAME: &'static str = "PropertyIntegerList";
    const ELEMENT_TAG: &'static str = "I";
    const ELEMENT_ATTR: &'static str = "v";

    fn to_path_value(&self) -> PathValue {
        json!(*self)
    }

    fn from_path_value(value: &PathValue) -> Option<Self> {
        value.as_i64()
    }

    fn to_attribute(&self) -> String {
        self.to_string()
    }

    fn from_attribute(raw: &str) -> Result<Self, PersistError> {
        parse_number(raw)
    }

    fn write_stream(&self, out: &mut OutputStream<'_>) {
        out.write_i64(*self);
    }

    fn read_stream(input: &mut InputStream<'_>) -> Result<Self, PersistError> {
        input.read_i64()
    }
}

impl ListElement for f64 {
    const TYPE_NAME: &'static str = "PropertyFloatList";
    const ELEMENT_TAG: &'static str = "F";
    const ELEMENT_ATTR: &'static str = "v";

    fn to_path_value(&self) -> PathValue {
        json!(*self)
    }

    fn from_path_value(value: &PathValue) -> Option<Self> {
        value.as_f64()
    }

    fn to_attribute(&self) -> String {
        format!("{self:?}")
    }

    fn from_attribute(raw: &str) -> Result<Self, PersistError> {
        parse_number(raw)
    }

    fn write_stream(&self, out: &mut OutputStream<'_>) {
        out.write_f64(*self);
    }

    fn read_stream(input: &mut InputStream<'_>) -> Result<Self, PersistError> {
        input.read_f64()
    }
}

impl ListElement for bool {
    const TYPE_NAME: &'static str = "PropertyBoolList";
    const ELEMENT_TAG: &'static str = "B";
    const ELEMENT_ATTR: &'static str = "v";

    fn to_path_value(&self) -> PathValue {
        json!(*self)
    }

    fn from_path_value(value: &PathValue) -> Option<Self> {
        value.as_bool()
    }

    fn to_attribute(&self) -> String {
        if *self { "1" } else { "0" }.to_string()
    }

    fn from_attribute(raw: &str) -> Result<Self, PersistError> {
        Ok(raw.trim() != "0")
    }

    fn write_stream(&self, out: &mut OutputStream<'_>) {
        out.write_bool(*self);
    }

    fn read_stream(input: &mut InputStream<'_>) -> Result<Self, PersistError> {
        input.read_bool()
    }
}

impl ListElement for String {
    const TYPE_NAME: &'static str = "PropertyStringList";
    const ELEMENT_TAG: &'static str = "String";
    const ELEMENT_ATTR: &'static str = "value";

    fn to_path_value(&self) -> PathValue {
        json!(self)
    }

    fn from_path_value(value: &PathValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }

    fn to_attribute(&self) -> String {
        self.clone()
    }

    fn from_attribute(raw: &str) -> Result<Self, PersistError> {
        Ok(raw.to_string())
    }

    fn write_stream(&self, out: &mut OutputStream<'_>) {
        out.write_str(self);
    }

    fn read_stream(input: &mut InputStream<'_>) -> Result<Self, PersistError> {
        input.read_string()
    }
}

/// A link to another object by name. `None` is an unresolved slot.
impl ListElement for Option<String> {
    const TYPE_NAME: &'static str = "PropertyLinkList";
    const ELEMENT_TAG: &'static str = "Link";
    const ELEMENT_ATTR: &'static str = "value";
    const INLINE_ONLY: bool = true;

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

    fn to_attribute(&self) -> String {
        self.clone().unwrap_or_default()
    }

    fn from_attribute(raw: &str) -> Result<Self, PersistError> {
        Ok((!raw.is_empty()).then(|| raw.to_string()))
    }

    fn write_stream(&self, out: &mut OutputStream<'_>) {
        out.write_str(self.as_deref().unwrap_or_default());
    }

    fn read_stream(input: &mut InputStream<'_>) -> Result<Self, PersistError> {
        let name = input.read_string()?;
        Ok((!name.is_empty()).then_some(name))
    }

    fn link_target(&self) -> Option<&str> {
        self.as_deref()
    }
}

/// A property holding an ordered list of elements.
///
/// Mutators are raw. Attached lists are changed through
/// [`PropertyContainerExt::set_property`](crate::PropertyContainerExt::set_property)
/// or, when the change can fail,
/// [`PropertyContainerExt::try_set_property`](crate::PropertyContainerExt::try_set_property).
///
/// # Example
///
/// ```rust
/// use paracore_property::PropertyIntegerList;
///
/// let mut list = PropertyIntegerList::new(vec![1, 2]);
/// list.apply_patch([(-1, 3), (0, 9)]).unwrap();
/// assert_eq!(list.values(), &[9, 2, 3]);
/// assert!(list.apply_patch([(5, 0)]).is_err());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyList<T: ListElement> {
    base: PropertyBase,
    values: Vec<T>,
}

/// A list of integers.
pub type PropertyIntegerList = PropertyList<i64>;
/// A list of floats.
pub type PropertyFloatList = PropertyList<f64>;
/// A list of booleans.
pub type PropertyBoolList = PropertyList<bool>;
/// A list of strings.
pub type PropertyStringList = PropertyList<String>;
/// A list of links to other objects.
pub type PropertyLinkList = PropertyList<Option<String>>;

impl<T: ListElement> PropertyList<T> {
    /// Creates a detached list holding `values`.
    #[must_use]
    pub fn new(values: Vec<T>) -> Self {
        Self {
            base: PropertyBase::new(),
            values,
        }
    }

    /// Returns the elements.
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the list has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.values.get(index)
    }

    /// Replaces all elements.
    pub fn set_values(&mut self, values: Vec<T>) {
        self.values = values;
    }

    /// Resizes the list, filling with clones of `fill`.
    pub fn set_size(&mut self, len: usize, fill: T) {
        self.values.resize(len, fill);
    }

    /// Appends an element.
    pub fn push(&mut self, value: T) {
        self.values.push(value);
    }

    /// Removes and returns the element at `index`.
    pub fn remove(&mut self, index: usize) -> Result<T, PropertyError> {
        if index >= self.values.len() {
            return Err(self.out_of_bounds(index as isize));
        }
        Ok(self.values.remove(index))
    }

    /// Writes `value` at `index`.
    ///
    /// `-1` or the current length appends. Any other index outside the list
    /// is rejected and the list is unchanged.
    pub fn set_value_at(&mut self, index: isize, value: T) -> Result<(), PropertyError> {
        let len = self.values.len();
        if index == -1 || index == len as isize {
            self.values.push(value);
            return Ok(());
        }
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| self.values.get_mut(i))
            .ok_or_else(|| PropertyError::IndexOutOfBounds { index, len })?;
        *slot = value;
        Ok(())
    }

    /// Applies a sparse index-to-value patch in order.
    ///
    /// Each entry follows [`set_value_at`](Self::set_value_at), so appends
    /// grow the list for later entries and a repeated index keeps the last
    /// value written. If any entry is rejected, the list is unchanged.
    pub fn apply_patch(
        &mut self,
        patch: impl IntoIterator<Item = (isize, T)>,
    ) -> Result<(), PropertyError> {
        let mut staged = self.values.clone();
        for (index, value) in patch {
            let len = staged.len();
            if index == -1 || index == len as isize {
                staged.push(value);
                continue;
            }
            let slot = usize::try_from(index)
                .ok()
                .and_then(|i| staged.get_mut(i))
                .ok_or(PropertyError::IndexOutOfBounds { index, len })?;
            *slot = value;
        }
        self.values = staged;
        Ok(())
    }

    fn out_of_bounds(&self, index: isize) -> PropertyError {
        PropertyError::IndexOutOfBounds {
            index,
            len: self.values.len(),
        }
    }

    fn element_from(value: &PathValue) -> Result<T, PropertyError> {
        T::from_path_value(value).ok_or_else(|| PropertyError::InvalidValue {
            value: describe(value),
            expected: T::TYPE_NAME,
        })
    }

    fn path_index(&self, path: &PropertyPath) -> Result<Option<isize>, PropertyError> {
        match path.components() {
            [] => Ok(None),
            [PathComponent::Index(i)] => Ok(Some(*i)),
            _ => Err(path.invalid()),
        }
    }
}

impl<T: ListElement> Property for PropertyList<T> {
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
        Box::new(Self::new(self.values.clone()))
    }

    fn paste_from(&mut self, other: &dyn Property) -> Result<(), PropertyError> {
        let other = other
            .downcast_ref::<Self>()
            .ok_or_else(|| mismatch(T::TYPE_NAME, other))?;
        self.values.clone_from(&other.values);
        Ok(())
    }

    fn to_path_value(&self) -> PathValue {
        PathValue::Array(self.values.iter().map(T::to_path_value).collect())
    }

    fn set_from_path_value(&mut self, value: &PathValue) -> Result<(), PropertyError> {
        let items = value.as_array().ok_or_else(|| PropertyError::InvalidValue {
            value: describe(value),
            expected: T::TYPE_NAME,
        })?;
        self.values = items
            .iter()
            .map(Self::element_from)
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn path_value(&self, path: &PropertyPath) -> Result<PathValue, PropertyError> {
        match self.path_index(path)? {
            None => Ok(self.to_path_value()),
            Some(index) => usize::try_from(index)
                .ok()
                .and_then(|i| self.values.get(i))
                .map(T::to_path_value)
                .ok_or_else(|| self.out_of_bounds(index)),
        }
    }

    fn set_path_value(
        &mut self,
        path: &PropertyPath,
        value: &PathValue,
    ) -> Result<(), PropertyError> {
        match self.path_index(path)? {
            None => self.set_from_path_value(value),
            Some(index) => {
                let element = Self::element_from(value)?;
                self.set_value_at(index, element)
            }
        }
    }

    fn paths(&self) -> Vec<PropertyPath> {
        let name = self.base.name().unwrap_or_default();
        (0..self.values.len())
            .map(|i| PropertyPath::new(name).index(i as isize))
            .collect()
    }

    fn canonical_path(&self, path: &PropertyPath) -> Result<PropertyPath, PropertyError> {
        // `-1` is only meaningful as an append target; as a binding key it
        // names the last element.
        match self.path_index(path)? {
            Some(-1) if !self.values.is_empty() => {
                Ok(PropertyPath::new(path.property()).index(self.values.len() as isize - 1))
            }
            _ => Ok(path.clone()),
        }
    }

    fn link_targets(&self) -> Vec<&str> {
        self.values.iter().filter_map(T::link_target).collect()
    }

    fn save(&self, writer: &mut Writer) {
        let tag = self.xml_name();
        let can_stream = writer.can_save_stream() && !T::INLINE_ONLY;
        if self.values.is_empty() && can_stream {
            writer.empty_element(tag, &[("file", "")]);
        } else if writer.is_force_xml() || !can_stream {
            let count = self.values.len().to_string();
            writer.start_element(tag, &[("count", count.as_str())]);
            for value in &self.values {
                let attribute = value.to_attribute();
                writer.empty_element(T::ELEMENT_TAG, &[(T::ELEMENT_ATTR, attribute.as_str())]);
            }
            writer.end_element(tag);
        } else {
            let postfix = if writer.is_prefer_binary() { ".bin" } else { ".txt" };
            let name = self.base.file_name(Some(writer.owner()), postfix, "");
            let file = writer.add_file(&name);
            writer.empty_element(tag, &[("file", file.as_str())]);
        }
    }

    fn restore(&mut self, reader: &mut Reader) -> Result<bool, PersistError> {
        let tag = self.xml_name();
        reader.read_element(tag)?;
        let mut changed = false;
        if let Some(file) = reader.attribute("file").map(str::to_string) {
            if !file.is_empty() {
                reader.add_file(&file);
            } else if !self.values.is_empty() {
                self.values.clear();
                changed = true;
            }
        } else if reader.has_attribute("count") {
            let count = reader.attribute_as_u64("count")?;
            let mut values = Vec::with_capacity(usize::try_from(count).unwrap_or(0).min(4096));
            for _ in 0..count {
                reader.read_element(T::ELEMENT_TAG)?;
                match reader
                    .require_attribute(T::ELEMENT_ATTR)
                    .and_then(T::from_attribute)
                {
                    Ok(value) => values.push(value),
                    Err(err) => warn!(list = tag, %err, "skipping malformed list element"),
                }
            }
            changed = values != self.values;
            self.values = values;
        } else if !self.values.is_empty() {
            self.values.clear();
            changed = true;
        }
        reader.read_end_element(tag)?;
        Ok(changed)
    }

    fn save_doc_file(&self, out: &mut OutputStream<'_>) {
        out.write_u32(u32::try_from(self.values.len()).unwrap_or(u32::MAX));
        for value in &self.values {
            value.write_stream(out);
        }
    }

    fn restore_doc_file(&mut self, input: &mut InputStream<'_>) -> Result<bool, PersistError> {
        let count = input.read_u32()?;
        let mut values = Vec::with_capacity((count as usize).min(4096));
        for _ in 0..count {
            values.push(T::read_stream(input)?);
        }
        let changed = values != self.values;
        self.values = values;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::PersistSettings;

    fn attached(values: Vec<i64>) -> PropertyIntegerList {
        let mut list = PropertyIntegerList::new(values);
        list.base_mut().set_container("Values");
        list
    }

    #[test]
    fn patch_appends_at_len_and_minus_one() {
        let mut list = PropertyIntegerList::new(vec![1]);
        list.apply_patch([(1, 2), (-1, 3), (3, 4)]).unwrap();
        assert_eq!(list.values(), &[1, 2, 3, 4]);
    }

    #[test]
    fn patch_duplicate_index_last_write_wins() {
        let mut list = PropertyIntegerList::new(vec![0, 0]);
        list.apply_patch([(1, 5), (1, 6)]).unwrap();
        assert_eq!(list.values(), &[0, 6]);
    }

    #[test]
    fn rejected_patch_leaves_list_unchanged() {
        let mut list = PropertyIntegerList::new(vec![1, 2]);
        let err = list.apply_patch([(0, 9), (-2, 0)]).unwrap_err();
        assert_eq!(err, PropertyError::IndexOutOfBounds { index: -2, len: 2 });
        assert_eq!(list.values(), &[1, 2]);
        assert!(list.apply_patch([(3, 0)]).is_err());
    }

    #[test]
    fn empty_list_writes_placeholder() {
        let mut writer = Writer::new(PersistSettings::default());
        attached(Vec::new()).save(&mut writer);
        assert_eq!(writer.as_str(), "<IntegerList file=\"\"/>\n");
        assert!(writer.scheduled_files().is_empty());
    }

    #[test]
    fn forced_xml_writes_inline() {
        let settings = PersistSettings {
            force_xml: true,
            ..PersistSettings::default()
        };
        let mut writer = Writer::new(settings);
        attached(vec![4, 5]).save(&mut writer);
        assert_eq!(
            writer.as_str(),
            "<IntegerList count=\"2\">\n    <I v=\"4\"/>\n    <I v=\"5\"/>\n</IntegerList>\n"
        );

        let mut reader = Reader::new(writer.as_str()).unwrap();
        let mut restored = PropertyIntegerList::default();
        assert!(restored.restore(&mut reader).unwrap());
        assert_eq!(restored.values(), &[4, 5]);
    }

    #[test]
    fn no_side_files_means_inline_even_when_empty() {
        let settings = PersistSettings {
            side_files: false,
            ..PersistSettings::default()
        };
        let mut writer = Writer::new(settings);
        attached(Vec::new()).save(&mut writer);
        assert_eq!(writer.as_str(), "<IntegerList count=\"0\">\n</IntegerList>\n");
    }

    #[test]
    fn side_file_is_scheduled_by_preference() {
        let mut writer = Writer::new(PersistSettings::default());
        writer.set_context("Doc#Box", "Values");
        attached(vec![1]).save(&mut writer);
        assert_eq!(writer.as_str(), "<IntegerList file=\"Box.Values.bin\"/>\n");

        let text = PersistSettings {
            prefer_binary: false,
            ..PersistSettings::default()
        };
        let mut writer = Writer::new(text);
        writer.set_context("Box", "Values");
        attached(vec![1]).save(&mut writer);
        assert_eq!(writer.scheduled_files()[0].file_name, "Box.Values.txt");
    }

    #[test]
    fn side_file_round_trip() {
        let source = PropertyStringList::new(vec!["a".into(), "multi\nline".into(), String::new()]);
        for binary in [true, false] {
            let mut buf = Vec::new();
            source.save_doc_file(&mut OutputStream::new(&mut buf, binary));
            let mut restored = PropertyStringList::default();
            assert!(restored
                .restore_doc_file(&mut InputStream::new(&buf, binary))
                .unwrap());
            assert_eq!(restored.values(), source.values());
        }
    }

    #[test]
    fn missing_attributes_reset_only_non_empty_lists() {
        let mut reader = Reader::new("<IntegerList/><IntegerList/>").unwrap();
        let mut list = PropertyIntegerList::new(vec![1]);
        assert!(list.restore(&mut reader).unwrap());
        assert!(list.is_empty());
        assert!(!list.restore(&mut reader).unwrap());
    }

    #[test]
    fn malformed_inline_elements_are_skipped() {
        let mut reader =
            Reader::new("<IntegerList count=\"3\"><I v=\"1\"/><I v=\"x\"/><I v=\"3\"/></IntegerList>")
                .unwrap();
        let mut list = PropertyIntegerList::default();
        list.restore(&mut reader).unwrap();
        assert_eq!(list.values(), &[1, 3]);
    }

    #[test]
    fn link_lists_are_always_inline() {
        let mut writer = Writer::new(PersistSettings::default());
        let mut list = PropertyLinkList::new(vec![Some("A".into()), None]);
        list.base_mut().set_container("Group");
        list.save(&mut writer);
        assert!(writer.as_str().starts_with("<LinkList count=\"2\">"));
        assert_eq!(list.link_targets(), vec!["A"]);
    }

    #[test]
    fn element_paths() {
        let mut list = attached(vec![1, 2]);
        assert_eq!(list.paths().len(), 2);
        let last = PropertyPath::new("Values").index(-1);
        assert_eq!(
            list.canonical_path(&last).unwrap(),
            PropertyPath::new("Values").index(1)
        );
        list.set_path_value(&last, &json!(3)).unwrap();
        assert_eq!(list.values(), &[1, 2, 3]);
        assert_eq!(
            list.path_value(&PropertyPath::new("Values").index(0)).unwrap(),
            json!(1)
        );
        assert!(list.path_value(&PropertyPath::new("Values").index(7)).is_err());
    }
}
