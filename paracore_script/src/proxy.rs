// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The proxy-valued property.
//!
//! [`PropertyProxy`] holds an optional shared [`ScriptObject`]. It persists
//! the object's state as JSON inside a `<Python>` element:
//!
//! - `module` and `class` name the object's class; objects without a class
//!   are written with `json="yes"`.
//! - `object="yes"` records that the object carries an `__object__` marker.
//! - With file version 1 or older the JSON is base64 encoded into `value`.
//! - With forced XML the JSON is written as character data (`cdata="1"`), or
//!   as `value="null"` for an empty property.
//! - Otherwise the JSON is written to a `.json` side file.
//!
//! Restoring also accepts a plain `value` attribute with `\n` escapes and the
//! legacy textual pickle form. A failed restore logs the problem and leaves
//! the property empty; the rest of the document still loads.

use std::cell::Cell;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use nom::IResult;
use nom::Parser;
use nom::bytes::complete::{tag, take_until, take_while1};
use nom::character::complete::char;
use nom::sequence::{delimited, preceded, terminated};
use paracore_property::{
    InputStream, OutputStream, PathValue, PersistError, PersistSettings, Property, PropertyBase,
    PropertyError, Reader, Writer,
};
use serde::Serialize as _;
use serde_json::ser::PrettyFormatter;
use serde_json::Serializer;
use tracing::{error, warn};

use crate::interpreter;
use crate::object::{ScriptObject, ScriptValue};

const ELEMENT: &str = "Python";
const GET_STATE: &str = "__getstate__";
const SET_STATE: &str = "__setstate__";
const OBJECT_MARKER: &str = "__object__";

/// A property holding a shared script object.
///
/// Copies share the object with the original. The object is released under
/// the interpreter lock.
///
/// # Example
///
/// ```rust
/// use paracore_property::{PersistSettings, Property, Reader, Writer};
/// use paracore_script::{PropertyProxy, ScriptObject};
///
/// let proxy = PropertyProxy::new(Some(ScriptObject::plain().with_value("Size", 3)));
///
/// let settings = PersistSettings { force_xml: true, json_indent: 0, ..PersistSettings::default() };
/// let mut writer = Writer::new(settings);
/// proxy.save(&mut writer);
/// assert!(writer.as_str().starts_with("<Python json=\"yes\" cdata=\"1\">"));
///
/// let mut restored = PropertyProxy::default();
/// restored.restore(&mut Reader::new(writer.as_str()).unwrap()).unwrap();
/// assert_eq!(restored.value().unwrap().value("Size"), Some(3.into()));
/// ```
#[derive(Debug)]
pub struct PropertyProxy {
    base: PropertyBase,
    object: Option<ScriptObject>,
    // Indent of the last save, reused for the side file.
    indent: Cell<usize>,
}

impl Default for PropertyProxy {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Drop for PropertyProxy {
    fn drop(&mut self) {
        let _gil = interpreter::lock();
        self.object.take();
    }
}

impl PropertyProxy {
    /// Creates a detached property holding `object`.
    #[must_use]
    pub fn new(object: Option<ScriptObject>) -> Self {
        Self {
            base: PropertyBase::new(),
            object,
            indent: Cell::new(PersistSettings::default().json_indent),
        }
    }

    /// Returns the held object.
    #[must_use]
    pub fn value(&self) -> Option<&ScriptObject> {
        self.object.as_ref()
    }

    /// Replaces the held object without notifications.
    pub fn set_value(&mut self, object: Option<ScriptObject>) {
        let _gil = interpreter::lock();
        self.object = object;
    }

    /// Serializes the object's state.
    ///
    /// An empty property is `null`. Returns `None` if `__getstate__` fails.
    #[must_use]
    pub fn state(&self) -> Option<ScriptValue> {
        let _gil = interpreter::lock();
        let Some(object) = &self.object else {
            return Some(ScriptValue::Null);
        };
        if object.has_method(GET_STATE) {
            match object.call_method(GET_STATE, &[]) {
                Ok(state) => Some(state),
                Err(err) => {
                    error!(%err, "failed to read proxy state");
                    None
                }
            }
        } else {
            Some(ScriptValue::Object(object.data()))
        }
    }

    /// Applies a serialized state to the held object.
    ///
    /// An empty property takes a non-null state as a new plain object.
    pub fn set_state(&mut self, state: ScriptValue) {
        let _gil = interpreter::lock();
        if let Some(object) = &self.object {
            if object.has_method(SET_STATE) {
                if let Err(err) = object.call_method(SET_STATE, std::slice::from_ref(&state)) {
                    error!(%err, "failed to apply proxy state");
                }
                return;
            }
        }
        match state {
            ScriptValue::Object(data) => {
                if let Some(object) = &self.object {
                    object.set_data(data);
                } else {
                    let object = ScriptObject::plain();
                    object.set_data(data);
                    self.object = Some(object);
                }
            }
            ScriptValue::Null => {}
            state => warn!(%state, "ignoring proxy state that is not a map"),
        }
    }

    fn to_json(&self, indent: usize) -> String {
        let Some(state) = self.state() else {
            return String::new();
        };
        let result = if indent == 0 {
            serde_json::to_vec(&state)
        } else {
            let spaces = " ".repeat(indent);
            let mut out = Vec::new();
            let mut ser =
                Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(spaces.as_bytes()));
            state.serialize(&mut ser).map(|()| out)
        };
        match result.map(String::from_utf8) {
            Ok(Ok(json)) => json,
            Ok(Err(err)) => {
                error!(%err, "proxy state is not text");
                String::new()
            }
            Err(err) => {
                error!(%err, "failed to serialize proxy state");
                String::new()
            }
        }
    }

    fn from_json(&mut self, json: &str) {
        let json = json.trim();
        if json.is_empty() {
            return;
        }
        match serde_json::from_str::<ScriptValue>(json) {
            Ok(state) => self.set_state(state),
            Err(err) => error!(%err, "failed to parse proxy state"),
        }
    }

    fn instantiate(&mut self, module: &str, class: &str, load: Load) -> Load {
        match interpreter::instantiate(module, class) {
            Ok(object) => {
                self.object = Some(object);
                load
            }
            Err(err) => {
                error!(%err, "cannot restore proxy");
                self.object = None;
                Load::Failed
            }
        }
    }

    fn load_pickle(&mut self, body: &str) {
        let Some(object) = &self.object else {
            return;
        };
        for (key, value) in pickle_strings(body) {
            object.set_value(key, value);
        }
    }
}

/// Splits a legacy pickle into module, class, and the remaining body.
fn pickle_header(buffer: &str) -> Option<(&str, &str, &str)> {
    fn word(input: &str) -> IResult<&str, &str> {
        take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
    }
    let (rest, (module, class)) = (
        preceded(tag("(i"), terminated(word, char('\n'))),
        terminated(word, char('\n')),
    )
        .parse(buffer)
        .ok()?;
    Some((module, class, rest))
}

/// Collects `S'key'` and `S'value'` string pairs from a pickle body.
fn pickle_strings(body: &str) -> Vec<(&str, &str)> {
    fn quoted(input: &str) -> IResult<&str, &str> {
        preceded(
            take_until("S'"),
            delimited(
                tag("S'"),
                take_while1(|c: char| c.is_alphanumeric() || c == '_'),
                char('\''),
            ),
        )
        .parse(input)
    }
    let mut strings = Vec::new();
    let mut rest = body;
    while let Ok((tail, s)) = quoted(rest) {
        strings.push(s);
        rest = tail;
    }
    strings
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect()
}

fn decode_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if chars.next() == Some('n') {
                out.push('\n');
            }
        } else {
            out.push(c);
        }
    }
    out
}

enum Load {
    Nothing,
    Json,
    Pickle,
    Failed,
}

impl Property for PropertyProxy {
    fn base(&self) -> &PropertyBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PropertyBase {
        &mut self.base
    }

    fn type_name(&self) -> &'static str {
        "PropertyPythonObject"
    }

    fn xml_name(&self) -> &'static str {
        ELEMENT
    }

    fn copy_property(&self) -> Box<dyn Property> {
        let _gil = interpreter::lock();
        Box::new(Self::new(self.object.clone()))
    }

    fn paste_from(&mut self, other: &dyn Property) -> Result<(), PropertyError> {
        let other = other
            .downcast_ref::<Self>()
            .ok_or_else(|| PropertyError::TypeMismatch {
                name: other.base().name().unwrap_or_default().to_string(),
                expected: "PropertyPythonObject",
                actual: other.type_name(),
            })?;
        self.set_value(other.object.clone());
        Ok(())
    }

    fn to_path_value(&self) -> PathValue {
        self.state().unwrap_or_default()
    }

    fn set_from_path_value(&mut self, value: &PathValue) -> Result<(), PropertyError> {
        self.set_state(value.clone());
        Ok(())
    }

    fn is_same(&self, other: &dyn Property) -> bool {
        other
            .downcast_ref::<Self>()
            .is_some_and(|other| match (&self.object, &other.object) {
                (Some(a), Some(b)) => a.ptr_eq(b),
                (None, None) => true,
                _ => false,
            })
    }

    fn save(&self, writer: &mut Writer) {
        let _gil = interpreter::lock();
        let mut attributes: Vec<(&str, String)> = Vec::new();
        match self.object.as_ref().and_then(ScriptObject::class) {
            Some((module, class)) => {
                attributes.push(("module", module.to_string()));
                attributes.push(("class", class.to_string()));
            }
            None => attributes.push(("json", "yes".to_string())),
        }
        if self.object.as_ref().is_some_and(|o| o.has_attr(OBJECT_MARKER)) {
            attributes.push(("object", "yes".to_string()));
        }

        let indent = writer.settings().json_indent;
        self.indent.set(indent);
        let json = self.to_json(indent);
        let mut cdata = None;
        if writer.file_version() <= 1 {
            attributes.push(("value", STANDARD.encode(json.as_bytes())));
            attributes.push(("encoded", "yes".to_string()));
        } else if writer.is_force_xml() {
            if json == "null" {
                attributes.push(("value", json));
            } else if !json.is_empty() {
                attributes.push(("cdata", "1".to_string()));
                cdata = Some(json);
            }
        } else {
            let name = self.base.file_name(Some(writer.owner()), ".json", "");
            let file = writer.add_file(&name);
            attributes.push(("file", file));
        }

        let borrowed: Vec<(&str, &str)> = attributes
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect();
        match cdata {
            Some(json) => {
                writer.start_element(ELEMENT, &borrowed);
                writer.characters(&json);
                writer.end_element(ELEMENT);
            }
            None => writer.empty_element(ELEMENT, &borrowed),
        }
    }

    fn restore(&mut self, reader: &mut Reader) -> Result<bool, PersistError> {
        reader.read_element(ELEMENT)?;
        let element = reader.current_element()?.clone();
        let _gil = interpreter::lock();

        let mut buffer = match element.attribute("value") {
            Some(raw) if element.attribute("encoded") == Some("yes") => {
                match STANDARD.decode(raw.trim()) {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(err) => {
                        error!(%err, "proxy value is not base64");
                        String::new()
                    }
                }
            }
            Some(raw) => decode_value(raw),
            None => String::new(),
        };

        let mut load = Load::Nothing;
        if let (Some(module), Some(class)) = (element.attribute("module"), element.attribute("class"))
        {
            load = self.instantiate(module, class, Load::Json);
        } else if let Some((module, class, body)) = pickle_header(&buffer) {
            load = self.instantiate(module, class, Load::Pickle);
            buffer = body.to_string();
        } else if element.attribute("json").is_some() {
            load = Load::Json;
        }
        let failed = matches!(load, Load::Failed);

        if element.attribute("object") == Some("yes") {
            if let Some(object) = &self.object {
                object.set_value(OBJECT_MARKER, true);
            }
        }

        if element.attribute("cdata").is_some_and(|c| c.trim() == "1") {
            buffer = reader.read_characters();
        } else if let Some(file) = element.attribute("file").filter(|f| !f.is_empty()) {
            if !failed {
                reader.add_file(file);
            }
        }
        reader.read_end_element(ELEMENT)?;

        if !buffer.trim().is_empty() {
            match load {
                Load::Json => self.from_json(&buffer),
                Load::Pickle => self.load_pickle(&buffer),
                Load::Nothing => warn!("proxy value has no format and is ignored"),
                Load::Failed => {}
            }
        }
        Ok(true)
    }

    fn save_doc_file(&self, out: &mut OutputStream<'_>) {
        let _gil = interpreter::lock();
        out.write_raw(self.to_json(self.indent.get()).as_bytes());
    }

    fn restore_doc_file(&mut self, input: &mut InputStream<'_>) -> Result<bool, PersistError> {
        let text = std::str::from_utf8(input.read_to_end()).map_err(|_| PersistError::InvalidText)?;
        let _gil = interpreter::lock();
        self.from_json(text);
        Ok(true)
    }
}
