// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element stream reader.
//!
//! The main stream is scanned once into a flat event list. [`Reader`] is a
//! cursor over those events with the lookups properties need during restore.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_till, take_until, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{map, opt, value},
    multi::many0,
    sequence::{delimited, preceded},
};

use crate::error::PersistError;

/// A start tag with its attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlElement {
    /// The element name.
    pub name: String,
    /// Attributes in document order, unescaped.
    pub attributes: Vec<(String, String)>,
}

impl XmlElement {
    /// Returns the value of an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// One scanned item of the main stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    /// A start tag. Empty elements are followed by a matching [`XmlEvent::End`].
    Start(XmlElement),
    /// An end tag.
    End(String),
    /// Character data or a CDATA section.
    Text(String),
}

fn xml_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')).parse(input)
}

fn attribute(input: &str) -> IResult<&str, (&str, &str)> {
    (
        preceded(multispace1, xml_name),
        preceded(
            (multispace0, char('='), multispace0),
            alt((
                delimited(char('"'), take_till(|c| c == '"'), char('"')),
                delimited(char('\''), take_till(|c| c == '\''), char('\'')),
            )),
        ),
    )
        .parse(input)
}

fn start_tag(input: &str) -> IResult<&str, Vec<XmlEvent>> {
    map(
        (
            char('<'),
            xml_name,
            many0(attribute),
            multispace0,
            opt(char('/')),
            char('>'),
        ),
        |(_, name, attributes, _, slash, _)| {
            let element = XmlElement {
                name: name.to_string(),
                attributes: attributes
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), unescape(v)))
                    .collect(),
            };
            if slash.is_some() {
                vec![XmlEvent::Start(element), XmlEvent::End(name.to_string())]
            } else {
                vec![XmlEvent::Start(element)]
            }
        },
    )
    .parse(input)
}

fn end_tag(input: &str) -> IResult<&str, Vec<XmlEvent>> {
    map(
        delimited(tag("</"), xml_name, (multispace0, char('>'))),
        |name: &str| vec![XmlEvent::End(name.to_string())],
    )
    .parse(input)
}

fn cdata(input: &str) -> IResult<&str, Vec<XmlEvent>> {
    map(
        delimited(tag("<![CDATA["), take_until("]]>"), tag("]]>")),
        |text: &str| vec![XmlEvent::Text(text.to_string())],
    )
    .parse(input)
}

fn ignorable(input: &str) -> IResult<&str, Vec<XmlEvent>> {
    value(
        Vec::new(),
        alt((
            delimited(tag("<?"), take_until("?>"), tag("?>")),
            delimited(tag("<!--"), take_until("-->"), tag("-->")),
        )),
    )
    .parse(input)
}

fn text(input: &str) -> IResult<&str, Vec<XmlEvent>> {
    map(take_till(|c| c == '<'), |text: &str| {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![XmlEvent::Text(unescape(trimmed))]
        }
    })
    .parse(input)
}

fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#10;", "\n")
        .replace("&#13;", "\r")
        .replace("&#9;", "\t")
        .replace("&amp;", "&")
}

/// Scans a main stream into events.
///
/// Declarations and comments are dropped. Adjacent CDATA sections are merged
/// into one text event.
pub fn scan(document: &str) -> Result<Vec<XmlEvent>, PersistError> {
    let mut events: Vec<XmlEvent> = Vec::new();
    let mut input = document;
    while !input.is_empty() {
        let (rest, scanned) = alt((ignorable, cdata, end_tag, start_tag, text))
            .parse(input)
            .map_err(|_| PersistError::Syntax(input.chars().take(24).collect()))?;
        if rest.len() == input.len() {
            return Err(PersistError::Syntax(input.chars().take(24).collect()));
        }
        for event in scanned {
            match (events.last_mut(), event) {
                (Some(XmlEvent::Text(prev)), XmlEvent::Text(next)) => prev.push_str(&next),
                (_, event) => events.push(event),
            }
        }
        input = rest;
    }
    Ok(events)
}

/// A side file requested while reading the main stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestedFile {
    /// The file name referenced from the main stream.
    pub file_name: String,
    /// The container that owns the requesting property.
    pub owner: String,
    /// The requesting property.
    pub property: String,
}

/// Cursor over a scanned main stream.
///
/// # Example
///
/// ```rust
/// use paracore_property::Reader;
///
/// let mut reader = Reader::new("<Properties Count=\"2\"><A/></Properties>").unwrap();
/// reader.read_element("Properties").unwrap();
/// assert_eq!(reader.attribute_as_u64("Count").unwrap(), 2);
/// reader.read_element("A").unwrap();
/// reader.read_end_element("Properties").unwrap();
/// ```
#[derive(Debug)]
pub struct Reader {
    events: Vec<XmlEvent>,
    pos: usize,
    current: Option<usize>,
    file_version: u32,
    files: Vec<RequestedFile>,
    context: (String, String),
}

impl Reader {
    /// Scans `document` and positions the cursor at its start.
    pub fn new(document: &str) -> Result<Self, PersistError> {
        Ok(Self {
            events: scan(document)?,
            pos: 0,
            current: None,
            file_version: 0,
            files: Vec::new(),
            context: (String::new(), String::new()),
        })
    }

    /// Returns the file version declared by the document envelope.
    #[must_use]
    pub fn file_version(&self) -> u32 {
        self.file_version
    }

    /// Records the file version declared by the document envelope.
    pub fn set_file_version(&mut self, version: u32) {
        self.file_version = version;
    }

    /// Sets the owner and property that later file requests belong to.
    pub fn set_context(&mut self, owner: &str, property: &str) {
        owner.clone_into(&mut self.context.0);
        property.clone_into(&mut self.context.1);
    }

    /// Requests a side file for the current owner and property.
    pub fn add_file(&mut self, file_name: &str) {
        self.files.push(RequestedFile {
            file_name: file_name.to_string(),
            owner: self.context.0.clone(),
            property: self.context.1.clone(),
        });
    }

    /// Returns the side files requested so far.
    #[must_use]
    pub fn requested_files(&self) -> &[RequestedFile] {
        &self.files
    }

    /// Takes the side files requested so far.
    pub fn take_requested_files(&mut self) -> Vec<RequestedFile> {
        core::mem::take(&mut self.files)
    }

    /// Advances to the next start tag named `name`, skipping anything before it.
    pub fn read_element(&mut self, name: &str) -> Result<(), PersistError> {
        while let Some(event) = self.events.get(self.pos) {
            self.pos += 1;
            if let XmlEvent::Start(element) = event {
                if element.name == name {
                    self.current = Some(self.pos - 1);
                    return Ok(());
                }
            }
        }
        Err(PersistError::UnexpectedElement {
            expected: name.to_string(),
            found: "end of document".to_string(),
        })
    }

    /// Advances to the next start tag, whatever its name.
    ///
    /// Returns the element name, or `None` if an end tag comes first.
    pub fn read_next_element(&mut self) -> Option<String> {
        while let Some(event) = self.events.get(self.pos) {
            match event {
                XmlEvent::Start(element) => {
                    self.current = Some(self.pos);
                    self.pos += 1;
                    return Some(element.name.clone());
                }
                XmlEvent::End(_) => return None,
                XmlEvent::Text(_) => self.pos += 1,
            }
        }
        None
    }

    /// Advances past the next end tag named `name`.
    pub fn read_end_element(&mut self, name: &str) -> Result<(), PersistError> {
        while let Some(event) = self.events.get(self.pos) {
            self.pos += 1;
            if matches!(event, XmlEvent::End(end) if end == name) {
                return Ok(());
            }
        }
        Err(PersistError::UnexpectedElement {
            expected: format!("/{name}"),
            found: "end of document".to_string(),
        })
    }

    /// Skips the rest of the current element, including nested elements.
    pub fn skip_element(&mut self) -> Result<(), PersistError> {
        let name = self.current_element()?.name.clone();
        let mut depth = 0_usize;
        while let Some(event) = self.events.get(self.pos) {
            self.pos += 1;
            match event {
                XmlEvent::Start(_) => depth += 1,
                XmlEvent::End(end) if depth == 0 && *end == name => return Ok(()),
                XmlEvent::End(_) => depth = depth.saturating_sub(1),
                XmlEvent::Text(_) => {}
            }
        }
        Err(PersistError::UnexpectedElement {
            expected: format!("/{name}"),
            found: "end of document".to_string(),
        })
    }

    /// Reads the character data directly inside the current element.
    ///
    /// Returns an empty string if the element has none.
    pub fn read_characters(&mut self) -> String {
        match self.events.get(self.pos) {
            Some(XmlEvent::Text(text)) => {
                self.pos += 1;
                text.clone()
            }
            _ => String::new(),
        }
    }

    /// Returns the element most recently read.
    pub fn current_element(&self) -> Result<&XmlElement, PersistError> {
        match self.current.and_then(|i| self.events.get(i)) {
            Some(XmlEvent::Start(element)) => Ok(element),
            _ => Err(PersistError::UnexpectedElement {
                expected: "an element".to_string(),
                found: "nothing".to_string(),
            }),
        }
    }

    /// Returns an attribute of the current element.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.current_element().ok()?.attribute(name)
    }

    /// Returns `true` if the current element carries the attribute.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Returns a required attribute of the current element.
    pub fn require_attribute(&self, name: &str) -> Result<&str, PersistError> {
        let element = self.current_element()?;
        element
            .attribute(name)
            .ok_or_else(|| PersistError::MissingAttribute {
                element: element.name.clone(),
                attribute: name.to_string(),
            })
    }

    /// Parses a required attribute as an unsigned integer.
    pub fn attribute_as_u64(&self, name: &str) -> Result<u64, PersistError> {
        let raw = self.require_attribute(name)?;
        raw.trim()
            .parse()
            .map_err(|_| PersistError::InvalidNumber(raw.to_string()))
    }

    /// Parses a required attribute as a signed integer.
    pub fn attribute_as_i64(&self, name: &str) -> Result<i64, PersistError> {
        let raw = self.require_attribute(name)?;
        raw.trim()
            .parse()
            .map_err(|_| PersistError::InvalidNumber(raw.to_string()))
    }

    /// Parses a required attribute as a float.
    pub fn attribute_as_f64(&self, name: &str) -> Result<f64, PersistError> {
        let raw = self.require_attribute(name)?;
        raw.trim()
            .parse()
            .map_err(|_| PersistError::InvalidNumber(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_handles_empty_and_nested_elements() {
        let events = scan("<?xml version='1.0'?>\n<A x=\"1\">\n  <B/>\n</A>").unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], XmlEvent::Start(e) if e.name == "A"));
        assert!(matches!(&events[1], XmlEvent::Start(e) if e.name == "B"));
        assert_eq!(events[2], XmlEvent::End("B".into()));
        assert_eq!(events[3], XmlEvent::End("A".into()));
    }

    #[test]
    fn attributes_are_unescaped() {
        let events = scan("<S value=\"a&lt;b &amp;&#10;c\"/>").unwrap();
        let XmlEvent::Start(element) = &events[0] else {
            panic!("expected a start tag");
        };
        assert_eq!(element.attribute("value"), Some("a<b &\nc"));
    }

    #[test]
    fn split_cdata_is_merged() {
        let events = scan("<P><![CDATA[a]]]]><![CDATA[>b]]></P>").unwrap();
        assert_eq!(events[1], XmlEvent::Text("a]]>b".into()));
    }

    #[test]
    fn comments_are_skipped() {
        let events = scan("<!-- note --><A/>").unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn malformed_input_is_a_syntax_error() {
        assert!(matches!(scan("<A x=1>"), Err(PersistError::Syntax(_))));
    }

    #[test]
    fn skip_element_skips_nested_content() {
        let mut reader = Reader::new("<A><B><A/></B></A><C/>").unwrap();
        reader.read_element("B").unwrap();
        reader.skip_element().unwrap();
        assert_eq!(reader.read_next_element(), None);
        reader.read_end_element("A").unwrap();
        assert_eq!(reader.read_next_element().as_deref(), Some("C"));
    }

    #[test]
    fn missing_attribute_is_reported() {
        let mut reader = Reader::new("<A/>").unwrap();
        reader.read_element("A").unwrap();
        assert_eq!(
            reader.attribute_as_u64("count"),
            Err(PersistError::MissingAttribute {
                element: "A".into(),
                attribute: "count".into()
            })
        );
    }

    #[test]
    fn file_requests_carry_context() {
        let mut reader = Reader::new("<A/>").unwrap();
        reader.set_context("Box", "Values");
        reader.add_file("Box.Values.bin");
        assert_eq!(reader.requested_files()[0].owner, "Box");
        assert_eq!(reader.take_requested_files().len(), 1);
        assert!(reader.requested_files().is_empty());
    }
}
