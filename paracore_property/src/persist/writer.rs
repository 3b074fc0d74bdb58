// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element stream writer.

use hashbrown::HashSet;

use crate::persist::settings::PersistSettings;

/// A side file scheduled by a property while writing the main stream.
///
/// The owner writes the main stream first, then asks each scheduling
/// property for the file contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledFile {
    /// The unique file name referenced from the main stream.
    pub file_name: String,
    /// The container that owns the property (empty for a bare property).
    pub owner: String,
    /// The property that produces the contents.
    pub property: String,
}

/// Writes the main document stream as indented XML elements.
///
/// # Example
///
/// ```rust
/// use paracore_property::{PersistSettings, Writer};
///
/// let mut writer = Writer::new(PersistSettings::default());
/// writer.start_element("Properties", &[("Count", "1")]);
/// writer.empty_element("Integer", &[("value", "42")]);
/// writer.end_element("Properties");
///
/// assert_eq!(
///     writer.as_str(),
///     "<Properties Count=\"1\">\n    <Integer value=\"42\"/>\n</Properties>\n",
/// );
/// ```
#[derive(Debug)]
pub struct Writer {
    out: String,
    indent: usize,
    settings: PersistSettings,
    files: Vec<ScheduledFile>,
    file_names: HashSet<String>,
    context: (String, String),
}

impl Writer {
    /// Creates an empty writer.
    #[must_use]
    pub fn new(settings: PersistSettings) -> Self {
        Self {
            out: String::new(),
            indent: 0,
            settings,
            files: Vec::new(),
            file_names: HashSet::new(),
            context: (String::new(), String::new()),
        }
    }

    /// Returns the settings this writer was created with.
    #[must_use]
    pub fn settings(&self) -> &PersistSettings {
        &self.settings
    }

    /// Shorthand for [`PersistSettings::force_xml`].
    #[must_use]
    pub fn is_force_xml(&self) -> bool {
        self.settings.force_xml
    }

    /// Shorthand for [`PersistSettings::prefer_binary`].
    #[must_use]
    pub fn is_prefer_binary(&self) -> bool {
        self.settings.prefer_binary
    }

    /// Shorthand for [`PersistSettings::file_version`].
    #[must_use]
    pub fn file_version(&self) -> u32 {
        self.settings.file_version
    }

    /// Returns `true` if side files can be written.
    #[must_use]
    pub fn can_save_stream(&self) -> bool {
        self.settings.can_save_stream()
    }

    /// Sets the owner and property that subsequent [`add_file`](Self::add_file)
    /// calls are attributed to.
    pub fn set_context(&mut self, owner: &str, property: &str) {
        owner.clone_into(&mut self.context.0);
        property.clone_into(&mut self.context.1);
    }

    /// Returns the full name of the container currently being written.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.context.0
    }

    /// Schedules a side file and returns the unique name to reference.
    ///
    /// If `name` is taken, a numeric suffix is inserted before the extension.
    pub fn add_file(&mut self, name: &str) -> String {
        let mut unique = name.to_string();
        let mut n = 1_u32;
        while self.file_names.contains(&unique) {
            unique = match name.rsplit_once('.') {
                Some((stem, ext)) => format!("{stem}{n}.{ext}"),
                None => format!("{name}{n}"),
            };
            n += 1;
        }
        self.file_names.insert(unique.clone());
        self.files.push(ScheduledFile {
            file_name: unique.clone(),
            owner: self.context.0.clone(),
            property: self.context.1.clone(),
        });
        unique
    }

    /// Returns the side files scheduled so far.
    #[must_use]
    pub fn scheduled_files(&self) -> &[ScheduledFile] {
        &self.files
    }

    /// Writes `<name attrs...>` and indents.
    pub fn start_element(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.open_tag(name, attributes);
        self.out.push_str(">\n");
        self.indent += 1;
    }

    /// Writes `<name attrs.../>`.
    pub fn empty_element(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.open_tag(name, attributes);
        self.out.push_str("/>\n");
    }

    /// Outdents and writes `</name>`.
    pub fn end_element(&mut self, name: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.write_indent();
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push_str(">\n");
    }

    /// Writes character data that is read back verbatim.
    pub fn characters(&mut self, text: &str) {
        self.write_indent();
        self.out.push_str("<![CDATA[");
        // A literal terminator is split across two sections.
        self.out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
        self.out.push_str("]]>\n");
    }

    /// Returns the text written so far.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Consumes the writer, returning the main stream and the scheduled files.
    #[must_use]
    pub fn finish(self) -> (String, Vec<ScheduledFile>) {
        (self.out, self.files)
    }

    fn open_tag(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.write_indent();
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attributes {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            escape_into(&mut self.out, value);
            self.out.push('"');
        }
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_are_escaped() {
        let mut writer = Writer::new(PersistSettings::default());
        writer.empty_element("String", &[("value", "a<b & \"c\"\n")]);
        assert_eq!(
            writer.as_str(),
            "<String value=\"a&lt;b &amp; &quot;c&quot;&#10;\"/>\n"
        );
    }

    #[test]
    fn file_names_are_unique() {
        let mut writer = Writer::new(PersistSettings::default());
        writer.set_context("Box", "Values");
        assert_eq!(writer.add_file("Box.Values.bin"), "Box.Values.bin");
        assert_eq!(writer.add_file("Box.Values.bin"), "Box.Values1.bin");
        assert_eq!(writer.add_file("Box.Values.bin"), "Box.Values2.bin");
        let files = writer.scheduled_files();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].owner, "Box");
        assert_eq!(files[0].property, "Values");
    }

    #[test]
    fn nested_elements_indent() {
        let mut writer = Writer::new(PersistSettings::default());
        writer.start_element("A", &[]);
        writer.start_element("B", &[]);
        writer.end_element("B");
        writer.end_element("A");
        assert_eq!(writer.as_str(), "<A>\n    <B>\n    </B>\n</A>\n");
    }
}
