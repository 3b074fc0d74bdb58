// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Writer configuration.

use serde::{Deserialize, Serialize};

use crate::error::PersistError;

/// The document schema written by this crate.
pub const CURRENT_FILE_VERSION: u32 = 4;

/// Controls how properties are written.
///
/// The format choice for a property depends only on these settings (and, for
/// lists, on whether the list is empty), never on the data itself.
///
/// # Example
///
/// ```rust
/// use paracore_property::PersistSettings;
///
/// let settings = PersistSettings::from_toml_str("force_xml = true").unwrap();
/// assert!(settings.force_xml);
/// assert!(settings.side_files);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistSettings {
    /// Write list data inline even when side files are available.
    pub force_xml: bool,
    /// Use the binary encoding for side files.
    pub prefer_binary: bool,
    /// Whether the destination can hold side files at all.
    pub side_files: bool,
    /// The schema version to write. Versions up to 1 use the legacy encoded
    /// form for script proxy values.
    pub file_version: u32,
    /// Indentation used for JSON-encoded proxy state.
    pub json_indent: usize,
}

impl Default for PersistSettings {
    fn default() -> Self {
        Self {
            force_xml: false,
            prefer_binary: true,
            side_files: true,
            file_version: CURRENT_FILE_VERSION,
            json_indent: 2,
        }
    }
}

impl PersistSettings {
    /// Parses settings from TOML. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, PersistError> {
        toml::from_str(text).map_err(|e| PersistError::Settings(e.to_string()))
    }

    /// Renders the settings as TOML.
    pub fn to_toml_string(&self) -> Result<String, PersistError> {
        toml::to_string(self).map_err(|e| PersistError::Settings(e.to_string()))
    }

    /// Returns `true` if list data can go to side files.
    #[must_use]
    pub fn can_save_stream(&self) -> bool {
        self.side_files
    }
}
