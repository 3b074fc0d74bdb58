// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Read access to a document and its views while children are claimed.

use paracore_document::{Document, DocumentObject};

use crate::gui_document::GuiDocument;
use crate::provider::ViewProvider;

/// The document and the view providers showing it, looked up by object name.
#[derive(Clone, Copy, Debug)]
pub struct ViewContext<'a> {
    document: &'a Document,
    gui: &'a GuiDocument,
}

impl<'a> ViewContext<'a> {
    /// Creates a context over `document` and its views.
    #[must_use]
    pub fn new(document: &'a Document, gui: &'a GuiDocument) -> Self {
        Self { document, gui }
    }

    /// Returns the document.
    #[must_use]
    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// Returns the live object named `name`.
    #[must_use]
    pub fn object(&self, name: &str) -> Option<&'a dyn DocumentObject> {
        self.document.object_by_name(name)
    }

    /// Returns the view provider of the object named `name`.
    #[must_use]
    pub fn view_provider(&self, name: &str) -> Option<&'a dyn ViewProvider> {
        self.gui.view_provider(self.document.id_of(name)?)
    }
}
