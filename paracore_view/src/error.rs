// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for view operations.

use paracore_document::ObjectId;
use paracore_property::PropertyError;
use thiserror::Error;

/// Errors raised while keeping views in sync with a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// The id does not refer to a live object.
    #[error("object {0:?} is not in the document")]
    NotFound(ObjectId),

    /// Writing a cache property on the object failed.
    #[error(transparent)]
    Property(#[from] PropertyError),
}
