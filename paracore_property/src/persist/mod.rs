// Copyright 2025 the Paracore Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Persistence plumbing shared by all properties.
//!
//! A document is written as one XML main stream plus any number of side
//! files. Properties write their element through [`Writer`] and may schedule a
//! side file, which the owner later fills through [`OutputStream`]. Reading
//! mirrors this with [`Reader`] and [`InputStream`].

mod reader;
mod settings;
mod stream;
mod writer;

pub use reader::{Reader, RequestedFile, XmlElement, XmlEvent, scan};
pub use settings::{CURRENT_FILE_VERSION, PersistSettings};
pub use stream::{InputStream, OutputStream};
pub use writer::{ScheduledFile, Writer};
