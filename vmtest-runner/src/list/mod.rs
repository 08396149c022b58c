// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovering the tests in test binaries.
//!
//! Discovery for a binary has three parts:
//! * locating the source files of the project the binary was built from
//! * reading the binary's type metadata through an [`AssemblyReflector`](crate::reflect::AssemblyReflector)
//! * emitting a [`TestCaseModel`](vmtest_metadata::TestCaseModel) per test method, with a source
//!   location if one can be found
//!
//! [`TestDiscoverer`] ties these together.

mod discovery;
mod output_format;
mod scanner;
mod source_locator;
mod source_map;

pub use discovery::*;
pub use output_format::{OutputFormat, SerializableFormat};
pub(crate) use output_format::Styles;
pub use scanner::*;
pub use source_locator::*;
pub use source_map::*;
