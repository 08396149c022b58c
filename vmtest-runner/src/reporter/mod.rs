// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Report the results of a test run in human and machine-readable formats.
//!
//! The main type here is [`TestReporter`], which is constructed via a [`ReporterBuilder`].

mod displayer;
mod events;
mod imp;
mod junit;

pub use events::*;
pub use imp::*;
