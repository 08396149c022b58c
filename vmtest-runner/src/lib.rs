// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for vmtest: discovering tests in binaries built for a constrained VM, and
//! running them through the VM's host-side runtime.
//!
//! The basic flow is:
//! 1. [`list::TestDiscoverer`] finds the tests in each binary, along with their source locations.
//! 2. [`runner::TestRunner`] groups the selected tests by binary, launches one runtime process per
//!    binary, and turns the runtime's output into a result per test.
//! 3. [`reporter::TestReporter`] displays results as they arrive, and optionally writes a JUnit
//!    report.

pub mod config;
pub mod errors;
mod helpers;
pub mod list;
pub mod reflect;
pub mod reporter;
pub mod result_parser;
pub mod runner;
pub mod signal;
mod test_command;
pub mod test_filter;
pub mod test_output;
mod time;
