// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-readable data produced by vmtest.
//!
//! Discovery produces a sequence of [`TestCaseModel`]s, and execution produces exactly one
//! [`TestResult`] per model. Both serialize to JSON with kebab-case keys, so that a host test
//! runner can consume `vmtest list --message-format json` without linking against the runner.

mod errors;
mod exit_codes;
mod test_case;
mod test_result;

pub use errors::*;
pub use exit_codes::*;
pub use test_case::*;
pub use test_result::*;
