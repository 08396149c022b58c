// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `vmtest` command-line interface.
//!
//! This crate is not meant to be used as a library: its API is unstable and exists to let the
//! binary and its tests share code. Use `vmtest-runner` instead.

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputContext;
