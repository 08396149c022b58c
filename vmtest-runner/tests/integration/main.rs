// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests that drive the fake runtime and reflector helper binaries.

mod discovery;
mod fixtures;
mod run;
mod supervisor;
