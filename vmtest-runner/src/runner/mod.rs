// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TestRunner`]. Tests are grouped by binary, and each
//! group is run by one supervised runtime process (see [`execute`]).

mod imp;
mod supervisor;

#[cfg(unix)]
#[path = "unix.rs"]
mod os;

#[cfg(windows)]
#[path = "windows.rs"]
mod os;

pub use imp::*;
pub use supervisor::{execute, SessionExit, SessionState, SupervisorSettings, KILL_WAIT_TIMEOUT};
