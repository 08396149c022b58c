// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `vmtest` failures.
///
/// `vmtest` runs may fail for a variety of reasons. This structure documents the exit codes that
/// may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum VmtestExitCode {}

impl VmtestExitCode {
    /// No errors occurred and vmtest exited normally.
    pub const OK: i32 = 0;

    /// No tests were selected to run, but no other errors occurred.
    pub const NO_TESTS_RUN: i32 = 4;

    /// A user issue happened while setting up a vmtest invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// One or more tests failed, or had no determined outcome.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// Discovering tests in one or more binaries produced an error.
    pub const TEST_LIST_CREATION_FAILED: i32 = 104;

    /// Writing data to stdout, stderr or a report file produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
