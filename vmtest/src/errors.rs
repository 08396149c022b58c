// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{StderrStyles, NO_HEADING_TARGET};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;
use vmtest_metadata::VmtestExitCode;
use vmtest_runner::errors::*;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that vmtest expects can happen, with a documented exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine current directory")]
    CurrentDirFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { path: std::path::PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("reflector setup error")]
    ReflectorSetupError {
        #[from]
        err: ReflectError,
    },
    #[error("test filter build error")]
    TestFilterBuildError {
        #[from]
        err: TestFilterBuildError,
    },
    #[error("test runner build error")]
    TestRunnerBuildError {
        #[from]
        err: TestRunnerBuildError,
    },
    #[error("discovery failed")]
    DiscoveryFailed { binaries: Vec<Utf8PathBuf> },
    #[error("no tests to run")]
    NoTestsRun,
    #[error("test run failed")]
    TestRunFailed,
    #[error("error writing test list")]
    WriteTestListError {
        #[from]
        err: WriteTestListError,
    },
    #[error("error writing event")]
    WriteEventError {
        #[from]
        err: WriteEventError,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::ReflectorSetupError { .. }
            | Self::TestFilterBuildError { .. }
            | Self::TestRunnerBuildError { .. } => VmtestExitCode::SETUP_ERROR,
            Self::DiscoveryFailed { .. } => VmtestExitCode::TEST_LIST_CREATION_FAILED,
            Self::NoTestsRun => VmtestExitCode::NO_TESTS_RUN,
            Self::TestRunFailed => VmtestExitCode::TEST_RUN_FAILED,
            Self::WriteTestListError { .. } | Self::WriteEventError { .. } => {
                VmtestExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirFailed { err } => {
                error!("could not determine current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { path } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse vmtest config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::ReflectorSetupError { err } => {
                error!("failed to set up the reflection helper");
                Some(err as &dyn Error)
            }
            Self::TestFilterBuildError { err } => {
                error!("failed to build test filter");
                Some(err as &dyn Error)
            }
            Self::TestRunnerBuildError { err } => {
                error!("failed to build test runner");
                Some(err as &dyn Error)
            }
            Self::DiscoveryFailed { binaries } => {
                let count = binaries.len();
                error!(
                    "discovery failed for {} {}",
                    count.style(styles.bold),
                    if count == 1 { "binary" } else { "binaries" },
                );
                for binary in binaries {
                    error!(target: NO_HEADING_TARGET, "  - {binary}");
                }
                None
            }
            Self::NoTestsRun => {
                error!("no tests to run");
                None
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
            Self::WriteTestListError { err } => {
                error!("failed to write test list to output");
                Some(err as &dyn Error)
            }
            Self::WriteEventError { err } => {
                error!("failed to write event to output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(
                target: NO_HEADING_TARGET,
                "\n{}:\n  {}",
                "Caused by".style(styles.warning_text),
                err,
            );
            next_error = err.source();
        }
    }
}
