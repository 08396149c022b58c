// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by vmtest.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error, fmt, io, sync::Arc};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse vmtest config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<ConfigError>),

    /// The reflector command was empty.
    #[error("`discovery.reflector` must contain at least the program to run")]
    EmptyReflector,

    /// The runtime timeout was zero, which would time out every binary immediately.
    #[error("`runtime.timeout` must be greater than zero")]
    ZeroTimeout,
}

/// An error that occurred while building a [`TestFilter`](crate::test_filter::TestFilter).
#[derive(Debug, Error)]
#[error("error building test name filter")]
pub struct TestFilterBuildError {
    #[from]
    error: aho_corasick::BuildError,
}

/// An error that occurred while obtaining type metadata for a test binary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReflectError {
    /// The reflector command has no program.
    #[error("reflector command is empty")]
    EmptyCommand,

    /// The reflection helper could not be started.
    #[error("failed to run reflector `{program}`")]
    Exec {
        /// The program that was run.
        program: String,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The reflection helper exited unsuccessfully.
    #[error(
        "reflector `{program}` exited with {status}\n--- stderr:\n{trimmed}\n---",
        trimmed = .stderr.trim_end(),
    )]
    Failed {
        /// The program that was run.
        program: String,

        /// A description of the exit status.
        status: String,

        /// The standard error of the reflector.
        stderr: String,
    },

    /// The output of the reflection helper could not be parsed.
    #[error("failed to parse output of reflector `{program}` as JSON")]
    Parse {
        /// The program that was run.
        program: String,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

/// An error that occurred while discovering tests in a single binary.
///
/// These errors are scoped to one binary: discovery in other binaries carries on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoverBinaryError {
    /// The test binary does not exist.
    #[error("test binary `{binary}` does not exist")]
    BinaryNotFound {
        /// The binary path.
        binary: Utf8PathBuf,
    },

    /// The binary's type metadata could not be obtained.
    #[error("failed to load type metadata from `{binary}`")]
    Reflect {
        /// The binary path.
        binary: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: ReflectError,
    },
}

/// An error that occurred while resolving the artifacts the runtime should load.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ArtifactResolveError {
    /// The test binary has no parent directory.
    #[error("test binary `{binary}` has no parent directory")]
    NoParentDir {
        /// The binary path.
        binary: Utf8PathBuf,
    },

    /// A required artifact is missing.
    #[error("required runtime artifact `{path}` not found")]
    Missing {
        /// The path the artifact was expected at.
        path: Utf8PathBuf,
    },

    /// The binary's directory could not be read.
    #[error("error reading directory `{dir}`")]
    ReadDir {
        /// The directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: Arc<io::Error>,
    },
}

/// An error that occurred while starting the runtime process.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ChildStartError {
    /// The artifacts to load could not be resolved.
    #[error("error resolving artifacts to load")]
    ResolveArtifacts(#[source] ArtifactResolveError),

    /// The process could not be spawned.
    #[error("error spawning `{program}`")]
    Spawn {
        /// The program that was run.
        program: String,

        /// The underlying error.
        #[source]
        error: Arc<io::Error>,
    },
}

/// An error that occurred while reading from or waiting on the runtime process.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ChildFdError {
    /// An error occurred while reading standard output.
    #[error("error reading standard output")]
    ReadStdout(#[source] Arc<io::Error>),

    /// An error occurred while reading standard error.
    #[error("error reading standard error")]
    ReadStderr(#[source] Arc<io::Error>),

    /// An error occurred while waiting for the child process to exit.
    #[error("error waiting for child process to exit")]
    Wait(#[source] Arc<io::Error>),
}

/// An error that occurred while setting up the signal handler.
#[derive(Debug, Error)]
#[error("error setting up signal handler")]
pub struct SignalHandlerSetupError(#[from] io::Error);

/// An error that occurred while building the test runner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestRunnerBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] io::Error),

    /// An error occurred while setting up signals.
    #[error("error setting up signals")]
    SignalHandlerSetupError(#[from] SignalHandlerSetupError),

    /// The runtime timeout was zero.
    #[error("runtime timeout must be greater than zero")]
    ZeroTimeout,
}

/// An error that occurs while writing list output.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteTestListError {
    /// An error occurred while writing the list to the provided output.
    #[error("error writing to output")]
    Io(#[source] io::Error),

    /// An error occurred while serializing JSON, or while writing it to the provided output.
    #[error("error serializing to JSON")]
    Json(#[source] serde_json::Error),
}

/// An error that occurs while writing an event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing the event to the provided output.
    #[error("error writing to output")]
    Io(#[source] io::Error),

    /// An error occurred while operating on the file system.
    #[error("error operating on path {file}")]
    Fs {
        /// The file being operated on.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: io::Error,
    },

    /// An error occurred while producing JUnit XML.
    #[error("error writing JUnit output to {file}")]
    Junit {
        /// The output file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: Box<dyn error::Error + Send + Sync>,
    },
}

/// Displays an error along with the chain of errors that caused it.
///
/// Each cause is printed on its own line, prefixed with "caused by".
pub struct DisplayErrorChain<E>(E);

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self(error)
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;

        let mut cause = self.0.source();
        while let Some(error) = cause {
            write!(f, "\n  caused by:\n  - {error}")?;
            cause = error.source();
        }

        Ok(())
    }
}
