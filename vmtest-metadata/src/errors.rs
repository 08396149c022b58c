// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::TestOutcome;
use std::{error, fmt};

/// An error that occurs while constructing a [`TestCaseModel`](crate::TestCaseModel).
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum TestCaseModelError {
    /// The source binary path was empty.
    EmptyBinaryPath {
        /// The fully qualified name of the test that was being constructed.
        name: String,
    },

    /// The declaring type or method name was empty.
    EmptyName {
        /// The source binary the test was discovered in.
        binary: String,
    },
}

impl fmt::Display for TestCaseModelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::EmptyBinaryPath { name } => {
                write!(f, "test `{name}` has an empty source binary path")
            }
            Self::EmptyName { binary } => {
                write!(
                    f,
                    "test in `{binary}` has an empty declaring type or method name"
                )
            }
        }
    }
}

impl error::Error for TestCaseModelError {}

/// An error that occurs while deserializing a [`TestResult`](crate::TestResult) whose fields don't
/// match its outcome.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum TestResultError {
    /// A passed result had no duration.
    MissingDuration,

    /// A result other than a passed one had a duration.
    UnexpectedDuration {
        /// The outcome of the result.
        outcome: TestOutcome,
    },

    /// A result other than a passed one had no message.
    MissingMessage {
        /// The outcome of the result.
        outcome: TestOutcome,
    },

    /// A passed result had a message.
    UnexpectedMessage,
}

impl fmt::Display for TestResultError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingDuration => write!(f, "passed result must have a duration"),
            Self::UnexpectedDuration { outcome } => {
                write!(f, "{outcome} result must not have a duration")
            }
            Self::MissingMessage { outcome } => {
                write!(f, "{outcome} result must have an error message")
            }
            Self::UnexpectedMessage => write!(f, "passed result must not have an error message"),
        }
    }
}

impl error::Error for TestResultError {}
