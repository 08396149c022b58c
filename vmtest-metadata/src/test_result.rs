// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::TestResultError;
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// The outcome of executing a single test.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestOutcome {
    /// The runtime reported that the test passed.
    Passed,

    /// The test failed, or its group could not be run to completion.
    Failed,

    /// The runtime reported that the test was skipped.
    Skipped,

    /// The binary containing the test no longer exists.
    NotFound,

    /// No outcome could be determined.
    Unknown,
}

impl TestOutcome {
    /// Returns true if this outcome was determined, i.e. it is not [`Self::Unknown`].
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns true if this outcome should not fail a run.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Passed | Self::Skipped)
    }

    /// Returns the kebab-case name of this outcome.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::NotFound => "not-found",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The result of executing a single test.
///
/// Every result carries enough information to be rendered without access to vmtest internals:
/// passed results carry a duration, and every other outcome carries a human-readable message.
/// Results with an [`Unknown`](TestOutcome::Unknown) outcome carry the raw output of the runtime
/// process, for diagnosis.
///
/// The constructors uphold these invariants, so fields are not public. Deserialization checks them
/// too.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", try_from = "SerializedTestResult")]
pub struct TestResult {
    outcome: TestOutcome,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    duration: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl TestResult {
    /// A passed test that took `duration` to run.
    pub fn passed(duration: Duration) -> Self {
        Self {
            outcome: TestOutcome::Passed,
            duration: Some(duration),
            error_message: None,
        }
    }

    /// A failed test.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            outcome: TestOutcome::Failed,
            duration: None,
            error_message: Some(message.into()),
        }
    }

    /// A skipped test.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            outcome: TestOutcome::Skipped,
            duration: None,
            error_message: Some(reason.into()),
        }
    }

    /// A test whose binary could not be found.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            outcome: TestOutcome::NotFound,
            duration: None,
            error_message: Some(message.into()),
        }
    }

    /// A test with no determined outcome, along with the raw output that explains why.
    pub fn unknown(raw_output: impl Into<String>) -> Self {
        Self {
            outcome: TestOutcome::Unknown,
            duration: None,
            error_message: Some(raw_output.into()),
        }
    }

    /// Returns the outcome.
    pub fn outcome(&self) -> TestOutcome {
        self.outcome
    }

    /// Returns the duration. Only present for passed tests.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Returns the error message, reason or raw output associated with this result.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// The unchecked serialized form of a [`TestResult`].
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SerializedTestResult {
    outcome: TestOutcome,
    #[serde(default, with = "humantime_serde")]
    duration: Option<Duration>,
    #[serde(default)]
    error_message: Option<String>,
}

impl TryFrom<SerializedTestResult> for TestResult {
    type Error = TestResultError;

    fn try_from(value: SerializedTestResult) -> Result<Self, Self::Error> {
        let SerializedTestResult {
            outcome,
            duration,
            error_message,
        } = value;

        match (outcome, duration, error_message) {
            (TestOutcome::Passed, Some(duration), None) => Ok(Self::passed(duration)),
            (TestOutcome::Passed, None, _) => Err(TestResultError::MissingDuration),
            (TestOutcome::Passed, Some(_), Some(_)) => Err(TestResultError::UnexpectedMessage),
            (outcome, Some(_), _) => Err(TestResultError::UnexpectedDuration { outcome }),
            (outcome, None, None) => Err(TestResultError::MissingMessage { outcome }),
            (outcome, None, Some(error_message)) => Ok(Self {
                outcome,
                duration: None,
                error_message: Some(error_message),
            }),
        }
    }
}
