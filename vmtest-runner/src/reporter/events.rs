// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::runner::{GroupStatus, RunStats};
use camino::Utf8Path;
use chrono::{DateTime, FixedOffset};
use std::time::Duration;
use vmtest_metadata::{TestCaseModel, TestResult};

/// A test event.
///
/// Events are produced by a [`TestRunner`](crate::runner::TestRunner) and consumed by a
/// [`TestReporter`](crate::reporter::TestReporter).
#[derive(Clone, Debug)]
pub struct TestEvent<'a> {
    /// The time at which the event was generated, including the offset from UTC.
    pub timestamp: DateTime<FixedOffset>,

    /// The amount of time elapsed since the start of the test run.
    pub elapsed: Duration,

    /// The kind of test event this is.
    pub kind: TestEventKind<'a>,
}

/// The kind of test event this is.
///
/// Forms part of [`TestEvent`].
#[derive(Clone, Debug)]
pub enum TestEventKind<'a> {
    /// The test run started.
    RunStarted {
        /// The number of tests that will be run.
        test_count: usize,

        /// The number of runtime launches, one per test binary.
        group_count: usize,
    },

    /// A test finished and has a result.
    ///
    /// Results are reported in batches, once the runtime for the test's binary is done.
    TestFinished {
        /// The test.
        test: &'a TestCaseModel,

        /// Its result.
        result: TestResult,
    },

    /// All tests in one binary were finalized.
    GroupFinished {
        /// The test binary.
        binary: &'a Utf8Path,

        /// The number of tests in the binary that were requested.
        test_count: usize,

        /// What happened to the runtime process.
        status: GroupStatus,

        /// How long the runtime process took, if it was started.
        time_taken: Duration,
    },

    /// A cancellation notice was received.
    RunBeginCancel {
        /// The reason the run is being cancelled.
        reason: CancelReason,
    },

    /// The test run finished.
    RunFinished {
        /// The time at which the run was started.
        start_time: DateTime<FixedOffset>,

        /// The amount of time it took for the tests to run.
        elapsed: Duration,

        /// Statistics for the run.
        run_stats: RunStats,
    },
}

/// The reason why a test run is being cancelled.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum CancelReason {
    /// Cancellation was requested through a [`CancelHandle`](crate::runner::CancelHandle).
    Requested,

    /// An error occurred while reporting results.
    ReportError,

    /// A termination signal (on Unix, SIGTERM or SIGHUP) was received.
    Signal,

    /// An interrupt (on Unix, Ctrl-C) was received.
    Interrupt,
}

impl CancelReason {
    pub(crate) fn to_static_str(self) -> &'static str {
        match self {
            CancelReason::Requested => "cancellation request",
            CancelReason::ReportError => "reporting error",
            CancelReason::Signal => "signal",
            CancelReason::Interrupt => "interrupt",
        }
    }
}
