// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of the result lines printed by the runtime's test launcher.
//!
//! The launcher prints one line per finished test, followed by a completion marker:
//!
//! ```text
//! Test passed: <MethodName>, <TickCount>
//! Test failed: <MethodName>, <ErrorMessage>
//! Test skipped: <MethodName>, <Reason>
//! Done.
//! ```
//!
//! Everything else is diagnostic noise. It is ignored while parsing but kept in the raw output
//! attached to results that need an explanation.
//!
//! Results are correlated with pending tests by display name. Two pending tests with the same
//! display name cannot be told apart: every result line for that name is attributed to the first of
//! them, and the others are left without a reported result.

use std::{borrow::Borrow, time::Duration};
use tracing::{debug, warn};
use vmtest_metadata::{TestCaseModel, TestResult};

/// Marks a passed test.
pub const PASSED_MARKER: &str = "Test passed: ";

/// Marks a failed test.
pub const FAILED_MARKER: &str = "Test failed: ";

/// Marks a skipped test.
pub const SKIPPED_MARKER: &str = "Test skipped: ";

/// Printed once after every test in the loaded binaries has run.
pub const DONE_MARKER: &str = "Done.";

/// The length of the separator between the method name and the rest of a result line, in
/// characters.
const SEPARATOR_LEN: usize = 2;

/// The duration of one tick reported by the runtime.
pub const TICK: Duration = Duration::from_nanos(100);

/// Results parsed from the output of one runtime process.
#[derive(Clone, Debug)]
pub struct ParsedResults {
    results: Vec<TestResult>,
    completed: bool,
}

impl ParsedResults {
    /// Returns one result per pending test, in the order the tests were passed in.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Consumes self, returning the results.
    pub fn into_results(self) -> Vec<TestResult> {
        self.results
    }

    /// Returns true if the output contained the completion marker.
    pub fn completed(&self) -> bool {
        self.completed
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum LineKind {
    Passed,
    Failed,
    Skipped,
}

impl LineKind {
    const ALL: [(Self, &'static str); 3] = [
        (Self::Passed, PASSED_MARKER),
        (Self::Failed, FAILED_MARKER),
        (Self::Skipped, SKIPPED_MARKER),
    ];
}

/// A recognized result line.
#[derive(Debug, Eq, PartialEq)]
struct ResultLine<'a> {
    kind: LineKind,
    method_name: &'a str,
    rest: &'a str,
}

impl<'a> ResultLine<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let (kind, after_marker) = LineKind::ALL.iter().find_map(|(kind, marker)| {
            line.find(marker)
                .map(|index| (*kind, &line[index + marker.len()..]))
        })?;

        let name_end = after_marker
            .find([',', ' '])
            .unwrap_or(after_marker.len());
        let method_name = &after_marker[..name_end];
        let rest = skip_chars(&after_marker[name_end..], SEPARATOR_LEN);

        Some(Self {
            kind,
            method_name,
            rest,
        })
    }

    fn to_result(&self) -> TestResult {
        match self.kind {
            LineKind::Passed => {
                // A garbled tick count is not worth losing the result over.
                let ticks = self.rest.trim().parse::<u64>().unwrap_or(0);
                TestResult::passed(ticks_to_duration(ticks))
            }
            LineKind::Failed => TestResult::failed(self.rest),
            LineKind::Skipped => TestResult::skipped(self.rest),
        }
    }
}

fn skip_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((index, _)) => &s[index..],
        None => "",
    }
}

/// Converts a tick count to a duration.
pub fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::from_nanos(ticks.saturating_mul(TICK.as_nanos() as u64))
}

/// Parses the raw output of one runtime process into one result per pending test.
///
/// Parsing never fails: unrecognized lines are skipped. If the completion marker is missing, every
/// test without a reported result is marked failed with the raw output, and results that were
/// reported are kept. If the marker is present, tests that were never reported have an unknown
/// outcome, with the raw output attached.
pub fn parse<T: Borrow<TestCaseModel>>(raw_output: &str, pending: &[T]) -> ParsedResults {
    let mut results: Vec<Option<TestResult>> = vec![None; pending.len()];

    for line in raw_output.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some(result_line) = ResultLine::parse(line) else {
            continue;
        };

        match pending
            .iter()
            .position(|test| test.borrow().display_name() == result_line.method_name)
        {
            Some(index) => {
                results[index] = Some(result_line.to_result());
            }
            None => {
                debug!(
                    method_name = result_line.method_name,
                    "ignoring result for a test that was not requested",
                );
            }
        }
    }

    let completed = raw_output.contains(DONE_MARKER);
    if !completed && results.iter().all(Option::is_some) {
        warn!("runtime output has no `{DONE_MARKER}` marker, but every test reported a result");
    }

    let results = results
        .into_iter()
        .map(|result| match result {
            Some(result) => result,
            None if completed => TestResult::unknown(raw_output),
            None => TestResult::failed(raw_output),
        })
        .collect();

    ParsedResults { results, completed }
}
