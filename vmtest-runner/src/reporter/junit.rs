// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code to generate JUnit XML reports from test events.

use super::events::{TestEvent, TestEventKind};
use crate::errors::WriteEventError;
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use indexmap::IndexMap;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::fs::File;
use vmtest_metadata::{TestOutcome, TestResult};

const REPORT_NAME: &str = "vmtest-run";

#[derive(Clone, Debug)]
pub(super) struct MetadataJunit<'a> {
    path: Utf8PathBuf,
    test_suites: DebugIgnore<IndexMap<&'a Utf8Path, TestSuite>>,
}

impl<'a> MetadataJunit<'a> {
    pub(super) fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            test_suites: DebugIgnore(IndexMap::new()),
        }
    }

    pub(super) fn write_event(&mut self, event: &TestEvent<'a>) -> Result<(), WriteEventError> {
        match &event.kind {
            TestEventKind::RunStarted { .. } | TestEventKind::RunBeginCancel { .. } => {}
            TestEventKind::TestFinished { test, result } => {
                let test = *test;
                let mut testcase = TestCase::new(test.display_name(), testcase_status(result));
                testcase
                    .set_classname(test.declaring_type())
                    .set_timestamp(event.timestamp);
                if let Some(duration) = result.duration() {
                    testcase.set_time(duration);
                }
                self.testsuite_for(test.source_binary_path())
                    .add_test_case(testcase);
            }
            TestEventKind::GroupFinished { binary, .. } => {
                // Every binary gets a suite, even if no tests in it reported.
                self.testsuite_for(*binary);
            }
            TestEventKind::RunFinished {
                start_time,
                elapsed,
                ..
            } => {
                let mut report = Report::new(REPORT_NAME);
                report
                    .set_timestamp(*start_time)
                    .set_time(*elapsed)
                    .add_test_suites(self.test_suites.drain(..).map(|(_, testsuite)| testsuite));

                if let Some(junit_dir) = self.path.parent().filter(|dir| !dir.as_str().is_empty()) {
                    std::fs::create_dir_all(junit_dir).map_err(|error| WriteEventError::Fs {
                        file: junit_dir.to_path_buf(),
                        error,
                    })?;
                }

                let f = File::create(&self.path).map_err(|error| WriteEventError::Fs {
                    file: self.path.clone(),
                    error,
                })?;
                report
                    .serialize(f)
                    .map_err(|error| WriteEventError::Junit {
                        file: self.path.clone(),
                        error: Box::new(error),
                    })?;
            }
        }

        Ok(())
    }

    fn testsuite_for(&mut self, binary: &'a Utf8Path) -> &mut TestSuite {
        self.test_suites
            .entry(binary)
            .or_insert_with(|| TestSuite::new(binary.as_str()))
    }
}

fn testcase_status(result: &TestResult) -> TestCaseStatus {
    let (kind, ty) = match result.outcome() {
        TestOutcome::Passed => return TestCaseStatus::success(),
        TestOutcome::Skipped => {
            let mut status = TestCaseStatus::skipped();
            if let Some(reason) = result.error_message() {
                status.set_message(reason);
            }
            return status;
        }
        TestOutcome::Failed => (NonSuccessKind::Failure, "test failure"),
        TestOutcome::NotFound => (NonSuccessKind::Error, "binary not found"),
        TestOutcome::Unknown => (NonSuccessKind::Error, "no result reported"),
    };

    let mut status = TestCaseStatus::non_success(kind);
    status.set_type(ty);
    if let Some(message) = result.error_message() {
        status
            .set_message(message.lines().next().unwrap_or_default())
            .set_description(message);
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{GroupStatus, RunStats};
    use chrono::Local;
    use std::time::Duration;
    use vmtest_metadata::{TestCaseModel, TestCategory};

    fn event<'a>(kind: TestEventKind<'a>) -> TestEvent<'a> {
        TestEvent {
            timestamp: Local::now().fixed_offset(),
            elapsed: Duration::ZERO,
            kind,
        }
    }

    #[test]
    fn writes_one_suite_per_binary() {
        let dir = camino_tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/junit.xml");

        let adds =
            TestCaseModel::new("Ns.MathTests", "Adds", "/out/Math.dll", TestCategory::Test).unwrap();
        let parses =
            TestCaseModel::new("Ns.ParseTests", "Parses", "/out/Parse.dll", TestCategory::Test)
                .unwrap();

        let mut junit = MetadataJunit::new(path.clone());
        let events = [
            event(TestEventKind::TestFinished {
                test: &adds,
                result: TestResult::passed(Duration::from_millis(20)),
            }),
            event(TestEventKind::TestFinished {
                test: &parses,
                result: TestResult::failed("Assert.AreEqual failed\nat line 7"),
            }),
            event(TestEventKind::GroupFinished {
                binary: Utf8Path::new("/out/Empty.dll"),
                test_count: 0,
                status: GroupStatus::TimedOut {
                    timeout: Duration::from_secs(1),
                },
                time_taken: Duration::from_secs(1),
            }),
            event(TestEventKind::RunFinished {
                start_time: Local::now().fixed_offset(),
                elapsed: Duration::from_secs(1),
                run_stats: RunStats::default(),
            }),
        ];
        for event in &events {
            junit.write_event(event).unwrap();
        }

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains(r#"<testsuites name="vmtest-run""#), "{xml}");
        assert!(xml.contains(r#"<testsuite name="/out/Math.dll""#), "{xml}");
        assert!(xml.contains(r#"<testsuite name="/out/Parse.dll""#), "{xml}");
        assert!(xml.contains(r#"<testsuite name="/out/Empty.dll""#), "{xml}");
        assert!(xml.contains(r#"name="Adds""#), "{xml}");
        assert!(xml.contains(r#"classname="Ns.MathTests""#), "{xml}");
        assert!(xml.contains(r#"message="Assert.AreEqual failed""#), "{xml}");
        assert!(xml.contains(r#"type="test failure""#), "{xml}");
    }
}
