// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable output for test runs.

use super::events::{TestEvent, TestEventKind};
use crate::{
    errors::DisplayErrorChain,
    runner::{GroupStatus, RunStats},
};
use owo_colors::{OwoColorize, Style};
use std::{io, io::Write, time::Duration};
use swrite::{swrite, SWrite};
use vmtest_metadata::{TestCaseModel, TestOutcome, TestResult};

#[derive(Debug, Default)]
pub(super) struct DisplayReporterBuilder {
    pub(super) verbose: bool,
    pub(super) should_colorize: bool,
}

impl DisplayReporterBuilder {
    pub(super) fn build(self) -> DisplayReporter {
        let mut styles = Styles::default();
        if self.should_colorize {
            styles.colorize();
        }
        DisplayReporter {
            verbose: self.verbose,
            styles,
        }
    }
}

/// Writes events to a terminal or buffer.
#[derive(Debug)]
pub(super) struct DisplayReporter {
    verbose: bool,
    styles: Styles,
}

impl DisplayReporter {
    pub(super) fn write_event(&self, event: &TestEvent<'_>, mut writer: impl Write) -> io::Result<()> {
        match &event.kind {
            TestEventKind::RunStarted {
                test_count,
                group_count,
            } => {
                writeln!(
                    writer,
                    "{:>12} {} {} across {} {}",
                    "Starting".style(self.styles.pass),
                    test_count.style(self.styles.count),
                    plural(*test_count, "test", "tests"),
                    group_count.style(self.styles.count),
                    plural(*group_count, "binary", "binaries"),
                )?;
            }
            TestEventKind::TestFinished { test, result } => {
                self.write_test_status(test, result, &mut writer)?;
                if self.should_show_detail(result) {
                    self.write_test_detail(test, result, &mut writer)?;
                }
            }
            TestEventKind::GroupFinished {
                binary,
                test_count,
                status,
                time_taken,
            } => {
                let abnormal = !matches!(
                    status,
                    GroupStatus::Completed {
                        done_marker: true,
                        ..
                    }
                );
                if abnormal || self.verbose {
                    let style = if abnormal {
                        self.styles.fail
                    } else {
                        self.styles.pass
                    };
                    write!(writer, "{:>12} ", "BINARY".style(style))?;
                    write_duration(Some(*time_taken), &mut writer)?;
                    writeln!(
                        writer,
                        "{} ({} {}): {}",
                        binary.style(self.styles.list_styles.binary),
                        test_count.style(self.styles.count),
                        plural(*test_count, "test", "tests"),
                        describe_group_status(status),
                    )?;
                }
            }
            TestEventKind::RunBeginCancel { reason } => {
                writeln!(
                    writer,
                    "{:>12} due to {}",
                    "Cancelling".style(self.styles.fail),
                    reason.to_static_str().style(self.styles.count),
                )?;
            }
            TestEventKind::RunFinished {
                elapsed, run_stats, ..
            } => {
                let summary_style = if run_stats.cancel_reason.is_some() || run_stats.any_failed() {
                    self.styles.fail
                } else if run_stats.initial_run_count == 0 {
                    self.styles.skip
                } else {
                    self.styles.pass
                };
                write!(
                    writer,
                    "{}\n{:>12} ",
                    "-".repeat(12),
                    "Summary".style(summary_style)
                )?;
                write_duration(Some(*elapsed), &mut writer)?;

                write!(writer, "{}", run_stats.finished_count.style(self.styles.count))?;
                if run_stats.finished_count != run_stats.initial_run_count {
                    write!(
                        writer,
                        "/{}",
                        run_stats.initial_run_count.style(self.styles.count)
                    )?;
                }
                let tests_str = plural(run_stats.initial_run_count, "test", "tests");

                let mut summary_str = String::new();
                write_summary_str(run_stats, &self.styles, &mut summary_str);
                writeln!(writer, " {tests_str} run: {summary_str}")?;
            }
        }

        Ok(())
    }

    fn should_show_detail(&self, result: &TestResult) -> bool {
        match result.outcome() {
            TestOutcome::Passed => false,
            TestOutcome::Skipped => self.verbose,
            TestOutcome::Failed | TestOutcome::NotFound | TestOutcome::Unknown => true,
        }
    }

    fn status_label(&self, outcome: TestOutcome) -> (&'static str, Style) {
        match outcome {
            TestOutcome::Passed => ("PASS", self.styles.pass),
            TestOutcome::Failed => ("FAIL", self.styles.fail),
            TestOutcome::Skipped => ("SKIP", self.styles.skip),
            TestOutcome::NotFound => ("NOTFOUND", self.styles.fail),
            TestOutcome::Unknown => ("UNKNOWN", self.styles.fail),
        }
    }

    fn write_test_status(
        &self,
        test: &TestCaseModel,
        result: &TestResult,
        mut writer: impl Write,
    ) -> io::Result<()> {
        let (label, style) = self.status_label(result.outcome());
        write!(writer, "{:>12} ", label.style(style))?;
        write_duration(result.duration(), &mut writer)?;
        writeln!(
            writer,
            "{}.{}",
            test.declaring_type().style(self.styles.list_styles.binary),
            test.display_name().style(self.styles.list_styles.test_name),
        )?;
        if self.verbose {
            if let (Some(file), Some(line)) = (test.code_file_path(), test.line_number()) {
                writeln!(writer, "{:>12}   at {file}:{line}", "")?;
            }
        }
        Ok(())
    }

    fn write_test_detail(
        &self,
        test: &TestCaseModel,
        result: &TestResult,
        mut writer: impl Write,
    ) -> io::Result<()> {
        let Some(message) = result.error_message().filter(|m| !m.is_empty()) else {
            return Ok(());
        };
        let (label, _) = self.status_label(result.outcome());
        let header = format!("--- {label}: {test} ---");
        writeln!(writer, "\n{}", header.style(self.styles.fail_output))?;
        for line in message.lines() {
            writeln!(writer, "    {line}")?;
        }
        writeln!(writer)
    }
}

fn describe_group_status(status: &GroupStatus) -> String {
    match status {
        GroupStatus::Completed {
            done_marker: true, ..
        } => "completed".to_owned(),
        GroupStatus::Completed {
            done_marker: false,
            exit_status,
        } => match exit_status {
            Some(exit_status) => {
                format!("runtime exited without reporting completion ({exit_status})")
            }
            None => "runtime exited without reporting completion".to_owned(),
        },
        GroupStatus::TimedOut { timeout } => {
            format!("timed out after {}", humantime::format_duration(*timeout))
        }
        GroupStatus::StartFailed { error } => {
            format!("failed to start runtime: {}", DisplayErrorChain::new(error))
        }
        other => other.to_static_str().to_owned(),
    }
}

fn write_duration(duration: Option<Duration>, mut writer: impl Write) -> io::Result<()> {
    match duration {
        // * > means right-align.
        // * 8 is the number of characters to pad to.
        // * .3 means print three digits after the decimal point.
        Some(duration) => write!(writer, "[{:>8.3?}s] ", duration.as_secs_f64()),
        None => write!(writer, "[{:>9}] ", ""),
    }
}

fn plural(count: usize, singular: &'static str, plural: &'static str) -> &'static str {
    if count == 1 {
        singular
    } else {
        plural
    }
}

fn write_summary_str(run_stats: &RunStats, styles: &Styles, out: &mut String) {
    // Written in this style to ensure new fields are accounted for.
    let &RunStats {
        initial_run_count: _,
        finished_count: _,
        passed,
        failed,
        skipped,
        not_found,
        unknown,
        groups_timed_out,
        groups_start_failed,
        cancel_reason: _,
    } = run_stats;

    swrite!(
        out,
        "{} {}",
        passed.style(styles.count),
        "passed".style(styles.pass)
    );

    for (count, label) in [
        (failed, "failed"),
        (not_found, "not found"),
        (unknown, "unknown"),
    ] {
        if count > 0 {
            swrite!(out, ", {} {}", count.style(styles.count), label.style(styles.fail));
        }
    }

    swrite!(
        out,
        ", {} {}",
        skipped.style(styles.count),
        "skipped".style(styles.skip)
    );

    let mut notes = Vec::new();
    if groups_timed_out > 0 {
        notes.push(format!(
            "{} {} timed out",
            groups_timed_out.style(styles.count),
            plural(groups_timed_out, "runtime", "runtimes"),
        ));
    }
    if groups_start_failed > 0 {
        notes.push(format!(
            "{} {} failed to start",
            groups_start_failed.style(styles.count),
            plural(groups_start_failed, "runtime", "runtimes"),
        ));
    }
    if !notes.is_empty() {
        swrite!(out, " ({})", notes.join(", "));
    }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    fail_output: Style,
    skip: Style,
    list_styles: crate::list::Styles,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.fail_output = Style::new().magenta();
        self.skip = Style::new().yellow().bold();
        self.list_styles.colorize();
    }
}
