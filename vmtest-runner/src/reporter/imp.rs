// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out and aggregates test execution statuses.
//!
//! The main structure in this module is [`TestReporter`].

use super::{
    displayer::{DisplayReporter, DisplayReporterBuilder},
    events::TestEvent,
    junit::MetadataJunit,
};
use crate::errors::WriteEventError;
use camino::Utf8PathBuf;
use std::io::{self, Write};

/// Standard error destination for the reporter.
///
/// This is usually a terminal, but can be an in-memory buffer for tests.
pub enum ReporterStderr<'a> {
    /// Produce output on the (possibly piped) terminal.
    Terminal,

    /// Write output to a buffer.
    Buffer(&'a mut Vec<u8>),
}

/// Test reporter builder.
#[derive(Debug, Default)]
pub struct ReporterBuilder {
    should_colorize: bool,
    verbose: bool,
    junit_path: Option<Utf8PathBuf>,
}

impl ReporterBuilder {
    /// Set to true if the reporter should colorize output.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Sets verbose output.
    ///
    /// In verbose mode, source locations, skip reasons and every binary's runtime status are
    /// printed.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Writes a JUnit XML report to `path` once the run finishes.
    pub fn set_junit_path(&mut self, path: impl Into<Utf8PathBuf>) -> &mut Self {
        self.junit_path = Some(path.into());
        self
    }

    /// Creates a new test reporter.
    pub fn build<'a>(&self, output: ReporterStderr<'a>) -> TestReporter<'a> {
        let display_reporter = DisplayReporterBuilder {
            verbose: self.verbose,
            should_colorize: self.should_colorize,
        }
        .build();

        TestReporter {
            display_reporter,
            output,
            metadata_reporter: self.junit_path.clone().map(MetadataJunit::new),
        }
    }
}

/// Functionality to report test results to stderr and, optionally, to a JUnit file.
pub struct TestReporter<'a> {
    display_reporter: DisplayReporter,
    output: ReporterStderr<'a>,
    metadata_reporter: Option<MetadataJunit<'a>>,
}

impl<'a> TestReporter<'a> {
    /// Report a test event.
    pub fn report_event(&mut self, event: TestEvent<'a>) -> Result<(), WriteEventError> {
        self.write_display(&event).map_err(WriteEventError::Io)?;
        if let Some(junit) = &mut self.metadata_reporter {
            junit.write_event(&event)?;
        }
        Ok(())
    }

    fn write_display(&mut self, event: &TestEvent<'a>) -> io::Result<()> {
        match &mut self.output {
            ReporterStderr::Terminal => {
                let mut writer = io::BufWriter::new(io::stderr().lock());
                self.display_reporter.write_event(event, &mut writer)?;
                writer.flush()
            }
            ReporterStderr::Buffer(buf) => self.display_reporter.write_event(event, &mut **buf),
        }
    }
}
