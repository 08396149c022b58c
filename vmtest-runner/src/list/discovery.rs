// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    discover, locate_project_sources, OutputFormat, ScanResult, Styles, TextSearchResolver,
};
use crate::{
    config::DiscoveryConfig,
    errors::{DiscoverBinaryError, DisplayErrorChain, WriteTestListError},
    helpers::absolute_path,
    reflect::AssemblyReflector,
    test_filter::TestFilter,
};
use camino::{Utf8Path, Utf8PathBuf};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use tracing::{debug, warn};
use vmtest_metadata::{BinaryDiscoverySummary, DiscoverySummary, TestCaseModel};

/// Discovers tests in test binaries.
#[derive(Debug)]
pub struct TestDiscoverer<'c, R> {
    config: &'c DiscoveryConfig,
    reflector: R,
}

impl<'c, R: AssemblyReflector> TestDiscoverer<'c, R> {
    /// Creates a new discoverer.
    pub fn new(config: &'c DiscoveryConfig, reflector: R) -> Self {
        Self { config, reflector }
    }

    /// Discovers tests in each binary, in order.
    ///
    /// A failure in one binary is recorded and does not affect the others.
    pub fn discover(&self, binaries: impl IntoIterator<Item = impl Into<Utf8PathBuf>>) -> DiscoveredTests {
        let binaries = binaries
            .into_iter()
            .map(|binary| {
                let binary = binary.into();
                let result = self.discover_binary(&binary);
                if let Err(error) = &result {
                    warn!("{}", DisplayErrorChain::new(error));
                }
                BinaryDiscovery { binary, result }
            })
            .collect();
        DiscoveredTests { binaries }
    }

    /// Discovers tests in a single binary.
    ///
    /// If no project descriptor is found above the binary, it has no tests. Test cases always carry
    /// the binary's absolute path.
    pub fn discover_binary(&self, binary: &Utf8Path) -> Result<ScanResult, DiscoverBinaryError> {
        let binary: &Utf8Path = &absolute_path(binary);
        if !binary.is_file() {
            return Err(DiscoverBinaryError::BinaryNotFound {
                binary: binary.to_owned(),
            });
        }

        let sources = locate_project_sources(binary, self.config);
        if sources.is_empty() {
            debug!(%binary, "no candidate sources, skipping binary");
            return Ok(ScanResult::default());
        }

        let metadata = self
            .reflector
            .reflect(binary)
            .map_err(|error| DiscoverBinaryError::Reflect {
                binary: binary.to_owned(),
                error,
            })?;
        let mut resolver = TextSearchResolver::new(sources);
        Ok(discover(binary, &metadata, &mut resolver))
    }
}

/// The outcome of discovery in one binary.
#[derive(Debug)]
pub struct BinaryDiscovery {
    /// The binary.
    pub binary: Utf8PathBuf,

    /// The tests found, or why discovery failed.
    pub result: Result<ScanResult, DiscoverBinaryError>,
}

/// The results of discovery across binaries.
#[derive(Debug, Default)]
pub struct DiscoveredTests {
    binaries: Vec<BinaryDiscovery>,
}

impl DiscoveredTests {
    /// Returns per-binary results, in the order binaries were passed in.
    pub fn binaries(&self) -> &[BinaryDiscovery] {
        &self.binaries
    }

    /// Iterates over all discovered tests, binary by binary.
    pub fn tests(&self) -> impl Iterator<Item = &TestCaseModel> + '_ {
        self.binaries
            .iter()
            .filter_map(|binary| binary.result.as_ref().ok())
            .flat_map(|scan| scan.tests.iter())
    }

    /// Consumes self, returning all discovered tests.
    pub fn into_tests(self) -> Vec<TestCaseModel> {
        self.binaries
            .into_iter()
            .filter_map(|binary| binary.result.ok())
            .flat_map(|scan| scan.tests)
            .collect()
    }

    /// Returns the number of discovered tests.
    pub fn test_count(&self) -> usize {
        self.tests().count()
    }

    /// Iterates over binaries for which discovery failed.
    pub fn failures(&self) -> impl Iterator<Item = (&Utf8Path, &DiscoverBinaryError)> + '_ {
        self.binaries.iter().filter_map(|binary| match &binary.result {
            Ok(_) => None,
            Err(error) => Some((binary.binary.as_path(), error)),
        })
    }

    /// Keeps only the tests matched by `filter`.
    pub fn apply_filter(&mut self, filter: &TestFilter) {
        for binary in &mut self.binaries {
            if let Ok(scan) = &mut binary.result {
                scan.tests.retain(|test| filter.matches(test));
            }
        }
    }

    /// Returns a serializable summary.
    pub fn to_summary(&self) -> DiscoverySummary {
        let binaries = self
            .binaries
            .iter()
            .map(|binary| {
                let summary = match &binary.result {
                    Ok(scan) => BinaryDiscoverySummary {
                        tests: scan.tests.clone(),
                        warnings: scan.warnings.clone(),
                        error: None,
                    },
                    Err(error) => BinaryDiscoverySummary {
                        error: Some(DisplayErrorChain::new(error).to_string()),
                        ..BinaryDiscoverySummary::default()
                    },
                };
                (binary.binary.clone(), summary)
            })
            .collect();
        DiscoverySummary {
            test_count: self.test_count(),
            binaries,
        }
    }

    /// Writes the results in the given format.
    pub fn write(
        &self,
        output_format: OutputFormat,
        writer: &mut dyn Write,
        colorize: bool,
    ) -> Result<(), WriteTestListError> {
        match output_format {
            OutputFormat::Human { verbose } => self
                .write_human(writer, verbose, colorize)
                .map_err(WriteTestListError::Io),
            OutputFormat::Serializable(format) => format
                .to_writer(&self.to_summary(), writer)
                .map_err(WriteTestListError::Json),
        }
    }

    fn write_human(&self, writer: &mut dyn Write, verbose: bool, colorize: bool) -> io::Result<()> {
        let mut styles = Styles::default();
        if colorize {
            styles.colorize();
        }

        for binary in &self.binaries {
            match &binary.result {
                Ok(scan) => {
                    if scan.tests.is_empty() && !verbose {
                        continue;
                    }
                    writeln!(writer, "{}:", binary.binary.style(styles.binary))?;
                    if scan.tests.is_empty() {
                        writeln!(writer, "    (no tests)")?;
                    }
                    for test in &scan.tests {
                        write_test(writer, test, verbose, &styles)?;
                    }
                    if verbose {
                        for warning in &scan.warnings {
                            writeln!(writer, "    {}: {warning}", "warning".style(styles.field))?;
                        }
                    }
                }
                Err(error) => {
                    writeln!(writer, "{}:", binary.binary.style(styles.binary))?;
                    writeln!(
                        writer,
                        "    {}: {}",
                        "error".style(styles.error),
                        DisplayErrorChain::new(error),
                    )?;
                }
            }
        }

        Ok(())
    }
}

fn write_test(
    writer: &mut dyn Write,
    test: &TestCaseModel,
    verbose: bool,
    styles: &Styles,
) -> io::Result<()> {
    write!(
        writer,
        "    {}",
        test.fully_qualified_name().style(styles.test_name)
    )?;
    if verbose {
        write!(writer, " [{}]", test.category().style(styles.field))?;
        if let (Some(file), Some(line)) = (test.code_file_path(), test.line_number()) {
            write!(writer, " {file}:{line}")?;
        }
        for tag in test.tags() {
            write!(writer, " ({tag})")?;
        }
    }
    writeln!(writer)
}
