// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, Result},
    output::{clap_styles, OutputContext, OutputOpts},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::{io::Write, num::NonZeroUsize, time::Duration};
use tracing::info;
use vmtest_metadata::VmtestExitCode;
use vmtest_runner::{
    config::VmtestConfig,
    errors::WriteTestListError,
    list::{DiscoveredTests, OutputFormat, SerializableFormat, TestDiscoverer},
    reflect::CommandReflector,
    reporter::{ReporterBuilder, ReporterStderr},
    runner::TestRunnerBuilder,
    signal::SignalHandlerKind,
    test_filter::TestFilter,
};

/// Discover and run tests in binaries built for a constrained VM.
#[derive(Debug, Parser)]
#[command(version, name = "vmtest", styles = clap_styles::style())]
pub struct VmtestApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl VmtestApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code on success.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        let cwd = current_dir()?;
        let mut config = VmtestConfig::from_sources(&cwd, self.config_opts.config_file.as_deref())?;

        match self.command {
            Command::List {
                discovery_opts,
                message_format,
            } => {
                let discovered = discovery_opts.discover(&config)?;
                let output_format = message_format.to_output_format(output.verbose);
                let colorize = output.color.should_colorize(supports_color::Stream::Stdout);

                let mut stdout = std::io::stdout().lock();
                discovered.write(output_format, &mut stdout, colorize)?;
                stdout.flush().map_err(WriteTestListError::Io)?;

                check_discovery(&discovered)?;
                Ok(VmtestExitCode::OK)
            }
            Command::Run {
                discovery_opts,
                runner_opts,
                junit,
            } => {
                runner_opts.apply_to(&mut config);
                let discovered = discovery_opts.discover(&config)?;
                check_discovery(&discovered)?;

                let tests = discovered.into_tests();
                if tests.is_empty() {
                    return Err(ExpectedError::NoTestsRun);
                }

                let mut reporter_builder = ReporterBuilder::default();
                reporter_builder
                    .set_colorize(output.color.should_colorize(supports_color::Stream::Stderr))
                    .set_verbose(output.verbose);
                if let Some(junit) = junit {
                    reporter_builder.set_junit_path(junit);
                }
                let mut reporter = reporter_builder.build(ReporterStderr::Terminal);

                let runner =
                    runner_opts
                        .to_builder()
                        .build(config.runtime(), SignalHandlerKind::Standard)?;
                let run_stats = runner.try_execute(&tests, |event| reporter.report_event(event))?;

                if run_stats.is_success() {
                    Ok(VmtestExitCode::OK)
                } else {
                    Err(ExpectedError::TestRunFailed)
                }
            }
        }
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir().map_err(|err| ExpectedError::CurrentDirFailed { err })?;
    Utf8PathBuf::try_from(cwd)
        .map_err(|err| ExpectedError::CurrentDirInvalidUtf8 { path: err.into_path_buf() })
}

/// Discovery failures were already logged, so only the binaries are collected here.
fn check_discovery(discovered: &DiscoveredTests) -> Result<()> {
    let failures: Vec<_> = discovered
        .failures()
        .map(|(binary, _)| binary.to_owned())
        .collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ExpectedError::DiscoveryFailed { binaries: failures })
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: .config/vmtest.toml in the current directory]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List tests in test binaries
    ///
    /// Each binary is scanned for test classes and methods. Source locations are found by searching
    /// the sources of the project the binary was built from.
    List {
        #[command(flatten)]
        discovery_opts: DiscoveryOpts,

        /// Output format
        #[arg(
            long,
            short = 'T',
            value_enum,
            default_value_t,
            value_name = "FMT"
        )]
        message_format: MessageFormatOpts,
    },

    /// Discover and run tests
    ///
    /// Tests are grouped by binary. Each binary gets one runtime process, which runs all of its
    /// selected tests.
    Run {
        #[command(flatten)]
        discovery_opts: DiscoveryOpts,

        #[command(flatten)]
        runner_opts: RunnerOpts,

        /// Write a JUnit XML report to this path
        #[arg(long, value_name = "PATH")]
        junit: Option<Utf8PathBuf>,
    },
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Test selection")]
struct DiscoveryOpts {
    /// Test binary to discover tests in (may be specified multiple times)
    #[arg(long = "binary", short = 'b', required = true, value_name = "PATH")]
    binaries: Vec<Utf8PathBuf>,

    /// Skip tests whose fully qualified names contain this string
    #[arg(long, value_name = "PATTERN")]
    skip: Vec<String>,

    /// Run tests whose fully qualified names contain any of these strings
    #[arg(value_name = "FILTERS")]
    filters: Vec<String>,
}

impl DiscoveryOpts {
    fn discover(&self, config: &VmtestConfig) -> Result<DiscoveredTests> {
        let filter = TestFilter::new(&self.filters, &self.skip)?;
        let reflector = CommandReflector::from_config(config.discovery())?;
        let discoverer = TestDiscoverer::new(config.discovery(), reflector);

        let mut discovered = discoverer.discover(self.binaries.iter().map(resolve_binary));
        discovered.apply_filter(&filter);
        info!(
            test_count = discovered.test_count(),
            "discovered tests in {} binaries",
            self.binaries.len(),
        );
        Ok(discovered)
    }
}

/// Makes relative binary paths absolute, so runtime processes see the same path from the binary's
/// own directory.
fn resolve_binary(binary: &Utf8PathBuf) -> Utf8PathBuf {
    if binary.is_absolute() {
        return binary.clone();
    }
    match binary.canonicalize_utf8() {
        Ok(path) => path,
        // Missing binaries are reported as such by discovery.
        Err(_) => binary.clone(),
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Runner options")]
struct RunnerOpts {
    /// Runtime executable [default: from config]
    #[arg(long, value_name = "PATH", env = "VMTEST_RUNTIME")]
    runtime_path: Option<Utf8PathBuf>,

    /// Timeout for each binary's runtime process, e.g. "90s" [default: from config]
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Number of binaries to run simultaneously [default: from config]
    #[arg(long, short = 'j', value_name = "N", env = "VMTEST_GROUP_THREADS")]
    group_threads: Option<NonZeroUsize>,
}

impl RunnerOpts {
    fn apply_to(&self, config: &mut VmtestConfig) {
        if let Some(runtime_path) = &self.runtime_path {
            config.runtime_mut().set_path(runtime_path.as_path());
        }
    }

    fn to_builder(&self) -> TestRunnerBuilder {
        let mut builder = TestRunnerBuilder::default();
        if let Some(group_threads) = self.group_threads {
            builder.set_group_threads(group_threads);
        }
        if let Some(timeout) = self.timeout {
            builder.set_timeout(timeout);
        }
        builder
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum MessageFormatOpts {
    #[default]
    Human,
    Json,
    JsonPretty,
}

impl MessageFormatOpts {
    fn to_output_format(self, verbose: bool) -> OutputFormat {
        match self {
            Self::Human => OutputFormat::Human { verbose },
            Self::Json => OutputFormat::Serializable(SerializableFormat::Json),
            Self::JsonPretty => OutputFormat::Serializable(SerializableFormat::JsonPretty),
        }
    }
}
