// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for vmtest.
//!
//! Configuration is read from an embedded default config, overlaid with an optional user config
//! file. The result is immutable and is passed explicitly to the components that need it.

use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::{Utf8Path, Utf8PathBuf};
use config::{builder::DefaultState, Config, ConfigBuilder, File, FileFormat};
use serde::Deserialize;
use std::{collections::BTreeMap, collections::BTreeSet, num::NonZeroUsize, time::Duration};
use tracing::warn;

/// The default upper bound on the wall-clock time of one runtime process.
///
/// One process runs every test in one binary, so this bounds a whole group, not a single test.
pub const DEFAULT_GROUP_TIMEOUT: Duration = Duration::from_secs(300);

/// The default time to wait for the runtime to exit after a graceful termination request.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Overall vmtest configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VmtestConfig {
    runtime: RuntimeConfig,
    discovery: DiscoveryConfig,
}

impl VmtestConfig {
    /// The default location of the config within a directory: `.config/vmtest.toml`.
    pub const CONFIG_PATH: &'static str = ".config/vmtest.toml";

    /// Contains the default config as a TOML file.
    ///
    /// User configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the vmtest config from the given file, or if not specified from
    /// `.config/vmtest.toml` under `dir`.
    ///
    /// If no config file is specified and `dir` doesn't have `.config/vmtest.toml`, uses the
    /// default config options. Unknown keys are reported as warnings.
    pub fn from_sources(
        dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_impl(dir, config_file, |config_file, unknown| {
            let mut unknown_str = String::new();
            if unknown.len() == 1 {
                // Print this on the same line.
                unknown_str.push(' ');
                unknown_str.push_str(unknown.iter().next().expect("length is 1"));
            } else {
                for ignored_key in unknown {
                    unknown_str.push('\n');
                    unknown_str.push_str("  - ");
                    unknown_str.push_str(ignored_key);
                }
            }

            warn!("ignoring unknown configuration keys in config file {config_file}:{unknown_str}")
        })
    }

    // A custom unknown_callback can be passed in while testing.
    fn from_sources_impl(
        dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
        mut unknown_callback: impl FnMut(&Utf8Path, &BTreeSet<String>),
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = dir.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (config, unknown) = Self::build_and_deserialize_config(builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            unknown_callback(&config_file, &unknown);
        }

        config.validate().map_err(|kind| ConfigParseError::new(config_file, kind))?;
        Ok(config)
    }

    /// Returns the default vmtest config.
    pub fn default_config() -> Self {
        let (config, _) = Self::build_and_deserialize_config(Self::make_default_config())
            .unwrap_or_else(|error| panic!("default config is always valid: {error}"));
        config
    }

    /// Returns the runtime configuration.
    pub fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }

    /// Returns a mutable reference to the runtime configuration, to apply command-line overrides.
    pub fn runtime_mut(&mut self) -> &mut RuntimeConfig {
        &mut self.runtime
    }

    /// Returns the discovery configuration.
    pub fn discovery(&self) -> &DiscoveryConfig {
        &self.discovery
    }

    /// Returns a mutable reference to the discovery configuration.
    pub fn discovery_mut(&mut self) -> &mut DiscoveryConfig {
        &mut self.discovery
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<(Self, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config = Self::deserialize(ignored_de)
            .map_err(|error| ConfigParseErrorKind::DeserializeError(Box::new(error)))?;

        Ok((config, ignored))
    }

    fn validate(&self) -> Result<(), ConfigParseErrorKind> {
        if self.discovery.reflector.is_empty() {
            return Err(ConfigParseErrorKind::EmptyReflector);
        }
        if self.runtime.timeout.is_zero() {
            return Err(ConfigParseErrorKind::ZeroTimeout);
        }
        Ok(())
    }
}

fn default_group_timeout() -> Duration {
    DEFAULT_GROUP_TIMEOUT
}

/// Configuration for the external runtime process.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    path: Utf8PathBuf,
    load_arg: String,
    artifact_extension: String,
    launcher_artifacts: Vec<String>,
    #[serde(default)]
    extra_args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default = "default_group_timeout", with = "humantime_serde")]
    timeout: Duration,
    #[serde(with = "humantime_serde")]
    grace_period: Duration,
    group_threads: NonZeroUsize,
}

impl RuntimeConfig {
    /// The runtime executable.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The flag preceding each artifact on the command line.
    pub fn load_arg(&self) -> &str {
        &self.load_arg
    }

    /// The extension of loadable artifacts, without a leading dot.
    pub fn artifact_extension(&self) -> &str {
        &self.artifact_extension
    }

    /// Shared artifacts loaded ahead of the test binary, in load order.
    pub fn launcher_artifacts(&self) -> &[String] {
        &self.launcher_artifacts
    }

    /// Arguments passed after the load directives.
    pub fn extra_args(&self) -> &[String] {
        &self.extra_args
    }

    /// Environment variables set for the runtime.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// The per-group timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The grace period between a termination request and a forced kill.
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// The number of groups executed concurrently.
    pub fn group_threads(&self) -> NonZeroUsize {
        self.group_threads
    }

    /// Overrides the runtime executable.
    pub fn set_path(&mut self, path: impl Into<Utf8PathBuf>) -> &mut Self {
        self.path = path.into();
        self
    }

    /// Overrides the per-group timeout.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the grace period.
    pub fn set_grace_period(&mut self, grace_period: Duration) -> &mut Self {
        self.grace_period = grace_period;
        self
    }

    /// Overrides the number of groups executed concurrently.
    pub fn set_group_threads(&mut self, group_threads: NonZeroUsize) -> &mut Self {
        self.group_threads = group_threads;
        self
    }

    /// Overrides the arguments passed after the load directives.
    pub fn set_extra_args(&mut self, args: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the shared artifacts loaded ahead of the test binary.
    pub fn set_launcher_artifacts(
        &mut self,
        artifacts: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.launcher_artifacts = artifacts.into_iter().map(Into::into).collect();
        self
    }

    /// Sets an environment variable for the runtime.
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Configuration for test discovery.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    project_extensions: Vec<String>,
    source_extensions: Vec<String>,
    exclude_dirs: Vec<String>,
    reflector: Vec<String>,
}

impl DiscoveryConfig {
    /// Extensions of project descriptors, without leading dots.
    pub fn project_extensions(&self) -> &[String] {
        &self.project_extensions
    }

    /// Extensions of candidate source files, without leading dots.
    pub fn source_extensions(&self) -> &[String] {
        &self.source_extensions
    }

    /// Directory names excluded from the source search.
    pub fn exclude_dirs(&self) -> &[String] {
        &self.exclude_dirs
    }

    /// The reflector program and its leading arguments. Never empty once validated.
    pub fn reflector(&self) -> &[String] {
        &self.reflector
    }

    /// Overrides the reflector command.
    pub fn set_reflector(&mut self, command: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.reflector = command.into_iter().map(Into::into).collect();
        self
    }
}
