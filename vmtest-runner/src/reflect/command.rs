// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{AssemblyMetadata, AssemblyReflector};
use crate::{config::DiscoveryConfig, errors::ReflectError, helpers::absolute_path};
use camino::Utf8Path;
use tracing::debug;

/// Obtains metadata by running a host-side reflection helper.
///
/// The helper is run with the test binary as its last argument, in the binary's directory so that
/// referenced assemblies resolve next to it. It must print an [`AssemblyMetadata`] as JSON to
/// standard output.
#[derive(Clone, Debug)]
pub struct CommandReflector {
    program: String,
    args: Vec<String>,
}

impl CommandReflector {
    /// Creates a new reflector that runs `program` with `args`, followed by the binary path.
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a new reflector from the `discovery.reflector` setting.
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self, ReflectError> {
        match config.reflector().split_first() {
            Some((program, args)) => Ok(Self::new(program, args)),
            None => Err(ReflectError::EmptyCommand),
        }
    }

    /// Returns the program that is run.
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl AssemblyReflector for CommandReflector {
    fn reflect(&self, binary: &Utf8Path) -> Result<AssemblyMetadata, ReflectError> {
        let binary: &Utf8Path = &absolute_path(binary);
        let args = self
            .args
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(binary.as_str()));
        let mut expression = duct::cmd(self.program.as_str(), args)
            .stdout_capture()
            .stderr_capture()
            .unchecked();
        if let Some(dir) = binary.parent().filter(|dir| !dir.as_str().is_empty()) {
            expression = expression.dir(dir.as_std_path());
        }

        debug!(program = %self.program, %binary, "running reflector");
        let output = expression.run().map_err(|error| ReflectError::Exec {
            program: self.program.clone(),
            error,
        })?;

        if !output.status.success() {
            return Err(ReflectError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|error| ReflectError::Parse {
            program: self.program.clone(),
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmtestConfig;

    #[test]
    fn from_config_splits_program() {
        let mut config = VmtestConfig::default_config();
        config
            .discovery_mut()
            .set_reflector(["dotnet", "reflect.dll", "--json"]);
        let reflector = CommandReflector::from_config(config.discovery()).unwrap();
        assert_eq!(reflector.program(), "dotnet");
        assert_eq!(reflector.args, ["reflect.dll", "--json"]);
    }

    #[test]
    fn empty_command_is_an_error() {
        let mut config = VmtestConfig::default_config();
        config.discovery_mut().set_reflector(Vec::<String>::new());
        assert!(matches!(
            CommandReflector::from_config(config.discovery()),
            Err(ReflectError::EmptyCommand)
        ));
    }

    #[test]
    fn missing_program_is_an_exec_error() {
        let reflector = CommandReflector::new("vmtest-reflect-does-not-exist", Vec::<String>::new());
        let error = reflector
            .reflect(Utf8Path::new("/nonexistent/Tests.dll"))
            .unwrap_err();
        assert!(matches!(error, ReflectError::Exec { .. }), "{error:?}");
    }
}
