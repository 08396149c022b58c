// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Building and spawning runtime commands.

use crate::{
    config::RuntimeConfig,
    errors::{ArtifactResolveError, ChildStartError},
    helpers::absolute_path,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{process::Stdio, sync::Arc};
use tracing::debug;

mod imp;

pub(crate) use imp::{Child, ChildAccumulator};

/// Resolves the artifacts the runtime loads to run the tests in `binary`, in load order.
///
/// The order is fixed: the launcher artifacts from the config, then the artifact for `binary`
/// itself, then every other artifact in the binary's directory sorted by file name. Every artifact
/// is resolved from the binary's directory, and every returned path is absolute.
pub fn resolve_artifacts(
    binary: &Utf8Path,
    config: &RuntimeConfig,
) -> Result<Vec<Utf8PathBuf>, ArtifactResolveError> {
    let binary: &Utf8Path = &absolute_path(binary);
    let dir = binary
        .parent()
        .ok_or_else(|| ArtifactResolveError::NoParentDir {
            binary: binary.to_owned(),
        })?;
    let extension = config.artifact_extension();

    let mut artifacts: Vec<Utf8PathBuf> = config
        .launcher_artifacts()
        .iter()
        .map(|name| dir.join(name))
        .collect();
    artifacts.push(binary.with_extension(extension));

    for artifact in &artifacts {
        if !artifact.is_file() {
            return Err(ArtifactResolveError::Missing {
                path: artifact.clone(),
            });
        }
    }

    let read_dir_error = |error| ArtifactResolveError::ReadDir {
        dir: dir.to_owned(),
        error: Arc::new(error),
    };
    let mut dependencies = Vec::new();
    for entry in dir.read_dir_utf8().map_err(read_dir_error)? {
        let entry = entry.map_err(read_dir_error)?;
        let path = entry.path();
        let is_artifact = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if is_artifact && path.is_file() && !artifacts.iter().any(|a| a == path) {
            dependencies.push(path.to_owned());
        }
    }
    dependencies.sort_unstable_by(|a, b| a.file_name().cmp(&b.file_name()));
    artifacts.extend(dependencies);

    Ok(artifacts)
}

/// Returns the runtime's arguments: one load directive per artifact, then the extra arguments.
pub fn runtime_args(artifacts: &[Utf8PathBuf], config: &RuntimeConfig) -> Vec<String> {
    artifacts
        .iter()
        .flat_map(|artifact| [config.load_arg().to_owned(), artifact.to_string()])
        .chain(config.extra_args().iter().cloned())
        .collect()
}

/// A to-be-run runtime command for one test binary.
#[derive(Debug)]
pub(crate) struct RuntimeCommand {
    program: String,
    command: std::process::Command,
}

impl RuntimeCommand {
    /// Creates a new runtime command for `binary`.
    ///
    /// The working directory is the binary's directory, stdin is null, and both output streams
    /// are piped independently.
    pub(crate) fn new(binary: &Utf8Path, config: &RuntimeConfig) -> Result<Self, ChildStartError> {
        let binary: &Utf8Path = &absolute_path(binary);
        let artifacts =
            resolve_artifacts(binary, config).map_err(ChildStartError::ResolveArtifacts)?;
        let args = runtime_args(&artifacts, config);
        debug!(
            program = %config.path(),
            ?args,
            "built runtime command for {binary}",
        );

        let mut command = std::process::Command::new(config.path());
        command
            .args(&args)
            .envs(config.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // resolve_artifacts succeeding implies a parent exists.
        if let Some(dir) = binary.parent() {
            command.current_dir(dir);
        }

        Ok(Self {
            program: config.path().to_string(),
            command,
        })
    }

    #[inline]
    pub(crate) fn command_mut(&mut self) -> &mut std::process::Command {
        &mut self.command
    }

    pub(crate) fn spawn(self) -> Result<Child, ChildStartError> {
        imp::spawn(self.command).map_err(|error| ChildStartError::Spawn {
            program: self.program,
            error: Arc::new(error),
        })
    }
}
