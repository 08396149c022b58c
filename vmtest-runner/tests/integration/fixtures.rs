// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::Result;
use std::time::Duration;
use vmtest_metadata::{TestCaseModel, TestCategory};
use vmtest_runner::config::{RuntimeConfig, VmtestConfig};

pub(crate) const FAKE_RUNTIME: &str = env!("CARGO_BIN_EXE_fake-vm-runtime");
pub(crate) const FAKE_REFLECTOR: &str = env!("CARGO_BIN_EXE_fake-reflector");

/// A temporary directory holding fake test binaries.
pub(crate) struct FakeWorkspace {
    dir: Utf8TempDir,
}

impl FakeWorkspace {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            dir: camino_tempfile::tempdir()?,
        })
    }

    pub(crate) fn root(&self) -> &Utf8Path {
        self.dir.path()
    }

    /// Creates `<rel_dir>/<name>.dll` and its runtime artifact, with a script for the fake runtime.
    pub(crate) fn add_binary(&self, rel_dir: &str, name: &str, script: &str) -> Result<Utf8PathBuf> {
        let dir = self.dir.path().join(rel_dir);
        std::fs::create_dir_all(&dir)?;
        let binary = dir.join(format!("{name}.dll"));
        std::fs::write(&binary, "")?;
        std::fs::write(binary.with_extension("pe"), "")?;
        std::fs::write(dir.join("vm-script.txt"), script)?;
        Ok(binary)
    }

    pub(crate) fn write(&self, rel_path: &str, contents: &str) -> Result<Utf8PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}

/// A runtime config that launches the fake runtime with no launcher artifacts.
pub(crate) fn runtime_config(timeout: Duration) -> RuntimeConfig {
    let mut config = VmtestConfig::default_config().runtime().clone();
    config
        .set_path(FAKE_RUNTIME)
        .set_launcher_artifacts(Vec::<String>::new())
        .set_timeout(timeout)
        .set_grace_period(Duration::from_millis(500));
    config
}

pub(crate) fn test_case(binary: &Utf8Path, method: &str) -> TestCaseModel {
    TestCaseModel::new("Contoso.Tests.MathTests", method, binary, TestCategory::Test)
        .expect("valid test case")
}

/// Returns true if a process with this ID is still running (or is a zombie).
#[cfg(unix)]
pub(crate) fn process_exists(pid: i32) -> bool {
    // SAFETY: signal 0 performs only the existence and permission checks.
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(unix)]
pub(crate) fn read_pid(binary: &Utf8Path) -> Result<i32> {
    let dir = binary.parent().expect("binary has a parent");
    Ok(std::fs::read_to_string(dir.join("vm-pid.txt"))?.trim().parse()?)
}
