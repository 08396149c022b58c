// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{config::DiscoveryConfig, helpers::absolute_path};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Returns the candidate source files for the project that built `binary`, sorted by path.
///
/// The project is found by walking up from the binary's directory until a directory containing a
/// project descriptor is found. Source files are then collected recursively below that directory,
/// skipping build-output directories.
///
/// Relative paths are resolved against the current directory, so the walk always continues up to
/// the filesystem root. Returns an empty list if there is no project descriptor above the binary.
pub fn locate_project_sources(binary: &Utf8Path, config: &DiscoveryConfig) -> Vec<Utf8PathBuf> {
    let binary: &Utf8Path = &absolute_path(binary);
    let Some(start) = binary.parent() else {
        debug!(%binary, "binary has no parent directory, no sources to search");
        return Vec::new();
    };

    let Some(project_dir) = find_project_dir(start, config) else {
        debug!(%binary, "no project descriptor found above binary");
        return Vec::new();
    };
    debug!(%binary, %project_dir, "found project directory");

    collect_sources(project_dir, config)
}

/// Returns the closest directory at or above `start` that contains a project descriptor.
pub fn find_project_dir<'p>(start: &'p Utf8Path, config: &DiscoveryConfig) -> Option<&'p Utf8Path> {
    start
        .ancestors()
        .find(|dir| contains_project_file(dir, config))
}

fn contains_project_file(dir: &Utf8Path, config: &DiscoveryConfig) -> bool {
    let entries = match dir.read_dir_utf8() {
        Ok(entries) => entries,
        Err(error) => {
            debug!(%dir, %error, "skipping unreadable directory");
            return false;
        }
    };

    entries.filter_map(Result::ok).any(|entry| {
        has_extension(entry.path(), config.project_extensions())
            && entry.file_type().is_ok_and(|ty| ty.is_file())
    })
}

fn collect_sources(project_dir: &Utf8Path, config: &DiscoveryConfig) -> Vec<Utf8PathBuf> {
    let is_excluded = |name: &str| {
        config
            .exclude_dirs()
            .iter()
            .any(|exclude| name.eq_ignore_ascii_case(exclude))
    };

    let walker = WalkDir::new(project_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !entry.file_name().to_str().is_some_and(&is_excluded)
        });

    let mut sources = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                debug!(%error, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.into_path()) else {
            // Non-UTF-8 paths can't be reported to the host.
            continue;
        };
        if has_extension(&path, config.source_extensions()) {
            sources.push(path);
        }
    }

    sources.sort();
    sources
}

fn has_extension(path: &Utf8Path, extensions: &[String]) -> bool {
    path.extension()
        .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmtestConfig;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;

    fn tree(files: &[&str]) -> Utf8TempDir {
        populate(camino_tempfile::tempdir().unwrap(), files)
    }

    fn populate(dir: Utf8TempDir, files: &[&str]) -> Utf8TempDir {
        for file in files {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "").unwrap();
        }
        dir
    }

    fn relative(dir: &Utf8TempDir, paths: &[Utf8PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|path| path.strip_prefix(dir.path()).unwrap().as_str().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn no_project_descriptor() {
        let dir = tree(&["src/MathTests.cs", "out/Contoso.Tests.dll"]);
        let config = VmtestConfig::default_config();

        let sources =
            locate_project_sources(&dir.path().join("out/Contoso.Tests.dll"), config.discovery());
        assert_eq!(sources, Vec::<Utf8PathBuf>::new());
    }

    #[test]
    fn walks_up_and_excludes_build_output() {
        let dir = tree(&[
            "Contoso.Tests/Contoso.Tests.nfproj",
            "Contoso.Tests/MathTests.cs",
            "Contoso.Tests/Nested/StringTests.CS",
            "Contoso.Tests/Nested/readme.md",
            "Contoso.Tests/obj/Generated.cs",
            "Contoso.Tests/Bin/Debug/Contoso.Tests.dll",
            "Contoso.Tests/Bin/Debug/Copied.cs",
        ]);
        let config = VmtestConfig::default_config();
        let binary = dir.path().join("Contoso.Tests/Bin/Debug/Contoso.Tests.dll");

        let sources = locate_project_sources(&binary, config.discovery());
        assert_eq!(
            relative(&dir, &sources),
            ["Contoso.Tests/MathTests.cs", "Contoso.Tests/Nested/StringTests.CS"]
        );
    }

    #[test]
    fn closest_project_wins() {
        let dir = tree(&[
            "Outer.csproj",
            "Outer.cs",
            "Inner/Inner.nfproj",
            "Inner/InnerTests.cs",
            "Inner/bin/Inner.dll",
        ]);
        let config = VmtestConfig::default_config();

        let sources = locate_project_sources(&dir.path().join("Inner/bin/Inner.dll"), config.discovery());
        assert_eq!(relative(&dir, &sources), ["Inner/InnerTests.cs"]);
    }

    #[test]
    fn relative_binary_path_walks_past_its_first_component() {
        let cwd = Utf8PathBuf::try_from(std::env::current_dir().unwrap()).unwrap();
        let dir = camino_tempfile::Builder::new()
            .prefix(".vmtest-locator-")
            .tempdir_in(&cwd)
            .unwrap();
        let dir = populate(
            dir,
            &["Contoso.Tests.nfproj", "MathTests.cs", "bin/Debug/Contoso.Tests.dll"],
        );
        let config = VmtestConfig::default_config();

        // The descriptor sits above the relative path's first component.
        let binary = dir
            .path()
            .strip_prefix(&cwd)
            .unwrap()
            .join("bin/Debug/Contoso.Tests.dll");
        assert!(binary.is_relative());

        let sources = locate_project_sources(&binary, config.discovery());
        assert_eq!(sources, [dir.path().join("MathTests.cs")]);
    }
}
