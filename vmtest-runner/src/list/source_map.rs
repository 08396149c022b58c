// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use std::num::NonZeroU32;
use tracing::debug;
use vmtest_metadata::SourceLocation;

/// Maps a type and method to the place in the source where the method is declared.
///
/// Test binaries carry no debug information, so locations are best-effort.
pub trait SourceResolver {
    /// Returns the location of `method_name` in the type with short name `type_name`, if it can be
    /// found.
    fn resolve(&mut self, type_name: &str, method_name: &str) -> Option<SourceLocation>;
}

/// Resolves locations by searching source text.
///
/// A file matches if it contains `class <TypeName>` and a line containing ` <MethodName>(`; the
/// first such line is the location. Files are searched in the order given, and the first match
/// wins. Each file is read at most once.
///
/// Types or methods with the same name in different files can resolve to the wrong file.
#[derive(Debug)]
pub struct TextSearchResolver {
    files: Vec<CandidateFile>,
}

#[derive(Debug)]
struct CandidateFile {
    path: Utf8PathBuf,
    // None until read; Some(None) if the file could not be read.
    contents: Option<Option<String>>,
}

impl CandidateFile {
    fn contents(&mut self) -> Option<&str> {
        let path = &self.path;
        self.contents
            .get_or_insert_with(|| read_source(path))
            .as_deref()
    }
}

fn read_source(path: &Utf8Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(error) => {
            debug!(%path, %error, "skipping unreadable source file");
            None
        }
    }
}

impl TextSearchResolver {
    /// Creates a new resolver over the given candidate files.
    pub fn new(files: impl IntoIterator<Item = Utf8PathBuf>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|path| CandidateFile {
                    path,
                    contents: None,
                })
                .collect(),
        }
    }
}

impl SourceResolver for TextSearchResolver {
    fn resolve(&mut self, type_name: &str, method_name: &str) -> Option<SourceLocation> {
        let class_needle = format!("class {type_name}");
        let method_needle = format!(" {method_name}(");

        for file in &mut self.files {
            let Some(text) = file.contents() else {
                continue;
            };
            if !text.contains(&class_needle) {
                continue;
            }
            let Some(index) = text.lines().position(|line| line.contains(&method_needle)) else {
                continue;
            };
            let line = u32::try_from(index + 1).ok().and_then(NonZeroU32::new)?;
            return Some(SourceLocation {
                file: file.path.clone(),
                line,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const MATH_TESTS: &str = indoc! {"
        using nanoFramework.TestFramework;

        namespace Contoso.Tests
        {
            [TestClass]
            public class MathTests
            {
                [TestMethod]
                public void Adds()
                {
                    Assert.AreEqual(2, 1 + 1);
                }
            }
        }
    "};

    #[test]
    fn resolves_first_matching_line() {
        let dir = camino_tempfile::tempdir().unwrap();
        let other = dir.path().join("Other.cs");
        let math = dir.path().join("MathTests.cs");
        std::fs::write(&other, "public class Other {\n  public void Adds() {}\n}\n").unwrap();
        std::fs::write(&math, MATH_TESTS).unwrap();

        let mut resolver = TextSearchResolver::new([other, math.clone()]);
        assert_eq!(
            resolver.resolve("MathTests", "Adds"),
            Some(SourceLocation {
                file: math,
                line: NonZeroU32::new(9).unwrap(),
            })
        );
        assert_eq!(resolver.resolve("MathTests", "Subtracts"), None);
        assert_eq!(resolver.resolve("StringTests", "Adds"), None);
    }

    #[test]
    fn unreadable_files_are_skipped() {
        let dir = camino_tempfile::tempdir().unwrap();
        let math = dir.path().join("MathTests.cs");
        std::fs::write(&math, MATH_TESTS).unwrap();

        let mut resolver = TextSearchResolver::new([dir.path().join("Missing.cs"), math.clone()]);
        let location = resolver.resolve("MathTests", "Adds").unwrap();
        assert_eq!(location.file, math);
    }

    #[test]
    fn files_are_read_once() {
        let dir = camino_tempfile::tempdir().unwrap();
        let math = dir.path().join("MathTests.cs");
        std::fs::write(&math, MATH_TESTS).unwrap();

        let mut resolver = TextSearchResolver::new([math.clone()]);
        assert!(resolver.resolve("MathTests", "Adds").is_some());
        std::fs::remove_file(&math).unwrap();
        assert!(
            resolver.resolve("MathTests", "Adds").is_some(),
            "cached contents are used"
        );
    }
}
