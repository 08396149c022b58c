// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::TestCaseModelError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::BTreeMap, fmt, num::NonZeroU32};

/// The role a discovered method plays within its test class.
///
/// Within a class, methods execute in the order `Setup`, `Test`, `Cleanup`, and discovery emits
/// them in that order too.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestCategory {
    /// Runs before the tests of its class.
    Setup,

    /// A test method.
    Test,

    /// Runs after the tests of its class.
    Cleanup,
}

impl TestCategory {
    /// All categories, in execution order.
    pub const ALL: [Self; 3] = [Self::Setup, Self::Test, Self::Cleanup];

    /// Returns the kebab-case name of this category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Test => "test",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for TestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A best-effort source location for a discovered test.
///
/// Line numbers are 1-based.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceLocation {
    /// The source file.
    pub file: Utf8PathBuf,

    /// The 1-based line number.
    pub line: NonZeroU32,
}

/// A test discovered in a compiled test binary.
///
/// This is the canonical representation used by both discovery and execution. Instances are
/// immutable once created. Many instances share a [`source_binary_path`](Self::source_binary_path),
/// which is the grouping key for execution.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestCaseModel {
    declaring_type: String,
    method_name: String,
    #[serde(deserialize_with = "deserialize_binary_path")]
    source_binary_path: Utf8PathBuf,
    #[serde(default)]
    code_file_path: Option<Utf8PathBuf>,
    #[serde(default)]
    line_number: Option<NonZeroU32>,
    category: TestCategory,
    #[serde(default)]
    tags: Vec<String>,
}

impl TestCaseModel {
    /// Creates a new test case without a source location or tags.
    ///
    /// Returns an error if `source_binary_path`, `declaring_type` or `method_name` is empty.
    pub fn new(
        declaring_type: impl Into<String>,
        method_name: impl Into<String>,
        source_binary_path: impl Into<Utf8PathBuf>,
        category: TestCategory,
    ) -> Result<Self, TestCaseModelError> {
        let declaring_type = declaring_type.into();
        let method_name = method_name.into();
        let source_binary_path = source_binary_path.into();

        if declaring_type.is_empty() || method_name.is_empty() {
            return Err(TestCaseModelError::EmptyName {
                binary: source_binary_path.into_string(),
            });
        }
        if source_binary_path.as_str().is_empty() {
            return Err(TestCaseModelError::EmptyBinaryPath {
                name: format!("{declaring_type}.{method_name}"),
            });
        }

        Ok(Self {
            declaring_type,
            method_name,
            source_binary_path,
            code_file_path: None,
            line_number: None,
            category,
            tags: Vec::new(),
        })
    }

    /// Attaches a resolved source location.
    pub fn with_location(mut self, location: Option<SourceLocation>) -> Self {
        match location {
            Some(SourceLocation { file, line }) => {
                self.code_file_path = Some(file);
                self.line_number = Some(line);
            }
            None => {
                self.code_file_path = None;
                self.line_number = None;
            }
        }
        self
    }

    /// Attaches tags, e.g. data-row parameter sets.
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the fully qualified name, `{declaring_type}.{method_name}`.
    pub fn fully_qualified_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.method_name)
    }

    /// Returns the display name: the method name.
    ///
    /// The display name is what the external runtime reports in its result lines, and is
    /// therefore the key results are correlated by.
    pub fn display_name(&self) -> &str {
        &self.method_name
    }

    /// Returns the full name of the declaring type.
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    /// Returns the compiled binary this test was discovered in.
    pub fn source_binary_path(&self) -> &Utf8Path {
        &self.source_binary_path
    }

    /// Returns the source file, if it was resolved.
    pub fn code_file_path(&self) -> Option<&Utf8Path> {
        self.code_file_path.as_deref()
    }

    /// Returns the 1-based line number, if it was resolved.
    pub fn line_number(&self) -> Option<NonZeroU32> {
        self.line_number
    }

    /// Returns the category of this test.
    pub fn category(&self) -> TestCategory {
        self.category
    }

    /// Returns the tags for this test, in order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl fmt::Display for TestCaseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.method_name)
    }
}

fn deserialize_binary_path<'de, D>(deserializer: D) -> Result<Utf8PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    let path = Utf8PathBuf::deserialize(deserializer)?;
    if path.as_str().is_empty() {
        return Err(serde::de::Error::custom("source-binary-path must not be empty"));
    }
    Ok(path)
}

/// Root element for a serializable list of discovered tests.
///
/// This is the output of `vmtest list --message-format json`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoverySummary {
    /// The number of tests across all binaries.
    pub test_count: usize,

    /// Per-binary discovery data, keyed by the binary path.
    pub binaries: BTreeMap<Utf8PathBuf, BinaryDiscoverySummary>,
}

/// Discovery data for a single binary.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BinaryDiscoverySummary {
    /// The tests discovered in this binary, in discovery order.
    pub tests: Vec<TestCaseModel>,

    /// Warnings recorded while scanning this binary.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// If discovery failed for this binary, the error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
