// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filtering tests by name.
//!
//! Patterns are matched as substrings of a test's fully qualified name.

use crate::errors::TestFilterBuildError;
use aho_corasick::AhoCorasick;
use vmtest_metadata::TestCaseModel;

/// Selects tests by name.
#[derive(Clone, Debug, Default)]
pub struct TestFilter {
    patterns: ResolvedFilterPatterns,
}

#[derive(Clone, Debug, Default)]
enum ResolvedFilterPatterns {
    /// Match all tests.
    #[default]
    All,

    /// Match all tests except those that match the skip patterns.
    SkipOnly { skip_pattern_matcher: Box<AhoCorasick> },

    /// Match tests that match the patterns and don't match the skip patterns.
    Patterns {
        pattern_matcher: Box<AhoCorasick>,
        skip_pattern_matcher: Option<Box<AhoCorasick>>,
    },
}

impl TestFilter {
    /// Creates a new filter.
    ///
    /// A test matches if its name contains any of `patterns` (or `patterns` is empty), and does not
    /// contain any of `skip_patterns`.
    pub fn new(
        patterns: &[impl AsRef<[u8]>],
        skip_patterns: &[impl AsRef<[u8]>],
    ) -> Result<Self, TestFilterBuildError> {
        let skip_pattern_matcher = if skip_patterns.is_empty() {
            None
        } else {
            Some(Box::new(AhoCorasick::new(skip_patterns)?))
        };

        let patterns = match (patterns.is_empty(), skip_pattern_matcher) {
            (true, None) => ResolvedFilterPatterns::All,
            (true, Some(skip_pattern_matcher)) => {
                ResolvedFilterPatterns::SkipOnly { skip_pattern_matcher }
            }
            (false, skip_pattern_matcher) => ResolvedFilterPatterns::Patterns {
                pattern_matcher: Box::new(AhoCorasick::new(patterns)?),
                skip_pattern_matcher,
            },
        };
        Ok(Self { patterns })
    }

    /// Creates a filter that matches every test.
    pub fn any() -> Self {
        Self::default()
    }

    /// Returns true if `test` is selected.
    pub fn matches(&self, test: &TestCaseModel) -> bool {
        self.matches_name(&test.fully_qualified_name())
    }

    fn matches_name(&self, name: &str) -> bool {
        match &self.patterns {
            ResolvedFilterPatterns::All => true,
            ResolvedFilterPatterns::SkipOnly {
                skip_pattern_matcher,
            } => !skip_pattern_matcher.is_match(name),
            ResolvedFilterPatterns::Patterns {
                pattern_matcher,
                skip_pattern_matcher,
            } => {
                pattern_matcher.is_match(name)
                    && !skip_pattern_matcher
                        .as_ref()
                        .is_some_and(|skip| skip.is_match(name))
            }
        }
    }
}
