// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::SourceResolver;
use crate::reflect::{
    classify_attribute, AssemblyMetadata, AttributeRole, MethodMetadata, TestRole, TypeMetadata,
};
use camino::Utf8Path;
use itertools::Itertools;
use tracing::{debug, warn};
use vmtest_metadata::TestCaseModel;

/// The tests found in one binary.
#[derive(Clone, Debug, Default)]
pub struct ScanResult {
    /// The tests, in emission order.
    pub tests: Vec<TestCaseModel>,

    /// Types and methods that were skipped, and why.
    pub warnings: Vec<String>,
}

/// Emits the tests declared in `metadata`, resolving source locations through `resolver`.
///
/// Only types carrying the test class attribute are considered. Classes are visited in metadata
/// order. Within a class, setup methods come first, then tests, then cleanup methods, each group in
/// metadata order. A method with several role attributes takes the first of setup, test and
/// cleanup that applies.
pub fn discover(
    binary: &Utf8Path,
    metadata: &AssemblyMetadata,
    resolver: &mut dyn SourceResolver,
) -> ScanResult {
    let mut result = ScanResult::default();

    for ty in &metadata.types {
        if let Some(error) = &ty.error {
            warn!(%binary, type_name = %ty.full_name, "skipping type that failed to load: {error}");
            result
                .warnings
                .push(format!("skipped type `{}`: {error}", ty.full_name));
            continue;
        }
        if !is_test_class(ty) {
            continue;
        }
        scan_class(binary, ty, resolver, &mut result);
    }

    debug!(%binary, test_count = result.tests.len(), "scanned binary");
    result
}

fn is_test_class(ty: &TypeMetadata) -> bool {
    ty.attributes
        .iter()
        .any(|attr| classify_attribute(&attr.name) == Some(AttributeRole::Role(TestRole::Class)))
}

struct ClassifiedMethod<'m> {
    method: &'m MethodMetadata,
    role: TestRole,
    tags: Vec<String>,
}

fn classify_method(method: &MethodMetadata) -> Option<ClassifiedMethod<'_>> {
    let mut roles = Vec::new();
    let mut tags = Vec::new();
    for attr in &method.attributes {
        let Some(role) = classify_attribute(&attr.name) else {
            continue;
        };
        if role == AttributeRole::DataRow {
            tags.push(attr.args.iter().join(", "));
        }
        roles.push(role.implied_role());
    }

    let role = TestRole::METHOD_ROLES
        .into_iter()
        .find(|role| roles.contains(role))?;
    Some(ClassifiedMethod { method, role, tags })
}

fn scan_class(
    binary: &Utf8Path,
    ty: &TypeMetadata,
    resolver: &mut dyn SourceResolver,
    result: &mut ScanResult,
) {
    let methods: Vec<_> = ty.methods.iter().filter_map(classify_method).collect();

    for role in TestRole::METHOD_ROLES {
        let Some(category) = role.category() else {
            continue;
        };
        for classified in methods.iter().filter(|m| m.role == role) {
            let name = &classified.method.name;
            let test = match TestCaseModel::new(&ty.full_name, name, binary, category) {
                Ok(test) => test,
                Err(error) => {
                    warn!(%binary, type_name = %ty.full_name, "skipping method: {error}");
                    result
                        .warnings
                        .push(format!("skipped method in `{}`: {error}", ty.full_name));
                    continue;
                }
            };

            let location = resolver.resolve(ty.short_name(), name);
            if location.is_none() {
                debug!(test = %test, "no source location found");
            }
            result.tests.push(
                test.with_location(location)
                    .with_tags(classified.tags.iter().cloned()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{list::TextSearchResolver, reflect::AttributeMetadata};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::{collections::HashMap, num::NonZeroU32};
    use vmtest_metadata::{SourceLocation, TestCategory};

    fn attr(name: &str) -> AttributeMetadata {
        AttributeMetadata {
            name: name.to_owned(),
            args: Vec::new(),
        }
    }

    fn method(name: &str, attributes: &[&str]) -> MethodMetadata {
        MethodMetadata {
            name: name.to_owned(),
            attributes: attributes.iter().copied().map(attr).collect(),
        }
    }

    fn class(full_name: &str, methods: Vec<MethodMetadata>) -> TypeMetadata {
        TypeMetadata {
            full_name: full_name.to_owned(),
            attributes: vec![attr("nanoFramework.TestFramework.TestClassAttribute")],
            methods,
            error: None,
        }
    }

    /// Resolves from a fixed table.
    #[derive(Default)]
    struct FixedResolver(HashMap<(String, String), SourceLocation>);

    impl SourceResolver for FixedResolver {
        fn resolve(&mut self, type_name: &str, method_name: &str) -> Option<SourceLocation> {
            self.0
                .get(&(type_name.to_owned(), method_name.to_owned()))
                .cloned()
        }
    }

    const MATH_TESTS: &str = indoc! {"
        namespace Contoso.Tests
        {
            [TestClass]
            public class MathTests
            {
                [Cleanup]
                public void TearDown() { }

                [TestMethod]
                public void Adds() { }

                [Setup]
                public void Init() { }

                [TestMethod]
                public void Subtracts() { }
            }
        }
    "};

    fn math_metadata() -> AssemblyMetadata {
        AssemblyMetadata {
            types: vec![class(
                "Contoso.Tests.MathTests",
                vec![
                    method("TearDown", &["Cleanup"]),
                    method("Adds", &["TestMethod"]),
                    method("Init", &["Setup"]),
                    method("Subtracts", &["TestMethodAttribute"]),
                ],
            )],
        }
    }

    #[test]
    fn setup_tests_cleanup_with_locations() {
        let dir = camino_tempfile::tempdir().unwrap();
        let source = dir.path().join("MathTests.cs");
        std::fs::write(&source, MATH_TESTS).unwrap();
        let binary = dir.path().join("bin/Contoso.Tests.dll");

        let mut resolver = TextSearchResolver::new([source.clone()]);
        let result = discover(&binary, &math_metadata(), &mut resolver);

        let summary: Vec<_> = result
            .tests
            .iter()
            .map(|test| {
                (
                    test.fully_qualified_name(),
                    test.category(),
                    test.line_number().map(NonZeroU32::get),
                )
            })
            .collect();
        assert_eq!(
            summary,
            [
                ("Contoso.Tests.MathTests.Init".to_owned(), TestCategory::Setup, Some(13)),
                ("Contoso.Tests.MathTests.Adds".to_owned(), TestCategory::Test, Some(10)),
                ("Contoso.Tests.MathTests.Subtracts".to_owned(), TestCategory::Test, Some(16)),
                ("Contoso.Tests.MathTests.TearDown".to_owned(), TestCategory::Cleanup, Some(7)),
            ]
        );
        assert!(result
            .tests
            .iter()
            .all(|test| test.code_file_path() == Some(source.as_path())
                && test.source_binary_path() == binary.as_path()));
        assert_eq!(result.warnings, Vec::<String>::new());
    }

    #[test]
    fn discovery_is_deterministic() {
        let dir = camino_tempfile::tempdir().unwrap();
        let source = dir.path().join("MathTests.cs");
        std::fs::write(&source, MATH_TESTS).unwrap();
        let binary = dir.path().join("Contoso.Tests.dll");
        let metadata = math_metadata();

        let first = discover(&binary, &metadata, &mut TextSearchResolver::new([source.clone()]));
        let second = discover(&binary, &metadata, &mut TextSearchResolver::new([source]));
        assert_eq!(first.tests, second.tests);
    }

    #[test]
    fn non_test_types_and_methods_are_ignored() {
        let metadata = AssemblyMetadata {
            types: vec![
                TypeMetadata {
                    full_name: "Contoso.Helpers".to_owned(),
                    methods: vec![method("Adds", &["TestMethod"])],
                    ..TypeMetadata::default()
                },
                class(
                    "Contoso.Tests.T",
                    vec![method("Helper", &[]), method("Old", &["System.ObsoleteAttribute"])],
                ),
            ],
        };
        let result = discover(
            Utf8Path::new("/out/T.dll"),
            &metadata,
            &mut FixedResolver::default(),
        );
        assert!(result.tests.is_empty());
    }

    #[test]
    fn data_rows_become_tags() {
        let mut rows = method("Parses", &[]);
        rows.attributes = vec![
            AttributeMetadata {
                name: "DataRow".to_owned(),
                args: vec!["1".to_owned(), "\"one\"".to_owned()],
            },
            AttributeMetadata {
                name: "DataRowAttribute".to_owned(),
                args: vec!["2".to_owned(), "\"two\"".to_owned()],
            },
        ];
        let metadata = AssemblyMetadata {
            types: vec![class("Contoso.Tests.ParseTests", vec![rows])],
        };

        let result = discover(
            Utf8Path::new("/out/T.dll"),
            &metadata,
            &mut FixedResolver::default(),
        );
        assert_eq!(result.tests.len(), 1);
        assert_eq!(result.tests[0].category(), TestCategory::Test);
        assert_eq!(result.tests[0].tags(), ["1, \"one\"", "2, \"two\""]);
        assert_eq!(result.tests[0].line_number(), None);
    }

    #[test]
    fn first_role_in_execution_order_wins() {
        let metadata = AssemblyMetadata {
            types: vec![class(
                "Contoso.Tests.T",
                vec![
                    method("Both", &["Cleanup", "Setup"]),
                    method("Plain", &["TestMethod"]),
                ],
            )],
        };
        let result = discover(
            Utf8Path::new("/out/T.dll"),
            &metadata,
            &mut FixedResolver::default(),
        );
        let categories: Vec<_> = result
            .tests
            .iter()
            .map(|test| (test.display_name(), test.category()))
            .collect();
        assert_eq!(
            categories,
            [("Both", TestCategory::Setup), ("Plain", TestCategory::Test)]
        );
    }

    #[test]
    fn failed_types_are_skipped_with_warning() {
        let metadata = AssemblyMetadata {
            types: vec![
                TypeMetadata {
                    full_name: "Contoso.Tests.Broken".to_owned(),
                    error: Some("could not load System.Net".to_owned()),
                    ..TypeMetadata::default()
                },
                class("Contoso.Tests.T", vec![method("Works", &["TestMethod"])]),
            ],
        };
        let mut resolver = FixedResolver::default();
        resolver.0.insert(
            ("T".to_owned(), "Works".to_owned()),
            SourceLocation {
                file: "/src/T.cs".into(),
                line: NonZeroU32::new(3).unwrap(),
            },
        );

        let result = discover(Utf8Path::new("/out/T.dll"), &metadata, &mut resolver);
        assert_eq!(result.tests.len(), 1);
        assert_eq!(result.tests[0].code_file_path(), Some(Utf8Path::new("/src/T.cs")));
        assert_eq!(
            result.warnings,
            ["skipped type `Contoso.Tests.Broken`: could not load System.Net"]
        );
    }

    #[test]
    fn empty_method_names_are_skipped() {
        let metadata = AssemblyMetadata {
            types: vec![class("Contoso.Tests.T", vec![method("", &["TestMethod"])])],
        };
        let result = discover(
            Utf8Path::new("/out/T.dll"),
            &metadata,
            &mut FixedResolver::default(),
        );
        assert!(result.tests.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }
}
