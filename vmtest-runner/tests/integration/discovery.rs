// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use vmtest_metadata::TestCategory;
use vmtest_runner::{
    config::VmtestConfig,
    errors::{DiscoverBinaryError, ReflectError},
    list::{OutputFormat, SerializableFormat, TestDiscoverer},
    reflect::CommandReflector,
};

const METADATA: &str = indoc! {r#"
    {
      "types": [
        {
          "full-name": "Contoso.Tests.MathTests",
          "attributes": [{ "name": "TestClass" }],
          "methods": [
            { "name": "Adds", "attributes": [{ "name": "TestMethod" }] },
            { "name": "Init", "attributes": [{ "name": "Setup" }] },
            { "name": "Helper" }
          ]
        },
        { "full-name": "Contoso.Tests.Util" }
      ]
    }
"#};

const SOURCE: &str = indoc! {"
    using nanoFramework.TestFramework;

    namespace Contoso.Tests
    {
        [TestClass]
        public class MathTests
        {
            [Setup]
            public void Init() { }

            [TestMethod]
            public void Adds() { }
        }
    }
"};

#[test]
fn discovers_through_reflector() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    workspace.write("Tests/Contoso.Tests.nfproj", "<Project />")?;
    let source = workspace.write("Tests/MathTests.cs", SOURCE)?;
    let binary = workspace.write("Tests/bin/Debug/Contoso.Tests.dll", "")?;
    workspace.write("Tests/bin/Debug/Contoso.Tests.metadata.json", METADATA)?;
    // Stale copies in build output must not be picked up.
    workspace.write("Tests/obj/MathTests.cs", SOURCE)?;
    let unreadable = workspace.write("Tests/bin/Debug/Broken.dll", "")?;

    let mut config = VmtestConfig::default_config();
    config.discovery_mut().set_reflector([FAKE_REFLECTOR]);
    let reflector = CommandReflector::from_config(config.discovery())?;
    let discoverer = TestDiscoverer::new(config.discovery(), reflector);

    let discovered = discoverer.discover([binary.clone(), unreadable.clone()]);

    let tests: Vec<_> = discovered
        .tests()
        .map(|test| {
            (
                test.fully_qualified_name(),
                test.category(),
                test.code_file_path().map(|path| path.to_owned()),
                test.line_number().map(|line| line.get()),
            )
        })
        .collect();
    assert_eq!(
        tests,
        [
            (
                "Contoso.Tests.MathTests.Init".to_owned(),
                TestCategory::Setup,
                Some(source.clone()),
                Some(9),
            ),
            (
                "Contoso.Tests.MathTests.Adds".to_owned(),
                TestCategory::Test,
                Some(source.clone()),
                Some(12),
            ),
        ]
    );
    assert!(discovered
        .tests()
        .all(|test| test.source_binary_path() == binary));

    let failures: Vec<_> = discovered.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, unreadable);
    assert!(
        matches!(
            failures[0].1,
            DiscoverBinaryError::Reflect {
                error: ReflectError::Failed { .. },
                ..
            }
        ),
        "{:?}",
        failures[0].1
    );

    let mut json = Vec::new();
    discovered.write(
        OutputFormat::Serializable(SerializableFormat::Json),
        &mut json,
        false,
    )?;
    let summary: vmtest_metadata::DiscoverySummary = serde_json::from_slice(&json)?;
    assert_eq!(summary.test_count, 2);
    assert!(summary.binaries[&unreadable].error.is_some());
    Ok(())
}

#[test]
fn binary_outside_any_project_has_no_tests() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let binary = workspace.write("loose/Loose.Tests.dll", "")?;
    workspace.write("loose/Loose.Tests.metadata.json", METADATA)?;

    let mut config = VmtestConfig::default_config();
    config.discovery_mut().set_reflector([FAKE_REFLECTOR]);
    let reflector = CommandReflector::from_config(config.discovery())?;
    let discovered = TestDiscoverer::new(config.discovery(), reflector).discover([binary]);

    assert_eq!(discovered.test_count(), 0);
    assert_eq!(discovered.failures().count(), 0);
    Ok(())
}
