// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::{collections::BTreeMap, time::Duration};
use vmtest_metadata::{TestOutcome, TestResult};
use vmtest_runner::{
    reporter::{CancelReason, ReporterBuilder, ReporterStderr, TestEventKind},
    runner::{RunStats, TestRunnerBuilder},
    signal::SignalHandlerKind,
};

/// Runs the tests and returns each test's result, keyed by fully qualified name.
fn run_and_collect(
    tests: &[vmtest_metadata::TestCaseModel],
    config: &vmtest_runner::config::RuntimeConfig,
) -> Result<(BTreeMap<String, Vec<TestResult>>, RunStats)> {
    let runner = TestRunnerBuilder::default().build(config, SignalHandlerKind::Noop)?;
    let mut results: BTreeMap<String, Vec<TestResult>> = BTreeMap::new();
    let run_stats = runner.execute(tests, |event| {
        if let TestEventKind::TestFinished { test, result } = event.kind {
            results
                .entry(test.fully_qualified_name())
                .or_default()
                .push(result);
        }
    });
    Ok((results, run_stats))
}

#[test]
fn results_per_binary() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let math = workspace.add_binary(
        "math",
        "Math.Tests",
        indoc! {"
            out nanoCLR starting...
            out Test passed: Adds, 15000
            out Test failed: Subtracts, Assert.AreEqual failed. Expected:<1>. Actual:<2>.
            out Done.
        "},
    )?;
    let crashed = workspace.add_binary(
        "crashed",
        "Crashed.Tests",
        indoc! {"
            out Test passed: Parses, 20
            err unhandled exception
            exit 1
        "},
    )?;
    let missing = workspace.root().join("missing/Missing.Tests.dll");

    let tests = [
        test_case(&math, "Adds"),
        test_case(&crashed, "Parses"),
        test_case(&math, "Subtracts"),
        test_case(&crashed, "Formats"),
        test_case(&missing, "Ghost"),
    ];
    let (results, run_stats) = run_and_collect(&tests, &runtime_config(Duration::from_secs(30)))?;

    // Every test gets exactly one result.
    assert_eq!(results.len(), tests.len());
    assert!(results.values().all(|results| results.len() == 1));
    let result = |method: &str| results[&format!("Contoso.Tests.MathTests.{method}")][0].clone();

    assert_eq!(result("Adds"), TestResult::passed(Duration::from_micros(1500)));
    assert_eq!(
        result("Subtracts"),
        TestResult::failed("Assert.AreEqual failed. Expected:<1>. Actual:<2>.")
    );
    assert_eq!(result("Parses"), TestResult::passed(Duration::from_micros(2)));

    let formats = result("Formats");
    assert_eq!(formats.outcome(), TestOutcome::Failed);
    assert!(
        formats.error_message().unwrap().contains("unhandled exception"),
        "raw output attached: {formats:?}"
    );

    assert_eq!(result("Ghost").outcome(), TestOutcome::NotFound);

    assert_eq!(
        run_stats,
        RunStats {
            initial_run_count: 5,
            finished_count: 5,
            passed: 2,
            failed: 2,
            not_found: 1,
            ..RunStats::default()
        }
    );
    assert!(!run_stats.is_success());
    Ok(())
}

#[test]
fn timed_out_binary_fails_its_tests_only() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let slow = workspace.add_binary(
        "slow",
        "Slow.Tests",
        "out Test passed: First, 10\nhang\n",
    )?;
    let fast = workspace.add_binary("fast", "Fast.Tests", "out Test passed: Quick, 10\nout Done.\n")?;

    let tests = [
        test_case(&slow, "First"),
        test_case(&slow, "Second"),
        test_case(&fast, "Quick"),
    ];
    let (results, run_stats) = run_and_collect(&tests, &runtime_config(Duration::from_millis(500)))?;

    for method in ["First", "Second"] {
        let result = &results[&format!("Contoso.Tests.MathTests.{method}")][0];
        assert_eq!(result.outcome(), TestOutcome::Failed);
        let message = result.error_message().unwrap();
        assert!(message.starts_with("runtime timed out after"), "{message}");
        assert!(message.contains("Test passed: First, 10"), "{message}");
    }
    assert_eq!(
        results["Contoso.Tests.MathTests.Quick"][0].outcome(),
        TestOutcome::Passed
    );
    assert_eq!(run_stats.groups_timed_out, 1);
    assert_eq!(run_stats.cancel_reason, None);
    Ok(())
}

#[test]
fn cancel_from_another_thread() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let hanging = workspace.add_binary("hanging", "Hanging.Tests", "hang\n")?;
    let later = workspace.add_binary("later", "Later.Tests", "out Done.\n")?;
    let tests = [test_case(&hanging, "Waits"), test_case(&later, "NeverRuns")];

    let runner = TestRunnerBuilder::default()
        .build(&runtime_config(Duration::from_secs(60)), SignalHandlerKind::Noop)?;
    let cancel_handle = runner.cancel_handle();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        cancel_handle.cancel();
    });

    let mut outcomes = Vec::new();
    let mut cancel_reasons = Vec::new();
    let run_stats = runner.execute(&tests, |event| match event.kind {
        TestEventKind::TestFinished { test, result } => {
            outcomes.push((test.display_name().to_owned(), result.outcome()));
        }
        TestEventKind::RunBeginCancel { reason } => cancel_reasons.push(reason),
        _ => {}
    });
    canceller.join().expect("canceller thread panicked");

    assert_eq!(
        outcomes,
        [
            ("Waits".to_owned(), TestOutcome::Failed),
            ("NeverRuns".to_owned(), TestOutcome::Unknown),
        ]
    );
    assert_eq!(cancel_reasons, [CancelReason::Requested]);
    assert_eq!(run_stats.cancel_reason, Some(CancelReason::Requested));
    Ok(())
}

#[test]
fn reporter_output_and_junit() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let math = workspace.add_binary(
        "math",
        "Math.Tests",
        "out Test passed: Adds, 10\nout Test skipped: Later, not supported\nout Done.\n",
    )?;
    let tests = [test_case(&math, "Adds"), test_case(&math, "Later")];
    let junit_path = workspace.root().join("target/junit.xml");

    let mut buf = Vec::new();
    let run_stats = {
        let mut builder = ReporterBuilder::default();
        builder.set_junit_path(junit_path.clone());
        let mut reporter = builder.build(ReporterStderr::Buffer(&mut buf));
        let runner = TestRunnerBuilder::default()
            .build(&runtime_config(Duration::from_secs(30)), SignalHandlerKind::Noop)?;
        runner.try_execute(&tests, |event| reporter.report_event(event))?
    };

    assert!(run_stats.is_success());
    let out = String::from_utf8(buf)?;
    assert!(out.contains("Starting 2 tests across 1 binary"), "{out}");
    assert!(out.contains("PASS [   0.000s] Contoso.Tests.MathTests.Adds"), "{out}");
    assert!(out.contains("SKIP"), "{out}");
    assert!(out.contains("2 tests run: 1 passed, 1 skipped"), "{out}");

    let xml = std::fs::read_to_string(&junit_path)?;
    assert!(xml.contains(&format!(r#"<testsuite name="{math}""#)), "{xml}");
    Ok(())
}
