// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::supervisor::{self, SessionState};
use crate::{
    config::RuntimeConfig,
    errors::{ChildStartError, DisplayErrorChain, TestRunnerBuildError},
    reporter::{CancelReason, TestEvent, TestEventKind},
    result_parser,
    signal::{SignalHandler, SignalHandlerKind},
    time::stopwatch,
};
use camino::Utf8Path;
use chrono::Local;
use futures::prelude::*;
use indexmap::IndexMap;
use std::{
    convert::Infallible, fmt, num::NonZeroUsize, process::ExitStatus, sync::Arc, time::Duration,
};
use tokio::{runtime::Runtime, sync::watch};
use tracing::{debug, info, warn};
use vmtest_metadata::{TestCaseModel, TestOutcome, TestResult};

/// The message attached to tests in binaries that were never launched because the run was
/// cancelled.
pub const CANCELLED_BEFORE_START_MESSAGE: &str =
    "test run was cancelled before the runtime for this binary was started";

/// Test runner options.
#[derive(Debug, Default)]
pub struct TestRunnerBuilder {
    group_threads: Option<NonZeroUsize>,
    timeout: Option<Duration>,
}

impl TestRunnerBuilder {
    /// Sets the number of test binaries to run simultaneously.
    ///
    /// Each binary gets its own runtime process, so this is also the maximum number of runtime
    /// processes alive at a time.
    pub fn set_group_threads(&mut self, group_threads: NonZeroUsize) -> &mut Self {
        self.group_threads = Some(group_threads);
        self
    }

    /// Sets the upper bound on the wall-clock time of each runtime process.
    ///
    /// [`build`](Self::build) rejects a zero timeout.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Creates a new test runner.
    pub fn build(
        self,
        config: &RuntimeConfig,
        signal_handler: SignalHandlerKind,
    ) -> Result<TestRunner, TestRunnerBuildError> {
        let mut config = config.clone();
        if let Some(group_threads) = self.group_threads {
            config.set_group_threads(group_threads);
        }
        if let Some(timeout) = self.timeout {
            config.set_timeout(timeout);
        }
        if config.timeout().is_zero() {
            return Err(TestRunnerBuildError::ZeroTimeout);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("vmtest-runner-worker")
            .build()
            .map_err(TestRunnerBuildError::TokioRuntimeCreate)?;
        let _guard = runtime.enter();

        // signal_handler.build() must be called from within the guard.
        let signal_handler = signal_handler.build()?;

        let cancel_handle = CancelHandle::new();
        let cancel_receiver = cancel_handle.subscribe();

        Ok(TestRunner {
            config,
            runtime,
            signal_handler,
            cancel_handle,
            cancel_receiver,
        })
    }
}

/// Requests cancellation of a test run from outside the runner.
///
/// Usually obtained through [`TestRunner::cancel_handle`]. Cancelling terminates every runtime process
/// that is still going, and binaries that were not started yet are not launched.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<Option<CancelReason>>>,
}

impl CancelHandle {
    /// Creates a new handle that has not been cancelled.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Returns a receiver that observes cancellation through this handle.
    pub fn subscribe(&self) -> CancelReceiver {
        CancelReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Cancels the run. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.cancel_with(CancelReason::Requested);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.sender.borrow().is_some()
    }

    pub(crate) fn cancel_with(&self, reason: CancelReason) {
        // The first reason sticks.
        self.sender.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// The receiving end of a [`CancelHandle`].
#[derive(Clone, Debug)]
pub struct CancelReceiver {
    receiver: watch::Receiver<Option<CancelReason>>,
}

impl CancelReceiver {
    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.receiver.borrow().is_some()
    }

    /// Completes once cancellation is requested, returning the reason. Never completes if every
    /// handle is dropped without cancelling.
    pub async fn cancelled(&mut self) -> CancelReason {
        let res = self
            .receiver
            .wait_for(Option::is_some)
            .await
            .map(|reason| (*reason).unwrap_or(CancelReason::Requested));
        match res {
            Ok(reason) => reason,
            Err(_) => future::pending().await,
        }
    }
}

/// Context for running tests.
///
/// Created using [`TestRunnerBuilder::build`].
#[derive(Debug)]
pub struct TestRunner {
    config: RuntimeConfig,
    runtime: Runtime,
    signal_handler: SignalHandler,
    cancel_handle: CancelHandle,
    cancel_receiver: CancelReceiver,
}

impl TestRunner {
    /// Returns a handle that can be used to cancel the run, from any thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel_handle.clone()
    }

    /// Executes the given tests, one runtime process per test binary.
    ///
    /// The callback is called with events as results become available. Every test gets exactly
    /// one [`TestEventKind::TestFinished`] event.
    pub fn execute<'a, F>(self, tests: &'a [TestCaseModel], mut callback: F) -> RunStats
    where
        F: FnMut(TestEvent<'a>),
    {
        match self.try_execute::<Infallible, _>(tests, |event| {
            callback(event);
            Ok(())
        }) {
            Ok(run_stats) => run_stats,
            Err(error) => match error {},
        }
    }

    /// Executes the given tests, one runtime process per test binary.
    ///
    /// Accepts a callback that is called with events as results become available. If the callback
    /// returns an error, the run is cancelled and the first error is returned. Events that arrive
    /// afterwards are still passed to the callback.
    pub fn try_execute<'a, E, F>(
        mut self,
        tests: &'a [TestCaseModel],
        mut callback: F,
    ) -> Result<RunStats, E>
    where
        F: FnMut(TestEvent<'a>) -> Result<(), E>,
        E: fmt::Debug,
    {
        let mut first_error = None;
        let cancel_handle = self.cancel_handle.clone();

        let run_stats = {
            let cx = RunContext {
                config: &self.config,
                cancel_handle: &self.cancel_handle,
                cancel_receiver: &self.cancel_receiver,
            };
            let run = cx.run(tests, &mut self.signal_handler, |event| {
                if let Err(error) = callback(event) {
                    if first_error.is_none() {
                        warn!("error reporting test event, cancelling run: {error:?}");
                        cancel_handle.cancel_with(CancelReason::ReportError);
                        first_error = Some(error);
                    }
                }
            });
            self.runtime.block_on(run)
        };

        // A runtime descendant that outlived its session may still hold a pipe open. Shut down
        // without waiting on it.
        self.runtime.shutdown_background();

        match first_error {
            Some(error) => Err(error),
            None => Ok(run_stats),
        }
    }
}

struct RunContext<'c> {
    config: &'c RuntimeConfig,
    cancel_handle: &'c CancelHandle,
    cancel_receiver: &'c CancelReceiver,
}

impl RunContext<'_> {
    async fn run<'a, F>(
        &self,
        tests: &'a [TestCaseModel],
        signal_handler: &mut SignalHandler,
        mut callback: F,
    ) -> RunStats
    where
        F: FnMut(TestEvent<'a>),
    {
        let stopwatch = stopwatch();
        let mut emit = |kind: TestEventKind<'a>| {
            callback(TestEvent {
                timestamp: Local::now().fixed_offset(),
                elapsed: stopwatch.snapshot().duration,
                kind,
            });
        };

        let groups = group_by_binary(tests);
        let mut run_stats = RunStats {
            initial_run_count: tests.len(),
            ..RunStats::default()
        };
        info!(
            test_count = tests.len(),
            group_count = groups.len(),
            "starting test run",
        );
        emit(TestEventKind::RunStarted {
            test_count: tests.len(),
            group_count: groups.len(),
        });

        let group_threads = self.config.group_threads().get();
        let mut group_results = std::pin::pin!(
            stream::iter(groups)
                .map(|group| run_group(group, self.config, self.cancel_receiver.clone()))
                .buffer_unordered(group_threads)
        );

        let mut cancel_receiver = self.cancel_receiver.clone();
        let mut signals_done = false;

        // This loop is the only place results are recorded.
        loop {
            tokio::select! {
                // Cancellation is observed before the next group is recorded.
                biased;

                reason = cancel_receiver.cancelled(), if run_stats.cancel_reason.is_none() => {
                    info!("cancelling test run: {}", reason.to_static_str());
                    run_stats.cancel_reason = Some(reason);
                    emit(TestEventKind::RunBeginCancel { reason });
                }
                signal = signal_handler.recv(), if !signals_done => {
                    match signal {
                        Some(event) => self.cancel_handle.cancel_with(event.cancel_reason()),
                        None => signals_done = true,
                    }
                }
                group = group_results.next() => {
                    let Some(group) = group else {
                        break;
                    };
                    let test_count = group.results.len();
                    for (test, result) in group.results {
                        run_stats.on_test_finished(&result);
                        emit(TestEventKind::TestFinished { test, result });
                    }
                    run_stats.on_group_finished(&group.status);
                    emit(TestEventKind::GroupFinished {
                        binary: group.binary,
                        test_count,
                        status: group.status,
                        time_taken: group.time_taken,
                    });
                }
            }
        }

        let end = stopwatch.snapshot();
        info!(
            passed = run_stats.passed,
            failed = run_stats.failed,
            elapsed = ?end.duration,
            "test run finished",
        );
        emit(TestEventKind::RunFinished {
            start_time: end.start_time.fixed_offset(),
            elapsed: end.duration,
            run_stats,
        });

        run_stats
    }
}

/// The tests in a single binary, run by a single runtime process.
#[derive(Debug)]
struct TestGroup<'a> {
    binary: &'a Utf8Path,
    tests: Vec<&'a TestCaseModel>,
}

/// Groups tests by binary, in order of first appearance. Order within a group is preserved.
fn group_by_binary(tests: &[TestCaseModel]) -> Vec<TestGroup<'_>> {
    let mut groups: IndexMap<&Utf8Path, Vec<&TestCaseModel>> = IndexMap::new();
    for test in tests {
        groups.entry(test.source_binary_path()).or_default().push(test);
    }
    groups
        .into_iter()
        .map(|(binary, tests)| TestGroup { binary, tests })
        .collect()
}

/// What happened to the runtime process for a test binary.
#[derive(Clone, Debug)]
pub enum GroupStatus {
    /// The runtime exited on its own, and its output was parsed.
    Completed {
        /// The exit status, if the process could be waited on. Not used to determine outcomes.
        exit_status: Option<ExitStatus>,

        /// Whether the output contained the completion marker.
        done_marker: bool,
    },

    /// The runtime did not finish in time and was terminated.
    TimedOut {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The run was cancelled while the runtime was going, and it was terminated.
    Cancelled,

    /// The runtime could not be started.
    StartFailed {
        /// The error.
        error: ChildStartError,
    },

    /// The test binary did not exist, so no runtime was started.
    BinaryNotFound,

    /// The run was cancelled before the runtime was started.
    NotStarted,
}

impl GroupStatus {
    /// Returns a short description of the status.
    pub fn to_static_str(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::TimedOut { .. } => "timed out",
            Self::Cancelled => "cancelled",
            Self::StartFailed { .. } => "start failed",
            Self::BinaryNotFound => "binary not found",
            Self::NotStarted => "not started",
        }
    }
}

struct GroupResults<'a> {
    binary: &'a Utf8Path,
    status: GroupStatus,
    time_taken: Duration,
    results: Vec<(&'a TestCaseModel, TestResult)>,
}

impl<'a> GroupResults<'a> {
    /// Every test in the group gets the same result.
    fn uniform(group: TestGroup<'a>, status: GroupStatus, time_taken: Duration, result: TestResult) -> Self {
        let results = group
            .tests
            .into_iter()
            .map(|test| (test, result.clone()))
            .collect();
        Self {
            binary: group.binary,
            status,
            time_taken,
            results,
        }
    }
}

async fn run_group<'a>(
    group: TestGroup<'a>,
    config: &RuntimeConfig,
    mut cancel: CancelReceiver,
) -> GroupResults<'a> {
    let binary = group.binary;

    if cancel.is_cancelled() {
        debug!(%binary, "run cancelled, not starting runtime");
        return GroupResults::uniform(
            group,
            GroupStatus::NotStarted,
            Duration::ZERO,
            TestResult::unknown(CANCELLED_BEFORE_START_MESSAGE),
        );
    }

    if !binary.is_file() {
        warn!(%binary, "test binary not found");
        return GroupResults::uniform(
            group,
            GroupStatus::BinaryNotFound,
            Duration::ZERO,
            TestResult::not_found(format!("test binary `{binary}` not found")),
        );
    }

    debug!(%binary, test_count = group.tests.len(), "starting runtime");
    let exit = match supervisor::execute(binary, config, &mut cancel).await {
        Ok(exit) => exit,
        Err(error) => {
            warn!(%binary, "failed to start runtime: {}", DisplayErrorChain::new(&error));
            let message = format!("failed to start runtime: {}", DisplayErrorChain::new(&error));
            return GroupResults::uniform(
                group,
                GroupStatus::StartFailed { error },
                Duration::ZERO,
                TestResult::failed(message),
            );
        }
    };

    for error in &exit.errors {
        warn!(%binary, "error capturing runtime output: {}", DisplayErrorChain::new(error));
    }

    let raw_output = exit.output.lossy();
    match exit.state {
        SessionState::CompletedNormally => {
            let parsed = result_parser::parse(&raw_output, &group.tests);
            if !parsed.completed() {
                warn!(%binary, "runtime exited without reporting completion");
            }
            let status = GroupStatus::Completed {
                exit_status: exit.exit_status,
                done_marker: parsed.completed(),
            };
            GroupResults {
                binary,
                status,
                time_taken: exit.time_taken,
                results: group.tests.into_iter().zip(parsed.into_results()).collect(),
            }
        }
        SessionState::TimedOut => {
            let timeout = config.timeout();
            let message = with_output(format!("runtime timed out after {timeout:?}"), &raw_output);
            GroupResults::uniform(
                group,
                GroupStatus::TimedOut { timeout },
                exit.time_taken,
                TestResult::failed(message),
            )
        }
        other => {
            // Killed is the only other state a started session can end in.
            debug_assert_eq!(other, SessionState::Killed);
            let message = with_output("test run was cancelled while the runtime was running", &raw_output);
            GroupResults::uniform(
                group,
                GroupStatus::Cancelled,
                exit.time_taken,
                TestResult::failed(message),
            )
        }
    }
}

fn with_output(message: impl fmt::Display, output: &str) -> String {
    if output.is_empty() {
        message.to_string()
    } else {
        format!("{message}\n--- output:\n{output}")
    }
}

/// Statistics for a test run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The total number of tests that were requested.
    pub initial_run_count: usize,

    /// The total number of tests that have a result.
    pub finished_count: usize,

    /// The number of tests that passed.
    pub passed: usize,

    /// The number of tests that failed, including tests in binaries whose runtime timed out, was
    /// cancelled, or could not be started.
    pub failed: usize,

    /// The number of tests that were skipped.
    pub skipped: usize,

    /// The number of tests whose binary was not found.
    pub not_found: usize,

    /// The number of tests without a reported result.
    pub unknown: usize,

    /// The number of runtime processes that timed out.
    pub groups_timed_out: usize,

    /// The number of runtime processes that could not be started.
    pub groups_start_failed: usize,

    /// Set if the run was cancelled.
    pub cancel_reason: Option<CancelReason>,
}

impl RunStats {
    /// Returns true if this run is considered a success.
    ///
    /// A run is a failure if it was cancelled, or if any test did not pass or get skipped.
    pub fn is_success(&self) -> bool {
        self.cancel_reason.is_none()
            && self.initial_run_count == self.finished_count
            && !self.any_failed()
    }

    /// Returns true if any test has an outcome other than passed or skipped.
    pub fn any_failed(&self) -> bool {
        self.failed > 0 || self.not_found > 0 || self.unknown > 0
    }

    fn on_test_finished(&mut self, result: &TestResult) {
        self.finished_count += 1;
        match result.outcome() {
            TestOutcome::Passed => self.passed += 1,
            TestOutcome::Failed => self.failed += 1,
            TestOutcome::Skipped => self.skipped += 1,
            TestOutcome::NotFound => self.not_found += 1,
            TestOutcome::Unknown => self.unknown += 1,
        }
    }

    fn on_group_finished(&mut self, status: &GroupStatus) {
        match status {
            GroupStatus::TimedOut { .. } => self.groups_timed_out += 1,
            GroupStatus::StartFailed { .. } => self.groups_start_failed += 1,
            GroupStatus::Completed { .. }
            | GroupStatus::Cancelled
            | GroupStatus::BinaryNotFound
            | GroupStatus::NotStarted => {}
        }
    }
}
