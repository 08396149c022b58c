// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supervision of a single runtime process.
//!
//! A [`ProcessSession`] is created for every launch. It owns the child handle and its output, and
//! it force-kills and reaps the child if it is dropped while the child might still be running, for
//! example when the future returned by [`execute`] is dropped or a panic unwinds through it. Every
//! path out of [`execute`] confirms the child has exited first.

use super::{imp::CancelReceiver, os};
use crate::{
    config::RuntimeConfig,
    errors::{ChildFdError, ChildStartError},
    test_command::{Child, ChildAccumulator, RuntimeCommand},
    test_output::CapturedOutput,
    time::stopwatch,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    fmt,
    process::ExitStatus,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::process::Child as TokioChild;
use tracing::{debug, warn};

/// How long to wait for a killed process to be reaped, and for its output pipes to close.
pub const KILL_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a dropped session blocks waiting for its killed child to be reaped.
///
/// A child not reaped by then is left to tokio's orphan reaper.
const DROP_REAP_TIMEOUT: Duration = Duration::from_secs(1);
const DROP_REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The state of a runtime process session.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionState {
    /// The session was created but nothing has happened yet.
    NotStarted,

    /// The command line is being built and the process spawned.
    Starting,

    /// The process is running and its output is being captured.
    Running,

    /// The process exited on its own before the deadline.
    CompletedNormally,

    /// The deadline passed and the process was terminated.
    TimedOut,

    /// The session was cancelled and the process was terminated.
    Killed,

    /// The process could not be started.
    StartFailed,
}

impl SessionState {
    /// Returns true if this is a final state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::CompletedNormally | Self::TimedOut | Self::Killed | Self::StartFailed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not started",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::CompletedNormally => "completed",
            Self::TimedOut => "timed out",
            Self::Killed => "killed",
            Self::StartFailed => "start failed",
        };
        f.write_str(s)
    }
}

/// The outcome of a runtime process that was started.
#[derive(Clone, Debug)]
pub struct SessionExit {
    /// The final state: one of `CompletedNormally`, `TimedOut` or `Killed`.
    pub state: SessionState,

    /// The exit status, if the process could be waited on.
    pub exit_status: Option<ExitStatus>,

    /// Everything the process wrote, both streams interleaved.
    pub output: CapturedOutput,

    /// Errors encountered while reading output or waiting for the process.
    pub errors: Vec<ChildFdError>,

    /// Wall-clock time from spawn to confirmed exit.
    pub time_taken: Duration,
}

/// Timing settings for a session.
#[derive(Copy, Clone, Debug)]
pub struct SupervisorSettings {
    /// Upper bound on the wall-clock time of the process.
    pub timeout: Duration,

    /// Time allowed between a graceful termination request and a forced kill.
    pub grace_period: Duration,
}

impl SupervisorSettings {
    /// Reads settings from the runtime config.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            timeout: config.timeout(),
            grace_period: config.grace_period(),
        }
    }
}

/// Runs the runtime against one test binary, capturing its output.
///
/// Returns an error if the process could not be started. Otherwise the process is confirmed to
/// have exited by the time this returns, whether it completed, timed out or was cancelled.
pub async fn execute(
    binary: &Utf8Path,
    config: &RuntimeConfig,
    cancel: &mut CancelReceiver,
) -> Result<SessionExit, ChildStartError> {
    let settings = SupervisorSettings::from_config(config);
    let mut session = ProcessSession::new(binary);
    session.transition(SessionState::Starting);

    let child = RuntimeCommand::new(binary, config).and_then(|mut cmd| {
        os::set_process_group(cmd.command_mut());
        cmd.spawn()
    });
    let Child { child, child_fds } = match child {
        Ok(child) => child,
        Err(error) => {
            session.transition(SessionState::StartFailed);
            return Err(error);
        }
    };

    let stopwatch = stopwatch();
    session.start(child, ChildAccumulator::new(child_fds));
    let state = session.run(settings, cancel).await;
    Ok(session.finish(state, stopwatch.snapshot().duration))
}

/// A single launch of the runtime process.
pub(crate) struct ProcessSession {
    binary: Utf8PathBuf,
    state: SessionState,
    child: Option<TokioChild>,
    child_acc: Option<ChildAccumulator>,
    exit_status: Option<ExitStatus>,
}

impl ProcessSession {
    fn new(binary: &Utf8Path) -> Self {
        Self {
            binary: binary.to_owned(),
            state: SessionState::NotStarted,
            child: None,
            child_acc: None,
            exit_status: None,
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            binary = %self.binary,
            from = %self.state,
            to = %next,
            "runtime session state change",
        );
        self.state = next;
    }

    fn start(&mut self, child: TokioChild, child_acc: ChildAccumulator) {
        self.child = Some(child);
        self.child_acc = Some(child_acc);
        self.transition(SessionState::Running);
    }

    /// Waits for exit, the deadline or cancellation, whichever comes first. Returns the final
    /// state once the child has exited.
    async fn run(&mut self, settings: SupervisorSettings, cancel: &mut CancelReceiver) -> SessionState {
        let (Some(child), Some(child_acc)) = (self.child.as_mut(), self.child_acc.as_mut()) else {
            return SessionState::StartFailed;
        };

        let mut deadline = std::pin::pin!(tokio::time::sleep(settings.timeout));

        let (state, res) = loop {
            tokio::select! {
                () = child_acc.fill_buf(), if !child_acc.fds.is_done() => {}
                res = child.wait() => {
                    break (SessionState::CompletedNormally, Some(res));
                }
                () = &mut deadline => {
                    debug!(binary = %self.binary, timeout = ?settings.timeout, "runtime timed out");
                    let res = terminate(child, child_acc, settings.grace_period).await;
                    break (SessionState::TimedOut, res);
                }
                _ = cancel.cancelled() => {
                    debug!(binary = %self.binary, "runtime session cancelled");
                    let res = terminate(child, child_acc, settings.grace_period).await;
                    break (SessionState::Killed, res);
                }
            }
        };

        match res {
            Some(Ok(exit_status)) => self.exit_status = Some(exit_status),
            Some(Err(error)) => child_acc.errors.push(ChildFdError::Wait(Arc::new(error))),
            None => {
                warn!(
                    binary = %self.binary,
                    "runtime did not exit within {KILL_WAIT_TIMEOUT:?} of being killed",
                );
            }
        }

        // The process is gone, but a descendant might still hold the pipes open.
        if tokio::time::timeout(KILL_WAIT_TIMEOUT, child_acc.drain())
            .await
            .is_err()
        {
            warn!(binary = %self.binary, "runtime output pipes still open after exit");
        }

        state
    }

    fn finish(mut self, state: SessionState, time_taken: Duration) -> SessionExit {
        self.transition(state);
        let (output, errors) = match self.child_acc.take() {
            Some(child_acc) => child_acc.freeze(),
            None => (CapturedOutput::default(), Vec::new()),
        };
        SessionExit {
            state,
            exit_status: self.exit_status,
            output,
            errors,
            time_taken,
        }
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        // Only a session that was never moved to a final state can have a live child.
        if self.state.is_terminal() {
            return;
        }
        if let Some(child) = self.child.as_mut() {
            warn!(binary = %self.binary, "runtime session dropped while running, killing");
            os::kill_child_now(child);
            reap_killed_child(&self.binary, child);
        }
    }
}

/// Polls a killed child until it has been reaped, for at most [`DROP_REAP_TIMEOUT`].
///
/// This runs from `Drop`, where the child can't be awaited.
fn reap_killed_child(binary: &Utf8Path, child: &mut TokioChild) {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(exit_status)) => {
                debug!(%binary, %exit_status, "dropped runtime session reaped");
                return;
            }
            Ok(None) if start.elapsed() < DROP_REAP_TIMEOUT => {
                std::thread::sleep(DROP_REAP_POLL_INTERVAL);
            }
            Ok(None) => {
                warn!(
                    %binary,
                    "runtime not reaped within {DROP_REAP_TIMEOUT:?} of being killed, \
                     leaving it to the orphan reaper",
                );
                return;
            }
            Err(error) => {
                warn!(%binary, %error, "failed to reap killed runtime");
                return;
            }
        }
    }
}

/// Terminates the child, then waits a bounded amount of time for it to be reaped.
///
/// Returns `None` if the child could not be reaped in time.
async fn terminate(
    child: &mut TokioChild,
    child_acc: &mut ChildAccumulator,
    grace_period: Duration,
) -> Option<std::io::Result<ExitStatus>> {
    match os::terminate_child(child, child_acc, grace_period).await {
        TerminateChildResult::Exited => {}
        TerminateChildResult::Killed => {
            debug!("runtime killed after grace period of {grace_period:?}");
        }
    }
    tokio::time::timeout(KILL_WAIT_TIMEOUT, child.wait())
        .await
        .ok()
}

/// The result of [`os::terminate_child`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(super) enum TerminateChildResult {
    /// The child exited within the grace period.
    Exited,

    /// The child was forcibly killed.
    Killed,
}
