// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::supervisor::TerminateChildResult;
use crate::test_command::ChildAccumulator;
use libc::{SIGKILL, SIGTERM};
use std::{os::unix::process::CommandExt, time::Duration};
use tokio::process::Child;

/// Pre-execution configuration on Unix.
///
/// The runtime gets its own process group, so that anything it spawns is terminated along with it.
pub(super) fn set_process_group(cmd: &mut std::process::Command) {
    cmd.process_group(0);
}

/// Sends SIGTERM to the process group, waits up to `grace_period` while still draining output, then
/// sends SIGKILL.
///
/// A zero grace period means SIGKILL right away.
pub(super) async fn terminate_child(
    child: &mut Child,
    child_acc: &mut ChildAccumulator,
    grace_period: Duration,
) -> TerminateChildResult {
    let Some(pid) = child.id() else {
        return TerminateChildResult::Exited;
    };
    let pgid = for_kill(pid);

    if grace_period.is_zero() {
        unsafe { libc::kill(pgid, SIGKILL) };
        // SIGKILL guarantees the process group is dead.
        return TerminateChildResult::Killed;
    }

    unsafe { libc::kill(pgid, SIGTERM) };

    let mut sleep = std::pin::pin!(tokio::time::sleep(grace_period));
    loop {
        tokio::select! {
            () = child_acc.fill_buf(), if !child_acc.fds.is_done() => {}
            _ = child.wait() => {
                // The process exited.
                break TerminateChildResult::Exited;
            }
            () = &mut sleep => {
                // The process didn't exit -- need to do a hard shutdown.
                unsafe { libc::kill(pgid, SIGKILL) };
                break TerminateChildResult::Killed;
            }
        }
    }
}

/// Kills the process group without waiting.
pub(super) fn kill_child_now(child: &mut Child) {
    if let Some(pid) = child.id() {
        unsafe { libc::kill(for_kill(pid), SIGKILL) };
    }
    // Also kill the direct child, in case it left the process group.
    let _ = child.start_kill();
}

// The child is the leader of its own process group, so the group ID is its PID. A negative PID
// makes kill(2) signal the whole group.
fn for_kill(pid: u32) -> libc::pid_t {
    -(pid as libc::pid_t)
}
