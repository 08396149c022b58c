// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::supervisor::TerminateChildResult;
use crate::test_command::ChildAccumulator;
use std::time::Duration;
use tokio::process::Child;

pub(super) fn set_process_group(_cmd: &mut std::process::Command) {
    // TODO: assign the runtime to a job object so its descendants are terminated with it.
}

/// Windows has no graceful termination request for console processes, so the grace period is not
/// used: the process is terminated right away.
pub(super) async fn terminate_child(
    child: &mut Child,
    _child_acc: &mut ChildAccumulator,
    _grace_period: Duration,
) -> TerminateChildResult {
    if child.id().is_none() {
        return TerminateChildResult::Exited;
    }
    let _ = child.start_kill();
    TerminateChildResult::Killed
}

pub(super) fn kill_child_now(child: &mut Child) {
    let _ = child.start_kill();
}
