// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::time::Duration;
use vmtest_runner::{
    errors::{ArtifactResolveError, ChildStartError},
    runner::{execute, CancelHandle, SessionState},
};

#[tokio::test]
async fn completes_and_captures_both_streams() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let binary = workspace.add_binary(
        "out",
        "Contoso.Tests",
        indoc! {"
            out Test passed: Adds, 1000
            err diagnostic line
            out Done.
            exit 3
        "},
    )?;
    let config = runtime_config(Duration::from_secs(30));
    let mut cancel = CancelHandle::new().subscribe();

    let exit = execute(&binary, &config, &mut cancel).await?;
    assert_eq!(exit.state, SessionState::CompletedNormally);
    // The exit code is recorded but plays no part in the outcome.
    assert_eq!(exit.exit_status.and_then(|status| status.code()), Some(3));
    assert_eq!(exit.output.stdout_lossy(), "Test passed: Adds, 1000\nDone.\n");
    assert_eq!(exit.output.stderr_lossy(), "diagnostic line\n");
    assert!(exit.errors.is_empty(), "{:?}", exit.errors);
    Ok(())
}

#[tokio::test]
async fn artifacts_are_loaded_in_order() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let binary = workspace.add_binary("out", "Contoso.Tests", "out Done.\n")?;
    for name in ["mscorlib.pe", "nanoFramework.UnitTestLauncher.pe", "Zeta.pe", "Alpha.pe"] {
        workspace.write(&format!("out/{name}"), "")?;
    }
    let mut config = runtime_config(Duration::from_secs(30));
    config
        .set_launcher_artifacts(["nanoFramework.UnitTestLauncher.pe", "mscorlib.pe"])
        .set_extra_args(["-trace"]);
    let mut cancel = CancelHandle::new().subscribe();

    let exit = execute(&binary, &config, &mut cancel).await?;
    assert_eq!(exit.state, SessionState::CompletedNormally);

    let dir = binary.parent().expect("binary has a parent");
    let args = std::fs::read_to_string(dir.join("vm-args.txt"))?;
    let expected = [
        "-load".to_owned(),
        dir.join("nanoFramework.UnitTestLauncher.pe").to_string(),
        "-load".to_owned(),
        dir.join("mscorlib.pe").to_string(),
        "-load".to_owned(),
        dir.join("Contoso.Tests.pe").to_string(),
        "-load".to_owned(),
        dir.join("Alpha.pe").to_string(),
        "-load".to_owned(),
        dir.join("Zeta.pe").to_string(),
        "-trace".to_owned(),
    ]
    .join("\n");
    assert_eq!(args, expected);
    Ok(())
}

#[tokio::test]
async fn timeout_terminates_and_keeps_partial_output() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let binary = workspace.add_binary(
        "out",
        "Contoso.Tests",
        indoc! {"
            out Test passed: Adds, 10
            hang
        "},
    )?;
    let config = runtime_config(Duration::from_millis(500));
    let mut cancel = CancelHandle::new().subscribe();

    let exit = execute(&binary, &config, &mut cancel).await?;
    assert_eq!(exit.state, SessionState::TimedOut);
    assert!(exit.output.lossy().contains("Test passed: Adds, 10"));
    assert!(exit.time_taken >= Duration::from_millis(500));

    #[cfg(unix)]
    assert!(!process_exists(read_pid(&binary)?), "runtime still running");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn ignored_termination_request_leads_to_kill() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let binary = workspace.add_binary("out", "Contoso.Tests", "ignore-term\nhang\n")?;
    let mut config = runtime_config(Duration::from_millis(300));
    config.set_grace_period(Duration::from_millis(200));
    let mut cancel = CancelHandle::new().subscribe();

    let exit = execute(&binary, &config, &mut cancel).await?;
    assert_eq!(exit.state, SessionState::TimedOut);
    assert!(!process_exists(read_pid(&binary)?), "runtime still running");
    Ok(())
}

#[tokio::test]
async fn cancellation_kills_running_process() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let binary = workspace.add_binary("out", "Contoso.Tests", "out starting\nhang\n")?;
    let config = runtime_config(Duration::from_secs(60));
    let handle = CancelHandle::new();
    let mut cancel = handle.subscribe();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.cancel();
    });

    let exit = execute(&binary, &config, &mut cancel).await?;
    assert_eq!(exit.state, SessionState::Killed);
    assert!(exit.time_taken < Duration::from_secs(30));

    #[cfg(unix)]
    assert!(!process_exists(read_pid(&binary)?), "runtime still running");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn dropped_session_kills_and_reaps_runtime() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let binary = workspace.add_binary("out", "Contoso.Tests", "out starting\nhang\n")?;
    let config = runtime_config(Duration::from_secs(60));
    let mut cancel = CancelHandle::new().subscribe();

    // The session outlives the outer timeout, so the future is dropped with the runtime running.
    let res = tokio::time::timeout(
        Duration::from_millis(500),
        execute(&binary, &config, &mut cancel),
    )
    .await;
    assert!(res.is_err(), "session should still be running: {res:?}");

    // Dropping the session kills the runtime and reaps it before returning, so it isn't even a
    // zombie by now.
    assert!(!process_exists(read_pid(&binary)?), "runtime still running");
    Ok(())
}

#[cfg(unix)]
#[test]
fn panic_during_session_kills_runtime() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let binary = workspace.add_binary("out", "Contoso.Tests", "out starting\nhang\n")?;
    let config = runtime_config(Duration::from_secs(60));
    let pid_binary = binary.clone();

    let panicked = std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime built");
        runtime.block_on(async {
            let mut cancel = CancelHandle::new().subscribe();
            let session = execute(&binary, &config, &mut cancel);
            tokio::pin!(session);
            tokio::select! {
                _ = &mut session => panic!("session finished early"),
                () = tokio::time::sleep(Duration::from_millis(500)) => {}
            }
            panic!("host failure while the runtime is running");
        })
    })
    .join();
    assert!(panicked.is_err(), "thread should have panicked");

    assert!(!process_exists(read_pid(&pid_binary)?), "runtime still running");
    Ok(())
}

#[tokio::test]
async fn missing_runtime_fails_to_start() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let binary = workspace.add_binary("out", "Contoso.Tests", "out Done.\n")?;
    let mut config = runtime_config(Duration::from_secs(30));
    config.set_path(workspace.root().join("no-such-runtime"));
    let mut cancel = CancelHandle::new().subscribe();

    let error = execute(&binary, &config, &mut cancel)
        .await
        .expect_err("runtime should fail to start");
    assert!(matches!(error, ChildStartError::Spawn { .. }), "{error:?}");
    Ok(())
}

#[tokio::test]
async fn missing_artifact_fails_to_start() -> Result<()> {
    let workspace = FakeWorkspace::new()?;
    let binary = workspace.add_binary("out", "Contoso.Tests", "out Done.\n")?;
    let mut config = runtime_config(Duration::from_secs(30));
    config.set_launcher_artifacts(["mscorlib.pe"]);
    let mut cancel = CancelHandle::new().subscribe();

    let error = execute(&binary, &config, &mut cancel)
        .await
        .expect_err("artifact should be missing");
    assert!(
        matches!(
            error,
            ChildStartError::ResolveArtifacts(ArtifactResolveError::Missing { .. })
        ),
        "{error:?}"
    );
    Ok(())
}
