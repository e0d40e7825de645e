// ABOUTME: Integration tests for local processes started through the local terminal.
// ABOUTME: Covers exit status capture, stream wiring, environment and termination.

use foreman::process::{ApplicationProcess, LocalProcess, ProcessError};
use foreman::terminal::{LaunchCommand, LocalTerminal, Terminal};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn sh(script: &str) -> LaunchCommand {
    LaunchCommand::new("sh").arg("-c").arg(script)
}

#[tokio::test]
async fn exit_status_is_returned_and_cached() {
    let process = LocalProcess::spawn(&sh("exit 7")).unwrap();

    assert_eq!(process.wait_for(Duration::from_secs(5)).await.unwrap(), Some(7));
    assert_eq!(process.exit_value(), Some(7));
    assert_eq!(process.wait().await.unwrap(), 7);

    process.close().await;
}

#[tokio::test]
async fn wait_for_times_out_on_running_process() {
    let process = LocalProcess::spawn(&LaunchCommand::new("sleep").arg("10")).unwrap();

    let started = Instant::now();
    let status = process.wait_for(Duration::from_millis(200)).await.unwrap();

    assert_eq!(status, None);
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(process.exit_value(), None);

    process.destroy().await;
    assert!(process.exit_value().is_some());
}

#[tokio::test]
async fn status_arriving_mid_wait_is_returned_promptly() {
    let process = LocalProcess::spawn(&sh("sleep 0.3")).unwrap();

    let started = Instant::now();
    let status = process.wait_for(Duration::from_secs(5)).await.unwrap();

    assert_eq!(status, Some(0));
    assert!(started.elapsed() < Duration::from_secs(2));
    process.close().await;
}

#[tokio::test]
async fn stdin_is_echoed_to_stdout() {
    let process = LocalProcess::spawn(&LaunchCommand::new("cat")).unwrap();
    let mut stdin = process.take_stdin().unwrap();
    let mut stdout = process.take_stdout().unwrap();
    assert!(process.take_stdin().is_none(), "stdin can only be taken once");

    stdin.write_all(b"ping\n").await.unwrap();
    drop(stdin);

    let mut echoed = String::new();
    stdout.read_to_string(&mut echoed).await.unwrap();
    assert_eq!(echoed, "ping\n");
    assert_eq!(process.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn environment_and_working_directory_are_applied() {
    let dir = tempfile::tempdir().unwrap();
    let command = sh("echo \"$GREETING\" && pwd")
        .env("GREETING", "hello")
        .working_directory(dir.path());

    let process = LocalTerminal.realize(&command).await.unwrap();
    let mut stdout = process.take_stdout().unwrap();
    let mut output = String::new();
    stdout.read_to_string(&mut output).await.unwrap();

    let mut lines = output.lines();
    assert_eq!(lines.next(), Some("hello"));
    let pwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
    assert_eq!(pwd, std::fs::canonicalize(dir.path()).unwrap());
    process.close().await;
}

#[tokio::test]
async fn close_terminates_a_running_process_by_default() {
    let process = LocalProcess::spawn(&LaunchCommand::new("sleep").arg("30")).unwrap();

    process.close().await;

    let status = process.exit_value().expect("closed process has a status");
    assert_ne!(status, 0);
    // A second close is a no-op.
    process.close().await;
}

#[tokio::test]
async fn interrupter_cancels_a_wait() {
    let process = LocalProcess::spawn(&LaunchCommand::new("sleep").arg("30")).unwrap();
    let interrupter = process.interrupter();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        interrupter.cancel();
    });

    let err = process.wait_for(Duration::from_secs(10)).await.unwrap_err();

    assert!(matches!(err, ProcessError::Interrupted(_)));
    process.destroy().await;
}

#[tokio::test]
async fn missing_program_fails_to_spawn() {
    let err = LocalProcess::spawn(&LaunchCommand::new("definitely-not-a-real-program-xyz")).unwrap_err();
    assert!(matches!(err, ProcessError::Spawn { .. }));
}
