// ABOUTME: Integration tests for the foreman CLI commands.
// ABOUTME: Validates --help output, exit code propagation and the await loop.

use assert_cmd::Command;
use predicates::prelude::*;

fn foreman_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("foreman"));
    cmd.env_remove("FOREMAN_ENSURE_TIMEOUT")
        .env_remove("FOREMAN_ENSURE_MAX_POLL")
        .env_remove("FOREMAN_ENSURE_INITIAL_DELAY")
        .env_remove("FOREMAN_AUTO_DEPLOY")
        .env_remove("FOREMAN_ORPHANS_PERMITTED");
    cmd
}

#[test]
fn help_shows_commands() {
    foreman_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("await"));
}

#[test]
fn run_streams_output_and_propagates_exit_code() {
    foreman_cmd()
        .args(["run", "-e", "WHO=world", "--", "sh", "-c", "echo hello $WHO; exit 3"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("hello world"))
        .stdout(predicate::str::contains("sh exited with 3"));
}

#[test]
fn run_uses_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "").unwrap();

    foreman_cmd()
        .arg("run")
        .arg("--workdir")
        .arg(dir.path())
        .args(["--", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("marker.txt"));
}

#[test]
fn run_times_out_long_programs() {
    foreman_cmd()
        .args(["run", "--timeout", "300ms", "--", "sleep", "30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("did not exit within"));
}

#[test]
fn run_rejects_malformed_environment() {
    foreman_cmd()
        .args(["run", "-e", "1BAD=x", "--", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1BAD"));
}

#[test]
fn json_mode_reports_exit_code() {
    foreman_cmd()
        .args(["--json", "run", "--", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""event":"success""#))
        .stdout(predicate::str::contains(r#""exit_code":0"#));
}

#[test]
fn await_succeeds_once_program_does() {
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("count");
    let script = format!(
        "n=$(cat {0} 2>/dev/null || echo 0); n=$((n+1)); echo $n > {0}; [ $n -ge 3 ]",
        counter.display()
    );

    foreman_cmd()
        .args(["--quiet", "await", "--within", "10s", "--every", "50ms", "--", "sh", "-c", &script])
        .assert()
        .success()
        .stdout(predicate::str::contains("Succeeded"));

    assert_eq!(std::fs::read_to_string(&counter).unwrap().trim(), "3");
}

#[test]
fn await_gives_up_and_names_the_program() {
    foreman_cmd()
        .args(["await", "--within", "300ms", "--every", "50ms", "--", "false"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("false never succeeded"));
}

#[test]
fn await_fails_fast_for_missing_programs() {
    foreman_cmd()
        .args(["await", "--within", "30s", "--", "definitely-not-a-real-program-xyz"])
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("permanently unavailable"));
}

#[test]
fn await_honors_configured_initial_delay() {
    let started = std::time::Instant::now();

    foreman_cmd()
        .env("FOREMAN_ENSURE_INITIAL_DELAY", "1500ms")
        .args(["--quiet", "await", "--within", "10s", "--", "true"])
        .assert()
        .success();

    assert!(started.elapsed() >= std::time::Duration::from_millis(1500));
}

#[test]
fn await_gives_up_within_configured_timeout() {
    foreman_cmd()
        .env("FOREMAN_ENSURE_TIMEOUT", "300ms")
        .args(["await", "--every", "50ms", "--", "false"])
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("false never succeeded"));
}
