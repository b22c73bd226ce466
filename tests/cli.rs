//! CLI-level smoke tests: process exit codes and error message shape,
//! the way a user actually experiences them.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn fetch_missing_plan_file_fails_with_diagnostic() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("plan-orchestrator").unwrap();
    cmd.arg("--fetch-dir")
        .arg(tmp.path().join("fetch"))
        .arg("fetch")
        .arg(tmp.path().join("no-such-plan.json"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn new_and_update_flags_conflict() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("plan-orchestrator").unwrap();
    cmd.arg("--fetch-dir")
        .arg(tmp.path())
        .arg("--new")
        .arg("--update")
        .arg("fetch")
        .arg(tmp.path().join("plan.json"));
    cmd.assert().failure();
}

#[test]
fn help_lists_plan_fetch_and_build_modes() {
    let mut cmd = Command::cargo_bin("plan-orchestrator").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("build"));
}
