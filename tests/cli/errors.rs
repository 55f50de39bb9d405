//! Error reporting: messages, hints, exit codes.

use crate::support::*;
use predicates::prelude::*;

#[test]
fn test_not_initialized() {
    let t = Test::new();
    t.cmd()
        .args(["show", "anything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"))
        .stderr(predicate::str::contains("run: cellar init"));
}

#[test]
fn test_store_directory_missing() {
    let t = Test::init();
    std::fs::remove_dir_all(t.store_path()).unwrap();
    let output = t.run(&["ls"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "store not initialized");
}

#[test]
fn test_broken_config() {
    let t = Test::init();
    std::fs::write(t.config_path(), "this is [not toml").unwrap();
    let output = t.run(&["ls"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "failed to parse config");
}

#[test]
fn test_unknown_backend() {
    let t = Test::new();
    let output = t.run(&["init", "--backend", "rot13"]);
    assert_failure(&output);
}

#[test]
fn test_completions() {
    let t = Test::new();
    t.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_cellar"));
}

#[test]
fn test_verbose_logs_to_stderr() {
    let t = Test::with_secrets(&[("x", "pw\n")]);
    let output = t.run(&["-v", "show", "x"]);
    assert_success(&output);
    assert_eq!(stdout(&output), "pw\n");
    assert_stderr_contains(&output, "DEBUG");
}
