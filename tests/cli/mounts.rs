//! Tests for `cellar mounts` and commands routed through mounts.

use crate::support::*;
use cellar::core::cipher::PLAIN_KEY;

#[test]
fn test_mount_lifecycle() {
    let t = Test::init();
    let team = t.dir.path().join("team");

    let output = t
        .cmd()
        .args(["mounts", "add", "team"])
        .arg(&team)
        .args(["--recipient", PLAIN_KEY])
        .output()
        .unwrap();
    assert_success(&output);
    assert_stdout_contains(&output, "initialized store");
    assert_stdout_contains(&output, "mounted");

    let output = t.run(&["mounts", "ls"]);
    assert_success(&output);
    assert_stdout_contains(&output, "team => ");

    assert_success(&t.insert("team/db", "pw\n"));
    assert!(team.join("db.txt").is_file());
    assert!(!t.store_path().join("team").exists());

    assert_success(&t.insert("top", "pw\n"));
    let output = t.run(&["ls", "--flat"]);
    assert_eq!(stdout(&output), "team/db\ntop\n");

    let output = t.run(&["ls"]);
    assert_stdout_contains(&output, &format!("team ({})", team.display()));

    assert_success(&t.run(&["mounts", "rm", "team"]));
    let output = t.run(&["mounts", "ls"]);
    assert_stdout_contains(&output, "no mounts");
    assert!(team.join("db.txt").is_file(), "unmount keeps files");
}

#[test]
fn test_mount_uninitialized_without_recipients_fails() {
    let t = Test::init();
    let output = t.run(&["mounts", "add", "team", "nowhere"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "store not initialized");
    assert_stderr_contains(&output, "--recipient");
}

#[test]
fn test_mount_root_path_twice_fails() {
    let t = Test::init();
    let output = t
        .cmd()
        .args(["mounts", "add", "again"])
        .arg(t.store_path())
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "mounted twice");
}

#[test]
fn test_cp_across_mounts() {
    let t = Test::with_secrets(&[("mine", "pw\nbody\n")]);
    let team = t.dir.path().join("team");
    let output = t
        .cmd()
        .args(["mounts", "add", "team"])
        .arg(&team)
        .args(["--recipient", PLAIN_KEY])
        .output()
        .unwrap();
    assert_success(&output);

    assert_success(&t.run(&["cp", "mine", "team/"]));
    assert!(team.join("mine.txt").is_file());
    assert_stdout_contains(&t.show("team/mine"), "body");
}
