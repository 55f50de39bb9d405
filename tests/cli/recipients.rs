//! Tests for `cellar recipients`.

use crate::support::*;
use cellar::core::cipher::PLAIN_KEY;

#[test]
fn test_recipients_ls() {
    let t = Test::init();
    let output = t.run(&["recipients", "ls"]);
    assert_success(&output);
    assert_stdout_contains(&output, PLAIN_KEY);
}

#[test]
fn test_remove_last_recipient_fails_with_hint() {
    let t = Test::with_secrets(&[("x", "pw\n")]);
    let output = t.run(&["recipients", "rm", PLAIN_KEY]);
    assert_failure(&output);
    assert_stderr_contains(&output, "last recipient");
    assert_stderr_contains(&output, "add another recipient first");

    let id_file = std::fs::read_to_string(t.store_path().join(".cellar-id")).unwrap();
    assert_eq!(id_file.trim(), PLAIN_KEY);
}

#[test]
fn test_recipients_of_unknown_mount() {
    let t = Test::init();
    let output = t.run(&["recipients", "ls", "--store", "nope"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "no such mount point");
}
