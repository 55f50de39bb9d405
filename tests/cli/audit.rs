//! Tests for `cellar audit`.

use crate::support::*;

#[test]
fn test_audit_clean() {
    let t = Test::with_secrets(&[("a", "a-long-unique-password-1\n"), ("b", "another-long-password-2\n")]);
    let output = t.run(&["audit"]);
    assert_success(&output);
    assert_stdout_contains(&output, "2 secrets checked, no issues");
}

#[test]
fn test_audit_reports_weak_and_reused() {
    let t = Test::with_secrets(&[
        ("short", "abc\n"),
        ("one", "shared-password-123\n"),
        ("two", "shared-password-123\n"),
        ("fine", "unique-password-456\n"),
    ]);
    let output = t.run(&["audit"]);
    assert_failure(&output);
    assert_stdout_contains(&output, "short password (3 chars)");
    assert_stdout_contains(&output, "password reused in two");
    assert_stdout_excludes(&output, "fine");
}

#[test]
fn test_audit_prefix() {
    let t = Test::with_secrets(&[("weak/x", "abc\n"), ("ok/y", "a-long-unique-password-1\n")]);
    let output = t.run(&["audit", "ok"]);
    assert_success(&output);
    assert_stdout_contains(&output, "1 secret checked");
}
