//! Tests for `cellar fsck`.

use crate::support::*;

#[test]
fn test_fsck_clean() {
    let t = Test::with_secrets(&[("a", "pw\n"), ("b/c", "pw\n")]);
    let output = t.run(&["fsck", "--check"]);
    assert_success(&output);
    assert_stdout_contains(&output, "2 secrets");
    assert_stdout_contains(&output, "no problems found");
}

#[cfg(unix)]
#[test]
fn test_fsck_fixes_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let t = Test::with_secrets(&[("a", "pw\n")]);
    let file = t.store_path().join("a.txt");
    std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();

    let output = t.run(&["fsck", "--check"]);
    assert_success(&output);
    assert_stderr_contains(&output, "permissions too wide");
    let mode = std::fs::metadata(&file).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o644);

    let output = t.run(&["fsck", "-f"]);
    assert_success(&output);
    assert_stdout_contains(&output, "(fixed)");
    let mode = std::fs::metadata(&file).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}

#[test]
fn test_fsck_undecryptable_exits_nonzero() {
    let t = Test::with_secrets(&[("a", "pw\n")]);
    std::fs::write(t.store_path().join("broken.txt"), "cellar-plain:someone-else\npw\n").unwrap();

    let output = t.run(&["fsck", "--check"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "cannot decrypt");
}

#[test]
fn test_fsck_check_and_force_conflict() {
    let t = Test::init();
    let output = t.run(&["fsck", "--check", "--force"]);
    assert_failure(&output);
}
