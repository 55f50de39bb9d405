//! Tests for `cellar show/insert/rm/mv/cp/ls`.

use crate::support::*;

#[test]
fn test_insert_and_show_roundtrip() {
    let t = Test::init();

    let output = t.insert("db/prod", "s3cret\n---\nuser: admin\n");
    assert_success(&output);
    assert_stdout_contains(&output, "saved");
    assert!(t.store_path().join("db").join("prod.txt").is_file());

    let output = t.show("db/prod");
    assert_success(&output);
    assert_stdout_contains(&output, "s3cret");
    assert_stdout_contains(&output, "user: admin");

    let output = t.run(&["show", "db/prod", "--password"]);
    assert_success(&output);
    assert_eq!(stdout(&output), "s3cret\n");

    let output = t.run(&["show", "db/prod", "--key", "user"]);
    assert_success(&output);
    assert_eq!(stdout(&output), "admin\n");
}

#[test]
fn test_show_missing_key_fails() {
    let t = Test::with_secrets(&[("plain", "pw\njust text\n")]);
    let output = t.run(&["show", "plain", "--key", "user"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "no --- marker");
}

#[test]
fn test_show_missing_secret_fails() {
    let t = Test::init();
    let output = t.show("nope");
    assert_failure(&output);
    assert_stderr_contains(&output, "secret not found");
}

#[test]
fn test_insert_existing_needs_force() {
    let t = Test::with_secrets(&[("x", "old\n")]);

    let output = t
        .cmd()
        .args(["insert", "x"])
        .write_stdin("new\n")
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "already exists");

    assert_success(&t.insert("x", "new\n"));
    assert_stdout_contains(&t.show("x"), "new");
}

#[test]
fn test_insert_rejects_traversal() {
    let t = Test::init();
    let output = t.insert("../outside", "pw\n");
    assert_failure(&output);
    assert_stderr_contains(&output, "escapes store root");
    assert!(!t.dir.path().join("outside.txt").exists());
}

#[test]
fn test_rm_without_force_is_aborted() {
    let t = Test::with_secrets(&[("x", "pw\n")]);
    let output = t.run(&["rm", "x"]);
    assert_success(&output);
    assert_stderr_contains(&output, "aborted");
    assert!(t.store_path().join("x.txt").is_file());
}

#[test]
fn test_rm_secret_and_directory() {
    let t = Test::with_secrets(&[("x", "pw\n"), ("dir/a", "pw\n"), ("dir/b", "pw\n")]);

    assert_success(&t.run(&["rm", "-f", "x"]));
    assert!(!t.store_path().join("x.txt").exists());

    let output = t.run(&["rm", "-f", "dir"]);
    assert_failure(&output);

    assert_success(&t.run(&["rm", "-rf", "dir"]));
    assert!(!t.store_path().join("dir").exists());
}

#[test]
fn test_mv_and_cp() {
    let t = Test::with_secrets(&[("a", "pw-a\n"), ("dir/x", "pw-x\n")]);

    assert_success(&t.run(&["cp", "a", "b"]));
    assert_stdout_contains(&t.show("b"), "pw-a");
    assert!(t.store_path().join("a.txt").is_file());

    assert_success(&t.run(&["mv", "a", "c"]));
    assert!(!t.store_path().join("a.txt").exists());
    assert_stdout_contains(&t.show("c"), "pw-a");

    let output = t.run(&["mv", "c", "b"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "already exists");
    assert_success(&t.run(&["mv", "-f", "c", "b"]));

    assert_success(&t.run(&["mv", "dir", "moved"]));
    assert_stdout_contains(&t.show("moved/x"), "pw-x");
}

#[test]
fn test_ls_tree_and_flat() {
    let t = Test::with_secrets(&[("web/b", "pw\n"), ("web/a", "pw\n"), ("db/prod", "pw\n")]);

    let output = t.run(&["ls"]);
    assert_success(&output);
    assert_stdout_contains(&output, "cellar");
    assert_stdout_contains(&output, "├── db/");
    assert_stdout_contains(&output, "└── web/");

    let output = t.run(&["ls", "--flat"]);
    assert_success(&output);
    assert_eq!(stdout(&output), "db/prod\nweb/a\nweb/b\n");

    let output = t.run(&["ls", "--flat", "web"]);
    assert_eq!(stdout(&output), "web/a\nweb/b\n");

    let output = t.run(&["ls", "nope"]);
    assert_failure(&output);
}
