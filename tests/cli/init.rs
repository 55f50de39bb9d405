//! Tests for `cellar init`.

use crate::support::*;
use cellar::core::cipher::PLAIN_KEY;

#[test]
fn test_init_creates_config_and_store() {
    let t = Test::new();

    let output = t.init_cmd();
    assert_success(&output);
    assert_stdout_contains(&output, "cellar initialized");
    assert_stdout_contains(&output, PLAIN_KEY);

    assert!(t.config_path().is_file());
    let id_file = std::fs::read_to_string(t.store_path().join(".cellar-id")).unwrap();
    assert_eq!(id_file.trim(), PLAIN_KEY);

    let config = std::fs::read_to_string(t.config_path()).unwrap();
    assert!(config.contains("backend = \"plain\""), "{config}");
}

#[test]
fn test_init_twice_fails() {
    let t = Test::init();
    let output = t.init_cmd();
    assert_failure(&output);
    assert_stderr_contains(&output, "already initialized");
}

#[test]
fn test_init_adopts_existing_store() {
    let t = Test::with_secrets(&[("kept", "pw\n")]);
    std::fs::remove_file(t.config_path()).unwrap();

    let output = t.init_cmd();
    assert_success(&output);
    assert_stderr_contains(&output, "already a store");

    let output = t.show("kept");
    assert_success(&output);
    assert_stdout_contains(&output, "pw");
}

#[test]
fn test_init_with_explicit_recipient() {
    let t = Test::new();
    let output = t
        .cmd()
        .args(["init", "--backend", "plain", "--recipient", "abc123", "--path"])
        .arg(t.store_path())
        .output()
        .unwrap();
    assert_success(&output);

    let id_file = std::fs::read_to_string(t.store_path().join(".cellar-id")).unwrap();
    assert_eq!(id_file, "abc123\n");
}
