//! Recipient management: lists, bundled keys, re-encryption.

mod support;

use cellar::core::cipher::Cipher;
use cellar::core::options::Hooks;
use cellar::core::secret::Secret;
use cellar::core::store::Store;
use cellar::error::{Error, StoreError};
use support::*;
use tempfile::TempDir;

fn ids_of(store: &Store, person: &Person, name: &str) -> Vec<String> {
    let ct = std::fs::read(store.passfile(name).unwrap()).unwrap();
    let mut ids = person.xc.recipient_ids(&ct).unwrap();
    ids.sort();
    ids
}

fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

#[test]
fn test_add_recipient_reencrypts_with_two_commits() {
    let tmp = TempDir::new().unwrap();
    let alice = Person::new("alice");
    let bob = Person::new("bob");
    alice.knows(&bob);
    bob.knows(&alice);
    let sync = RecordingSync::new(SyncMode::Ok);
    let store = store_at(
        "",
        &tmp.path().join("store"),
        alice.crypto(),
        sync.clone(),
        Hooks::default(),
        &[alice.fp.clone()],
    );
    for name in ["a", "dir/b", "dir/deeper/c"] {
        store.set(name, &Secret::new(name, ""), &opts()).unwrap();
    }
    let before = sync.commit_count();

    store.add_recipient(&bob.fp, &opts()).unwrap();

    assert_eq!(sync.commit_count(), before + 2);
    let messages = sync.messages();
    assert!(messages[before].starts_with("Added recipient"));
    assert!(messages[before + 1].starts_with("Re-encrypted for new recipient"));

    let want = sorted(vec![alice.fp.clone(), bob.fp.clone()]);
    for name in ["a", "dir/b", "dir/deeper/c"] {
        assert_eq!(ids_of(&store, &alice, name), want);
    }
    assert_eq!(store.recipients("").unwrap(), want);
    assert!(store.path().join(".public-keys").join(&bob.fp).is_file());

    let as_bob = Store::new(
        "",
        store.path(),
        bob.crypto(),
        RecordingSync::new(SyncMode::Ok),
        Hooks::default(),
    );
    assert_eq!(as_bob.get("dir/deeper/c", &opts()).unwrap().password(), "dir/deeper/c");
}

#[test]
fn test_add_existing_recipient_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let alice = Person::new("alice");
    let store = store_at(
        "",
        &tmp.path().join("store"),
        alice.crypto(),
        RecordingSync::new(SyncMode::Ok),
        Hooks::default(),
        &[alice.fp.clone()],
    );

    assert_root_err!(
        store.add_recipient(&alice.fp, &opts()),
        Error::Store(StoreError::RecipientExists(_))
    );
    // a suffix resolving to a listed key is the same recipient
    let suffix = &alice.fp[alice.fp.len() - 16..];
    assert_root_err!(
        store.add_recipient(suffix, &opts()),
        Error::Store(StoreError::RecipientExists(_))
    );
}

#[test]
fn test_add_recipient_by_suffix_stores_full_id() {
    let tmp = TempDir::new().unwrap();
    let alice = Person::new("alice");
    let bob = Person::new("bob");
    alice.knows(&bob);
    let store = store_at(
        "",
        &tmp.path().join("store"),
        alice.crypto(),
        RecordingSync::new(SyncMode::Ok),
        Hooks::default(),
        &[alice.fp.clone()],
    );

    let suffix = &bob.fp[bob.fp.len() - 16..];
    store.add_recipient(suffix, &opts()).unwrap();
    assert!(store.recipients("").unwrap().contains(&bob.fp));
}

#[test]
fn test_remove_recipient() {
    let tmp = TempDir::new().unwrap();
    let alice = Person::new("alice");
    let bob = Person::new("bob");
    alice.knows(&bob);
    bob.knows(&alice);
    let store = store_at(
        "",
        &tmp.path().join("store"),
        alice.crypto(),
        RecordingSync::new(SyncMode::Ok),
        Hooks::default(),
        &[alice.fp.clone(), bob.fp.clone()],
    );
    store.set("shared", &Secret::new("pw", "old"), &opts()).unwrap();
    let old_bytes = std::fs::read(store.passfile("shared").unwrap()).unwrap();
    assert!(store.path().join(".public-keys").join(&bob.fp).is_file());

    store.remove_recipient(&bob.fp, &opts()).unwrap();

    assert_eq!(store.recipients("").unwrap(), vec![alice.fp.clone()]);
    assert_eq!(ids_of(&store, &alice, "shared"), vec![alice.fp.clone()]);
    assert!(!store.path().join(".public-keys").join(&bob.fp).exists());

    // bytes bob already had stay readable to him
    let plain = bob.xc.decrypt(&old_bytes, &opts()).unwrap();
    assert!(String::from_utf8_lossy(&plain).contains("old"));
}

#[test]
fn test_removing_last_recipient_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    let alice = Person::new("alice");
    let sync = RecordingSync::new(SyncMode::Ok);
    let store = store_at(
        "",
        &tmp.path().join("store"),
        alice.crypto(),
        sync.clone(),
        Hooks::default(),
        &[alice.fp.clone()],
    );
    store.set("x", &Secret::new("pw", ""), &opts()).unwrap();
    let id_file = std::fs::read(store.path().join(".cellar-id")).unwrap();
    let before = sync.commit_count();

    assert_root_err!(
        store.remove_recipient(&alice.fp, &opts()),
        Error::Store(StoreError::LastRecipient)
    );
    assert_root_err!(
        store.save_recipients(&[], "empty", &opts()),
        Error::Store(StoreError::LastRecipient)
    );
    assert_eq!(std::fs::read(store.path().join(".cellar-id")).unwrap(), id_file);
    assert_eq!(sync.commit_count(), before);
}

#[test]
fn test_remove_unknown_recipient() {
    let tmp = TempDir::new().unwrap();
    let alice = Person::new("alice");
    let store = store_at(
        "",
        &tmp.path().join("store"),
        alice.crypto(),
        RecordingSync::new(SyncMode::Ok),
        Hooks::default(),
        &[alice.fp.clone()],
    );
    assert_root_err!(
        store.remove_recipient("0000dead", &opts()),
        Error::Store(StoreError::RecipientNotFound(_))
    );
}

#[test]
fn test_nested_id_file_scopes_subtree() {
    let tmp = TempDir::new().unwrap();
    let alice = Person::new("alice");
    let bob = Person::new("bob");
    alice.knows(&bob);
    let store = store_at(
        "",
        &tmp.path().join("store"),
        alice.crypto(),
        RecordingSync::new(SyncMode::Ok),
        Hooks::default(),
        &[alice.fp.clone()],
    );
    std::fs::create_dir_all(store.path().join("team")).unwrap();
    store
        .save_recipients_at("team", &[alice.fp.clone(), bob.fp.clone()], "team scope", &opts())
        .unwrap();

    assert_eq!(store.recipients("team/db").unwrap().len(), 2);
    assert_eq!(store.recipients("solo").unwrap(), vec![alice.fp.clone()]);

    store.set("team/db", &Secret::new("pw", ""), &opts()).unwrap();
    store.set("solo", &Secret::new("pw", ""), &opts()).unwrap();
    assert_eq!(ids_of(&store, &alice, "team/db").len(), 2);
    assert_eq!(ids_of(&store, &alice, "solo"), vec![alice.fp.clone()]);
}

#[test]
fn test_id_file_is_sorted_and_deduplicated() {
    let tmp = TempDir::new().unwrap();
    let alice = Person::new("alice");
    let store = store_at(
        "",
        &tmp.path().join("store"),
        alice.crypto(),
        RecordingSync::new(SyncMode::Ok),
        Hooks::default(),
        &[alice.fp.clone()],
    );
    let ids = vec![
        "zzz".to_string(),
        alice.fp.clone(),
        " zzz ".to_string(),
        String::new(),
    ];
    store.save_recipients(&ids, "messy", &opts()).unwrap();

    let content = std::fs::read_to_string(store.path().join(".cellar-id")).unwrap();
    let mut want = vec![alice.fp.clone(), "zzz".to_string()];
    want.sort();
    assert_eq!(content, format!("{}\n", want.join("\n")));
}

#[test]
fn test_import_bundled_keys() {
    let tmp = TempDir::new().unwrap();
    let alice = Person::new("alice");
    let bob = Person::new("bob");
    alice.knows(&bob);
    let path = tmp.path().join("store");
    store_at(
        "",
        &path,
        alice.crypto(),
        RecordingSync::new(SyncMode::Ok),
        Hooks::default(),
        &[alice.fp.clone(), bob.fp.clone()],
    );

    let declined = ScriptedConfirm::always(false);
    let as_bob = Store::new(
        "",
        &path,
        bob.crypto(),
        RecordingSync::new(SyncMode::Ok),
        hooks_with(declined.clone()),
    );
    assert_eq!(as_bob.import_missing_public_keys(&opts()).unwrap(), 0);
    assert_eq!(declined.asked(), 1);
    assert!(bob.xc.public_key(&alice.fp).is_none());

    let accepted = ScriptedConfirm::always(true);
    let as_bob = Store::new(
        "",
        &path,
        bob.crypto(),
        RecordingSync::new(SyncMode::Ok),
        hooks_with(accepted.clone()),
    );
    assert_eq!(as_bob.import_missing_public_keys(&opts()).unwrap(), 1);
    assert!(bob.xc.public_key(&alice.fp).is_some());

    // nothing left to import
    assert_eq!(as_bob.import_missing_public_keys(&opts()).unwrap(), 0);
    assert_eq!(accepted.asked(), 1);
}

#[test]
fn test_reencryption_keeps_plaintext_bytes() {
    let tmp = TempDir::new().unwrap();
    let alice = Person::new("alice");
    let bob = Person::new("bob");
    alice.knows(&bob);
    let store = store_at(
        "",
        &tmp.path().join("store"),
        alice.crypto(),
        RecordingSync::new(SyncMode::Ok),
        Hooks::default(),
        &[alice.fp.clone()],
    );
    store.set("raw", &Secret::new("pw", ""), &opts()).unwrap();

    // not UTF-8, CRLF password line, YAML marker on the second line
    let plaintext = b"pw\xff\xfe\r\n---\nuser: admin\n".to_vec();
    let file = store.passfile("raw").unwrap();
    let ct = alice
        .xc
        .encrypt(&plaintext, &[alice.fp.clone()], &opts())
        .unwrap();
    std::fs::write(&file, ct).unwrap();

    store.add_recipient(&bob.fp, &opts()).unwrap();
    let ct = std::fs::read(&file).unwrap();
    assert!(alice.xc.recipient_ids(&ct).unwrap().contains(&bob.fp));
    assert_eq!(alice.xc.decrypt(&ct, &opts()).unwrap().as_slice(), plaintext.as_slice());

    store.remove_recipient(&bob.fp, &opts()).unwrap();
    let ct = std::fs::read(&file).unwrap();
    assert_eq!(alice.xc.decrypt(&ct, &opts()).unwrap().as_slice(), plaintext.as_slice());

    store.copy("raw", "copy", &opts()).unwrap();
    let ct = std::fs::read(store.passfile("copy").unwrap()).unwrap();
    assert_eq!(alice.xc.decrypt(&ct, &opts()).unwrap().as_slice(), plaintext.as_slice());
}
