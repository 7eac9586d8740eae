//! Two holders sharing one session file, as two processes would.

use std::sync::{Arc, Mutex};

use keyhold_core::auth::{AccessLevel, AuthChange, AuthEvent, FileStore, KeyValueStore};
use keyhold_core::{Session, SessionHolder, StoreWatcher};
use tempfile::TempDir;

fn sample(token: &str) -> Session {
    Session {
        user_id: "42".to_string(),
        name: "A".to_string(),
        email: "a@b.com".to_string(),
        access_level: AccessLevel::Admin,
        token: token.to_string(),
    }
}

fn open(dir: &TempDir) -> SessionHolder {
    SessionHolder::open(Box::new(FileStore::in_dir(dir.path())))
}

#[test]
fn test_login_is_visible_after_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let mut first = open(&dir);
    first.login(sample("t1")).expect("login");

    let second = open(&dir);
    assert_eq!(second.session(), Some(&sample("t1")));
}

#[test]
fn test_other_holder_follows_login_and_logout() {
    let dir = TempDir::new().expect("tempdir");
    let mut writer = open(&dir);
    let mut reader = open(&dir);
    let mut watcher = StoreWatcher::new(&FileStore::in_dir(dir.path()));

    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    reader.subscribe(Box::new(move |ev: &AuthEvent| {
        sink.lock().unwrap().push((ev.change, ev.authenticated));
    }));

    writer.login(sample("t1")).expect("login");
    assert!(watcher.poll());
    reader.on_storage_change();
    assert!(reader.is_authenticated());
    assert_eq!(reader.request_context().authorization().as_deref(), Some("Bearer t1"));

    writer.logout().expect("logout");
    assert!(watcher.poll());
    reader.on_storage_change();
    assert!(!reader.is_authenticated());

    assert_eq!(
        *changes.lock().unwrap(),
        vec![(AuthChange::Reloaded, true), (AuthChange::Reloaded, false)]
    );
}

#[test]
fn test_partial_entries_load_as_logged_out() {
    let dir = TempDir::new().expect("tempdir");
    let mut store = FileStore::in_dir(dir.path());
    store.set("token", "t1").expect("set");
    store.set("userName", "A").expect("set");

    let holder = open(&dir);
    assert!(!holder.is_authenticated());
}

#[test]
fn test_corrupt_file_loads_as_logged_out() {
    let dir = TempDir::new().expect("tempdir");
    let mut writer = open(&dir);
    writer.login(sample("t1")).expect("login");

    std::fs::write(dir.path().join("session.json"), "{oops").expect("write");
    let mut reader = open(&dir);
    assert!(!reader.is_authenticated());

    // The writer notices too once told the store changed
    writer.on_storage_change();
    assert!(!writer.is_authenticated());

    // A fresh login repairs the file
    reader.login(sample("t2")).expect("login");
    assert_eq!(open(&dir).session(), Some(&sample("t2")));
}
