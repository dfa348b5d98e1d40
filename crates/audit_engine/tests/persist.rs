use std::fs;
use std::sync::Arc;

use audit_core::RecentTest;
use audit_engine::{
    ensure_state_dir, AtomicFileWriter, FileStore, KeyValueStore, MemoryStore, PersistError,
    SessionRecords, SessionStore,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

fn entry(id: &str) -> RecentTest {
    RecentTest {
        test_id: id.to_string(),
        url: None,
        title: None,
        run_at: None,
    }
}

#[test]
fn creates_missing_state_dir() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("state");
    ensure_state_dir(&dir).unwrap();
    assert!(dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("state.ron", "a").unwrap();
    let second = writer.write("state.ron", "b").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "b");
}

#[test]
fn state_dir_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write("state.ron", "data").is_err());
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path(), "session.ron");
    assert_eq!(store.get("missing").await.unwrap(), None);

    store.set("pref", json!(true)).await.unwrap();
    store.set("list", json!([{ "testId": "a" }])).await.unwrap();

    let reopened = FileStore::new(temp.path(), "session.ron");
    assert_eq!(reopened.get("pref").await.unwrap(), Some(json!(true)));
    assert_eq!(
        reopened.get("list").await.unwrap(),
        Some(json!([{ "testId": "a" }]))
    );
    assert!(fs::read_to_string(reopened.path()).unwrap().contains("pref"));
}

#[tokio::test]
async fn file_store_recovers_from_a_corrupt_file() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path(), "session.ron");
    fs::write(store.path(), "{ this is not ron").unwrap();

    assert!(store.get("k").await.is_err());
    store.set("k", json!(1)).await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), Some(json!(1)));
}

#[cfg(unix)]
#[tokio::test]
async fn file_store_keeps_entries_when_the_file_cannot_be_read() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    let backing = FileStore::new(data.clone(), "session.ron");
    backing.set("pref", json!(true)).await.unwrap();

    std::os::unix::fs::symlink(backing.path(), temp.path().join("session.ron")).unwrap();
    let store = FileStore::new(temp.path(), "session.ron");
    assert_eq!(store.get("pref").await.unwrap(), Some(json!(true)));

    // A plain file where the link expects a directory: reads fail with ENOTDIR.
    let parked = temp.path().join("data.parked");
    fs::rename(&data, &parked).unwrap();
    fs::write(&data, "not a directory").unwrap();

    let err = store.set("other", json!(1)).await.unwrap_err();
    assert!(matches!(err, PersistError::Io(_)), "unexpected {err:?}");
    assert!(fs::symlink_metadata(store.path()).unwrap().file_type().is_symlink());

    fs::remove_file(&data).unwrap();
    fs::rename(&parked, &data).unwrap();
    assert_eq!(store.get("pref").await.unwrap(), Some(json!(true)));
    assert_eq!(store.get("other").await.unwrap(), None);
}

#[tokio::test]
async fn records_fall_back_to_local_when_remote_is_down() {
    let remote_store = Arc::new(MemoryStore::new());
    let local = Arc::new(MemoryStore::new());
    let records = SessionRecords::new(
        "s1",
        Arc::new(SessionStore::new(remote_store.clone())),
        local.clone(),
    );

    records.record_recent(entry("a")).await;
    assert_eq!(records.recent_tests().await, vec![entry("a")]);

    remote_store.set_offline(true);
    records.record_recent(entry("b")).await;
    records.set_ai_preference("b", true).await;

    assert_eq!(records.recent_tests().await, vec![entry("b"), entry("a")]);
    assert!(records.ai_preference("b").await);
    assert!(!records.ai_preference("c").await);

    remote_store.set_offline(false);
    assert_eq!(records.recent_tests().await, vec![entry("a")]);
}

#[tokio::test]
async fn insights_are_kept_locally_per_test() {
    let records = SessionRecords::new(
        "s1",
        Arc::new(SessionStore::new(Arc::new(MemoryStore::new()))),
        Arc::new(MemoryStore::new()),
    );
    assert_eq!(records.cached_insights("a").await, None);

    records.store_insights("a", &["Use a CDN".to_string()]).await;
    assert_eq!(
        records.cached_insights("a").await,
        Some(vec!["Use a CDN".to_string()])
    );
    assert_eq!(records.cached_insights("b").await, None);
}
