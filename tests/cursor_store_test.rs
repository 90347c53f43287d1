//! Integration tests for the SQLite-backed cursor store.

use chrono::{TimeZone, Utc};
use hn_mail_gateway::db::{get_cursor, set_cursor, Database, SqliteCursorStore};
use hn_mail_gateway::sync::CursorStore;
use tempfile::TempDir;

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("cursor.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

#[tokio::test]
async fn test_first_run_has_no_cursor() {
    let (db, _temp_dir) = setup_db().await;
    let store = SqliteCursorStore::new(db, "test-app");

    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_save_replaces_value() {
    let (db, _temp_dir) = setup_db().await;
    let store = SqliteCursorStore::new(db, "test-app");

    let first = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let second = Utc.with_ymd_and_hms(2019, 6, 1, 12, 30, 0).unwrap();

    store.save(first).await.unwrap();
    assert_eq!(store.load().await.unwrap(), Some(first));

    // Replaced, not merged: an older value still wins if it is the latest write.
    store.save(second).await.unwrap();
    assert_eq!(store.load().await.unwrap(), Some(second));
}

#[tokio::test]
async fn test_cursor_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("cursor.sqlite");
    let ts = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();

    {
        let db = Database::new(&db_path).await.unwrap();
        SqliteCursorStore::new(db, "test-app").save(ts).await.unwrap();
    }

    let db = Database::new(&db_path).await.unwrap();
    let store = SqliteCursorStore::new(db, "test-app");
    assert_eq!(store.load().await.unwrap(), Some(ts));
}

#[tokio::test]
async fn test_cursors_are_keyed_by_app_id() {
    let (db, _temp_dir) = setup_db().await;
    let ts = Utc.with_ymd_and_hms(2022, 2, 2, 2, 2, 2).unwrap();

    set_cursor(db.pool(), "one", ts).await.unwrap();

    assert_eq!(get_cursor(db.pool(), "one").await.unwrap(), Some(ts));
    assert_eq!(get_cursor(db.pool(), "two").await.unwrap(), None);
}

#[tokio::test]
async fn test_corrupt_value_is_store_error() {
    let (db, _temp_dir) = setup_db().await;
    sqlx::query("INSERT INTO sync_cursor (app_id, last_run_at) VALUES (?, ?)")
        .bind("test-app")
        .bind("not a date")
        .execute(db.pool())
        .await
        .unwrap();

    let store = SqliteCursorStore::new(db, "test-app");
    assert!(matches!(
        store.load().await,
        Err(hn_mail_gateway::error::SyncError::Store(_))
    ));
}
