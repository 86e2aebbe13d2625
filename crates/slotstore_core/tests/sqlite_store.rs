mod common;

use common::{settings_model, write_model_bundle, Settings};
use rusqlite::Connection;
use slotstore_core::db::is_location_open;
use slotstore_core::{
    AttributeKind, BackendOptions, DataModel, DbError, EntityDescription, JournalMode,
    MappingError, MemorySlotStore, ModelError, SlotStore, SqliteBackend, SqliteSlotStore,
    StoreError,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn settings_rows(path: &Path) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row("SELECT COUNT(*) FROM \"Settings\";", [], |row| row.get(0))
        .unwrap()
}

#[tokio::test]
async fn persisted_item_survives_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.sqlite");
    write_model_bundle(dir.path(), "Preferences");

    let store = SqliteSlotStore::<Settings>::open(&path, "Preferences", dir.path()).unwrap();
    store
        .save(Settings {
            theme: "dark".to_string(),
            font_size: 16,
            beta: Some(false),
        })
        .await
        .unwrap();
    store.close().unwrap();
    assert!(!is_location_open(&path));

    let reopened = SqliteSlotStore::<Settings>::open(&path, "Preferences", dir.path()).unwrap();
    let loaded = reopened.load().await.unwrap();
    assert_eq!(loaded.theme, "dark");
    assert_eq!(loaded.font_size, 16);
    assert_eq!(loaded.beta, Some(false));
}

#[tokio::test]
async fn save_keeps_a_single_row_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.sqlite");
    let backend = SqliteBackend::open(&path, settings_model(), &BackendOptions::default()).unwrap();
    let store = SqliteSlotStore::<Settings>::new(backend).unwrap();

    for theme in ["a", "b", "c"] {
        store.save(Settings::themed(theme)).await.unwrap();
    }
    assert_eq!(settings_rows(&path), 1);

    store.clear().await.unwrap();
    assert_eq!(settings_rows(&path), 0);
}

#[test]
fn second_open_of_same_location_is_refused_until_release() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.sqlite");

    let first = SqliteBackend::open(&path, settings_model(), &BackendOptions::default()).unwrap();
    let second = SqliteBackend::open(&path, settings_model(), &BackendOptions::default());
    assert!(matches!(second, Err(DbError::LocationInUse(_))));

    let store = SqliteSlotStore::<Settings>::new(first).unwrap();
    assert!(is_location_open(&path));
    drop(store);

    assert!(!is_location_open(&path));
    let reopened = SqliteBackend::open(&path, settings_model(), &BackendOptions::default());
    assert!(reopened.is_ok());
}

#[test]
fn aliased_paths_share_one_registration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.sqlite");
    let alias = dir.path().join(".").join("prefs.sqlite");

    let _first = SqliteBackend::open(&path, settings_model(), &BackendOptions::default()).unwrap();
    let second = SqliteBackend::open(&alias, settings_model(), &BackendOptions::default());

    assert!(matches!(second, Err(DbError::LocationInUse(_))));
}

#[test]
fn failed_bootstrap_releases_location() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE \"Settings\" (slot_row INTEGER PRIMARY KEY AUTOINCREMENT, theme TEXT);",
    )
    .unwrap();
    drop(conn);

    let err = SqliteBackend::open(&path, settings_model(), &BackendOptions::default())
        .err()
        .unwrap();
    match err {
        DbError::SchemaMismatch { table, column } => {
            assert_eq!(table, "Settings");
            assert_eq!(column, "font_size");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!is_location_open(&path));
}

#[test]
fn table_without_row_key_is_a_schema_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE \"Settings\" (theme TEXT, font_size INTEGER, beta INTEGER);",
    )
    .unwrap();
    drop(conn);

    let err = SqliteBackend::open(&path, settings_model(), &BackendOptions::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        DbError::SchemaMismatch { ref table, ref column }
            if table == "Settings" && column == "slot_row"
    ));
    assert!(!is_location_open(&path));
}

#[test]
fn reserved_row_key_attribute_is_rejected_by_every_backend() {
    let model = DataModel::new("Reserved").with_entity(
        EntityDescription::new("Settings")
            .attribute("theme", AttributeKind::Text)
            .attribute("slot_row", AttributeKind::Integer),
    );

    let sqlite = SqliteBackend::open_in_memory(model.clone(), &BackendOptions::default());
    assert!(matches!(
        sqlite.err(),
        Some(DbError::InvalidModel(ModelError::ReservedAttribute { .. }))
    ));

    let memory = MemorySlotStore::<Settings>::in_memory(model).err().unwrap();
    assert!(matches!(
        memory,
        StoreError::FailedToLoadBackend(DbError::InvalidModel(
            ModelError::ReservedAttribute { .. }
        ))
    ));
}

#[tokio::test]
async fn stored_value_of_wrong_kind_fails_load_as_mapping_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.sqlite");
    let backend = SqliteBackend::open(&path, settings_model(), &BackendOptions::default()).unwrap();
    let store = SqliteSlotStore::<Settings>::new(backend).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "INSERT INTO \"Settings\" (theme, font_size, beta) VALUES ('dark', 'huge', NULL);",
    )
    .unwrap();

    let err = store.load().await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Mapping(MappingError::TypeMismatch {
            ref attribute,
            expected: AttributeKind::Integer,
            found: "text",
        }) if attribute == "font_size"
    ));
    assert_eq!(err.code(), "mapping_failed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_keep_a_single_row_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.sqlite");
    let backend = SqliteBackend::open(&path, settings_model(), &BackendOptions::default()).unwrap();
    let store = Arc::new(SqliteSlotStore::<Settings>::new(backend).unwrap());

    let mut handles = Vec::new();
    for index in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .save(Settings::themed(&format!("theme-{index}")))
                .await
                .unwrap();
            store.load().await.unwrap().theme
        }));
    }

    let mut observed = HashSet::new();
    for handle in handles {
        observed.insert(handle.await.unwrap());
    }

    assert_eq!(settings_rows(&path), 1);
    assert!(observed.contains(&store.load().await.unwrap().theme));
    assert_eq!(store.commit_count().await.unwrap(), 16);
}

#[test]
fn open_reports_missing_model_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.sqlite");

    let err = SqliteSlotStore::<Settings>::open(&path, "Missing", dir.path())
        .err()
        .unwrap();

    assert!(matches!(
        err,
        StoreError::ModelNotFound(ModelError::NotFound(_))
    ));
    assert!(!path.exists());
}

#[test]
fn open_reports_malformed_model_bundle() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Broken.slotmodel.json"), "{ not json").unwrap();

    let err = SqliteSlotStore::<Settings>::open(dir.path().join("x.sqlite"), "Broken", dir.path())
        .err()
        .unwrap();

    assert!(matches!(
        err,
        StoreError::ModelNotFound(ModelError::Malformed { .. })
    ));
}

#[test]
fn open_reports_unusable_store_location() {
    let dir = tempfile::tempdir().unwrap();
    write_model_bundle(dir.path(), "Preferences");
    let path = dir.path().join("missing").join("nested").join("prefs.sqlite");

    let err = SqliteSlotStore::<Settings>::open(&path, "Preferences", dir.path())
        .err()
        .unwrap();

    assert!(matches!(err, StoreError::FailedToLoadBackend(_)));
    assert_eq!(err.code(), "backend_load_failed");
}

#[tokio::test]
async fn wal_journal_mode_is_applied_to_store_file() {
    let dir = tempfile::tempdir().unwrap();
    write_model_bundle(dir.path(), "Preferences");
    let path = dir.path().join("prefs.sqlite");
    let options = BackendOptions::default()
        .with_busy_timeout(Duration::from_millis(250))
        .with_journal_mode(JournalMode::Wal);

    let store =
        SqliteSlotStore::<Settings>::open_with_options(&path, "Preferences", dir.path(), &options)
            .unwrap();
    store.save(Settings::themed("dark")).await.unwrap();

    let conn = Connection::open(&path).unwrap();
    let mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_ascii_lowercase(), "wal");
    assert_eq!(settings_rows(&path), 1);
}

#[tokio::test]
async fn external_reader_never_sees_an_empty_slot_during_replace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.sqlite");
    let backend = SqliteBackend::open(&path, settings_model(), &BackendOptions::default()).unwrap();
    let store = SqliteSlotStore::<Settings>::new(backend).unwrap();
    store.save(Settings::themed("v0")).await.unwrap();

    let reader_path = path.clone();
    let reader = std::thread::spawn(move || {
        let conn = Connection::open(&reader_path).unwrap();
        conn.busy_timeout(Duration::from_secs(5)).unwrap();
        for _ in 0..200 {
            let rows: i64 = conn
                .query_row("SELECT COUNT(*) FROM \"Settings\";", [], |row| row.get(0))
                .unwrap();
            assert_eq!(rows, 1);
        }
    });

    for round in 1..=50 {
        store
            .save(Settings::themed(&format!("v{round}")))
            .await
            .unwrap();
    }
    reader.join().unwrap();

    assert_eq!(store.load().await.unwrap().theme, "v50");
}
