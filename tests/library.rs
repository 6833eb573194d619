//! Library Integration Tests
//!
//! Exercises the library service over a real SQLite database: archiving,
//! listing, retrieval, deletion, change notification and legacy data.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use plansmith::library::{
    BinaryFile, ItemKind, Library, LibraryContent, LibraryError, RecordId, RecordStore,
    SqliteStore, StoreOptions, StoredRecord,
};
use rusqlite::{params, Connection};
use tempfile::TempDir;

fn open_library(dir: &TempDir) -> (Library, Arc<SqliteStore>) {
    let store = Arc::new(
        SqliteStore::open(&dir.path().join("library.db"), &StoreOptions::default()).unwrap(),
    );
    (Library::new(store.clone()), store)
}

fn count_updates(library: &Library) -> (Arc<AtomicUsize>, plansmith::library::Subscription) {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let sub = library.subscribe(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    (calls, sub)
}

fn stored(id: &str, kind: ItemKind, created_at: chrono::DateTime<Utc>) -> StoredRecord {
    let (data_url, content) = match kind {
        ItemKind::Template => (Some("data:text/plain;base64,eA==".to_string()), None),
        ItemKind::Resource => (None, Some(format!("{} text", id))),
    };

    StoredRecord {
        id: RecordId::from(id),
        name: id.to_string(),
        kind: Some(kind),
        data_url,
        content,
        created_at,
    }
}

#[tokio::test]
async fn test_template_round_trip_through_database() {
    let temp = TempDir::new().unwrap();
    let (library, _) = open_library(&temp);

    let bytes: Vec<u8> = (0..=255).cycle().take(4096).collect();
    let file = BinaryFile::new("District Plan.pdf", "application/pdf", bytes.clone());

    let meta = library.save_template(&file).await.unwrap();
    assert_eq!(meta.kind, ItemKind::Template);
    assert_eq!(meta.name, "District Plan.pdf");

    match library.fetch_content(&meta.id).await.unwrap() {
        LibraryContent::Template(restored) => {
            assert_eq!(restored.bytes, bytes);
            assert_eq!(restored.media_type, "application/pdf");
            assert_eq!(restored.name, "District Plan.pdf");
        }
        other => panic!("Expected template, got {:?}", other),
    }
}

#[tokio::test]
async fn test_items_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let id = {
        let (library, _) = open_library(&temp);
        library
            .save_resource("Unit 4", "Read chapter 4 and watch the video")
            .await
            .unwrap()
            .id
    };

    let (library, _) = open_library(&temp);
    assert_eq!(
        library.fetch_content(&id).await.unwrap(),
        LibraryContent::Resource("Read chapter 4 and watch the video".to_string())
    );
}

#[tokio::test]
async fn test_rapid_saves_get_unique_ids() {
    let temp = TempDir::new().unwrap();
    let (library, _) = open_library(&temp);

    let mut ids = std::collections::HashSet::new();
    for i in 0..50 {
        let meta = library
            .save_resource(&format!("r{}", i), "text")
            .await
            .unwrap();
        assert!(ids.insert(meta.id));
    }

    assert_eq!(library.list_metadata(ItemKind::Resource).await.unwrap().len(), 50);
}

#[tokio::test]
async fn test_listing_filters_by_kind_newest_first() {
    let temp = TempDir::new().unwrap();
    let (library, store) = open_library(&temp);
    let base = Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap();

    store.put(&stored("t-old", ItemKind::Template, base)).await.unwrap();
    store
        .put(&stored("r-mid", ItemKind::Resource, base + Duration::hours(1)))
        .await
        .unwrap();
    store
        .put(&stored("t-new", ItemKind::Template, base + Duration::hours(2)))
        .await
        .unwrap();

    let templates = library.list_metadata(ItemKind::Template).await.unwrap();
    let ids: Vec<_> = templates.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["t-new", "t-old"]);

    let resources = library.list_metadata(ItemKind::Resource).await.unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].id.as_str(), "r-mid");
}

#[tokio::test]
async fn test_latest_helpers_pick_newest() {
    let temp = TempDir::new().unwrap();
    let (library, store) = open_library(&temp);
    let base = Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap();

    store.put(&stored("r-old", ItemKind::Resource, base)).await.unwrap();
    store
        .put(&stored("r-new", ItemKind::Resource, base + Duration::minutes(5)))
        .await
        .unwrap();
    store.put(&stored("t-only", ItemKind::Template, base)).await.unwrap();

    assert_eq!(
        library.latest_resource().await.unwrap().as_deref(),
        Some("r-new text")
    );

    let template = library.latest_template().await.unwrap().unwrap();
    assert_eq!(template.name, "t-only");
    assert_eq!(template.bytes, b"x");
}

#[tokio::test]
async fn test_delete_is_permanent() {
    let temp = TempDir::new().unwrap();
    let (library, _) = open_library(&temp);
    let (calls, _sub) = count_updates(&library);

    let meta = library.save_resource("gone", "soon").await.unwrap();
    library.remove(&meta.id).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert!(matches!(
        library.fetch_content(&meta.id).await,
        Err(LibraryError::NotFound(_))
    ));
    assert!(matches!(
        library.remove(&meta.id).await,
        Err(LibraryError::NotFound(_))
    ));
    assert!(library.list_metadata(ItemKind::Resource).await.unwrap().is_empty());

    // Failed delete does not notify
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_each_save_notifies_once() {
    let temp = TempDir::new().unwrap();
    let (library, _) = open_library(&temp);
    let (first, _a) = count_updates(&library);
    let (second, b) = count_updates(&library);

    library
        .save_template(&BinaryFile::new("a.txt", "text/plain", b"A".to_vec()))
        .await
        .unwrap();
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 1);

    b.unsubscribe();
    library.save_resource("n", "notes").await.unwrap();
    assert_eq!(first.load(Ordering::SeqCst), 2);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_quota_exceeded_leaves_library_unchanged() {
    let temp = TempDir::new().unwrap();
    let store = SqliteStore::open(
        &temp.path().join("small.db"),
        &StoreOptions {
            max_bytes: Some(16 * 1024),
        },
    )
    .unwrap();
    let library = Library::new(Arc::new(store));
    let (calls, _sub) = count_updates(&library);

    let big = BinaryFile::new("scan.png", "image/png", vec![7u8; 256 * 1024]);
    let result = library.save_template(&big).await;

    assert!(matches!(result, Err(LibraryError::QuotaExceeded)));
    assert_eq!(
        result.unwrap_err().user_message(),
        LibraryError::QuotaExceeded.user_message()
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(library.list_metadata(ItemKind::Template).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_template_payload() {
    let temp = TempDir::new().unwrap();
    let (library, store) = open_library(&temp);

    let mut record = stored("bad", ItemKind::Template, Utc::now());
    record.data_url = Some("not a data url".to_string());
    store.put(&record).await.unwrap();

    match library.fetch_content(&RecordId::from("bad")).await {
        Err(LibraryError::CorruptRecord { id, .. }) => assert_eq!(id, "bad"),
        other => panic!("Expected CorruptRecord, got {:?}", other),
    }

    // Still listed so it can be deleted
    assert_eq!(library.list_metadata(ItemKind::Template).await.unwrap().len(), 1);
    library.remove(&RecordId::from("bad")).await.unwrap();
}

#[tokio::test]
async fn test_unreadable_row_does_not_hide_the_rest() {
    let temp = TempDir::new().unwrap();
    let (library, _) = open_library(&temp);
    library.save_resource("Good", "chapter 1").await.unwrap();
    library
        .save_template(&BinaryFile::new("plan.txt", "text/plain", b"Goals".to_vec()))
        .await
        .unwrap();

    {
        let conn = Connection::open(temp.path().join("library.db")).unwrap();
        conn.execute(
            "INSERT INTO templates (id, name, kind, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params!["x1", "clip", "video", "x", "2024-01-01T00:00:00+00:00"],
        )
        .unwrap();
    }

    let resources = library.list_metadata(ItemKind::Resource).await.unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].name, "Good");
    assert_eq!(library.list_metadata(ItemKind::Template).await.unwrap().len(), 1);
    assert_eq!(library.latest_resource().await.unwrap().as_deref(), Some("chapter 1"));
    assert!(library.latest_template().await.unwrap().is_some());

    // The row itself still reports the problem and can be removed by id
    assert!(matches!(
        library.fetch_content(&RecordId::from("x1")).await,
        Err(LibraryError::ReadFailed(_))
    ));
    library.remove(&RecordId::from("x1")).await.unwrap();
}

fn write_legacy_database(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE templates (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            data_url TEXT,
            created_at TEXT NOT NULL
        );
        PRAGMA user_version = 1;",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO templates (id, name, data_url, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            "1700000000000abc",
            "Old Plan.txt",
            "data:text/plain;base64,T2JqZWN0aXZlcw==",
            "2023-11-14T22:13:20+00:00"
        ],
    )
    .unwrap();
}

#[tokio::test]
async fn test_legacy_records_read_as_templates() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("library.db");
    write_legacy_database(&path);

    let library = Library::open(&path, &StoreOptions::default()).unwrap();

    let templates = library.list_metadata(ItemKind::Template).await.unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].name, "Old Plan.txt");
    assert!(library.list_metadata(ItemKind::Resource).await.unwrap().is_empty());

    match library.fetch_content(&templates[0].id).await.unwrap() {
        LibraryContent::Template(file) => assert_eq!(file.bytes, b"Objectives"),
        other => panic!("Expected template, got {:?}", other),
    }

    // New kinds coexist with migrated rows
    library.save_resource("New", "notes").await.unwrap();
    assert_eq!(library.list_metadata(ItemKind::Resource).await.unwrap().len(), 1);
    assert_eq!(library.list_metadata(ItemKind::Template).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unusable_location_reports_unsupported_environment() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("file");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let result = Library::open(&blocker.join("library.db"), &StoreOptions::default());
    assert!(matches!(
        result,
        Err(LibraryError::UnsupportedEnvironment(_))
    ));
}
