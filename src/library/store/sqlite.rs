//! SQLite-backed record store.
//!
//! One table holds every library record. The schema version lives in
//! `PRAGMA user_version`; upgrades only ever add columns so rows written by
//! older versions stay readable.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tokio::sync::mpsc;

use super::RecordStore;
use crate::library::error::StoreError;
use crate::library::record::{ItemKind, ItemMetadata, RecordId, StoredRecord};

/// Current schema version. The table is still called `templates` from
/// before resources shared it.
///
/// - 1: id, name, data_url, created_at
/// - 2: + kind
/// - 3: + content
pub const SCHEMA_VERSION: i32 = 3;

const SELECT_COLUMNS: &str = "SELECT id, name, kind, data_url, content, created_at FROM templates";

/// Rows in flight between the cursor thread and the visitor
const SCAN_CHANNEL_CAPACITY: usize = 16;

/// Options applied each time the store is opened
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Upper bound on database size; writes past it fail with `QuotaExceeded`
    pub max_bytes: Option<u64>,
}

/// Versioned SQLite database with a single record collection.
///
/// Queries run on the blocking pool; the connection is shared behind a mutex.
pub struct SqliteStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating on first use) the database at `path`
    pub fn open(path: &Path, options: &StoreOptions) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::UnsupportedEnvironment(format!(
                        "cannot create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            StoreError::UnsupportedEnvironment(format!("cannot open {}: {}", path.display(), e))
        })?;

        migrate(&conn)?;

        if let Some(max_bytes) = options.max_bytes {
            apply_quota(&conn, max_bytes)?;
        }

        tracing::debug!(path = %path.display(), version = SCHEMA_VERSION, "Opened library database");

        Ok(Self {
            path: path.to_path_buf(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Path to the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against the connection on the blocking pool
    async fn with_conn<T, F>(
        &self,
        op: F,
        on_join: fn(String) -> StoreError,
    ) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<T, StoreError> {
            let guard = lock(&conn)?;
            op(&guard)
        })
        .await
        .map_err(|e| on_join(format!("database task failed: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StoreError> {
    conn.lock()
        .map_err(|_| StoreError::ReadFailed("database connection lock poisoned".to_string()))
}

/// Bring the schema up to `SCHEMA_VERSION` without touching existing rows
fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let unsupported = |e: rusqlite::Error| StoreError::UnsupportedEnvironment(e.to_string());

    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(unsupported)?;

    if version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedEnvironment(format!(
            "database schema version {} is newer than supported version {}",
            version, SCHEMA_VERSION
        )));
    }

    if version == SCHEMA_VERSION {
        return Ok(());
    }

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS templates (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            data_url TEXT,
            created_at TEXT NOT NULL
        );",
    )
    .map_err(unsupported)?;

    if !has_column(conn, "kind").map_err(unsupported)? {
        conn.execute_batch("ALTER TABLE templates ADD COLUMN kind TEXT;")
            .map_err(unsupported)?;
    }

    if !has_column(conn, "content").map_err(unsupported)? {
        conn.execute_batch("ALTER TABLE templates ADD COLUMN content TEXT;")
            .map_err(unsupported)?;
    }

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(unsupported)?;

    tracing::info!(from = version, to = SCHEMA_VERSION, "Upgraded library schema");
    Ok(())
}

fn has_column(conn: &Connection, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare("PRAGMA table_info(templates)")?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;

    for name in names {
        if name? == column {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Cap the database size via `max_page_count`
fn apply_quota(conn: &Connection, max_bytes: u64) -> Result<(), StoreError> {
    let unsupported = |e: rusqlite::Error| StoreError::UnsupportedEnvironment(e.to_string());

    let page_size: i64 = conn
        .query_row("PRAGMA page_size", [], |row| row.get(0))
        .map_err(unsupported)?;
    let max_bytes_i64 = i64::try_from(max_bytes).unwrap_or(i64::MAX);
    let pages = (max_bytes_i64 / page_size.max(1)).max(1);

    let applied: i64 = conn
        .pragma_update_and_check(None, "max_page_count", pages, |row| row.get(0))
        .map_err(unsupported)?;

    tracing::debug!(max_bytes, pages = applied, "Applied library storage quota");
    Ok(())
}

fn write_error(err: rusqlite::Error) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DiskFull) => StoreError::QuotaExceeded,
        _ => StoreError::WriteFailed(err.to_string()),
    }
}

fn read_error(err: rusqlite::Error) -> StoreError {
    StoreError::ReadFailed(err.to_string())
}

/// Raw column values, converted outside rusqlite's row callback
struct RawRow {
    id: String,
    name: String,
    kind: Option<String>,
    data_url: Option<String>,
    content: Option<String>,
    created_at: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            data_url: row.get(3)?,
            content: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<StoredRecord, StoreError> {
        let kind = self
            .kind
            .map(|k| {
                k.parse::<ItemKind>()
                    .map_err(|e| StoreError::ReadFailed(format!("record {}: {}", self.id, e)))
            })
            .transpose()?;

        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| {
                StoreError::ReadFailed(format!("record {}: bad created_at: {}", self.id, e))
            })?
            .with_timezone(&Utc);

        Ok(StoredRecord {
            id: RecordId::from(self.id),
            name: self.name,
            kind,
            data_url: self.data_url,
            content: self.content,
            created_at,
        })
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn put(&self, record: &StoredRecord) -> Result<ItemMetadata, StoreError> {
        let record = record.clone();
        self.with_conn(
            move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO templates (id, name, kind, data_url, content, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        record.id.as_str(),
                        record.name,
                        record.kind.map(|k| k.as_str()),
                        record.data_url,
                        record.content,
                        record.created_at.to_rfc3339(),
                    ],
                )
                .map_err(write_error)?;

                Ok(record.metadata())
            },
            StoreError::WriteFailed,
        )
        .await
    }

    async fn get(&self, id: &RecordId) -> Result<StoredRecord, StoreError> {
        let id = id.clone();
        self.with_conn(
            move |conn| {
                let raw = conn
                    .query_row(
                        &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                        params![id.as_str()],
                        RawRow::from_row,
                    )
                    .optional()
                    .map_err(read_error)?
                    .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

                raw.into_record()
            },
            StoreError::ReadFailed,
        )
        .await
    }

    /// Rows that cannot be interpreted (unknown kind, bad timestamp) are
    /// logged and skipped so the rest of the collection stays listable.
    /// `get` still reports them.
    async fn scan(
        &self,
        visit: &mut (dyn FnMut(StoredRecord) + Send),
    ) -> Result<(), StoreError> {
        let (tx, mut rx) = mpsc::channel::<StoredRecord>(SCAN_CHANNEL_CAPACITY);
        let conn = Arc::clone(&self.conn);

        let cursor = tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = lock(&conn)?;
            let mut stmt = conn.prepare(SELECT_COLUMNS).map_err(read_error)?;
            let mut rows = stmt.query([]).map_err(read_error)?;

            while let Some(row) = rows.next().map_err(read_error)? {
                let raw = RawRow::from_row(row).map_err(read_error)?;
                let id = raw.id.clone();

                match raw.into_record() {
                    Ok(record) => {
                        if tx.blocking_send(record).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(id = %id, error = %e, "Skipping unreadable library record");
                    }
                }
            }

            Ok(())
        });

        while let Some(record) = rx.recv().await {
            visit(record);
        }

        cursor
            .await
            .map_err(|e| StoreError::ReadFailed(format!("database task failed: {}", e)))?
    }

    async fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        let id = id.clone();
        self.with_conn(
            move |conn| {
                let removed = conn
                    .execute("DELETE FROM templates WHERE id = ?1", params![id.as_str()])
                    .map_err(write_error)?;

                if removed == 0 {
                    return Err(StoreError::NotFound(id.to_string()));
                }

                Ok(())
            },
            StoreError::WriteFailed,
        )
        .await
    }
}
