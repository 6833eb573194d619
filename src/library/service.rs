//! Library service: the only API the rest of the crate uses to reach the
//! archive of templates and resources.

use std::path::Path;
use std::sync::Arc;

use super::bus::{Subscription, UpdateBus};
use super::codec::{self, BinaryFile};
use super::error::LibraryError;
use super::record::{ItemKind, ItemMetadata, LibraryRecord, Payload, RecordId, StoredRecord};
use super::store::{RecordStore, SqliteStore, StoreOptions};

/// Label used when a resource is archived without one
pub const DEFAULT_RESOURCE_NAME: &str = "Untitled Resources";

/// Full content of a library item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryContent {
    Template(BinaryFile),
    Resource(String),
}

/// Kind-aware access to the shared record collection
#[derive(Clone)]
pub struct Library {
    store: Arc<dyn RecordStore>,
    bus: UpdateBus,
}

impl Library {
    /// Wrap an already-open store with a fresh bus.
    ///
    /// Clones of the returned handle share that bus. Handles built separately
    /// only notify each other when given the same bus via [`Library::with_bus`].
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_bus(store, UpdateBus::new())
    }

    /// Wrap an already-open store, publishing on an existing bus
    pub fn with_bus(store: Arc<dyn RecordStore>, bus: UpdateBus) -> Self {
        Self { store, bus }
    }

    /// Open the SQLite-backed library at `path`
    pub fn open(path: &Path, options: &StoreOptions) -> Result<Self, LibraryError> {
        let store = SqliteStore::open(path, options)?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Open the library at the configured location
    pub fn open_default() -> anyhow::Result<Self> {
        let cfg = crate::config::config()?;
        let options = StoreOptions {
            max_bytes: cfg.storage.max_bytes,
        };
        Ok(Self::open(&cfg.database, &options)?)
    }

    /// The bus this library publishes on
    pub fn bus(&self) -> &UpdateBus {
        &self.bus
    }

    /// Shorthand for `bus().subscribe(..)`
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.bus.subscribe(listener)
    }

    /// Archive a template file
    pub async fn save_template(&self, file: &BinaryFile) -> Result<ItemMetadata, LibraryError> {
        let record = LibraryRecord::template(&file.name, codec::encode(file));
        self.persist(&record).await
    }

    /// Archive resource text under a label
    pub async fn save_resource(&self, name: &str, text: &str) -> Result<ItemMetadata, LibraryError> {
        if text.trim().is_empty() {
            return Err(LibraryError::EmptyResource);
        }

        let name = match name.trim() {
            "" => DEFAULT_RESOURCE_NAME,
            trimmed => trimmed,
        };

        let record = LibraryRecord::resource(name, text);
        self.persist(&record).await
    }

    async fn persist(&self, record: &LibraryRecord) -> Result<ItemMetadata, LibraryError> {
        let meta = match self.store.put(&StoredRecord::from(record)).await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::error!(id = %record.id, kind = %record.kind, error = %e, "Failed to archive item");
                return Err(e.into());
            }
        };

        tracing::info!(id = %meta.id, kind = %meta.kind, name = %meta.name, "Archived library item");
        self.bus.publish();
        Ok(meta)
    }

    /// Metadata for every item of `kind`, newest first
    pub async fn list_metadata(&self, kind: ItemKind) -> Result<Vec<ItemMetadata>, LibraryError> {
        let mut items = Vec::new();
        self.store
            .scan(&mut |record: StoredRecord| {
                if record.effective_kind() == kind {
                    items.push(record.metadata());
                }
            })
            .await?;

        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    /// Load an item's content: a decoded file for templates, text for resources
    pub async fn fetch_content(&self, id: &RecordId) -> Result<LibraryContent, LibraryError> {
        let stored = self.store.get(id).await?;
        let record = LibraryRecord::try_from(stored)?;

        match record.payload {
            Payload::PlainText(text) => Ok(LibraryContent::Resource(text)),
            Payload::EncodedBinary(encoded) => codec::try_decode(&encoded, &record.name)
                .map(LibraryContent::Template)
                .map_err(|e| {
                    tracing::warn!(id = %record.id, error = %e, "Template payload is undecodable");
                    LibraryError::CorruptRecord {
                        id: record.id.to_string(),
                        reason: e.to_string(),
                    }
                }),
        }
    }

    /// Permanently delete an item
    pub async fn remove(&self, id: &RecordId) -> Result<(), LibraryError> {
        self.store.delete(id).await?;

        tracing::info!(id = %id, "Deleted library item");
        self.bus.publish();
        Ok(())
    }

    /// The most recently archived template, if any
    pub async fn latest_template(&self) -> Result<Option<BinaryFile>, LibraryError> {
        let Some(newest) = self.list_metadata(ItemKind::Template).await?.into_iter().next() else {
            return Ok(None);
        };

        match self.fetch_content(&newest.id).await? {
            LibraryContent::Template(file) => Ok(Some(file)),
            LibraryContent::Resource(_) => Ok(None),
        }
    }

    /// Text of the most recently archived resource, unless it is blank
    pub async fn latest_resource(&self) -> Result<Option<String>, LibraryError> {
        let Some(newest) = self.list_metadata(ItemKind::Resource).await?.into_iter().next() else {
            return Ok(None);
        };

        match self.fetch_content(&newest.id).await? {
            LibraryContent::Resource(text) if !text.trim().is_empty() => Ok(Some(text)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::store::MemoryStore;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory_library() -> (Library, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Library::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_resource_round_trip() {
        let (library, _) = memory_library();
        let text = "Chapter 3: Cell membranes\n  - diffusion\n  - osmosis ";

        let meta = library.save_resource("Bio notes", text).await.unwrap();
        assert_eq!(meta.kind, ItemKind::Resource);

        let content = library.fetch_content(&meta.id).await.unwrap();
        assert_eq!(content, LibraryContent::Resource(text.to_string()));
    }

    #[tokio::test]
    async fn test_blank_resource_rejected_before_persisting() {
        let (library, store) = memory_library();

        let result = library.save_resource("Empty", " \n\t ").await;
        assert!(matches!(result, Err(LibraryError::EmptyResource)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_blank_resource_name_defaults() {
        let (library, _) = memory_library();

        let meta = library.save_resource("   ", "content").await.unwrap();
        assert_eq!(meta.name, DEFAULT_RESOURCE_NAME);
    }

    #[tokio::test]
    async fn test_failed_save_publishes_nothing() {
        let (library, store) = memory_library();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let _sub = library.subscribe(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        store.fail_writes(true);
        let result = library.save_resource("x", "y").await;

        assert!(matches!(result, Err(LibraryError::WriteFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resource_without_text_is_corrupt() {
        let (library, store) = memory_library();
        store
            .insert_raw(StoredRecord {
                id: RecordId::from("broken"),
                name: "broken".to_string(),
                kind: Some(ItemKind::Resource),
                data_url: None,
                content: None,
                created_at: Utc::now(),
            })
            .await;

        assert!(matches!(
            library.fetch_content(&RecordId::from("broken")).await,
            Err(LibraryError::CorruptRecord { .. })
        ));
    }

    #[tokio::test]
    async fn test_latest_resource_skips_blank() {
        let (library, store) = memory_library();
        store
            .insert_raw(StoredRecord {
                id: RecordId::from("blank"),
                name: "blank".to_string(),
                kind: Some(ItemKind::Resource),
                data_url: None,
                content: Some("   ".to_string()),
                created_at: Utc::now() + Duration::seconds(10),
            })
            .await;

        assert_eq!(library.latest_resource().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_handles_sharing_a_bus_see_each_other() {
        let store = Arc::new(MemoryStore::new());
        let bus = UpdateBus::new();
        let writer = Library::with_bus(store.clone(), bus.clone());
        let reader = Library::with_bus(store, bus);

        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let _sub = reader.subscribe(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let meta = writer.save_resource("Shared", "notes").await.unwrap();
        writer.remove(&meta.id).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // A separately built handle has its own bus
        let other = Library::new(Arc::new(MemoryStore::new()));
        other.save_resource("Elsewhere", "notes").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_latest_on_empty_library() {
        let (library, _) = memory_library();

        assert_eq!(library.latest_template().await.unwrap(), None);
        assert_eq!(library.latest_resource().await.unwrap(), None);
    }
}
