//! Persistent store adapters.
//!
//! A `RecordStore` is a single keyed collection of [`StoredRecord`]s. The
//! library service is the only caller; it never assumes anything about the
//! backend beyond this trait.
//!
//! - [`SqliteStore`]: durable, versioned local database (the default)
//! - [`MemoryStore`]: in-process map with quota and fault injection, for tests

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, StoreOptions, SCHEMA_VERSION};

use async_trait::async_trait;

use super::error::StoreError;
use super::record::{ItemMetadata, RecordId, StoredRecord};

/// Keyed record collection
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Insert or overwrite a record by id
    async fn put(&self, record: &StoredRecord) -> Result<ItemMetadata, StoreError>;

    /// Fetch a single record
    async fn get(&self, id: &RecordId) -> Result<StoredRecord, StoreError>;

    /// Walk the whole collection, handing each record to `visit` in turn
    async fn scan(
        &self,
        visit: &mut (dyn FnMut(StoredRecord) + Send),
    ) -> Result<(), StoreError>;

    /// Remove a record; `NotFound` if nothing was removed
    async fn delete(&self, id: &RecordId) -> Result<(), StoreError>;
}
