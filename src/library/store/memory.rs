//! In-memory record store for testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::RecordStore;
use crate::library::error::StoreError;
use crate::library::record::{ItemMetadata, RecordId, StoredRecord};

/// Map-backed store with an optional byte quota and a write-fault switch.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, StoredRecord>>,
    quota_bytes: Option<usize>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push the stored payload total past `bytes`
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    /// Make every subsequent write fail with `WriteFailed`
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Insert a record directly, bypassing quota and faults
    pub async fn insert_raw(&self, record: StoredRecord) {
        self.records
            .write()
            .await
            .insert(record.id.as_str().to_string(), record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, record: &StoredRecord) -> Result<ItemMetadata, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("simulated write failure".to_string()));
        }

        let mut records = self.records.write().await;

        if let Some(quota) = self.quota_bytes {
            let used: usize = records
                .values()
                .filter(|r| r.id != record.id)
                .map(StoredRecord::payload_len)
                .sum();
            if used + record.payload_len() > quota {
                return Err(StoreError::QuotaExceeded);
            }
        }

        records.insert(record.id.as_str().to_string(), record.clone());
        Ok(record.metadata())
    }

    async fn get(&self, id: &RecordId) -> Result<StoredRecord, StoreError> {
        self.records
            .read()
            .await
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn scan(
        &self,
        visit: &mut (dyn FnMut(StoredRecord) + Send),
    ) -> Result<(), StoreError> {
        let records = self.records.read().await;
        for record in records.values() {
            visit(record.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("simulated write failure".to_string()));
        }

        self.records
            .write()
            .await
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
