//! Library record model.
//!
//! Templates and resources share one collection. `StoredRecord` is the row
//! shape exactly as persisted (legacy rows may lack `kind` and `content`),
//! while `LibraryRecord` is the validated domain form whose payload always
//! matches its kind.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::codec::EncodedBinary;
use super::error::LibraryError;

/// Last timestamp component handed out by `RecordId::generate`.
static LAST_ID_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Opaque record identifier: millisecond timestamp plus a random suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Mint a fresh id.
    ///
    /// The timestamp component never repeats within a process, so ids minted
    /// in the same millisecond still differ even before the suffix is
    /// considered.
    pub fn generate() -> Self {
        let now = Utc::now().timestamp_millis();
        let mut last = LAST_ID_MILLIS.load(Ordering::Relaxed);
        let millis = loop {
            let next = if now > last { now } else { last + 1 };
            match LAST_ID_MILLIS.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break next,
                Err(actual) => last = actual,
            }
        };

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}{}", millis, &suffix[..9]))
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of library item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Binary lesson-plan template (PDF, DOCX, ...)
    Template,

    /// Plain-text resources
    Resource,
}

impl ItemKind {
    /// Stored column value
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Template => "template",
            ItemKind::Resource => "resource",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ItemKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "template" | "templates" => Ok(ItemKind::Template),
            "resource" | "resources" => Ok(ItemKind::Resource),
            _ => anyhow::bail!("Unknown item kind: {}", s),
        }
    }
}

/// Record payload; the variant is tied to the record's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    EncodedBinary(EncodedBinary),
    PlainText(String),
}

/// A validated library record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRecord {
    pub id: RecordId,
    pub name: String,
    pub kind: ItemKind,
    pub payload: Payload,
    pub created_at: DateTime<Utc>,
}

impl LibraryRecord {
    /// New template record with a fresh id
    pub fn template(name: impl Into<String>, encoded: EncodedBinary) -> Self {
        Self {
            id: RecordId::generate(),
            name: name.into(),
            kind: ItemKind::Template,
            payload: Payload::EncodedBinary(encoded),
            created_at: Utc::now(),
        }
    }

    /// New resource record with a fresh id
    pub fn resource(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: RecordId::generate(),
            name: name.into(),
            kind: ItemKind::Resource,
            payload: Payload::PlainText(text.into()),
            created_at: Utc::now(),
        }
    }

    pub fn metadata(&self) -> ItemMetadata {
        ItemMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            created_at: self.created_at,
        }
    }
}

/// Listing shape: everything but the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub id: RecordId,
    pub name: String,
    pub kind: ItemKind,
    pub created_at: DateTime<Utc>,
}

/// A row as persisted in the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub name: String,

    /// Absent on rows written before kinds existed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ItemKind>,

    /// Encoded binary for templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,

    /// Raw text for resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Kind with the legacy default applied (missing means template)
    pub fn effective_kind(&self) -> ItemKind {
        self.kind.unwrap_or(ItemKind::Template)
    }

    pub fn metadata(&self) -> ItemMetadata {
        ItemMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.effective_kind(),
            created_at: self.created_at,
        }
    }

    /// Approximate persisted size in bytes
    pub fn payload_len(&self) -> usize {
        self.name.len()
            + self.data_url.as_ref().map_or(0, String::len)
            + self.content.as_ref().map_or(0, String::len)
    }
}

impl From<&LibraryRecord> for StoredRecord {
    fn from(record: &LibraryRecord) -> Self {
        let (data_url, content) = match &record.payload {
            Payload::EncodedBinary(encoded) => (Some(encoded.as_str().to_string()), None),
            Payload::PlainText(text) => (None, Some(text.clone())),
        };

        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            kind: Some(record.kind),
            data_url,
            content,
            created_at: record.created_at,
        }
    }
}

impl TryFrom<StoredRecord> for LibraryRecord {
    type Error = LibraryError;

    fn try_from(stored: StoredRecord) -> Result<Self, Self::Error> {
        let kind = stored.effective_kind();
        let payload = match kind {
            ItemKind::Template => match stored.data_url {
                Some(data_url) => Payload::EncodedBinary(EncodedBinary::from(data_url)),
                None => {
                    return Err(LibraryError::CorruptRecord {
                        id: stored.id.to_string(),
                        reason: "template has no file data".to_string(),
                    })
                }
            },
            ItemKind::Resource => match stored.content {
                Some(text) => Payload::PlainText(text),
                None => {
                    return Err(LibraryError::CorruptRecord {
                        id: stored.id.to_string(),
                        reason: "resource has no text content".to_string(),
                    })
                }
            },
        };

        Ok(Self {
            id: stored.id,
            name: stored.name,
            kind,
            payload,
            created_at: stored.created_at,
        })
    }
}
