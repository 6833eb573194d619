//! Library error taxonomy.

use thiserror::Error;

/// Errors raised by a `RecordStore`
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Persistent storage unavailable: {0}")]
    UnsupportedEnvironment(String),

    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),
}

/// Errors surfaced by the library service
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Persistent storage unavailable: {0}")]
    UnsupportedEnvironment(String),

    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Failed to save to database: {0}")]
    WriteFailed(String),

    #[error("Failed to load from database: {0}")]
    ReadFailed(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Item {id} is corrupted: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("Resource text is empty")]
    EmptyResource,
}

impl LibraryError {
    /// Message suitable for showing to the person at the keyboard
    pub fn user_message(&self) -> String {
        match self {
            LibraryError::UnsupportedEnvironment(_) => {
                "The library is unavailable on this system.".to_string()
            }
            LibraryError::QuotaExceeded => {
                "Storage limit reached. Please delete old items.".to_string()
            }
            LibraryError::WriteFailed(_) => {
                "Failed to save to the library. Please try again.".to_string()
            }
            LibraryError::ReadFailed(_) => {
                "Failed to load from the library. Please try again.".to_string()
            }
            LibraryError::NotFound(id) => {
                format!("Item {} is missing; it may have been deleted elsewhere.", id)
            }
            LibraryError::CorruptRecord { id, .. } => format!(
                "Item {} is corrupted and cannot be loaded. Please archive it again.",
                id
            ),
            LibraryError::EmptyResource => {
                "Please enter some resources before archiving.".to_string()
            }
        }
    }
}

impl From<StoreError> for LibraryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnsupportedEnvironment(msg) => LibraryError::UnsupportedEnvironment(msg),
            StoreError::QuotaExceeded => LibraryError::QuotaExceeded,
            StoreError::WriteFailed(msg) => LibraryError::WriteFailed(msg),
            StoreError::ReadFailed(msg) => LibraryError::ReadFailed(msg),
            StoreError::NotFound(id) => LibraryError::NotFound(id),
        }
    }
}
