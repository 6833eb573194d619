//! Local archive of lesson-plan templates and resource texts.
//!
//! # Layers
//!
//! ```text
//! Library (service)  ── publishes ──▶ UpdateBus ──▶ subscribers
//!    │
//!    ├── codec   BinaryFile <-> data: URL
//!    └── store   RecordStore (SqliteStore | MemoryStore)
//!                   └── ~/.plansmith/library.db, table `templates`
//! ```
//!
//! Templates and resources share one collection and one id namespace.
//! Records are immutable once written; the only mutations are save and
//! delete.

pub mod bus;
pub mod codec;
pub mod error;
pub mod record;
pub mod service;
pub mod store;

pub use bus::{Subscription, UpdateBus};
pub use codec::{BinaryFile, EncodedBinary};
pub use error::{LibraryError, StoreError};
pub use record::{ItemKind, ItemMetadata, LibraryRecord, Payload, RecordId, StoredRecord};
pub use service::{Library, LibraryContent};
pub use store::{MemoryStore, RecordStore, SqliteStore, StoreOptions};
