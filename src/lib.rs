//! plansmith - Lesson plans from your own template
//!
//! Fills a district or school lesson-plan template with generated content
//! and exports the result as a Word-compatible document. Templates and
//! resource notes are archived in a local library so they can be reused.
//!
//! # Modules
//!
//! - `library`: Local archive of templates and resources (store, codec, update bus)
//! - `adapters`: Lesson generation backends (Gemini)
//! - `export`: Word-compatible document export
//! - `config`: Configuration discovery and resolution
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Archive a template, then generate from it
//! plansmith template add district-plan.pdf
//! plansmith generate --topic "Photosynthesis" --grade "Grade 7" --subject Science
//!
//! # Archive resource notes from stdin
//! cat notes.txt | plansmith resource add --name "Chapter 4"
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod export;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{GeminiGenerator, GenerationError, LessonGenerator, LessonRequest};
pub use export::{export_document, ExportedDocument};
pub use library::{
    BinaryFile, ItemKind, ItemMetadata, Library, LibraryContent, LibraryError, RecordId,
    StoreError, UpdateBus,
};
