//! Storage layer for the semantic graph pipeline.
//!
//! Two swappable backends implement the same traits:
//! - [`memory::MemoryStore`]: HashMaps behind a mutex, first-class for tests
//!   and ephemeral runs.
//! - [`sqlite::SqliteStore`]: SQLite with WAL mode and versioned migrations.
//!
//! The stored data is the content-addressed embedding cache (one row per
//! `(document_id, node_id, text_hash)` triple) and the persisted semantic
//! graph per document.

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{DocumentStore, EmbeddingCacheStore};
pub use types::EmbeddingRecord;
