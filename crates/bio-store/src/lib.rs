//! Document store implementations: in-memory and (feature `sqlite`) SQLite-backed.

mod filter;
mod memory;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use bio_types::{Document, DocumentStore, Filter, Stage, StoreError};
pub use filter::{apply_pipeline, matches, parse_id, project, validate};
pub use memory::InMemoryDocumentStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDocumentStore;
