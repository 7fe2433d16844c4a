//! Traits for the document store and the external distance tool.

use crate::path::Document;
use crate::query::{Filter, Stage};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Document store consumed by the calculation engine.
///
/// Query results are materialized; callers never hold a server-side cursor.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Number of documents in `collection` matching `filter`.
    async fn count_matching(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Documents matching `filter`, each reduced to `_id` plus `field_paths`, in insertion order.
    async fn find_projected(
        &self,
        collection: &str,
        filter: &Filter,
        field_paths: &[String],
    ) -> Result<Vec<Document>, StoreError>;

    /// Run `pipeline` over `collection`.
    async fn aggregate(&self, collection: &str, pipeline: &[Stage])
        -> Result<Vec<Document>, StoreError>;

    /// Insert a document and return its id. A supplied `_id` is kept if it is a valid,
    /// unused id; otherwise the store assigns a fresh one.
    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError>;

    /// Set top-level fields of the document with `id`.
    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<(), StoreError>;

    /// Full document by id. `Ok(None)` when no such document exists.
    async fn find_by_id(&self, collection: &str, id: &str)
        -> Result<Option<Document>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("'{0}' is not a valid document id")]
    InvalidId(String),
    #[error("malformed filter: {0}")]
    MalformedFilter(String),
    #[error("document {id} not found in {collection}")]
    NotFound { collection: String, id: String },
    #[error("duplicate document id {0}")]
    DuplicateId(String),
    #[error("document store error: {0}")]
    Other(String),
}

/// External all-pairs distance tool (cgmlst-dists compatible).
///
/// Reads a tab-separated allele matrix and returns its tab-separated distance matrix on stdout.
#[async_trait]
pub trait DistanceTool: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, allele_matrix: &Path) -> Result<String, DistanceToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DistanceToolError {
    #[error("could not start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not run {tool} on {}! (exit code {code:?})\n\n{stderr}", .path.display())]
    Failed {
        tool: String,
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },
    #[error("distance tool I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("distance tool produced invalid output: {0}")]
    InvalidOutput(String),
}
