//! SQLite-backed document store (persistence across restarts).
//! Documents are stored as JSON text; filters are evaluated in-process after loading a collection.

use crate::filter::{apply_pipeline, matches, parse_id, project, validate};
use async_trait::async_trait;
use bio_types::{Document, DocumentStore, Filter, Stage, StoreError, ID_FIELD};
use std::path::Path;
use uuid::Uuid;

/// SQLite-backed document store.
pub struct SqliteDocumentStore {
    conn: std::sync::Mutex<rusqlite::Connection>,
}

impl SqliteDocumentStore {
    /// Open (or create) the store at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn =
            rusqlite::Connection::open(path).map_err(|e| StoreError::Other(e.to_string()))?;
        Self::init(conn)
    }

    /// Store in a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            rusqlite::Connection::open_in_memory().map_err(|e| StoreError::Other(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                UNIQUE (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
            "#,
        )
        .map_err(|e| StoreError::Other(e.to_string()))?;

        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Other(format!("failed to acquire lock: {}", e)))?;
        f(&conn).map_err(|e| StoreError::Other(e.to_string()))
    }

    fn load_collection(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let bodies: Vec<String> = self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY seq")?;
            let rows = stmt.query_map(rusqlite::params![collection], |row| row.get(0))?;
            let bodies: Result<Vec<String>, rusqlite::Error> = rows.collect();
            bodies
        })?;
        bodies.iter().map(|b| decode(b)).collect()
    }

    fn load_one(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let body: Option<String> = self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")?;
            let mut rows = stmt.query(rusqlite::params![collection, id])?;
            let body = match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            };
            Ok(body)
        })?;
        body.as_deref().map(decode).transpose()
    }

    fn matching(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        validate(filter)?;
        let mut out = Vec::new();
        for doc in self.load_collection(collection)? {
            if matches(&doc, filter)? {
                out.push(doc);
            }
        }
        Ok(out)
    }
}

fn decode(body: &str) -> Result<Document, StoreError> {
    serde_json::from_str(body).map_err(|e| StoreError::Other(format!("corrupt document: {}", e)))
}

fn encode(doc: &Document) -> Result<String, StoreError> {
    serde_json::to_string(doc).map_err(|e| StoreError::Other(e.to_string()))
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn count_matching(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        Ok(self.matching(collection, filter)?.len() as u64)
    }

    async fn find_projected(
        &self,
        collection: &str,
        filter: &Filter,
        field_paths: &[String],
    ) -> Result<Vec<Document>, StoreError> {
        let docs = self.matching(collection, filter)?;
        Ok(docs.iter().map(|d| project(d, field_paths)).collect())
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Stage],
    ) -> Result<Vec<Document>, StoreError> {
        apply_pipeline(self.load_collection(collection)?, pipeline)
    }

    async fn insert(&self, collection: &str, mut document: Document) -> Result<String, StoreError> {
        let supplied = document
            .get(ID_FIELD)
            .and_then(|v| v.as_str())
            .and_then(|s| parse_id(s).ok());
        let id = match supplied {
            Some(id) => {
                if self.load_one(collection, &id)?.is_some() {
                    return Err(StoreError::DuplicateId(id));
                }
                id
            }
            None => Uuid::new_v4().to_string(),
        };
        document.insert(ID_FIELD.to_string(), serde_json::Value::String(id.clone()));
        let body = encode(&document)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)",
                rusqlite::params![collection, id, body],
            )
        })?;
        Ok(id)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<(), StoreError> {
        let id = parse_id(id)?;
        let mut doc = self
            .load_one(collection, &id)?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.clone(),
            })?;
        for (k, v) in patch {
            if k != ID_FIELD {
                doc.insert(k, v);
            }
        }
        let body = encode(&doc)?;
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE documents SET body = ?1 WHERE collection = ?2 AND id = ?3",
                rusqlite::params![body, collection, id],
            )
        })?;
        Ok(())
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let id = parse_id(id)?;
        self.load_one(collection, &id)
    }
}
