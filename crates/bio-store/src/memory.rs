//! In-memory document store (brute-force filtering, insertion order preserved).

use crate::filter::{apply_pipeline, matches, parse_id, project, validate};
use bio_types::{Document, DocumentStore, Filter, Stage, StoreError, ID_FIELD};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory DocumentStore: collection name -> documents in insertion order.
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn matching(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        validate(filter)?;
        let guard = self.collections.read().await;
        let mut out = Vec::new();
        if let Some(docs) = guard.get(collection) {
            for doc in docs {
                if matches(doc, filter)? {
                    out.push(doc.clone());
                }
            }
        }
        Ok(out)
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn position(docs: &[Document], id: &str) -> Option<usize> {
    docs.iter()
        .position(|d| d.get(ID_FIELD).and_then(|v| v.as_str()) == Some(id))
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn count_matching(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        Ok(self.matching(collection, filter).await?.len() as u64)
    }

    async fn find_projected(
        &self,
        collection: &str,
        filter: &Filter,
        field_paths: &[String],
    ) -> Result<Vec<Document>, StoreError> {
        let docs = self.matching(collection, filter).await?;
        Ok(docs.iter().map(|d| project(d, field_paths)).collect())
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Stage],
    ) -> Result<Vec<Document>, StoreError> {
        let docs = {
            let guard = self.collections.read().await;
            guard.get(collection).cloned().unwrap_or_default()
        };
        apply_pipeline(docs, pipeline)
    }

    async fn insert(&self, collection: &str, mut document: Document) -> Result<String, StoreError> {
        let mut guard = self.collections.write().await;
        let docs = guard.entry(collection.to_string()).or_default();
        let supplied = document
            .get(ID_FIELD)
            .and_then(|v| v.as_str())
            .and_then(|s| parse_id(s).ok());
        let id = match supplied {
            Some(id) => {
                if position(docs, &id).is_some() {
                    return Err(StoreError::DuplicateId(id));
                }
                id
            }
            None => Uuid::new_v4().to_string(),
        };
        document.insert(ID_FIELD.to_string(), serde_json::Value::String(id.clone()));
        docs.push(document);
        Ok(id)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<(), StoreError> {
        let id = parse_id(id)?;
        let mut guard = self.collections.write().await;
        let not_found = || StoreError::NotFound {
            collection: collection.to_string(),
            id: id.clone(),
        };
        let docs = guard.get_mut(collection).ok_or_else(not_found)?;
        let idx = position(docs, &id).ok_or_else(not_found)?;
        for (k, v) in patch {
            if k != ID_FIELD {
                docs[idx].insert(k, v);
            }
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let id = parse_id(id)?;
        let guard = self.collections.read().await;
        Ok(guard
            .get(collection)
            .and_then(|docs| position(docs, &id).map(|i| docs[i].clone())))
    }
}
