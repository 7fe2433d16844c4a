//! Filter evaluation and projection shared by the store implementations.

use bio_types::{insert_at, lookup, Condition, Document, Filter, Stage, StoreError, ID_FIELD};
use uuid::Uuid;

/// Canonical form of a document id. Ids are UUIDs; anything else is `InvalidId`.
pub fn parse_id(id: &str) -> Result<String, StoreError> {
    Uuid::parse_str(id.trim())
        .map(|u| u.to_string())
        .map_err(|_| StoreError::InvalidId(id.to_string()))
}

fn check_path(path: &str) -> Result<(), StoreError> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(StoreError::MalformedFilter(format!(
            "invalid field path '{}'",
            path
        )));
    }
    Ok(())
}

fn doc_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(|v| v.as_str())
}

/// Validate a filter without evaluating it.
pub fn validate(filter: &Filter) -> Result<(), StoreError> {
    for condition in &filter.conditions {
        match condition {
            Condition::Eq { path, .. } | Condition::Exists { path } => check_path(path)?,
            Condition::IdIn { ids } => {
                for id in ids {
                    parse_id(id)?;
                }
            }
            Condition::IdNe { id } => {
                parse_id(id)?;
            }
        }
    }
    Ok(())
}

/// Whether `doc` satisfies every condition of `filter`.
pub fn matches(doc: &Document, filter: &Filter) -> Result<bool, StoreError> {
    for condition in &filter.conditions {
        let ok = match condition {
            Condition::Eq { path, value } => {
                check_path(path)?;
                lookup(doc, path) == Some(value)
            }
            Condition::Exists { path } => {
                check_path(path)?;
                lookup(doc, path).is_some()
            }
            Condition::IdIn { ids } => {
                let mut found = false;
                for id in ids {
                    if doc_id(doc) == Some(parse_id(id)?.as_str()) {
                        found = true;
                    }
                }
                found
            }
            Condition::IdNe { id } => doc_id(doc) != Some(parse_id(id)?.as_str()),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// `_id` plus the values at `paths`; absent paths are left out.
pub fn project(doc: &Document, paths: &[String]) -> Document {
    let mut out = Document::new();
    if let Some(id) = doc.get(ID_FIELD) {
        out.insert(ID_FIELD.to_string(), id.clone());
    }
    for path in paths {
        if let Some(v) = lookup(doc, path) {
            insert_at(&mut out, path, v.clone());
        }
    }
    out
}

/// Apply aggregation stages in order.
pub fn apply_pipeline(docs: Vec<Document>, pipeline: &[Stage]) -> Result<Vec<Document>, StoreError> {
    let mut current = docs;
    for stage in pipeline {
        current = match stage {
            Stage::Match(filter) => {
                validate(filter)?;
                let mut kept = Vec::with_capacity(current.len());
                for doc in current {
                    if matches(&doc, filter)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            Stage::Project { paths } => {
                for path in paths {
                    check_path(path)?;
                }
                current.iter().map(|d| project(d, paths)).collect()
            }
            Stage::Limit { count } => current.into_iter().take(*count).collect(),
        };
    }
    Ok(current)
}
