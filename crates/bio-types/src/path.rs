//! Dotted field paths over nested documents.

use serde_json::Value;

/// Field holding a document's store-assigned identifier.
pub const ID_FIELD: &str = "_id";

/// A nested record as stored in the document store.
pub type Document = serde_json::Map<String, Value>;

/// A dotted path did not resolve against a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("record {record} has no field '{segment}' (path '{path}')")]
pub struct FieldError {
    /// `_id` of the record, or `<unidentified>` when the record carries none.
    pub record: String,
    /// First path segment that was absent.
    pub segment: String,
    pub path: String,
}

/// Identifier used in messages about a record.
pub fn record_label(record: &Document) -> String {
    match record.get(ID_FIELD) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "<unidentified>".to_string(),
    }
}

/// Resolve `path` (`a.b.c`) against `record`, descending one segment at a time.
///
/// Every segment must exist; there is no default or partial resolution. Only objects are
/// descended into, so a scalar in the middle of the path counts as a missing segment.
pub fn hoist<'a>(record: &'a Document, path: &str) -> Result<&'a Value, FieldError> {
    let missing = |segment: &str| FieldError {
        record: record_label(record),
        segment: segment.to_string(),
        path: path.to_string(),
    };
    let mut segments = path.split('.');
    let first = segments.next().unwrap_or_default();
    let mut current = record.get(first).ok_or_else(|| missing(first))?;
    for segment in segments {
        current = current
            .as_object()
            .and_then(|o| o.get(segment))
            .ok_or_else(|| missing(segment))?;
    }
    Ok(current)
}

/// Like [`hoist`] but returns `None` instead of a fault.
pub fn lookup<'a>(record: &'a Document, path: &str) -> Option<&'a Value> {
    hoist(record, path).ok()
}

/// Set `value` at `path`, creating intermediate objects. Used for projections.
pub fn insert_at(record: &mut Document, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = match segments.pop() {
        Some(l) => l,
        None => return,
    };
    let mut current = record;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Document::new()));
        if !entry.is_object() {
            *entry = Value::Object(Document::new());
        }
        current = match entry.as_object_mut() {
            Some(o) => o,
            None => return,
        };
    }
    current.insert(last.to_string(), value);
}

/// Render a scalar document value as text (strings unquoted, null as empty).
pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
