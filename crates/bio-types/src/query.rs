//! Store-agnostic query filters and aggregation pipelines.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One constraint on a document. Paths use dotted notation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    /// Value at `path` equals `value`.
    Eq { path: String, value: Value },
    /// A value is present at `path`.
    Exists { path: String },
    /// Document `_id` is one of `ids`.
    IdIn { ids: Vec<String> },
    /// Document `_id` is not `id`.
    IdNe { id: String },
}

/// Conjunction of conditions. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, path: impl Into<String>, value: Value) -> Self {
        self.conditions.push(Condition::Eq {
            path: path.into(),
            value,
        });
        self
    }

    pub fn exists(mut self, path: impl Into<String>) -> Self {
        self.conditions.push(Condition::Exists { path: path.into() });
        self
    }

    pub fn id_in(mut self, ids: Vec<String>) -> Self {
        self.conditions.push(Condition::IdIn { ids });
        self
    }

    pub fn id_ne(mut self, id: impl Into<String>) -> Self {
        self.conditions.push(Condition::IdNe { id: id.into() });
        self
    }

    /// One `Eq` condition per entry, in key order.
    pub fn from_equalities(equalities: &BTreeMap<String, Value>) -> Self {
        equalities
            .iter()
            .fold(Self::new(), |f, (path, value)| f.eq(path.clone(), value.clone()))
    }
}

/// Aggregation stage, applied in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Match(Filter),
    /// Keep `_id` plus the listed paths.
    Project { paths: Vec<String> },
    Limit { count: usize },
}
