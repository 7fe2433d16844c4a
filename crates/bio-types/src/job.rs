//! Job records: the persisted state machine shared by every calculation kind.
//!
//! A record is built in memory with status `init`, receives its id when inserted, and then
//! takes exactly one terminal transition to `completed` or `error`.

use crate::path::{Document, ID_FIELD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Init,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Init => "init",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linkage rule for hierarchical clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkageMethod {
    Single,
    Complete,
    Average,
    Weighted,
    Centroid,
    Median,
    Ward,
}

impl LinkageMethod {
    pub const ALL: [LinkageMethod; 7] = [
        LinkageMethod::Single,
        LinkageMethod::Complete,
        LinkageMethod::Average,
        LinkageMethod::Weighted,
        LinkageMethod::Centroid,
        LinkageMethod::Median,
        LinkageMethod::Ward,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LinkageMethod::Single => "single",
            LinkageMethod::Complete => "complete",
            LinkageMethod::Average => "average",
            LinkageMethod::Weighted => "weighted",
            LinkageMethod::Centroid => "centroid",
            LinkageMethod::Median => "median",
            LinkageMethod::Ward => "ward",
        }
    }
}

impl std::fmt::Display for LinkageMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkageMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| format!("unknown linkage method '{}'", s))
    }
}

/// Parameters of a nearest-neighbor job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestNeighborsParams {
    pub seq_collection: String,
    pub profile_field_path: String,
    pub input_id: String,
    /// Equality constraints on candidates (dotted path -> value).
    #[serde(default)]
    pub filtering: BTreeMap<String, Value>,
    pub cutoff: u32,
    pub unknowns_are_diffs: bool,
}

/// Parameters of a distance-matrix job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrixParams {
    pub seq_collection: String,
    pub seqid_field_path: String,
    pub profile_field_path: String,
    /// Explicit record subset; `None` means every record carrying the profile field.
    #[serde(default)]
    pub seq_ids: Option<Vec<String>>,
}

/// Parameters of a tree job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Id of a completed distance-matrix job.
    pub source_job_id: String,
    pub method: LinkageMethod,
}

/// Kind-specific part of a job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    NearestNeighbors(NearestNeighborsParams),
    DistanceMatrix(DistanceMatrixParams),
    Tree(TreeParams),
}

impl JobKind {
    pub fn tag(&self) -> JobKindTag {
        match self {
            JobKind::NearestNeighbors(_) => JobKindTag::NearestNeighbors,
            JobKind::DistanceMatrix(_) => JobKindTag::DistanceMatrix,
            JobKind::Tree(_) => JobKindTag::Tree,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.tag().collection()
    }
}

/// Job kind without parameters; selects the collection a job lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKindTag {
    NearestNeighbors,
    DistanceMatrix,
    Tree,
}

impl JobKindTag {
    pub fn collection(self) -> &'static str {
        match self {
            JobKindTag::NearestNeighbors => "nearest_neighbors",
            JobKindTag::DistanceMatrix => "dist_calculations",
            JobKindTag::Tree => "tree_calculations",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobKindTag::NearestNeighbors => "nearest_neighbors",
            JobKindTag::DistanceMatrix => "distance_matrix",
            JobKindTag::Tree => "tree",
        }
    }
}

impl std::fmt::Display for JobKindTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: String,
    pub diff_count: u32,
}

/// Illegal state-machine transition or undecodable job document.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job has not been persisted")]
    NotPersisted,
    #[error("job already persisted with id {0}")]
    AlreadyPersisted(String),
    #[error("job {id} is already terminal ({status})")]
    AlreadyTerminal { id: String, status: JobStatus },
    #[error("job {id} is still {status}; only terminal states are written")]
    NotTerminal { id: String, status: JobStatus },
    #[error("job document: {0}")]
    Document(#[from] serde_json::Error),
}

/// Persisted job record. `kind` carries the per-kind parameters flattened into the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Kind-specific payload on `completed`, message string on `error`.
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(flatten)]
    pub kind: JobKind,
}

impl JobRecord {
    pub fn new(kind: JobKind) -> Self {
        Self {
            id: None,
            status: JobStatus::Init,
            created_at: Utc::now(),
            finished_at: None,
            result: None,
            kind,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.kind.collection()
    }

    pub fn id(&self) -> Result<&str, JobError> {
        self.id.as_deref().ok_or(JobError::NotPersisted)
    }

    /// Record the store-assigned id. Only valid once.
    pub fn mark_persisted(&mut self, id: String) -> Result<(), JobError> {
        if let Some(existing) = &self.id {
            return Err(JobError::AlreadyPersisted(existing.clone()));
        }
        self.id = Some(id);
        Ok(())
    }

    /// Transition to `completed` with `result`.
    pub fn complete(&mut self, result: Value) -> Result<(), JobError> {
        self.finish(JobStatus::Completed, result)
    }

    /// Transition to `error` with a human-readable message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), JobError> {
        self.finish(JobStatus::Error, Value::String(message.into()))
    }

    fn finish(&mut self, status: JobStatus, result: Value) -> Result<(), JobError> {
        let id = self.id()?.to_string();
        if self.status.is_terminal() {
            return Err(JobError::AlreadyTerminal {
                id,
                status: self.status,
            });
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
        self.result = Some(result);
        Ok(())
    }

    /// Fields written by the single terminal update.
    pub fn terminal_patch(&self) -> Result<Document, JobError> {
        let mut patch = Document::new();
        patch.insert("status".to_string(), serde_json::to_value(self.status)?);
        patch.insert(
            "finished_at".to_string(),
            serde_json::to_value(self.finished_at)?,
        );
        patch.insert(
            "result".to_string(),
            self.result.clone().unwrap_or(Value::Null),
        );
        Ok(patch)
    }

    /// Document to insert; the id is left for the store to assign.
    pub fn to_document(&self) -> Result<Document, JobError> {
        match serde_json::to_value(self)? {
            Value::Object(mut doc) => {
                doc.remove(ID_FIELD);
                Ok(doc)
            }
            _ => Err(JobError::Document(serde::ser::Error::custom(
                "job record did not serialize to an object",
            ))),
        }
    }

    pub fn from_document(doc: Document) -> Result<Self, JobError> {
        Ok(serde_json::from_value(Value::Object(doc))?)
    }

    /// Error message when the job ended in `error`.
    pub fn error_message(&self) -> Option<&str> {
        match self.status {
            JobStatus::Error => self.result.as_ref().and_then(|r| r.as_str()),
            _ => None,
        }
    }

    /// Neighbor list of a completed nearest-neighbor job.
    pub fn neighbors(&self) -> Option<Vec<Neighbor>> {
        match (&self.kind, self.status, &self.result) {
            (JobKind::NearestNeighbors(_), JobStatus::Completed, Some(r)) => {
                serde_json::from_value(r.clone()).ok()
            }
            _ => None,
        }
    }

    /// Sequence-id -> record-id trace map of a completed distance-matrix job.
    pub fn trace_map(&self) -> Option<BTreeMap<String, String>> {
        match (&self.kind, self.status, &self.result) {
            (JobKind::DistanceMatrix(_), JobStatus::Completed, Some(r)) => {
                serde_json::from_value(r.clone()).ok()
            }
            _ => None,
        }
    }

    /// Newick text of a completed tree job.
    pub fn newick(&self) -> Option<&str> {
        match (&self.kind, self.status, &self.result) {
            (JobKind::Tree(_), JobStatus::Completed, Some(r)) => r.as_str(),
            _ => None,
        }
    }
}
