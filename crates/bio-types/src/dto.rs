//! Request and response DTOs for the job query surface.

use crate::job::{JobKind, JobRecord, JobStatus, LinkageMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Nearest-neighbor request. Collection and profile path come from engine config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestNeighborsRequest {
    #[serde(alias = "input_mongo_id")]
    pub input_id: String,
    #[serde(default)]
    pub filtering: BTreeMap<String, Value>,
    pub cutoff: u32,
    #[serde(default = "default_unknowns_are_diffs")]
    pub unknowns_are_diffs: bool,
}

fn default_unknowns_are_diffs() -> bool {
    true
}

/// Distance-matrix request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceMatrixRequest {
    /// Defaults to the configured sequence collection.
    #[serde(default)]
    pub seq_collection: Option<String>,
    pub seqid_field_path: String,
    /// Defaults to the configured profile path.
    #[serde(default)]
    pub profile_field_path: Option<String>,
    #[serde(default, alias = "mongo_ids")]
    pub seq_ids: Option<Vec<String>>,
}

/// Tree request over a completed distance-matrix job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeRequest {
    #[serde(alias = "dmx_job")]
    pub source_job_id: String,
    pub method: LinkageMethod,
}

/// Returned when a job has been accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTicket {
    pub job_id: String,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
}

impl JobTicket {
    /// Ticket for a persisted record; `None` if the record has no id yet.
    pub fn for_record(record: &JobRecord) -> Option<Self> {
        Some(Self {
            job_id: record.id.clone()?,
            created_at: record.created_at,
            status: record.status,
        })
    }
}

/// Point-in-time view of a job as returned to pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(flatten)]
    pub kind: JobKind,
}

impl From<JobRecord> for JobSnapshot {
    fn from(r: JobRecord) -> Self {
        Self {
            job_id: r.id.unwrap_or_default(),
            status: r.status,
            created_at: r.created_at,
            finished_at: r.finished_at,
            result: r.result,
            kind: r.kind,
        }
    }
}

/// Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseResponse<T> {
    #[serde(default = "default_code")]
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

fn default_code() -> i32 {
    200
}

impl<T> BaseResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            code: 200,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}
