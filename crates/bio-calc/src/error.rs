//! Calculation faults and their classification.

use crate::linkage::ClusterError;
use bio_types::{DistanceToolError, FieldError, JobError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CalcError {
    #[error("no such sequence: {0}")]
    NoSuchSequence(String),
    #[error("missing data: {0}")]
    MissingData(String),
    #[error("missing data: {0}")]
    Field(#[from] FieldError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("distance matrix job {id} has status '{status}'")]
    SourceNotReady { id: String, status: String },
    #[error("reference sequence has not been resolved")]
    Unresolved,
    #[error(transparent)]
    Tool(#[from] DistanceToolError),
    #[error("clustering failed: {0}")]
    Cluster(#[from] ClusterError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("job: {0}")]
    Job(#[from] JobError),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Fault taxonomy used for logging and for mapping to caller-visible responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Unknown or malformed record/job reference.
    InputReference,
    /// A record lacks a required field, or fewer records than requested exist.
    MissingData,
    /// The external distance tool failed.
    Tool,
    /// Clustering could not produce a valid tree.
    Numeric,
    /// Store, filesystem, or serialization failure.
    Environment,
}

impl CalcError {
    pub fn fault_kind(&self) -> FaultKind {
        match self {
            CalcError::NoSuchSequence(_)
            | CalcError::NotFound(_)
            | CalcError::SourceNotReady { .. }
            | CalcError::Unresolved
            | CalcError::Store(StoreError::InvalidId(_)) => FaultKind::InputReference,
            CalcError::MissingData(_) | CalcError::Field(_) => FaultKind::MissingData,
            CalcError::Tool(_) => FaultKind::Tool,
            CalcError::Cluster(_) => FaultKind::Numeric,
            _ => FaultKind::Environment,
        }
    }
}
