//! Scheduler trait: submit jobs of each kind, get a job by id.

use async_trait::async_trait;
use bio_calc::{CalcError, DistanceMatrix, FaultKind};
use bio_types::{
    DistanceMatrixRequest, JobKindTag, JobRecord, JobTicket, NearestNeighborsRequest, StoreError,
    TreeRequest,
};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    SourceNotReady(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("calculation error: {0}")]
    Calc(CalcError),
    #[error("scheduler error: {0}")]
    Other(String),
}

impl From<CalcError> for SchedulerError {
    fn from(e: CalcError) -> Self {
        match e {
            CalcError::Store(StoreError::InvalidId(_))
            | CalcError::Store(StoreError::MalformedFilter(_)) => {
                SchedulerError::BadRequest(e.to_string())
            }
            CalcError::NoSuchSequence(_) | CalcError::NotFound(_) => {
                SchedulerError::NotFound(e.to_string())
            }
            CalcError::SourceNotReady { .. } => SchedulerError::SourceNotReady(e.to_string()),
            e if e.fault_kind() == FaultKind::MissingData => {
                SchedulerError::Unprocessable(e.to_string())
            }
            e => SchedulerError::Calc(e),
        }
    }
}

/// Scheduler for background calculations: submit returns a ticket, records can be polled.
///
/// Contract: `get_job` returns `Ok(None)` when no job of that kind has the id. The API layer
/// maps `Ok(None)` to HTTP 404.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Resolve the input sequence, persist the job, and start the search.
    async fn submit_nearest_neighbors(
        &self,
        req: NearestNeighborsRequest,
    ) -> Result<JobTicket, SchedulerError>;

    async fn submit_distance_matrix(
        &self,
        req: DistanceMatrixRequest,
    ) -> Result<JobTicket, SchedulerError>;

    /// The source distance-matrix job must exist and be completed at submission.
    async fn submit_tree(&self, req: TreeRequest) -> Result<JobTicket, SchedulerError>;

    async fn get_job(&self, kind: JobKindTag, job_id: &str)
        -> Result<Option<JobRecord>, SchedulerError>;

    /// Persisted matrix of a completed distance-matrix job.
    async fn distance_matrix(&self, job_id: &str)
        -> Result<Option<DistanceMatrix>, SchedulerError>;
}
