//! Job persistence: one insert at submission, one update at the terminal transition.

use crate::error::CalcError;
use bio_types::{DocumentStore, JobKindTag, JobRecord, JobStatus};
use std::sync::Arc;

#[derive(Clone)]
pub struct JobStore {
    documents: Arc<dyn DocumentStore>,
}

impl JobStore {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    /// Insert a fresh `init` record and stamp it with the assigned id.
    pub async fn insert(&self, record: &mut JobRecord) -> Result<String, CalcError> {
        if let Some(id) = &record.id {
            return Err(bio_types::JobError::AlreadyPersisted(id.clone()).into());
        }
        let document = record.to_document()?;
        let id = self.documents.insert(record.collection(), document).await?;
        record.mark_persisted(id.clone())?;
        tracing::debug!(job_id = %id, kind = %record.kind.tag(), "job persisted");
        Ok(id)
    }

    /// Write status, finish time, and result of a terminal record in a single update.
    pub async fn write_terminal(&self, record: &JobRecord) -> Result<(), CalcError> {
        let id = record.id()?;
        if !record.status.is_terminal() {
            return Err(bio_types::JobError::NotTerminal {
                id: id.to_string(),
                status: record.status,
            }
            .into());
        }
        self.documents
            .update_by_id(record.collection(), id, record.terminal_patch()?)
            .await?;
        Ok(())
    }

    pub async fn load(&self, kind: JobKindTag, id: &str) -> Result<Option<JobRecord>, CalcError> {
        match self.documents.find_by_id(kind.collection(), id).await? {
            Some(doc) => Ok(Some(JobRecord::from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// Load a job that must exist.
    pub async fn require(&self, kind: JobKindTag, id: &str) -> Result<JobRecord, CalcError> {
        self.load(kind, id)
            .await?
            .ok_or_else(|| CalcError::NotFound(format!("{kind} job {id}")))
    }

    /// Load a distance-matrix job that must have completed.
    pub async fn require_completed(
        &self,
        kind: JobKindTag,
        id: &str,
    ) -> Result<JobRecord, CalcError> {
        let record = self.require(kind, id).await?;
        if record.status != JobStatus::Completed {
            return Err(CalcError::SourceNotReady {
                id: id.to_string(),
                status: record.status.to_string(),
            });
        }
        Ok(record)
    }
}
