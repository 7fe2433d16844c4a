//! Hierarchical-clustering tree over a completed distance-matrix job.

use crate::config::{EngineConfig, LinkageInput};
use crate::distance::DistanceCalculation;
use crate::error::CalcError;
use crate::jobs::JobStore;
use crate::linkage::{linkage, observation_distances};
use crate::matrix::{DistanceMatrix, DISTANCE_MATRIX_FILE};
use crate::newick::to_newick;
use bio_types::{JobKind, JobKindTag, JobRecord, TreeParams, TreeRequest};
use std::path::PathBuf;

pub struct TreeCalculation {
    pub(crate) jobs: JobStore,
    pub(crate) record: JobRecord,
    params: TreeParams,
    dmx_dir: PathBuf,
    input: LinkageInput,
}

impl TreeCalculation {
    pub fn new(jobs: JobStore, config: &EngineConfig, request: TreeRequest) -> Self {
        let params = TreeParams {
            source_job_id: request.source_job_id,
            method: request.method,
        };
        Self {
            jobs,
            record: JobRecord::new(JobKind::Tree(params.clone())),
            params,
            dmx_dir: config.dmx_dir.clone(),
            input: config.linkage_input,
        }
    }

    pub fn record(&self) -> &JobRecord {
        &self.record
    }

    /// The source job must exist and be completed.
    pub async fn check_source(&self) -> Result<JobRecord, CalcError> {
        self.jobs
            .require_completed(JobKindTag::DistanceMatrix, &self.params.source_job_id)
            .await
    }

    /// Newick text of the clustering of the source job's distance matrix.
    pub async fn calculate(&self) -> Result<String, CalcError> {
        let source = self.check_source().await?;
        let path = DistanceCalculation::folder_for(&self.dmx_dir, source.id()?)
            .join(DISTANCE_MATRIX_FILE);
        let matrix = DistanceMatrix::load(&path).await?;
        let merges = match self.input {
            LinkageInput::Observations => {
                linkage(&observation_distances(&matrix.distances)?, self.params.method)?
            }
            LinkageInput::Precomputed => linkage(&matrix.distances, self.params.method)?,
        };
        let newick = to_newick(&merges, &matrix.ids)?;
        tracing::debug!(
            source = %self.params.source_job_id,
            method = %self.params.method,
            input = ?self.input,
            leaves = matrix.len(),
            "tree computed"
        );
        Ok(newick)
    }
}
