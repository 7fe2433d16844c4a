//! Distance-matrix calculation through the external distance tool.

use crate::config::EngineConfig;
use crate::differ::profile_at;
use crate::error::CalcError;
use crate::jobs::JobStore;
use crate::matrix::{AlleleMatrix, DistanceMatrix, ALLELE_MATRIX_FILE, DISTANCE_MATRIX_FILE};
use bio_types::{
    hoist, record_label, value_as_text, DistanceMatrixParams, DistanceMatrixRequest,
    DistanceTool, Document, Filter, JobKind, JobRecord,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct DistanceCalculation {
    pub(crate) jobs: JobStore,
    pub(crate) record: JobRecord,
    params: DistanceMatrixParams,
    tool: Arc<dyn DistanceTool>,
    dmx_dir: PathBuf,
}

impl DistanceCalculation {
    pub fn new(
        jobs: JobStore,
        tool: Arc<dyn DistanceTool>,
        config: &EngineConfig,
        request: DistanceMatrixRequest,
    ) -> Self {
        let params = DistanceMatrixParams {
            seq_collection: request
                .seq_collection
                .unwrap_or_else(|| config.seq_collection.clone()),
            seqid_field_path: request.seqid_field_path,
            profile_field_path: request
                .profile_field_path
                .unwrap_or_else(|| config.profile_field_path.clone()),
            seq_ids: request.seq_ids,
        };
        Self {
            jobs,
            record: JobRecord::new(JobKind::DistanceMatrix(params.clone())),
            params,
            tool,
            dmx_dir: config.dmx_dir.clone(),
        }
    }

    pub fn record(&self) -> &JobRecord {
        &self.record
    }

    /// Artifact folder of distance-matrix job `job_id`.
    pub fn folder_for(dmx_dir: &Path, job_id: &str) -> PathBuf {
        dmx_dir.join(job_id)
    }

    pub fn folder(&self) -> Result<PathBuf, CalcError> {
        Ok(Self::folder_for(&self.dmx_dir, self.record.id()?))
    }

    /// Records carrying a profile, restricted to the requested ids when given.
    /// Fails when fewer records qualify than ids were requested.
    pub async fn fetch_profiles(&self) -> Result<Vec<Document>, CalcError> {
        let p = &self.params;
        let store = self.jobs.documents();
        let mut filter = Filter::new().exists(p.profile_field_path.clone());
        if let Some(ids) = &p.seq_ids {
            filter = filter.id_in(ids.clone());
            let found = store.count_matching(&p.seq_collection, &filter).await?;
            if found != ids.len() as u64 {
                return Err(CalcError::MissingData(format!(
                    "{} sequence ids were requested but {} records with a profile at '{}' were found",
                    ids.len(),
                    found,
                    p.profile_field_path
                )));
            }
        }
        let paths = [p.seqid_field_path.clone(), p.profile_field_path.clone()];
        Ok(store
            .find_projected(&p.seq_collection, &filter, &paths)
            .await?)
    }

    /// Build the allele matrix, run the tool on it, and persist the distance matrix.
    /// Returns the sequence-id to record-id trace map.
    pub async fn calculate(&self) -> Result<Value, CalcError> {
        let p = &self.params;
        let records = self.fetch_profiles().await?;
        let mut alleles = AlleleMatrix::new();
        let mut trace = BTreeMap::new();
        for record in &records {
            let seq_id = value_as_text(hoist(record, &p.seqid_field_path)?);
            alleles.push(&seq_id, &profile_at(record, &p.profile_field_path)?)?;
            trace.insert(seq_id, record_label(record));
        }

        let folder = self.folder()?;
        tokio::fs::create_dir_all(&self.dmx_dir).await?;
        tokio::fs::create_dir(&folder).await?;
        let allele_path = folder.join(ALLELE_MATRIX_FILE);
        alleles.write(&allele_path).await?;

        let output = self.tool.run(&allele_path).await?;
        let distances = DistanceMatrix::from_tool_output(&output)?;
        distances.save(&folder.join(DISTANCE_MATRIX_FILE)).await?;
        tracing::info!(
            folder = %folder.display(),
            tool = self.tool.name(),
            sequences = distances.len(),
            loci = alleles.loci().len(),
            "distance matrix written"
        );
        Ok(serde_json::to_value(trace)?)
    }
}
