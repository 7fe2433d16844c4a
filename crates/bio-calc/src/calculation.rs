//! Drives a calculation through its lifecycle: `init` on save, then exactly one
//! terminal update once the computation finishes or faults.

use crate::distance::DistanceCalculation;
use crate::error::{CalcError, FaultKind};
use crate::jobs::JobStore;
use crate::neighbors::NearestNeighbors;
use crate::tree::TreeCalculation;
use bio_types::JobRecord;
use serde_json::Value;
use std::time::Instant;

pub enum Calculation {
    NearestNeighbors(NearestNeighbors),
    DistanceMatrix(DistanceCalculation),
    Tree(TreeCalculation),
}

impl From<NearestNeighbors> for Calculation {
    fn from(c: NearestNeighbors) -> Self {
        Calculation::NearestNeighbors(c)
    }
}

impl From<DistanceCalculation> for Calculation {
    fn from(c: DistanceCalculation) -> Self {
        Calculation::DistanceMatrix(c)
    }
}

impl From<TreeCalculation> for Calculation {
    fn from(c: TreeCalculation) -> Self {
        Calculation::Tree(c)
    }
}

impl Calculation {
    pub fn record(&self) -> &JobRecord {
        match self {
            Calculation::NearestNeighbors(c) => &c.record,
            Calculation::DistanceMatrix(c) => &c.record,
            Calculation::Tree(c) => &c.record,
        }
    }

    fn parts(&mut self) -> (&JobStore, &mut JobRecord) {
        match self {
            Calculation::NearestNeighbors(c) => (&c.jobs, &mut c.record),
            Calculation::DistanceMatrix(c) => (&c.jobs, &mut c.record),
            Calculation::Tree(c) => (&c.jobs, &mut c.record),
        }
    }

    /// Persist the `init` record; returns the job id.
    pub async fn save(&mut self) -> Result<String, CalcError> {
        let (jobs, record) = self.parts();
        jobs.insert(record).await
    }

    async fn compute(&self) -> Result<Value, CalcError> {
        match self {
            Calculation::NearestNeighbors(c) => Ok(serde_json::to_value(c.calculate().await?)?),
            Calculation::DistanceMatrix(c) => c.calculate().await,
            Calculation::Tree(c) => Ok(Value::String(c.calculate().await?)),
        }
    }

    /// Compute and record the outcome. A computation fault ends the job in `error` with the
    /// fault's message; only a failure to write the terminal state is returned as `Err`.
    pub async fn run(mut self) -> Result<JobRecord, CalcError> {
        let id = self.record().id()?.to_string();
        let kind = self.record().kind.tag();
        let started = Instant::now();
        let outcome = self.compute().await;
        let (jobs, record) = self.parts();
        match outcome {
            Ok(result) => {
                record.complete(result)?;
                tracing::info!(
                    job_id = %id,
                    kind = %kind,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "job completed"
                );
            }
            Err(err) => {
                match err.fault_kind() {
                    FaultKind::Tool | FaultKind::Environment => tracing::error!(
                        job_id = %id,
                        kind = %kind,
                        error = %err,
                        "job failed"
                    ),
                    fault => tracing::warn!(
                        job_id = %id,
                        kind = %kind,
                        fault = ?fault,
                        error = %err,
                        "job failed"
                    ),
                }
                record.fail(err.to_string())?;
            }
        }
        jobs.write_terminal(record).await?;
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkageInput;
    use crate::matrix::{DistanceMatrix, ALLELE_MATRIX_FILE, DISTANCE_MATRIX_FILE};
    use crate::test_support::{engine, seed, SAMPLE_IDS};
    use async_trait::async_trait;
    use bio_dists::NativeDistances;
    use bio_types::{
        DistanceMatrixRequest, DistanceTool, DistanceToolError, JobKindTag, JobStatus,
        LinkageMethod, NearestNeighborsRequest, TreeRequest,
    };
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    struct BrokenTool;

    #[async_trait]
    impl DistanceTool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }

        async fn run(&self, allele_matrix: &Path) -> Result<String, DistanceToolError> {
            Err(DistanceToolError::Failed {
                tool: "broken".to_string(),
                path: allele_matrix.to_path_buf(),
                code: Some(2),
                stderr: "segfault in allele parser".to_string(),
            })
        }
    }

    fn dmx_request(ids: Option<Vec<&str>>) -> DistanceMatrixRequest {
        DistanceMatrixRequest {
            seq_collection: None,
            seqid_field_path: "sample_id".to_string(),
            profile_field_path: None,
            seq_ids: ids.map(|v| v.into_iter().map(String::from).collect()),
        }
    }

    async fn run_dmx(
        jobs: &JobStore,
        config: &crate::EngineConfig,
        tool: Arc<dyn DistanceTool>,
        ids: Option<Vec<&str>>,
    ) -> JobRecord {
        let mut calc: Calculation =
            DistanceCalculation::new(jobs.clone(), tool, config, dmx_request(ids)).into();
        calc.save().await.unwrap();
        calc.run().await.unwrap()
    }

    fn tempdir_config() -> (tempfile::TempDir, JobStore, crate::EngineConfig) {
        let dir = tempfile::tempdir().unwrap();
        let (jobs, mut config) = engine();
        config.dmx_dir = dir.path().join("dmx");
        (dir, jobs, config)
    }

    #[tokio::test]
    async fn nearest_neighbors_job_completes_with_sorted_hits() {
        let (jobs, config) = engine();
        seed(&jobs).await;
        let mut nn = NearestNeighbors::new(
            jobs.clone(),
            &config,
            NearestNeighborsRequest {
                input_id: SAMPLE_IDS[0].to_string(),
                filtering: BTreeMap::new(),
                cutoff: 2,
                unknowns_are_diffs: true,
            },
        );
        nn.resolve_reference().await.unwrap();
        let mut calc = Calculation::from(nn);
        let id = calc.save().await.unwrap();
        assert_eq!(
            jobs.require(JobKindTag::NearestNeighbors, &id).await.unwrap().status,
            JobStatus::Init
        );

        let done = calc.run().await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        let stored = jobs.require(JobKindTag::NearestNeighbors, &id).await.unwrap();
        assert_eq!(stored, done);
        let hits = stored.neighbors().unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.windows(2).all(|w| w[0].diff_count <= w[1].diff_count));
    }

    #[tokio::test]
    async fn distance_matrix_job_writes_artifacts_and_trace() {
        let (_dir, jobs, config) = tempdir_config();
        seed(&jobs).await;
        let done = run_dmx(
            &jobs,
            &config,
            Arc::new(NativeDistances::new()),
            Some(vec![SAMPLE_IDS[0], SAMPLE_IDS[1], SAMPLE_IDS[3]]),
        )
        .await;
        assert_eq!(done.status, JobStatus::Completed, "{:?}", done.result);

        let trace = done.trace_map().unwrap();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace["s1"], SAMPLE_IDS[1]);

        let folder: PathBuf = config.dmx_dir.join(done.id().unwrap());
        let tsv = std::fs::read_to_string(folder.join(ALLELE_MATRIX_FILE)).unwrap();
        assert!(tsv.starts_with("ID\t"));
        let matrix = DistanceMatrix::load(&folder.join(DISTANCE_MATRIX_FILE)).await.unwrap();
        assert_eq!(matrix.ids, ["s0", "s1", "s3"]);
        assert!(matrix.is_square());
        assert_eq!(matrix.distance("s0", "s1"), Some(1.0));
        // Native distances skip missing calls: only L2 differs between s0 and s3.
        assert_eq!(matrix.distance("s0", "s3"), Some(1.0));
        assert_eq!(matrix.distance("s1", "s3"), Some(2.0));
    }

    #[tokio::test]
    async fn all_profiled_records_are_used_without_an_id_list() {
        let (_dir, jobs, config) = tempdir_config();
        seed(&jobs).await;
        let done = run_dmx(&jobs, &config, Arc::new(NativeDistances::new()), None).await;
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.trace_map().unwrap().len(), 5);

        let folder = config.dmx_dir.join(done.id().unwrap());
        let matrix = DistanceMatrix::load(&folder.join(DISTANCE_MATRIX_FILE)).await.unwrap();
        assert_eq!(matrix.len(), 5);
        assert!(matrix.is_square());
        assert!(matrix.is_symmetric());
        assert!((0..5).all(|i| matrix.distances[i][i] == 0.0));
    }

    #[tokio::test]
    async fn missing_sequence_id_field_names_record_and_path() {
        let (_dir, jobs, config) = tempdir_config();
        seed(&jobs).await;
        let mut request = dmx_request(Some(vec![SAMPLE_IDS[0]]));
        request.seqid_field_path = "meta.name".to_string();
        let mut calc: Calculation = DistanceCalculation::new(
            jobs.clone(),
            Arc::new(NativeDistances::new()),
            &config,
            request,
        )
        .into();
        calc.save().await.unwrap();
        let done = calc.run().await.unwrap();
        assert_eq!(done.status, JobStatus::Error);
        let message = done.error_message().unwrap();
        assert!(message.contains(SAMPLE_IDS[0]), "{message}");
        assert!(message.contains("'meta'"), "{message}");
    }

    #[tokio::test]
    async fn count_mismatch_ends_in_error() {
        let (_dir, jobs, config) = tempdir_config();
        seed(&jobs).await;
        let done = run_dmx(
            &jobs,
            &config,
            Arc::new(NativeDistances::new()),
            Some(vec![SAMPLE_IDS[0], SAMPLE_IDS[5]]),
        )
        .await;
        assert_eq!(done.status, JobStatus::Error);
        let message = done.error_message().unwrap();
        assert!(message.contains('2') && message.contains('1'), "{message}");
    }

    #[tokio::test]
    async fn tool_failure_is_recorded_not_raised() {
        let (_dir, jobs, config) = tempdir_config();
        seed(&jobs).await;
        let done = run_dmx(&jobs, &config, Arc::new(BrokenTool), None).await;
        assert_eq!(done.status, JobStatus::Error);
        let message = done.error_message().unwrap();
        assert!(message.contains("could not run broken"), "{message}");
        assert!(message.contains("segfault in allele parser"), "{message}");
        assert!(done.finished_at.is_some());
    }

    #[tokio::test]
    async fn tree_over_completed_matrix_is_newick() {
        let (_dir, jobs, config) = tempdir_config();
        seed(&jobs).await;
        let dmx = run_dmx(&jobs, &config, Arc::new(NativeDistances::new()), None).await;
        let source = dmx.id().unwrap().to_string();

        for method in LinkageMethod::ALL {
            let mut calc: Calculation = TreeCalculation::new(
                jobs.clone(),
                &config,
                TreeRequest {
                    source_job_id: source.clone(),
                    method,
                },
            )
            .into();
            calc.save().await.unwrap();
            let done = calc.run().await.unwrap();
            assert_eq!(done.status, JobStatus::Completed, "{method}: {:?}", done.result);
            let newick = done.newick().unwrap();
            assert!(newick.ends_with(");"));
            for seq in ["s0", "s1", "s2", "s3", "s4"] {
                assert_eq!(newick.matches(&format!("{seq}:")).count(), 1);
            }
        }
    }

    #[tokio::test]
    async fn tree_over_failed_matrix_ends_in_error() {
        let (_dir, jobs, config) = tempdir_config();
        seed(&jobs).await;
        let dmx = run_dmx(&jobs, &config, Arc::new(BrokenTool), None).await;
        let mut calc: Calculation = TreeCalculation::new(
            jobs.clone(),
            &config,
            TreeRequest {
                source_job_id: dmx.id().unwrap().to_string(),
                method: LinkageMethod::Average,
            },
        )
        .into();
        calc.save().await.unwrap();
        let done = calc.run().await.unwrap();
        assert_eq!(done.status, JobStatus::Error);
        assert!(done.error_message().unwrap().contains("status 'error'"));
    }

    #[tokio::test]
    async fn malformed_candidate_filter_ends_in_error() {
        let (jobs, config) = engine();
        seed(&jobs).await;
        let mut nn = NearestNeighbors::new(
            jobs.clone(),
            &config,
            NearestNeighborsRequest {
                input_id: SAMPLE_IDS[0].to_string(),
                filtering: BTreeMap::from([("a..b".to_string(), json!("x"))]),
                cutoff: 2,
                unknowns_are_diffs: true,
            },
        );
        nn.resolve_reference().await.unwrap();
        let mut calc = Calculation::from(nn);
        let id = calc.save().await.unwrap();
        let done = calc.run().await.unwrap();
        assert_eq!(done.status, JobStatus::Error);
        assert!(done.error_message().unwrap().contains("malformed filter"), "{:?}", done.result);
        let stored = jobs.require(JobKindTag::NearestNeighbors, &id).await.unwrap();
        assert_eq!(stored, done);
    }

    #[tokio::test]
    async fn tree_over_single_sequence_matrix_ends_in_error() {
        let (_dir, jobs, config) = tempdir_config();
        seed(&jobs).await;
        let dmx = run_dmx(
            &jobs,
            &config,
            Arc::new(NativeDistances::new()),
            Some(vec![SAMPLE_IDS[0]]),
        )
        .await;
        assert_eq!(dmx.status, JobStatus::Completed, "{:?}", dmx.result);

        let mut calc: Calculation = TreeCalculation::new(
            jobs.clone(),
            &config,
            TreeRequest {
                source_job_id: dmx.id().unwrap().to_string(),
                method: LinkageMethod::Single,
            },
        )
        .into();
        let id = calc.save().await.unwrap();
        let done = calc.run().await.unwrap();
        assert_eq!(done.status, JobStatus::Error);
        let message = done.error_message().unwrap();
        assert!(message.contains("at least two observations"), "{message}");
        let stored = jobs.require(JobKindTag::Tree, &id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Error);
        assert!(stored.finished_at.is_some());
    }

    #[tokio::test]
    async fn linkage_input_decides_branch_lengths() {
        let (_dir, jobs, mut config) = tempdir_config();
        seed(&jobs).await;
        let dmx = run_dmx(
            &jobs,
            &config,
            Arc::new(NativeDistances::new()),
            Some(vec![SAMPLE_IDS[0], SAMPLE_IDS[1], SAMPLE_IDS[4]]),
        )
        .await;
        let source = dmx.id().unwrap().to_string();

        // Pairwise s0/s1 = 1, s0/s4 = s1/s4 = 4.
        for (input, expected) in [
            (LinkageInput::Observations, "((s1:1.41,s0:1.41):4.99,s4:6.40);"),
            (LinkageInput::Precomputed, "((s1:1.00,s0:1.00):3.00,s4:4.00);"),
        ] {
            config.linkage_input = input;
            let mut calc: Calculation = TreeCalculation::new(
                jobs.clone(),
                &config,
                TreeRequest {
                    source_job_id: source.clone(),
                    method: LinkageMethod::Single,
                },
            )
            .into();
            calc.save().await.unwrap();
            let done = calc.run().await.unwrap();
            assert_eq!(done.newick(), Some(expected), "{input:?}");
        }
    }

    #[tokio::test]
    async fn unsaved_calculation_cannot_run() {
        let (jobs, config) = engine();
        let calc: Calculation = TreeCalculation::new(
            jobs,
            &config,
            TreeRequest {
                source_job_id: SAMPLE_IDS[0].to_string(),
                method: LinkageMethod::Single,
            },
        )
        .into();
        assert!(matches!(
            calc.run().await,
            Err(CalcError::Job(bio_types::JobError::NotPersisted))
        ));
    }
}
