//! Task scheduler: each submitted job runs on its own tokio task; job state lives in the store.

use crate::{Scheduler, SchedulerError};
use async_trait::async_trait;
use bio_calc::{
    Calculation, DistanceCalculation, DistanceMatrix, EngineConfig, JobStore, NearestNeighbors,
    TreeCalculation, DISTANCE_MATRIX_FILE,
};
use bio_types::{
    DistanceMatrixRequest, DistanceTool, DocumentStore, JobKindTag, JobRecord, JobStatus,
    JobTicket, NearestNeighborsRequest, TreeRequest,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub struct TaskScheduler {
    jobs: JobStore,
    tool: Arc<dyn DistanceTool>,
    config: EngineConfig,
    tasks: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl TaskScheduler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        tool: Arc<dyn DistanceTool>,
        config: EngineConfig,
    ) -> Self {
        Self {
            jobs: JobStore::new(store),
            tool,
            config,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Persist the `init` record, then start the computation in the background.
    async fn launch(&self, mut calc: Calculation) -> Result<JobTicket, SchedulerError> {
        let job_id = calc.save().await?;
        let ticket = JobTicket::for_record(calc.record())
            .ok_or_else(|| SchedulerError::Other("saved job has no id".to_string()))?;
        let kind = calc.record().kind.tag();

        let mut tasks = self.tasks.lock().await;
        tasks.retain(|_, handle| !handle.is_finished());
        let task_id = job_id.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = calc.run().await {
                tracing::error!(job_id = %task_id, error = %e, "could not record job outcome");
            }
        });
        tasks.insert(job_id.clone(), handle);
        tracing::info!(job_id = %job_id, kind = %kind, "job submitted");
        Ok(ticket)
    }

    /// Wait for the background task of `job_id`, if it is still tracked.
    pub async fn wait(&self, job_id: &str) -> Result<(), SchedulerError> {
        let handle = self.tasks.lock().await.remove(job_id);
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| SchedulerError::Other(format!("job task {job_id}: {e}")))?;
        }
        Ok(())
    }

    /// Ids of jobs whose background task has not finished, sorted.
    pub async fn outstanding(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .tasks
            .lock()
            .await
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl Scheduler for TaskScheduler {
    async fn submit_nearest_neighbors(
        &self,
        req: NearestNeighborsRequest,
    ) -> Result<JobTicket, SchedulerError> {
        let mut nn = NearestNeighbors::new(self.jobs.clone(), &self.config, req);
        nn.resolve_reference().await?;
        self.launch(nn.into()).await
    }

    async fn submit_distance_matrix(
        &self,
        req: DistanceMatrixRequest,
    ) -> Result<JobTicket, SchedulerError> {
        if req.seqid_field_path.trim().is_empty() {
            return Err(SchedulerError::BadRequest(
                "seqid_field_path must not be empty".to_string(),
            ));
        }
        let calc = DistanceCalculation::new(
            self.jobs.clone(),
            Arc::clone(&self.tool),
            &self.config,
            req,
        );
        self.launch(calc.into()).await
    }

    async fn submit_tree(&self, req: TreeRequest) -> Result<JobTicket, SchedulerError> {
        let tree = TreeCalculation::new(self.jobs.clone(), &self.config, req);
        tree.check_source().await?;
        self.launch(tree.into()).await
    }

    async fn get_job(
        &self,
        kind: JobKindTag,
        job_id: &str,
    ) -> Result<Option<JobRecord>, SchedulerError> {
        Ok(self.jobs.load(kind, job_id).await?)
    }

    async fn distance_matrix(
        &self,
        job_id: &str,
    ) -> Result<Option<DistanceMatrix>, SchedulerError> {
        let record = match self.jobs.load(JobKindTag::DistanceMatrix, job_id).await? {
            Some(r) => r,
            None => return Ok(None),
        };
        if record.status != JobStatus::Completed {
            return Err(SchedulerError::SourceNotReady(format!(
                "distance matrix job {job_id} has status '{}'",
                record.status
            )));
        }
        let id = record
            .id
            .as_deref()
            .ok_or_else(|| SchedulerError::Other("stored job has no id".to_string()))?;
        let path =
            DistanceCalculation::folder_for(&self.config.dmx_dir, id).join(DISTANCE_MATRIX_FILE);
        Ok(Some(DistanceMatrix::load(&path).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bio_dists::NativeDistances;
    use bio_store::InMemoryDocumentStore;
    use bio_types::LinkageMethod;
    use serde_json::json;
    use std::collections::BTreeMap;

    const IDS: [&str; 3] = [
        "11111111-1111-4111-8111-000000000001",
        "11111111-1111-4111-8111-000000000002",
        "11111111-1111-4111-8111-000000000003",
    ];

    async fn scheduler(dir: &tempfile::TempDir) -> TaskScheduler {
        let store = Arc::new(InMemoryDocumentStore::new());
        let profiles = [
            json!({"a": "1", "b": "1", "c": "1"}),
            json!({"a": "1", "b": "2", "c": "1"}),
            json!({"a": "3", "b": "2", "c": "2"}),
        ];
        for (i, alleles) in profiles.into_iter().enumerate() {
            let doc = json!({
                "_id": IDS[i],
                "name": format!("seq{i}"),
                "categories": {"cgmlst": {"report": {"alleles": alleles}}},
            });
            store
                .insert("samples", doc.as_object().cloned().unwrap())
                .await
                .unwrap();
        }
        let config = EngineConfig {
            dmx_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        TaskScheduler::new(store, Arc::new(NativeDistances::new()), config)
    }

    #[tokio::test]
    async fn submitted_job_starts_in_init_and_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir).await;
        let ticket = s
            .submit_nearest_neighbors(NearestNeighborsRequest {
                input_id: IDS[0].to_string(),
                filtering: BTreeMap::new(),
                cutoff: 2,
                unknowns_are_diffs: true,
            })
            .await
            .unwrap();
        assert_eq!(ticket.status, JobStatus::Init);
        s.wait(&ticket.job_id).await.unwrap();
        assert!(!s.outstanding().await.contains(&ticket.job_id));

        let record = s
            .get_job(JobKindTag::NearestNeighbors, &ticket.job_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        let hits = record.neighbors().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, IDS[1]);
    }

    #[tokio::test]
    async fn distance_matrix_then_tree() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir).await;
        let dmx = s
            .submit_distance_matrix(DistanceMatrixRequest {
                seq_collection: None,
                seqid_field_path: "name".to_string(),
                profile_field_path: None,
                seq_ids: None,
            })
            .await
            .unwrap();

        let early = s
            .submit_tree(TreeRequest {
                source_job_id: dmx.job_id.clone(),
                method: LinkageMethod::Single,
            })
            .await;
        // The source may already be done on a fast runtime; either way nothing panics.
        if let Err(e) = early {
            assert!(matches!(e, SchedulerError::SourceNotReady(_)), "{e}");
        }

        s.wait(&dmx.job_id).await.unwrap();
        let matrix = s.distance_matrix(&dmx.job_id).await.unwrap().unwrap();
        assert_eq!(matrix.ids, ["seq0", "seq1", "seq2"]);
        assert_eq!(matrix.distance("seq0", "seq2"), Some(3.0));

        let tree = s
            .submit_tree(TreeRequest {
                source_job_id: dmx.job_id.clone(),
                method: LinkageMethod::Single,
            })
            .await
            .unwrap();
        s.wait(&tree.job_id).await.unwrap();
        let record = s.get_job(JobKindTag::Tree, &tree.job_id).await.unwrap().unwrap();
        // Rows (0,1,3), (1,0,2), (3,2,0): sqrt(3) apart for seq0/seq1, sqrt(12) to seq2.
        assert_eq!(record.newick(), Some("((seq1:1.73,seq0:1.73):1.73,seq2:3.46);"));
    }

    #[tokio::test]
    async fn submission_faults_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let s = scheduler(&dir).await;
        let missing = s
            .submit_tree(TreeRequest {
                source_job_id: "22222222-2222-4222-8222-222222222222".to_string(),
                method: LinkageMethod::Ward,
            })
            .await;
        assert!(matches!(missing, Err(SchedulerError::NotFound(_))));

        let invalid = s
            .submit_nearest_neighbors(NearestNeighborsRequest {
                input_id: "nope".to_string(),
                filtering: BTreeMap::new(),
                cutoff: 1,
                unknowns_are_diffs: false,
            })
            .await;
        assert!(matches!(invalid, Err(SchedulerError::BadRequest(_))));

        assert!(s
            .get_job(JobKindTag::Tree, "22222222-2222-4222-8222-222222222222")
            .await
            .unwrap()
            .is_none());
    }
}
