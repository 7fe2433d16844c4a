//! Nearest-neighbor search by allele-profile distance.

use crate::config::{CutoffBoundary, EngineConfig};
use crate::differ::{diff_count, profile_at, ProfileRepresentation};
use crate::error::CalcError;
use crate::jobs::JobStore;
use bio_types::{
    hoist, record_label, Document, Filter, JobKind, JobRecord, NearestNeighborsParams,
    NearestNeighborsRequest, Neighbor, Stage,
};

struct Reference {
    id: String,
    profile: Document,
}

pub struct NearestNeighbors {
    pub(crate) jobs: JobStore,
    pub(crate) record: JobRecord,
    params: NearestNeighborsParams,
    digest_field_path: Option<String>,
    boundary: CutoffBoundary,
    representation: ProfileRepresentation,
    reference: Option<Reference>,
}

impl NearestNeighbors {
    pub fn new(jobs: JobStore, config: &EngineConfig, request: NearestNeighborsRequest) -> Self {
        let params = NearestNeighborsParams {
            seq_collection: config.seq_collection.clone(),
            profile_field_path: config.profile_field_path.clone(),
            input_id: request.input_id,
            filtering: request.filtering,
            cutoff: request.cutoff,
            unknowns_are_diffs: request.unknowns_are_diffs,
        };
        Self {
            jobs,
            record: JobRecord::new(JobKind::NearestNeighbors(params.clone())),
            params,
            digest_field_path: config.digest_field_path.clone(),
            boundary: config.cutoff_boundary,
            representation: config.profile_representation.clone(),
            reference: None,
        }
    }

    pub fn record(&self) -> &JobRecord {
        &self.record
    }

    pub fn params(&self) -> &NearestNeighborsParams {
        &self.params
    }

    /// Load the input record's profile. When a schema digest path is configured the
    /// input's digest is added to the candidate filter, so neighbors share its schema.
    pub async fn resolve_reference(&mut self) -> Result<(), CalcError> {
        let p = &self.params;
        let mut paths = vec![p.profile_field_path.clone()];
        paths.extend(self.digest_field_path.clone());
        let found = self
            .jobs
            .documents()
            .find_projected(
                &p.seq_collection,
                &Filter::new().id_in(vec![p.input_id.clone()]),
                &paths,
            )
            .await?;
        let record = found.into_iter().next().ok_or_else(|| {
            CalcError::NoSuchSequence(format!(
                "could not find sequence {} in {}",
                p.input_id, p.seq_collection
            ))
        })?;
        let profile = profile_at(&record, &p.profile_field_path)?;
        if let Some(digest_path) = &self.digest_field_path {
            let digest = hoist(&record, digest_path)?.clone();
            self.params
                .filtering
                .entry(digest_path.clone())
                .or_insert(digest);
            self.record.kind = JobKind::NearestNeighbors(self.params.clone());
        }
        self.reference = Some(Reference {
            id: record_label(&record),
            profile,
        });
        Ok(())
    }

    /// Candidates passing the filter whose diff count is within the cutoff, closest first.
    /// Ties keep the store's order.
    pub async fn calculate(&self) -> Result<Vec<Neighbor>, CalcError> {
        let reference = self.reference.as_ref().ok_or(CalcError::Unresolved)?;
        let p = &self.params;
        let filter = Filter::from_equalities(&p.filtering)
            .exists(p.profile_field_path.clone())
            .id_ne(reference.id.clone());
        let pipeline = [
            Stage::Match(filter),
            Stage::Project {
                paths: vec![p.profile_field_path.clone()],
            },
        ];
        let candidates = self
            .jobs
            .documents()
            .aggregate(&p.seq_collection, &pipeline)
            .await?;

        let mut neighbors = Vec::new();
        for candidate in &candidates {
            let profile = profile_at(candidate, &p.profile_field_path)?;
            let count = diff_count(
                &reference.profile,
                &profile,
                p.unknowns_are_diffs,
                &self.representation,
            );
            if self.boundary.admits(count, p.cutoff) {
                neighbors.push(Neighbor {
                    id: record_label(candidate),
                    diff_count: count,
                });
            }
        }
        neighbors.sort_by_key(|n| n.diff_count);
        tracing::debug!(
            input = %reference.id,
            candidates = candidates.len(),
            hits = neighbors.len(),
            "nearest neighbors computed"
        );
        Ok(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{engine, seed, SAMPLE_IDS};
    use bio_types::StoreError;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn request(input: &str, cutoff: u32) -> NearestNeighborsRequest {
        NearestNeighborsRequest {
            input_id: input.to_string(),
            filtering: BTreeMap::new(),
            cutoff,
            unknowns_are_diffs: true,
        }
    }

    #[tokio::test]
    async fn finds_close_profiles_sorted_by_distance() {
        let (jobs, config) = engine();
        seed(&jobs).await;
        let mut nn = NearestNeighbors::new(jobs, &config, request(SAMPLE_IDS[0], 3));
        nn.resolve_reference().await.unwrap();
        let hits = nn.calculate().await.unwrap();
        assert_eq!(
            hits,
            vec![
                Neighbor { id: SAMPLE_IDS[2].to_string(), diff_count: 0 },
                Neighbor { id: SAMPLE_IDS[1].to_string(), diff_count: 1 },
                Neighbor { id: SAMPLE_IDS[3].to_string(), diff_count: 2 },
            ]
        );
        assert!(hits.iter().all(|n| n.id != SAMPLE_IDS[0]));
    }

    #[tokio::test]
    async fn cutoff_boundary_is_configurable() {
        let (jobs, mut config) = engine();
        seed(&jobs).await;
        let mut nn = NearestNeighbors::new(jobs.clone(), &config, request(SAMPLE_IDS[0], 2));
        nn.resolve_reference().await.unwrap();
        let exclusive = nn.calculate().await.unwrap();
        assert!(exclusive.iter().all(|n| n.diff_count < 2));
        assert_eq!(exclusive.len(), 2);

        config.cutoff_boundary = CutoffBoundary::Inclusive;
        let mut nn = NearestNeighbors::new(jobs, &config, request(SAMPLE_IDS[0], 2));
        nn.resolve_reference().await.unwrap();
        assert_eq!(nn.calculate().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn filtering_restricts_candidates() {
        let (jobs, config) = engine();
        seed(&jobs).await;
        let mut req = request(SAMPLE_IDS[0], 10);
        req.filtering.insert("species".to_string(), json!("salmonella"));
        let mut nn = NearestNeighbors::new(jobs, &config, req);
        nn.resolve_reference().await.unwrap();
        let ids: Vec<_> = nn.calculate().await.unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![SAMPLE_IDS[1].to_string()]);
    }

    #[tokio::test]
    async fn digest_constraint_is_added_to_filter() {
        let (jobs, mut config) = engine();
        config.digest_field_path = Some("categories.cgmlst.report.schema_digest".to_string());
        seed(&jobs).await;
        let mut nn = NearestNeighbors::new(jobs, &config, request(SAMPLE_IDS[0], 10));
        nn.resolve_reference().await.unwrap();
        assert_eq!(
            nn.params().filtering.get("categories.cgmlst.report.schema_digest"),
            Some(&json!("d1"))
        );
        let ids: Vec<_> = nn.calculate().await.unwrap().into_iter().map(|n| n.id).collect();
        assert!(!ids.contains(&SAMPLE_IDS[3].to_string()));
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn unknown_and_invalid_inputs_are_reference_faults() {
        let (jobs, config) = engine();
        seed(&jobs).await;
        let mut nn = NearestNeighbors::new(
            jobs.clone(),
            &config,
            request("00000000-0000-4000-8000-00000000ffff", 1),
        );
        assert!(matches!(
            nn.resolve_reference().await,
            Err(CalcError::NoSuchSequence(_))
        ));
        let mut nn = NearestNeighbors::new(jobs, &config, request("not-an-id", 1));
        assert!(matches!(
            nn.resolve_reference().await,
            Err(CalcError::Store(StoreError::InvalidId(_)))
        ));
    }

    #[tokio::test]
    async fn input_without_profile_is_missing_data() {
        let (jobs, config) = engine();
        seed(&jobs).await;
        let mut nn = NearestNeighbors::new(jobs, &config, request(SAMPLE_IDS[5], 1));
        let err = nn.resolve_reference().await.unwrap_err();
        assert_eq!(err.fault_kind(), crate::FaultKind::MissingData);
    }

    #[tokio::test]
    async fn calculate_requires_resolved_reference() {
        let (jobs, config) = engine();
        let nn = NearestNeighbors::new(jobs, &config, request(SAMPLE_IDS[0], 1));
        assert!(matches!(nn.calculate().await, Err(CalcError::Unresolved)));
    }
}
