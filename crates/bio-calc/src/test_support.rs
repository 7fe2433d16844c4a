use crate::config::EngineConfig;
use crate::jobs::JobStore;
use bio_store::InMemoryDocumentStore;
use serde_json::json;
use std::sync::Arc;

pub(crate) const SAMPLE_IDS: [&str; 6] = [
    "00000000-0000-4000-8000-000000000000",
    "00000000-0000-4000-8000-000000000001",
    "00000000-0000-4000-8000-000000000002",
    "00000000-0000-4000-8000-000000000003",
    "00000000-0000-4000-8000-000000000004",
    "00000000-0000-4000-8000-000000000005",
];

pub(crate) fn engine() -> (JobStore, EngineConfig) {
    (
        JobStore::new(Arc::new(InMemoryDocumentStore::new())),
        EngineConfig::default(),
    )
}

/// s0 is the usual input. Against it: s1 differs at one locus, s2 is identical, s3 has one
/// changed and one unknown allele plus another schema digest, s4 differs everywhere and
/// s5 has no profile.
pub(crate) async fn seed(jobs: &JobStore) {
    let samples = [
        ("s0", "salmonella", "d1", Some(json!({"L1": "1", "L2": "2", "L3": "3", "L4": "4"}))),
        ("s1", "salmonella", "d1", Some(json!({"L1": "1", "L2": "2", "L3": "3", "L4": "5"}))),
        ("s2", "ecoli", "d1", Some(json!({"L1": "1", "L2": "2", "L3": "3", "L4": "4"}))),
        ("s3", "ecoli", "d2", Some(json!({"L1": "1", "L2": "9", "L3": "N", "L4": "4"}))),
        ("s4", "ecoli", "d1", Some(json!({"L1": "7", "L2": "8", "L3": "9", "L4": "10"}))),
        ("s5", "ecoli", "d1", None),
    ];
    for (i, (name, species, digest, alleles)) in samples.into_iter().enumerate() {
        let mut report = json!({"schema_digest": digest});
        if let Some(alleles) = alleles {
            report["alleles"] = alleles;
        }
        let doc = json!({
            "_id": SAMPLE_IDS[i],
            "sample_id": name,
            "species": species,
            "categories": {"cgmlst": {"report": report}},
        });
        jobs.documents()
            .insert("samples", doc.as_object().cloned().unwrap())
            .await
            .unwrap();
    }
}
