//! Engine configuration, read from the environment.

use crate::differ::ProfileRepresentation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Whether a nearest neighbor at exactly `cutoff` differences is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutoffBoundary {
    /// `diff_count < cutoff`.
    #[default]
    Exclusive,
    /// `diff_count <= cutoff`.
    Inclusive,
}

impl CutoffBoundary {
    pub fn admits(self, diff_count: u32, cutoff: u32) -> bool {
        match self {
            CutoffBoundary::Exclusive => diff_count < cutoff,
            CutoffBoundary::Inclusive => diff_count <= cutoff,
        }
    }
}

/// How a tree job reads the stored distance matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkageInput {
    /// Each matrix row is an observation vector; clustering runs on the Euclidean distances
    /// between rows. Branch lengths match trees built by the cgMLST reference pipeline.
    #[default]
    Observations,
    /// The matrix entries are used as pairwise distances directly.
    Precomputed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of the per-job distance-matrix folders.
    pub dmx_dir: PathBuf,
    /// Distance tool program, or `native` for the in-process implementation.
    pub distance_tool: String,
    /// Collection holding sequence records.
    pub seq_collection: String,
    /// Dotted path of the allele profile inside a sequence record.
    pub profile_field_path: String,
    /// Dotted path of the cgMLST schema digest; neighbors must share the input's digest.
    pub digest_field_path: Option<String>,
    pub cutoff_boundary: CutoffBoundary,
    pub profile_representation: ProfileRepresentation,
    pub linkage_input: LinkageInput,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dmx_dir: PathBuf::from("/dmx_data"),
            distance_tool: "cgmlst-dists".to_string(),
            seq_collection: "samples".to_string(),
            profile_field_path: "categories.cgmlst.report.alleles".to_string(),
            digest_field_path: None,
            cutoff_boundary: CutoffBoundary::Exclusive,
            profile_representation: ProfileRepresentation::IntegerCoded,
            linkage_input: LinkageInput::Observations,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `DMX_DIR`, `DISTANCE_TOOL`, `BIO_API_SEQ_COLLECTION`,
    /// `BIO_API_PROFILE_PATH`, `BIO_API_DIGEST_PATH`, `BIO_API_CUTOFF_BOUNDARY`,
    /// `BIO_API_LINKAGE_INPUT` and `BIO_API_NO_CALLS` (comma-separated sentinel tokens).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(v) = lookup("DMX_DIR") {
            config.dmx_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DISTANCE_TOOL") {
            config.distance_tool = v;
        }
        if let Some(v) = lookup("BIO_API_SEQ_COLLECTION") {
            config.seq_collection = v;
        }
        if let Some(v) = lookup("BIO_API_PROFILE_PATH") {
            config.profile_field_path = v;
        }
        config.digest_field_path = lookup("BIO_API_DIGEST_PATH").filter(|v| !v.is_empty());
        match lookup("BIO_API_CUTOFF_BOUNDARY").as_deref().map(str::trim) {
            Some("inclusive") => config.cutoff_boundary = CutoffBoundary::Inclusive,
            Some("exclusive") | None => {}
            Some(other) => {
                tracing::warn!(value = other, "unknown BIO_API_CUTOFF_BOUNDARY, using exclusive")
            }
        }
        match lookup("BIO_API_LINKAGE_INPUT").as_deref().map(str::trim) {
            Some("precomputed") => config.linkage_input = LinkageInput::Precomputed,
            Some("observations") | None => {}
            Some(other) => {
                tracing::warn!(value = other, "unknown BIO_API_LINKAGE_INPUT, using observations")
            }
        }
        if let Some(v) = lookup("BIO_API_NO_CALLS") {
            let tokens: BTreeSet<String> = v
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if !tokens.is_empty() {
                config.profile_representation = ProfileRepresentation::NoCallSentinels { tokens };
            }
        }
        config
    }
}
