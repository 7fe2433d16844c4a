//! Calculation engine: the job state machine driver and the three calculations built on it.

mod calculation;
mod config;
mod differ;
mod distance;
mod error;
mod jobs;
mod linkage;
mod matrix;
mod neighbors;
mod newick;
mod tree;

pub use calculation::Calculation;
pub use config::{CutoffBoundary, EngineConfig, LinkageInput};
pub use differ::{diff_count, integer_allele, ProfileRepresentation};
pub use distance::DistanceCalculation;
pub use error::{CalcError, FaultKind};
pub use jobs::JobStore;
pub use linkage::{linkage, observation_distances, ClusterError, Merge};
pub use matrix::{
    AlleleMatrix, DistanceMatrix, ALLELE_MATRIX_FILE, DISTANCE_MATRIX_FILE, INDEX_LABEL,
    INDEX_PLACEHOLDER,
};
pub use neighbors::NearestNeighbors;
pub use newick::to_newick;
pub use tree::TreeCalculation;

#[cfg(test)]
mod test_support;
