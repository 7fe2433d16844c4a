//! Subprocess client for the `cgmlst-dists` binary.

use bio_types::{DistanceTool, DistanceToolError};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Runs `<program> <allele-matrix-path>` and returns its stdout.
///
/// The process is awaited without a timeout. A non-zero exit is returned as
/// [`DistanceToolError::Failed`] carrying the captured stderr.
pub struct CgmlstDists {
    program: PathBuf,
}

impl CgmlstDists {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CgmlstDists {
    fn default() -> Self {
        Self::new("cgmlst-dists")
    }
}

#[async_trait::async_trait]
impl DistanceTool for CgmlstDists {
    fn name(&self) -> &str {
        self.program.to_str().unwrap_or("cgmlst-dists")
    }

    async fn run(&self, allele_matrix: &Path) -> Result<String, DistanceToolError> {
        tracing::debug!(tool = %self.program.display(), input = %allele_matrix.display(), "running distance tool");
        let output = Command::new(&self.program)
            .arg(allele_matrix)
            .output()
            .await
            .map_err(|e| DistanceToolError::Spawn {
                tool: self.name().to_string(),
                source: e,
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::warn!(
                tool = %self.program.display(),
                code = ?output.status.code(),
                "distance tool failed"
            );
            return Err(DistanceToolError::Failed {
                tool: self.name().to_string(),
                path: allele_matrix.to_path_buf(),
                code: output.status.code(),
                stderr,
            });
        }
        String::from_utf8(output.stdout)
            .map_err(|e| DistanceToolError::InvalidOutput(e.to_string()))
    }
}
