//! In-process distance computation with cgmlst-dists counting rules.
//!
//! An allele is called when it parses as a positive integer; anything else (`LNF`, `-`,
//! empty, `0`) is missing. The distance between two rows is the number of loci where both
//! alleles are called and differ.

use crate::TOOL_INDEX_HEADER;
use bio_types::{DistanceTool, DistanceToolError};
use std::fmt::Write;
use std::path::Path;

/// Reads the allele matrix itself and emits output in the cgmlst-dists layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeDistances;

impl NativeDistances {
    pub fn new() -> Self {
        Self
    }
}

fn call(token: &str) -> u64 {
    token.trim().parse::<u64>().unwrap_or(0)
}

fn distance(a: &[u64], b: &[u64]) -> usize {
    a.iter()
        .zip(b.iter())
        .filter(|(x, y)| **x != 0 && **y != 0 && x != y)
        .count()
}

/// Compute the tool output for an allele matrix given as TSV text.
pub(crate) fn distances_from_tsv(tsv: &str) -> Result<String, DistanceToolError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(false)
        .from_reader(tsv.as_bytes());
    let loci = reader
        .headers()
        .map_err(|e| DistanceToolError::InvalidOutput(e.to_string()))?
        .len()
        .saturating_sub(1);

    let mut names = Vec::new();
    let mut rows: Vec<Vec<u64>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| DistanceToolError::InvalidOutput(e.to_string()))?;
        let mut fields = record.iter();
        let name = fields.next().unwrap_or_default().to_string();
        let calls: Vec<u64> = fields.map(call).collect();
        if calls.len() != loci {
            return Err(DistanceToolError::InvalidOutput(format!(
                "row {} has {} alleles, expected {}",
                name,
                calls.len(),
                loci
            )));
        }
        names.push(name);
        rows.push(calls);
    }

    let mut out = String::new();
    out.push_str(TOOL_INDEX_HEADER);
    for name in &names {
        let _ = write!(out, "\t{}", name);
    }
    out.push('\n');
    for (i, name) in names.iter().enumerate() {
        out.push_str(name);
        for j in 0..names.len() {
            let _ = write!(out, "\t{}", distance(&rows[i], &rows[j]));
        }
        out.push('\n');
    }
    Ok(out)
}

#[async_trait::async_trait]
impl DistanceTool for NativeDistances {
    fn name(&self) -> &str {
        "native"
    }

    async fn run(&self, allele_matrix: &Path) -> Result<String, DistanceToolError> {
        let tsv = tokio::fs::read_to_string(allele_matrix).await?;
        distances_from_tsv(&tsv)
    }
}
