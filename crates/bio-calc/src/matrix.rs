//! Allele matrix (tool input) and distance matrix (tool output and persisted artifact).

use crate::error::CalcError;
use bio_types::{value_as_text, Document, DistanceToolError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub const ALLELE_MATRIX_FILE: &str = "allele_matrix.tsv";
pub const DISTANCE_MATRIX_FILE: &str = "distance_matrix.json";
/// First header cell of the allele matrix.
pub const INDEX_PLACEHOLDER: &str = "ID";
/// Label the tool's index header is rewritten to.
pub const INDEX_LABEL: &str = "ids";

/// Sequences by loci. Columns are the union of all loci in first-appearance order;
/// a sequence without a locus gets an empty cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlleleMatrix {
    loci: Vec<String>,
    seen_loci: HashSet<String>,
    rows: Vec<(String, HashMap<String, String>)>,
    seen_ids: HashSet<String>,
}

impl AlleleMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, seq_id: &str, profile: &Document) -> Result<(), CalcError> {
        if !self.seen_ids.insert(seq_id.to_string()) {
            return Err(CalcError::MissingData(format!(
                "sequence id '{seq_id}' occurs more than once"
            )));
        }
        let mut row = HashMap::with_capacity(profile.len());
        for (locus, allele) in profile {
            if self.seen_loci.insert(locus.clone()) {
                self.loci.push(locus.clone());
            }
            row.insert(locus.clone(), value_as_text(allele));
        }
        self.rows.push((seq_id.to_string(), row));
        Ok(())
    }

    pub fn loci(&self) -> &[String] {
        &self.loci
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_tsv(&self) -> Result<String, CalcError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());
        let mut header = Vec::with_capacity(self.loci.len() + 1);
        header.push(INDEX_PLACEHOLDER);
        header.extend(self.loci.iter().map(String::as_str));
        writer.write_record(&header)?;
        for (id, row) in &self.rows {
            let mut record = Vec::with_capacity(header.len());
            record.push(id.as_str());
            record.extend(
                self.loci
                    .iter()
                    .map(|l| row.get(l).map(String::as_str).unwrap_or("")),
            );
            writer.write_record(&record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| CalcError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| CalcError::MissingData(e.to_string()))
    }

    pub async fn write(&self, path: &Path) -> Result<(), CalcError> {
        tokio::fs::write(path, self.to_tsv()?).await?;
        Ok(())
    }
}

/// Square pairwise distance matrix; row and column order both follow `ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    pub ids: Vec<String>,
    pub distances: Vec<Vec<f64>>,
}

fn invalid(msg: String) -> CalcError {
    CalcError::Tool(DistanceToolError::InvalidOutput(msg))
}

impl DistanceMatrix {
    /// Parse tab-separated tool output. The first header cell is the tool's index label;
    /// rows are reordered to follow the column order.
    pub fn from_tool_output(output: &str) -> Result<Self, CalcError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(output.as_bytes());
        let mut header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if header.is_empty() {
            return Err(invalid("empty header".to_string()));
        }
        header[0] = INDEX_LABEL.to_string();
        let ids: Vec<String> = header[1..].to_vec();

        let mut rows: HashMap<String, Vec<f64>> = HashMap::with_capacity(ids.len());
        for record in reader.records() {
            let record = record?;
            let mut cells = record.iter();
            let id = cells.next().unwrap_or_default().to_string();
            let values = cells
                .map(|c| {
                    c.trim()
                        .parse::<f64>()
                        .map_err(|_| invalid(format!("row '{id}' has non-numeric cell '{c}'")))
                })
                .collect::<Result<Vec<f64>, CalcError>>()?;
            if rows.insert(id.clone(), values).is_some() {
                return Err(invalid(format!("row '{id}' appears twice")));
            }
        }
        if rows.len() != ids.len() {
            return Err(invalid(format!(
                "{} rows for {} columns",
                rows.len(),
                ids.len()
            )));
        }
        let distances = ids
            .iter()
            .map(|id| {
                rows.remove(id)
                    .ok_or_else(|| invalid(format!("no row for column '{id}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ids, distances })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|i| i == id)
    }

    pub fn distance(&self, a: &str, b: &str) -> Option<f64> {
        let (i, j) = (self.index_of(a)?, self.index_of(b)?);
        self.distances.get(i)?.get(j).copied()
    }

    pub fn is_square(&self) -> bool {
        self.distances.len() == self.ids.len()
            && self.distances.iter().all(|r| r.len() == self.ids.len())
    }

    pub fn is_symmetric(&self) -> bool {
        self.is_square()
            && (0..self.len()).all(|i| (0..i).all(|j| self.distances[i][j] == self.distances[j][i]))
    }

    pub async fn save(&self, path: &Path) -> Result<(), CalcError> {
        tokio::fs::write(path, serde_json::to_vec(self)?).await?;
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self, CalcError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile(v: serde_json::Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn allele_matrix_unions_loci_in_first_appearance_order() {
        let mut m = AlleleMatrix::new();
        m.push("s1", &profile(json!({"a": "2", "b": "1"}))).unwrap();
        m.push("s2", &profile(json!({"a": "2", "c": 5}))).unwrap();
        assert_eq!(m.loci(), ["a", "b", "c"]);
        assert_eq!(m.to_tsv().unwrap(), "ID\ta\tb\tc\ns1\t2\t1\t\ns2\t2\t\t5\n");
    }

    #[test]
    fn allele_matrix_rejects_duplicate_ids() {
        let mut m = AlleleMatrix::new();
        m.push("s1", &Document::new()).unwrap();
        assert!(m.push("s1", &Document::new()).is_err());
    }

    #[test]
    fn tool_output_is_reordered_to_column_order() {
        let out = "cgmlst-dists\ts1\ts2\ts3\ns2\t1\t0\t3\ns1\t0\t1\t2\ns3\t2\t3\t0\n";
        let m = DistanceMatrix::from_tool_output(out).unwrap();
        assert_eq!(m.ids, ["s1", "s2", "s3"]);
        assert_eq!(m.distances[0], [0.0, 1.0, 2.0]);
        assert_eq!(m.distances[1], [1.0, 0.0, 3.0]);
        assert!(m.is_square());
        assert_eq!(m.distance("s3", "s1"), Some(2.0));
    }

    #[test]
    fn tool_output_with_missing_row_is_invalid() {
        let out = "cgmlst-dists\ts1\ts2\ns1\t0\t1\n";
        assert!(matches!(
            DistanceMatrix::from_tool_output(out),
            Err(CalcError::Tool(DistanceToolError::InvalidOutput(_)))
        ));
    }

    #[tokio::test]
    async fn saved_matrix_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DISTANCE_MATRIX_FILE);
        let m = DistanceMatrix {
            ids: vec!["a".into(), "b".into()],
            distances: vec![vec![0.0, 4.0], vec![4.0, 0.0]],
        };
        m.save(&path).await.unwrap();
        assert_eq!(DistanceMatrix::load(&path).await.unwrap(), m);
    }
}
