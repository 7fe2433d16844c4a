//! Allele-profile differ.
//!
//! Only the reference profile's loci are compared; loci present only in the candidate are
//! ignored, so the count is not symmetric in general.

use crate::error::CalcError;
use bio_types::{hoist, record_label, Document};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// How unknown alleles are recognised.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProfileRepresentation {
    /// Alleles are integer codes; anything not integer-like is a no-call.
    #[default]
    IntegerCoded,
    /// Listed tokens are no-calls and never counted; other tokens compare by equality.
    NoCallSentinels { tokens: BTreeSet<String> },
}

/// Locus map at `path` of `record`.
pub(crate) fn profile_at(record: &Document, path: &str) -> Result<Document, CalcError> {
    match hoist(record, path)? {
        Value::Object(profile) => Ok(profile.clone()),
        other => Err(CalcError::MissingData(format!(
            "profile '{path}' of record {} is not a locus map but {other}",
            record_label(record)
        ))),
    }
}

/// Integer value of an allele token, if it has one.
pub fn integer_allele(token: &Value) -> Option<i64> {
    match token {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn token_text(token: &Value) -> Option<String> {
    match token {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Number of informative differences between `reference` and `candidate`.
pub fn diff_count(
    reference: &Document,
    candidate: &Document,
    unknowns_are_diffs: bool,
    representation: &ProfileRepresentation,
) -> u32 {
    let unknown = u32::from(unknowns_are_diffs);
    let mut count = 0u32;
    for (locus, ref_token) in reference {
        let cand_token = candidate.get(locus).unwrap_or(&Value::Null);
        count += match representation {
            ProfileRepresentation::IntegerCoded => {
                match (integer_allele(ref_token), integer_allele(cand_token)) {
                    (None, _) => unknown,
                    (Some(_), None) => unknown,
                    (Some(a), Some(b)) => u32::from(a != b),
                }
            }
            ProfileRepresentation::NoCallSentinels { tokens } => {
                match (token_text(ref_token), token_text(cand_token)) {
                    (Some(a), Some(b)) if !tokens.contains(&a) && !tokens.contains(&b) => {
                        u32::from(a != b)
                    }
                    _ => 0,
                }
            }
        };
    }
    count
}
