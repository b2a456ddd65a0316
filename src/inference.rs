//! Pluggable last-resort column inference.
//!
//! The resolver hands every column it could not match by name, together with a
//! few sample values and the canonical fields that are still free, to a
//! [`ColumnInference`] implementation. Implementations may be slow or remote;
//! the resolver bounds each call with a timeout and treats any failure as
//! "no mapping".

use crate::error::Result;
use crate::schema::{normalize_label, DatasetType, FieldKind};
use futures::future::{self, BoxFuture, FutureExt};
use rapidfuzz::distance::jaro_winkler::similarity as jaro_similarity;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedColumn {
    pub name: String,
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateField {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub description: String,
    /// Name, variants and synonyms of the field.
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub dataset: DatasetType,
    pub columns: Vec<UnresolvedColumn>,
    pub candidates: Vec<CandidateField>,
}

impl InferenceRequest {
    pub fn candidate(&self, name: &str) -> Option<&CandidateField> {
        self.candidates.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InferredColumn {
    /// Original column name exactly as given in the request.
    pub column: String,
    /// Canonical field name, or null when no candidate fits.
    pub canonical: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InferenceProposals {
    pub mappings: Vec<InferredColumn>,
}

pub trait ColumnInference: Send + Sync {
    fn name(&self) -> &str;

    /// False when the capability can never propose anything; the resolver then
    /// skips the call and its timeout entirely.
    fn is_enabled(&self) -> bool {
        true
    }

    fn infer<'a>(
        &'a self,
        request: &'a InferenceRequest,
    ) -> BoxFuture<'a, Result<Vec<InferredColumn>>>;
}

/// Never proposes anything. The default capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInference;

impl ColumnInference for NoInference {
    fn name(&self) -> &str {
        "none"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn infer<'a>(
        &'a self,
        _request: &'a InferenceRequest,
    ) -> BoxFuture<'a, Result<Vec<InferredColumn>>> {
        future::ready(Ok(Vec::new())).boxed()
    }
}

/// Jaro-Winkler matching of column names against every label of the free fields.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityInference {
    threshold: f64,
}

impl Default for SimilarityInference {
    fn default() -> Self {
        Self { threshold: 0.88 }
    }
}

impl SimilarityInference {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn best_label_score(column: &str, candidate: &CandidateField) -> f64 {
        candidate
            .labels
            .iter()
            .map(|label| normalize_label(label))
            .filter(|label| !label.is_empty())
            .map(|label| jaro_similarity(column.chars(), label.chars()))
            .fold(0.0, f64::max)
    }

    /// Greedy assignment: highest score first, each column and field used once.
    pub fn propose(&self, request: &InferenceRequest) -> Vec<InferredColumn> {
        let mut scored = Vec::new();
        for (ci, column) in request.columns.iter().enumerate() {
            let normalized = normalize_label(&column.name);
            if normalized.is_empty() {
                continue;
            }
            for (fi, candidate) in request.candidates.iter().enumerate() {
                let score = Self::best_label_score(&normalized, candidate);
                if score >= self.threshold {
                    scored.push((score, ci, fi));
                }
            }
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut column_taken = vec![false; request.columns.len()];
        let mut field_taken = vec![false; request.candidates.len()];
        let mut picks = Vec::new();
        for (_, ci, fi) in scored {
            if column_taken[ci] || field_taken[fi] {
                continue;
            }
            column_taken[ci] = true;
            field_taken[fi] = true;
            picks.push((ci, fi));
        }
        picks.sort_unstable();

        picks
            .into_iter()
            .map(|(ci, fi)| InferredColumn {
                column: request.columns[ci].name.clone(),
                canonical: Some(request.candidates[fi].name.clone()),
            })
            .collect()
    }
}

impl ColumnInference for SimilarityInference {
    fn name(&self) -> &str {
        "similarity"
    }

    fn infer<'a>(
        &'a self,
        request: &'a InferenceRequest,
    ) -> BoxFuture<'a, Result<Vec<InferredColumn>>> {
        future::ready(Ok(self.propose(request))).boxed()
    }
}
