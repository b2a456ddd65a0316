use crate::config::PipelineConfig;
use crate::inference::{CandidateField, ColumnInference, InferenceRequest, UnresolvedColumn};
use crate::schema::{normalize_label, CanonicalField, DatasetSchema};
use crate::table::RawTable;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Manual,
    Exact,
    Normalized,
    Synonym,
    Inferred,
}

impl MatchMethod {
    pub fn confidence(self) -> u8 {
        match self {
            MatchMethod::Manual | MatchMethod::Exact => 100,
            MatchMethod::Normalized | MatchMethod::Synonym => 95,
            MatchMethod::Inferred => 75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMatch {
    pub column_index: usize,
    pub column: String,
    pub canonical: String,
    pub method: MatchMethod,
    pub confidence: u8,
}

/// Accepted original-to-canonical column assignments, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    matches: Vec<ColumnMatch>,
}

impl ColumnMapping {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnMatch> {
        self.matches.iter()
    }

    pub fn for_column(&self, column_index: usize) -> Option<&ColumnMatch> {
        self.matches.iter().find(|m| m.column_index == column_index)
    }

    pub fn for_field(&self, canonical: &str) -> Option<&ColumnMatch> {
        self.matches.iter().find(|m| m.canonical == canonical)
    }

    pub fn contains_field(&self, canonical: &str) -> bool {
        self.for_field(canonical).is_some()
    }

    /// Mean confidence over mapped columns; zero for an empty mapping.
    pub fn average_confidence(&self) -> f64 {
        if self.matches.is_empty() {
            return 0.0;
        }
        let total: u32 = self.matches.iter().map(|m| u32::from(m.confidence)).sum();
        f64::from(total) / self.matches.len() as f64
    }

    fn insert(&mut self, entry: ColumnMatch) {
        let at = self
            .matches
            .partition_point(|m| m.column_index < entry.column_index);
        self.matches.insert(at, entry);
    }
}

/// A column that matched a field already claimed by an earlier column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingCollision {
    pub column_index: usize,
    pub column: String,
    pub canonical: String,
    pub winner: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub observed_columns: Vec<String>,
    pub mapping: ColumnMapping,
    pub unmapped: Vec<String>,
    pub collisions: Vec<MappingCollision>,
    pub warnings: Vec<String>,
}

impl Resolution {
    /// Share of observed columns that were mapped, in percent.
    pub fn mapping_rate(&self) -> f64 {
        if self.observed_columns.is_empty() {
            return 0.0;
        }
        self.mapping.len() as f64 / self.observed_columns.len() as f64 * 100.0
    }
}

pub struct ColumnResolver<'a> {
    schema: &'a DatasetSchema,
    config: &'a PipelineConfig,
}

struct Claims<'t> {
    table: &'t RawTable,
    mapping: ColumnMapping,
    owner: HashMap<String, usize>,
    settled: Vec<bool>,
    collisions: Vec<MappingCollision>,
}

impl<'t> Claims<'t> {
    fn new(table: &'t RawTable) -> Self {
        Self {
            table,
            mapping: ColumnMapping::default(),
            owner: HashMap::new(),
            settled: vec![false; table.columns.len()],
            collisions: Vec::new(),
        }
    }

    fn is_free(&self, field: &str) -> bool {
        !self.owner.contains_key(field)
    }

    /// Claims `field` for the column, or records a collision when it is taken.
    fn claim(&mut self, column_index: usize, field: &str, method: MatchMethod) {
        let column = self.table.columns[column_index].clone();
        self.settled[column_index] = true;
        if let Some(&winner) = self.owner.get(field) {
            debug!(
                "Column '{}' also resolves to '{}', already taken by '{}'",
                column, field, self.table.columns[winner]
            );
            self.collisions.push(MappingCollision {
                column_index,
                column,
                canonical: field.to_string(),
                winner: self.table.columns[winner].clone(),
            });
            return;
        }
        debug!("Column '{}' -> '{}' ({:?})", column, field, method);
        self.owner.insert(field.to_string(), column_index);
        self.mapping.insert(ColumnMatch {
            column_index,
            column,
            canonical: field.to_string(),
            method,
            confidence: method.confidence(),
        });
    }
}

impl<'a> ColumnResolver<'a> {
    pub fn new(schema: &'a DatasetSchema, config: &'a PipelineConfig) -> Self {
        Self { schema, config }
    }

    /// Runs the name tiers in document order, then asks `inference` about whatever is left.
    pub async fn resolve(
        &self,
        table: &RawTable,
        overrides: &BTreeMap<String, String>,
        inference: &dyn ColumnInference,
    ) -> Resolution {
        let mut warnings = Vec::new();
        let mut claims = Claims::new(table);

        for (index, column) in table.columns.iter().enumerate() {
            let Some(target) = overrides.get(column) else {
                continue;
            };
            if self.schema.field(target).is_some() {
                claims.claim(index, target, MatchMethod::Manual);
            } else {
                warnings.push(format!(
                    "Override for column '{}' names unknown field '{}' and was ignored",
                    column, target
                ));
            }
        }

        for (index, column) in table.columns.iter().enumerate() {
            if claims.settled[index] {
                continue;
            }
            if let Some((field, method)) = self.match_by_name(column) {
                claims.claim(index, &field.name, method);
            }
        }

        self.infer_remaining(table, inference, &mut claims, &mut warnings)
            .await;

        for collision in &claims.collisions {
            warnings.push(format!(
                "Column '{}' also matches '{}', already mapped from '{}'; left unmapped",
                collision.column, collision.canonical, collision.winner
            ));
        }

        let unmapped: Vec<String> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(index, _)| claims.mapping.for_column(*index).is_none())
            .map(|(_, column)| column.clone())
            .collect();
        if !unmapped.is_empty() {
            warnings.push(format!("Unmapped columns ignored: {}", unmapped.join(", ")));
        }

        Resolution {
            observed_columns: table.columns.clone(),
            mapping: claims.mapping,
            unmapped,
            collisions: claims.collisions,
            warnings,
        }
    }

    fn match_by_name(&self, column: &str) -> Option<(&'a CanonicalField, MatchMethod)> {
        let schema: &'a DatasetSchema = self.schema;
        let fields = &schema.fields;

        if let Some(field) = fields.iter().find(|f| declared(f).any(|l| l == column)) {
            return Some((field, MatchMethod::Exact));
        }

        let key = normalize_label(column);
        if key.is_empty() {
            return None;
        }
        if let Some(field) = fields
            .iter()
            .find(|f| declared(f).any(|l| normalize_label(l) == key))
        {
            return Some((field, MatchMethod::Normalized));
        }

        fields
            .iter()
            .find(|f| {
                f.synonyms
                    .iter()
                    .any(|s| s == column || normalize_label(s) == key)
            })
            .map(|field| (field, MatchMethod::Synonym))
    }

    async fn infer_remaining(
        &self,
        table: &RawTable,
        inference: &dyn ColumnInference,
        claims: &mut Claims<'_>,
        warnings: &mut Vec<String>,
    ) {
        if !inference.is_enabled() {
            return;
        }
        let pending: Vec<usize> = (0..table.columns.len())
            .filter(|&i| !claims.settled[i])
            .collect();
        let candidates: Vec<CandidateField> = self
            .schema
            .fields
            .iter()
            .filter(|f| claims.is_free(&f.name))
            .map(|f| CandidateField {
                name: f.name.clone(),
                kind: f.kind,
                required: f.required,
                description: f.description.clone(),
                labels: f.labels().map(str::to_string).collect(),
            })
            .collect();
        if pending.is_empty() || candidates.is_empty() {
            return;
        }

        let request = InferenceRequest {
            dataset: self.schema.dataset,
            columns: pending
                .iter()
                .map(|&i| UnresolvedColumn {
                    name: table.columns[i].clone(),
                    samples: table.sample_values(i, self.config.inference_sample_rows),
                })
                .collect(),
            candidates,
        };

        let timeout = self.config.inference_timeout();
        let proposals = match tokio::time::timeout(timeout, inference.infer(&request)).await {
            Ok(Ok(proposals)) => proposals,
            Ok(Err(e)) => {
                warn!("Column inference '{}' failed: {}", inference.name(), e);
                warnings.push(format!(
                    "Column inference '{}' failed: {}",
                    inference.name(),
                    e
                ));
                return;
            }
            Err(_) => {
                warn!(
                    "Column inference '{}' timed out after {} ms",
                    inference.name(),
                    self.config.inference_timeout_ms
                );
                warnings.push(format!(
                    "Column inference '{}' timed out after {} ms",
                    inference.name(),
                    self.config.inference_timeout_ms
                ));
                return;
            }
        };

        for proposal in proposals {
            let Some(field) = proposal.canonical.as_deref() else {
                continue;
            };
            if request.candidate(field).is_none() || !claims.is_free(field) {
                debug!(
                    "Dropping inferred mapping '{}' -> '{}'",
                    proposal.column, field
                );
                continue;
            }
            let column = pending
                .iter()
                .copied()
                .find(|&i| table.columns[i] == proposal.column && !claims.settled[i]);
            if let Some(index) = column {
                claims.claim(index, field, MatchMethod::Inferred);
            }
        }
    }
}

/// A field's own name followed by its declared variants.
fn declared(field: &CanonicalField) -> impl Iterator<Item = &str> {
    std::iter::once(field.name.as_str()).chain(field.variants.iter().map(String::as_str))
}
