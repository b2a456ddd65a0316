//! # Ledger Reconciler
//!
//! A library for turning heterogeneous ERP ledger exports into one canonical
//! schema and deriving an absorption-costing income statement from them.
//!
//! ## Core Concepts
//!
//! - **Datasets**: Six ledger types (sales, purchases, payroll, manufacturing overhead,
//!   inventory roll-forward, SG&A), each with a canonical field list in the [`SchemaRegistry`]
//! - **Column Resolution**: Original headers are matched to canonical fields by exact name,
//!   normalized name, synonym dictionary and finally a pluggable [`ColumnInference`]
//! - **Normalization**: Values are coerced to dates, exact decimals or trimmed text
//! - **Quality**: Each upload gets anomaly findings and a 0-100 quality score
//! - **Sessions**: Accepted uploads are kept per session, one slot per dataset type
//! - **Synthesis**: Once sales are loaded, all stored datasets combine into an income
//!   statement whose accounting identities hold exactly
//!
//! ## Example
//!
//! ```rust,ignore
//! use ledger_reconciler::*;
//!
//! let pipeline = ReconciliationPipeline::new(PipelineConfig::default())?;
//! let session = pipeline.create_session();
//!
//! let sales = RawTable::from_text_rows(
//!     &["전표일자", "거래처명", "제품명", "수량", "원화환산액"],
//!     &[vec!["2025-01-15", "Alpha", "Widget", "10", "1,000,000"]],
//! );
//! let outcome = pipeline
//!     .ingest(Some(&session), DatasetType::Sales, &sales, IngestOptions::default())
//!     .await?;
//! assert!(outcome.accepted);
//!
//! let report = pipeline.synthesize(&session)?;
//! println!("Operating profit: {}", report.statement.operating_profit);
//! ```

pub mod anomaly;
pub mod config;
pub mod error;
pub mod inference;
pub mod normalizer;
pub mod quality;
pub mod resolver;
pub mod schema;
pub mod session;
pub mod statement;
pub mod table;
pub mod utils;

#[cfg(feature = "gemini")]
pub mod llm;

pub use anomaly::{AnomalyDetector, AnomalyFinding, AnomalyKind, Severity};
pub use config::PipelineConfig;
pub use error::{ReconcileError, Result};
pub use inference::{
    ColumnInference, InferenceRequest, InferredColumn, NoInference, SimilarityInference,
};
pub use normalizer::TypeNormalizer;
pub use quality::{Grade, QualityScore};
pub use resolver::{ColumnMapping, ColumnMatch, ColumnResolver, MatchMethod};
pub use schema::{
    fields, CanonicalField, DatasetSchema, DatasetTemplate, DatasetType, SchemaRegistry,
};
pub use session::{SessionStatus, SessionStore};
pub use statement::{IncomeStatement, LineItem, StatementReport, StatementSynthesizer};
pub use table::{NormalizedTable, RawTable, RawValue, TablePreview, Value};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use session::DatasetSlot;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-upload switches supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Original column name to canonical field, applied before every other tier.
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
    /// Accept the upload even when required fields are missing.
    #[serde(default)]
    pub force_accept: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub accepted: bool,
    pub session_id: String,
    pub dataset_type: DatasetType,
    pub mapping: ColumnMapping,
    pub unmapped_columns: Vec<String>,
    pub anomalies: Vec<AnomalyFinding>,
    /// Absent for rejected uploads.
    pub quality: Option<QualityScore>,
    pub missing_required: Vec<String>,
    pub observed_columns: Vec<String>,
    pub warnings: Vec<String>,
    pub row_count: usize,
    pub preview: TablePreview,
    /// Reason the upload was rejected.
    pub rejection: Option<String>,
}

pub struct ReconciliationPipeline {
    registry: Arc<SchemaRegistry>,
    config: PipelineConfig,
    inference: Arc<dyn ColumnInference>,
    store: Arc<SessionStore>,
}

impl ReconciliationPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: Arc::new(SchemaRegistry::standard().clone()),
            config,
            inference: Arc::new(NoInference),
            store: Arc::new(SessionStore::new()),
        })
    }

    pub fn with_inference(mut self, inference: impl ColumnInference + 'static) -> Self {
        self.inference = Arc::new(inference);
        self
    }

    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Shares an existing store, e.g. between several pipelines in one process.
    pub fn with_store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn create_session(&self) -> String {
        self.store.create_session()
    }

    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        self.store.delete_session(session_id)
    }

    pub fn status(&self, session_id: &str) -> Result<SessionStatus> {
        self.store.status(session_id)
    }

    pub fn template(&self, dataset: DatasetType) -> DatasetTemplate {
        self.registry.template(dataset)
    }

    /// Resolves, normalizes, checks and scores one table, then stores it in the session.
    ///
    /// A missing required field or an empty table is a rejection, not an error:
    /// the outcome comes back with `accepted: false` and the store is left as it
    /// was. Without a `session_id` a fresh id is generated. Sessions are only
    /// registered when an upload is accepted, so a rejected first upload leaves
    /// no empty session behind.
    ///
    /// The inference tier runs under `tokio::time::timeout`, so with an inference
    /// capability other than [`NoInference`] this future must be polled inside a
    /// Tokio runtime.
    pub async fn ingest(
        &self,
        session_id: Option<&str>,
        dataset: DatasetType,
        table: &RawTable,
        options: IngestOptions,
    ) -> Result<UploadOutcome> {
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => session::new_session_id(),
        };
        let schema = self.registry.schema(dataset);

        debug!(
            "Session {}: ingesting {} with {} column(s) and {} row(s)",
            session_id,
            dataset,
            table.columns.len(),
            table.row_count()
        );

        let resolution = resolver::ColumnResolver::new(schema, &self.config)
            .resolve(table, &options.overrides, self.inference.as_ref())
            .await;
        let mut warnings = resolution.warnings.clone();

        let normalizer = TypeNormalizer::new(schema, &self.config);
        let normalized = normalizer.normalize(table, &resolution.mapping, options.force_accept);
        let normalized = match normalized {
            Ok(report) => report,
            Err(e) if e.is_rejection() => {
                info!("Session {}: rejected {} upload: {}", session_id, dataset, e);
                let missing_required = normalizer.missing_required(&resolution.mapping);
                warnings.push(e.to_string());
                return Ok(UploadOutcome {
                    accepted: false,
                    session_id,
                    dataset_type: dataset,
                    mapping: resolution.mapping,
                    unmapped_columns: resolution.unmapped,
                    anomalies: Vec::new(),
                    quality: None,
                    missing_required,
                    observed_columns: resolution.observed_columns,
                    warnings,
                    row_count: table.row_count(),
                    preview: table.preview(self.config.preview_rows),
                    rejection: Some(e.to_string()),
                });
            }
            Err(e) => return Err(e),
        };
        warnings.extend(normalized.warnings);

        let detection = AnomalyDetector::new(schema, &self.config)
            .detect(&normalized.table, &resolution.collisions);
        warnings.extend(detection.warnings);

        let quality = QualityScore::assess(
            &resolution.mapping,
            resolution.observed_columns.len(),
            &detection.findings,
        );
        let preview = normalized.table.preview(self.config.preview_rows);
        let row_count = normalized.table.row_count();

        self.store.put(
            &session_id,
            DatasetSlot::new(normalized.table, resolution.mapping.clone(), quality.clone()),
        );

        info!(
            "Session {}: accepted {} upload ({} rows, {}/{} columns mapped, quality {} {:?})",
            session_id,
            dataset,
            row_count,
            resolution.mapping.len(),
            resolution.observed_columns.len(),
            quality.score,
            quality.grade
        );

        Ok(UploadOutcome {
            accepted: true,
            session_id,
            dataset_type: dataset,
            mapping: resolution.mapping,
            unmapped_columns: resolution.unmapped,
            anomalies: detection.findings,
            quality: Some(quality),
            missing_required: normalized.missing_required,
            observed_columns: resolution.observed_columns,
            warnings,
            row_count,
            preview,
            rejection: None,
        })
    }

    /// Builds the income statement from whatever the session currently holds.
    pub fn synthesize(&self, session_id: &str) -> Result<StatementReport> {
        let snapshot = self.store.snapshot(session_id)?;
        StatementSynthesizer::new(&self.config).synthesize(&snapshot)
    }
}

/// One-shot reconciliation of a set of tables in a throwaway session.
///
/// Rejected tables are skipped with their rejection reason added to the
/// report's warnings.
pub async fn reconcile_tables(
    tables: &[(DatasetType, RawTable)],
    config: PipelineConfig,
) -> Result<StatementReport> {
    let pipeline = ReconciliationPipeline::new(config)?;
    let session = pipeline.create_session();
    let mut rejected = Vec::new();

    for (dataset, table) in tables {
        let outcome = pipeline
            .ingest(Some(&session), *dataset, table, IngestOptions::default())
            .await?;
        if let Some(reason) = outcome.rejection {
            rejected.push(reason);
        }
    }

    let mut report = pipeline.synthesize(&session)?;
    report.warnings.extend(rejected);
    Ok(report)
}
