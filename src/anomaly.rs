use crate::config::PipelineConfig;
use crate::resolver::MappingCollision;
use crate::schema::{DatasetSchema, FieldKind};
use crate::table::{NormalizedTable, Value};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    NegativeValue,
    ValueTooHigh,
    ZeroValue,
    MissingColumn,
    MissingValues,
    DuplicateMapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFinding {
    pub kind: AnomalyKind,
    pub column: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_values: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionReport {
    pub findings: Vec<AnomalyFinding>,
    pub warnings: Vec<String>,
}

pub struct AnomalyDetector<'a> {
    schema: &'a DatasetSchema,
    config: &'a PipelineConfig,
}

/// Rows matching one rule within a column, with bounded samples.
struct Hits {
    count: usize,
    rows: Vec<usize>,
    values: Vec<String>,
}

impl Hits {
    fn collect<'v>(
        cells: impl Iterator<Item = (usize, &'v Value)>,
        row_limit: usize,
        value_limit: usize,
        predicate: impl Fn(Decimal) -> bool,
    ) -> Self {
        let mut hits = Hits {
            count: 0,
            rows: Vec::new(),
            values: Vec::new(),
        };
        for (row, value) in cells {
            let Some(n) = value.as_decimal() else {
                continue;
            };
            if !predicate(n) {
                continue;
            }
            hits.count += 1;
            if hits.rows.len() < row_limit {
                hits.rows.push(row);
            }
            if hits.values.len() < value_limit {
                hits.values.push(n.to_string());
            }
        }
        hits
    }
}

impl<'a> AnomalyDetector<'a> {
    pub fn new(schema: &'a DatasetSchema, config: &'a PipelineConfig) -> Self {
        Self { schema, config }
    }

    /// Runs every rule over the table. Findings follow field declaration order,
    /// with resolver collisions appended last.
    pub fn detect(
        &self,
        table: &NormalizedTable,
        collisions: &[MappingCollision],
    ) -> DetectionReport {
        let mut report = DetectionReport::default();

        for field in &self.schema.fields {
            if !table.has_column(&field.name) {
                if field.required {
                    report.findings.push(AnomalyFinding {
                        kind: AnomalyKind::MissingColumn,
                        column: field.name.clone(),
                        severity: Severity::High,
                        message: format!("Required column '{}' is missing", field.name),
                        affected_rows: None,
                        sample_values: None,
                    });
                }
                continue;
            }

            if field.kind == FieldKind::Number {
                if let Some(rule) = &field.validation {
                    if rule.non_negative {
                        self.check(
                            &mut report,
                            table,
                            &field.name,
                            AnomalyKind::NegativeValue,
                            |n| n < Decimal::ZERO,
                        );
                    }
                    if let Some(max) = rule.max {
                        self.check(
                            &mut report,
                            table,
                            &field.name,
                            AnomalyKind::ValueTooHigh,
                            |n| n > max,
                        );
                    }
                    if rule.zero_suspicious {
                        self.check(
                            &mut report,
                            table,
                            &field.name,
                            AnomalyKind::ZeroValue,
                            |n| n.is_zero(),
                        );
                    }
                }
            }

            if field.required {
                self.check_missing_ratio(&mut report, table, &field.name);
            }
        }

        for collision in collisions {
            report.findings.push(AnomalyFinding {
                kind: AnomalyKind::DuplicateMapping,
                column: collision.column.clone(),
                severity: Severity::Low,
                message: format!(
                    "Column '{}' duplicates '{}' already mapped from '{}'",
                    collision.column, collision.canonical, collision.winner
                ),
                affected_rows: None,
                sample_values: None,
            });
        }

        report
    }

    fn check(
        &self,
        report: &mut DetectionReport,
        table: &NormalizedTable,
        field: &str,
        kind: AnomalyKind,
        predicate: impl Fn(Decimal) -> bool,
    ) {
        let hits = Hits::collect(
            table.column(field).enumerate(),
            self.config.anomaly_sample_rows,
            self.config.anomaly_sample_values,
            predicate,
        );
        if hits.count == 0 {
            return;
        }
        let (severity, message) = match kind {
            AnomalyKind::NegativeValue => (
                Severity::High,
                format!("{} negative value(s) in '{}'", hits.count, field),
            ),
            AnomalyKind::ValueTooHigh => (
                Severity::Medium,
                format!("{} value(s) above the expected maximum in '{}'", hits.count, field),
            ),
            _ => (
                Severity::Low,
                format!("{} zero value(s) in '{}'", hits.count, field),
            ),
        };
        report.findings.push(AnomalyFinding {
            kind,
            column: field.to_string(),
            severity,
            message,
            affected_rows: Some(hits.rows),
            sample_values: Some(hits.values),
        });
    }

    fn check_missing_ratio(
        &self,
        report: &mut DetectionReport,
        table: &NormalizedTable,
        field: &str,
    ) {
        let total = table.row_count();
        if total == 0 {
            return;
        }
        let missing: Vec<usize> = table
            .column(field)
            .enumerate()
            .filter(|(_, v)| v.is_missing())
            .map(|(row, _)| row)
            .collect();
        if missing.is_empty() {
            return;
        }
        let ratio = missing.len() as f64 / total as f64;
        if ratio > self.config.missing_ratio_threshold {
            report.findings.push(AnomalyFinding {
                kind: AnomalyKind::MissingValues,
                column: field.to_string(),
                severity: Severity::Medium,
                message: format!(
                    "{:.1}% of values in '{}' are missing ({} of {})",
                    ratio * 100.0,
                    field,
                    missing.len(),
                    total
                ),
                affected_rows: Some(
                    missing
                        .into_iter()
                        .take(self.config.anomaly_sample_rows)
                        .collect(),
                ),
                sample_values: None,
            });
        } else {
            report.warnings.push(format!(
                "{} of {} values in '{}' are missing",
                missing.len(),
                total,
                field
            ));
        }
    }
}
