use crate::config::PipelineConfig;
use crate::error::{ReconcileError, Result};
use crate::resolver::ColumnMapping;
use crate::schema::{DatasetSchema, FieldKind};
use crate::table::{NormalizedTable, RawTable, RawValue, Value};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct NormalizationReport {
    pub table: NormalizedTable,
    /// Required fields absent from the mapping; only non-empty for force-accepted uploads.
    pub missing_required: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct TypeNormalizer<'a> {
    schema: &'a DatasetSchema,
    config: &'a PipelineConfig,
}

impl<'a> TypeNormalizer<'a> {
    pub fn new(schema: &'a DatasetSchema, config: &'a PipelineConfig) -> Self {
        Self { schema, config }
    }

    /// Required fields the mapping does not cover, in declaration order.
    pub fn missing_required(&self, mapping: &ColumnMapping) -> Vec<String> {
        self.schema
            .required_fields()
            .filter(|f| !mapping.contains_field(&f.name))
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn normalize(
        &self,
        table: &RawTable,
        mapping: &ColumnMapping,
        force_accept: bool,
    ) -> Result<NormalizationReport> {
        let dataset = self.schema.dataset;
        if table.is_empty() {
            return Err(ReconcileError::EmptyTable(dataset));
        }

        let missing_required = self.missing_required(mapping);
        if !missing_required.is_empty() && !force_accept {
            return Err(ReconcileError::MissingRequiredColumns {
                dataset,
                missing: missing_required,
                observed: table.columns.clone(),
            });
        }

        let mut warnings = Vec::new();
        let mut columns = Vec::with_capacity(mapping.len());
        let mut source_columns = Vec::with_capacity(mapping.len());
        let mut rows = vec![Vec::with_capacity(mapping.len()); table.row_count()];

        for entry in mapping.iter() {
            let Some(field) = self.schema.field(&entry.canonical) else {
                return Err(ReconcileError::UnknownCanonicalField {
                    dataset,
                    field: entry.canonical.clone(),
                });
            };

            let mut failures = 0usize;
            for (row_index, row) in rows.iter_mut().enumerate() {
                let raw = table.cell(row_index, entry.column_index);
                let value = self.coerce(raw, field.kind);
                if value.is_missing() && !raw.is_empty() {
                    failures += 1;
                }
                row.push(value);
            }

            if failures > 0 {
                let expected = match field.kind {
                    FieldKind::Date => "dates",
                    _ => "numbers",
                };
                debug!(
                    "{}: {} unparseable value(s) in column '{}'",
                    dataset, failures, entry.column
                );
                warnings.push(format!(
                    "Column '{}' ({}): {} value(s) could not be parsed as {} \
                     and were treated as missing",
                    entry.column, field.name, failures, expected
                ));
            }

            columns.push(field.name.clone());
            source_columns.push(entry.column.clone());
        }

        Ok(NormalizationReport {
            table: NormalizedTable {
                dataset,
                columns,
                source_columns,
                rows,
            },
            missing_required,
            warnings,
        })
    }

    fn coerce(&self, raw: &RawValue, kind: FieldKind) -> Value {
        if raw.is_empty() {
            return Value::Missing;
        }
        match kind {
            FieldKind::Date => parse_date(raw, &self.config.date_formats)
                .map(Value::Date)
                .unwrap_or(Value::Missing),
            FieldKind::Number => parse_number(raw)
                .map(Value::Number)
                .unwrap_or(Value::Missing),
            FieldKind::Text | FieldKind::Category => {
                let text = raw.to_string();
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Value::Missing
                } else {
                    Value::Text(trimmed.to_string())
                }
            }
        }
    }
}

/// Parses a date with the given formats, ignoring a trailing time component.
pub fn parse_date(raw: &RawValue, formats: &[String]) -> Option<NaiveDate> {
    match raw {
        RawValue::Date(d) => Some(*d),
        RawValue::Number(n) => {
            // yyyymmdd stored as a number
            if n.fract() == 0.0 && (19_000_101.0..=99_991_231.0).contains(n) {
                NaiveDate::parse_from_str(&format!("{}", *n as i64), "%Y%m%d").ok()
            } else {
                None
            }
        }
        RawValue::Text(s) => {
            let text = s.trim();
            let date_part = text
                .split(|c: char| c.is_whitespace() || c == 'T')
                .next()
                .unwrap_or(text);
            formats.iter().find_map(|format| {
                NaiveDate::parse_from_str(text, format)
                    .or_else(|_| NaiveDate::parse_from_str(date_part, format))
                    .ok()
            })
        }
        RawValue::Empty => None,
    }
}

/// Parses an amount, accepting thousands separators, accounting parentheses
/// and scientific notation.
pub fn parse_number(raw: &RawValue) -> Option<Decimal> {
    match raw {
        RawValue::Number(n) if n.is_finite() => Decimal::from_f64(*n),
        RawValue::Text(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace())
                .collect();
            let wrapped = cleaned.strip_prefix('(').and_then(|c| c.strip_suffix(')'));
            let (negated, digits) = match wrapped {
                Some(inner) => (true, inner),
                None => (false, cleaned.as_str()),
            };
            if digits.is_empty() {
                return None;
            }
            let value = Decimal::from_str(digits)
                .or_else(|_| Decimal::from_scientific(digits))
                .ok()?;
            Some(if negated { -value } else { value })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::NoInference;
    use crate::resolver::ColumnResolver;
    use crate::schema::{fields, DatasetType, SchemaRegistry};
    use std::collections::BTreeMap;

    fn formats() -> Vec<String> {
        PipelineConfig::default().date_formats
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn mapping_for(dataset: DatasetType, table: &RawTable) -> ColumnMapping {
        let config = PipelineConfig::default();
        let schema = SchemaRegistry::standard().schema(dataset);
        ColumnResolver::new(schema, &config)
            .resolve(table, &BTreeMap::new(), &NoInference)
            .await
            .mapping
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        for text in [
            "2025-01-15",
            "15.01.2025",
            "2025/01/15",
            "2025-01-15 00:00:00",
            "2025-01-15T08:30:00",
        ] {
            assert_eq!(parse_date(&RawValue::from(text), &formats()), Some(expected), "{}", text);
        }
        assert_eq!(parse_date(&RawValue::Number(20250115.0), &formats()), Some(expected));
        assert_eq!(parse_date(&RawValue::from("next tuesday"), &formats()), None);
    }

    #[test]
    fn test_parse_number_variants() {
        assert_eq!(parse_number(&RawValue::from("1,234,567")), Some(dec("1234567")));
        assert_eq!(parse_number(&RawValue::from(" 12.50 ")), Some(dec("12.50")));
        assert_eq!(parse_number(&RawValue::from("1.5e3")), Some(dec("1500")));
        assert_eq!(parse_number(&RawValue::from("(2,000)")), Some(dec("-2000")));
        assert_eq!(parse_number(&RawValue::from("-300")), Some(dec("-300")));
        assert_eq!(parse_number(&RawValue::Number(250000.0)), Some(dec("250000")));
        assert_eq!(parse_number(&RawValue::from("n/a")), None);
        assert_eq!(parse_number(&RawValue::Number(f64::INFINITY)), None);
    }

    #[tokio::test]
    async fn test_normalize_renames_and_coerces() {
        let table = RawTable::from_text_rows(
            &["전표일자", "거래처명", "제품명", "수량", "원화환산액", "비고"],
            &[
                vec!["2025-01-15", " Alpha ", "Widget", "10", "1,000,000", "x"],
                vec!["bad-date", "Beta", "Gadget", "abc", "500", ""],
            ],
        );
        let mapping = mapping_for(DatasetType::Sales, &table).await;
        let config = PipelineConfig::default();
        let schema = SchemaRegistry::standard().schema(DatasetType::Sales);
        let report = TypeNormalizer::new(schema, &config)
            .normalize(&table, &mapping, false)
            .unwrap();

        let normalized = report.table;
        assert_eq!(
            normalized.columns,
            vec![
                fields::VOUCHER_DATE,
                fields::CUSTOMER_NAME,
                fields::PRODUCT_NAME,
                fields::QUANTITY,
                fields::AMOUNT_KRW
            ]
        );
        assert_eq!(normalized.value(0, fields::CUSTOMER_NAME), &Value::Text("Alpha".into()));
        assert_eq!(normalized.sum(fields::AMOUNT_KRW).unwrap(), dec("1000500"));
        assert!(normalized.value(1, fields::VOUCHER_DATE).is_missing());
        assert!(normalized.value(1, fields::QUANTITY).is_missing());
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("dates"));
        assert!(report.warnings[1].contains("numbers"));
    }

    #[tokio::test]
    async fn test_missing_required_rejects_unless_forced() {
        let table = RawTable::from_text_rows(
            &["전표일자", "거래처명", "제품명", "수량"],
            &[vec!["2025-01-15", "Alpha", "Widget", "10"]],
        );
        let mapping = mapping_for(DatasetType::Sales, &table).await;
        let config = PipelineConfig::default();
        let schema = SchemaRegistry::standard().schema(DatasetType::Sales);
        let normalizer = TypeNormalizer::new(schema, &config);

        match normalizer.normalize(&table, &mapping, false) {
            Err(ReconcileError::MissingRequiredColumns { missing, observed, .. }) => {
                assert_eq!(missing, vec![fields::AMOUNT_KRW.to_string()]);
                assert_eq!(observed.len(), 4);
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        let report = normalizer.normalize(&table, &mapping, true).unwrap();
        assert_eq!(report.missing_required, vec![fields::AMOUNT_KRW.to_string()]);
        assert_eq!(report.table.row_count(), 1);
    }

    #[test]
    fn test_empty_table_rejected() {
        let config = PipelineConfig::default();
        let schema = SchemaRegistry::standard().schema(DatasetType::Payroll);
        let table = RawTable::new(["부서", "기본급"]);
        let err = TypeNormalizer::new(schema, &config)
            .normalize(&table, &ColumnMapping::default(), true)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::EmptyTable(DatasetType::Payroll)));
    }
}
