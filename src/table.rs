use crate::error::Result;
use crate::schema::DatasetType;
use crate::utils::accumulate;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Group key used when a row has no value in the grouping column.
pub const UNASSIGNED: &str = "Unassigned";

/// A cell as it arrived from the export, before any coercion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl RawValue {
    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::Number(n) => n.is_nan(),
            RawValue::Date(_) => false,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        if s.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(s.to_string())
        }
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::from(s.as_str())
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::Number(n as f64)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(d: NaiveDate) -> Self {
        RawValue::Date(d)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Empty => Ok(()),
            RawValue::Number(n) => write!(f, "{}", n),
            RawValue::Text(s) => f.write_str(s),
            RawValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Positional rows under an ordered header, exactly as exported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding short rows with empty cells and dropping surplus cells.
    pub fn push_row<V: Into<RawValue>>(&mut self, row: impl IntoIterator<Item = V>) {
        let mut cells: Vec<RawValue> = row.into_iter().map(Into::into).collect();
        cells.resize(self.columns.len(), RawValue::Empty);
        self.rows.push(cells);
    }

    pub fn with_row<V: Into<RawValue>>(mut self, row: impl IntoIterator<Item = V>) -> Self {
        self.push_row(row);
        self
    }

    /// Builds a table from string cells; blank cells become [`RawValue::Empty`].
    pub fn from_text_rows<S: AsRef<str>>(columns: &[S], rows: &[Vec<S>]) -> Self {
        let mut table = Self::new(columns.iter().map(|c| c.as_ref().to_string()));
        for row in rows {
            table.push_row(row.iter().map(|cell| RawValue::from(cell.as_ref())));
        }
        table
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: usize, column: usize) -> &RawValue {
        static EMPTY: RawValue = RawValue::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&EMPTY)
    }

    /// First `limit` non-empty values of a column, rendered as text.
    pub fn sample_values(&self, column: usize, limit: usize) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get(column))
            .filter(|v| !v.is_empty())
            .take(limit)
            .map(|v| v.to_string())
            .collect()
    }

    pub fn preview(&self, limit: usize) -> TablePreview {
        TablePreview {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .take(limit)
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }
}

/// First rows of a table rendered as text, for display next to an upload outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A typed cell after normalization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Missing,
    Number(Decimal),
    Date(NaiveDate),
    Text(String),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Number(n) => write!(f, "{}", n),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub dataset: DatasetType,
    /// Canonical field names, in the order the source columns appeared.
    pub columns: Vec<String>,
    /// Original column name behind each canonical column.
    pub source_columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl NormalizedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == field)
    }

    pub fn has_column(&self, field: &str) -> bool {
        self.column_index(field).is_some()
    }

    /// Every cell of a column; empty when the column is absent.
    pub fn column(&self, field: &str) -> impl Iterator<Item = &Value> + '_ {
        let index = self.column_index(field);
        self.rows
            .iter()
            .filter_map(move |row| index.and_then(|i| row.get(i)))
    }

    pub fn value(&self, row: usize, field: &str) -> &Value {
        static MISSING: Value = Value::Missing;
        self.column_index(field)
            .and_then(|i| self.rows.get(row).and_then(|r| r.get(i)))
            .unwrap_or(&MISSING)
    }

    /// Sum of a numeric column, counting missing cells as zero.
    pub fn sum(&self, field: &str) -> Result<Decimal> {
        let context = self.context(field);
        let mut total = Decimal::ZERO;
        for value in self.column(field).filter_map(Value::as_decimal) {
            accumulate(&mut total, value, &context)?;
        }
        Ok(total)
    }

    /// `dataset.field`, naming a column in overflow errors.
    pub fn context(&self, field: &str) -> String {
        format!("{}.{}", self.dataset, field)
    }

    /// Sums `amount` per distinct text value of `key`, missing keys under [`UNASSIGNED`].
    pub fn group_sum(&self, key: &str, amount: &str) -> Result<BTreeMap<String, Decimal>> {
        let context = self.context(amount);
        let mut groups = BTreeMap::new();
        for row in 0..self.rows.len() {
            let label = match self.value(row, key) {
                Value::Missing => UNASSIGNED.to_string(),
                other => other.to_string().trim().to_string(),
            };
            let value = self.value(row, amount).as_decimal().unwrap_or_default();
            accumulate(groups.entry(label).or_insert(Decimal::ZERO), value, &context)?;
        }
        Ok(groups)
    }

    pub fn preview(&self, limit: usize) -> TablePreview {
        TablePreview {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .take(limit)
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }
}
