use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for one [`ReconciliationPipeline`](crate::ReconciliationPipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on a single call to the inference capability.
    pub inference_timeout_ms: u64,
    /// Sample values per unresolved column handed to inference.
    pub inference_sample_rows: usize,
    /// Share of missing values in a required field above which an anomaly is raised.
    pub missing_ratio_threshold: f64,
    pub anomaly_sample_rows: usize,
    pub anomaly_sample_values: usize,
    /// Tried in order; a trailing time component is ignored.
    pub date_formats: Vec<String>,
    pub preview_rows: usize,
    pub top_customers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inference_timeout_ms: 10_000,
            inference_sample_rows: 3,
            missing_ratio_threshold: 0.10,
            anomaly_sample_rows: 10,
            anomaly_sample_values: 5,
            date_formats: vec![
                "%Y-%m-%d".to_string(),
                "%d.%m.%Y".to_string(),
                "%Y/%m/%d".to_string(),
            ],
            preview_rows: 5,
            top_customers: 10,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.inference_timeout_ms == 0 {
            return Err(ReconcileError::InvalidConfig(
                "inference_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.missing_ratio_threshold) {
            return Err(ReconcileError::InvalidConfig(format!(
                "missing_ratio_threshold must be between 0 and 1, got {}",
                self.missing_ratio_threshold
            )));
        }
        if self.date_formats.is_empty() {
            return Err(ReconcileError::InvalidConfig(
                "date_formats must list at least one format".to_string(),
            ));
        }
        if let Some(blank) = self.date_formats.iter().find(|f| f.trim().is_empty()) {
            return Err(ReconcileError::InvalidConfig(format!(
                "date format '{}' is blank",
                blank
            )));
        }
        if self.anomaly_sample_rows == 0 || self.anomaly_sample_values == 0 {
            return Err(ReconcileError::InvalidConfig(
                "anomaly sample bounds must be greater than zero".to_string(),
            ));
        }
        if self.top_customers == 0 {
            return Err(ReconcileError::InvalidConfig(
                "top_customers must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn inference_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.inference_timeout_ms)
    }
}
