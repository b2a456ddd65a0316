use crate::schema::DatasetType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Empty table uploaded for dataset '{0}'")]
    EmptyTable(DatasetType),

    #[error("Missing required columns for dataset '{dataset}': {}", missing.join(", "))]
    MissingRequiredColumns {
        dataset: DatasetType,
        missing: Vec<String>,
        observed: Vec<String>,
    },

    #[error("Missing minimum data for statement synthesis: {}", format_types(missing))]
    MissingMinimumData { missing: Vec<DatasetType> },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Unknown dataset type '{0}'")]
    UnknownDatasetType(String),

    #[error("Unknown canonical field '{field}' for dataset '{dataset}'")]
    UnknownCanonicalField { dataset: DatasetType, field: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Column inference failed: {0}")]
    InferenceFailed(String),

    #[error("Arithmetic overflow while computing {0}")]
    ArithmeticOverflow(String),

    #[error("Income statement identity violated: {identity} (difference {difference})")]
    IdentityViolation { identity: String, difference: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "gemini")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl ReconcileError {
    /// True for errors that reject a single upload rather than indicate a fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::EmptyTable(_) | Self::MissingRequiredColumns { .. }
        )
    }
}

fn format_types(types: &[DatasetType]) -> String {
    types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
