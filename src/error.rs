// ⚠️ Error taxonomy for the ledger pipeline
//
// Pure stages (reconciliation, aggregation) raise DataShape immediately.
// Statistical stages raise InsufficientData / ModelConvergence and never
// fall back silently. Query misses are not errors: they return empty results.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed or missing input fields
    #[error("data shape error: {0}")]
    DataShape(String),

    /// Too few observations for a statistical operation
    #[error("insufficient data for {context}: need at least {needed} observations, got {actual}")]
    InsufficientData {
        context: String,
        needed: usize,
        actual: usize,
    },

    /// Model fitting did not converge
    #[error("model did not converge: {0}")]
    ModelConvergence(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn data_shape(msg: impl Into<String>) -> Self {
        LedgerError::DataShape(msg.into())
    }

    pub fn insufficient(context: impl Into<String>, needed: usize, actual: usize) -> Self {
        LedgerError::InsufficientData {
            context: context.into(),
            needed,
            actual,
        }
    }

    /// Short machine-readable kind, used by the HTTP boundary
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::DataShape(_) => "data_shape",
            LedgerError::InsufficientData { .. } => "insufficient_data",
            LedgerError::ModelConvergence(_) => "model_convergence",
            LedgerError::Config(_) => "config",
            LedgerError::Storage(_) => "storage",
            LedgerError::Csv(_) => "csv",
            LedgerError::Io(_) => "io",
            LedgerError::Serialization(_) => "serialization",
        }
    }
}
