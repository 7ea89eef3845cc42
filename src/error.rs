use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the risk-scoring core.
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("invalid {field}: {value} (expected {expected})")]
    Validation {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("risk model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

pub type RiskResult<T> = Result<T, RiskError>;

/// Training succeeded but the artifacts could not be saved. The in-memory
/// model is usable; the next process start will train again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceWarning {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for PersistenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model artifacts not saved to {}: {}",
            self.path.display(),
            self.reason
        )
    }
}
