use thiserror::Error;

#[derive(Error, Debug)]
pub enum TsrError {
    /// Invalid or missing configuration: unknown column, non-positive
    /// threshold, zero quantile count.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown column `{0}`")]
    UnknownColumn(String),

    /// Duplicate TSS key, overlapping TSRs of one sample group and other
    /// logic defects. Never retried.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// An annotation or normalization collaborator returned rows that cannot
    /// be reconciled with the table they were computed from.
    #[error("Collaborator contract violation: {0}")]
    CollaboratorContractViolation(String),

    #[error("Error parsing record at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl TsrError {
    /// Unknown columns are a flavour of configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, TsrError::Configuration(_) | TsrError::UnknownColumn(_))
    }
}

pub type Result<T> = std::result::Result<T, TsrError>;
