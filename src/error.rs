use std::path::PathBuf;

/// Coarse failure classes used for reporting and HTTP status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed schema, rule set, or model file.
    Configuration,
    /// Missing input file, empty or invalid training data.
    Data,
    /// Remote oracle unreachable.
    Service,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to load model from {}: {reason}", .path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("data not found: {}", .0.display())]
    DataNotFound(PathBuf),

    #[error("insufficient training data: {0}")]
    InsufficientData(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("missing artifact: {0}")]
    MissingArtifact(String),

    #[error("oracle service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Serialization(#[from] bincode::Error),
}

impl ClassifierError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifierError::Configuration(_)
            | ClassifierError::ModelLoad { .. }
            | ClassifierError::DimensionMismatch { .. }
            | ClassifierError::Yaml(_) => ErrorKind::Configuration,
            ClassifierError::ServiceUnavailable(_) => ErrorKind::Service,
            ClassifierError::DataNotFound(_)
            | ClassifierError::InsufficientData(_)
            | ClassifierError::InvalidData(_)
            | ClassifierError::MissingArtifact(_)
            | ClassifierError::Io(_)
            | ClassifierError::Csv(_)
            | ClassifierError::Json(_)
            | ClassifierError::Serialization(_) => ErrorKind::Data,
        }
    }

    pub fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ClassifierError::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClassifierError>;
