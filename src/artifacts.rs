/// Immutable records handed from one training stage to the next
///
/// Every constructor checks that the files it points at exist, so a stage
/// can never receive an artifact describing output that was not written.
use crate::error::{ClassifierError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn require_file(path: &Path, what: &str) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(ClassifierError::MissingArtifact(format!(
            "{what} not found at {}",
            path.display()
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataIngestionArtifact {
    feature_store_file: PathBuf,
    train_file: PathBuf,
    row_count: usize,
    columns: Vec<String>,
}

impl DataIngestionArtifact {
    pub fn new(
        feature_store_file: &Path,
        train_file: &Path,
        row_count: usize,
        columns: Vec<String>,
    ) -> Result<Self> {
        Ok(Self {
            feature_store_file: require_file(feature_store_file, "feature store snapshot")?,
            train_file: require_file(train_file, "ingested training table")?,
            row_count,
            columns,
        })
    }

    pub fn feature_store_file(&self) -> &Path {
        &self.feature_store_file
    }

    pub fn train_file(&self) -> &Path {
        &self.train_file
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Outcome of checking the training table against the schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub column_count_ok: bool,
    pub expected_columns: Vec<String>,
    pub actual_columns: Vec<String>,
    pub missing_columns: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.column_count_ok && self.missing_columns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataValidationArtifact {
    validation_status: bool,
    validated_train_file: PathBuf,
    report_file: PathBuf,
    report: ValidationReport,
}

impl DataValidationArtifact {
    /// The status flag is derived from the report, never set independently.
    pub fn new(validated_train_file: &Path, report_file: &Path, report: ValidationReport) -> Result<Self> {
        Ok(Self {
            validation_status: report.is_valid(),
            validated_train_file: require_file(validated_train_file, "validated training table")?,
            report_file: require_file(report_file, "validation report")?,
            report,
        })
    }

    pub fn validation_status(&self) -> bool {
        self.validation_status
    }

    pub fn validated_train_file(&self) -> &Path {
        &self.validated_train_file
    }

    pub fn report_file(&self) -> &Path {
        &self.report_file
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataTransformationArtifact {
    validation_status: bool,
    embedding_model_file: PathBuf,
    embeddings_file: PathBuf,
    transformed_file: PathBuf,
    regex_unresolved_file: PathBuf,
    regex_resolved_file: PathBuf,
    cluster_count: usize,
    noise_count: usize,
}

/// Files written by the transformation stage.
#[derive(Debug, Clone, Copy)]
pub struct TransformationOutputs<'a> {
    pub embedding_model_file: &'a Path,
    pub embeddings_file: &'a Path,
    pub transformed_file: &'a Path,
    pub regex_unresolved_file: &'a Path,
    pub regex_resolved_file: &'a Path,
}

impl DataTransformationArtifact {
    pub fn new(
        outputs: TransformationOutputs<'_>,
        validation_status: bool,
        cluster_count: usize,
        noise_count: usize,
    ) -> Result<Self> {
        Ok(Self {
            validation_status,
            embedding_model_file: require_file(outputs.embedding_model_file, "embedding model")?,
            embeddings_file: require_file(outputs.embeddings_file, "embedding matrix")?,
            transformed_file: require_file(outputs.transformed_file, "transformed table")?,
            regex_unresolved_file: require_file(outputs.regex_unresolved_file, "regex-unresolved table")?,
            regex_resolved_file: require_file(outputs.regex_resolved_file, "regex-resolved table")?,
            cluster_count,
            noise_count,
        })
    }

    /// Carried over from validation so later stages can still observe it
    pub fn validation_status(&self) -> bool {
        self.validation_status
    }

    pub fn embedding_model_file(&self) -> &Path {
        &self.embedding_model_file
    }

    pub fn embeddings_file(&self) -> &Path {
        &self.embeddings_file
    }

    pub fn transformed_file(&self) -> &Path {
        &self.transformed_file
    }

    pub fn regex_unresolved_file(&self) -> &Path {
        &self.regex_unresolved_file
    }

    pub fn regex_resolved_file(&self) -> &Path {
        &self.regex_resolved_file
    }

    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    pub fn noise_count(&self) -> usize {
        self.noise_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTrainerArtifact {
    /// `None` when there was nothing to train on
    model_file: Option<PathBuf>,
    embedding_model_file: PathBuf,
    training_rows: usize,
}

impl ModelTrainerArtifact {
    pub fn trained(model_file: &Path, embedding_model_file: &Path, training_rows: usize) -> Result<Self> {
        Ok(Self {
            model_file: Some(require_file(model_file, "trained model")?),
            embedding_model_file: require_file(embedding_model_file, "embedding model")?,
            training_rows,
        })
    }

    pub fn skipped(embedding_model_file: &Path) -> Result<Self> {
        Ok(Self {
            model_file: None,
            embedding_model_file: require_file(embedding_model_file, "embedding model")?,
            training_rows: 0,
        })
    }

    pub fn model_file(&self) -> Option<&Path> {
        self.model_file.as_deref()
    }

    pub fn embedding_model_file(&self) -> &Path {
        &self.embedding_model_file
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    pub fn is_trained(&self) -> bool {
        self.model_file.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPusherArtifact {
    model_file: PathBuf,
    embedding_model_file: PathBuf,
}

impl ModelPusherArtifact {
    pub fn new(model_file: &Path, embedding_model_file: &Path) -> Result<Self> {
        Ok(Self {
            model_file: require_file(model_file, "published model")?,
            embedding_model_file: require_file(embedding_model_file, "published embedding model")?,
        })
    }

    pub fn model_file(&self) -> &Path {
        &self.model_file
    }

    pub fn embedding_model_file(&self) -> &Path {
        &self.embedding_model_file
    }

    /// Directory serving loads from
    pub fn model_dir(&self) -> Option<&Path> {
        self.model_file.parent()
    }
}
