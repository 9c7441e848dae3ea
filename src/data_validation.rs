use crate::artifacts::{DataIngestionArtifact, DataValidationArtifact, ValidationReport};
use crate::config::DataValidationConfig;
use crate::error::{ClassifierError, Result};
use crate::records::LogTable;
use crate::schema::Schema;
use std::fs;

const STAGE: &str = "data_validation";

/// Checks the ingested table against the declared schema.
///
/// A mismatch does not stop the run: it is recorded in the report and the
/// artifact's status flag for later stages to act on.
pub struct DataValidation {
    ingestion: DataIngestionArtifact,
    config: DataValidationConfig,
    schema: Schema,
}

impl DataValidation {
    pub fn new(ingestion: DataIngestionArtifact, config: DataValidationConfig) -> Result<Self> {
        let schema = Schema::from_yaml_file(&config.schema_path)
            .inspect_err(|e| tracing::error!(stage = STAGE, "cannot load schema: {}", e))?;
        Ok(Self::with_schema(ingestion, config, schema))
    }

    pub fn with_schema(ingestion: DataIngestionArtifact, config: DataValidationConfig, schema: Schema) -> Self {
        Self {
            ingestion,
            config,
            schema,
        }
    }

    pub fn validate_number_of_columns(&self, table: &LogTable) -> bool {
        let actual = table.headers().len();
        let expected = self.schema.column_count();
        if actual == expected {
            tracing::info!(stage = STAGE, columns = actual, "column count matches schema");
            true
        } else {
            tracing::error!(stage = STAGE, actual, expected, "column count differs from schema");
            false
        }
    }

    pub fn missing_columns(&self, table: &LogTable) -> Vec<String> {
        let missing = self.schema.missing_columns(table.headers());
        if missing.is_empty() {
            tracing::info!(stage = STAGE, "all schema columns present");
        } else {
            tracing::error!(stage = STAGE, "missing columns: {:?}", missing);
        }
        missing
    }

    pub fn initiate(&self) -> Result<DataValidationArtifact> {
        tracing::info!(stage = STAGE, "starting data validation");

        let table = LogTable::read_csv(self.ingestion.train_file())
            .inspect_err(|e| tracing::error!(stage = STAGE, "cannot read ingested table: {}", e))?;
        if table.is_empty() {
            let err = ClassifierError::InvalidData(format!(
                "training table {} has no rows",
                self.ingestion.train_file().display()
            ));
            tracing::error!(stage = STAGE, "{}", err);
            return Err(err);
        }

        // Both checks always run so the report is complete
        let column_count_ok = self.validate_number_of_columns(&table);
        let missing_columns = self.missing_columns(&table);
        let report = ValidationReport {
            column_count_ok,
            expected_columns: self.schema.columns.clone(),
            actual_columns: table.headers().to_vec(),
            missing_columns,
        };

        if report.is_valid() {
            tracing::info!(stage = STAGE, "data validation passed");
        } else {
            tracing::warn!(stage = STAGE, "data validation failed; continuing with validation_status=false");
        }

        table.write_csv(&self.config.validated_train_file)?;
        if let Some(parent) = self.config.report_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config.report_file, serde_json::to_string_pretty(&report)?)?;
        tracing::info!(stage = STAGE, report = %self.config.report_file.display(), "wrote validation report");

        DataValidationArtifact::new(&self.config.validated_train_file, &self.config.report_file, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingPipelineConfig;

    fn ingested(dir: &std::path::Path, content: &str) -> DataIngestionArtifact {
        let path = dir.join("train.csv");
        fs::write(&path, content).unwrap();
        let table = LogTable::read_csv(&path).unwrap();
        DataIngestionArtifact::new(&path, &path, table.len(), table.headers().to_vec()).unwrap()
    }

    fn validation(dir: &std::path::Path, ingestion: DataIngestionArtifact) -> DataValidation {
        let mut pipeline = TrainingPipelineConfig::with_timestamp("run");
        pipeline.artifact_root = dir.join("artifacts");
        let schema = Schema::new(["timestamp", "source", "log_message", "target_label"]);
        DataValidation::with_schema(ingestion, DataValidationConfig::new(&pipeline), schema)
    }

    #[test]
    fn test_matching_table_passes() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = ingested(
            dir.path(),
            "timestamp,source,log_message,target_label\n2025-01-01,ModernCRM,hello,User Action\n",
        );
        let artifact = validation(dir.path(), ingestion).initiate().unwrap();

        assert!(artifact.validation_status());
        let report: ValidationReport =
            serde_json::from_str(&fs::read_to_string(artifact.report_file()).unwrap()).unwrap();
        assert_eq!(&report, artifact.report());
    }

    #[test]
    fn test_missing_column_is_flagged_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = ingested(
            dir.path(),
            "source,log_message,target_label\nModernCRM,hello,User Action\n",
        );
        let artifact = validation(dir.path(), ingestion).initiate().unwrap();

        assert!(!artifact.validation_status());
        assert!(!artifact.report().column_count_ok);
        assert_eq!(artifact.report().missing_columns, vec!["timestamp".to_string()]);
        assert!(artifact.validated_train_file().exists());
    }

    #[test]
    fn test_empty_table_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = ingested(dir.path(), "timestamp,source,log_message,target_label\n");
        let err = validation(dir.path(), ingestion).initiate().unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidData(_)));
    }
}
