use crate::artifacts::DataIngestionArtifact;
use crate::config::DataIngestionConfig;
use crate::error::Result;
use crate::records::LogTable;
use std::fs;
use std::path::Path;

const STAGE: &str = "data_ingestion";

/// Snapshots the source table into the run's artifact directory.
pub struct DataIngestion {
    config: DataIngestionConfig,
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig) -> Self {
        Self { config }
    }

    pub fn initiate(&self) -> Result<DataIngestionArtifact> {
        tracing::info!(stage = STAGE, source = %self.config.source_file.display(), "starting data ingestion");

        let table = LogTable::read_csv(&self.config.source_file)
            .inspect_err(|e| tracing::error!(stage = STAGE, "cannot read source table: {}", e))?;

        snapshot(&self.config.source_file, &self.config.feature_store_file)
            .inspect_err(|e| tracing::error!(stage = STAGE, "cannot write feature store: {}", e))?;
        tracing::info!(stage = STAGE, path = %self.config.feature_store_file.display(), "exported feature store snapshot");

        table
            .write_csv(&self.config.ingested_train_file)
            .inspect_err(|e| tracing::error!(stage = STAGE, "cannot write training table: {}", e))?;
        tracing::info!(
            stage = STAGE,
            rows = table.len(),
            columns = table.headers().len(),
            path = %self.config.ingested_train_file.display(),
            "exported training table"
        );

        DataIngestionArtifact::new(
            &self.config.feature_store_file,
            &self.config.ingested_train_file,
            table.len(),
            table.headers().to_vec(),
        )
    }
}

/// Byte-for-byte copy of the source file.
fn snapshot(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingPipelineConfig;
    use crate::error::ClassifierError;

    #[test]
    fn test_missing_source_is_data_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = TrainingPipelineConfig::with_timestamp("run");
        pipeline.artifact_root = dir.path().join("artifacts");
        pipeline.data_source = dir.path().join("absent.csv");

        let err = DataIngestion::new(DataIngestionConfig::new(&pipeline)).initiate().unwrap_err();
        assert!(matches!(err, ClassifierError::DataNotFound(_)));
    }

    #[test]
    fn test_snapshot_written_twice() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("logs.csv");
        fs::write(&source, "source,log_message\nModernCRM,hello\nBillingSystem,world\n").unwrap();

        let mut pipeline = TrainingPipelineConfig::with_timestamp("run");
        pipeline.artifact_root = dir.path().join("artifacts");
        pipeline.data_source = source;

        let artifact = DataIngestion::new(DataIngestionConfig::new(&pipeline)).initiate().unwrap();
        assert_eq!(artifact.row_count(), 2);
        assert_eq!(artifact.columns(), ["source".to_string(), "log_message".to_string()]);
        assert_eq!(
            fs::read_to_string(artifact.feature_store_file()).unwrap(),
            fs::read_to_string(artifact.train_file()).unwrap()
        );
    }

    #[test]
    fn test_short_row_does_not_abort_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("logs.csv");
        let raw = "source,log_message,target_label\n\
ModernCRM,User User1 logged in.,User Action\n\
BillingSystem,Payment batch failed\n";
        fs::write(&source, raw).unwrap();

        let mut pipeline = TrainingPipelineConfig::with_timestamp("run");
        pipeline.artifact_root = dir.path().join("artifacts");
        pipeline.data_source = source;

        let artifact = DataIngestion::new(DataIngestionConfig::new(&pipeline)).initiate().unwrap();
        assert_eq!(artifact.row_count(), 2);
        assert_eq!(fs::read_to_string(artifact.feature_store_file()).unwrap(), raw);

        let train = LogTable::read_csv(artifact.train_file()).unwrap();
        assert_eq!(train.column_values("target_label").unwrap(), vec!["User Action", ""]);
    }
}
