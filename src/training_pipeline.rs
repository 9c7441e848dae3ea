/// Training pipeline orchestration
///
/// Runs the stages strictly in order, each consuming the artifact of the
/// previous one:
/// - Ingestion: snapshot the source table
/// - Validation: compare against the schema (non-fatal on mismatch)
/// - Transformation: embed, cluster, regex split
/// - Training: fit the statistical tier
/// - Publishing: copy the models to the serving directory
///
/// The first failing stage aborts the run.
use crate::artifacts::ModelPusherArtifact;
use crate::config::{
    DataIngestionConfig, DataTransformationConfig, DataValidationConfig, ModelPusherConfig, ModelTrainerConfig,
    TrainingPipelineConfig,
};
use crate::data_ingestion::DataIngestion;
use crate::data_transformation::DataTransformation;
use crate::data_validation::DataValidation;
use crate::error::Result;
use crate::model_pusher::ModelPusher;
use crate::model_trainer::ModelTrainer;
use std::time::Instant;

pub struct TrainingPipeline {
    config: TrainingPipelineConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingPipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingPipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<ModelPusherArtifact> {
        let start = Instant::now();
        tracing::info!(
            pipeline = %self.config.pipeline_name,
            run = %self.config.timestamp,
            "🚀 starting training pipeline"
        );

        let ingestion = DataIngestion::new(DataIngestionConfig::new(&self.config)).initiate()?;
        let validation = DataValidation::new(ingestion, DataValidationConfig::new(&self.config))?.initiate()?;
        let transformation =
            DataTransformation::new(validation, DataTransformationConfig::new(&self.config)).initiate()?;
        let trainer = ModelTrainer::new(transformation, ModelTrainerConfig::new(&self.config)).initiate()?;
        let pushed = ModelPusher::new(trainer, ModelPusherConfig::new(&self.config)).initiate()?;

        tracing::info!(
            pipeline = %self.config.pipeline_name,
            run = %self.config.timestamp,
            model = %pushed.model_file().display(),
            "✅ training pipeline finished in {:.2?}",
            start.elapsed()
        );
        Ok(pushed)
    }
}
