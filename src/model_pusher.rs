use crate::artifacts::{ModelPusherArtifact, ModelTrainerArtifact};
use crate::config::ModelPusherConfig;
use crate::error::{ClassifierError, Result};
use std::fs;
use std::path::Path;

const STAGE: &str = "model_pusher";
const MODEL_EXTENSION: &str = "bin";

/// Publishes the trained model and its embedding model to the stable
/// directory serving loads from.
pub struct ModelPusher {
    trainer: ModelTrainerArtifact,
    config: ModelPusherConfig,
}

impl ModelPusher {
    pub fn new(trainer: ModelTrainerArtifact, config: ModelPusherConfig) -> Self {
        Self { trainer, config }
    }

    pub fn initiate(&self) -> Result<ModelPusherArtifact> {
        tracing::info!(stage = STAGE, dest = %self.config.final_model_dir.display(), "publishing model");

        let Some(model_file) = self.trainer.model_file() else {
            let err = ClassifierError::MissingArtifact(
                "no trained model to publish; training was skipped".to_string(),
            );
            tracing::error!(stage = STAGE, "{}", err);
            return Err(err);
        };

        fs::create_dir_all(&self.config.final_model_dir)?;
        copy_with_validation(model_file, &self.config.model_file())?;
        copy_with_validation(self.trainer.embedding_model_file(), &self.config.embedding_model_file())?;

        ModelPusherArtifact::new(&self.config.model_file(), &self.config.embedding_model_file())
    }
}

/// Copy a model file, refusing anything without the model extension.
fn copy_with_validation(source: &Path, destination: &Path) -> Result<()> {
    if !source.is_file() {
        let err = ClassifierError::MissingArtifact(format!("model file not found at {}", source.display()));
        tracing::error!(stage = STAGE, "{}", err);
        return Err(err);
    }
    if source.extension().and_then(|e| e.to_str()) != Some(MODEL_EXTENSION) {
        let err = ClassifierError::InvalidData(format!(
            "refusing to publish {}: expected a .{} file",
            source.display(),
            MODEL_EXTENSION
        ));
        tracing::error!(stage = STAGE, "{}", err);
        return Err(err);
    }

    fs::copy(source, destination)?;
    tracing::info!(stage = STAGE, from = %source.display(), to = %destination.display(), "copied model file");
    Ok(())
}
