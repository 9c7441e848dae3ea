use crate::artifacts::{DataTransformationArtifact, ModelTrainerArtifact};
use crate::config::ModelTrainerConfig;
use crate::embedding::HashingEmbedder;
use crate::error::Result;
use crate::records::{LogTable, MESSAGE_COLUMN, SOURCE_COLUMN, TARGET_COLUMN};
use crate::statistical_classifier::StatisticalModel;
use crate::traits::Embedder;

const STAGE: &str = "model_training";

/// Fits the statistical tier on the messages regex rules leave unresolved.
///
/// Rows from oracle-routed sources are dropped first: those messages never
/// reach the statistical tier at inference time.
pub struct ModelTrainer {
    transformation: DataTransformationArtifact,
    config: ModelTrainerConfig,
}

impl ModelTrainer {
    pub fn new(transformation: DataTransformationArtifact, config: ModelTrainerConfig) -> Self {
        Self { transformation, config }
    }

    pub fn initiate(&self) -> Result<ModelTrainerArtifact> {
        tracing::info!(stage = STAGE, "starting model training");

        let unresolved = LogTable::read_csv(self.transformation.regex_unresolved_file())
            .inspect_err(|e| tracing::error!(stage = STAGE, "cannot read unresolved table: {}", e))?;
        let idx = unresolved
            .require_columns(&[SOURCE_COLUMN, MESSAGE_COLUMN, TARGET_COLUMN])
            .inspect_err(|e| tracing::error!(stage = STAGE, "{}", e))?;
        let (source_idx, message_idx, target_idx) = (idx[0], idx[1], idx[2]);

        let routing = &self.config.routing;
        let trainable =
            unresolved.filter_rows(|_, row| !routing.is_oracle_routed(row.get(source_idx).unwrap_or_default()));
        tracing::info!(
            stage = STAGE,
            unresolved = unresolved.len(),
            oracle_routed = unresolved.len() - trainable.len(),
            trainable = trainable.len(),
            "selected training rows"
        );

        if trainable.is_empty() {
            tracing::warn!(stage = STAGE, "no rows left for the statistical classifier; skipping training");
            return ModelTrainerArtifact::skipped(self.transformation.embedding_model_file());
        }

        let embedder = HashingEmbedder::load(self.transformation.embedding_model_file())
            .inspect_err(|e| tracing::error!(stage = STAGE, "{}", e))?;
        let messages: Vec<&str> = trainable
            .rows()
            .iter()
            .map(|row| row.get(message_idx).unwrap_or_default())
            .collect();
        let labels: Vec<String> = trainable
            .rows()
            .iter()
            .map(|row| row.get(target_idx).unwrap_or_default())
            .map(str::to_string)
            .collect();
        let vectors = embedder.encode(&messages);

        let outcome = StatisticalModel::fit(&vectors, &labels, &self.config.params)
            .inspect_err(|e| tracing::error!(stage = STAGE, "training failed: {}", e))?;
        outcome
            .model
            .save(&self.config.model_file)
            .inspect_err(|e| tracing::error!(stage = STAGE, "cannot save model: {}", e))?;
        if let Some(report) = &outcome.report {
            tracing::info!(stage = STAGE, accuracy = report.accuracy, "held-out evaluation");
        }
        tracing::info!(
            stage = STAGE,
            classes = outcome.model.classes().len(),
            path = %self.config.model_file.display(),
            "model trained"
        );

        ModelTrainerArtifact::trained(
            &self.config.model_file,
            self.transformation.embedding_model_file(),
            trainable.len(),
        )
    }
}
