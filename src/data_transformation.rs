use crate::artifacts::{DataTransformationArtifact, DataValidationArtifact, TransformationOutputs};
use crate::clustering::{summarize_clusters, ClusterSummary, Dbscan};
use crate::config::DataTransformationConfig;
use crate::embedding::HashingEmbedder;
use crate::error::{ClassifierError, Result};
use crate::records::{LogTable, CLUSTER_COLUMN, MESSAGE_COLUMN, REGEX_LABEL_COLUMN};
use crate::regex_classifier::RegexRuleSet;
use crate::traits::{Embedder, EmbeddingVector};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

const STAGE: &str = "data_transformation";

/// Embeds every training message, clusters the embeddings for inspection and
/// splits the table by whether a regex rule already resolves the message.
pub struct DataTransformation {
    validation: DataValidationArtifact,
    config: DataTransformationConfig,
}

impl DataTransformation {
    pub fn new(validation: DataValidationArtifact, config: DataTransformationConfig) -> Self {
        Self { validation, config }
    }

    pub fn initiate(&self) -> Result<DataTransformationArtifact> {
        tracing::info!(stage = STAGE, "starting data transformation");

        if !self.validation.validation_status() {
            if self.config.strict_validation {
                let err = ClassifierError::InvalidData(format!(
                    "data validation failed (missing columns: {:?})",
                    self.validation.report().missing_columns
                ));
                tracing::error!(stage = STAGE, "{}", err);
                return Err(err);
            }
            tracing::warn!(stage = STAGE, "validation_status is false; transforming anyway");
        }

        let rules = RegexRuleSet::load(self.config.rules_path.as_deref())
            .inspect_err(|e| tracing::error!(stage = STAGE, "cannot load regex rules: {}", e))?;

        let table = LogTable::read_csv(self.validation.validated_train_file())
            .inspect_err(|e| tracing::error!(stage = STAGE, "cannot read validated table: {}", e))?;
        let messages = table
            .column_values(MESSAGE_COLUMN)
            .inspect_err(|e| tracing::error!(stage = STAGE, "{}", e))?;

        // Embedding
        let embedder = HashingEmbedder::new(self.config.embedding)
            .inspect_err(|e| tracing::error!(stage = STAGE, "invalid embedding parameters: {}", e))?
            .fit(&messages);
        embedder
            .save(&self.config.embedding_model_file)
            .inspect_err(|e| tracing::error!(stage = STAGE, "cannot save embedding model: {}", e))?;
        let embeddings = embedder.encode(&messages);
        save_embeddings(&self.config.embeddings_file, &embeddings)
            .inspect_err(|e| tracing::error!(stage = STAGE, "cannot save embeddings: {}", e))?;
        tracing::info!(
            stage = STAGE,
            rows = embeddings.len(),
            dimension = embedder.dimension(),
            "generated embeddings"
        );

        // Clustering, diagnostic only
        let assignments = Dbscan::new(self.config.clustering)
            .and_then(|dbscan| dbscan.cluster(&embeddings))
            .inspect_err(|e| tracing::error!(stage = STAGE, "clustering failed: {}", e))?;
        let summary: ClusterSummary =
            summarize_clusters(&messages, &assignments, self.config.cluster_inspection_min_size);

        // Regex split
        let regex_labels = rules.match_batch(&messages);
        let resolved: Vec<bool> = regex_labels.iter().map(Option::is_some).collect();
        let regex_column: Vec<String> = regex_labels
            .iter()
            .map(|label| label.unwrap_or_default().to_string())
            .collect();
        let cluster_column: Vec<String> = assignments.iter().map(i32::to_string).collect();

        let transformed = table
            .with_column(CLUSTER_COLUMN, cluster_column)
            .and_then(|t| t.with_column(REGEX_LABEL_COLUMN, regex_column))
            .inspect_err(|e| tracing::error!(stage = STAGE, "{}", e))?;
        let unresolved_table = transformed.filter_rows(|i, _| !resolved[i]);
        let resolved_table = transformed.filter_rows(|i, _| resolved[i]);
        tracing::info!(
            stage = STAGE,
            resolved = resolved_table.len(),
            unresolved = unresolved_table.len(),
            "applied regex rules"
        );

        transformed
            .write_csv(&self.config.transformed_file)
            .and_then(|()| unresolved_table.write_csv(&self.config.regex_unresolved_file))
            .and_then(|()| resolved_table.write_csv(&self.config.regex_resolved_file))
            .inspect_err(|e| tracing::error!(stage = STAGE, "cannot save transformed tables: {}", e))?;
        tracing::info!(stage = STAGE, dir = %self.config.transformation_dir.display(), "saved transformed tables");

        DataTransformationArtifact::new(
            TransformationOutputs {
                embedding_model_file: &self.config.embedding_model_file,
                embeddings_file: &self.config.embeddings_file,
                transformed_file: &self.config.transformed_file,
                regex_unresolved_file: &self.config.regex_unresolved_file,
                regex_resolved_file: &self.config.regex_resolved_file,
            },
            self.validation.validation_status(),
            summary.cluster_count,
            summary.noise_count,
        )
    }
}

fn save_embeddings(path: &Path, embeddings: &[EmbeddingVector]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    bincode::serialize_into(BufWriter::new(File::create(path)?), embeddings)?;
    Ok(())
}

/// Read back an embedding matrix written by the transformation stage.
pub fn load_embeddings(path: impl AsRef<Path>) -> Result<Vec<EmbeddingVector>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ClassifierError::DataNotFound(path.to_path_buf()));
    }
    Ok(bincode::deserialize_from(BufReader::new(File::open(path)?))?)
}
