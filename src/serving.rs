//! Loading published models and classifying uploaded tables.

use crate::cascade::ClassificationCascade;
use crate::config::{EMBEDDING_MODEL_FILE_NAME, MODEL_FILE_NAME};
use crate::embedding::HashingEmbedder;
use crate::error::Result;
use crate::records::{LogTable, MESSAGE_COLUMN, SOURCE_COLUMN, TARGET_COLUMN};
use crate::regex_classifier::RegexRuleSet;
use crate::statistical_classifier::StatisticalModel;
use crate::traits::{Embedder, LogOracle};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The embedding model and classifier published by one training run,
/// loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    dir: PathBuf,
    embedder: Arc<HashingEmbedder>,
    model: Arc<StatisticalModel>,
}

impl ModelBundle {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let embedder = HashingEmbedder::load(dir.join(EMBEDDING_MODEL_FILE_NAME))?;
        let model = StatisticalModel::load(dir.join(MODEL_FILE_NAME))?;
        tracing::info!(
            component = "ModelBundle",
            dir = %dir.display(),
            classes = model.classes().len(),
            dimension = model.dimension(),
            "loaded models"
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            embedder: Arc::new(embedder),
            model: Arc::new(model),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn embedder(&self) -> Arc<HashingEmbedder> {
        Arc::clone(&self.embedder)
    }

    pub fn model(&self) -> Arc<StatisticalModel> {
        Arc::clone(&self.model)
    }

    /// Build a cascade over these models.
    pub fn cascade(&self, rules: Arc<RegexRuleSet>, oracle: Arc<dyn LogOracle>) -> Result<ClassificationCascade> {
        let embedder: Arc<dyn Embedder> = self.embedder();
        ClassificationCascade::new(rules, embedder, self.model(), oracle)
    }
}

/// Append a `target_label` column holding the cascade's label for each row.
/// All other columns pass through unchanged.
pub async fn classify_table(cascade: &ClassificationCascade, table: LogTable) -> Result<LogTable> {
    table.require_columns(&[SOURCE_COLUMN, MESSAGE_COLUMN])?;
    let records = table.log_records()?;
    let labels = cascade
        .classify_many(&records)
        .await?
        .into_iter()
        .map(|c| c.label)
        .collect();
    table.with_column(TARGET_COLUMN, labels)
}

/// Read a CSV table, classify it and write the augmented table.
/// Returns the number of rows classified.
pub async fn classify_csv<R: Read, W: Write>(cascade: &ClassificationCascade, reader: R, writer: W) -> Result<usize> {
    let table = LogTable::from_reader(reader)?;
    let classified = classify_table(cascade, table).await?;
    classified.write_to(writer)?;
    tracing::info!(component = "serving", rows = classified.len(), "classified table");
    Ok(classified.len())
}
