use crate::clustering::ClusteringParams;
use crate::embedding::EmbeddingParams;
use crate::error::{ClassifierError, Result};
use crate::routing::RoutingPolicy;
use crate::statistical_classifier::TrainerParams;
use std::env;
use std::path::{Path, PathBuf};

pub const PIPELINE_NAME: &str = "log_classifier";
pub const ARTIFACT_ROOT: &str = "artifacts";
pub const TIMESTAMP_FORMAT: &str = "%d_%m_%Y_%H_%M_%S";
pub const DEFAULT_DATA_SOURCE: &str = "data/synthetic_logs.csv";
pub const DEFAULT_SCHEMA_PATH: &str = "config/schema.yaml";
pub const FINAL_MODEL_DIR: &str = "final_model";
pub const MODEL_FILE_NAME: &str = "model.bin";
pub const EMBEDDING_MODEL_FILE_NAME: &str = "embedding_model.bin";
pub const DEFAULT_PORT: u16 = 3003;
pub const DEFAULT_ORACLE_CONCURRENCY: usize = 8;

/// Clusters larger than this get sample messages logged.
pub const CLUSTER_INSPECTION_MIN_SIZE: usize = 10;

/// Settings shared by every stage of one training run
#[derive(Debug, Clone)]
pub struct TrainingPipelineConfig {
    pub pipeline_name: String,
    pub artifact_root: PathBuf,
    /// Run id, formatted with [`TIMESTAMP_FORMAT`]
    pub timestamp: String,
    pub data_source: PathBuf,
    pub schema_path: PathBuf,
    /// YAML rule file; the built-in rules are used when absent
    pub rules_path: Option<PathBuf>,
    pub final_model_dir: PathBuf,
    /// Abort transformation when validation failed instead of warning
    pub strict_validation: bool,
    pub embedding: EmbeddingParams,
    pub clustering: ClusteringParams,
    pub trainer: TrainerParams,
    pub routing: RoutingPolicy,
}

impl Default for TrainingPipelineConfig {
    fn default() -> Self {
        Self::with_timestamp(chrono::Local::now().format(TIMESTAMP_FORMAT).to_string())
    }
}

impl TrainingPipelineConfig {
    pub fn with_timestamp(timestamp: impl Into<String>) -> Self {
        Self {
            pipeline_name: PIPELINE_NAME.to_string(),
            artifact_root: PathBuf::from(ARTIFACT_ROOT),
            timestamp: timestamp.into(),
            data_source: PathBuf::from(DEFAULT_DATA_SOURCE),
            schema_path: PathBuf::from(DEFAULT_SCHEMA_PATH),
            rules_path: None,
            final_model_dir: PathBuf::from(FINAL_MODEL_DIR),
            strict_validation: false,
            embedding: EmbeddingParams::default(),
            clustering: ClusteringParams::default(),
            trainer: TrainerParams::default(),
            routing: RoutingPolicy::default(),
        }
    }

    /// Defaults overridden by `TRAINING_DATA_FILE`, `SCHEMA_FILE`,
    /// `REGEX_RULES_FILE`, `ARTIFACT_ROOT`, `FINAL_MODEL_DIR`,
    /// `STRICT_VALIDATION` and `ORACLE_SOURCES`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = env::var("TRAINING_DATA_FILE") {
            config.data_source = PathBuf::from(path);
        }
        if let Ok(path) = env::var("SCHEMA_FILE") {
            config.schema_path = PathBuf::from(path);
        }
        config.rules_path = env::var("REGEX_RULES_FILE").ok().map(PathBuf::from);
        if let Ok(path) = env::var("ARTIFACT_ROOT") {
            config.artifact_root = PathBuf::from(path);
        }
        if let Ok(path) = env::var("FINAL_MODEL_DIR") {
            config.final_model_dir = PathBuf::from(path);
        }
        config.strict_validation = env_parse("STRICT_VALIDATION", config.strict_validation)?;
        if let Ok(sources) = env::var("ORACLE_SOURCES") {
            config.routing = RoutingPolicy::from_source_list(&sources);
        }
        Ok(config)
    }

    /// `artifacts/<timestamp>`
    pub fn artifact_dir(&self) -> PathBuf {
        self.artifact_root.join(&self.timestamp)
    }

    pub fn log_config(&self) {
        tracing::info!("📋 Training pipeline configuration:");
        tracing::info!("   Pipeline: {} (run {})", self.pipeline_name, self.timestamp);
        tracing::info!("   Data source: {}", self.data_source.display());
        tracing::info!("   Schema: {}", self.schema_path.display());
        match &self.rules_path {
            Some(path) => tracing::info!("   Regex rules: {}", path.display()),
            None => tracing::info!("   Regex rules: built-in"),
        }
        tracing::info!("   Artifacts: {}", self.artifact_dir().display());
        tracing::info!("   Final model: {}", self.final_model_dir.display());
        tracing::info!("   Strict validation: {}", self.strict_validation);
        tracing::info!(
            "   Embedding: {} dims (bigrams: {})",
            self.embedding.dimension,
            self.embedding.include_bigrams
        );
        tracing::info!(
            "   DBSCAN: eps={} min_samples={}",
            self.clustering.eps,
            self.clustering.min_samples
        );
        tracing::info!("   Oracle-routed sources: {:?}", self.routing.oracle_sources());
    }
}

#[derive(Debug, Clone)]
pub struct DataIngestionConfig {
    pub source_file: PathBuf,
    pub ingestion_dir: PathBuf,
    pub feature_store_file: PathBuf,
    pub ingested_train_file: PathBuf,
}

impl DataIngestionConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let ingestion_dir = pipeline.artifact_dir().join("data_ingestion");
        Self {
            source_file: pipeline.data_source.clone(),
            feature_store_file: ingestion_dir.join("feature_store").join("logs.csv"),
            ingested_train_file: ingestion_dir.join("ingested").join("train.csv"),
            ingestion_dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataValidationConfig {
    pub schema_path: PathBuf,
    pub validation_dir: PathBuf,
    pub validated_train_file: PathBuf,
    pub report_file: PathBuf,
}

impl DataValidationConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let validation_dir = pipeline.artifact_dir().join("data_validation");
        Self {
            schema_path: pipeline.schema_path.clone(),
            validated_train_file: validation_dir.join("validated").join("train.csv"),
            report_file: validation_dir.join("report.json"),
            validation_dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataTransformationConfig {
    pub transformation_dir: PathBuf,
    pub embeddings_file: PathBuf,
    pub embedding_model_file: PathBuf,
    pub transformed_file: PathBuf,
    pub regex_unresolved_file: PathBuf,
    pub regex_resolved_file: PathBuf,
    pub rules_path: Option<PathBuf>,
    pub strict_validation: bool,
    pub embedding: EmbeddingParams,
    pub clustering: ClusteringParams,
    pub cluster_inspection_min_size: usize,
}

impl DataTransformationConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let transformation_dir = pipeline.artifact_dir().join("data_transformation");
        let transformed = transformation_dir.join("transformed");
        Self {
            embeddings_file: transformation_dir.join("embeddings").join("embeddings.bin"),
            embedding_model_file: transformation_dir
                .join("embedding_model")
                .join(EMBEDDING_MODEL_FILE_NAME),
            transformed_file: transformed.join("transformed.csv"),
            regex_unresolved_file: transformed.join("regex_unresolved.csv"),
            regex_resolved_file: transformed.join("regex_resolved.csv"),
            rules_path: pipeline.rules_path.clone(),
            strict_validation: pipeline.strict_validation,
            embedding: pipeline.embedding,
            clustering: pipeline.clustering,
            cluster_inspection_min_size: CLUSTER_INSPECTION_MIN_SIZE,
            transformation_dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelTrainerConfig {
    pub trainer_dir: PathBuf,
    pub model_file: PathBuf,
    pub params: TrainerParams,
    pub routing: RoutingPolicy,
}

impl ModelTrainerConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        let trainer_dir = pipeline.artifact_dir().join("model_training");
        Self {
            model_file: trainer_dir.join("trained_model").join(MODEL_FILE_NAME),
            params: pipeline.trainer,
            routing: pipeline.routing.clone(),
            trainer_dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelPusherConfig {
    pub final_model_dir: PathBuf,
}

impl ModelPusherConfig {
    pub fn new(pipeline: &TrainingPipelineConfig) -> Self {
        Self {
            final_model_dir: pipeline.final_model_dir.clone(),
        }
    }

    pub fn model_file(&self) -> PathBuf {
        self.final_model_dir.join(MODEL_FILE_NAME)
    }

    pub fn embedding_model_file(&self) -> PathBuf {
        self.final_model_dir.join(EMBEDDING_MODEL_FILE_NAME)
    }
}

/// Settings for classifying with a published model
#[derive(Debug, Clone)]
pub struct ServingConfig {
    pub model_dir: PathBuf,
    pub rules_path: Option<PathBuf>,
    pub routing: RoutingPolicy,
    pub port: u16,
    pub max_concurrency: usize,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(FINAL_MODEL_DIR),
            rules_path: None,
            routing: RoutingPolicy::default(),
            port: DEFAULT_PORT,
            max_concurrency: DEFAULT_ORACLE_CONCURRENCY,
        }
    }
}

impl ServingConfig {
    /// Defaults overridden by `FINAL_MODEL_DIR`, `REGEX_RULES_FILE`,
    /// `ORACLE_SOURCES`, `CLASSIFY_PORT` and `ORACLE_MAX_CONCURRENCY`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = env::var("FINAL_MODEL_DIR") {
            config.model_dir = PathBuf::from(path);
        }
        config.rules_path = env::var("REGEX_RULES_FILE").ok().map(PathBuf::from);
        if let Ok(sources) = env::var("ORACLE_SOURCES") {
            config.routing = RoutingPolicy::from_source_list(&sources);
        }
        config.port = env_parse("CLASSIFY_PORT", config.port)?;
        config.max_concurrency = env_parse("ORACLE_MAX_CONCURRENCY", config.max_concurrency)?;
        Ok(config)
    }

    pub fn rules_path(&self) -> Option<&Path> {
        self.rules_path.as_deref()
    }

    pub fn log_config(&self) {
        tracing::info!("📋 Serving configuration:");
        tracing::info!("   Model dir: {}", self.model_dir.display());
        match &self.rules_path {
            Some(path) => tracing::info!("   Regex rules: {}", path.display()),
            None => tracing::info!("   Regex rules: built-in"),
        }
        tracing::info!("   Oracle-routed sources: {:?}", self.routing.oracle_sources());
        tracing::info!("   Port: {}", self.port);
        tracing::info!("   Max concurrent oracle calls: {}", self.max_concurrency);
    }
}

/// Parse an environment variable, falling back to `default` when unset.
pub(crate) fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ClassifierError::Configuration(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}
