// Core records and errors
pub mod error;
pub mod records;

// Classification tiers
pub mod cascade;
pub mod embedding;
pub mod llm_oracle;
pub mod oracle_config;
pub mod regex_classifier;
pub mod routing;
pub mod statistical_classifier;
pub mod traits;

// Training support
pub mod classification_report;
pub mod clustering;
pub mod dataset_splitter;

// Training pipeline stages
pub mod artifacts;
pub mod config;
pub mod data_ingestion;
pub mod data_transformation;
pub mod data_validation;
pub mod model_pusher;
pub mod model_trainer;
pub mod schema;
pub mod training_pipeline;

// Serving
pub mod http_api;
pub mod serving;

pub use error::{ClassifierError, Result};
