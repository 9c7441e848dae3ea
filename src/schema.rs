//! Declared column layout of the training table.

use crate::error::{ClassifierError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Contents of `schema.yaml`:
///
/// ```yaml
/// columns:
///   - timestamp
///   - source
///   - log_message
///   - target_label
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Load a schema file; a missing, unreadable or empty schema is a
    /// configuration error.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifierError::Configuration(format!(
                "schema file not found: {}",
                path.display()
            )));
        }
        let schema: Schema = serde_yaml::from_str(&fs::read_to_string(path)?)?;
        if schema.columns.is_empty() {
            return Err(ClassifierError::Configuration(format!(
                "schema {} declares no columns",
                path.display()
            )));
        }
        Ok(schema)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Declared columns absent from `actual`, in declaration order.
    pub fn missing_columns(&self, actual: &[String]) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !actual.contains(c))
            .cloned()
            .collect()
    }
}
