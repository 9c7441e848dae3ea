/// Train/validation split for the statistical classifier
///
/// Splits labeled samples so that a held-out set can produce a quality
/// report after fitting:
/// - Train set: fit the model
/// - Validation set: evaluate precision/recall per label
///
/// Supports stratified splitting so every label with at least two samples
/// appears on both sides. Splits are reproducible for a fixed seed.
use crate::error::{ClassifierError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

impl DatasetSplit {
    /// Get statistics about the split
    pub fn stats(&self, labels: &[String]) -> SplitStats {
        let train_labels: BTreeSet<&str> = self
            .train_indices
            .iter()
            .map(|&i| labels[i].as_str())
            .collect();

        let test_labels: BTreeSet<&str> = self
            .test_indices
            .iter()
            .map(|&i| labels[i].as_str())
            .collect();

        SplitStats {
            train_size: self.train_indices.len(),
            test_size: self.test_indices.len(),
            train_labels: train_labels.len(),
            test_labels: test_labels.len(),
            total_size: self.train_indices.len() + self.test_indices.len(),
            total_labels: train_labels.union(&test_labels).count(),
        }
    }
}

#[derive(Debug)]
pub struct SplitStats {
    pub train_size: usize,
    pub test_size: usize,
    pub train_labels: usize,
    pub test_labels: usize,
    pub total_size: usize,
    pub total_labels: usize,
}

impl SplitStats {
    pub fn train_ratio(&self) -> f64 {
        self.train_size as f64 / self.total_size as f64
    }

    pub fn test_ratio(&self) -> f64 {
        self.test_size as f64 / self.total_size as f64
    }
}

/// Configuration for dataset splitting
#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfig {
    /// Ratio of data to use for training (0.0 to 1.0)
    pub train_ratio: f64,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Whether to use stratified split (keep every label on both sides)
    pub stratified: bool,
    /// Minimum samples per label in the validation set (for stratified split)
    pub min_test_samples: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            seed: 42,
            stratified: true,
            min_test_samples: 1,
        }
    }
}

/// Split sample indices into train and validation sets
pub fn split_labeled(labels: &[String], config: &SplitConfig) -> Result<DatasetSplit> {
    if !(0.0..=1.0).contains(&config.train_ratio) {
        return Err(ClassifierError::Configuration(format!(
            "train_ratio must be within [0, 1], got {}",
            config.train_ratio
        )));
    }

    if config.stratified {
        Ok(stratified_split(labels, config))
    } else {
        Ok(random_split(labels.len(), config))
    }
}

/// Simple random split (may not include all labels in both sets)
fn random_split(len: usize, config: &SplitConfig) -> DatasetSplit {
    let mut rng = rand::rngs::StdRng::seed_from_u64(config.seed);
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(&mut rng);

    let train_size = (len as f64 * config.train_ratio) as usize;
    let test_indices = indices.split_off(train_size);

    DatasetSplit {
        train_indices: indices,
        test_indices,
    }
}

/// Stratified split - labels with two or more samples land on both sides,
/// singleton labels stay in the train set
fn stratified_split(labels: &[String], config: &SplitConfig) -> DatasetSplit {
    // Group indices by label; BTreeMap keeps the rng draw order stable
    let mut label_groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        label_groups.entry(label.as_str()).or_default().push(i);
    }

    let mut rng = rand::rngs::StdRng::seed_from_u64(config.seed);
    let mut train_indices = Vec::new();
    let mut test_indices = Vec::new();

    for indices in label_groups.values_mut() {
        indices.shuffle(&mut rng);

        if indices.len() == 1 {
            train_indices.push(indices[0]);
            continue;
        }

        let label_train_size = (indices.len() as f64 * config.train_ratio) as usize;

        // Ensure at least min_test_samples in validation set
        let label_train_size = if indices.len() - label_train_size < config.min_test_samples {
            indices.len().saturating_sub(config.min_test_samples)
        } else {
            label_train_size
        };

        // Also ensure at least 1 in train set
        let label_train_size = label_train_size.max(1);

        train_indices.extend_from_slice(&indices[..label_train_size]);
        test_indices.extend_from_slice(&indices[label_train_size..]);
    }

    // Shuffle the final indices to mix labels
    train_indices.shuffle(&mut rng);
    test_indices.shuffle(&mut rng);

    DatasetSplit {
        train_indices,
        test_indices,
    }
}
