//! Multinomial logistic regression over message embeddings.
//!
//! Training holds out a stratified validation split (fixed seed) and logs a
//! classification report for it. The fitted model is plain data persisted
//! with bincode; it never changes after `fit` returns.

use crate::classification_report::ClassificationReport;
use crate::dataset_splitter::{split_labeled, SplitConfig};
use crate::error::{ClassifierError, Result};
use crate::records::UNCLASSIFIED;
use crate::traits::EmbeddingVector;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Below this maximum posterior the prediction is reported as "Unclassified".
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainerParams {
    pub learning_rate: f32,
    pub max_iter: usize,
    pub l2: f32,
    /// Stop once the loss improves by less than this between iterations.
    pub tolerance: f32,
    pub train_ratio: f64,
    pub seed: u64,
}

impl Default for TrainerParams {
    fn default() -> Self {
        Self {
            learning_rate: 1.0,
            max_iter: 1000,
            l2: 1e-4,
            tolerance: 1e-6,
            train_ratio: 0.8,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    /// Maximum posterior probability across classes.
    pub confidence: f32,
}

impl Prediction {
    pub fn is_unclassified(&self) -> bool {
        self.label == UNCLASSIFIED
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalModel {
    classes: Vec<String>,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    dimension: usize,
}

#[derive(Debug)]
pub struct TrainingOutcome {
    pub model: StatisticalModel,
    /// Report on the held-out split; `None` when nothing was held out.
    pub report: Option<ClassificationReport>,
}

impl StatisticalModel {
    /// Build a model from known parameters: one weight row and one bias per class.
    pub fn from_parameters(classes: Vec<String>, weights: Vec<Vec<f32>>, bias: Vec<f32>) -> Result<Self> {
        let model = Self {
            dimension: weights.first().map(Vec::len).unwrap_or(0),
            classes,
            weights,
            bias,
        };
        model.check_shape()?;
        Ok(model)
    }

    fn check_shape(&self) -> Result<()> {
        if self.classes.len() < 2 {
            return Err(ClassifierError::InvalidData(format!(
                "a classifier needs at least two classes, got {}",
                self.classes.len()
            )));
        }
        if self.weights.len() != self.classes.len() || self.bias.len() != self.classes.len() {
            return Err(ClassifierError::InvalidData(format!(
                "{} classes but {} weight rows and {} biases",
                self.classes.len(),
                self.weights.len(),
                self.bias.len()
            )));
        }
        if self.dimension == 0 {
            return Err(ClassifierError::InvalidData("weight rows are empty".to_string()));
        }
        if let Some(row) = self.weights.iter().find(|w| w.len() != self.dimension) {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.dimension,
                actual: row.len(),
            });
        }
        Ok(())
    }

    /// Fit on `vectors[i] -> labels[i]`.
    pub fn fit(vectors: &[EmbeddingVector], labels: &[String], params: &TrainerParams) -> Result<TrainingOutcome> {
        if vectors.is_empty() {
            return Err(ClassifierError::InsufficientData("no training samples".to_string()));
        }
        if vectors.len() != labels.len() {
            return Err(ClassifierError::InvalidData(format!(
                "{} vectors but {} labels",
                vectors.len(),
                labels.len()
            )));
        }

        let dimension = vectors[0].len();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(ClassifierError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        let classes: Vec<String> = labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if classes.len() < 2 {
            return Err(ClassifierError::InsufficientData(format!(
                "need at least two distinct labels, got {:?}",
                classes
            )));
        }

        let split = split_labeled(
            labels,
            &SplitConfig {
                train_ratio: params.train_ratio,
                seed: params.seed,
                stratified: true,
                min_test_samples: 1,
            },
        )?;
        let stats = split.stats(labels);
        tracing::info!(
            component = "StatisticalModel",
            train = stats.train_size,
            validation = stats.test_size,
            train_ratio = stats.train_ratio(),
            validation_ratio = stats.test_ratio(),
            train_labels = stats.train_labels,
            validation_labels = stats.test_labels,
            classes = stats.total_labels,
            dimension,
            "fitting logistic regression"
        );

        let targets: Vec<usize> = labels
            .iter()
            .map(|l| classes.binary_search(l).unwrap_or(0))
            .collect();

        let mut model = Self {
            weights: vec![vec![0.0; dimension]; classes.len()],
            bias: vec![0.0; classes.len()],
            classes,
            dimension,
        };
        model.gradient_descent(vectors, &targets, &split.train_indices, params);

        let report = if split.test_indices.is_empty() {
            None
        } else {
            let expected: Vec<String> = split.test_indices.iter().map(|&i| labels[i].clone()).collect();
            let predicted: Vec<String> = split
                .test_indices
                .iter()
                .map(|&i| model.argmax_label(&vectors[i]))
                .collect();
            let report = ClassificationReport::compute(&expected, &predicted);
            tracing::info!(component = "StatisticalModel", "classification report:\n{}", report);
            Some(report)
        };

        Ok(TrainingOutcome { model, report })
    }

    fn gradient_descent(&mut self, vectors: &[EmbeddingVector], targets: &[usize], rows: &[usize], params: &TrainerParams) {
        let k = self.classes.len();
        let n = rows.len().max(1) as f32;
        let mut previous_loss = f32::INFINITY;

        for iteration in 0..params.max_iter {
            let mut grad_w = vec![vec![0.0f32; self.dimension]; k];
            let mut grad_b = vec![0.0f32; k];
            let mut loss = 0.0f32;

            for &row in rows {
                let x = &vectors[row];
                let probs = self.probabilities(x);
                loss -= probs[targets[row]].max(f32::MIN_POSITIVE).ln();

                for c in 0..k {
                    let diff = probs[c] - if c == targets[row] { 1.0 } else { 0.0 };
                    grad_b[c] += diff;
                    for (g, xi) in grad_w[c].iter_mut().zip(x) {
                        *g += diff * xi;
                    }
                }
            }

            loss /= n;
            let penalty: f32 = self.weights.iter().flatten().map(|w| w * w).sum();
            loss += 0.5 * params.l2 * penalty;

            for c in 0..k {
                for (w, g) in self.weights[c].iter_mut().zip(&grad_w[c]) {
                    *w -= params.learning_rate * (g / n + params.l2 * *w);
                }
                self.bias[c] -= params.learning_rate * grad_b[c] / n;
            }

            if (previous_loss - loss).abs() < params.tolerance {
                tracing::debug!(component = "StatisticalModel", iteration, loss, "converged");
                return;
            }
            previous_loss = loss;
        }
        tracing::debug!(component = "StatisticalModel", loss = previous_loss, "reached max_iter");
    }

    fn probabilities(&self, x: &[f32]) -> Vec<f32> {
        let logits: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(w, b)| w.iter().zip(x).map(|(wi, xi)| wi * xi).sum::<f32>() + b)
            .collect();

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    }

    fn argmax(probs: &[f32]) -> (usize, f32) {
        probs
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best })
    }

    fn argmax_label(&self, x: &[f32]) -> String {
        let (idx, _) = Self::argmax(&self.probabilities(x));
        self.classes[idx].clone()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Posterior probability per class, in `classes()` order.
    pub fn predict_proba(&self, vector: &[f32]) -> Result<Vec<f32>> {
        self.check_dimension(vector)?;
        Ok(self.probabilities(vector))
    }

    /// Most probable label, or "Unclassified" when its probability is below
    /// [`CONFIDENCE_THRESHOLD`].
    pub fn predict(&self, vector: &[f32]) -> Result<Prediction> {
        let probs = self.predict_proba(vector)?;
        let (idx, confidence) = Self::argmax(&probs);

        let label = if confidence < CONFIDENCE_THRESHOLD {
            UNCLASSIFIED.to_string()
        } else {
            self.classes[idx].clone()
        };
        Ok(Prediction { label, confidence })
    }

    pub fn predict_batch(&self, vectors: &[EmbeddingVector]) -> Result<Vec<Prediction>> {
        vectors.par_iter().map(|v| self.predict(v)).collect()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        tracing::info!(component = "StatisticalModel", path = %path.display(), "saved model");
        Ok(())
    }

    /// Load a persisted model; absent or corrupt files are `ModelLoad` errors.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifierError::model_load(path, "file not found"));
        }
        let reader = BufReader::new(File::open(path)?);
        let model: StatisticalModel = bincode::deserialize_from(reader)
            .map_err(|e| ClassifierError::model_load(path, format!("corrupt model: {e}")))?;
        model
            .check_shape()
            .map_err(|e| ClassifierError::model_load(path, format!("corrupt model: {e}")))?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn blob(center: [f32; 3], n: usize, rng: &mut rand::rngs::StdRng) -> Vec<EmbeddingVector> {
        (0..n)
            .map(|_| center.iter().map(|c| *c + rng.gen_range(-0.1f32..0.1)).collect())
            .collect()
    }

    fn three_class_data() -> (Vec<EmbeddingVector>, Vec<String>) {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut vectors = Vec::new();
        let mut labels = Vec::new();
        for (center, label) in [
            ([1.0, 0.0, 0.0], "HTTP Status"),
            ([0.0, 1.0, 0.0], "Security Alert"),
            ([0.0, 0.0, 1.0], "Critical Error"),
        ] {
            vectors.extend(blob(center, 12, &mut rng));
            labels.extend(std::iter::repeat(label.to_string()).take(12));
        }
        (vectors, labels)
    }

    #[test]
    fn test_fit_separable_data() {
        let (vectors, labels) = three_class_data();
        let outcome = StatisticalModel::fit(&vectors, &labels, &TrainerParams::default()).unwrap();
        let model = outcome.model;

        assert_eq!(model.classes().len(), 3);
        assert_eq!(model.dimension(), 3);

        let prediction = model.predict(&[0.95, 0.05, 0.0]).unwrap();
        assert_eq!(prediction.label, "HTTP Status");
        assert!(prediction.confidence >= CONFIDENCE_THRESHOLD);

        let report = outcome.report.expect("validation split should not be empty");
        assert!(report.accuracy > 0.9, "accuracy was {}", report.accuracy);
    }

    #[test]
    fn test_fit_is_reproducible() {
        let (vectors, labels) = three_class_data();
        let a = StatisticalModel::fit(&vectors, &labels, &TrainerParams::default()).unwrap();
        let b = StatisticalModel::fit(&vectors, &labels, &TrainerParams::default()).unwrap();
        assert_eq!(a.model, b.model);
    }

    #[test]
    fn test_insufficient_data() {
        let err = StatisticalModel::fit(&[], &[], &TrainerParams::default()).unwrap_err();
        assert!(matches!(err, ClassifierError::InsufficientData(_)));

        let vectors = vec![vec![1.0, 0.0], vec![0.9, 0.1]];
        let labels = vec!["Error".to_string(), "Error".to_string()];
        let err = StatisticalModel::fit(&vectors, &labels, &TrainerParams::default()).unwrap_err();
        assert!(matches!(err, ClassifierError::InsufficientData(_)));

        let err = StatisticalModel::fit(&vectors, &labels[..1], &TrainerParams::default()).unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidData(_)));
    }

    #[test]
    fn test_low_confidence_is_unclassified() {
        let model = StatisticalModel::from_parameters(
            vec!["A".into(), "B".into(), "C".into()],
            vec![vec![0.0; 4]; 3],
            vec![0.42f32.ln(), 0.33f32.ln(), 0.25f32.ln()],
        )
        .unwrap();

        let prediction = model.predict(&[0.3, 0.1, 0.0, 0.5]).unwrap();
        assert_eq!(prediction.label, UNCLASSIFIED);
        assert!((prediction.confidence - 0.42).abs() < 1e-4);
    }

    #[test]
    fn test_threshold_is_inclusive_at_half() {
        let model = StatisticalModel::from_parameters(
            vec!["A".into(), "B".into()],
            vec![vec![0.0; 2]; 2],
            vec![0.0, 0.0],
        )
        .unwrap();

        let prediction = model.predict(&[1.0, 0.0]).unwrap();
        assert_eq!(prediction.confidence, 0.5);
        assert_eq!(prediction.label, "A");
    }

    #[test]
    fn test_never_labels_below_threshold() {
        let (vectors, labels) = three_class_data();
        let model = StatisticalModel::fit(&vectors, &labels, &TrainerParams::default())
            .unwrap()
            .model;

        let mut rng = rand::rngs::StdRng::seed_from_u64(99);
        for _ in 0..200 {
            let sample: Vec<f32> = (0..3).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            let prediction = model.predict(&sample).unwrap();
            if prediction.confidence < CONFIDENCE_THRESHOLD {
                assert!(prediction.is_unclassified());
            } else {
                assert!(!prediction.is_unclassified());
            }
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let (vectors, labels) = three_class_data();
        let model = StatisticalModel::fit(&vectors, &labels, &TrainerParams::default())
            .unwrap()
            .model;
        let err = model.predict(&[1.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::DimensionMismatch { expected: 3, actual: 2 }
        ));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let (vectors, labels) = three_class_data();
        let model = StatisticalModel::fit(&vectors, &labels, &TrainerParams::default())
            .unwrap()
            .model;
        model.save(&path).unwrap();

        let loaded = StatisticalModel::load(&path).unwrap();
        assert_eq!(loaded, model);
        let samples = vec![vec![0.2, 0.7, 0.1], vec![0.0, 0.0, 0.0], vec![0.5, 0.0, 0.5]];
        assert_eq!(loaded.predict_batch(&samples).unwrap(), model.predict_batch(&samples).unwrap());
    }

    #[test]
    fn test_load_missing_file() {
        let err = StatisticalModel::load("final_model/does_not_exist.bin").unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad { .. }));
    }
}
