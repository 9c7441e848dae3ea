//! Hashed n-gram embedding model.
//!
//! Messages are tokenised (lower-cased, split on non-alphanumerics, digit runs
//! collapsed to `#` so that IDs and counters do not fragment the vocabulary),
//! then unigrams and adjacent-token bigrams are hashed into a fixed number of
//! signed buckets and weighted by an inverse document frequency learned with
//! [`HashingEmbedder::fit`]. Vectors are L2-normalised.
//!
//! The model is plain data, so it serialises with bincode and reloads to
//! bit-identical predictions.

use crate::error::{ClassifierError, Result};
use crate::traits::{EmbeddingVector, Embedder};
use rayon::prelude::*;
use rustc_hash::{FxHashSet, FxHasher};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub const DEFAULT_DIMENSION: usize = 384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingParams {
    pub dimension: usize,
    pub include_bigrams: bool,
}

impl Default for EmbeddingParams {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            include_bigrams: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashingEmbedder {
    params: EmbeddingParams,
    idf: Vec<f32>,
    documents_seen: usize,
}

impl HashingEmbedder {
    /// An unfitted embedder: every bucket has weight 1.0.
    pub fn new(params: EmbeddingParams) -> Result<Self> {
        if params.dimension == 0 {
            return Err(ClassifierError::Configuration(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            params,
            idf: vec![1.0; params.dimension],
            documents_seen: 0,
        })
    }

    /// Learn smoothed IDF weights, `ln((1 + n) / (1 + df)) + 1`, from a corpus.
    pub fn fit(mut self, messages: &[&str]) -> Self {
        let dim = self.params.dimension;
        let mut df = vec![0usize; dim];

        for message in messages {
            let buckets: FxHashSet<usize> = self
                .features(message)
                .into_iter()
                .map(|(bucket, _)| bucket)
                .collect();
            for bucket in buckets {
                df[bucket] += 1;
            }
        }

        let n = messages.len() as f32;
        self.idf = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f32)).ln() + 1.0)
            .collect();
        self.documents_seen = messages.len();

        tracing::info!(
            component = "HashingEmbedder",
            documents = messages.len(),
            dimension = dim,
            "fitted idf weights"
        );
        self
    }

    pub fn params(&self) -> EmbeddingParams {
        self.params
    }

    pub fn documents_seen(&self) -> usize {
        self.documents_seen
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        tracing::info!(component = "HashingEmbedder", path = %path.display(), "saved embedding model");
        Ok(())
    }

    /// Load a persisted model; absent or corrupt files are `ModelLoad` errors.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifierError::model_load(path, "file not found"));
        }
        let reader = BufReader::new(File::open(path)?);
        let model: HashingEmbedder = bincode::deserialize_from(reader)
            .map_err(|e| ClassifierError::model_load(path, format!("corrupt embedding model: {e}")))?;

        if model.params.dimension == 0 || model.idf.len() != model.params.dimension {
            return Err(ClassifierError::model_load(
                path,
                format!(
                    "corrupt embedding model: {} idf weights for dimension {}",
                    model.idf.len(),
                    model.params.dimension
                ),
            ));
        }
        Ok(model)
    }

    fn features(&self, message: &str) -> Vec<(usize, f32)> {
        let tokens = tokenize(message);
        let mut features = Vec::with_capacity(tokens.len() * 2);

        for token in &tokens {
            features.push(self.bucket(&(0u8, token.as_str())));
        }
        if self.params.include_bigrams {
            for pair in tokens.windows(2) {
                features.push(self.bucket(&(1u8, pair[0].as_str(), pair[1].as_str())));
            }
        }
        features
    }

    fn bucket<T: Hash>(&self, key: &T) -> (usize, f32) {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        let hash = hasher.finish();
        let bucket = (hash % self.params.dimension as u64) as usize;
        let sign = if (hash >> 63) & 1 == 1 { -1.0 } else { 1.0 };
        (bucket, sign)
    }

    fn embed(&self, message: &str) -> EmbeddingVector {
        let mut vector = vec![0.0f32; self.params.dimension];
        for (bucket, sign) in self.features(message) {
            vector[bucket] += sign * self.idf[bucket];
        }
        normalize(&mut vector);
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn encode(&self, messages: &[&str]) -> Vec<EmbeddingVector> {
        messages.par_iter().map(|m| self.embed(m)).collect()
    }

    fn dimension(&self) -> usize {
        self.params.dimension
    }

    fn name(&self) -> &str {
        "hashing-tfidf"
    }
}

/// Lower-case alphanumeric tokens with digit runs collapsed to `#`.
pub fn tokenize(message: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in message.chars() {
        if ch.is_ascii_digit() {
            if !current.ends_with('#') {
                current.push('#');
            }
        } else if ch.is_alphanumeric() {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Cosine similarity; zero vectors have similarity 0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> HashingEmbedder {
        HashingEmbedder::new(EmbeddingParams::default()).unwrap()
    }

    #[test]
    fn test_tokenize_collapses_digits() {
        assert_eq!(
            tokenize("User User123 logged in from 10.0.0.12"),
            vec!["user", "user#", "logged", "in", "from", "#", "#", "#", "#"]
        );
        assert!(tokenize("  ,,  ").is_empty());
    }

    #[test]
    fn test_deterministic_and_dimension() {
        let model = embedder();
        let a = model.encode_one("Backup started at 2025-05-14 07:06:55.");
        let b = model.encode_one("Backup started at 2025-05-14 07:06:55.");
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_DIMENSION);
        assert_eq!(model.dimension(), DEFAULT_DIMENSION);
    }

    #[test]
    fn test_ids_do_not_change_embedding() {
        let model = embedder();
        assert_eq!(
            model.encode_one("Multiple login failures occurred on user 6454 account"),
            model.encode_one("Multiple login failures occurred on user 9981 account")
        );
    }

    #[test]
    fn test_unit_norm_and_empty_input() {
        let model = embedder();
        let v = model.encode_one("System crashed due to driver errors");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "norm was {norm}");

        let empty = model.encode_one("");
        assert!(empty.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_batch_preserves_order() {
        let model = embedder();
        let messages = ["disk full on node 3", "user logged out", "disk full on node 3"];
        let batch = model.encode(&messages);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0], model.encode_one(messages[0]));
        assert_eq!(batch[1], model.encode_one(messages[1]));
        assert_eq!(batch[0], batch[2]);
    }

    #[test]
    fn test_similar_messages_are_closer() {
        let model = embedder();
        let a = model.encode_one("Email service experiencing issues with sending");
        let b = model.encode_one("Email service experiencing issues with delivery");
        let c = model.encode_one("Admin access escalation detected for user 9429");
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[test]
    fn test_fit_downweights_common_terms() {
        let corpus = [
            "server restarted",
            "server stopped",
            "server started",
            "kernel panic",
        ];
        let model = embedder().fit(&corpus);
        assert_eq!(model.documents_seen(), 4);

        let (common, _) = model.bucket(&(0u8, "server"));
        let (rare, _) = model.bucket(&(0u8, "kernel"));
        assert!(model.idf[rare] > model.idf[common]);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embedding_model.bin");
        let model = embedder().fit(&["a b c", "a d", "nova api returned 404"]);
        model.save(&path).unwrap();

        let loaded = HashingEmbedder::load(&path).unwrap();
        assert_eq!(loaded, model);
        let sample = ["nova api returned 500", "a d", "unseen words entirely"];
        assert_eq!(loaded.encode(&sample), model.encode(&sample));
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let missing = HashingEmbedder::load(dir.path().join("nope.bin")).unwrap_err();
        assert!(matches!(missing, ClassifierError::ModelLoad { .. }));

        let corrupt_path = dir.path().join("corrupt.bin");
        fs::write(&corrupt_path, b"definitely not bincode").unwrap();
        let corrupt = HashingEmbedder::load(&corrupt_path).unwrap_err();
        assert!(matches!(corrupt, ClassifierError::ModelLoad { .. }));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let params = EmbeddingParams {
            dimension: 0,
            include_bigrams: false,
        };
        assert!(HashingEmbedder::new(params).is_err());
    }
}
