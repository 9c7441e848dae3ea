//! Density-based clustering of message embeddings.
//!
//! Used only while preparing training data, to surface groups of similar
//! messages that are good candidates for new regex rules. Nothing here is
//! read back at serving time.

use crate::embedding::cosine_similarity;
use crate::error::{ClassifierError, Result};
use crate::traits::EmbeddingVector;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Cluster id assigned to points that belong to no dense region.
pub const NOISE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusteringParams {
    /// Neighbourhood radius in cosine distance (`1 - cos`).
    pub eps: f32,
    /// Neighbours (including the point itself) needed to seed a cluster.
    pub min_samples: usize,
}

impl Default for ClusteringParams {
    fn default() -> Self {
        Self {
            eps: 0.2,
            min_samples: 2,
        }
    }
}

/// DBSCAN over cosine distance.
#[derive(Debug, Clone)]
pub struct Dbscan {
    params: ClusteringParams,
}

impl Dbscan {
    pub fn new(params: ClusteringParams) -> Result<Self> {
        if !(params.eps >= 0.0 && params.eps <= 2.0) {
            return Err(ClassifierError::Configuration(format!(
                "clustering eps must be within [0, 2], got {}",
                params.eps
            )));
        }
        if params.min_samples == 0 {
            return Err(ClassifierError::Configuration(
                "clustering min_samples must be at least 1".to_string(),
            ));
        }
        Ok(Self { params })
    }

    /// Assign a cluster id to every vector, in input order. Cluster ids are
    /// numbered from 0 in order of discovery; unreachable points get [`NOISE`].
    pub fn cluster(&self, vectors: &[EmbeddingVector]) -> Result<Vec<i32>> {
        if let Some(first) = vectors.first() {
            let expected = first.len();
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
                return Err(ClassifierError::DimensionMismatch {
                    expected,
                    actual: bad.len(),
                });
            }
        }

        let neighbours = self.neighbourhoods(vectors);
        let mut labels: Vec<Option<i32>> = vec![None; vectors.len()];
        let mut next_cluster = 0;

        for point in 0..vectors.len() {
            if labels[point].is_some() {
                continue;
            }
            if neighbours[point].len() < self.params.min_samples {
                labels[point] = Some(NOISE);
                continue;
            }

            let cluster = next_cluster;
            next_cluster += 1;
            labels[point] = Some(cluster);

            let mut queue: VecDeque<usize> = neighbours[point].iter().copied().collect();
            while let Some(q) = queue.pop_front() {
                match labels[q] {
                    Some(NOISE) => labels[q] = Some(cluster),
                    Some(_) => continue,
                    None => {
                        labels[q] = Some(cluster);
                        if neighbours[q].len() >= self.params.min_samples {
                            queue.extend(neighbours[q].iter().copied());
                        }
                    }
                }
            }
        }

        Ok(labels.into_iter().map(|l| l.unwrap_or(NOISE)).collect())
    }

    /// Indices within `eps` of each point, the point itself included.
    fn neighbourhoods(&self, vectors: &[EmbeddingVector]) -> Vec<Vec<usize>> {
        let eps = self.params.eps;
        (0..vectors.len())
            .into_par_iter()
            .map(|i| {
                (0..vectors.len())
                    .filter(|&j| i == j || 1.0 - cosine_similarity(&vectors[i], &vectors[j]) <= eps)
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster_count: usize,
    pub noise_count: usize,
    pub sizes: BTreeMap<i32, usize>,
    /// Up to five sample messages per cluster larger than the inspection threshold.
    pub samples: BTreeMap<i32, Vec<String>>,
}

/// Summarise assignments for manual inspection and log the result.
pub fn summarize_clusters(messages: &[&str], assignments: &[i32], min_size: usize) -> ClusterSummary {
    let mut sizes: BTreeMap<i32, usize> = BTreeMap::new();
    for &cluster in assignments {
        *sizes.entry(cluster).or_insert(0) += 1;
    }

    let mut samples: BTreeMap<i32, Vec<String>> = BTreeMap::new();
    for (&cluster, &size) in &sizes {
        if cluster == NOISE || size <= min_size {
            continue;
        }
        let picked = messages
            .iter()
            .zip(assignments)
            .filter(|(_, c)| **c == cluster)
            .take(5)
            .map(|(m, _)| m.to_string())
            .collect();
        samples.insert(cluster, picked);
    }

    let summary = ClusterSummary {
        cluster_count: sizes.keys().filter(|&&c| c != NOISE).count(),
        noise_count: sizes.get(&NOISE).copied().unwrap_or(0),
        sizes,
        samples,
    };

    tracing::info!(
        component = "Dbscan",
        clusters = summary.cluster_count,
        noise = summary.noise_count,
        "clustering finished"
    );
    for (cluster, picked) in &summary.samples {
        tracing::info!(
            component = "Dbscan",
            cluster = *cluster,
            size = summary.sizes[cluster],
            "sample logs: {:?}",
            picked
        );
    }

    summary
}
