/// Three-tier classification cascade
///
/// Per message, terminal on the first tier that resolves it:
/// - Oracle-routed sources go straight to the LLM oracle
/// - Everything else tries the regex rules first
/// - Messages no rule matches are embedded and scored by the statistical
///   classifier, which may itself answer "Unclassified"
///
/// All model state is shared read-only behind `Arc`s, so one cascade can
/// serve any number of concurrent callers.
use crate::error::{ClassifierError, Result};
use crate::records::LogRecord;
use crate::regex_classifier::RegexRuleSet;
use crate::routing::{Route, RoutingPolicy};
use crate::statistical_classifier::StatisticalModel;
use crate::traits::{Embedder, LogOracle};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Tier that produced a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Regex,
    Statistical,
    Oracle,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Regex => "regex",
            Tier::Statistical => "statistical",
            Tier::Oracle => "oracle",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub label: String,
    pub tier: Tier,
    /// Posterior of the statistical tier; `None` for regex and oracle answers
    pub confidence: Option<f32>,
}

impl Classification {
    fn regex(label: &str) -> Self {
        Self {
            label: label.to_string(),
            tier: Tier::Regex,
            confidence: None,
        }
    }

    fn oracle(label: String) -> Self {
        Self {
            label,
            tier: Tier::Oracle,
            confidence: None,
        }
    }
}

pub struct ClassificationCascade {
    rules: Arc<RegexRuleSet>,
    embedder: Arc<dyn Embedder>,
    model: Arc<StatisticalModel>,
    oracle: Arc<dyn LogOracle>,
    routing: RoutingPolicy,
    max_concurrency: usize,
}

impl ClassificationCascade {
    /// Wire the tiers together; the embedder must produce vectors of the
    /// dimension the model was trained on.
    pub fn new(
        rules: Arc<RegexRuleSet>,
        embedder: Arc<dyn Embedder>,
        model: Arc<StatisticalModel>,
        oracle: Arc<dyn LogOracle>,
    ) -> Result<Self> {
        if embedder.dimension() != model.dimension() {
            tracing::error!(
                component = "Cascade",
                embedder = embedder.name(),
                "embedder produces {} dimensions, model expects {}",
                embedder.dimension(),
                model.dimension()
            );
            return Err(ClassifierError::DimensionMismatch {
                expected: model.dimension(),
                actual: embedder.dimension(),
            });
        }

        Ok(Self {
            rules,
            embedder,
            model,
            oracle,
            routing: RoutingPolicy::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        })
    }

    pub fn with_routing(mut self, routing: RoutingPolicy) -> Self {
        self.routing = routing;
        self
    }

    /// Upper bound on oracle requests in flight during `classify_many`.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn routing(&self) -> &RoutingPolicy {
        &self.routing
    }

    pub fn rules(&self) -> &RegexRuleSet {
        &self.rules
    }

    pub fn model(&self) -> &StatisticalModel {
        &self.model
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// Classify one record.
    ///
    /// Only oracle transport failures are errors; an unresolvable message
    /// comes back as "Unclassified".
    pub async fn classify(&self, record: &LogRecord) -> Result<Classification> {
        match self.routing.route(&record.source) {
            Route::Oracle => self.ask_oracle(&record.message).await.map(Classification::oracle),
            Route::RegexThenStatistical => {
                if let Some(label) = self.rules.match_message(&record.message) {
                    return Ok(Classification::regex(label));
                }
                let vector = self.embedder.encode_one(&record.message);
                let prediction = self.model.predict(&vector)?;
                Ok(Classification {
                    label: prediction.label,
                    tier: Tier::Statistical,
                    confidence: Some(prediction.confidence),
                })
            }
        }
    }

    /// Classify a batch; `output[i]` belongs to `records[i]`.
    ///
    /// Regex matching runs over the whole batch, unresolved messages are
    /// embedded and scored in one pass, and oracle calls run concurrently up
    /// to the configured limit. The first oracle failure aborts the batch.
    pub async fn classify_many(&self, records: &[LogRecord]) -> Result<Vec<Classification>> {
        let mut slots: Vec<Option<Classification>> = vec![None; records.len()];

        let (oracle_idx, local_idx): (Vec<usize>, Vec<usize>) =
            (0..records.len()).partition(|&i| self.routing.is_oracle_routed(&records[i].source));

        // Tier 1: regex
        let local_messages: Vec<&str> = local_idx.iter().map(|&i| records[i].message.as_str()).collect();
        let matches = self.rules.match_batch(&local_messages);
        let mut unresolved = Vec::new();
        for (&i, matched) in local_idx.iter().zip(matches) {
            match matched {
                Some(label) => slots[i] = Some(Classification::regex(label)),
                None => unresolved.push(i),
            }
        }

        // Tier 2: statistical, one batch
        if !unresolved.is_empty() {
            let messages: Vec<&str> = unresolved.iter().map(|&i| records[i].message.as_str()).collect();
            let vectors = self.embedder.encode(&messages);
            let predictions = self.model.predict_batch(&vectors)?;
            for (&i, prediction) in unresolved.iter().zip(predictions) {
                slots[i] = Some(Classification {
                    label: prediction.label,
                    tier: Tier::Statistical,
                    confidence: Some(prediction.confidence),
                });
            }
        }

        // Tier 3: oracle, bounded and order-preserving
        let oracle_labels: Vec<(usize, String)> = stream::iter(oracle_idx.iter().copied())
            .map(|i| async move {
                self.ask_oracle(&records[i].message)
                    .await
                    .map(|label| (i, label))
            })
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;
        for (i, label) in oracle_labels {
            slots[i] = Some(Classification::oracle(label));
        }

        tracing::debug!(
            component = "Cascade",
            total = records.len(),
            regex = local_idx.len() - unresolved.len(),
            statistical = unresolved.len(),
            oracle = oracle_idx.len(),
            "classified batch"
        );

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ClassifierError::InvalidData("cascade left a record unclassified".to_string()))
    }

    async fn ask_oracle(&self, message: &str) -> Result<String> {
        self.oracle
            .classify(message)
            .await
            .inspect_err(|e| tracing::error!(component = "Cascade", oracle = self.oracle.name(), "oracle failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::EmbeddingVector;
    use async_trait::async_trait;

    struct ConstantEmbedder(usize);

    impl Embedder for ConstantEmbedder {
        fn encode(&self, messages: &[&str]) -> Vec<EmbeddingVector> {
            messages.iter().map(|_| vec![1.0; self.0]).collect()
        }
        fn dimension(&self) -> usize {
            self.0
        }
        fn name(&self) -> &str {
            "constant"
        }
    }

    struct EchoOracle;

    #[async_trait]
    impl LogOracle for EchoOracle {
        async fn classify(&self, _message: &str) -> Result<String> {
            Ok("Workflow Error".to_string())
        }
        fn name(&self) -> &str {
            "echo"
        }
    }

    fn model() -> Arc<StatisticalModel> {
        let classes = vec!["Error".to_string(), "Security Alert".to_string()];
        Arc::new(StatisticalModel::from_parameters(classes, vec![vec![2.0, 0.0], vec![0.0, 0.0]], vec![0.0, 0.0]).unwrap())
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let rules = Arc::new(RegexRuleSet::default_rules().unwrap());
        let result = ClassificationCascade::new(rules, Arc::new(ConstantEmbedder(3)), model(), Arc::new(EchoOracle));
        assert!(matches!(
            result,
            Err(ClassifierError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[tokio::test]
    async fn test_each_tier_is_reported() {
        let rules = Arc::new(RegexRuleSet::default_rules().unwrap());
        let cascade =
            ClassificationCascade::new(rules, Arc::new(ConstantEmbedder(2)), model(), Arc::new(EchoOracle)).unwrap();

        let regex = cascade.classify(&LogRecord::new("ModernHR", "User User12 logged in.")).await.unwrap();
        assert_eq!(regex.tier, Tier::Regex);
        assert_eq!(regex.label, "User Action");

        let statistical = cascade.classify(&LogRecord::new("ModernHR", "Disk quota exceeded")).await.unwrap();
        assert_eq!(statistical.tier, Tier::Statistical);
        assert_eq!(statistical.label, "Error");
        assert!(statistical.confidence.unwrap() > 0.5);

        let oracle = cascade.classify(&LogRecord::new("LegacyCRM", "User User12 logged in.")).await.unwrap();
        assert_eq!(oracle.tier, Tier::Oracle);
        assert_eq!(oracle.confidence, None);
    }

    #[tokio::test]
    async fn test_classify_many_empty() {
        let rules = Arc::new(RegexRuleSet::default_rules().unwrap());
        let cascade =
            ClassificationCascade::new(rules, Arc::new(ConstantEmbedder(2)), model(), Arc::new(EchoOracle)).unwrap();
        assert!(cascade.classify_many(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_concurrency_floor() {
        let rules = Arc::new(RegexRuleSet::default_rules().unwrap());
        let cascade = ClassificationCascade::new(rules, Arc::new(ConstantEmbedder(2)), model(), Arc::new(EchoOracle))
            .unwrap()
            .with_max_concurrency(0);
        assert_eq!(cascade.max_concurrency, 1);
        assert_eq!(Tier::Statistical.to_string(), "statistical");
    }
}
