/// Tests for the classification cascade
///
/// Stub embedders and oracles stand in for the real models so each test
/// controls exactly which tier can answer:
/// - Rule precedence over the statistical tier and the oracle
/// - Oracle-routed sources never touch the local tiers
/// - Low-confidence predictions come back "Unclassified"
/// - Batch output order matches input order
use async_trait::async_trait;
use log_classifier::cascade::{ClassificationCascade, Tier};
use log_classifier::records::{LogRecord, UNCLASSIFIED};
use log_classifier::regex_classifier::{RegexRule, RegexRuleSet};
use log_classifier::routing::RoutingPolicy;
use log_classifier::statistical_classifier::StatisticalModel;
use log_classifier::traits::{Embedder, EmbeddingVector, LogOracle};
use log_classifier::{ClassifierError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Embeds "error"-ish messages along x, everything else along y, and counts
/// how many messages it was asked to encode.
#[derive(Default)]
struct CountingEmbedder {
    encoded: AtomicUsize,
}

impl Embedder for CountingEmbedder {
    fn encode(&self, messages: &[&str]) -> Vec<EmbeddingVector> {
        self.encoded.fetch_add(messages.len(), Ordering::SeqCst);
        messages
            .iter()
            .map(|m| {
                if m.to_lowercase().contains("error") || m.contains("failed") {
                    vec![1.0, 0.0]
                } else {
                    vec![0.0, 1.0]
                }
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Answers from keywords after an optional delay; `delay_for` lets a test
/// make earlier messages finish later.
struct KeywordOracle {
    calls: AtomicUsize,
    delay_for: fn(&str) -> Duration,
}

impl KeywordOracle {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay_for: |_| Duration::ZERO,
        }
    }
}

#[async_trait]
impl LogOracle for KeywordOracle {
    async fn classify(&self, message: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep((self.delay_for)(message)).await;
        if message.contains("retired") || message.contains("deprecated") {
            Ok("Deprecation Warning".to_string())
        } else if message.contains("escalation") {
            Ok("Workflow Error".to_string())
        } else {
            Ok(UNCLASSIFIED.to_string())
        }
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

struct DownOracle;

#[async_trait]
impl LogOracle for DownOracle {
    async fn classify(&self, _message: &str) -> Result<String> {
        Err(ClassifierError::ServiceUnavailable("connection refused".to_string()))
    }

    fn name(&self) -> &str {
        "down"
    }
}

fn rules() -> Arc<RegexRuleSet> {
    let mut rules = vec![RegexRule::new(r"blocked due to potential attack", "Security Alert")];
    rules.extend(RegexRuleSet::default_rules().expect("default rules").rules().iter().cloned());
    Arc::new(RegexRuleSet::new(rules).expect("rule set"))
}

/// Confident two-class model: x-axis => "Error", y-axis => "Resource Usage".
fn confident_model() -> Arc<StatisticalModel> {
    Arc::new(
        StatisticalModel::from_parameters(
            vec!["Error".to_string(), "Resource Usage".to_string()],
            vec![vec![4.0, 0.0], vec![0.0, 4.0]],
            vec![0.0, 0.0],
        )
        .expect("model"),
    )
}

/// Model whose best class always has posterior 0.42.
fn unsure_model() -> Arc<StatisticalModel> {
    Arc::new(
        StatisticalModel::from_parameters(
            vec!["Error".to_string(), "Critical Error".to_string(), "Resource Usage".to_string()],
            vec![vec![0.0, 0.0], vec![0.0, 0.0], vec![0.0, 0.0]],
            vec![0.42f32.ln(), 0.29f32.ln(), 0.29f32.ln()],
        )
        .expect("model"),
    )
}

#[tokio::test]
async fn test_scenario_regex_rule_wins() {
    let embedder = Arc::new(CountingEmbedder::default());
    let oracle = Arc::new(KeywordOracle::new());
    let cascade = ClassificationCascade::new(rules(), embedder.clone(), confident_model(), oracle.clone())
        .expect("cascade");

    let result = cascade
        .classify(&LogRecord::new("ModernCRM", "IP 1.2.3.4 blocked due to potential attack"))
        .await
        .expect("classify");

    assert_eq!(result.label, "Security Alert");
    assert_eq!(result.tier, Tier::Regex);
    assert_eq!(embedder.encoded.load(Ordering::SeqCst), 0, "statistical tier must not run");
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_scenario_legacy_crm_goes_to_oracle() {
    let embedder = Arc::new(CountingEmbedder::default());
    let oracle = Arc::new(KeywordOracle::new());
    let cascade = ClassificationCascade::new(rules(), embedder.clone(), confident_model(), oracle.clone())
        .expect("cascade");

    let result = cascade
        .classify(&LogRecord::new(
            "LegacyCRM",
            "The 'ReportGenerator' module will be retired in version 4.0.",
        ))
        .await
        .expect("classify");

    assert!(["Workflow Error", "Deprecation Warning", UNCLASSIFIED].contains(&result.label.as_str()));
    assert_eq!(result.label, "Deprecation Warning");
    assert_eq!(result.tier, Tier::Oracle);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    assert_eq!(embedder.encoded.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_legacy_crm_bypasses_rules_even_when_they_match() {
    let embedder = Arc::new(CountingEmbedder::default());
    let oracle = Arc::new(KeywordOracle::new());
    let cascade = ClassificationCascade::new(rules(), embedder.clone(), confident_model(), oracle.clone())
        .expect("cascade");

    let records = vec![
        LogRecord::new("LegacyCRM", "User User42 logged in."),
        LogRecord::new("LegacyCRM", "IP 10.0.0.1 blocked due to potential attack"),
    ];
    let results = cascade.classify_many(&records).await.expect("classify_many");

    assert!(results.iter().all(|r| r.tier == Tier::Oracle));
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    assert_eq!(embedder.encoded.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_scenario_low_confidence_is_unclassified() {
    let cascade = ClassificationCascade::new(
        rules(),
        Arc::new(CountingEmbedder::default()),
        unsure_model(),
        Arc::new(KeywordOracle::new()),
    )
    .expect("cascade");

    let result = cascade
        .classify(&LogRecord::new("BillingSystem", "Unexpected checksum in ledger export"))
        .await
        .expect("classify");

    assert_eq!(result.label, UNCLASSIFIED);
    assert_eq!(result.tier, Tier::Statistical);
    let confidence = result.confidence.expect("statistical confidence");
    assert!((confidence - 0.42).abs() < 1e-4, "confidence was {confidence}");
}

#[tokio::test]
async fn test_classify_many_preserves_order() {
    // Earlier oracle messages sleep longer, so completion order is reversed
    let oracle = Arc::new(KeywordOracle {
        calls: AtomicUsize::new(0),
        delay_for: |m| {
            let n: u64 = m.rsplit(' ').next().and_then(|d| d.parse().ok()).unwrap_or(0);
            Duration::from_millis(60u64.saturating_sub(n * 10))
        },
    });
    let embedder = Arc::new(CountingEmbedder::default());
    let cascade = ClassificationCascade::new(rules(), embedder.clone(), confident_model(), oracle.clone())
        .expect("cascade")
        .with_max_concurrency(4);

    let records = vec![
        LogRecord::new("LegacyCRM", "Case escalation failed 0"),
        LogRecord::new("ModernCRM", "User User7 logged out."),
        LogRecord::new("LegacyCRM", "Feature deprecated 1"),
        LogRecord::new("BillingSystem", "Payment failed with error 500"),
        LogRecord::new("LegacyCRM", "Something odd 2"),
        LogRecord::new("AnalyticsEngine", "Memory usage at 91 percent"),
        LogRecord::new("LegacyCRM", "The module will be retired 3"),
    ];
    let results = cascade.classify_many(&records).await.expect("classify_many");
    let labels: Vec<&str> = results.iter().map(|r| r.label.as_str()).collect();

    assert_eq!(
        labels,
        vec![
            "Workflow Error",
            "User Action",
            "Deprecation Warning",
            "Error",
            UNCLASSIFIED,
            "Resource Usage",
            "Deprecation Warning",
        ]
    );
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 4);
    // Both unresolved local messages embedded in one batch
    assert_eq!(embedder.encoded.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_batch_and_single_agree() {
    let cascade = ClassificationCascade::new(
        rules(),
        Arc::new(CountingEmbedder::default()),
        confident_model(),
        Arc::new(KeywordOracle::new()),
    )
    .expect("cascade");

    let records = vec![
        LogRecord::new("ModernHR", "Backup completed successfully."),
        LogRecord::new("ModernHR", "Disk write failed"),
        LogRecord::new("LegacyCRM", "Case escalation for ticket 7324 failed"),
    ];
    let batch = cascade.classify_many(&records).await.expect("batch");
    for (record, expected) in records.iter().zip(&batch) {
        let single = cascade.classify(record).await.expect("single");
        assert_eq!(&single, expected);
    }
}

#[tokio::test]
async fn test_oracle_failure_propagates() {
    let cascade = ClassificationCascade::new(
        rules(),
        Arc::new(CountingEmbedder::default()),
        confident_model(),
        Arc::new(DownOracle),
    )
    .expect("cascade");

    // Local tiers still work with the oracle down
    let local = cascade
        .classify(&LogRecord::new("ModernCRM", "User User1 logged in."))
        .await
        .expect("regex tier");
    assert_eq!(local.label, "User Action");

    let err = cascade
        .classify_many(&[
            LogRecord::new("ModernCRM", "User User1 logged in."),
            LogRecord::new("LegacyCRM", "Case escalation failed"),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, ClassifierError::ServiceUnavailable(_)));
}

#[tokio::test]
async fn test_custom_routing() {
    let oracle = Arc::new(KeywordOracle::new());
    let cascade = ClassificationCascade::new(
        rules(),
        Arc::new(CountingEmbedder::default()),
        confident_model(),
        oracle.clone(),
    )
    .expect("cascade")
    .with_routing(RoutingPolicy::from_source_list("OldBilling"));

    let legacy = cascade
        .classify(&LogRecord::new("LegacyCRM", "User User1 logged in."))
        .await
        .expect("classify");
    assert_eq!(legacy.tier, Tier::Regex);

    let old = cascade
        .classify(&LogRecord::new("OldBilling", "Invoice escalation stalled"))
        .await
        .expect("classify");
    assert_eq!(old.tier, Tier::Oracle);
    assert_eq!(old.label, "Workflow Error");
}
