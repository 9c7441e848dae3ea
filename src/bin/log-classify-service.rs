/// Log Classification Service
///
/// Labels uploaded CSV tables with the published models and the LLM oracle.
/// Port: 3003
use anyhow::Context;
use log_classifier::config::ServingConfig;
use log_classifier::http_api::{router, AppState};
use log_classifier::llm_oracle::LlmOracle;
use log_classifier::oracle_config::OracleConfig;
use log_classifier::regex_classifier::RegexRuleSet;
use log_classifier::serving::ModelBundle;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (fails silently if not found)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Log Classification Service");

    let serving = ServingConfig::from_env().context("invalid serving configuration")?;
    serving.log_config();
    let oracle_config = OracleConfig::from_env().context("invalid oracle configuration")?;
    oracle_config.log_config();

    // Models are loaded once and shared read-only by every request
    let bundle = ModelBundle::load(&serving.model_dir)
        .with_context(|| format!("cannot load models from {}", serving.model_dir.display()))?;
    let rules = RegexRuleSet::load(serving.rules_path()).context("cannot load regex rules")?;
    let oracle = LlmOracle::new(oracle_config).context("cannot create LLM oracle")?;
    let cascade = bundle
        .cascade(Arc::new(rules), Arc::new(oracle))?
        .with_routing(serving.routing.clone())
        .with_max_concurrency(serving.max_concurrency);

    info!(
        "Loaded {} classes, {} regex rules",
        cascade.model().classes().len(),
        cascade.rules().len()
    );

    let app = router(AppState::new(Arc::new(cascade)));

    let addr = format!("0.0.0.0:{}", serving.port);
    info!("🚀 Log Classification Service listening on {}", addr);
    info!("");
    info!("📊 Endpoints:");
    info!("   GET  /health     - Loaded model summary");
    info!("   POST /classify   - Classify a CSV upload (text/csv)");
    info!("");
    info!("📝 Example:");
    info!(r#"   curl -X POST http://localhost:{}/classify \"#, serving.port);
    info!(r#"     -H 'Content-Type: text/csv' --data-binary @logs.csv"#);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
