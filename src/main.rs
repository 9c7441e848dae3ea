//! Log classifier command line
//!
//! `train` runs the staged training pipeline and publishes the models;
//! `classify` labels a CSV file with the published models.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log_classifier::config::{ServingConfig, TrainingPipelineConfig};
use log_classifier::llm_oracle::LlmOracle;
use log_classifier::oracle_config::OracleConfig;
use log_classifier::regex_classifier::RegexRuleSet;
use log_classifier::routing::RoutingPolicy;
use log_classifier::serving::{classify_csv, ModelBundle};
use log_classifier::training_pipeline::TrainingPipeline;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "log-classifier")]
#[command(about = "Hybrid regex / statistical / LLM log classifier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the training pipeline and publish the trained models
    Train(TrainArgs),
    /// Classify a CSV file with `source` and `log_message` columns
    Classify(ClassifyArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Training table (CSV)
    #[arg(long, env = "TRAINING_DATA_FILE")]
    data: Option<PathBuf>,

    /// Schema file (YAML)
    #[arg(long, env = "SCHEMA_FILE")]
    schema: Option<PathBuf>,

    /// Regex rule file (YAML); built-in rules when omitted
    #[arg(long, env = "REGEX_RULES_FILE")]
    rules: Option<PathBuf>,

    /// Root directory for per-run artifacts
    #[arg(long, env = "ARTIFACT_ROOT")]
    artifact_root: Option<PathBuf>,

    /// Directory the trained models are published to
    #[arg(long, env = "FINAL_MODEL_DIR")]
    final_model_dir: Option<PathBuf>,

    /// Fail the run when schema validation fails
    #[arg(long)]
    strict_validation: bool,

    /// Comma separated sources routed to the oracle
    #[arg(long, env = "ORACLE_SOURCES")]
    oracle_sources: Option<String>,
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    /// Input CSV
    #[arg(short, long)]
    input: PathBuf,

    /// Output CSV (input columns plus `target_label`)
    #[arg(short, long)]
    output: PathBuf,

    /// Directory holding the published models
    #[arg(long, env = "FINAL_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Regex rule file (YAML); built-in rules when omitted
    #[arg(long, env = "REGEX_RULES_FILE")]
    rules: Option<PathBuf>,

    /// Comma separated sources routed to the oracle
    #[arg(long, env = "ORACLE_SOURCES")]
    oracle_sources: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (fails silently if not found)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match Cli::parse().command {
        Command::Train(args) => train(args),
        Command::Classify(args) => classify(args).await,
    }
}

fn train(args: TrainArgs) -> Result<()> {
    let mut config = TrainingPipelineConfig::from_env().context("invalid training configuration")?;
    if let Some(data) = args.data {
        config.data_source = data;
    }
    if let Some(schema) = args.schema {
        config.schema_path = schema;
    }
    if args.rules.is_some() {
        config.rules_path = args.rules;
    }
    if let Some(root) = args.artifact_root {
        config.artifact_root = root;
    }
    if let Some(dir) = args.final_model_dir {
        config.final_model_dir = dir;
    }
    config.strict_validation |= args.strict_validation;
    if let Some(sources) = args.oracle_sources {
        config.routing = RoutingPolicy::from_source_list(&sources);
    }
    config.log_config();

    let artifact = TrainingPipeline::new(config)
        .run()
        .context("training pipeline failed")?;
    info!("Published model: {}", artifact.model_file().display());
    info!("Published embedding model: {}", artifact.embedding_model_file().display());
    Ok(())
}

async fn classify(args: ClassifyArgs) -> Result<()> {
    let mut serving = ServingConfig::from_env().context("invalid serving configuration")?;
    if let Some(dir) = args.model_dir {
        serving.model_dir = dir;
    }
    if args.rules.is_some() {
        serving.rules_path = args.rules;
    }
    if let Some(sources) = args.oracle_sources {
        serving.routing = RoutingPolicy::from_source_list(&sources);
    }
    serving.log_config();

    let oracle_config = OracleConfig::from_env().context("invalid oracle configuration")?;
    oracle_config.log_config();
    let oracle = LlmOracle::new(oracle_config).context("cannot create LLM oracle")?;

    let rules = RegexRuleSet::load(serving.rules_path()).context("cannot load regex rules")?;
    let bundle = ModelBundle::load(&serving.model_dir)
        .with_context(|| format!("cannot load models from {}", serving.model_dir.display()))?;
    let cascade = bundle
        .cascade(Arc::new(rules), Arc::new(oracle))?
        .with_routing(serving.routing.clone())
        .with_max_concurrency(serving.max_concurrency);

    let input = File::open(&args.input).with_context(|| format!("cannot open {}", args.input.display()))?;
    let output =
        File::create(&args.output).with_context(|| format!("cannot create {}", args.output.display()))?;
    let rows = classify_csv(&cascade, BufReader::new(input), BufWriter::new(output)).await?;

    info!("✅ Classified {} rows into {}", rows, args.output.display());
    Ok(())
}
