use crate::config::env_parse;
use crate::error::{ClassifierError, Result};
use serde::{Deserialize, Serialize};

/// Remote text-generation backends the oracle can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleProvider {
    /// Groq's OpenAI-compatible chat completions API
    Groq,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    /// Local Ollama server (`/api/generate`)
    Ollama,
}

impl OracleProvider {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ClassifierError::Configuration(format!(
                "unsupported LLM provider: {other}"
            ))),
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1/chat/completions",
            Self::OpenAi => "https://api.openai.com/v1/chat/completions",
            Self::Anthropic => "https://api.anthropic.com/v1/messages",
            Self::Ollama => "http://localhost:11434/api/generate",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

/// Bounded retry with exponential backoff for transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
        }
    }
}

/// Configuration for the LLM classification oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    pub provider: OracleProvider,
    pub model: String,
    pub api_key: Option<String>,
    /// Full request URL; the provider default is used when absent
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// The two categories the prompt offers besides "Unclassified"
    pub categories: [String; 2],
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: OracleProvider::Groq,
            model: "deepseek-r1-distill-llama-70b".to_string(),
            api_key: None,
            endpoint: None,
            timeout_secs: 60,
            temperature: 0.5,
            retry: RetryPolicy::default(),
            categories: ["Workflow Error".to_string(), "Deprecation Warning".to_string()],
        }
    }
}

impl OracleConfig {
    /// Load from environment variables
    ///
    /// `LLM_CONFIG_FILE` may point at a JSON file holding the whole config;
    /// otherwise individual `LLM_*` variables override the defaults.
    pub fn from_env() -> Result<Self> {
        if let Ok(config_path) = std::env::var("LLM_CONFIG_FILE") {
            let config_str = std::fs::read_to_string(&config_path).map_err(|e| {
                ClassifierError::Configuration(format!("cannot read LLM_CONFIG_FILE {config_path}: {e}"))
            })?;
            let config: OracleConfig = serde_json::from_str(&config_str)?;
            return Ok(config);
        }

        let mut config = Self::default();
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.provider = OracleProvider::parse(&provider)?;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.model = model;
        }
        config.api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("GROQ_API_KEY"))
            .ok();
        config.endpoint = std::env::var("LLM_ENDPOINT").ok();
        config.timeout_secs = env_parse("LLM_TIMEOUT_SECS", config.timeout_secs)?;
        config.retry.max_retries = env_parse("LLM_MAX_RETRIES", config.retry.max_retries)?;
        config.retry.initial_backoff_ms = env_parse("LLM_INITIAL_BACKOFF_MS", config.retry.initial_backoff_ms)?;

        Ok(config)
    }

    pub fn endpoint_url(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ClassifierError::Configuration("LLM model must be set".to_string()));
        }
        if self.provider.requires_api_key() && self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ClassifierError::Configuration(format!(
                "{:?} provider requires an API key (LLM_API_KEY)",
                self.provider
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ClassifierError::Configuration("LLM timeout must be at least 1 second".to_string()));
        }
        if self.categories.iter().any(|c| c.trim().is_empty()) {
            return Err(ClassifierError::Configuration("oracle categories must not be empty".to_string()));
        }
        if self.categories[0].eq_ignore_ascii_case(&self.categories[1]) {
            return Err(ClassifierError::Configuration("oracle categories must be distinct".to_string()));
        }
        Ok(())
    }

    pub fn log_config(&self) {
        tracing::info!("🤖 Oracle configuration:");
        tracing::info!("   Provider: {:?}", self.provider);
        tracing::info!("   Model: {}", self.model);
        tracing::info!("   Endpoint: {}", self.endpoint_url());
        if let Some(ref key) = self.api_key {
            tracing::info!("   API Key: {}***", key.chars().take(4).collect::<String>());
        }
        tracing::info!(
            "   Retries: {} (initial backoff {}ms), timeout {}s",
            self.retry.max_retries,
            self.retry.initial_backoff_ms,
            self.timeout_secs
        );
        tracing::info!("   Categories: {} / {}", self.categories[0], self.categories[1]);
    }
}
