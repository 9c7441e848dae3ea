use crate::error::{ClassifierError, Result};
use crate::oracle_config::{OracleConfig, OracleProvider};
use crate::records::UNCLASSIFIED;
use crate::traits::LogOracle;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

static CATEGORY_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<category>(.*?)</category>").expect("category tag regex")
});

/// Reasoning models wrap their chain of thought in <think> blocks, which may
/// mention the tag pair before the final answer.
static THINK_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<think>.*?</think>").expect("think block regex")
});

/// Extract the category from a model reply.
///
/// Takes the first `<category>...</category>` span outside any `<think>`
/// block and maps it case-insensitively onto one of `categories` or
/// "Unclassified". Missing tags and unknown names yield "Unclassified".
pub fn parse_category(text: &str, categories: &[String]) -> String {
    let visible = THINK_BLOCK.replace_all(text, "");
    let Some(span) = CATEGORY_TAG.captures(&visible).and_then(|c| c.get(1)) else {
        tracing::warn!(component = "LlmOracle", "no <category> tag in oracle reply");
        return UNCLASSIFIED.to_string();
    };

    let answer = span.as_str().trim();
    if let Some(known) = categories.iter().find(|c| c.eq_ignore_ascii_case(answer)) {
        return known.clone();
    }
    if !answer.eq_ignore_ascii_case(UNCLASSIFIED) {
        tracing::warn!(component = "LlmOracle", answer, "oracle answered with an unknown category");
    }
    UNCLASSIFIED.to_string()
}

/// Why a single oracle request failed.
#[derive(Debug)]
enum AttemptError {
    /// Transport failure, rate limit or server error.
    Transient(String),
    /// Client error such as rejected credentials; retrying cannot help.
    Rejected(String),
}

impl AttemptError {
    fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            AttemptError::Transient(message)
        } else {
            AttemptError::Rejected(message)
        }
    }
}

/// Remote LLM used as the last tier of the cascade.
pub struct LlmOracle {
    config: OracleConfig,
    http_client: reqwest::Client,
}

impl LlmOracle {
    pub fn new(config: OracleConfig) -> Result<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassifierError::Configuration(format!("cannot build HTTP client: {e}")))?;

        tracing::info!(
            component = "LlmOracle",
            "🤖 LLM oracle configured: {:?} ({}) at {}",
            config.provider,
            config.model,
            config.endpoint_url()
        );

        Ok(Self { config, http_client })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn build_prompt(&self, message: &str) -> String {
        let [first, second] = &self.config.categories;
        format!(
            r#"Classify the log message into one of these categories:
(1) {first}, (2) {second}.
If you can't figure out a category, use "{UNCLASSIFIED}".
Put the category inside <category> </category> tags.
Log message: {message}"#
        )
    }

    /// One request; `Ok(None)` means the provider answered but without text.
    async fn request(&self, prompt: &str) -> std::result::Result<Option<String>, AttemptError> {
        let url = self.config.endpoint_url();
        let request = match self.config.provider {
            OracleProvider::Groq | OracleProvider::OpenAi => self
                .http_client
                .post(url)
                .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
                .json(&serde_json::json!({
                    "model": self.config.model,
                    "messages": [{"role": "user", "content": prompt}],
                    "temperature": self.config.temperature,
                })),
            OracleProvider::Anthropic => self
                .http_client
                .post(url)
                .header("x-api-key", self.config.api_key.as_deref().unwrap_or_default())
                .header("anthropic-version", "2023-06-01")
                .json(&serde_json::json!({
                    "model": self.config.model,
                    "max_tokens": 1000,
                    "temperature": self.config.temperature,
                    "messages": [{"role": "user", "content": prompt}],
                })),
            OracleProvider::Ollama => self.http_client.post(url).json(&serde_json::json!({
                "model": self.config.model,
                "prompt": prompt,
                "stream": false,
                "options": {"temperature": self.config.temperature},
            })),
        };

        let response = request
            .send()
            .await
            .map_err(|e| AttemptError::Transient(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::from_status(
                status,
                format!("{:?} API error {status}: {body}", self.config.provider),
            ));
        }

        // A body that is not JSON is a malformed reply, not a transport failure
        let Ok(response_json) = response.json::<serde_json::Value>().await else {
            return Ok(None);
        };

        let text = match self.config.provider {
            OracleProvider::Groq | OracleProvider::OpenAi => response_json
                .get("choices")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("message"))
                .and_then(|m| m.get("content"))
                .and_then(|v| v.as_str()),
            OracleProvider::Anthropic => response_json
                .get("content")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("text"))
                .and_then(|v| v.as_str()),
            OracleProvider::Ollama => response_json.get("response").and_then(|v| v.as_str()),
        };
        Ok(text.map(str::to_string))
    }
}

#[async_trait]
impl LogOracle for LlmOracle {
    async fn classify(&self, message: &str) -> Result<String> {
        let prompt = self.build_prompt(message);
        let max_retries = self.config.retry.max_retries;
        let mut backoff_ms = self.config.retry.initial_backoff_ms;
        let mut retry_count = 0;

        loop {
            match self.request(&prompt).await {
                Ok(Some(text)) => {
                    if retry_count > 0 {
                        tracing::info!(component = "LlmOracle", "oracle succeeded after {} retries", retry_count);
                    }
                    return Ok(parse_category(&text, &self.config.categories));
                }
                Ok(None) => {
                    tracing::warn!(component = "LlmOracle", "oracle reply carried no text");
                    return Ok(UNCLASSIFIED.to_string());
                }
                Err(AttemptError::Rejected(e)) => {
                    tracing::error!(component = "LlmOracle", "oracle rejected the request: {}", e);
                    return Err(ClassifierError::ServiceUnavailable(e));
                }
                Err(AttemptError::Transient(e)) => {
                    if retry_count >= max_retries {
                        tracing::error!(
                            component = "LlmOracle",
                            "oracle request failed after {} retries: {}",
                            retry_count,
                            e
                        );
                        return Err(ClassifierError::ServiceUnavailable(e));
                    }
                    retry_count += 1;

                    tracing::warn!(
                        component = "LlmOracle",
                        "oracle attempt {} failed, retrying in {}ms: {}",
                        retry_count,
                        backoff_ms,
                        e
                    );

                    // Exponential backoff with jitter
                    let jitter = (backoff_ms as f64 * 0.1 * rand::random::<f64>()) as u64;
                    tokio::time::sleep(Duration::from_millis(backoff_ms + jitter)).await;
                    backoff_ms = backoff_ms.saturating_mul(2);
                }
            }
        }
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<String> {
        vec!["Workflow Error".to_string(), "Deprecation Warning".to_string()]
    }

    #[test]
    fn test_parse_known_category() {
        let reply = "The message says a feature is going away.\n<category>Deprecation Warning</category>";
        assert_eq!(parse_category(reply, &categories()), "Deprecation Warning");
    }

    #[test]
    fn test_parse_is_case_insensitive_and_trimmed() {
        let reply = "<category>\n  workflow error \n</category>";
        assert_eq!(parse_category(reply, &categories()), "Workflow Error");
    }

    #[test]
    fn test_parse_first_span_wins() {
        let reply = "<category>Workflow Error</category> or maybe <category>Deprecation Warning</category>";
        assert_eq!(parse_category(reply, &categories()), "Workflow Error");
    }

    #[test]
    fn test_parse_skips_think_block() {
        let reply = "<think>Is it <category>Workflow Error</category>? No.</think>\n<category>Deprecation Warning</category>";
        assert_eq!(parse_category(reply, &categories()), "Deprecation Warning");
    }

    #[test]
    fn test_parse_falls_back_to_unclassified() {
        assert_eq!(parse_category("no tags at all", &categories()), UNCLASSIFIED);
        assert_eq!(parse_category("<category>Security Alert</category>", &categories()), UNCLASSIFIED);
        assert_eq!(parse_category("<category>Workflow Error", &categories()), UNCLASSIFIED);
        assert_eq!(parse_category("<category>unclassified</category>", &categories()), UNCLASSIFIED);
    }

    #[test]
    fn test_status_retry_classes() {
        let transient = |status| matches!(AttemptError::from_status(status, String::new()), AttemptError::Transient(_));
        assert!(transient(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        assert!(transient(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        assert!(transient(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(!transient(reqwest::StatusCode::UNAUTHORIZED));
        assert!(!transient(reqwest::StatusCode::FORBIDDEN));
        assert!(!transient(reqwest::StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_prompt_names_both_categories() {
        let oracle = LlmOracle::new(OracleConfig {
            provider: OracleProvider::Ollama,
            ..Default::default()
        })
        .unwrap();
        let prompt = oracle.build_prompt("Case escalation for ticket ID 7324 failed");
        assert!(prompt.contains("(1) Workflow Error, (2) Deprecation Warning"));
        assert!(prompt.contains("<category> </category>"));
        assert!(prompt.ends_with("Log message: Case escalation for ticket ID 7324 failed"));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        assert!(LlmOracle::new(OracleConfig::default()).is_err());
    }
}
