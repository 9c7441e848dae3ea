/// Dependency injection traits for the classification tiers
///
/// This module provides trait-based abstractions for:
/// - Turning log messages into embedding vectors
/// - Delegating a message to a remote classification oracle
///
/// This allows you to easily swap implementations for testing or for
/// different model backends and LLM providers.
use crate::error::Result;
use async_trait::async_trait;

/// Dense, fixed-dimension representation of one log message.
pub type EmbeddingVector = Vec<f32>;

// ============================================================================
// Embedder Trait
// ============================================================================

/// Trait for mapping log messages to fixed-length dense vectors
///
/// Implementations must be deterministic for a fixed model and must
/// preserve order: `output[i]` is the embedding of `messages[i]`.
pub trait Embedder: Send + Sync {
    /// Encode a batch of messages
    fn encode(&self, messages: &[&str]) -> Vec<EmbeddingVector>;

    /// Encode a single message
    ///
    /// Default implementation calls `encode` with a batch of one
    fn encode_one(&self, message: &str) -> EmbeddingVector {
        self.encode(&[message]).pop().unwrap_or_default()
    }

    /// Dimensionality of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Get the name/identifier of this embedder (for reporting)
    fn name(&self) -> &str;
}

// ============================================================================
// Oracle Trait
// ============================================================================

/// Trait for classifying a single message with a remote model
///
/// Implementations can use:
/// - Hosted chat-completion APIs (Groq, OpenAI, Anthropic)
/// - Local model servers (Ollama)
/// - Mock/test oracles
///
/// A malformed answer resolves to "Unclassified"; only transport or auth
/// failures surface as `ClassifierError::ServiceUnavailable`.
#[async_trait]
pub trait LogOracle: Send + Sync {
    /// Classify a single log message
    async fn classify(&self, message: &str) -> Result<String>;

    /// Get the name/identifier of this oracle (for reporting)
    fn name(&self) -> &str;
}
