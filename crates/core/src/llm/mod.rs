//! LLM completion clients.
//!
//! Used by the optional classifier and translator. Both prompt for a JSON
//! answer and parse it with [`parse_json_response`].

mod anthropic;
mod config;
mod ollama;

pub use anthropic::AnthropicClient;
pub use config::{LlmConfig, LlmProvider};
pub use ollama::OllamaClient;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Error type for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Request for a completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt (instructions for the model)
    pub system: Option<String>,
    /// User message
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.0,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Response from a completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The generated text
    pub text: String,
    pub usage: LlmUsage,
    /// Model that answered
    pub model: String,
}

/// Trait for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name (e.g., "anthropic", "ollama")
    fn provider(&self) -> &str;

    fn model(&self) -> &str;

    /// Send a completion request and get a text response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Parse the JSON object or array embedded in a model answer.
///
/// Models often wrap JSON in prose or markdown fences, so everything outside
/// the outermost brackets is ignored.
pub fn parse_json_response<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let start = text.find(['{', '[']);
    let json_str = match start {
        Some(start) => {
            let closing = if text[start..].starts_with('{') { '}' } else { ']' };
            match text.rfind(closing) {
                Some(end) if end > start => &text[start..=end],
                _ => &text[start..],
            }
        }
        None => text,
    };

    serde_json::from_str(json_str).map_err(|e| LlmError::Json(format!("{}: {}", e, text)))
}

/// Build the client selected by `[llm]`.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let timeout = Duration::from_secs(config.timeout_secs as u64);
    match config.provider {
        LlmProvider::Anthropic => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| LlmError::NotConfigured("llm.api_key".to_string()))?;
            let mut client = AnthropicClient::new(api_key, &config.model, timeout)?;
            if let Some(base) = &config.api_base {
                client = client.with_api_base(base);
            }
            Ok(Arc::new(client))
        }
        LlmProvider::Ollama => {
            let mut client = OllamaClient::new(&config.model, timeout)?;
            if let Some(base) = &config.api_base {
                client = client.with_api_base(base);
            }
            Ok(Arc::new(client))
        }
    }
}

pub(crate) fn map_reqwest_error(e: reqwest::Error, timeout: Duration) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::Http(e.to_string())
    }
}
