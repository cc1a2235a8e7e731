//! Optional translation of metadata text.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::{parse_json_response, CompletionRequest, LlmClient, LlmError};

#[derive(Debug, Error)]
pub enum TranslatorError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("expected {expected} translations, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Translator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Language name or code the model should translate into.
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

fn default_target_language() -> String {
    "English".to_string()
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_language: default_target_language(),
        }
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a batch of texts. The output has the same length and order.
    async fn translate(&self, texts: &[String]) -> Result<Vec<String>, TranslatorError>;
}

/// Translator backed by an LLM prompt.
pub struct LlmTranslator {
    llm: Arc<dyn LlmClient>,
    target_language: String,
}

impl LlmTranslator {
    pub fn new(llm: Arc<dyn LlmClient>, target_language: impl Into<String>) -> Self {
        Self {
            llm,
            target_language: target_language.into(),
        }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, texts: &[String]) -> Result<Vec<String>, TranslatorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let input = serde_json::to_string(texts).map_err(|e| LlmError::Json(e.to_string()))?;
        let system = format!(
            "Translate every string of the JSON array into {}. Keep names, codes and \
             numbers unchanged. Answer with a JSON array of strings only, same length and order.",
            self.target_language
        );
        let max_tokens = 256 + texts.iter().map(|t| t.len() as u32).sum::<u32>() * 2;

        let response = self
            .llm
            .complete(
                CompletionRequest::new(input)
                    .with_system(system)
                    .with_max_tokens(max_tokens),
            )
            .await?;

        let translated: Vec<String> = parse_json_response(&response.text)?;
        if translated.len() != texts.len() {
            return Err(TranslatorError::CountMismatch {
                expected: texts.len(),
                actual: translated.len(),
            });
        }
        Ok(translated)
    }
}
