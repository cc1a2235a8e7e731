//! Title classifier for generic downloads.
//!
//! Maps a release title to a source category and, when the title names one,
//! a person. The submission orchestrator uses the answer to pick a save
//! directory and falls back to the base directory on any failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::llm::{parse_json_response, CompletionRequest, LlmClient, LlmError};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("expected {expected} classifications, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Classification of one title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub source_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_name: Option<String>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.source_category.trim().is_empty()
    }
}

/// Classifier configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify each title; the result has one entry per input, in order.
    async fn classify(&self, titles: &[String]) -> Result<Vec<Classification>, ClassifierError>;
}

const SYSTEM_PROMPT: &str = "You sort download titles into library folders. \
For every title return an object with \"source_category\" (a short folder name such as \
\"movies\", \"anime\", \"tv\", \"music\", \"documentary\") and \"person_name\" \
(the main performer or creator if the title names one, otherwise null). \
Answer with a JSON array only, one object per title, in input order.";

/// Classifier backed by an LLM prompt.
pub struct LlmClassifier {
    llm: Arc<dyn LlmClient>,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn build_prompt(titles: &[String]) -> String {
        let mut prompt = String::from("Titles:\n");
        for (i, title) in titles.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, title));
        }
        prompt
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, titles: &[String]) -> Result<Vec<Classification>, ClassifierError> {
        if titles.is_empty() {
            return Ok(Vec::new());
        }

        let request = CompletionRequest::new(Self::build_prompt(titles))
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(256 + 64 * titles.len() as u32);

        let response = self.llm.complete(request).await?;
        let classifications: Vec<Classification> = parse_json_response(&response.text)?;

        if classifications.len() != titles.len() {
            return Err(ClassifierError::CountMismatch {
                expected: titles.len(),
                actual: classifications.len(),
            });
        }

        debug!(model = %response.model, count = classifications.len(), "Titles classified");
        Ok(classifications)
    }
}
