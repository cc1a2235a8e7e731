//! Mock LLM collaborators for testing: the raw completion client plus
//! classifier and translator doubles.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::classifier::{Classification, Classifier, ClassifierError};
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmUsage};
use crate::translator::{Translator, TranslatorError};

/// LLM client answering from a queue of canned responses.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Arc<RwLock<VecDeque<String>>>,
    prompts: Arc<RwLock<Vec<String>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the text of the next completion.
    pub async fn push_response(&self, text: impl Into<String>) {
        self.responses.write().await.push_back(text.into());
    }

    /// User prompts received, in order.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.read().await.clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.prompts.write().await.push(request.prompt);
        let text = self
            .responses
            .write()
            .await
            .pop_front()
            .ok_or_else(|| LlmError::Api {
                status: 500,
                message: "no mock response queued".to_string(),
            })?;

        Ok(CompletionResponse {
            text,
            usage: LlmUsage::default(),
            model: "mock-model".to_string(),
        })
    }
}

/// Classifier returning the same classification for every title.
#[derive(Debug, Default)]
pub struct MockClassifier {
    result: Arc<RwLock<Option<Classification>>>,
    fail: Arc<RwLock<bool>>,
    calls: Arc<RwLock<usize>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_result(&self, classification: Classification) {
        *self.result.write().await = Some(classification);
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Number of `classify` calls.
    pub async fn calls(&self) -> usize {
        *self.calls.read().await
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, titles: &[String]) -> Result<Vec<Classification>, ClassifierError> {
        *self.calls.write().await += 1;
        if *self.fail.read().await {
            return Err(ClassifierError::Llm(LlmError::Http("mock failure".to_string())));
        }

        let result = self.result.read().await.clone().unwrap_or(Classification {
            source_category: String::new(),
            person_name: None,
        });
        Ok(titles.iter().map(|_| result.clone()).collect())
    }
}

/// Translator with a fixed dictionary; unknown texts come back unchanged.
#[derive(Debug, Default)]
pub struct MockTranslator {
    translations: Arc<RwLock<HashMap<String, String>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_translation(&self, from: &str, to: &str) {
        self.translations
            .write()
            .await
            .insert(from.to_string(), to.to_string());
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, texts: &[String]) -> Result<Vec<String>, TranslatorError> {
        if *self.fail.read().await {
            return Err(TranslatorError::Llm(LlmError::Http("mock failure".to_string())));
        }

        let translations = self.translations.read().await;
        Ok(texts
            .iter()
            .map(|t| translations.get(t).cloned().unwrap_or_else(|| t.clone()))
            .collect())
    }
}
