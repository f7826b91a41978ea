//! Copy generation through an LLM provider

use crate::error::{DigestError, Result};
use crate::prompts::Prompt;
use async_trait::async_trait;
use digest_llm::providers::OpenRouterProvider;
use digest_llm::{CompletionRequest, LLMProvider, Message, StopReason};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Lists the models worth trying when none is pinned
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    /// Free model ids in catalogue order
    async fn free_models(&self) -> Result<Vec<String>>;
}

#[async_trait]
impl ModelCatalog for OpenRouterProvider {
    async fn free_models(&self) -> Result<Vec<String>> {
        Ok(OpenRouterProvider::free_models(self).await?)
    }
}

/// Model output after plain-text normalisation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCopy {
    pub text: String,
    /// Model that produced the text
    pub model: String,
}

/// Turns a prompt into copy.
///
/// With a pinned model exactly one request is sent. Otherwise the catalogue
/// is read once and each free model gets one request, in order, until one
/// answers with complete text.
pub struct CopyGenerator {
    provider: Arc<dyn LLMProvider>,
    catalog: Option<Arc<dyn ModelCatalog>>,
    model: Option<String>,
    temperature: f32,
    max_tokens: usize,
}

impl CopyGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            catalog: None,
            model: None,
            temperature: 0.7,
            max_tokens: 600,
        }
    }

    /// Catalogue used when no model is pinned
    pub fn with_catalog(mut self, catalog: Arc<dyn ModelCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    async fn candidates(&self) -> Result<Vec<String>> {
        if let Some(model) = &self.model {
            return Ok(vec![model.clone()]);
        }

        let catalog = self.catalog.as_ref().ok_or_else(|| {
            DigestError::Generation("no model pinned and no model catalogue available".to_string())
        })?;

        let models = catalog
            .free_models()
            .await
            .map_err(|e| DigestError::Generation(format!("model catalogue unavailable: {e}")))?;

        if models.is_empty() {
            return Err(DigestError::Generation("no free model available".to_string()));
        }

        info!(count = models.len(), "Selected free models");
        Ok(models)
    }

    async fn try_model(&self, model: &str, prompt: &Prompt) -> std::result::Result<String, String> {
        let request = CompletionRequest::builder(model)
            .system(prompt.system.clone())
            .add_message(Message::user(prompt.user.clone()))
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build();

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| e.to_string())?;

        if response.stop_reason == StopReason::MaxTokens {
            return Err("output truncated at the token limit".to_string());
        }

        let text = to_plain_text(response.message.text().unwrap_or_default());
        if text.is_empty() {
            return Err("empty completion".to_string());
        }

        Ok(text)
    }

    /// Generate copy for `prompt`
    #[instrument(skip_all, fields(pinned = self.model.is_some()))]
    pub async fn generate(&self, prompt: &Prompt) -> Result<GeneratedCopy> {
        let mut failures = Vec::new();

        for model in self.candidates().await? {
            match self.try_model(&model, prompt).await {
                Ok(text) => {
                    info!(model = %model, chars = text.chars().count(), "Generated copy");
                    return Ok(GeneratedCopy { text, model });
                }
                Err(reason) => {
                    warn!(model = %model, reason = %reason, "Model failed");
                    failures.push(format!("{model}: {reason}"));
                }
            }
        }

        Err(DigestError::Generation(failures.join("; ")))
    }
}

/// Strip the Markdown a model tends to add despite instructions.
///
/// Removes `**`, `__` and backticks, then one leading bullet marker
/// (`-`, `*`, `•`) per line.
pub fn to_plain_text(text: &str) -> String {
    text.lines()
        .map(|line| {
            let line = line.replace("**", "").replace("__", "").replace('`', "");
            let trimmed = line.trim_start();
            match trimmed.strip_prefix(|c| matches!(c, '-' | '*' | '•')) {
                Some(rest) => rest.trim_start().to_string(),
                None => line,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mockall::mock! {
    pub Provider {}

    #[async_trait]
    impl LLMProvider for Provider {
        async fn complete(&self, request: CompletionRequest) -> digest_llm::Result<digest_llm::CompletionResponse>;
        fn name(&self) -> &str;
    }
}

#[cfg(test)]
pub(crate) fn completion(text: &str, model: &str, stop_reason: StopReason) -> digest_llm::CompletionResponse {
    digest_llm::CompletionResponse {
        message: Message::assistant(text),
        model: model.to_string(),
        stop_reason,
        usage: digest_llm::TokenUsage::default(),
    }
}
