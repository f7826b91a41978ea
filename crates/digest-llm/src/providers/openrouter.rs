//! OpenRouter provider implementation
//!
//! OpenRouter exposes the OpenAI chat-completions wire format, so this
//! provider works against any OpenAI-compatible endpoint by overriding
//! `api_base`. See: https://openrouter.ai/docs/api-reference/chat-completion
//!
//! # Examples
//!
//! ```no_run
//! use digest_llm::{CompletionRequest, LLMProvider, Message};
//! use digest_llm::providers::OpenRouterProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OpenRouterProvider::new(std::env::var("OPENROUTER_API_KEY")?)?;
//!
//!     let free = provider.free_models().await?;
//!     let request = CompletionRequest::builder(&free[0])
//!         .add_message(Message::user("你好"))
//!         .max_tokens(100)
//!         .build();
//!
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.message.content);
//!     Ok(())
//! }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, Result, StopReason,
    TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CATALOG_TIMEOUT_SECS: u64 = 15;

/// Configuration for the OpenRouter provider
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL (default: "https://openrouter.ai/api/v1")
    pub api_base: String,

    /// Completion request timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Model catalogue request timeout in seconds (default: 15)
    pub catalog_timeout_secs: u64,

    /// Optional `HTTP-Referer` attribution header
    pub referer: Option<String>,

    /// Optional `X-Title` attribution header
    pub title: Option<String>,
}

impl OpenRouterConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set completion timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set catalogue timeout in seconds
    pub fn with_catalog_timeout(mut self, timeout_secs: u64) -> Self {
        self.catalog_timeout_secs = timeout_secs;
        self
    }

    /// Set attribution headers shown on the OpenRouter dashboard
    pub fn with_attribution(mut self, referer: impl Into<String>, title: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self.title = Some(title.into());
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.api_base.trim_end_matches('/'))
    }
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            catalog_timeout_secs: DEFAULT_CATALOG_TIMEOUT_SECS,
            referer: None,
            title: None,
        }
    }
}

/// One entry of the model catalogue
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    /// Model id, e.g. `deepseek/deepseek-chat:free`
    pub id: String,

    /// Per-unit prices; values arrive as strings or numbers
    #[serde(default)]
    pub pricing: Option<HashMap<String, serde_json::Value>>,
}

impl ModelInfo {
    /// A model is free when its id carries the `:free` suffix or every
    /// known price (prompt, completion, request) is zero.
    pub fn is_free(&self) -> bool {
        if self.id.ends_with(":free") {
            return true;
        }

        let Some(pricing) = &self.pricing else {
            return false;
        };

        let prices: Vec<f64> = ["prompt", "completion", "request"]
            .iter()
            .filter_map(|key| pricing.get(*key))
            .filter_map(|value| match value {
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                serde_json::Value::Number(n) => n.as_f64(),
                _ => None,
            })
            .collect();

        !prices.is_empty() && prices.iter().all(|price| *price == 0.0)
    }
}

/// OpenRouter provider
pub struct OpenRouterProvider {
    client: Client,
    config: OpenRouterConfig,
}

impl OpenRouterProvider {
    /// Create a new provider with custom configuration
    pub fn with_config(config: OpenRouterConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a new provider with API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenRouterConfig::new(api_key))
    }

    /// Get the current configuration
    pub fn config(&self) -> &OpenRouterConfig {
        &self.config
    }

    /// Fetch the public model catalogue (single request, no retry)
    #[instrument(skip(self), fields(api_base = %self.config.api_base))]
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.config.endpoint("models"))
            .timeout(Duration::from_secs(self.config.catalog_timeout_secs))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::RequestFailed(format!(
                "model catalogue HTTP {status}: {body}"
            )));
        }

        let catalogue: ModelCatalogue = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse model catalogue: {e}"))
        })?;

        debug!("Model catalogue lists {} models", catalogue.data.len());
        Ok(catalogue.data)
    }

    /// Ids of free models, catalogue order, duplicates removed
    pub async fn free_models(&self) -> Result<Vec<String>> {
        let free = select_free_models(&self.list_models().await?);
        if free.is_empty() {
            return Err(LLMError::ModelNotFound(
                "no free model in the catalogue".to_string(),
            ));
        }
        Ok(free)
    }
}

/// Keep free models in catalogue order, dropping repeated ids
pub fn select_free_models(models: &[ModelInfo]) -> Vec<String> {
    let mut seen = HashSet::new();
    models
        .iter()
        .filter(|model| model.is_free())
        .filter(|model| seen.insert(model.id.clone()))
        .map(|model| model.id.clone())
        .collect()
}

#[async_trait]
impl LLMProvider for OpenRouterProvider {
    #[instrument(skip(self, request), fields(model = %request.model, api_base = %self.config.api_base))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = ChatRequest::from_request(&request);

        let mut builder = self
            .client
            .post(self.config.endpoint("chat/completions"))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");
        if let Some(referer) = &self.config.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.config.title {
            builder = builder.header("X-Title", title);
        }

        let response = builder.json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            return Err(match status.as_u16() {
                401 => LLMError::AuthenticationFailed,
                429 => LLMError::RateLimitExceeded(error_text),
                400 => LLMError::InvalidRequest(error_text),
                404 => LLMError::ModelNotFound(request.model),
                _ => LLMError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        let text = response.text().await?;
        parse_chat_response(&text, &request.model)
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatRequest<'a> {
    /// System prompt goes first in the messages array
    fn from_request(request: &'a CompletionRequest) -> Self {
        let system = request.system.as_deref().map(|content| ChatMessage {
            role: "system",
            content,
        });
        let messages = system
            .into_iter()
            .chain(request.messages.iter().map(|msg| ChatMessage {
                role: msg.role.as_str(),
                content: &msg.content,
            }))
            .collect();

        Self {
            model: &request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelCatalogue {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// Parse a 2xx chat-completions body.
///
/// OpenRouter reports some upstream failures with a 2xx status and an
/// `error` object instead of `choices`.
fn parse_chat_response(body: &str, requested_model: &str) -> Result<CompletionResponse> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| LLMError::UnexpectedResponse(format!("Failed to parse response: {e}")))?;

    let Some(choice) = parsed.choices.into_iter().next() else {
        return Err(match parsed.error {
            Some(error) => LLMError::RequestFailed(error.to_string()),
            None => LLMError::UnexpectedResponse(format!("No choices in response: {body}")),
        });
    };

    let finish_reason = choice.finish_reason.unwrap_or_default();
    let usage = parsed
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    debug!(
        "Received response - finish_reason: {}, tokens: {}/{}",
        finish_reason, usage.input_tokens, usage.output_tokens
    );

    Ok(CompletionResponse {
        message: Message::assistant(choice.message.content.unwrap_or_default()),
        model: parsed.model.unwrap_or_else(|| requested_model.to_string()),
        stop_reason: map_stop_reason(&finish_reason),
        usage,
    })
}

fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "stop" | "end_turn" | "" => StopReason::EndTurn,
        "length" | "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        "content_filter" => StopReason::ContentFilter,
        other => {
            debug!("Unknown stop reason: {}", other);
            StopReason::EndTurn
        }
    }
}
