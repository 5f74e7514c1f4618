//! Minimal OpenAI-compatible chat completions client.
//!
//! This crate provides:
//! - The [`ChatClient`] trait, the seam the narrative engine talks through
//! - [`OpenAiCompatible`], a non-streaming HTTP implementation
//! - A static provider table with per-service defaults ([`providers`])

pub mod providers;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use providers::{
    provider_list, ProviderKind, ProviderSummary, ReasoningEffort, ServiceDefaults, ServiceKind,
};

/// Errors that can occur when talking to an LLM provider.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Anything that can turn a chat request into a reply.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn generate_response(&self, request: ChatRequest) -> Result<ChatResponse, Error>;
}

/// Client for any endpoint speaking the OpenAI chat completions protocol.
#[derive(Clone)]
pub struct OpenAiCompatible {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatible {
    /// Create a client for the given base URL (without `/chat/completions`).
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    /// Create a client for a known provider.
    ///
    /// `custom_url` overrides the provider's endpoint and is mandatory for
    /// `openai-compatible`.
    pub fn for_provider(
        provider: ProviderKind,
        api_key: Option<String>,
        custom_url: Option<&str>,
    ) -> Result<Self, Error> {
        let base_url = match custom_url.filter(|u| !u.trim().is_empty()) {
            Some(url) => url.trim().to_string(),
            None => provider
                .endpoint()
                .ok_or_else(|| Error::Config(format!("{provider} requires a custom base URL")))?
                .to_string(),
        };

        if provider.config().requires_api_key && api_key.as_deref().map_or(true, str::is_empty) {
            return Err(Error::NoApiKey);
        }

        Self::new(base_url, api_key)
    }

    /// Create a client for a provider, reading `<PROVIDER>_API_KEY` and
    /// `<PROVIDER>_BASE_URL` from the environment.
    pub fn from_env(provider: ProviderKind) -> Result<Self, Error> {
        let api_key = std::env::var(provider.api_key_var()).ok();
        let url_var = provider.api_key_var().replace("_API_KEY", "_BASE_URL");
        let custom_url = std::env::var(url_var).ok();
        Self::for_provider(provider, api_key, custom_url.as_deref())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
            );
        }
        Ok(headers)
    }

    fn build_api_request(&self, request: &ChatRequest) -> serde_json::Value {
        let api_request = ApiRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut body = serde_json::to_value(api_request).unwrap_or_default();
        if let (Some(map), Some(serde_json::Value::Object(extra))) =
            (body.as_object_mut(), request.extra_body.as_ref())
        {
            for (key, value) in extra {
                map.insert(key.clone(), value.clone());
            }
        }
        body
    }
}

#[async_trait]
impl ChatClient for OpenAiCompatible {
    async fn generate_response(&self, request: ChatRequest) -> Result<ChatResponse, Error> {
        let body = self.build_api_request(&request);
        let headers = self.build_headers()?;

        tracing::debug!(model = %request.model, base_url = %self.base_url, "sending chat request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        parse_response(api_response)
    }
}

fn parse_response(api_response: ApiResponse) -> Result<ChatResponse, Error> {
    let content = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Parse("response contained no choices".to_string()))?
        .message
        .content
        .unwrap_or_default();

    Ok(ChatResponse {
        content,
        usage: api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }),
    })
}

// ============================================================================
// Public types
// ============================================================================

/// A chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    /// Provider-specific keys merged into the top level of the request body.
    pub extra_body: Option<serde_json::Value>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            extra_body: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_extra_body(mut self, extra_body: Option<serde_json::Value>) -> Self {
        self.extra_body = extra_body;
        self
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// The model's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}
