//! HTTP implementation of [`CompletionProvider`].

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use seoscribe_shared::{AppConfig, Result, SeoScribeError};

use crate::retry::{RetryPolicy, with_retry};
use crate::{ChatMessage, ChatRequest, Completion, CompletionProvider, Role};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("SEOScribe/", env!("CARGO_PKG_VERSION"));

/// Longest raw error body quoted in an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Everything a [`ChatClient`] needs to talk to the API.
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: Url,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ChatClientConfig {
    /// Build from the loaded app config and a resolved API key.
    pub fn from_app_config(config: &AppConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: config.openai.parsed_base_url()?,
            api_key: api_key.into(),
            model: config.openai.model.clone(),
            temperature: config.openai.temperature,
            max_tokens: config.openai.max_tokens,
            timeout: config.openai.timeout(),
            retry: RetryPolicy::from(&config.retry),
        })
    }
}

/// Chat-completions client over `reqwest`.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    endpoint: String,
    config: ChatClientConfig,
}

impl ChatClient {
    /// Build the HTTP client with the configured timeout.
    pub fn new(config: ChatClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(SeoScribeError::config("API key is empty"));
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| SeoScribeError::Network(format!("failed to build HTTP client: {e}")))?;
        let endpoint = format!(
            "{}/chat/completions",
            config.base_url.as_str().trim_end_matches('/')
        );

        Ok(Self {
            http,
            endpoint,
            config,
        })
    }

    /// Settings this client was built with.
    pub fn config(&self) -> &ChatClientConfig {
        &self.config
    }

    /// Send one request, no resubmission.
    ///
    /// Non-2xx answers become [`SeoScribeError::Api`]; a reply without
    /// choices or with empty text becomes [`SeoScribeError::Generation`].
    pub async fn complete_once(&self, messages: &[ChatMessage]) -> Result<Completion> {
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let started = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SeoScribeError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            SeoScribeError::Network(format!("{}: failed to read body: {e}", self.endpoint))
        })?;

        if !status.is_success() {
            return Err(SeoScribeError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            SeoScribeError::Generation(format!("malformed completion response: {e}"))
        })?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SeoScribeError::Generation("response has no choices".into()))?;
        let content = choice.message.content.unwrap_or_default();
        if content.trim().is_empty() {
            return Err(SeoScribeError::Generation("completion text is empty".into()));
        }

        let usage = parsed.usage.unwrap_or_default();
        debug!(
            latency_ms,
            tokens_in = usage.prompt_tokens,
            tokens_out = usage.completion_tokens,
            "completion received"
        );

        Ok(Completion {
            text: content,
            role: choice
                .message
                .role
                .as_deref()
                .and_then(Role::parse)
                .unwrap_or(Role::Assistant),
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
            tokens_in: usage.prompt_tokens,
            tokens_out: usage.completion_tokens,
            latency_ms,
        })
    }
}

impl CompletionProvider for ChatClient {
    #[instrument(skip_all, fields(model = %self.config.model, messages = messages.len()))]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        with_retry(&self.config.retry, "chat completion", |_| {
            self.complete_once(messages)
        })
        .await
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// `error.message` from an OpenAI-style error body, else the truncated raw body.
fn api_error_message(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error.message;
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{cut}…")
    } else {
        trimmed.to_string()
    }
}
