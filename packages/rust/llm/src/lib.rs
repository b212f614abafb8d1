//! Chat-completion client for SEOScribe.
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint and resubmits
//! transient failures with a randomized exponential wait.

mod client;
mod retry;

use std::future::Future;

use serde::{Deserialize, Serialize};

use seoscribe_shared::Result;

pub use client::{ChatClient, ChatClientConfig};
pub use retry::{RetryPolicy, with_retry};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One message of a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request body of `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A successful completion with its usage accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Text of the first choice.
    pub text: String,
    pub role: Role,
    /// Model that served the request, as reported by the API.
    pub model: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    /// Wall-clock time of the successful attempt.
    pub latency_ms: u64,
}

// ---------------------------------------------------------------------------
// Provider seam
// ---------------------------------------------------------------------------

/// Anything that can turn a conversation into a completion.
///
/// [`ChatClient`] is the HTTP implementation. Pipelines are generic over
/// this trait so they can run against canned replies.
pub trait CompletionProvider: Send + Sync {
    /// Produce a completion for `messages`, resubmitting transient failures.
    fn complete(&self, messages: &[ChatMessage]) -> impl Future<Output = Result<Completion>> + Send;

    /// Model identifier requests are sent with.
    fn model(&self) -> &str;
}
