//! LLM-backed word enrichment
//!
//! ```text
//! ┌─────────────┐   prompts::*    ┌──────────────────┐
//! │ WordEnricher│────────────────►│ dyn LlmProvider  │
//! └──────┬──────┘                 ├────────┬─────────┤
//!        │ parse_json_answer      │ OpenAI │  Mock   │
//!        ▼                        └────────┴─────────┘
//!  typed answers → UnifiedWord
//!
//! ┌─────────────────────┐  GET /api/v2/entries/en/{word}
//! │ FreeDictionaryClient│────────────────────────────────► pronunciation
//! └─────────────────────┘
//! ```
//!
//! Providers are selected at start-up: `OpenAiProvider` when
//! `OPENAI_API_KEY` is set, `MockProvider` for tests and offline runs.

pub mod dictionary;
pub mod enrich;
pub mod json;
pub mod mock;
pub mod openai;
pub mod prompts;

use async_trait::async_trait;

pub use dictionary::{
    parse_entries, DictionaryError, FreeDictionaryClient, PronunciationSource, StaticDictionary,
};
pub use enrich::{
    EnrichField, InferredWord, SynonymSet, WordDetails, WordEnricher,
};
pub use json::parse_json_answer;
pub use mock::MockProvider;
pub use openai::{LlmConfig, OpenAiProvider};

// ============================================================================
// Provider Interface
// ============================================================================

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Ask the provider for a JSON object answer.
    pub json_response: bool,
}

impl CompletionRequest {
    pub fn new(system: &str, user: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system), Message::user(user)],
            max_tokens: None,
            temperature: None,
            json_response: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Content of the last user message.
    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub finish_reason: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM not configured: {0}")]
    NotConfigured(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parsing error: {0}")]
    Parse(String),
}

impl LlmError {
    /// Errors worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. } | LlmError::Network(_))
    }
}
