//! OpenAI Chat Completions provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, Usage};

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL";

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// First retry delay; doubled after every attempt.
    pub initial_backoff_ms: u64,
}

impl LlmConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            timeout_secs: 60,
            max_retries: 3,
            initial_backoff_ms: 500,
        }
    }

    /// Reads:
    /// - `OPENAI_API_KEY` (required)
    /// - `OPENAI_MODEL` (optional; default `gpt-4o-mini`)
    /// - `OPENAI_BASE_URL` (optional; default `https://api.openai.com`)
    pub fn from_env() -> Result<Self, LlmError> {
        let key = std::env::var(OPENAI_API_KEY_ENV).unwrap_or_default();
        let key = key.trim();
        if key.is_empty() {
            return Err(LlmError::NotConfigured(format!(
                "{OPENAI_API_KEY_ENV} is not set"
            )));
        }
        let mut config = Self::new(key);
        if let Ok(model) = std::env::var(OPENAI_MODEL_ENV) {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        if let Ok(base) = std::env::var(OPENAI_BASE_URL_ENV) {
            config.base_url = normalize_http_base_url(&base, DEFAULT_OPENAI_BASE_URL);
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

fn normalize_http_base_url(base_url: &str, default: &str) -> String {
    let mut host = base_url.trim().to_string();
    if host.is_empty() {
        host = default.to_string();
    }
    if !host.starts_with("http://") && !host.starts_with("https://") {
        host = format!("https://{host}");
    }
    host.trim_end_matches('/').to_string()
}

pub struct OpenAiProvider {
    client: Client,
    config: LlmConfig,
}

impl OpenAiProvider {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Network(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = normalize_http_base_url(&self.config.base_url, DEFAULT_OPENAI_BASE_URL);
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    async fn send_once(&self, body: &Value) -> Result<CompletionResponse, LlmError> {
        let url = self.endpoint();
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::Network(format!("failed to reach OpenAI at {url}: {e}")))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(self.config.initial_backoff_ms);
            return Err(LlmError::RateLimited { retry_after_ms });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("openai http error {status}: {text}")));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("openai returned invalid JSON: {e}")))?;
        parse_chat_response(&v, &self.config.model)
    }
}

/// Builds the Chat Completions request body.
pub fn chat_body(model: &str, request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect();

    let mut body = json!({ "model": model, "messages": messages });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = json!(temp);
    }
    if request.json_response {
        body["response_format"] = json!({ "type": "json_object" });
    }
    body
}

pub fn parse_chat_response(v: &Value, fallback_model: &str) -> Result<CompletionResponse, LlmError> {
    let choice = v
        .pointer("/choices/0")
        .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;
    let content = choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("empty message content".to_string()))?;

    let usage = Usage {
        prompt_tokens: v
            .pointer("/usage/prompt_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        completion_tokens: v
            .pointer("/usage/completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
    };

    Ok(CompletionResponse {
        content: content.to_string(),
        model: v
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(fallback_model)
            .to_string(),
        finish_reason: choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_string),
        usage,
    })
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = chat_body(&self.config.model, &request);
        let mut backoff_ms = self.config.initial_backoff_ms;
        let mut attempt = 0;

        loop {
            match self.send_once(&body).await {
                Ok(resp) => {
                    debug!(
                        model = %resp.model,
                        prompt_tokens = resp.usage.prompt_tokens,
                        completion_tokens = resp.usage.completion_tokens,
                        "openai completion"
                    );
                    return Ok(resp);
                }
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let wait = match &err {
                        LlmError::RateLimited { retry_after_ms } => (*retry_after_ms).max(backoff_ms),
                        _ => backoff_ms,
                    };
                    attempt += 1;
                    warn!(attempt, wait_ms = wait, error = %err, "retrying openai request");
                    tokio::time::sleep(Duration::from_millis(wait)).await;
                    backoff_ms = backoff_ms.saturating_mul(2);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
