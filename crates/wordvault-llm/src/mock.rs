//! Scripted provider for tests and offline runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, Usage};

/// Returns scripted responses in order, cycling when they run out.
///
/// With no responses every call fails with `LlmError::Api`.
pub struct MockProvider {
    responses: Vec<String>,
    response_idx: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            response_idx: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().push(request);
        if self.responses.is_empty() {
            return Err(LlmError::Api("mock provider has no scripted responses".to_string()));
        }
        let idx = self.response_idx.fetch_add(1, Ordering::SeqCst);
        Ok(CompletionResponse {
            content: self.responses[idx % self.responses.len()].clone(),
            model: "mock".to_string(),
            finish_reason: Some("stop".to_string()),
            usage: Usage::default(),
        })
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_cycles_and_records() {
        let provider = MockProvider::new(vec!["one".into(), "two".into()]);
        let mut seen = Vec::new();
        for i in 0..3 {
            let resp = provider
                .complete(CompletionRequest::new("sys", format!("q{i}")))
                .await
                .unwrap();
            seen.push(resp.content);
        }
        assert_eq!(seen, vec!["one", "two", "one"]);
        assert_eq!(provider.requests()[2].user_prompt(), "q2");
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let provider = MockProvider::failing();
        assert!(provider.complete(CompletionRequest::new("s", "u")).await.is_err());
        assert_eq!(provider.call_count(), 1);
    }
}
