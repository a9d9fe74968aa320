use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::Value;

use crate::error::Result;
use crate::provider::{LLMProvider, LlmRequest, LlmResponse};

/// A deterministic provider for tests and local development. Returns responses
/// from a fixed queue in order, cycling back to the last entry once exhausted.
pub struct MockProvider {
    responses: Mutex<Vec<LlmResponse>>,
    cursor: AtomicUsize,
}

impl MockProvider {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        assert!(!responses.is_empty(), "MockProvider needs at least one response");
        Self {
            responses: Mutex::new(responses),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Builds a single-response provider that echoes `parsed` back as both the
    /// raw content and the parsed body.
    pub fn with_parsed(parsed: Value) -> Self {
        Self::new(vec![LlmResponse {
            content: parsed.to_string(),
            parsed: Some(parsed),
            model: "mock".to_string(),
            input_tokens: 0,
            output_tokens: 0,
            latency_ms: 0,
        }])
    }

    pub fn call_count(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LLMProvider for MockProvider {
    async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse> {
        let responses = self.responses.lock().unwrap();
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let bounded = index.min(responses.len() - 1);
        Ok(responses[bounded].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replays_queued_responses_in_order() {
        let provider = MockProvider::new(vec![
            LlmResponse {
                content: "first".to_string(),
                parsed: None,
                model: "mock".to_string(),
                input_tokens: 0,
                output_tokens: 0,
                latency_ms: 0,
            },
            LlmResponse {
                content: "second".to_string(),
                parsed: None,
                model: "mock".to_string(),
                input_tokens: 0,
                output_tokens: 0,
                latency_ms: 0,
            },
        ]);
        let request = LlmRequest {
            prompt: "x".to_string(),
            response_schema: None,
            max_tokens: 1,
            temperature: 0.0,
        };
        let first = provider.generate(request.clone()).await.unwrap();
        let second = provider.generate(request.clone()).await.unwrap();
        let third = provider.generate(request).await.unwrap();
        assert_eq!(first.content, "first");
        assert_eq!(second.content, "second");
        assert_eq!(third.content, "second");
    }

    #[tokio::test]
    async fn with_parsed_echoes_value() {
        let provider = MockProvider::with_parsed(json!({"slug": "fetch_and_parse"}));
        let response = provider
            .generate(LlmRequest {
                prompt: "x".to_string(),
                response_schema: None,
                max_tokens: 1,
                temperature: 0.0,
            })
            .await
            .unwrap();
        assert_eq!(response.parsed.unwrap()["slug"], "fetch_and_parse");
    }
}
