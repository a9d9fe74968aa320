use serde_json::Value;

/// A request to the LLM oracle: a rendered prompt plus generation parameters.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub response_schema: Option<Value>,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// The oracle's response, including token accounting and observed latency.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub parsed: Option<Value>,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u64,
}

/// The LLM backend boundary. TwinRaven treats this purely as a request/response
/// oracle — no prompt-engineering or provider-specific concern leaks past this
/// trait into the rest of the workspace.
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, request: LlmRequest) -> crate::error::Result<LlmResponse>;
}
