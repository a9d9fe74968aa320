use std::time::Duration;

use crate::error::{Error, Result};
use crate::provider::{LLMProvider, LlmRequest, LlmResponse};

/// Exponential backoff on transient failures, honoring a server-advertised
/// retry delay when present. Defaults to 3 attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

/// Calls `provider.generate` with the given retry policy, retrying only on
/// `Error::Transient` (the provider's equivalent of HTTP {429, 500, 502, 503}).
/// Permanent errors (`Provider`, `Response`, `Timeout`) propagate immediately.
pub async fn generate_with_retry(
    provider: &dyn LLMProvider,
    request: LlmRequest,
    policy: RetryPolicy,
) -> Result<LlmResponse> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match provider.generate(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(Error::Transient {
                message,
                retry_after_ms,
            }) => {
                if attempt >= policy.max_attempts {
                    return Err(Error::Transient {
                        message,
                        retry_after_ms,
                    });
                }
                let delay_ms =
                    retry_after_ms.unwrap_or_else(|| policy.base_delay_ms * 2u64.pow(attempt - 1));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(other) => return Err(other),
        }
    }
}
