use std::fmt;

/// Result type for twinraven-llm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the LLM boundary: provider failures, transient failures
/// eligible for retry, schema violations, and timeouts.
#[derive(Debug)]
pub enum Error {
    /// The provider failed in a way retries cannot fix (bad credentials, unknown
    /// model, malformed request, etc.).
    Provider(String),
    /// A transient failure — corresponds to HTTP {429, 500, 502, 503} at the real
    /// transport. Carries a server-advertised retry delay when one was given.
    Transient {
        message: String,
        retry_after_ms: Option<u64>,
    },
    /// The response did not conform to the requested response schema.
    Response(String),
    /// The request exceeded its per-request timeout.
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Provider(msg) => write!(f, "LLM provider error: {}", msg),
            Error::Transient { message, .. } => write!(f, "LLM transient error: {}", message),
            Error::Response(msg) => write!(f, "LLM response violated schema: {}", msg),
            Error::Timeout => write!(f, "LLM request timed out"),
        }
    }
}

impl std::error::Error for Error {}
