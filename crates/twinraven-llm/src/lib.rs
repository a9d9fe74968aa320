//! The LLMProvider contract and a deterministic provider for tests and local
//! development. Prompt construction, provider selection, and authentication
//! are external collaborator concerns that live outside this workspace; this
//! crate only defines the boundary and a retrying wrapper around it.

pub mod error;
pub mod mock;
pub mod provider;
pub mod retry;

pub use error::{Error, Result};
pub use mock::MockProvider;
pub use provider::{LLMProvider, LlmRequest, LlmResponse};
pub use retry::{generate_with_retry, RetryPolicy};
