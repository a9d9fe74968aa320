//! Public SDK for embedding TwinRaven: a single [`Client`] over one
//! workspace directory, covering the full observe → mine → synthesize →
//! validate → register lifecycle plus the lifecycle scans and exporters.

mod client;
mod error;

pub use client::{Client, ClientBuilder};
pub use error::{Error, Result};

// Re-exported so embedders can construct requests/configs without adding
// the lower crates as direct dependencies.
pub use twinraven_core::Config;
pub use twinraven_engine::ValidatorConfig;
pub use twinraven_llm::{LLMProvider, LlmRequest, LlmResponse, MockProvider};
pub use twinraven_runtime::export::{Span, SpanExporter, SpanStatus};
pub use twinraven_runtime::{BufferMode, DriftFlag, ObservationContext};
pub use twinraven_types::{
    CandidateChain, Event, EventId, MiningConfig, Outcome, RetirementReason, SynthesizedTool,
    ToolRecord, ToolState, ToolVersion, ValidationResult,
};
