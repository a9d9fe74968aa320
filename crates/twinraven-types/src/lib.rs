//! Core data model for TwinRaven: events, candidate chains, synthesized tools,
//! validation results, and the registry's wrapper records.
//!
//! This crate is deliberately inert — it defines shapes and their own-invariant
//! checks, and does not touch storage, the LLM boundary, or the filesystem.

pub mod candidate;
pub mod error;
pub mod event;
pub mod registry;
pub mod tool;
pub mod validation;

pub use candidate::{CandidateChain, MiningAlgorithm, MiningConfig};
pub use error::{Error, Result};
pub use event::{Event, EventId, InputHash, Outcome};
pub use registry::{ToolRecord, ToolVersion};
pub use tool::{
    Backoff, DefaultBehavior, ErrorStrategy, InputSource, Predicate, RetirementReason,
    RetryPolicy, StepDefinition, StepErrorPolicy, SynthesizedTool, ToolState,
};
pub use validation::{EquivalenceScore, SimilarityMethod, ValidationResult};
