//! Internal core infrastructure for TwinRaven: input canonicalization/hashing,
//! workspace path resolution, and hierarchical configuration loading.

pub mod canonical;
pub mod config;
pub mod error;
pub mod path;

pub use canonical::{canonical_string, canonicalize, input_hash};
pub use config::{CollectorConfig, Config, LlmConfig, RegistryConfig, SynthesisConfig};
pub use error::{Error, Result};
pub use path::resolve_workspace_path;
