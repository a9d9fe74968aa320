//! The three analytical stages of TwinRaven: mining recurring tool-call
//! chains, synthesizing composite tool proposals from them, and validating
//! those proposals by replaying recorded sessions.

pub mod error;
pub mod mining;
pub mod synthesis;
pub mod validation;

pub use error::{Error, Result};
pub use mining::Miner;
pub use synthesis::Synthesizer;
pub use validation::{Validator, ValidatorConfig};
