mod error_strategy;
mod flow;
mod prompt;
mod schema;
mod synthesizer;

pub use error_strategy::derive_error_strategy;
pub use flow::infer_input_sources;
pub use prompt::{build_prompt, response_schema};
pub use schema::validate_proposal_shape;
pub use synthesizer::Synthesizer;
