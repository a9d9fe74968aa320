mod miner;
mod prefixspan;
mod sequence;

pub use miner::Miner;
pub use sequence::{build_sequences, Sequence};
