use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Mining configuration failed its own range checks.
    InvalidMiningConfig(String),
    /// The Synthesizer's LLM call failed outright.
    Llm(twinraven_llm::Error),
    /// The LLM's response did not parse into a usable tool proposal.
    MalformedProposal(String),
    /// A proposed or validated tool failed its structural invariants.
    InvalidTool(twinraven_types::Error),
    /// Not enough replay data to reach a validation verdict.
    InsufficientData(String),
    /// A candidate's mined failure rate exceeds the orchestrator's guard
    /// before any synthesis is attempted.
    FailureRateTooHigh(f64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidMiningConfig(msg) => write!(f, "invalid mining config: {}", msg),
            Error::Llm(err) => write!(f, "LLM error: {}", err),
            Error::MalformedProposal(msg) => write!(f, "malformed tool proposal: {}", msg),
            Error::InvalidTool(err) => write!(f, "invalid tool: {}", err),
            Error::InsufficientData(msg) => write!(f, "insufficient data: {}", msg),
            Error::FailureRateTooHigh(rate) => {
                write!(f, "candidate failure rate {:.3} exceeds the synthesis guard", rate)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Llm(err) => Some(err),
            Error::InvalidTool(err) => Some(err),
            Error::InvalidMiningConfig(_)
            | Error::MalformedProposal(_)
            | Error::InsufficientData(_)
            | Error::FailureRateTooHigh(_) => None,
        }
    }
}

impl From<twinraven_llm::Error> for Error {
    fn from(err: twinraven_llm::Error) -> Self {
        Error::Llm(err)
    }
}

impl From<twinraven_types::Error> for Error {
    fn from(err: twinraven_types::Error) -> Self {
        Error::InvalidTool(err)
    }
}
