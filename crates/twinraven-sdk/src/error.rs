use std::fmt;

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Resource not found (tool slug, version, etc.).
    NotFound(String),
    /// A caller-supplied argument doesn't satisfy a precondition (e.g.
    /// synthesizing without an LLM provider configured).
    InvalidInput(String),
    /// Error from the underlying runtime layer.
    Runtime(twinraven_runtime::Error),
    /// Error from the pure analysis pipeline (Miner/Synthesizer/Validator).
    Engine(twinraven_engine::Error),
    /// Error from core infrastructure (config, canonicalization).
    Core(twinraven_core::Error),
    /// Error from the SQLite-backed stores.
    Store(twinraven_store::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(msg) => write!(f, "not found: {}", msg),
            Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Error::Runtime(err) => write!(f, "{}", err),
            Error::Engine(err) => write!(f, "{}", err),
            Error::Core(err) => write!(f, "{}", err),
            Error::Store(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Runtime(err) => Some(err),
            Error::Engine(err) => Some(err),
            Error::Core(err) => Some(err),
            Error::Store(err) => Some(err),
            Error::NotFound(_) | Error::InvalidInput(_) => None,
        }
    }
}

impl From<twinraven_runtime::Error> for Error {
    fn from(err: twinraven_runtime::Error) -> Self {
        Error::Runtime(err)
    }
}

impl From<twinraven_engine::Error> for Error {
    fn from(err: twinraven_engine::Error) -> Self {
        Error::Engine(err)
    }
}

impl From<twinraven_core::Error> for Error {
    fn from(err: twinraven_core::Error) -> Self {
        Error::Core(err)
    }
}

impl From<twinraven_store::Error> for Error {
    fn from(err: twinraven_store::Error) -> Self {
        Error::Store(err)
    }
}
